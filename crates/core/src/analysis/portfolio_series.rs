use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::market_data::PriceSeries;

/// Daily value of a set of holdings: Σ quantity × close, on the dates where
/// every holding has a close. Oldest first.
pub fn portfolio_value_series(holdings: &[(Decimal, &PriceSeries)]) -> Vec<(NaiveDate, Decimal)> {
    let Some(((first_qty, first), rest)) = holdings.split_first() else {
        return Vec::new();
    };
    let rest: Vec<(Decimal, BTreeMap<NaiveDate, Decimal>)> = rest
        .iter()
        .map(|(qty, series)| (*qty, series.daily_closes()))
        .collect();

    first
        .daily_closes()
        .into_iter()
        .filter_map(|(date, close)| {
            let mut value = *first_qty * close;
            for (qty, closes) in &rest {
                value += *qty * closes.get(&date)?;
            }
            Some((date, value))
        })
        .collect()
}
