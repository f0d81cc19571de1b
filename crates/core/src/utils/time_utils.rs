use chrono::{DateTime, Duration, NaiveDate, Utc};

/// Calendar date a price point or operation belongs to (UTC).
pub fn trading_date(instant: DateTime<Utc>) -> NaiveDate {
    instant.date_naive()
}

/// Start of a trailing window of `days` calendar days ending at `now`.
pub fn history_start(now: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    now - Duration::days(i64::from(days))
}
