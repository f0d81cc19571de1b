use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sql_query;
use diesel::sql_types::Text;
use diesel::sqlite::{Sqlite, SqliteConnection};
use log::debug;

use folioscope_core::errors::{Error, Result};
use folioscope_core::market_data::{PricePoint, PriceSeries, QuoteRepositoryTrait};

use super::model::PricePointDB;
use crate::db::{get_connection, WriteHandle};
use crate::errors::{IntoCore, StorageError};
use crate::schema::price_points::dsl as price_points_dsl;
use crate::utils::{chunk_for_sqlite, format_timestamp};

pub struct PriceRepository {
    pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl PriceRepository {
    pub fn new(pool: Arc<Pool<ConnectionManager<SqliteConnection>>>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

fn to_points(rows: Vec<PricePointDB>) -> Result<Vec<PricePoint>> {
    rows.into_iter()
        .map(|row| PricePoint::try_from(row).map_err(Error::from))
        .collect()
}

#[async_trait]
impl QuoteRepositoryTrait for PriceRepository {
    fn get_series(&self, symbol: &str, from: Option<DateTime<Utc>>) -> Result<PriceSeries> {
        let mut conn = get_connection(&self.pool)?;
        let mut query = price_points_dsl::price_points
            .filter(price_points_dsl::symbol.eq(symbol))
            .select(PricePointDB::as_select())
            .into_boxed();
        if let Some(from) = from {
            query = query.filter(price_points_dsl::timestamp.ge(format_timestamp(&from)));
        }
        let rows = query
            .order(price_points_dsl::timestamp.asc())
            .load::<PricePointDB>(&mut conn)
            .into_core()?;
        Ok(PriceSeries::new(symbol, to_points(rows)?))
    }

    fn latest_point(&self, symbol: &str) -> Result<Option<PricePoint>> {
        let mut conn = get_connection(&self.pool)?;
        let row = price_points_dsl::price_points
            .filter(price_points_dsl::symbol.eq(symbol))
            .order(price_points_dsl::timestamp.desc())
            .select(PricePointDB::as_select())
            .first::<PricePointDB>(&mut conn)
            .optional()
            .into_core()?;
        Ok(row.map(PricePoint::try_from).transpose()?)
    }

    fn latest_points(&self, symbols: &[String]) -> Result<HashMap<String, PricePoint>> {
        if symbols.is_empty() {
            return Ok(HashMap::new());
        }

        let mut conn = get_connection(&self.pool)?;
        let mut result: HashMap<String, PricePoint> = HashMap::new();

        for chunk in chunk_for_sqlite(symbols) {
            let placeholders = chunk.iter().map(|_| "?").collect::<Vec<_>>().join(", ");

            let sql = format!(
                "WITH Ranked AS ( \
                    SELECT p.*, \
                        ROW_NUMBER() OVER (PARTITION BY p.symbol ORDER BY p.timestamp DESC) AS rn \
                    FROM price_points p WHERE p.symbol IN ({}) \
                ) \
                SELECT symbol, timestamp, open, high, low, close, volume, source \
                FROM Ranked WHERE rn = 1",
                placeholders
            );

            let mut query_builder = Box::new(sql_query(sql)).into_boxed::<Sqlite>();
            for symbol_val in chunk {
                query_builder = query_builder.bind::<Text, _>(symbol_val);
            }

            let rows: Vec<PricePointDB> = query_builder.load::<PricePointDB>(&mut conn).into_core()?;
            for row in rows {
                let point = PricePoint::try_from(row)?;
                result.insert(point.symbol.clone(), point);
            }
        }

        Ok(result)
    }

    async fn insert_points(&self, points: Vec<PricePoint>) -> Result<usize> {
        if points.is_empty() {
            return Ok(0);
        }
        let rows: Vec<PricePointDB> = points.iter().map(PricePointDB::from).collect();

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                let mut inserted = 0;
                for row in &rows {
                    inserted += diesel::insert_or_ignore_into(price_points_dsl::price_points)
                        .values(row)
                        .execute(conn)
                        .map_err(StorageError::from)?;
                }
                debug!("Stored {} of {} price points", inserted, rows.len());
                Ok(inserted)
            })
            .await
    }

    async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let cutoff = format_timestamp(&cutoff);
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                let removed = diesel::delete(
                    price_points_dsl::price_points.filter(price_points_dsl::timestamp.lt(&cutoff)),
                )
                .execute(conn)
                .map_err(StorageError::from)?;
                Ok(removed)
            })
            .await
    }
}
