//! Fresh migrated database per test.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use folioscope_core::portfolios::{NewPortfolio, Portfolio, PortfolioRepositoryTrait};
use tempfile::{tempdir, TempDir};

use crate::db::{create_pool, run_migrations, spawn_writer, DbPool, WriteHandle};
use crate::portfolios::PortfolioRepository;

pub struct TestDb {
    pub pool: Arc<DbPool>,
    pub writer: WriteHandle,
    // Dropping this removes the database file.
    _dir: TempDir,
}

pub fn setup() -> TestDb {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test.db");
    let pool = create_pool(db_path.to_str().unwrap()).unwrap();
    run_migrations(&pool).unwrap();
    let writer = spawn_writer((*pool).clone());
    TestDb {
        pool,
        writer,
        _dir: dir,
    }
}

pub async fn seed_portfolio(db: &TestDb, id: &str, name: &str) -> Portfolio {
    let repo = PortfolioRepository::new(Arc::clone(&db.pool), db.writer.clone());
    let mut new_portfolio = NewPortfolio::new("owner-1", name);
    new_portfolio.id = Some(id.to_string());
    repo.create(new_portfolio).await.unwrap()
}

pub fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, day, hour, 0, 0).unwrap()
}
