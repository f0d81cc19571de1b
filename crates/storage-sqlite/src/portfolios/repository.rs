use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::r2d2::{self, Pool};
use diesel::SqliteConnection;
use log::debug;
use rust_decimal::Decimal;
use uuid::Uuid;

use folioscope_core::errors::{DatabaseError, Error, Result};
use folioscope_core::metrics::PortfolioTotals;
use folioscope_core::portfolios::{
    NewPortfolio, Portfolio, PortfolioRepositoryTrait, PortfolioUpdate,
};

use super::model::PortfolioDB;
use crate::db::{get_connection, WriteHandle};
use crate::errors::StorageError;
use crate::schema::portfolios;
use crate::schema::portfolios::dsl::*;
use crate::utils::{format_decimal, format_timestamp};

pub struct PortfolioRepository {
    pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl PortfolioRepository {
    pub fn new(
        pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
        writer: WriteHandle,
    ) -> Self {
        PortfolioRepository { pool, writer }
    }
}

fn not_found(portfolio_id: &str) -> Error {
    Error::Database(DatabaseError::NotFound(format!(
        "Portfolio {} not found",
        portfolio_id
    )))
}

fn load_one(conn: &mut SqliteConnection, portfolio_id: &str) -> Result<Portfolio> {
    let row = portfolios
        .find(portfolio_id)
        .select(PortfolioDB::as_select())
        .first::<PortfolioDB>(conn)
        .optional()
        .map_err(StorageError::from)?
        .ok_or_else(|| not_found(portfolio_id))?;
    Ok(Portfolio::try_from(row)?)
}

#[async_trait]
impl PortfolioRepositoryTrait for PortfolioRepository {
    fn get_by_id(&self, portfolio_id: &str) -> Result<Portfolio> {
        let mut conn = get_connection(&self.pool)?;
        load_one(&mut conn, portfolio_id)
    }

    fn list_by_owner(&self, owner: &str) -> Result<Vec<Portfolio>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = portfolios
            .filter(owner_id.eq(owner))
            .order(name.asc())
            .select(PortfolioDB::as_select())
            .load::<PortfolioDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter()
            .map(|row| Portfolio::try_from(row).map_err(Error::from))
            .collect()
    }

    fn find_by_owner_and_name(&self, owner: &str, portfolio_name: &str) -> Result<Option<Portfolio>> {
        let wanted = portfolio_name.trim();
        Ok(self
            .list_by_owner(owner)?
            .into_iter()
            .find(|p| p.name.trim().eq_ignore_ascii_case(wanted)))
    }

    async fn create(&self, new_portfolio: NewPortfolio) -> Result<Portfolio> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<Portfolio> {
                let now = Utc::now();
                let portfolio = Portfolio {
                    id: new_portfolio
                        .id
                        .unwrap_or_else(|| Uuid::new_v4().to_string()),
                    owner_id: new_portfolio.owner_id,
                    name: new_portfolio.name,
                    description: new_portfolio.description,
                    base_currency: new_portfolio.base_currency,
                    total_value: Decimal::ZERO,
                    total_cost: Decimal::ZERO,
                    gain_loss: Decimal::ZERO,
                    gain_loss_percent: Decimal::ZERO,
                    created_at: now,
                    updated_at: now,
                };

                diesel::insert_into(portfolios::table)
                    .values(PortfolioDB::from(&portfolio))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                debug!("Created portfolio {}", portfolio.id);
                Ok(portfolio)
            })
            .await
    }

    async fn update(&self, portfolio_update: PortfolioUpdate) -> Result<Portfolio> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<Portfolio> {
                let changed = diesel::update(portfolios.find(&portfolio_update.id))
                    .set((
                        name.eq(&portfolio_update.name),
                        description.eq(&portfolio_update.description),
                        updated_at.eq(format_timestamp(&Utc::now())),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                if changed == 0 {
                    return Err(not_found(&portfolio_update.id));
                }
                load_one(conn, &portfolio_update.id)
            })
            .await
    }

    async fn update_totals(&self, portfolio_id: &str, totals: PortfolioTotals) -> Result<()> {
        let target = portfolio_id.to_string();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                let changed = diesel::update(portfolios.find(&target))
                    .set((
                        total_value.eq(format_decimal(&totals.total_value)),
                        total_cost.eq(format_decimal(&totals.total_cost)),
                        gain_loss.eq(format_decimal(&totals.gain_loss)),
                        gain_loss_percent.eq(format_decimal(&totals.gain_loss_percent)),
                        updated_at.eq(format_timestamp(&Utc::now())),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                if changed == 0 {
                    return Err(not_found(&target));
                }
                Ok(())
            })
            .await
    }

    async fn delete(&self, portfolio_id: &str) -> Result<usize> {
        let target = portfolio_id.to_string();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                // Positions and operations go with it through ON DELETE CASCADE.
                let deleted = diesel::delete(portfolios.find(&target))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(deleted)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{seed_portfolio, setup};
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_create_assigns_id_and_zero_totals() {
        let db = setup();
        let repo = PortfolioRepository::new(Arc::clone(&db.pool), db.writer.clone());

        let created = repo
            .create(NewPortfolio::new("owner-1", "Retirement"))
            .await
            .unwrap();

        assert!(!created.id.is_empty());
        assert_eq!(created.total_value, Decimal::ZERO);
        let loaded = repo.get_by_id(&created.id).unwrap();
        assert_eq!(loaded.name, "Retirement");
        assert_eq!(loaded.base_currency, "USD");
    }

    #[tokio::test]
    async fn test_get_missing_portfolio_is_not_found() {
        let db = setup();
        let repo = PortfolioRepository::new(Arc::clone(&db.pool), db.writer.clone());

        let err = repo.get_by_id("nope").unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_list_by_owner_sorted_by_name() {
        let db = setup();
        seed_portfolio(&db, "p1", "Zeta").await;
        seed_portfolio(&db, "p2", "Alpha").await;
        let repo = PortfolioRepository::new(Arc::clone(&db.pool), db.writer.clone());
        repo.create(NewPortfolio::new("owner-2", "Other"))
            .await
            .unwrap();

        let names: Vec<String> = repo
            .list_by_owner("owner-1")
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Alpha", "Zeta"]);
    }

    #[tokio::test]
    async fn test_find_by_owner_and_name_ignores_case() {
        let db = setup();
        seed_portfolio(&db, "p1", "Growth").await;
        let repo = PortfolioRepository::new(Arc::clone(&db.pool), db.writer.clone());

        let found = repo.find_by_owner_and_name("owner-1", " growth ").unwrap();
        assert_eq!(found.map(|p| p.id), Some("p1".to_string()));
        assert!(repo
            .find_by_owner_and_name("owner-2", "Growth")
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_duplicate_name_for_owner_is_rejected() {
        let db = setup();
        seed_portfolio(&db, "p1", "Growth").await;
        let repo = PortfolioRepository::new(Arc::clone(&db.pool), db.writer.clone());

        let err = repo
            .create(NewPortfolio::new("owner-1", "GROWTH"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Database(DatabaseError::UniqueViolation(_))
        ));
    }

    #[tokio::test]
    async fn test_update_and_totals() {
        let db = setup();
        seed_portfolio(&db, "p1", "Growth").await;
        let repo = PortfolioRepository::new(Arc::clone(&db.pool), db.writer.clone());

        let updated = repo
            .update(PortfolioUpdate {
                id: "p1".to_string(),
                name: "Long Term".to_string(),
                description: Some("core holdings".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(updated.name, "Long Term");

        repo.update_totals(
            "p1",
            PortfolioTotals {
                total_value: dec!(1850.00),
                total_cost: dec!(1500.00),
                gain_loss: dec!(350.00),
                gain_loss_percent: dec!(23.33),
            },
        )
        .await
        .unwrap();

        let loaded = repo.get_by_id("p1").unwrap();
        assert_eq!(loaded.total_value, dec!(1850.00));
        assert_eq!(loaded.gain_loss_percent, dec!(23.33));
        assert_eq!(loaded.description.as_deref(), Some("core holdings"));
    }

    #[tokio::test]
    async fn test_update_missing_portfolio_is_not_found() {
        let db = setup();
        let repo = PortfolioRepository::new(Arc::clone(&db.pool), db.writer.clone());

        let err = repo
            .update(PortfolioUpdate {
                id: "ghost".to_string(),
                name: "X".to_string(),
                description: None,
            })
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_reports_rows_removed() {
        let db = setup();
        seed_portfolio(&db, "p1", "Growth").await;
        let repo = PortfolioRepository::new(Arc::clone(&db.pool), db.writer.clone());

        assert_eq!(repo.delete("p1").await.unwrap(), 1);
        assert_eq!(repo.delete("p1").await.unwrap(), 0);
        assert!(repo.get_by_id("p1").unwrap_err().is_not_found());
    }
}
