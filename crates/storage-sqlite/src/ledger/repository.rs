use std::sync::Arc;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::r2d2::{self, Pool};
use diesel::SqliteConnection;
use log::debug;

use folioscope_core::errors::{DatabaseError, Error, Result};
use folioscope_core::ledger::{LedgerError, Position, PositionRepositoryTrait};
use folioscope_core::operations::{
    LedgerCommit, Operation, OperationFilter, OperationRepositoryTrait,
};

use super::model::{OperationDB, PositionDB};
use crate::db::{get_connection, WriteHandle};
use crate::errors::StorageError;
use crate::schema::{operations, positions};
use crate::utils::{format_decimal, format_timestamp};

/// Positions and the operations they are derived from. Both tables are only
/// written together, through [`OperationRepositoryTrait::commit`].
pub struct LedgerRepository {
    pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl LedgerRepository {
    pub fn new(
        pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
        writer: WriteHandle,
    ) -> Self {
        LedgerRepository { pool, writer }
    }
}

fn to_operations(rows: Vec<OperationDB>) -> Result<Vec<Operation>> {
    rows.into_iter()
        .map(|row| Operation::try_from(row).map_err(Error::from))
        .collect()
}

fn load_operation(conn: &mut SqliteConnection, operation_id: &str) -> Result<Operation> {
    let row = operations::table
        .find(operation_id)
        .select(OperationDB::as_select())
        .first::<OperationDB>(conn)
        .optional()
        .map_err(StorageError::from)?
        .ok_or_else(|| {
            Error::Database(DatabaseError::NotFound(format!(
                "Operation {} not found",
                operation_id
            )))
        })?;
    Ok(Operation::try_from(row)?)
}

fn stored_version(conn: &mut SqliteConnection, position: &Position) -> Result<i64> {
    let version = positions::table
        .find((&position.portfolio_id, &position.symbol))
        .select(positions::version)
        .first::<i64>(conn)
        .optional()
        .map_err(StorageError::from)?;
    Ok(version.unwrap_or(0))
}

impl PositionRepositoryTrait for LedgerRepository {
    fn get_position(&self, portfolio_id: &str, symbol: &str) -> Result<Option<Position>> {
        let mut conn = get_connection(&self.pool)?;
        let row = positions::table
            .find((portfolio_id, symbol))
            .select(PositionDB::as_select())
            .first::<PositionDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        Ok(row.map(Position::try_from).transpose()?)
    }

    fn list_positions(&self, portfolio_id: &str) -> Result<Vec<Position>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = positions::table
            .filter(positions::portfolio_id.eq(portfolio_id))
            .order(positions::symbol.asc())
            .select(PositionDB::as_select())
            .load::<PositionDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter()
            .map(|row| Position::try_from(row).map_err(Error::from))
            .collect()
    }

    fn list_open_symbols(&self) -> Result<Vec<String>> {
        let mut conn = get_connection(&self.pool)?;
        // Quantities are decimal strings, so "open" is decided after parsing.
        let rows = positions::table
            .select(PositionDB::as_select())
            .load::<PositionDB>(&mut conn)
            .map_err(StorageError::from)?;
        let mut symbols = Vec::new();
        for row in rows {
            let position = Position::try_from(row)?;
            if position.is_open() {
                symbols.push(position.symbol);
            }
        }
        symbols.sort();
        symbols.dedup();
        Ok(symbols)
    }
}

#[async_trait]
impl OperationRepositoryTrait for LedgerRepository {
    fn get_operation(&self, operation_id: &str) -> Result<Operation> {
        let mut conn = get_connection(&self.pool)?;
        load_operation(&mut conn, operation_id)
    }

    fn list_operations(&self, filter: &OperationFilter) -> Result<Vec<Operation>> {
        let mut conn = get_connection(&self.pool)?;
        let mut query = operations::table
            .filter(operations::portfolio_id.eq(&filter.portfolio_id))
            .select(OperationDB::as_select())
            .into_boxed();

        if let Some(symbol) = &filter.symbol {
            query = query.filter(operations::symbol.eq(symbol.trim().to_uppercase()));
        }
        if let Some(side) = filter.side {
            query = query.filter(operations::side.eq(side.as_str()));
        }
        if let Some(from) = &filter.from {
            query = query.filter(operations::executed_at.ge(format_timestamp(from)));
        }
        if let Some(to) = &filter.to {
            query = query.filter(operations::executed_at.le(format_timestamp(to)));
        }

        query = query.order((
            operations::executed_at.desc(),
            operations::created_at.desc(),
            operations::id.desc(),
        ));
        if let Some(limit) = filter.limit {
            query = query.limit(limit);
        }
        if let Some(offset) = filter.offset {
            // SQLite only accepts OFFSET after a LIMIT.
            if filter.limit.is_none() {
                query = query.limit(-1);
            }
            query = query.offset(offset);
        }

        let rows = query
            .load::<OperationDB>(&mut conn)
            .map_err(StorageError::from)?;
        to_operations(rows)
    }

    fn list_for_position(&self, portfolio_id: &str, symbol: &str) -> Result<Vec<Operation>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = operations::table
            .filter(operations::portfolio_id.eq(portfolio_id))
            .filter(operations::symbol.eq(symbol))
            .order((
                operations::executed_at.asc(),
                operations::created_at.asc(),
                operations::id.asc(),
            ))
            .select(OperationDB::as_select())
            .load::<OperationDB>(&mut conn)
            .map_err(StorageError::from)?;
        to_operations(rows)
    }

    fn count_operations(&self, portfolio_id: &str) -> Result<i64> {
        let mut conn = get_connection(&self.pool)?;
        let count = operations::table
            .filter(operations::portfolio_id.eq(portfolio_id))
            .count()
            .get_result::<i64>(&mut conn)
            .map_err(StorageError::from)?;
        Ok(count)
    }

    async fn commit(&self, commit: LedgerCommit) -> Result<()> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                let position = &commit.position;
                let current = stored_version(conn, position)?;
                if current != commit.expected_version {
                    debug!(
                        "Version conflict on {}/{}: stored {}, expected {}",
                        position.portfolio_id,
                        position.symbol,
                        current,
                        commit.expected_version
                    );
                    return Err(LedgerError::Conflict {
                        portfolio_id: position.portfolio_id.clone(),
                        symbol: position.symbol.clone(),
                        expected_version: commit.expected_version,
                    }
                    .into());
                }

                if let Some(operation_id) = &commit.delete_operation_id {
                    diesel::delete(operations::table.find(operation_id))
                        .execute(conn)
                        .map_err(StorageError::from)?;
                }

                for (operation_id, gain) in &commit.rewritten_gains {
                    diesel::update(operations::table.find(operation_id))
                        .set(operations::realized_gain.eq(gain.as_ref().map(format_decimal)))
                        .execute(conn)
                        .map_err(StorageError::from)?;
                }

                if let Some(operation) = &commit.insert {
                    diesel::insert_into(operations::table)
                        .values(OperationDB::from(operation))
                        .execute(conn)
                        .map_err(StorageError::from)?;
                }

                let row = PositionDB::from(position);
                diesel::insert_into(positions::table)
                    .values(&row)
                    .on_conflict((positions::portfolio_id, positions::symbol))
                    .do_update()
                    .set(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    async fn update_notes(&self, operation_id: &str, notes: Option<String>) -> Result<Operation> {
        let target = operation_id.to_string();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<Operation> {
                let changed = diesel::update(operations::table.find(&target))
                    .set(operations::notes.eq(notes))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                if changed == 0 {
                    return Err(Error::Database(DatabaseError::NotFound(format!(
                        "Operation {} not found",
                        target
                    ))));
                }
                load_operation(conn, &target)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portfolios::PortfolioRepository;
    use crate::test_utils::{at, seed_portfolio, setup, TestDb};
    use folioscope_core::operations::{compute_total_amount, OperationSide};
    use folioscope_core::portfolios::PortfolioRepositoryTrait;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn repo(db: &TestDb) -> LedgerRepository {
        LedgerRepository::new(Arc::clone(&db.pool), db.writer.clone())
    }

    fn operation(id: &str, side: OperationSide, quantity: Decimal, price: Decimal, day: u32) -> Operation {
        Operation {
            id: id.to_string(),
            portfolio_id: "p1".to_string(),
            symbol: "AAPL".to_string(),
            side,
            quantity,
            price,
            fees: dec!(1.00),
            total_amount: compute_total_amount(side, quantity, price, dec!(1.00)),
            realized_gain: None,
            executed_at: at(day, 15),
            notes: None,
            created_at: at(day, 15),
        }
    }

    fn position(quantity: Decimal, average_cost: Decimal, version: i64) -> Position {
        let mut position = Position::empty("p1", "AAPL", "USD");
        position.quantity = quantity;
        position.average_cost = average_cost;
        position.cost_basis = quantity * average_cost;
        position.version = version;
        position.opened_at = Some(at(1, 15));
        position.last_operation_at = Some(at(1, 15));
        position
    }

    async fn buy_ten(repo: &LedgerRepository) {
        repo.commit(LedgerCommit {
            insert: Some(operation("op-1", OperationSide::Buy, dec!(10), dec!(150.00), 1)),
            delete_operation_id: None,
            rewritten_gains: vec![],
            position: position(dec!(10), dec!(150.00), 1),
            expected_version: 0,
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_commit_writes_operation_and_position() {
        let db = setup();
        seed_portfolio(&db, "p1", "Growth").await;
        let repo = repo(&db);

        buy_ten(&repo).await;

        let stored = repo.get_position("p1", "AAPL").unwrap().unwrap();
        assert_eq!(stored.quantity, dec!(10));
        assert_eq!(stored.average_cost, dec!(150.00));
        assert_eq!(stored.version, 1);
        assert_eq!(repo.count_operations("p1").unwrap(), 1);
        let op = repo.get_operation("op-1").unwrap();
        assert_eq!(op.total_amount, dec!(1501.00));
        assert_eq!(op.side, OperationSide::Buy);
    }

    #[tokio::test]
    async fn test_stale_version_is_a_conflict_and_writes_nothing() {
        let db = setup();
        seed_portfolio(&db, "p1", "Growth").await;
        let repo = repo(&db);
        buy_ten(&repo).await;

        let err = repo
            .commit(LedgerCommit {
                insert: Some(operation("op-2", OperationSide::Buy, dec!(5), dec!(160.00), 2)),
                delete_operation_id: None,
                rewritten_gains: vec![],
                position: position(dec!(15), dec!(153.33), 1),
                expected_version: 0,
            })
            .await
            .unwrap_err();

        assert!(err.is_conflict());
        assert_eq!(repo.count_operations("p1").unwrap(), 1);
        assert_eq!(repo.get_position("p1", "AAPL").unwrap().unwrap().version, 1);
    }

    #[tokio::test]
    async fn test_commit_deletes_and_rewrites_gains_atomically() {
        let db = setup();
        seed_portfolio(&db, "p1", "Growth").await;
        let repo = repo(&db);
        buy_ten(&repo).await;

        let mut sell = operation("op-2", OperationSide::Sell, dec!(4), dec!(200.00), 3);
        sell.realized_gain = Some(dec!(200.00));
        repo.commit(LedgerCommit {
            insert: Some(sell),
            delete_operation_id: None,
            rewritten_gains: vec![],
            position: position(dec!(6), dec!(150.00), 2),
            expected_version: 1,
        })
        .await
        .unwrap();

        repo.commit(LedgerCommit {
            insert: Some(operation("op-3", OperationSide::Buy, dec!(10), dec!(130.00), 2)),
            delete_operation_id: None,
            rewritten_gains: vec![("op-2".to_string(), Some(dec!(280.00)))],
            position: position(dec!(16), dec!(140.00), 3),
            expected_version: 2,
        })
        .await
        .unwrap();
        assert_eq!(
            repo.get_operation("op-2").unwrap().realized_gain,
            Some(dec!(280.00))
        );

        repo.commit(LedgerCommit {
            insert: None,
            delete_operation_id: Some("op-3".to_string()),
            rewritten_gains: vec![("op-2".to_string(), Some(dec!(200.00)))],
            position: position(dec!(6), dec!(150.00), 4),
            expected_version: 3,
        })
        .await
        .unwrap();

        assert!(repo.get_operation("op-3").unwrap_err().is_not_found());
        assert_eq!(
            repo.get_operation("op-2").unwrap().realized_gain,
            Some(dec!(200.00))
        );
        assert_eq!(repo.get_position("p1", "AAPL").unwrap().unwrap().version, 4);
    }

    #[tokio::test]
    async fn test_history_is_chronological_and_listing_newest_first() {
        let db = setup();
        seed_portfolio(&db, "p1", "Growth").await;
        let repo = repo(&db);
        buy_ten(&repo).await;
        repo.commit(LedgerCommit {
            insert: Some(operation("op-0", OperationSide::Buy, dec!(2), dec!(140.00), 1)),
            delete_operation_id: None,
            rewritten_gains: vec![],
            position: position(dec!(12), dec!(148.33), 2),
            expected_version: 1,
        })
        .await
        .unwrap();
        repo.commit(LedgerCommit {
            insert: Some(operation("op-5", OperationSide::Sell, dec!(2), dec!(170.00), 5)),
            delete_operation_id: None,
            rewritten_gains: vec![],
            position: position(dec!(10), dec!(148.33), 3),
            expected_version: 2,
        })
        .await
        .unwrap();

        let history: Vec<String> = repo
            .list_for_position("p1", "AAPL")
            .unwrap()
            .into_iter()
            .map(|op| op.id)
            .collect();
        // Same timestamp for op-0 and op-1: ties break on id.
        assert_eq!(history, vec!["op-0", "op-1", "op-5"]);

        let listed: Vec<String> = repo
            .list_operations(&OperationFilter::for_portfolio("p1"))
            .unwrap()
            .into_iter()
            .map(|op| op.id)
            .collect();
        assert_eq!(listed, vec!["op-5", "op-1", "op-0"]);
    }

    #[tokio::test]
    async fn test_list_operations_applies_filters_and_paging() {
        let db = setup();
        seed_portfolio(&db, "p1", "Growth").await;
        let repo = repo(&db);
        buy_ten(&repo).await;
        repo.commit(LedgerCommit {
            insert: Some(operation("op-2", OperationSide::Sell, dec!(3), dec!(170.00), 4)),
            delete_operation_id: None,
            rewritten_gains: vec![],
            position: position(dec!(7), dec!(150.00), 2),
            expected_version: 1,
        })
        .await
        .unwrap();

        let sells = repo
            .list_operations(&OperationFilter {
                side: Some(OperationSide::Sell),
                ..OperationFilter::for_portfolio("p1")
            })
            .unwrap();
        assert_eq!(sells.len(), 1);
        assert_eq!(sells[0].id, "op-2");

        let ranged = repo
            .list_operations(&OperationFilter {
                symbol: Some("aapl".to_string()),
                from: Some(at(2, 0)),
                to: Some(at(10, 0)),
                ..OperationFilter::for_portfolio("p1")
            })
            .unwrap();
        assert_eq!(ranged.len(), 1);

        let second_page = repo
            .list_operations(&OperationFilter {
                offset: Some(1),
                ..OperationFilter::for_portfolio("p1")
            })
            .unwrap();
        assert_eq!(second_page.len(), 1);
        assert_eq!(second_page[0].id, "op-1");

        let first_only = repo
            .list_operations(&OperationFilter {
                limit: Some(1),
                ..OperationFilter::for_portfolio("p1")
            })
            .unwrap();
        assert_eq!(first_only[0].id, "op-2");
    }

    #[tokio::test]
    async fn test_open_symbols_skip_closed_positions() {
        let db = setup();
        seed_portfolio(&db, "p1", "Growth").await;
        let repo = repo(&db);
        buy_ten(&repo).await;

        let mut closed = Position::empty("p1", "MSFT", "USD");
        closed.version = 2;
        repo.commit(LedgerCommit {
            insert: None,
            delete_operation_id: None,
            rewritten_gains: vec![],
            position: closed,
            expected_version: 0,
        })
        .await
        .unwrap();

        assert_eq!(repo.list_open_symbols().unwrap(), vec!["AAPL"]);
        assert_eq!(repo.list_positions("p1").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_notes() {
        let db = setup();
        seed_portfolio(&db, "p1", "Growth").await;
        let repo = repo(&db);
        buy_ten(&repo).await;

        let updated = repo
            .update_notes("op-1", Some("initial stake".to_string()))
            .await
            .unwrap();
        assert_eq!(updated.notes.as_deref(), Some("initial stake"));
        assert!(repo
            .update_notes("missing", None)
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_deleting_portfolio_cascades() {
        let db = setup();
        seed_portfolio(&db, "p1", "Growth").await;
        let repo = repo(&db);
        buy_ten(&repo).await;

        let portfolios = PortfolioRepository::new(Arc::clone(&db.pool), db.writer.clone());
        portfolios.delete("p1").await.unwrap();

        assert!(repo.get_position("p1", "AAPL").unwrap().is_none());
        assert_eq!(repo.count_operations("p1").unwrap(), 0);
    }
}
