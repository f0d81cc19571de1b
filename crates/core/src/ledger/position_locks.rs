use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockMap<K> = Mutex<HashMap<K, Arc<AsyncMutex<()>>>>;

async fn acquire<K: Eq + Hash>(map: &LockMap<K>, key: K) -> OwnedMutexGuard<()> {
    let entry = {
        let mut locks = map.lock().unwrap_or_else(|p| p.into_inner());
        // Drop keys nobody holds or waits on.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry(key).or_default().clone()
    };
    entry.lock_owned().await
}

/// Per-(portfolio, symbol) async mutexes serializing ledger writes, plus
/// per-portfolio mutexes serializing the totals refresh that follows them.
///
/// The guard releases the key on drop, on every exit path. A portfolio lock
/// is never held while waiting on a position lock.
#[derive(Default)]
pub struct PositionLocks {
    locks: LockMap<(String, String)>,
    portfolios: LockMap<String>,
}

impl PositionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, portfolio_id: &str, symbol: &str) -> OwnedMutexGuard<()> {
        acquire(&self.locks, (portfolio_id.to_string(), symbol.to_string())).await
    }

    /// Serializes read-positions-then-write-totals for one portfolio.
    pub async fn lock_portfolio(&self, portfolio_id: &str) -> OwnedMutexGuard<()> {
        acquire(&self.portfolios, portfolio_id.to_string()).await
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.locks.lock().unwrap_or_else(|p| p.into_inner()).len()
    }
}
