//! Per-order mutation locks.
//!
//! Entries are created on first use and pruned when the last holder or
//! waiter lets go, so the table only ever holds orders with writers in
//! flight.

use crate::domain::OrderId;
use crate::error::SyncError;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

pub(crate) struct LockTable {
    locks: DashMap<OrderId, Arc<Mutex<()>>>,
    timeout: Duration,
}

/// Held for the whole read-modify-persist-publish sequence of one order.
pub(crate) struct OrderLock<'a> {
    table: &'a LockTable,
    order_id: OrderId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl LockTable {
    pub(crate) fn new(timeout: Duration) -> Self {
        Self {
            locks: DashMap::new(),
            timeout,
        }
    }

    /// Waits at most the configured timeout for the order's lock.
    pub(crate) async fn acquire(&self, order_id: OrderId) -> Result<OrderLock<'_>, SyncError> {
        let mutex = self.locks.entry(order_id).or_default().clone();
        match tokio::time::timeout(self.timeout, mutex.lock_owned()).await {
            Ok(guard) => {
                debug!(%order_id, "Lock acquired");
                Ok(OrderLock {
                    table: self,
                    order_id,
                    guard: Some(guard),
                })
            }
            Err(_) => {
                self.prune(order_id);
                warn!(%order_id, waited_ms = self.timeout.as_millis() as u64, "Lock timeout");
                Err(SyncError::LockTimeout {
                    order_id,
                    waited: self.timeout,
                })
            }
        }
    }

    fn prune(&self, order_id: OrderId) {
        self.locks
            .remove_if(&order_id, |_, mutex| Arc::strong_count(mutex) == 1);
    }

    pub(crate) fn len(&self) -> usize {
        self.locks.len()
    }
}

impl Drop for OrderLock<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.table.prune(self.order_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn second_writer_times_out_while_first_holds() {
        let table = LockTable::new(Duration::from_millis(100));
        let order_id = OrderId::new();
        let held = table.acquire(order_id).await.unwrap();

        let err = table.acquire(order_id).await.err().unwrap();
        assert!(matches!(err, SyncError::LockTimeout { .. }));
        assert!(err.is_retryable());

        drop(held);
        assert!(table.acquire(order_id).await.is_ok());
    }

    #[tokio::test]
    async fn different_orders_do_not_contend() {
        let table = LockTable::new(Duration::from_millis(100));
        let _a = table.acquire(OrderId::new()).await.unwrap();
        let _b = table.acquire(OrderId::new()).await.unwrap();
        assert_eq!(table.len(), 2);
    }

    #[tokio::test]
    async fn entries_are_pruned_after_release() {
        let table = LockTable::new(Duration::from_millis(100));
        for _ in 0..10 {
            let _lock = table.acquire(OrderId::new()).await.unwrap();
        }
        assert_eq!(table.len(), 0);
    }
}
