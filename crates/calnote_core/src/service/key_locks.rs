//! Per-key write serialization.
//!
//! Writes for the same key queue on one async mutex; tokio mutexes grant
//! the lock in request order, so a later-issued write is always applied
//! after an earlier one. Distinct keys never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Default)]
pub(crate) struct KeyedLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    /// Waits until the caller holds the write slot for `key`.
    pub(crate) async fn acquire(&self, key: String) -> OwnedMutexGuard<()> {
        let slot = {
            let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            // Drop slots nobody holds or waits on.
            locks.retain(|_, slot| Arc::strong_count(slot) > 1);
            Arc::clone(locks.entry(key).or_default())
        };
        slot.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::KeyedLocks;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn same_key_waits_distinct_keys_do_not() {
        let locks = Arc::new(KeyedLocks::default());
        let held = locks.acquire("2024-01-01".to_string()).await;

        let other = tokio::time::timeout(
            Duration::from_millis(50),
            locks.acquire("2024-01-02".to_string()),
        )
        .await;
        assert!(other.is_ok());

        let same = tokio::time::timeout(
            Duration::from_millis(50),
            locks.acquire("2024-01-01".to_string()),
        )
        .await;
        assert!(same.is_err());

        drop(held);
        let reacquired = tokio::time::timeout(
            Duration::from_millis(50),
            locks.acquire("2024-01-01".to_string()),
        )
        .await;
        assert!(reacquired.is_ok());
    }
}
