use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

// Serializes cache population per key so that concurrent misses for the same key issue a single
// upstream call. Entries only live while someone holds or waits on them.
#[derive(Debug, Default)]
pub struct KeyLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

pub type KeyGuard = OwnedMutexGuard<()>;

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, key: &str) -> KeyGuard {
        let slot = {
            let mut locks = self.locks.lock().await;
            locks.retain(|_, m| Arc::strong_count(m) > 1);
            locks
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        slot.lock_owned().await
    }

    pub async fn in_flight(&self) -> usize {
        let locks = self.locks.lock().await;
        locks.values().filter(|m| Arc::strong_count(m) > 1).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_key_is_exclusive() {
        let locks = Arc::new(KeyLocks::new());
        let guard = locks.lock("overview:AAPL").await;

        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _g = locks.lock("overview:AAPL").await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn different_keys_do_not_block() {
        let locks = KeyLocks::new();
        let _a = locks.lock("overview:AAPL").await;
        let _b = locks.lock("overview:MSFT").await;
        assert_eq!(locks.in_flight().await, 2);
    }

    #[tokio::test]
    async fn released_keys_are_pruned() {
        let locks = KeyLocks::new();
        drop(locks.lock("earnings:AAPL").await);
        let _g = locks.lock("earnings:MSFT").await;
        assert_eq!(locks.locks.lock().await.len(), 1);
    }
}
