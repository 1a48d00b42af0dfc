//! Per-key mutual exclusion.
//!
//! [`KeyLocks`] hands out an async mutex per storage key so that a
//! read-then-delete sequence on one key cannot interleave with another on
//! the same key. Operations on different keys never contend.
//!
//! The table is a [`DashMap`] from key to a mutex plus a count of callers
//! holding or waiting for it. The count is raised under the shard lock
//! before waiting and lowered by a drop guard, which also runs when a
//! waiting future is cancelled. The entry is removed when the count reaches
//! zero, so the table does not grow with the number of distinct keys ever
//! seen.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockTable = DashMap<String, LockSlot>;

#[derive(Default)]
struct LockSlot {
    mutex: Arc<Mutex<()>>,
    users: usize,
}

/// Table of per-key async locks.
#[derive(Clone, Default)]
pub struct KeyLocks {
    inner: Arc<LockTable>,
}

impl KeyLocks {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`.
    pub async fn lock(&self, key: &str) -> KeyGuard {
        // The shard lock is released before awaiting the mutex.
        let mutex = {
            let mut slot = self.inner.entry(key.to_string()).or_default();
            slot.users += 1;
            Arc::clone(&slot.mutex)
        };
        let registration = Registration {
            table: Arc::clone(&self.inner),
            key: key.to_string(),
        };

        let guard = mutex.lock_owned().await;
        KeyGuard {
            _guard: guard,
            _registration: registration,
        }
    }

    /// Number of keys currently locked or awaited.
    #[must_use]
    pub fn active(&self) -> usize {
        self.inner.len()
    }
}

/// One caller's claim on a table entry, held while waiting and while
/// locked.
struct Registration {
    table: Arc<LockTable>,
    key: String,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.table.remove_if_mut(&self.key, |_, slot| {
            slot.users -= 1;
            slot.users == 0
        });
    }
}

/// Exclusive access to one key; released on drop.
pub struct KeyGuard {
    // Field order matters: the mutex is unlocked before the registration
    // is released.
    _guard: OwnedMutexGuard<()>,
    _registration: Registration,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn released_keys_are_reclaimed() {
        let locks = KeyLocks::new();
        {
            let _a = locks.lock("a").await;
            let _b = locks.lock("b").await;
            assert_eq!(locks.active(), 2);
        }
        assert_eq!(locks.active(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn same_key_is_exclusive() {
        let locks = KeyLocks::new();
        let inside = Arc::new(AtomicU32::new(0));
        let max_seen = Arc::new(AtomicU32::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let locks = locks.clone();
                let inside = Arc::clone(&inside);
                let max_seen = Arc::clone(&max_seen);
                tokio::spawn(async move {
                    let _guard = locks.lock("otp/same").await;
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(locks.active(), 0);
    }

    #[tokio::test]
    async fn different_keys_do_not_block() {
        let locks = KeyLocks::new();
        let _a = locks.lock("a").await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.lock("b")).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn cancelled_waiter_after_release_is_reclaimed() {
        let locks = KeyLocks::new();
        let held = locks.lock("otp/k").await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock("otp/k").await;
            })
        };
        tokio::task::yield_now().await;
        assert_eq!(locks.active(), 1);

        drop(held);
        waiter.abort();
        let _ = waiter.await;

        assert_eq!(locks.active(), 0);
    }

    #[tokio::test]
    async fn cancelled_waiter_while_held_is_reclaimed() {
        let locks = KeyLocks::new();
        let held = locks.lock("otp/k").await;

        let timed_out =
            tokio::time::timeout(Duration::from_millis(20), locks.lock("otp/k")).await;
        assert!(timed_out.is_err());
        assert_eq!(locks.active(), 1);

        drop(held);
        assert_eq!(locks.active(), 0);

        // The key is usable again afterwards.
        let _again = locks.lock("otp/k").await;
        assert_eq!(locks.active(), 1);
    }
}
