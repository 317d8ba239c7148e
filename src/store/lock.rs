//! Tenant configuration mutation lock.
//!
//! # Responsibilities
//! - Serialize every writer (pipeline runs, backing store writes, refreshes)
//! - Bound the wait so a stuck writer surfaces as an error, not a hang
//!
//! # Design Decisions
//! - Readers never take this lock; they read published snapshots
//! - Holding a [`MutationGuard`] is the proof required by
//!   `ConfigStore::apply`, so the pipeline cannot run unlocked

use std::time::{Duration, Instant};
use tokio::sync::{Mutex, MutexGuard};

use crate::observability::metrics;
use crate::store::types::{StoreError, StoreResult};

/// Single writer lock with a bounded acquisition wait.
#[derive(Debug)]
pub struct MutationLock {
    inner: Mutex<()>,
    timeout: Duration,
}

/// Held while mutating tenant configuration. Released on drop.
#[derive(Debug)]
pub struct MutationGuard<'a> {
    _guard: MutexGuard<'a, ()>,
    acquired_at: Instant,
}

impl MutationGuard<'_> {
    /// How long the lock has been held.
    pub fn held_for(&self) -> Duration {
        self.acquired_at.elapsed()
    }
}

impl MutationLock {
    pub fn new(timeout: Duration) -> Self {
        Self {
            inner: Mutex::new(()),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Wait up to the configured timeout for the lock.
    pub async fn acquire(&self) -> StoreResult<MutationGuard<'_>> {
        match tokio::time::timeout(self.timeout, self.inner.lock()).await {
            Ok(guard) => Ok(MutationGuard {
                _guard: guard,
                acquired_at: Instant::now(),
            }),
            Err(_) => {
                tracing::error!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Timed out waiting for tenant configuration lock"
                );
                metrics::record_lock_timeout();
                Err(StoreError::LockTimeout(self.timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_acquire_and_release() {
        let lock = MutationLock::new(Duration::from_millis(50));
        {
            let guard = lock.acquire().await.unwrap();
            assert!(guard.held_for() < Duration::from_secs(1));
        }
        assert!(lock.acquire().await.is_ok());
    }

    #[tokio::test]
    async fn test_second_writer_times_out() {
        let lock = MutationLock::new(Duration::from_millis(20));
        let _held = lock.acquire().await.unwrap();
        let err = lock.acquire().await.unwrap_err();
        assert!(matches!(err, StoreError::LockTimeout(d) if d == Duration::from_millis(20)));
    }
}
