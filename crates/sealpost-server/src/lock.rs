//! Store lock interface.
//!
//! Every request serializes against one named lock around its load,
//! mutate, save cycle. The trait keeps the locking primitive swappable;
//! `MutexLock` covers tests and single-process deployments, while a
//! cross-process primitive is deployment plumbing behind the same seam.

use std::{
    sync::{Mutex, MutexGuard, TryLockError},
    thread,
    time::{Duration, Instant},
};

use thiserror::Error;

/// Lock acquisition failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LockError {
    /// The lock stayed held past the deadline.
    #[error("lock not acquired within {waited_ms}ms")]
    Timeout {
        /// How long the caller waited.
        waited_ms: u64,
    },
}

/// Named lock guarding the store files.
///
/// The guard is RAII; every exit path of a request releases it by drop.
pub trait StoreLock {
    /// Guard type holding the lock.
    type Guard<'a>
    where
        Self: 'a;

    /// Block until the lock is held or the timeout passes.
    ///
    /// # Errors
    ///
    /// [`LockError::Timeout`] when the deadline passes first.
    fn acquire(&self, timeout: Duration) -> Result<Self::Guard<'_>, LockError>;
}

/// In-process lock with deadline polling.
#[derive(Debug, Default)]
pub struct MutexLock {
    inner: Mutex<()>,
}

impl MutexLock {
    /// Fresh unheld lock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StoreLock for MutexLock {
    type Guard<'a> = MutexGuard<'a, ()>;

    fn acquire(&self, timeout: Duration) -> Result<Self::Guard<'_>, LockError> {
        let deadline = Instant::now() + timeout;

        loop {
            match self.inner.try_lock() {
                Ok(guard) => return Ok(guard),
                // A poisoned lock only means another thread panicked while
                // holding it; the guarded files carry their own integrity
                // checks, so take the lock anyway.
                Err(TryLockError::Poisoned(poisoned)) => return Ok(poisoned.into_inner()),
                Err(TryLockError::WouldBlock) => {}
            }

            if Instant::now() >= deadline {
                return Err(LockError::Timeout { waited_ms: timeout.as_millis() as u64 });
            }
            thread::sleep(Duration::from_millis(10));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_and_release() {
        let lock = MutexLock::new();
        {
            let _guard = lock.acquire(Duration::from_millis(100)).unwrap();
        }
        // Released by drop; acquirable again.
        let _guard = lock.acquire(Duration::from_millis(100)).unwrap();
    }

    #[test]
    fn held_lock_times_out() {
        let lock = MutexLock::new();
        let _guard = lock.acquire(Duration::from_millis(100)).unwrap();

        let err = lock.acquire(Duration::from_millis(30)).unwrap_err();
        assert_eq!(err, LockError::Timeout { waited_ms: 30 });
    }

    #[test]
    fn contended_lock_is_acquired_once_released() {
        let lock = std::sync::Arc::new(MutexLock::new());
        let guard = lock.acquire(Duration::from_millis(100)).unwrap();

        let waiter = {
            let lock = std::sync::Arc::clone(&lock);
            thread::spawn(move || lock.acquire(Duration::from_secs(2)).map(|_| ()))
        };

        thread::sleep(Duration::from_millis(50));
        drop(guard);

        waiter.join().unwrap().unwrap();
    }
}
