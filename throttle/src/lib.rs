//! Admission control for concurrent filer transfers
//!
//! This crate provides the gate that bounds how many transfers a client runs at the same time.
//! Every unit of work (a payload read plus an HTTP upload, or an HTTP download plus a local
//! write) holds one permit for its whole I/O section.
//!
//! # Usage
//!
//! ```rust,no_run
//! use throttle::Limiter;
//!
//! # async fn example() {
//! // at most 10 transfers in flight
//! let limiter = Limiter::new(10);
//!
//! let _permit = limiter.acquire().await;
//! // perform the transfer here - the permit is released when the guard is dropped
//! # }
//! ```
//!
//! # Semantics
//!
//! - A capacity of `0` disables the limit: `acquire` returns immediately with an empty guard.
//! - Cloning a [`Limiter`] shares the underlying permits, so every clone counts against the same
//!   budget.
//! - Permits are released when the [`TransferPermit`] guard is dropped, on every exit path
//!   including errors, early returns and aborted tasks.
//! - Admission order is the semaphore's FIFO queue; no other ordering is promised.

mod semaphore;

use std::sync::Arc;

/// Default number of concurrent transfers for a client.
pub const DEFAULT_MAX_CONCURRENT_TRANSFERS: usize = 100;

/// Fixed-capacity admission gate shared by all transfers of one client.
#[derive(Debug, Clone)]
pub struct Limiter {
    sem: Arc<semaphore::Semaphore>,
}

/// Scoped permit; dropping it returns the permit to its [`Limiter`].
#[derive(Debug)]
pub struct TransferPermit {
    _permit: Option<tokio::sync::OwnedSemaphorePermit>,
}

impl Limiter {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        if capacity == 0 {
            tracing::debug!("transfer limiter disabled");
        }
        Self {
            sem: Arc::new(semaphore::Semaphore::new(capacity)),
        }
    }

    /// A limiter that never blocks.
    #[must_use]
    pub fn unlimited() -> Self {
        Self::new(0)
    }

    /// Configured capacity, `0` when the limit is disabled.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.sem.capacity()
    }

    #[must_use]
    pub fn is_limited(&self) -> bool {
        self.sem.enabled()
    }

    /// Permits not currently held. Meaningless for an unlimited limiter.
    #[must_use]
    pub fn available(&self) -> usize {
        self.sem.available_permits()
    }

    /// Wait until a permit is available.
    pub async fn acquire(&self) -> TransferPermit {
        TransferPermit {
            _permit: self.sem.acquire().await,
        }
    }

    /// Take a permit only if one is free right now.
    #[must_use]
    pub fn try_acquire(&self) -> Option<TransferPermit> {
        self.sem
            .try_acquire()
            .map(|permit| TransferPermit { _permit: permit })
    }
}

impl Default for Limiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENT_TRANSFERS)
    }
}
