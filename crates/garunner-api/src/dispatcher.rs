//! Bounded dispatcher for outbound calls
//!
//! Keeps the number of concurrently running remote calls at or below a fixed
//! ceiling. Calls beyond the ceiling wait their turn in arrival order; when a
//! running call finishes, its slot goes to the oldest waiter, so the ceiling
//! stays saturated while work remains and the in-flight count never exceeds
//! it.
//!
//! ## Architecture
//!
//! - [`Dispatcher`]: cheap-to-clone handle over a fair `tokio::sync::Semaphore`
//!   with one permit per slot, plus a counter of waiting calls used to bound
//!   the backlog
//! - [`DispatchPermit`]: RAII slot; dropping it returns the slot
//!
//! A waiter whose future is dropped leaves the semaphore queue and the
//! backlog count at once, so cancelled calls never hold up or crowd out live
//! ones.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use garunner_api::dispatcher::Dispatcher;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let dispatcher = Dispatcher::new(10, Some(1000));
//! let answer = dispatcher.submit(async { 42 }).await?;
//! assert_eq!(answer, 42);
//! # Ok(())
//! # }
//! ```

use std::{
    future::Future,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use garunner_core::domain::QueryError;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

/// Errors returned when a call cannot be admitted
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    /// The waiter queue already holds `limit` calls
    #[error("Dispatcher backlog full ({limit} calls already queued)")]
    BacklogFull { limit: usize },

    /// The dispatcher's semaphore was closed
    #[error("Dispatcher closed")]
    Closed,
}

impl From<DispatchError> for QueryError {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::BacklogFull { limit } => QueryError::Backlog { limit },
            DispatchError::Closed => QueryError::Network(e.to_string()),
        }
    }
}

// ============================================================================
// Shared state
// ============================================================================

#[derive(Debug)]
struct Inner {
    limit: usize,
    queue_limit: Option<usize>,
    /// One permit per slot
    semaphore: Arc<Semaphore>,
    /// Calls currently waiting for a permit
    waiting: AtomicUsize,
}

impl Inner {
    /// Counts the caller as waiting, unless the backlog is full.
    fn join_backlog(&self) -> Result<WaitGuard<'_>, DispatchError> {
        match self.queue_limit {
            Some(limit) => {
                self.waiting
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                        (n < limit).then_some(n + 1)
                    })
                    .map_err(|_| DispatchError::BacklogFull { limit })?;
            }
            None => {
                self.waiting.fetch_add(1, Ordering::SeqCst);
            }
        }
        Ok(WaitGuard(&self.waiting))
    }
}

/// Removes a waiter from the backlog count when it is admitted or dropped.
struct WaitGuard<'a>(&'a AtomicUsize);

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

// ============================================================================
// DispatchPermit
// ============================================================================

/// A held dispatcher slot. The slot is released when the permit is dropped.
#[derive(Debug)]
pub struct DispatchPermit {
    _permit: OwnedSemaphorePermit,
}

// ============================================================================
// Dispatcher
// ============================================================================

/// FIFO admission control for outbound calls
#[derive(Debug, Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    /// Creates a dispatcher admitting at most `limit` concurrent calls.
    ///
    /// `queue_limit` bounds the number of waiting calls; `None` leaves the
    /// queue unbounded. A `limit` of zero is treated as one.
    pub fn new(limit: usize, queue_limit: Option<usize>) -> Self {
        let limit = limit.max(1);
        Self {
            inner: Arc::new(Inner {
                limit,
                queue_limit,
                semaphore: Arc::new(Semaphore::new(limit)),
                waiting: AtomicUsize::new(0),
            }),
        }
    }

    /// Waits for a slot.
    ///
    /// Returns immediately when fewer than `limit` calls are running.
    /// Otherwise the caller joins the back of the queue, or is rejected with
    /// [`DispatchError::BacklogFull`] if the queue is at its limit.
    pub async fn acquire(&self) -> Result<DispatchPermit, DispatchError> {
        // The semaphore is fair: while calls are queued no permit is
        // available here, so this never overtakes a waiter.
        if let Ok(permit) = Arc::clone(&self.inner.semaphore).try_acquire_owned() {
            return Ok(DispatchPermit { _permit: permit });
        }

        let _waiting = self.inner.join_backlog()?;
        debug!(
            in_flight = self.in_flight(),
            queued = self.queued(),
            "Dispatcher at capacity, queued call"
        );

        let permit = Arc::clone(&self.inner.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| DispatchError::Closed)?;
        Ok(DispatchPermit { _permit: permit })
    }

    /// Runs `fut` once a slot is available, releasing the slot when it completes.
    pub async fn submit<F, T>(&self, fut: F) -> Result<T, DispatchError>
    where
        F: Future<Output = T>,
    {
        let _permit = self.acquire().await?;
        Ok(fut.await)
    }

    /// Number of calls currently holding a slot
    pub fn in_flight(&self) -> usize {
        self.inner
            .limit
            .saturating_sub(self.inner.semaphore.available_permits())
    }

    /// Number of calls waiting for a slot
    pub fn queued(&self) -> usize {
        self.inner.waiting.load(Ordering::SeqCst)
    }

    /// Concurrency ceiling
    pub fn limit(&self) -> usize {
        self.inner.limit
    }

    /// Maximum number of waiting calls, if bounded
    pub fn queue_limit(&self) -> Option<usize> {
        self.inner.queue_limit
    }
}
