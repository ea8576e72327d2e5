//! Completion Signal
//!
//! A single-assignment result cell with suspend-until-set semantics. The
//! producer side (usually a pipeline callback running on a foreign thread)
//! fulfills it once; any number of tasks may await the result.

use crate::errors::{PipelineResult, SignalError};
use std::fmt;
use std::sync::{Arc, OnceLock};
use tokio::sync::Notify;

#[cfg(not(feature = "std"))]
use log::{trace, warn};
#[cfg(feature = "std")]
use tracing::{trace, warn};

// ----------------------------------------------------------------------------
// Completion Signal
// ----------------------------------------------------------------------------

/// Single-assignment, multi-waiter result cell
///
/// Cloning yields another handle to the same cell. The transition from
/// pending to fulfilled happens exactly once and is irreversible.
pub struct CompletionSignal<T> {
    inner: Arc<SignalInner<T>>,
}

struct SignalInner<T> {
    operation: String,
    slot: OnceLock<PipelineResult<T>>,
    notify: Notify,
}

impl<T> CompletionSignal<T> {
    /// Create a pending signal labelled with the operation it tracks
    pub fn new<O: Into<String>>(operation: O) -> Self {
        Self {
            inner: Arc::new(SignalInner {
                operation: operation.into(),
                slot: OnceLock::new(),
                notify: Notify::new(),
            }),
        }
    }

    /// Operation label used in logs and errors
    pub fn operation(&self) -> &str {
        &self.inner.operation
    }

    /// Whether a result has been stored
    pub fn is_fulfilled(&self) -> bool {
        self.inner.slot.get().is_some()
    }

    /// Store the result and wake every waiter
    ///
    /// A second call is a contract violation of the producer: it is logged,
    /// rejected, and the first result stays in place.
    pub fn fulfill(&self, result: PipelineResult<T>) -> Result<(), SignalError> {
        if self.store(result) {
            Ok(())
        } else {
            warn!(
                "Completion signal for {} fulfilled twice; keeping the first result",
                self.inner.operation
            );
            Err(SignalError::AlreadyFulfilled {
                operation: self.inner.operation.clone(),
            })
        }
    }

    /// Fulfill only if still pending, without treating a lost race as a violation
    ///
    /// Used by the bridge for its fallback paths, where the callback may
    /// legitimately have fired before the operation returned.
    pub(crate) fn fulfill_if_pending(&self, result: PipelineResult<T>) -> bool {
        self.store(result)
    }

    fn store(&self, result: PipelineResult<T>) -> bool {
        if self.inner.slot.set(result).is_err() {
            return false;
        }
        trace!("Completion signal for {} fulfilled", self.inner.operation);
        self.inner.notify.notify_waiters();
        true
    }
}

impl<T: Clone> CompletionSignal<T> {
    /// Suspend until the signal is fulfilled and return its result
    ///
    /// A failure stored in the signal is returned as `Err` to every waiter.
    pub async fn await_result(&self) -> PipelineResult<T> {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // Register before checking the slot so a concurrent fulfill cannot be missed.
            notified.as_mut().enable();

            if let Some(result) = self.inner.slot.get() {
                return result.clone();
            }
            notified.await;
        }
    }

    /// Stored result, if any, without suspending
    pub fn try_result(&self) -> Option<PipelineResult<T>> {
        self.inner.slot.get().cloned()
    }
}

impl<T> Clone for CompletionSignal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for CompletionSignal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionSignal")
            .field("operation", &self.inner.operation)
            .field("fulfilled", &self.is_fulfilled())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
