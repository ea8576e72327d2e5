//! Callback Bridge
//!
//! Converts a callback-taking pipeline operation into a `CompletionSignal`
//! that async code can await. The operation is run off the scheduler (on the
//! tokio blocking pool by default) so a pipeline entry point that blocks never
//! stalls other tasks.
//!
//! Every path out of an operation ends in exactly one fulfillment:
//! - the operation completes its callback (from any thread, now or later)
//! - the operation returns an error before completing the callback
//! - the operation panics
//! - the callback handle is dropped without ever being completed

use crate::config::{BridgeConfig, ExecutionMode};
use crate::errors::{PipelineError, PipelineResult};
use crate::signal::CompletionSignal;
use core::sync::atomic::{AtomicU8, Ordering};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

#[cfg(not(feature = "std"))]
use log::{debug, warn};
#[cfg(feature = "std")]
use tracing::{debug, warn};

// ----------------------------------------------------------------------------
// Completion Callback
// ----------------------------------------------------------------------------

/// Callback handed to a bridged operation
///
/// Consumed by `complete`, so a well-behaved operation cannot fire it twice.
/// Dropping it unfired completes the signal with `CallbackDropped`, unless
/// the operation is still running, in which case the bridge decides the
/// outcome once the operation returns.
pub struct CompletionCallback<T> {
    signal: Option<CompletionSignal<T>>,
    phase: Arc<AtomicU8>,
}

const PHASE_RUNNING: u8 = 0;
const PHASE_RETURNED: u8 = 1;
const PHASE_DROPPED_WHILE_RUNNING: u8 = 2;

impl<T> CompletionCallback<T> {
    pub(crate) fn new(signal: CompletionSignal<T>, phase: Arc<AtomicU8>) -> Self {
        Self {
            signal: Some(signal),
            phase,
        }
    }

    /// Report the outcome of the operation
    pub fn complete(mut self, result: PipelineResult<T>) {
        if let Some(signal) = self.signal.take() {
            // A rejected fulfill is already logged by the signal.
            let _ = signal.fulfill(result);
        }
    }

    /// Report a failed outcome
    pub fn fail(self, error: PipelineError) {
        self.complete(Err(error));
    }

    /// Label of the operation this callback belongs to
    pub fn operation(&self) -> &str {
        self.signal
            .as_ref()
            .map(CompletionSignal::operation)
            .unwrap_or_default()
    }
}

impl CompletionCallback<()> {
    /// Report a successful outcome with no payload
    pub fn succeed(self) {
        self.complete(Ok(()));
    }
}

impl<T> Drop for CompletionCallback<T> {
    fn drop(&mut self) {
        let Some(signal) = self.signal.take() else {
            return;
        };
        if self
            .phase
            .compare_exchange(
                PHASE_RUNNING,
                PHASE_DROPPED_WHILE_RUNNING,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
        {
            return;
        }
        let operation = signal.operation().to_string();
        let error = if std::thread::panicking() {
            PipelineError::Panicked {
                operation: operation.clone(),
            }
        } else {
            PipelineError::CallbackDropped {
                operation: operation.clone(),
            }
        };
        if signal.fulfill_if_pending(Err(error)) {
            warn!("Callback for {} dropped without completing", operation);
        }
    }
}

impl<T> fmt::Debug for CompletionCallback<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionCallback")
            .field("operation", &self.operation())
            .field("completed", &self.signal.is_none())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Callback Bridge
// ----------------------------------------------------------------------------

/// Runs callback-taking operations and exposes their outcome as a signal
#[derive(Debug, Clone, Default)]
pub struct CallbackBridge {
    config: BridgeConfig,
}

impl CallbackBridge {
    pub fn new(config: BridgeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Start `op` and return the signal its callback will fulfill
    ///
    /// In `WorkerThread` mode this must be called from within a tokio runtime;
    /// outside of one the signal is fulfilled with `WorkerUnavailable`.
    pub fn emulate<T, Op>(&self, operation: &str, op: Op) -> CompletionSignal<T>
    where
        T: Send + Sync + 'static,
        Op: FnOnce(CompletionCallback<T>) -> PipelineResult<()> + Send + 'static,
    {
        let signal = CompletionSignal::new(operation);
        let phase = Arc::new(AtomicU8::new(PHASE_RUNNING));
        let callback = CompletionCallback::new(signal.clone(), Arc::clone(&phase));
        let fallback = signal.clone();

        match self.config.execution_mode {
            ExecutionMode::WorkerThread => match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    debug!("Dispatching {} to blocking worker", operation);
                    handle.spawn_blocking(move || run_operation(op, callback, fallback, phase));
                }
                Err(err) => {
                    fallback.fulfill_if_pending(Err(PipelineError::WorkerUnavailable {
                        operation: operation.to_string(),
                        reason: err.to_string(),
                    }));
                    drop(callback);
                }
            },
            ExecutionMode::Inline => {
                debug!("Running {} inline", operation);
                run_operation(op, callback, fallback, phase);
            }
        }

        signal
    }

    /// Start `op` and suspend until its callback fires
    pub async fn call<T, Op>(&self, operation: &str, op: Op) -> PipelineResult<T>
    where
        T: Clone + Send + Sync + 'static,
        Op: FnOnce(CompletionCallback<T>) -> PipelineResult<()> + Send + 'static,
    {
        self.emulate(operation, op).await_result().await
    }
}

fn run_operation<T, Op>(
    op: Op,
    callback: CompletionCallback<T>,
    fallback: CompletionSignal<T>,
    phase: Arc<AtomicU8>,
) where
    Op: FnOnce(CompletionCallback<T>) -> PipelineResult<()>,
{
    let outcome = panic::catch_unwind(AssertUnwindSafe(move || op(callback)));
    let dropped_unfired =
        phase.swap(PHASE_RETURNED, Ordering::AcqRel) == PHASE_DROPPED_WHILE_RUNNING;
    let operation = fallback.operation().to_string();

    match outcome {
        Ok(Ok(())) if dropped_unfired => {
            let dropped = PipelineError::CallbackDropped {
                operation: operation.clone(),
            };
            if fallback.fulfill_if_pending(Err(dropped)) {
                warn!("Callback for {} dropped without completing", operation);
            }
        }
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            if !fallback.fulfill_if_pending(Err(err.clone())) {
                warn!(
                    "{} failed synchronously after completing its callback: {}",
                    operation, err
                );
            }
        }
        Err(_) => {
            fallback.fulfill_if_pending(Err(PipelineError::Panicked { operation }));
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
