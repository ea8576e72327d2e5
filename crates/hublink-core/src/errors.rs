//! Error types for the hublink client core
//!
//! This module contains the error types used throughout the core: failures
//! reported by the pipeline collaborator, completion signal contract
//! violations, and the umbrella `HubError` type that unifies them.

use crate::pipeline::Feature;

// ----------------------------------------------------------------------------
// Specific Error Types
// ----------------------------------------------------------------------------

/// Failures reported by the pipeline through an operation callback
///
/// `Clone` because a single failure fulfills a completion signal that may
/// have several waiters, and each of them receives its own copy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error("Connection failed: {reason}")]
    ConnectionFailed { reason: String },
    #[error("Operation {operation} failed: {reason}")]
    OperationFailed { operation: String, reason: String },
    #[error("Feature {feature} could not be enabled: {reason}")]
    FeatureUnavailable { feature: Feature, reason: String },
    #[error("Pipeline is not connected")]
    NotConnected,
    #[error("Operation {operation} panicked before completing")]
    Panicked { operation: String },
    #[error("Operation {operation} dropped its callback without completing")]
    CallbackDropped { operation: String },
    #[error("Worker for operation {operation} could not be scheduled: {reason}")]
    WorkerUnavailable { operation: String, reason: String },
}

/// Completion signal contract violations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignalError {
    #[error("Completion signal for {operation} was already fulfilled")]
    AlreadyFulfilled { operation: String },
}

/// Core error type for hublink
#[derive(Debug, Clone, thiserror::Error)]
pub enum HubError {
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Signal error: {0}")]
    Signal(#[from] SignalError),

    /// An externally imposed deadline elapsed before the operation completed
    #[error("Operation {operation} timed out after {duration_ms}ms")]
    Timeout { operation: String, duration_ms: u64 },

    /// Configuration error
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },
}

// ----------------------------------------------------------------------------
// Convenience Error Constructors
// ----------------------------------------------------------------------------

impl PipelineError {
    /// Create an operation failure with a reason
    pub fn operation_failed<O: Into<String>, R: Into<String>>(operation: O, reason: R) -> Self {
        PipelineError::OperationFailed {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create a connection failure with a reason
    pub fn connection_failed<R: Into<String>>(reason: R) -> Self {
        PipelineError::ConnectionFailed {
            reason: reason.into(),
        }
    }

    /// Create a feature enablement failure
    pub fn feature_unavailable<R: Into<String>>(feature: Feature, reason: R) -> Self {
        PipelineError::FeatureUnavailable {
            feature,
            reason: reason.into(),
        }
    }
}

impl HubError {
    /// Create a configuration error with a reason
    pub fn config_error<T: Into<String>>(reason: T) -> Self {
        HubError::Configuration {
            reason: reason.into(),
        }
    }

    /// Create a timeout error for an operation
    pub fn timeout<O: Into<String>>(operation: O, duration_ms: u64) -> Self {
        HubError::Timeout {
            operation: operation.into(),
            duration_ms,
        }
    }

    /// The pipeline failure carried by this error, if any
    pub fn as_pipeline_error(&self) -> Option<&PipelineError> {
        match self {
            HubError::Pipeline(err) => Some(err),
            _ => None,
        }
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, HubError>;
pub type HubResult<T> = Result<T>;
pub type PipelineResult<T> = core::result::Result<T, PipelineError>;

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_error_display() {
        let err = PipelineError::operation_failed("send_d2c_message", "broker rejected publish");
        assert_eq!(
            err.to_string(),
            "Operation send_d2c_message failed: broker rejected publish"
        );

        let err = PipelineError::feature_unavailable(Feature::Methods, "subscription refused");
        assert_eq!(
            err.to_string(),
            "Feature methods could not be enabled: subscription refused"
        );
    }

    #[test]
    fn test_hub_error_keeps_pipeline_error_intact() {
        let original = PipelineError::connection_failed("tls handshake");
        let err: HubError = original.clone().into();
        assert_eq!(err.as_pipeline_error(), Some(&original));
        assert!(HubError::timeout("connect", 50).as_pipeline_error().is_none());
    }
}
