//! Pipeline Collaborator Interface
//!
//! Defines the contract between the client core and the transport pipeline
//! underneath it. The pipeline owns connection establishment, framing,
//! authentication and retry; the core only drives it through callback-taking
//! entry points and listens to the events it publishes.

use crate::bridge::CompletionCallback;
use crate::errors::PipelineResult;
use crate::inbox::InboxCategory;
use crate::models::{InboundEvent, Message, MethodResponse};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

// ----------------------------------------------------------------------------
// Features
// ----------------------------------------------------------------------------

/// Optional service capabilities that must be enabled before first use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Feature {
    #[serde(rename = "methods")]
    Methods,
    #[serde(rename = "c2d")]
    C2dMessages,
    #[serde(rename = "input")]
    InputMessages,
}

impl Feature {
    /// Feature gating receives on an inbox category
    pub fn for_category(category: InboxCategory) -> Self {
        match category {
            InboxCategory::MethodRequests => Feature::Methods,
            InboxCategory::C2dMessages => Feature::C2dMessages,
            InboxCategory::InputMessages => Feature::InputMessages,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Feature::Methods => "methods",
            Feature::C2dMessages => "c2d",
            Feature::InputMessages => "input",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ----------------------------------------------------------------------------
// Connection State
// ----------------------------------------------------------------------------

/// Connection state reported by the pipeline
///
/// The core only reacts to `Disconnected`; the other values are recorded
/// for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

impl ConnectionState {
    pub fn is_disconnected(&self) -> bool {
        matches!(self, ConnectionState::Disconnected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Disconnecting => write!(f, "disconnecting"),
        }
    }
}

// ----------------------------------------------------------------------------
// Handler Types
// ----------------------------------------------------------------------------

/// Callback handed to every outbound pipeline operation
pub type OperationCallback = CompletionCallback<()>;

/// Subscriber for inbound events of one category
pub type InboundHandler = Arc<dyn Fn(InboundEvent) + Send + Sync>;

/// Subscriber for connection state changes
pub type StateChangeHandler = Arc<dyn Fn(ConnectionState) + Send + Sync>;

// ----------------------------------------------------------------------------
// Pipeline Trait
// ----------------------------------------------------------------------------

/// Transport pipeline driven by the client core
///
/// ## Contract
///
/// - Each outbound entry point either returns an error synchronously, or takes
///   ownership of the callback and completes it exactly once, from any thread.
/// - Entry points may block; the callback bridge runs them off the scheduler.
/// - Inbound handlers and the state change handler may be invoked from any
///   thread, at any time after they are registered.
pub trait Pipeline: Send + Sync {
    /// Open the connection to the hub
    fn connect(&self, callback: OperationCallback) -> PipelineResult<()>;

    /// Close the connection to the hub
    fn disconnect(&self, callback: OperationCallback) -> PipelineResult<()>;

    /// Send a device-to-cloud telemetry message
    fn send_d2c_message(&self, message: Message, callback: OperationCallback) -> PipelineResult<()>;

    /// Send a message to a module output
    fn send_output_event(&self, message: Message, callback: OperationCallback) -> PipelineResult<()>;

    /// Answer a previously received method request
    fn send_method_response(
        &self,
        response: MethodResponse,
        callback: OperationCallback,
    ) -> PipelineResult<()>;

    /// Enable a feature with the service
    fn enable_feature(&self, feature: Feature, callback: OperationCallback) -> PipelineResult<()>;

    /// Whether a feature has already been enabled
    fn feature_enabled(&self, feature: Feature) -> bool;

    /// Subscribe to inbound events of a category, replacing any previous subscriber
    fn on_inbound_event(&self, category: InboxCategory, handler: InboundHandler);

    /// Subscribe to connection state changes, replacing any previous subscriber
    fn on_connection_state_change(&self, handler: StateChangeHandler);
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
