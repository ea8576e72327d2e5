//! hublink Core
//!
//! This crate bridges a callback-driven hub transport pipeline into async Rust:
//! - `CallbackBridge` turns a callback-taking pipeline operation into an
//!   awaitable `CompletionSignal`
//! - `InboxManager` demultiplexes unsolicited inbound events into per-key
//!   inboxes that consumers await individually
//! - `Pipeline` is the contract the transport underneath must honour

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod bridge;
pub mod config;
pub mod errors;
pub mod inbox;
pub mod models;
pub mod pipeline;
pub mod signal;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use bridge::{CallbackBridge, CompletionCallback};
pub use config::{BridgeConfig, ClientConfig, ExecutionMode, LogLevel};
pub use errors::{HubError, HubResult, PipelineError, PipelineResult, Result, SignalError};
pub use inbox::{
    CategoryInbox, Inbox, InboxCategory, InboxManager, InboxRouter, InboxStats, RouteTarget,
    RoutingPolicy,
};
pub use models::{InboundEvent, Message, MethodRequest, MethodResponse};
pub use pipeline::{
    ConnectionState, Feature, InboundHandler, OperationCallback, Pipeline, StateChangeHandler,
};
pub use signal::CompletionSignal;
