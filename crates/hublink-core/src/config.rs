//! Centralized Configuration Management
//!
//! Configuration structures for the callback bridge and the client
//! orchestrator, with named presets for common environments.

use crate::errors::{HubError, Result};
use crate::inbox::InboxCategory;
use core::time::Duration;
use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Bridge Configuration
// ----------------------------------------------------------------------------

/// Where bridged pipeline operations run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExecutionMode {
    /// On the tokio blocking pool, keeping the scheduler free while the operation runs
    #[default]
    WorkerThread,
    /// On the calling task; only for pipelines whose entry points never block
    Inline,
}

/// Configuration for the callback bridge
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub execution_mode: ExecutionMode,
}

// ----------------------------------------------------------------------------
// Logging Configuration
// ----------------------------------------------------------------------------

/// Console log levels understood by the client builder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive string for env-filter style subscribers
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

// ----------------------------------------------------------------------------
// Client Configuration
// ----------------------------------------------------------------------------

/// Configuration for a hub client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// How pipeline operations are dispatched
    pub bridge: BridgeConfig,
    /// Inbox categories whose pending items are discarded when the pipeline disconnects
    pub purge_on_disconnect: Vec<InboxCategory>,
    /// Deadline applied to outbound operations (connect, send, enable); `None` waits indefinitely
    pub operation_timeout: Option<Duration>,
    /// Console logging installed by the builder; `None` leaves logging to the application
    pub console_log_level: Option<LogLevel>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            bridge: BridgeConfig::default(),
            // Method requests are stale across a reconnect; application messages are not.
            purge_on_disconnect: vec![InboxCategory::MethodRequests],
            operation_timeout: None,
            console_log_level: None,
        }
    }
}

impl ClientConfig {
    /// Create configuration optimized for testing
    pub fn testing() -> Self {
        Self {
            operation_timeout: Some(Duration::from_secs(5)),
            ..Self::default()
        }
    }

    /// Discard every category of pending inbound item on disconnect
    pub fn strict_purge() -> Self {
        Self {
            purge_on_disconnect: InboxCategory::ALL.to_vec(),
            ..Self::default()
        }
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }

    pub fn with_execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.bridge.execution_mode = mode;
        self
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.operation_timeout == Some(Duration::ZERO) {
            return Err(HubError::config_error(
                "operation_timeout must be greater than zero",
            ));
        }
        let mut seen = Vec::with_capacity(self.purge_on_disconnect.len());
        for category in &self.purge_on_disconnect {
            if seen.contains(category) {
                return Err(HubError::config_error(format!(
                    "purge_on_disconnect lists {} more than once",
                    category
                )));
            }
            seen.push(*category);
        }
        Ok(())
    }

    /// Whether a disconnect discards pending items of `category`
    pub fn purges_on_disconnect(&self, category: InboxCategory) -> bool {
        self.purge_on_disconnect.contains(&category)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
