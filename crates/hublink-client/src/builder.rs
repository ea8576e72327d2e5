//! Client Builder API
//!
//! Builder-style construction of device and module clients over a pipeline,
//! with optional console logging for applications that do not install their
//! own subscriber.

use crate::{device::DeviceClient, module::ModuleClient};
use core::time::Duration;
use hublink_core::{ClientConfig, ExecutionMode, HubResult, LogLevel, Pipeline};
use std::sync::Arc;

#[cfg(not(feature = "std"))]
use log::{info, warn};
#[cfg(feature = "std")]
use tracing::{debug, info};

// ----------------------------------------------------------------------------
// Client Builder
// ----------------------------------------------------------------------------

/// Builder for hub clients
pub struct ClientBuilder {
    pipeline: Arc<dyn Pipeline>,
    config: ClientConfig,
}

impl ClientBuilder {
    /// Create a builder over `pipeline` with the default configuration
    pub fn new(pipeline: Arc<dyn Pipeline>) -> Self {
        Self {
            pipeline,
            config: ClientConfig::default(),
        }
    }

    /// Replace the whole client configuration
    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Install a console subscriber at `level` when the client is built
    pub fn with_console_logging(mut self, level: LogLevel) -> Self {
        self.config.console_log_level = Some(level);
        self
    }

    /// Leave logging setup to the application
    pub fn with_no_logging(mut self) -> Self {
        self.config.console_log_level = None;
        self
    }

    /// Bound every outbound operation by `timeout`
    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.config.operation_timeout = Some(timeout);
        self
    }

    pub fn execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.config.bridge.execution_mode = mode;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn build_device_client(self) -> HubResult<DeviceClient> {
        self.prepare();
        info!("Building device client");
        DeviceClient::new(self.pipeline, self.config)
    }

    pub fn build_module_client(self) -> HubResult<ModuleClient> {
        self.prepare();
        info!("Building module client");
        ModuleClient::new(self.pipeline, self.config)
    }

    fn prepare(&self) {
        if let Some(level) = self.config.console_log_level {
            init_console_logging(level);
        }
    }
}

impl core::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("config", &self.config)
            .finish()
    }
}

fn init_console_logging(level: LogLevel) {
    cfg_if::cfg_if! {
        if #[cfg(feature = "std")] {
            let max_level = match level {
                LogLevel::Trace => tracing::Level::TRACE,
                LogLevel::Debug => tracing::Level::DEBUG,
                LogLevel::Info => tracing::Level::INFO,
                LogLevel::Warn => tracing::Level::WARN,
                LogLevel::Error => tracing::Level::ERROR,
            };
            let installed = tracing_subscriber::fmt()
                .with_max_level(max_level)
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .try_init();
            if installed.is_err() {
                debug!("A global subscriber is already installed; keeping it");
            }
        } else {
            warn!(
                "Console logging at {} needs the std feature; skipping",
                level.as_directive()
            );
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
