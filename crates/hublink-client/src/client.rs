//! Client Orchestrator
//!
//! `ClientCore` owns the pipeline handle, the inbox manager and the callback
//! bridge, and turns every outbound pipeline operation into an awaitable
//! call. `HubClient` exposes the operations shared by device and module
//! clients on top of it.

use async_trait::async_trait;
use hublink_core::{
    CallbackBridge, CategoryInbox, ClientConfig, ConnectionState, Feature, HubError, HubResult,
    InboundEvent, InboundHandler, InboxCategory, InboxManager, Message, MethodRequest,
    MethodResponse, OperationCallback, Pipeline, PipelineResult, StateChangeHandler,
};
use core::time::Duration;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Mutex;

#[cfg(not(feature = "std"))]
use log::{debug, info};
#[cfg(feature = "std")]
use tracing::{debug, info};

// ----------------------------------------------------------------------------
// Client Core
// ----------------------------------------------------------------------------

/// Shared machinery behind every client flavour
pub struct ClientCore {
    pipeline: Arc<dyn Pipeline>,
    inboxes: Arc<InboxManager>,
    bridge: CallbackBridge,
    state: Arc<RwLock<ConnectionState>>,
    /// Serializes feature enables so concurrent receivers trigger one enable
    enable_lock: Mutex<()>,
    config: ClientConfig,
}

impl ClientCore {
    /// Create a core and subscribe to the pipeline's inbound `categories`
    ///
    /// Connection state is always subscribed to.
    pub fn new(
        pipeline: Arc<dyn Pipeline>,
        config: ClientConfig,
        categories: &[InboxCategory],
    ) -> HubResult<Self> {
        config.validate()?;

        let inboxes = Arc::new(InboxManager::new());
        let state = Arc::new(RwLock::new(ConnectionState::Disconnected));

        for &category in categories {
            pipeline.on_inbound_event(category, route_handler(Arc::clone(&inboxes)));
        }
        pipeline.on_connection_state_change(state_handler(
            Arc::clone(&state),
            Arc::clone(&inboxes),
            config.purge_on_disconnect.clone(),
        ));

        Ok(Self {
            pipeline,
            inboxes,
            bridge: CallbackBridge::new(config.bridge.clone()),
            state,
            enable_lock: Mutex::new(()),
            config,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn inboxes(&self) -> &InboxManager {
        &self.inboxes
    }

    /// Last connection state reported by the pipeline
    pub fn connection_state(&self) -> ConnectionState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub async fn connect(&self) -> HubResult<()> {
        info!("Connecting to Hub...");
        self.run_operation("connect", |pipeline, callback| pipeline.connect(callback))
            .await?;
        info!("Successfully connected to Hub");
        Ok(())
    }

    pub async fn disconnect(&self) -> HubResult<()> {
        info!("Disconnecting from Hub...");
        self.run_operation("disconnect", |pipeline, callback| {
            pipeline.disconnect(callback)
        })
        .await?;
        info!("Successfully disconnected from Hub");
        Ok(())
    }

    /// Send a device-to-cloud message
    pub async fn send_message(&self, message: Message) -> HubResult<()> {
        debug!("Sending message {}", message.message_id);
        self.run_operation("send_d2c_message", move |pipeline, callback| {
            pipeline.send_d2c_message(message, callback)
        })
        .await
    }

    /// Send `message` to the module output `output_name`
    pub async fn send_to_output(&self, mut message: Message, output_name: &str) -> HubResult<()> {
        message.output_name = Some(output_name.to_string());
        debug!("Sending message {} to output {}", message.message_id, output_name);
        self.run_operation("send_output_event", move |pipeline, callback| {
            pipeline.send_output_event(message, callback)
        })
        .await
    }

    pub async fn send_method_response(&self, response: MethodResponse) -> HubResult<()> {
        debug!("Sending response to method request {}", response.request_id);
        self.run_operation("send_method_response", move |pipeline, callback| {
            pipeline.send_method_response(response, callback)
        })
        .await
    }

    /// Enable `feature` with the service unless the pipeline reports it enabled
    pub async fn ensure_feature(&self, feature: Feature) -> HubResult<()> {
        if self.pipeline.feature_enabled(feature) {
            return Ok(());
        }
        let _guard = self.enable_lock.lock().await;
        // Another receiver may have enabled it while we waited for the lock.
        if self.pipeline.feature_enabled(feature) {
            return Ok(());
        }
        info!("Enabling {} feature", feature);
        self.run_operation("enable_feature", move |pipeline, callback| {
            pipeline.enable_feature(feature, callback)
        })
        .await
    }

    /// Wait for the next inbound event of `category` addressed to `key`
    ///
    /// The category's feature is enabled first; if that fails the inbox is
    /// never consulted.
    pub async fn receive(&self, category: InboxCategory, key: Option<&str>) -> HubResult<InboundEvent> {
        self.ensure_feature(Feature::for_category(category)).await?;
        let inbox: CategoryInbox = self.inboxes.inbox_for(category, key);
        Ok(inbox.get().await)
    }

    /// Wait for a method request named `method_name`, or any unclaimed one when `None`
    pub async fn receive_method_request(&self, method_name: Option<&str>) -> HubResult<MethodRequest> {
        self.ensure_feature(Feature::Methods).await?;
        let inbox = self.inboxes.method_request_inbox(method_name);
        Ok(inbox.get().await)
    }

    pub async fn receive_c2d_message(&self) -> HubResult<Message> {
        self.ensure_feature(Feature::C2dMessages).await?;
        let inbox = self.inboxes.c2d_message_inbox();
        Ok(inbox.get().await)
    }

    /// Wait for a message on module input `input_name`, or an unnamed one when `None`
    pub async fn receive_input_message(&self, input_name: Option<&str>) -> HubResult<Message> {
        self.ensure_feature(Feature::InputMessages).await?;
        let inbox = self.inboxes.input_message_inbox(input_name);
        Ok(inbox.get().await)
    }

    /// Bridge a pipeline operation and wait for its callback, bounded by the operation timeout
    async fn run_operation<Op>(&self, operation: &'static str, op: Op) -> HubResult<()>
    where
        Op: FnOnce(&dyn Pipeline, OperationCallback) -> PipelineResult<()> + Send + 'static,
    {
        let pipeline = Arc::clone(&self.pipeline);
        let signal = self
            .bridge
            .emulate(operation, move |callback| op(pipeline.as_ref(), callback));

        match self.config.operation_timeout {
            Some(limit) => match tokio::time::timeout(limit, signal.await_result()).await {
                Ok(result) => result.map_err(HubError::from),
                Err(_) => Err(HubError::timeout(operation, duration_ms(limit))),
            },
            None => signal.await_result().await.map_err(HubError::from),
        }
    }
}

impl fmt::Debug for ClientCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCore")
            .field("state", &self.connection_state())
            .field("inboxes", &self.inboxes)
            .field("config", &self.config)
            .finish()
    }
}

/// Whole milliseconds in `limit`, saturating at `u64::MAX`
fn duration_ms(limit: Duration) -> u64 {
    u64::try_from(limit.as_millis()).unwrap_or(u64::MAX)
}

fn route_handler(inboxes: Arc<InboxManager>) -> InboundHandler {
    Arc::new(move |event: InboundEvent| {
        inboxes.route(event);
    })
}

fn state_handler(
    state: Arc<RwLock<ConnectionState>>,
    inboxes: Arc<InboxManager>,
    purge: Vec<InboxCategory>,
) -> StateChangeHandler {
    Arc::new(move |new_state: ConnectionState| {
        *state.write().unwrap_or_else(PoisonError::into_inner) = new_state;
        info!("Connection State - {}", new_state);
        if !new_state.is_disconnected() {
            return;
        }
        for &category in &purge {
            let dropped = inboxes.clear_category(category);
            match category {
                InboxCategory::MethodRequests => {
                    info!("Cleared pending method requests due to disconnect")
                }
                _ => info!("Cleared {} pending {} due to disconnect", dropped, category),
            }
        }
    })
}

// ----------------------------------------------------------------------------
// Hub Client Trait
// ----------------------------------------------------------------------------

/// Operations shared by device and module clients
#[async_trait]
pub trait HubClient: Send + Sync {
    fn core(&self) -> &ClientCore;

    async fn connect(&self) -> HubResult<()> {
        self.core().connect().await
    }

    async fn disconnect(&self) -> HubResult<()> {
        self.core().disconnect().await
    }

    /// Send telemetry; strings, bytes and JSON values are wrapped in a `Message`
    async fn send_message<M>(&self, message: M) -> HubResult<()>
    where
        M: Into<Message> + Send,
    {
        self.core().send_message(message.into()).await
    }

    async fn send_method_response(&self, response: MethodResponse) -> HubResult<()> {
        self.core().send_method_response(response).await
    }

    async fn receive_method_request(&self, method_name: Option<&str>) -> HubResult<MethodRequest> {
        self.core().receive_method_request(method_name).await
    }

    fn connection_state(&self) -> ConnectionState {
        self.core().connection_state()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
