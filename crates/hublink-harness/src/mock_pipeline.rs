//! Mock Pipeline for Testing
//!
//! Provides a deterministic, scriptable `Pipeline` implementation for testing
//! clients without a hub. Supports immediate, threaded and manually driven
//! callback completion, injected failures, feature flags, and delivery of
//! inbound events and connection state changes.

use hublink_core::{
    ConnectionState, Feature, InboundEvent, InboundHandler, InboxCategory, Message,
    MethodRequest, MethodResponse, OperationCallback, Pipeline, PipelineError, PipelineResult,
    StateChangeHandler,
};
use std::{
    collections::{HashMap, HashSet, VecDeque},
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex, MutexGuard, PoisonError,
    },
    time::Duration,
};

#[cfg(not(feature = "std"))]
use log::{debug, info};
#[cfg(feature = "std")]
use tracing::{debug, info};

// ----------------------------------------------------------------------------
// Mock Pipeline Configuration
// ----------------------------------------------------------------------------

/// When the mock completes operation callbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionMode {
    /// Inside the operation call, on the calling thread
    Immediate,
    /// From a separate thread after `delay`
    Threaded { delay: Duration },
    /// Held until the test calls `complete_next`
    Manual,
}

/// Configuration for mock pipeline behavior
#[derive(Debug, Clone)]
pub struct MockPipelineConfig {
    pub completion_mode: CompletionMode,
    /// Emit connection state notifications when connect/disconnect succeed
    pub notify_state_changes: bool,
}

impl Default for MockPipelineConfig {
    fn default() -> Self {
        Self {
            completion_mode: CompletionMode::Immediate,
            notify_state_changes: true,
        }
    }
}

impl MockPipelineConfig {
    /// Callbacks fire from a foreign thread, like a network stack's I/O thread
    pub fn threaded() -> Self {
        Self {
            completion_mode: CompletionMode::Threaded {
                delay: Duration::from_millis(5),
            },
            ..Self::default()
        }
    }

    /// Callbacks are held until completed explicitly
    pub fn manual() -> Self {
        Self {
            completion_mode: CompletionMode::Manual,
            ..Self::default()
        }
    }
}

// ----------------------------------------------------------------------------
// Recorded Calls
// ----------------------------------------------------------------------------

/// Outbound operation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Connect,
    Disconnect,
    SendD2cMessage,
    SendOutputEvent,
    SendMethodResponse,
    EnableFeature,
}

/// An outbound call received by the mock
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineCall {
    Connect,
    Disconnect,
    SendD2cMessage(Message),
    SendOutputEvent(Message),
    SendMethodResponse(MethodResponse),
    EnableFeature(Feature),
}

impl PipelineCall {
    pub fn kind(&self) -> OperationKind {
        match self {
            PipelineCall::Connect => OperationKind::Connect,
            PipelineCall::Disconnect => OperationKind::Disconnect,
            PipelineCall::SendD2cMessage(_) => OperationKind::SendD2cMessage,
            PipelineCall::SendOutputEvent(_) => OperationKind::SendOutputEvent,
            PipelineCall::SendMethodResponse(_) => OperationKind::SendMethodResponse,
            PipelineCall::EnableFeature(_) => OperationKind::EnableFeature,
        }
    }
}

#[derive(Debug, Default)]
pub struct MockPipelineStats {
    pub operations_started: AtomicU64,
    pub operations_completed: AtomicU64,
    pub operations_failed: AtomicU64,
    pub events_delivered: AtomicU64,
    pub events_dropped: AtomicU64,
}

// ----------------------------------------------------------------------------
// Mock Pipeline Implementation
// ----------------------------------------------------------------------------

/// Mock pipeline for deterministic testing
pub struct MockPipeline {
    config: MockPipelineConfig,
    calls: Mutex<Vec<PipelineCall>>,
    features: Mutex<HashSet<Feature>>,
    /// Failures reported through the callback, consumed in order per operation
    callback_failures: Mutex<HashMap<OperationKind, VecDeque<PipelineError>>>,
    /// Failures returned synchronously, consumed in order per operation
    sync_failures: Mutex<HashMap<OperationKind, VecDeque<PipelineError>>>,
    pending: Mutex<VecDeque<PendingOperation>>,
    inbound_handlers: Mutex<HashMap<InboxCategory, InboundHandler>>,
    state_handler: Mutex<Option<StateChangeHandler>>,
    state: Mutex<ConnectionState>,
    stats: MockPipelineStats,
}

struct PendingOperation {
    call: PipelineCall,
    callback: OperationCallback,
}

impl MockPipeline {
    /// Create a new mock pipeline
    pub fn new(config: MockPipelineConfig) -> Self {
        Self {
            config,
            calls: Mutex::new(Vec::new()),
            features: Mutex::new(HashSet::new()),
            callback_failures: Mutex::new(HashMap::new()),
            sync_failures: Mutex::new(HashMap::new()),
            pending: Mutex::new(VecDeque::new()),
            inbound_handlers: Mutex::new(HashMap::new()),
            state_handler: Mutex::new(None),
            state: Mutex::new(ConnectionState::Disconnected),
            stats: MockPipelineStats::default(),
        }
    }

    /// Create a mock that completes every callback immediately
    pub fn immediate() -> Self {
        Self::new(MockPipelineConfig::default())
    }

    /// Create a mock that completes callbacks from a separate thread
    pub fn threaded() -> Self {
        Self::new(MockPipelineConfig::threaded())
    }

    /// Create a mock whose callbacks are completed by the test
    pub fn manual() -> Self {
        Self::new(MockPipelineConfig::manual())
    }

    // ------------------------------------------------------------------------
    // Scripting
    // ------------------------------------------------------------------------

    /// Make the next `kind` operation report `error` through its callback
    ///
    /// Applies in `Immediate` and `Threaded` modes.
    pub fn fail_next(&self, kind: OperationKind, error: PipelineError) {
        lock(&self.callback_failures)
            .entry(kind)
            .or_default()
            .push_back(error);
    }

    /// Make the next `kind` operation return `error` without taking its callback
    pub fn reject_next(&self, kind: OperationKind, error: PipelineError) {
        lock(&self.sync_failures)
            .entry(kind)
            .or_default()
            .push_back(error);
    }

    pub fn set_feature_enabled(&self, feature: Feature, enabled: bool) {
        let mut features = lock(&self.features);
        if enabled {
            features.insert(feature);
        } else {
            features.remove(&feature);
        }
    }

    /// Complete the oldest held operation with `result`
    ///
    /// Scripted callback failures do not apply to held operations; the test
    /// chooses the outcome here.
    ///
    /// Returns the call that was completed, or `None` if nothing was held.
    pub fn complete_next(&self, result: PipelineResult<()>) -> Option<PipelineCall> {
        let pending = lock(&self.pending).pop_front()?;
        let PendingOperation { call, callback } = pending;
        self.finish(call.clone(), callback, result);
        Some(call)
    }

    /// Number of operations held in manual mode
    pub fn pending_operations(&self) -> usize {
        lock(&self.pending).len()
    }

    // ------------------------------------------------------------------------
    // Inbound Traffic
    // ------------------------------------------------------------------------

    /// Publish an inbound event to the subscriber of its category
    ///
    /// Returns false if nobody subscribed to the category.
    pub fn deliver(&self, event: InboundEvent) -> bool {
        let handler = lock(&self.inbound_handlers).get(&event.category()).cloned();
        match handler {
            Some(handler) => {
                debug!("Mock pipeline: delivering inbound {}", event.category());
                handler(event);
                self.stats.events_delivered.fetch_add(1, Ordering::Relaxed);
                true
            }
            None => {
                debug!("Mock pipeline: no subscriber for {}", event.category());
                self.stats.events_dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    pub fn deliver_method_request(&self, request_id: &str, name: &str, payload: serde_json::Value) -> bool {
        self.deliver(InboundEvent::MethodRequest(MethodRequest::new(
            request_id, name, payload,
        )))
    }

    pub fn deliver_c2d_message(&self, message: Message) -> bool {
        self.deliver(InboundEvent::C2dMessage(message))
    }

    pub fn deliver_input_message(&self, input_name: &str, message: Message) -> bool {
        self.deliver(InboundEvent::InputMessage(message.with_input_name(input_name)))
    }

    /// Report a connection state change to the subscriber
    pub fn set_connection_state(&self, state: ConnectionState) {
        *lock(&self.state) = state;
        let handler = lock(&self.state_handler).clone();
        info!("Mock pipeline: connection state {}", state);
        if let Some(handler) = handler {
            handler(state);
        }
    }

    // ------------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------------

    pub fn calls(&self) -> Vec<PipelineCall> {
        lock(&self.calls).clone()
    }

    pub fn calls_of(&self, kind: OperationKind) -> Vec<PipelineCall> {
        lock(&self.calls)
            .iter()
            .filter(|call| call.kind() == kind)
            .cloned()
            .collect()
    }

    pub fn has_subscriber(&self, category: InboxCategory) -> bool {
        lock(&self.inbound_handlers).contains_key(&category)
    }

    pub fn has_state_subscriber(&self) -> bool {
        lock(&self.state_handler).is_some()
    }

    pub fn connection_state(&self) -> ConnectionState {
        *lock(&self.state)
    }

    pub fn stats(&self) -> &MockPipelineStats {
        &self.stats
    }

    // ------------------------------------------------------------------------
    // Operation Plumbing
    // ------------------------------------------------------------------------

    fn start(&self, call: PipelineCall, callback: OperationCallback) -> PipelineResult<()> {
        let kind = call.kind();
        lock(&self.calls).push(call.clone());
        self.stats.operations_started.fetch_add(1, Ordering::Relaxed);

        if let Some(error) = pop_failure(&self.sync_failures, kind) {
            debug!("Mock pipeline: rejecting {:?} synchronously", kind);
            self.stats.operations_failed.fetch_add(1, Ordering::Relaxed);
            return Err(error);
        }

        match self.config.completion_mode {
            CompletionMode::Immediate => {
                let result = self.scripted_result(kind);
                self.finish(call, callback, result);
            }
            CompletionMode::Threaded { delay } => {
                let result = self.scripted_result(kind);
                // Effects that touch mock state are applied now; only the callback is deferred.
                self.apply_effects(&call, &result);
                self.record_outcome(result.is_ok());
                std::thread::spawn(move || {
                    std::thread::sleep(delay);
                    callback.complete(result);
                });
            }
            CompletionMode::Manual => {
                lock(&self.pending).push_back(PendingOperation { call, callback });
            }
        }
        Ok(())
    }

    fn scripted_result(&self, kind: OperationKind) -> PipelineResult<()> {
        match pop_failure(&self.callback_failures, kind) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn finish(&self, call: PipelineCall, callback: OperationCallback, result: PipelineResult<()>) {
        self.apply_effects(&call, &result);
        self.record_outcome(result.is_ok());
        callback.complete(result);
    }

    fn apply_effects(&self, call: &PipelineCall, result: &PipelineResult<()>) {
        if result.is_err() {
            return;
        }
        match call {
            PipelineCall::EnableFeature(feature) => self.set_feature_enabled(*feature, true),
            PipelineCall::Connect if self.config.notify_state_changes => {
                self.set_connection_state(ConnectionState::Connected)
            }
            PipelineCall::Disconnect if self.config.notify_state_changes => {
                self.set_connection_state(ConnectionState::Disconnected)
            }
            _ => {}
        }
    }

    fn record_outcome(&self, success: bool) {
        if success {
            self.stats.operations_completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.stats.operations_failed.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl Default for MockPipeline {
    fn default() -> Self {
        Self::immediate()
    }
}

impl fmt::Debug for MockPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockPipeline")
            .field("config", &self.config)
            .field("state", &self.connection_state())
            .field("calls", &lock(&self.calls).len())
            .field("pending", &self.pending_operations())
            .finish()
    }
}

impl Pipeline for MockPipeline {
    fn connect(&self, callback: OperationCallback) -> PipelineResult<()> {
        self.start(PipelineCall::Connect, callback)
    }

    fn disconnect(&self, callback: OperationCallback) -> PipelineResult<()> {
        self.start(PipelineCall::Disconnect, callback)
    }

    fn send_d2c_message(&self, message: Message, callback: OperationCallback) -> PipelineResult<()> {
        self.start(PipelineCall::SendD2cMessage(message), callback)
    }

    fn send_output_event(&self, message: Message, callback: OperationCallback) -> PipelineResult<()> {
        self.start(PipelineCall::SendOutputEvent(message), callback)
    }

    fn send_method_response(
        &self,
        response: MethodResponse,
        callback: OperationCallback,
    ) -> PipelineResult<()> {
        self.start(PipelineCall::SendMethodResponse(response), callback)
    }

    fn enable_feature(&self, feature: Feature, callback: OperationCallback) -> PipelineResult<()> {
        self.start(PipelineCall::EnableFeature(feature), callback)
    }

    fn feature_enabled(&self, feature: Feature) -> bool {
        lock(&self.features).contains(&feature)
    }

    fn on_inbound_event(&self, category: InboxCategory, handler: InboundHandler) {
        lock(&self.inbound_handlers).insert(category, handler);
    }

    fn on_connection_state_change(&self, handler: StateChangeHandler) {
        *lock(&self.state_handler) = Some(handler);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn pop_failure(
    failures: &Mutex<HashMap<OperationKind, VecDeque<PipelineError>>>,
    kind: OperationKind,
) -> Option<PipelineError> {
    lock(failures).get_mut(&kind).and_then(VecDeque::pop_front)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use hublink_core::{BridgeConfig, CallbackBridge, CompletionSignal, ExecutionMode};
    use std::sync::{atomic::AtomicUsize, Arc};

    fn inline_bridge() -> CallbackBridge {
        CallbackBridge::new(BridgeConfig {
            execution_mode: ExecutionMode::Inline,
        })
    }

    fn connect_via(bridge: &CallbackBridge, mock: &Arc<MockPipeline>) -> CompletionSignal<()> {
        let mock = Arc::clone(mock);
        bridge.emulate("connect", move |callback| mock.connect(callback))
    }

    #[test]
    fn test_immediate_mode_applies_scripted_failure_once() {
        let mock = Arc::new(MockPipeline::immediate());
        let bridge = inline_bridge();
        mock.fail_next(OperationKind::Connect, PipelineError::NotConnected);

        let first = connect_via(&bridge, &mock);
        assert_eq!(first.try_result(), Some(Err(PipelineError::NotConnected)));
        assert_eq!(mock.connection_state(), ConnectionState::Disconnected);

        let second = connect_via(&bridge, &mock);
        assert_eq!(second.try_result(), Some(Ok(())));
        assert_eq!(mock.connection_state(), ConnectionState::Connected);
        assert_eq!(mock.stats().operations_failed.load(Ordering::Relaxed), 1);
        assert_eq!(mock.stats().operations_completed.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_rejection_is_returned_synchronously() {
        let mock = Arc::new(MockPipeline::immediate());
        mock.reject_next(OperationKind::Connect, PipelineError::connection_failed("dns"));

        let signal = connect_via(&inline_bridge(), &mock);
        assert_eq!(
            signal.try_result(),
            Some(Err(PipelineError::connection_failed("dns")))
        );
        assert_eq!(mock.calls(), vec![PipelineCall::Connect]);
    }

    #[test]
    fn test_manual_mode_holds_callbacks() {
        let mock = Arc::new(MockPipeline::manual());
        let signal = connect_via(&inline_bridge(), &mock);

        assert!(!signal.is_fulfilled());
        assert_eq!(mock.pending_operations(), 1);
        assert_eq!(mock.complete_next(Ok(())), Some(PipelineCall::Connect));
        assert_eq!(signal.try_result(), Some(Ok(())));
        assert_eq!(mock.complete_next(Ok(())), None);
    }

    #[tokio::test]
    async fn test_threaded_mode_completes_from_another_thread() {
        let mock = Arc::new(MockPipeline::threaded());
        let signal = connect_via(&inline_bridge(), &mock);
        assert_eq!(signal.await_result().await, Ok(()));
    }

    #[test]
    fn test_delivery_requires_subscriber() {
        let mock = MockPipeline::immediate();
        assert!(!mock.deliver_c2d_message(Message::new("lost")));

        let delivered = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&delivered);
        mock.on_inbound_event(
            InboxCategory::InputMessages,
            Arc::new(move |event: InboundEvent| {
                assert_eq!(event.routing_key(), Some("in1"));
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        assert!(mock.deliver_input_message("in1", Message::new("kept")));
        assert_eq!(delivered.load(Ordering::SeqCst), 1);
        assert_eq!(mock.stats().events_dropped.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_state_notifications_can_be_suppressed() {
        let mock = Arc::new(MockPipeline::new(MockPipelineConfig {
            notify_state_changes: false,
            ..MockPipelineConfig::default()
        }));
        let notified = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&notified);
        mock.on_connection_state_change(Arc::new(move |_state: ConnectionState| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let signal = connect_via(&inline_bridge(), &mock);
        assert_eq!(signal.try_result(), Some(Ok(())));
        assert_eq!(mock.connection_state(), ConnectionState::Disconnected);
        assert_eq!(notified.load(Ordering::SeqCst), 0);

        mock.set_connection_state(ConnectionState::Connected);
        assert_eq!(notified.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_enable_feature_sets_flag() {
        let mock = Arc::new(MockPipeline::immediate());
        assert!(!mock.feature_enabled(Feature::Methods));

        let target = Arc::clone(&mock);
        let signal = inline_bridge().emulate("enable_feature", move |callback| {
            target.enable_feature(Feature::Methods, callback)
        });
        assert_eq!(signal.try_result(), Some(Ok(())));
        assert!(mock.feature_enabled(Feature::Methods));
    }
}
