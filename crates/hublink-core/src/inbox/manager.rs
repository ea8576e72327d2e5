//! Inbox Manager
//!
//! Demultiplexes inbound pipeline events into per-category, per-key inboxes.
//! Method requests and input messages are keyed by method and input name;
//! cloud-to-device messages share one inbox.

use super::queue::Inbox;
use super::router::{InboxRouter, RouteTarget, RoutingPolicy};
use crate::models::{InboundEvent, Message, MethodRequest};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[cfg(not(feature = "std"))]
use log::debug;
#[cfg(feature = "std")]
use tracing::debug;

// ----------------------------------------------------------------------------
// Inbox Category
// ----------------------------------------------------------------------------

/// Category of inbound event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InboxCategory {
    MethodRequests,
    C2dMessages,
    InputMessages,
}

impl InboxCategory {
    pub const ALL: [InboxCategory; 3] = [
        InboxCategory::MethodRequests,
        InboxCategory::C2dMessages,
        InboxCategory::InputMessages,
    ];
}

impl fmt::Display for InboxCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InboxCategory::MethodRequests => write!(f, "method requests"),
            InboxCategory::C2dMessages => write!(f, "c2d messages"),
            InboxCategory::InputMessages => write!(f, "input messages"),
        }
    }
}

// ----------------------------------------------------------------------------
// Category Inbox
// ----------------------------------------------------------------------------

/// Inbox handle returned by the category-generic lookup
#[derive(Debug, Clone)]
pub enum CategoryInbox {
    MethodRequests(Arc<Inbox<MethodRequest>>),
    C2dMessages(Arc<Inbox<Message>>),
    InputMessages(Arc<Inbox<Message>>),
}

impl CategoryInbox {
    pub fn category(&self) -> InboxCategory {
        match self {
            CategoryInbox::MethodRequests(_) => InboxCategory::MethodRequests,
            CategoryInbox::C2dMessages(_) => InboxCategory::C2dMessages,
            CategoryInbox::InputMessages(_) => InboxCategory::InputMessages,
        }
    }

    /// Suspend until an item is available and return it as an event
    pub async fn get(&self) -> InboundEvent {
        match self {
            CategoryInbox::MethodRequests(inbox) => InboundEvent::MethodRequest(inbox.get().await),
            CategoryInbox::C2dMessages(inbox) => InboundEvent::C2dMessage(inbox.get().await),
            CategoryInbox::InputMessages(inbox) => InboundEvent::InputMessage(inbox.get().await),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            CategoryInbox::MethodRequests(inbox) => inbox.len(),
            CategoryInbox::C2dMessages(inbox) | CategoryInbox::InputMessages(inbox) => inbox.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether both handles refer to the same inbox instance
    pub fn same_inbox(&self, other: &CategoryInbox) -> bool {
        match (self, other) {
            (CategoryInbox::MethodRequests(a), CategoryInbox::MethodRequests(b)) => Arc::ptr_eq(a, b),
            (CategoryInbox::C2dMessages(a), CategoryInbox::C2dMessages(b))
            | (CategoryInbox::InputMessages(a), CategoryInbox::InputMessages(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

// ----------------------------------------------------------------------------
// Inbox Manager
// ----------------------------------------------------------------------------

/// Owns every inbox of a client
#[derive(Debug)]
pub struct InboxManager {
    method_requests: InboxRouter<MethodRequest>,
    c2d_messages: InboxRouter<Message>,
    input_messages: InboxRouter<Message>,
}

impl InboxManager {
    pub fn new() -> Self {
        Self {
            // A consumer waiting on a specific method takes priority over the generic one.
            method_requests: InboxRouter::new(RoutingPolicy::PreferExisting),
            c2d_messages: InboxRouter::new(RoutingPolicy::Unkeyed),
            input_messages: InboxRouter::new(RoutingPolicy::CreateOnRoute),
        }
    }

    /// Inbox for method requests named `method_name`, or for any method when `None`
    pub fn method_request_inbox(&self, method_name: Option<&str>) -> Arc<Inbox<MethodRequest>> {
        self.method_requests.inbox_for(method_name)
    }

    /// The shared cloud-to-device message inbox
    pub fn c2d_message_inbox(&self) -> Arc<Inbox<Message>> {
        self.c2d_messages.inbox_for(None)
    }

    /// Inbox for messages arriving on module input `input_name`
    pub fn input_message_inbox(&self, input_name: Option<&str>) -> Arc<Inbox<Message>> {
        self.input_messages.inbox_for(input_name)
    }

    /// Category-generic lookup, creating the inbox if absent
    pub fn inbox_for(&self, category: InboxCategory, key: Option<&str>) -> CategoryInbox {
        match category {
            InboxCategory::MethodRequests => {
                CategoryInbox::MethodRequests(self.method_request_inbox(key))
            }
            InboxCategory::C2dMessages => CategoryInbox::C2dMessages(self.c2d_message_inbox()),
            InboxCategory::InputMessages => {
                CategoryInbox::InputMessages(self.input_message_inbox(key))
            }
        }
    }

    /// Deliver an inbound event to its inbox
    pub fn route(&self, event: InboundEvent) -> RouteTarget {
        let category = event.category();
        let target = match event {
            InboundEvent::MethodRequest(request) => {
                let name = request.name.clone();
                self.method_requests.route(Some(name.as_str()), request)
            }
            InboundEvent::C2dMessage(message) => self.c2d_messages.route(None, message),
            InboundEvent::InputMessage(message) => {
                let input_name = message.input_name.clone();
                self.input_messages.route(input_name.as_deref(), message)
            }
        };
        debug!("Routed inbound {} to {:?}", category, target);
        target
    }

    pub fn route_method_request(&self, request: MethodRequest) -> RouteTarget {
        self.route(InboundEvent::MethodRequest(request))
    }

    pub fn route_c2d_message(&self, message: Message) -> RouteTarget {
        self.route(InboundEvent::C2dMessage(message))
    }

    pub fn route_input_message(&self, message: Message) -> RouteTarget {
        self.route(InboundEvent::InputMessage(message))
    }

    /// Clear every inbox of `category`, returning how many items were dropped
    pub fn clear_category(&self, category: InboxCategory) -> usize {
        match category {
            InboxCategory::MethodRequests => self.method_requests.clear_all(),
            InboxCategory::C2dMessages => self.c2d_messages.clear_all(),
            InboxCategory::InputMessages => self.input_messages.clear_all(),
        }
    }

    /// Drop every pending method request
    pub fn clear_all_method_requests(&self) -> usize {
        self.clear_category(InboxCategory::MethodRequests)
    }

    /// Items currently queued in `category`
    pub fn pending(&self, category: InboxCategory) -> usize {
        match category {
            InboxCategory::MethodRequests => self.method_requests.pending(),
            InboxCategory::C2dMessages => self.c2d_messages.pending(),
            InboxCategory::InputMessages => self.input_messages.pending(),
        }
    }
}

impl Default for InboxManager {
    fn default() -> Self {
        Self::new()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::time::{timeout, Duration};
    use tokio_test::{assert_pending, assert_ready, task};

    fn method(name: &str) -> MethodRequest {
        MethodRequest::new(format!("{}-id", name), name, json!({}))
    }

    #[test]
    fn test_method_request_without_specific_inbox_goes_to_generic() {
        let manager = InboxManager::new();
        let target = manager.route_method_request(method("reboot"));
        assert_eq!(target, RouteTarget::Generic);
        assert_eq!(
            manager.method_request_inbox(None).try_get().map(|r| r.name),
            Some("reboot".to_string())
        );
    }

    #[test]
    fn test_specific_method_waiter_takes_priority() {
        let manager = InboxManager::new();
        let generic = manager.method_request_inbox(None);
        let reboot = manager.method_request_inbox(Some("reboot"));
        let mut reboot_waiter = task::spawn(reboot.get());
        assert_pending!(reboot_waiter.poll());

        manager.route_method_request(method("reboot"));
        manager.route_method_request(method("update"));

        let request = assert_ready!(reboot_waiter.poll());
        assert_eq!(request.name, "reboot");
        assert_eq!(generic.try_get().map(|r| r.name), Some("update".to_string()));
        assert!(generic.is_empty());
    }

    #[test]
    fn test_unattended_method_inbox_falls_back_to_generic() {
        let manager = InboxManager::new();
        manager.method_request_inbox(Some("reboot"));

        assert_eq!(manager.route_method_request(method("reboot")), RouteTarget::Generic);
        assert_eq!(
            manager.method_request_inbox(None).try_get().map(|r| r.name),
            Some("reboot".to_string())
        );
    }

    #[tokio::test]
    async fn test_generic_waiter_receives_unclaimed_method() {
        let manager = Arc::new(InboxManager::new());
        let waiter = tokio::spawn({
            let manager = Arc::clone(&manager);
            async move { manager.method_request_inbox(None).get().await }
        });
        tokio::task::yield_now().await;

        manager.route_method_request(method("reboot"));
        let request = timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
        assert_eq!(request.name, "reboot");
    }

    #[test]
    fn test_c2d_messages_share_one_inbox() {
        let manager = InboxManager::new();
        let a = manager.inbox_for(InboxCategory::C2dMessages, Some("ignored"));
        let b = manager.inbox_for(InboxCategory::C2dMessages, None);
        assert!(a.same_inbox(&b));

        manager.route_c2d_message(Message::new("hello"));
        assert_eq!(a.len(), 1);
    }

    #[test]
    fn test_input_messages_routed_by_input_name() {
        let manager = InboxManager::new();
        manager.route_input_message(Message::new("t=1").with_input_name("temperature"));
        manager.route_input_message(Message::new("h=2").with_input_name("humidity"));
        manager.route_input_message(Message::new("unnamed"));

        let temperature = manager.input_message_inbox(Some("temperature"));
        assert_eq!(
            temperature.try_get().and_then(|m| m.data_as_str().map(str::to_string)),
            Some("t=1".to_string())
        );
        assert_eq!(manager.input_message_inbox(Some("humidity")).len(), 1);
        assert_eq!(manager.input_message_inbox(None).len(), 1);
    }

    #[test]
    fn test_distinct_categories_never_share_inboxes() {
        let manager = InboxManager::new();
        let methods = manager.inbox_for(InboxCategory::MethodRequests, Some("x"));
        let inputs = manager.inbox_for(InboxCategory::InputMessages, Some("x"));
        assert!(!methods.same_inbox(&inputs));
        assert!(methods.same_inbox(&manager.inbox_for(InboxCategory::MethodRequests, Some("x"))));
    }

    #[test]
    fn test_clear_category_only_touches_that_category() {
        let manager = InboxManager::new();
        manager.method_request_inbox(Some("reboot"));
        manager.route_method_request(method("reboot"));
        manager.route_method_request(method("update"));
        manager.route_c2d_message(Message::new("keep me"));

        assert_eq!(manager.clear_all_method_requests(), 2);
        assert_eq!(manager.pending(InboxCategory::MethodRequests), 0);
        assert_eq!(manager.pending(InboxCategory::C2dMessages), 1);
    }

    #[tokio::test]
    async fn test_category_inbox_get_wraps_event() {
        let manager = InboxManager::new();
        manager.route_input_message(Message::new("v").with_input_name("in1"));
        let event = manager
            .inbox_for(InboxCategory::InputMessages, Some("in1"))
            .get()
            .await;
        assert_eq!(event.category(), InboxCategory::InputMessages);
        assert_eq!(event.routing_key(), Some("in1"));
    }
}
