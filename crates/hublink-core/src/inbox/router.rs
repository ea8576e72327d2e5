//! Per-category key → inbox routing

use super::queue::Inbox;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;

// ----------------------------------------------------------------------------
// Routing Policy
// ----------------------------------------------------------------------------

/// How a category maps routing keys onto inboxes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingPolicy {
    /// Every item lands in the single generic inbox; keys are ignored
    Unkeyed,
    /// Items go to the named inbox while a consumer is waiting on it or has
    /// items left to collect there, otherwise to the generic inbox
    PreferExisting,
    /// Items go to the named inbox, which is created on first route
    CreateOnRoute,
}

/// Inbox an item was routed to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteTarget {
    Generic,
    Named(String),
}

// ----------------------------------------------------------------------------
// Inbox Router
// ----------------------------------------------------------------------------

/// Owns the inboxes of one event category
///
/// Named inboxes are created atomically on first lookup and live as long as
/// the router; a given key always resolves to the same instance.
pub struct InboxRouter<T> {
    policy: RoutingPolicy,
    generic: Arc<Inbox<T>>,
    named: DashMap<String, Arc<Inbox<T>>>,
}

impl<T> InboxRouter<T> {
    pub fn new(policy: RoutingPolicy) -> Self {
        Self {
            policy,
            generic: Arc::new(Inbox::new()),
            named: DashMap::new(),
        }
    }

    pub fn policy(&self) -> RoutingPolicy {
        self.policy
    }

    /// Inbox for `key`, creating it if absent
    ///
    /// `None`, or any key on an unkeyed router, resolves to the generic inbox.
    pub fn inbox_for(&self, key: Option<&str>) -> Arc<Inbox<T>> {
        match (self.policy, key) {
            (RoutingPolicy::Unkeyed, _) | (_, None) => Arc::clone(&self.generic),
            (_, Some(key)) => self.named_inbox(key),
        }
    }

    /// Named inbox for `key` only if it already exists
    pub fn existing_inbox(&self, key: &str) -> Option<Arc<Inbox<T>>> {
        self.named.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Put `item` on the inbox selected by `key` and the routing policy
    pub fn route(&self, key: Option<&str>, item: T) -> RouteTarget {
        let (inbox, target) = match (self.policy, key) {
            (RoutingPolicy::Unkeyed, _) | (_, None) => {
                (Arc::clone(&self.generic), RouteTarget::Generic)
            }
            (RoutingPolicy::PreferExisting, Some(key)) => {
                match self.existing_inbox(key).filter(|inbox| inbox.is_attended()) {
                    Some(inbox) => (inbox, RouteTarget::Named(key.to_string())),
                    None => (Arc::clone(&self.generic), RouteTarget::Generic),
                }
            }
            (RoutingPolicy::CreateOnRoute, Some(key)) => {
                (self.named_inbox(key), RouteTarget::Named(key.to_string()))
            }
        };
        inbox.put(item);
        target
    }

    /// Clear every inbox, returning how many items were dropped in total
    pub fn clear_all(&self) -> usize {
        let mut dropped = self.generic.clear();
        for entry in self.named.iter() {
            dropped += entry.value().clear();
        }
        dropped
    }

    /// Items currently queued across every inbox
    pub fn pending(&self) -> usize {
        self.generic.len() + self.named.iter().map(|entry| entry.value().len()).sum::<usize>()
    }

    /// Keys with a named inbox
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.named.iter().map(|entry| entry.key().clone()).collect();
        keys.sort();
        keys
    }

    fn named_inbox(&self, key: &str) -> Arc<Inbox<T>> {
        if let Some(inbox) = self.existing_inbox(key) {
            return inbox;
        }
        let entry = self
            .named
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Inbox::new()));
        Arc::clone(entry.value())
    }
}

impl<T> fmt::Debug for InboxRouter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InboxRouter")
            .field("policy", &self.policy)
            .field("keys", &self.keys())
            .field("pending", &self.pending())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
