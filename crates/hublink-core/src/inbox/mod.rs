//! Inbox Module
//!
//! Inbound event demultiplexing:
//! - `queue`: the unbounded FIFO `Inbox` with an awaitable dequeue
//! - `router`: per-category key → inbox mapping with lazy creation
//! - `manager`: the `InboxManager` owning every category of a client

pub mod manager;
pub mod queue;
pub mod router;

pub use manager::{CategoryInbox, InboxCategory, InboxManager};
pub use queue::{Inbox, InboxStats};
pub use router::{InboxRouter, RouteTarget, RoutingPolicy};
