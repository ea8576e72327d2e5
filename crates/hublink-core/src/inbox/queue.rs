//! Unbounded FIFO inbox with an awaitable dequeue

use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

// ----------------------------------------------------------------------------
// Inbox
// ----------------------------------------------------------------------------

/// Unbounded FIFO queue for one routing key
///
/// `put` never blocks and may be called from any thread. `get` suspends until
/// an item is available; concurrent `get`s each receive a distinct item in
/// arrival order. `clear` drops queued items but leaves waiters suspended.
pub struct Inbox<T> {
    queue: Mutex<VecDeque<T>>,
    notify: Notify,
    /// Number of `get` futures currently in flight
    waiters: AtomicUsize,
    stats: InboxStats,
}

impl<T> Inbox<T> {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            waiters: AtomicUsize::new(0),
            stats: InboxStats::default(),
        }
    }

    /// Append an item and wake one waiter
    pub fn put(&self, item: T) {
        self.lock_queue().push_back(item);
        self.stats.record_put();
        self.notify.notify_one();
    }

    /// Suspend until an item is available, then remove and return the oldest one
    ///
    /// Cancellation safe: dropping the future before it completes never
    /// consumes an item.
    pub async fn get(&self) -> T {
        let _waiting = WaiterGuard::enter(&self.waiters);
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(item) = self.try_get() {
                return item;
            }
            notified.await;
        }
    }

    /// Remove and return the oldest item without suspending
    pub fn try_get(&self) -> Option<T> {
        let item = self.lock_queue().pop_front();
        if item.is_some() {
            self.stats.record_taken();
        }
        item
    }

    /// Discard every queued item, returning how many were dropped
    pub fn clear(&self) -> usize {
        let dropped = {
            let mut queue = self.lock_queue();
            let dropped = queue.len();
            queue.clear();
            dropped
        };
        self.stats.record_cleared(dropped);
        dropped
    }

    pub fn len(&self) -> usize {
        self.lock_queue().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_queue().is_empty()
    }

    pub fn stats(&self) -> &InboxStats {
        &self.stats
    }

    /// Number of callers currently suspended in, or polling, `get`
    pub fn waiters(&self) -> usize {
        self.waiters.load(Ordering::Acquire)
    }

    /// Whether a consumer is waiting on this inbox or has items left to collect
    pub fn is_attended(&self) -> bool {
        self.waiters() > 0 || !self.is_empty()
    }

    // A panic while holding the lock cannot leave the VecDeque half-modified.
    fn lock_queue(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Default for Inbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Inbox<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inbox")
            .field("len", &self.len())
            .field("waiters", &self.waiters())
            .field("stats", &self.stats)
            .finish()
    }
}

/// Counts a `get` as waiting until its future completes or is dropped
struct WaiterGuard<'a> {
    waiters: &'a AtomicUsize,
}

impl<'a> WaiterGuard<'a> {
    fn enter(waiters: &'a AtomicUsize) -> Self {
        waiters.fetch_add(1, Ordering::AcqRel);
        Self { waiters }
    }
}

impl Drop for WaiterGuard<'_> {
    fn drop(&mut self) {
        self.waiters.fetch_sub(1, Ordering::AcqRel);
    }
}

// ----------------------------------------------------------------------------
// Inbox Statistics
// ----------------------------------------------------------------------------

/// Inbox traffic counters
/// Uses atomic counters so producers and consumers can update them concurrently
#[derive(Debug, Default)]
pub struct InboxStats {
    items_put: AtomicU64,
    items_taken: AtomicU64,
    items_cleared: AtomicU64,
}

impl InboxStats {
    fn record_put(&self) {
        self.items_put.fetch_add(1, Ordering::Relaxed);
    }

    fn record_taken(&self) {
        self.items_taken.fetch_add(1, Ordering::Relaxed);
    }

    fn record_cleared(&self, count: usize) {
        self.items_cleared.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Total items ever put
    pub fn items_put(&self) -> u64 {
        self.items_put.load(Ordering::Relaxed)
    }

    /// Total items handed to consumers
    pub fn items_taken(&self) -> u64 {
        self.items_taken.load(Ordering::Relaxed)
    }

    /// Total items discarded by `clear`
    pub fn items_cleared(&self) -> u64 {
        self.items_cleared.load(Ordering::Relaxed)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::time::{timeout, Duration};
    use tokio_test::{assert_pending, assert_ready_eq, task};

    #[tokio::test]
    async fn test_fifo_order() {
        let inbox = Inbox::new();
        for i in 0..5 {
            inbox.put(i);
        }
        for i in 0..5 {
            assert_eq!(inbox.get().await, i);
        }
        assert!(inbox.is_empty());
    }

    #[test]
    fn test_get_before_put_resumes_after_put() {
        let inbox = Inbox::new();
        let mut waiter = task::spawn(inbox.get());

        assert_pending!(waiter.poll());
        inbox.put("reboot");
        assert!(waiter.is_woken());
        assert_ready_eq!(waiter.poll(), "reboot");
    }

    #[tokio::test]
    async fn test_concurrent_gets_receive_distinct_items() {
        let inbox = Arc::new(Inbox::new());

        let first = tokio::spawn({
            let inbox = Arc::clone(&inbox);
            async move { inbox.get().await }
        });
        let second = tokio::spawn({
            let inbox = Arc::clone(&inbox);
            async move { inbox.get().await }
        });
        tokio::task::yield_now().await;

        inbox.put(1);
        inbox.put(2);

        let mut received = vec![
            timeout(Duration::from_secs(1), first).await.unwrap().unwrap(),
            timeout(Duration::from_secs(1), second).await.unwrap().unwrap(),
        ];
        received.sort();
        assert_eq!(received, vec![1, 2]);
        assert_eq!(inbox.stats().items_taken(), 2);
    }

    #[test]
    fn test_clear_does_not_release_waiters() {
        let inbox = Inbox::new();
        inbox.put(1);
        inbox.put(2);
        assert_eq!(inbox.clear(), 2);
        assert_eq!(inbox.stats().items_cleared(), 2);

        let mut waiter = task::spawn(inbox.get());
        assert_pending!(waiter.poll());

        inbox.clear();
        assert_pending!(waiter.poll());

        inbox.put(3);
        assert_ready_eq!(waiter.poll(), 3);
    }

    #[test]
    fn test_suspended_waiter_survives_clear() {
        let inbox = Inbox::new();
        let mut waiter = task::spawn(inbox.get());
        assert_pending!(waiter.poll());

        inbox.clear();
        assert_pending!(waiter.poll());

        inbox.put("late");
        assert_ready_eq!(waiter.poll(), "late");
    }

    #[tokio::test]
    async fn test_cancelled_get_does_not_lose_items() {
        let inbox = Arc::new(Inbox::new());

        assert!(timeout(Duration::from_millis(20), inbox.get()).await.is_err());

        inbox.put("kept");
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox.get().await, "kept");
    }

    #[test]
    fn test_waiters_tracked_until_get_completes_or_drops() {
        let inbox = Inbox::new();
        assert_eq!(inbox.waiters(), 0);
        assert!(!inbox.is_attended());

        let mut first = task::spawn(inbox.get());
        let mut second = task::spawn(inbox.get());
        assert_pending!(first.poll());
        assert_pending!(second.poll());
        assert_eq!(inbox.waiters(), 2);
        assert!(inbox.is_attended());

        drop(second);
        assert_eq!(inbox.waiters(), 1);

        inbox.put(7);
        assert_ready_eq!(first.poll(), 7);
        drop(first);
        assert_eq!(inbox.waiters(), 0);
        assert!(!inbox.is_attended());

        inbox.put(8);
        assert!(inbox.is_attended());
    }

    #[test]
    fn test_put_from_foreign_thread() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let inbox = Arc::new(Inbox::new());

        let producer = Arc::clone(&inbox);
        let thread = std::thread::spawn(move || {
            for i in 0..100 {
                producer.put(i);
            }
        });

        let received = runtime.block_on(async {
            let mut received = Vec::new();
            for _ in 0..100 {
                received.push(inbox.get().await);
            }
            received
        });
        thread.join().unwrap();
        assert_eq!(received, (0..100).collect::<Vec<_>>());
    }
}
