//! Multicast streams for state and message fan-out.
//!
//! Two publishers share one subscription type:
//!
//! | Publisher | Late subscriber sees | Equal consecutive values |
//! |-----------|----------------------|--------------------------|
//! | [`Broadcast`] | only values published after subscribing | delivered |
//! | [`Replay`] | the current value, then every change | suppressed |
//!
//! Every subscriber owns an unbounded channel, so a slow subscriber never
//! blocks a publisher and never loses or reorders values. Dropping a
//! [`Subscription`] unsubscribes; the closed channel is pruned on the next
//! publish.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

// ============================================================================
// Subscription
// ============================================================================

/// Receiving end of a [`Broadcast`] or [`Replay`].
///
/// Yields values in publish order. Ends only when the publisher is dropped.
pub struct Subscription<T> {
    rx: UnboundedReceiver<T>,
}

impl<T> Subscription<T> {
    /// Waits for the next value.
    ///
    /// Returns `None` once the publisher is gone.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Returns the next value if one is already queued.
    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}

impl<T> Stream for Subscription<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.rx.poll_recv(cx)
    }
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

// ============================================================================
// Subscribers
// ============================================================================

/// Live subscriber channels.
struct Subscribers<T> {
    senders: Vec<UnboundedSender<T>>,
}

impl<T: Clone> Subscribers<T> {
    const fn new() -> Self {
        Self {
            senders: Vec::new(),
        }
    }

    fn add(&mut self) -> (UnboundedSender<T>, Subscription<T>) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.push(tx.clone());
        (tx, Subscription { rx })
    }

    /// Sends to every live subscriber and drops the closed ones.
    fn send(&mut self, value: &T) -> usize {
        self.senders.retain(|tx| tx.send(value.clone()).is_ok());
        self.senders.len()
    }

    fn live(&self) -> usize {
        self.senders.iter().filter(|tx| !tx.is_closed()).count()
    }
}

// ============================================================================
// Broadcast
// ============================================================================

/// Fire-and-forget multicast.
///
/// Values go to whoever is subscribed at publish time.
pub struct Broadcast<T> {
    subscribers: Mutex<Subscribers<T>>,
}

impl<T: Clone> Broadcast<T> {
    /// Creates a broadcast with no subscribers.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            subscribers: Mutex::new(Subscribers::new()),
        }
    }

    /// Subscribes to values published from now on.
    pub fn subscribe(&self) -> Subscription<T> {
        self.subscribers.lock().add().1
    }

    /// Publishes a value, returning how many subscribers received it.
    pub fn publish(&self, value: T) -> usize {
        self.subscribers.lock().send(&value)
    }

    /// Returns the number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().live()
    }
}

impl<T: Clone> Default for Broadcast<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Replay
// ============================================================================

/// Current value plus its subscribers, behind one lock.
struct ReplayInner<T> {
    current: T,
    subscribers: Subscribers<T>,
}

/// Multicast that replays the latest value to new subscribers.
///
/// The stored value and the emitted event change under one lock, so a
/// reader never observes a value that subscribers have not been sent.
pub struct Replay<T> {
    inner: Mutex<ReplayInner<T>>,
}

impl<T: Clone + PartialEq> Replay<T> {
    /// Creates a replay holding `initial`.
    pub const fn new(initial: T) -> Self {
        Self {
            inner: Mutex::new(ReplayInner {
                current: initial,
                subscribers: Subscribers::new(),
            }),
        }
    }

    /// Returns a clone of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.lock().current.clone()
    }

    /// Subscribes; the current value is delivered first.
    pub fn subscribe(&self) -> Subscription<T> {
        let mut inner = self.inner.lock();
        let current = inner.current.clone();
        let (tx, subscription) = inner.subscribers.add();
        // Receiver is alive, so this cannot fail.
        let _ = tx.send(current);
        subscription
    }

    /// Publishes a value unless it equals the current one.
    ///
    /// Returns `true` if the value changed.
    pub fn publish(&self, value: T) -> bool {
        let mut inner = self.inner.lock();
        if inner.current == value {
            return false;
        }
        inner.subscribers.send(&value);
        inner.current = value;
        true
    }

    /// Returns the number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.live()
    }
}

impl<T: fmt::Debug> fmt::Debug for Replay<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Replay")
            .field("current", &self.inner.lock().current)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
