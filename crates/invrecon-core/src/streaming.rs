//! Bounded channel for progress delivery.
//!
//! Subscribers to import progress receive messages over a bounded buffer.
//! Slow consumers must never stall the ingestion pipeline, so the channel
//! supports dropping the oldest buffered message when full; the latest
//! snapshot is always retrievable from the cache regardless.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::error::{ReconError, ReconResult};

/// Behavior when the buffer is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowStrategy {
    /// Block the sender until space is available.
    Block,
    /// Evict the oldest buffered message to make room.
    DropOldest,
}

/// Counters for a channel's lifetime.
#[derive(Debug, Clone, Default)]
pub struct ChannelStats {
    /// Messages accepted into the buffer.
    pub items_sent: u64,
    /// Messages handed to a receiver.
    pub items_received: u64,
    /// Messages evicted under DropOldest.
    pub items_dropped: u64,
}

struct ChannelInner<T> {
    buffer: Mutex<VecDeque<T>>,
    not_full: Condvar,
    not_empty: Condvar,
    closed: AtomicBool,
    items_sent: AtomicU64,
    items_received: AtomicU64,
    items_dropped: AtomicU64,
}

/// A bounded channel with configurable overflow handling.
pub struct BoundedChannel<T> {
    inner: Arc<ChannelInner<T>>,
    capacity: usize,
    strategy: OverflowStrategy,
}

impl<T> BoundedChannel<T> {
    /// Creates a channel with the given capacity and overflow strategy.
    pub fn new(capacity: usize, strategy: OverflowStrategy) -> Self {
        Self {
            inner: Arc::new(ChannelInner {
                buffer: Mutex::new(VecDeque::with_capacity(capacity)),
                not_full: Condvar::new(),
                not_empty: Condvar::new(),
                closed: AtomicBool::new(false),
                items_sent: AtomicU64::new(0),
                items_received: AtomicU64::new(0),
                items_dropped: AtomicU64::new(0),
            }),
            capacity,
            strategy,
        }
    }

    /// Sends a message.
    ///
    /// Returns `Err(ChannelClosed)` if the channel has been closed.
    pub fn send(&self, item: T) -> ReconResult<()> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(ReconError::ChannelClosed);
        }

        let mut buffer = self.inner.buffer.lock().unwrap();

        if buffer.len() >= self.capacity {
            match self.strategy {
                OverflowStrategy::Block => {
                    buffer = self
                        .inner
                        .not_full
                        .wait_while(buffer, |b| {
                            b.len() >= self.capacity && !self.inner.closed.load(Ordering::SeqCst)
                        })
                        .unwrap();

                    if self.inner.closed.load(Ordering::SeqCst) {
                        return Err(ReconError::ChannelClosed);
                    }
                }
                OverflowStrategy::DropOldest => {
                    buffer.pop_front();
                    self.inner.items_dropped.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        buffer.push_back(item);
        self.inner.items_sent.fetch_add(1, Ordering::Relaxed);
        drop(buffer);
        self.inner.not_empty.notify_one();

        Ok(())
    }

    /// Receives the next message, blocking until one is available.
    ///
    /// Returns `None` when the channel is closed and drained.
    pub fn recv(&self) -> Option<T> {
        let mut buffer = self.inner.buffer.lock().unwrap();

        while buffer.is_empty() {
            if self.inner.closed.load(Ordering::SeqCst) {
                return None;
            }
            buffer = self.inner.not_empty.wait(buffer).unwrap();
        }

        let item = buffer.pop_front();
        if item.is_some() {
            self.inner.items_received.fetch_add(1, Ordering::Relaxed);
        }
        drop(buffer);
        self.inner.not_full.notify_one();

        item
    }

    /// Receives with a timeout. Returns `None` on timeout or closed-and-drained.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut buffer = self.inner.buffer.lock().unwrap();

        while buffer.is_empty() {
            if self.inner.closed.load(Ordering::SeqCst) {
                return None;
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }

            let (new_buffer, wait_result) = self
                .inner
                .not_empty
                .wait_timeout(buffer, remaining)
                .unwrap();
            buffer = new_buffer;

            if wait_result.timed_out() && buffer.is_empty() {
                return None;
            }
        }

        let item = buffer.pop_front();
        if item.is_some() {
            self.inner.items_received.fetch_add(1, Ordering::Relaxed);
        }
        drop(buffer);
        self.inner.not_full.notify_one();

        item
    }

    /// Tries to receive without blocking.
    pub fn try_recv(&self) -> Option<T> {
        let mut buffer = self.inner.buffer.lock().unwrap();
        let item = buffer.pop_front();
        if item.is_some() {
            self.inner.items_received.fetch_add(1, Ordering::Relaxed);
            drop(buffer);
            self.inner.not_full.notify_one();
        }
        item
    }

    /// Closes the channel; buffered messages remain receivable.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.not_full.notify_all();
        self.inner.not_empty.notify_all();
    }

    /// Whether the channel has been closed.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Lifetime counters.
    pub fn stats(&self) -> ChannelStats {
        ChannelStats {
            items_sent: self.inner.items_sent.load(Ordering::Relaxed),
            items_received: self.inner.items_received.load(Ordering::Relaxed),
            items_dropped: self.inner.items_dropped.load(Ordering::Relaxed),
        }
    }
}

impl<T> Clone for BoundedChannel<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            capacity: self.capacity,
            strategy: self.strategy,
        }
    }
}
