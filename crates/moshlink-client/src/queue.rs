//! Ingestion queue between producer threads and the driver.
//!
//! Producers push keystrokes and resizes from any thread; the driver takes
//! the whole backlog at once. The lock is held only for the push or the
//! swap, never while the driver forwards events to the transport.
//!
//! The queue is unbounded and gives producers no back-pressure signal.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// One unit of caller input awaiting the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingEvent {
    /// A single keystroke byte.
    InputByte(u8),
    /// A window size change.
    Resize { cols: u16, rows: u16 },
}

/// Thread-safe FIFO of [`PendingEvent`]s.
#[derive(Debug, Default)]
pub struct InputQueue {
    events: Mutex<VecDeque<PendingEvent>>,
}

impl InputQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue_byte(&self, byte: u8) {
        self.lock().push_back(PendingEvent::InputByte(byte));
    }

    /// Enqueue every byte of `bytes` under one lock, so a concurrent
    /// producer cannot interleave with them.
    pub fn enqueue_bytes(&self, bytes: &[u8]) {
        self.lock()
            .extend(bytes.iter().copied().map(PendingEvent::InputByte));
    }

    pub fn enqueue_resize(&self, cols: u16, rows: u16) {
        self.lock().push_back(PendingEvent::Resize { cols, rows });
    }

    /// Take everything queued so far, in submission order.
    pub fn drain_all(&self) -> VecDeque<PendingEvent> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A producer panicking mid-push cannot leave the deque inconsistent.
    fn lock(&self) -> MutexGuard<'_, VecDeque<PendingEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
