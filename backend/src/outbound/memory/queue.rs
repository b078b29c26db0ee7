//! In-process retry queue and dead-letter sinks.
//!
//! The queue adapter models the durable broker's contract — FIFO-ish,
//! at-least-once, consumer blocks while empty — inside the process. Tests
//! drive it synchronously through the extra inspection helpers; production
//! wiring against an external broker only has to implement the same port.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::Notify;
use tracing::error;

use crate::domain::FanoutRetryMessage;
use crate::domain::ports::{DeadLetterSink, FanoutRetryQueue, QueueError};

/// Unbounded in-process retry queue.
#[derive(Default)]
pub struct InMemoryRetryQueue {
    messages: Mutex<VecDeque<FanoutRetryMessage>>,
    notify: Notify,
    closed: AtomicBool,
}

impl InMemoryRetryQueue {
    /// Close the queue: consumers drain what remains, then observe `None`.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    /// Push a message without going through the port (test seeding).
    pub fn push(&self, message: FanoutRetryMessage) {
        self.lock().push_back(message);
        self.notify.notify_one();
    }

    /// Pop the next message without blocking.
    pub fn try_dequeue(&self) -> Option<FanoutRetryMessage> {
        self.lock().pop_front()
    }

    /// Messages currently queued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the queue is currently empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Remove and return everything queued.
    pub fn drain(&self) -> Vec<FanoutRetryMessage> {
        self.lock().drain(..).collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<FanoutRetryMessage>> {
        self.messages.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl FanoutRetryQueue for InMemoryRetryQueue {
    async fn enqueue(&self, message: FanoutRetryMessage) -> Result<(), QueueError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(QueueError::rejected("queue is closed"));
        }
        self.push(message);
        Ok(())
    }

    async fn dequeue(&self) -> Result<Option<FanoutRetryMessage>, QueueError> {
        loop {
            // Arm the wakeup before checking, so a message enqueued between
            // the check and the await is not missed.
            let notified = self.notify.notified();
            if let Some(message) = self.try_dequeue() {
                return Ok(Some(message));
            }
            if self.closed.load(Ordering::Acquire) {
                return Ok(None);
            }
            notified.await;
        }
    }
}

/// Production dead-letter sink: records the loss for operators and alerting.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDeadLetterSink;

#[async_trait]
impl DeadLetterSink for TracingDeadLetterSink {
    async fn deliver(&self, message: FanoutRetryMessage, reason: &str) -> Result<(), QueueError> {
        error!(
            author_id = %message.author_id,
            post_id = %message.post_id,
            attempted = message.attempted,
            reason,
            "fan-out permanently failed; manual follow-up required"
        );
        Ok(())
    }
}

/// Dead-letter sink that retains messages for inspection.
#[derive(Default)]
pub struct InMemoryDeadLetterSink {
    letters: Mutex<Vec<(FanoutRetryMessage, String)>>,
}

impl InMemoryDeadLetterSink {
    /// Whether anything has been dead-lettered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Remove and return every captured letter.
    pub fn drain(&self) -> Vec<(FanoutRetryMessage, String)> {
        self.lock().drain(..).collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(FanoutRetryMessage, String)>> {
        self.letters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl DeadLetterSink for InMemoryDeadLetterSink {
    async fn deliver(&self, message: FanoutRetryMessage, reason: &str) -> Result<(), QueueError> {
        self.lock().push((message, reason.to_owned()));
        Ok(())
    }
}
