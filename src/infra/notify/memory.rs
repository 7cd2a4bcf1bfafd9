//! In-memory queue of notification fan-out triggers.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::core::{NotificationDispatch, NotificationTrigger, NotifyError};
use crate::util::PrincipalId;

/// Simple in-memory trigger queue for development/testing.
pub struct InMemoryNotificationQueue {
    max_depth: usize,
    triggers: Mutex<VecDeque<NotificationTrigger>>,
}

impl InMemoryNotificationQueue {
    /// Create an unbounded queue.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_depth(usize::MAX)
    }

    /// Create a queue that rejects triggers beyond `max_depth`.
    #[must_use]
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            max_depth,
            triggers: Mutex::new(VecDeque::new()),
        }
    }

    /// Number of queued triggers owned by `principal_id`.
    #[must_use]
    pub fn pending_for(&self, principal_id: &PrincipalId) -> usize {
        self.triggers
            .lock()
            .iter()
            .filter(|t| &t.principal_id == principal_id)
            .count()
    }

    /// Remove and return every queued trigger in FIFO order.
    pub fn drain(&self) -> Vec<NotificationTrigger> {
        self.triggers.lock().drain(..).collect()
    }

    /// Number of queued triggers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.triggers.lock().len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryNotificationQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationDispatch for InMemoryNotificationQueue {
    async fn enqueue(&self, trigger: NotificationTrigger) -> Result<(), NotifyError> {
        let mut triggers = self.triggers.lock();
        if triggers.len() >= self.max_depth {
            return Err(NotifyError("max queue depth reached".into()));
        }
        triggers.push_back(trigger);
        Ok(())
    }
}
