//! Cancellable one-shot timer driven by explicit timestamps.

use std::time::{Duration, Instant};

/// Due once `delay` has passed since the most recent [`schedule`](Self::schedule).
///
/// Rescheduling pushes the deadline back, so a burst of schedules comes due
/// once, `delay` after the last one.
#[derive(Debug, Clone)]
pub struct DeferredTask {
    delay: Duration,
    deadline: Option<Instant>,
}

impl DeferredTask {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    pub fn schedule(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }
}
