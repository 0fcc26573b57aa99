//! Typed change notifications with cancellable subscriptions.
//!
//! Subscribers are expected to drain regularly. Each queue is bounded; once
//! full, the oldest events are dropped to make room and a warning is logged.

use std::collections::VecDeque;

use bevy::log::warn;

use crate::constants::EVENT_QUEUE_CAPACITY;
use crate::features::{FeatureId, Side, TargetKind};

/// Everything collaborators may want to react to
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationEvent {
    Added(FeatureId),
    Removed(FeatureId),
    Updated(FeatureId),
    Selected(Vec<FeatureId>),
    Unselected(Vec<FeatureId>),
    HoverChanged(Vec<FeatureId>),
    Linked {
        arrow: FeatureId,
        side: Side,
        target: String,
        kind: TargetKind,
    },
    Unlinked {
        arrow: FeatureId,
        side: Side,
    },
    HistoryChanged {
        can_undo: bool,
        can_redo: bool,
    },
    /// The whole feature map was replaced (undo, redo, load)
    Reset,
    DrawingComplete(FeatureId),
}

/// Handle returned by [`EventBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

#[derive(Debug)]
struct Queue<E> {
    sub: Subscription,
    events: VecDeque<E>,
    /// Events lost since the last drain
    dropped: usize,
}

/// Fan-out queue: every subscriber gets its own copy of each event.
#[derive(Debug)]
pub struct EventBus<E> {
    next_id: u64,
    capacity: usize,
    queues: Vec<Queue<E>>,
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self::with_capacity(EVENT_QUEUE_CAPACITY)
    }
}

impl<E> EventBus<E> {
    /// Bus whose subscribers each hold at most `capacity` undrained events.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            next_id: 0,
            capacity: capacity.max(1),
            queues: Vec::new(),
        }
    }
}

impl<E: Clone> EventBus<E> {
    pub fn subscribe(&mut self) -> Subscription {
        let sub = Subscription(self.next_id);
        self.next_id += 1;
        self.queues.push(Queue {
            sub,
            events: VecDeque::new(),
            dropped: 0,
        });
        sub
    }

    /// Drops the subscription and anything still queued for it.
    pub fn unsubscribe(&mut self, sub: Subscription) -> bool {
        let before = self.queues.len();
        self.queues.retain(|q| q.sub != sub);
        self.queues.len() != before
    }

    pub fn publish(&mut self, event: E) {
        for queue in &mut self.queues {
            if queue.events.len() >= self.capacity {
                queue.events.pop_front();
                if queue.dropped == 0 {
                    warn!(
                        "Subscriber {:?} is not draining; dropping oldest events",
                        queue.sub
                    );
                }
                queue.dropped += 1;
            }
            queue.events.push_back(event.clone());
        }
    }

    /// Takes every pending event for `sub`, oldest first.
    pub fn drain(&mut self, sub: Subscription) -> Vec<E> {
        self.queues
            .iter_mut()
            .find(|q| q.sub == sub)
            .map(|q| {
                q.dropped = 0;
                q.events.drain(..).collect()
            })
            .unwrap_or_default()
    }

    /// Events `sub` has lost to a full queue since its last drain.
    pub fn dropped(&self, sub: Subscription) -> usize {
        self.queues
            .iter()
            .find(|q| q.sub == sub)
            .map_or(0, |q| q.dropped)
    }

    pub fn subscriber_count(&self) -> usize {
        self.queues.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_subscriber_sees_every_event() {
        let mut bus = EventBus::default();
        let a = bus.subscribe();
        let b = bus.subscribe();
        bus.publish(1);
        bus.publish(2);
        assert_eq!(bus.drain(a), vec![1, 2]);
        assert_eq!(bus.drain(a), Vec::<i32>::new());
        assert_eq!(bus.drain(b), vec![1, 2]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let mut bus = EventBus::default();
        let a = bus.subscribe();
        assert!(bus.unsubscribe(a));
        bus.publish("ignored");
        assert!(bus.drain(a).is_empty());
        assert!(!bus.unsubscribe(a));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_full_queue_drops_oldest() {
        let mut bus = EventBus::with_capacity(3);
        let slow = bus.subscribe();
        let fast = bus.subscribe();
        for n in 1..=5 {
            bus.publish(n);
            if n == 2 {
                assert_eq!(bus.drain(fast), vec![1, 2]);
            }
        }
        assert_eq!(bus.dropped(slow), 2);
        assert_eq!(bus.dropped(fast), 0);
        assert_eq!(bus.drain(slow), vec![3, 4, 5]);
        assert_eq!(bus.drain(fast), vec![3, 4, 5]);
        assert_eq!(bus.dropped(slow), 0);

        bus.publish(6);
        assert_eq!(bus.drain(slow), vec![6]);
    }
}
