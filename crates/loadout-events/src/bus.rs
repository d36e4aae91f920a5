//! Broadcast bus for lifecycle events.
//!
//! Every subscriber sees every event published after it subscribed, in
//! publication order. Publishing never waits on subscribers: a subscriber
//! that falls more than the channel capacity behind skips the oldest events
//! and logs how many it lost.

use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{trace, warn};

use crate::event::LoadoutEvent;

/// Events buffered per subscriber before the oldest are dropped.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Cloneable handle for publishing [`LoadoutEvent`]s. Clones share one
/// channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Arc<LoadoutEvent>>,
    capacity: usize,
}

impl EventBus {
    /// Bus with [`DEFAULT_CHANNEL_CAPACITY`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Bus buffering `capacity` events per subscriber.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, capacity }
    }

    /// Deliver `event` to current subscribers, returning how many there were.
    pub fn publish(&self, event: LoadoutEvent) -> usize {
        let kind = event.event_type();
        let delivered = self.sender.send(Arc::new(event)).unwrap_or(0);
        trace!(event_type = kind, subscribers = delivered, "Event published");
        delivered
    }

    /// Receive every event published from now on.
    #[must_use]
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            inner: self.sender.subscribe(),
            only: None,
        }
    }

    /// Receive only events whose [`LoadoutEvent::event_type`] is listed.
    #[must_use]
    pub fn subscribe_types(&self, event_types: &[&'static str]) -> EventReceiver {
        EventReceiver {
            inner: self.sender.subscribe(),
            only: Some(event_types.to_vec()),
        }
    }

    /// Live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Per-subscriber buffer size.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// One subscription to an [`EventBus`].
#[derive(Debug)]
pub struct EventReceiver {
    inner: broadcast::Receiver<Arc<LoadoutEvent>>,
    only: Option<Vec<&'static str>>,
}

impl EventReceiver {
    fn wants(&self, event: &LoadoutEvent) -> bool {
        self.only
            .as_ref()
            .is_none_or(|kinds| kinds.contains(&event.event_type()))
    }

    /// Wait for the next matching event. `None` once every bus handle is
    /// gone.
    pub async fn recv(&mut self) -> Option<Arc<LoadoutEvent>> {
        loop {
            match self.inner.recv().await {
                Ok(event) if self.wants(&event) => return Some(event),
                Ok(_) => {},
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "Event subscriber fell behind");
                },
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next buffered matching event, without waiting.
    pub fn try_recv(&mut self) -> Option<Arc<LoadoutEvent>> {
        loop {
            match self.inner.try_recv() {
                Ok(event) if self.wants(&event) => return Some(event),
                Ok(_) => {},
                Err(TryRecvError::Lagged(missed)) => {
                    warn!(missed, "Event subscriber fell behind");
                },
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    /// Every buffered matching event.
    pub fn drain(&mut self) -> Vec<Arc<LoadoutEvent>> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventMetadata;

    fn unloaded(id: &str) -> LoadoutEvent {
        LoadoutEvent::ModuleUnloaded {
            metadata: EventMetadata::new("test"),
            module_id: id.to_string(),
            clean: true,
        }
    }

    fn changed(to: &str) -> LoadoutEvent {
        LoadoutEvent::ProfileChanged {
            metadata: EventMetadata::new("test"),
            from: None,
            to: to.into(),
            kept: 0,
            unloaded: 0,
            loaded: 1,
            forced: false,
            duration_ms: 1,
        }
    }

    #[test]
    fn test_new_bus_has_no_subscribers() {
        let bus = EventBus::new();
        assert_eq!(bus.capacity(), DEFAULT_CHANNEL_CAPACITY);
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.publish(unloaded("git")), 0);
    }

    #[tokio::test]
    async fn test_subscriber_receives_in_order() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        assert_eq!(bus.publish(unloaded("git")), 1);
        bus.publish(changed("core"));

        assert_eq!(rx.recv().await.unwrap().event_type(), "module_unloaded");
        assert_eq!(rx.recv().await.unwrap().event_type(), "profile_changed");
    }

    #[test]
    fn test_clones_share_channel() {
        let bus = EventBus::new();
        let clone = bus.clone();
        let mut rx = bus.subscribe();

        clone.publish(unloaded("git"));
        assert!(rx.try_recv().is_some());
        assert_eq!(clone.subscriber_count(), 1);
    }

    #[test]
    fn test_type_filter_skips_other_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_types(&["profile_changed"]);

        bus.publish(unloaded("git"));
        bus.publish(changed("core"));

        assert_eq!(rx.try_recv().unwrap().event_type(), "profile_changed");
        assert!(rx.try_recv().is_none());
    }

    #[test]
    fn test_lagging_subscriber_keeps_newest() {
        let bus = EventBus::with_capacity(2);
        let mut rx = bus.subscribe();
        for id in ["a", "b", "c", "d"] {
            bus.publish(unloaded(id));
        }

        let ids: Vec<String> = rx
            .drain()
            .iter()
            .map(|e| match e.as_ref() {
                LoadoutEvent::ModuleUnloaded { module_id, .. } => module_id.clone(),
                other => panic!("unexpected event: {other:?}"),
            })
            .collect();
        assert_eq!(ids, vec!["c", "d"]);
    }

    #[tokio::test]
    async fn test_recv_ends_when_bus_dropped() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        drop(bus);
        assert!(rx.recv().await.is_none());
    }
}
