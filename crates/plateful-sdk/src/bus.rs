//! Cross-screen fan-out of confirmed toggle changes.
//!
//! Every surface showing an entity (feed card, visit detail, profile header)
//! subscribes here instead of polling. Delivery is at most once and there is
//! no replay: a surface that was not subscribed when an event went out picks
//! up the correct state on its next fetch. Events for one entity arrive in
//! the order they were published.

use crate::features::Feature;
use async_stream::stream;
use futures::stream::Stream;
use plateful_core::EntityId;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

/// Events published on the bus.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntityEvent<K> {
    /// The server confirmed a new state for one of the entity's toggles.
    StateChanged {
        feature: Feature,
        id: K,
        state: bool,
        count: u64,
    },
    /// The entity no longer exists.
    Deleted { id: K },
}

impl<K> EntityEvent<K> {
    pub fn id(&self) -> &K {
        match self {
            EntityEvent::StateChanged { id, .. } | EntityEvent::Deleted { id } => id,
        }
    }
}

/// Typed broadcast channel for one kind of entity.
#[derive(Clone)]
pub struct EventBus<K: EntityId> {
    tx: broadcast::Sender<EntityEvent<K>>,
}

impl<K: EntityId> EventBus<K> {
    /// Create a bus keeping up to `capacity` undelivered events per
    /// subscriber. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Announce a confirmed state. Returns how many subscribers it reached.
    pub fn publish(&self, feature: Feature, id: K, state: bool, count: u64) -> usize {
        self.send(EntityEvent::StateChanged {
            feature,
            id,
            state,
            count,
        })
    }

    /// Announce that an entity was deleted.
    pub fn publish_deleted(&self, id: K) -> usize {
        self.send(EntityEvent::Deleted { id })
    }

    fn send(&self, event: EntityEvent<K>) -> usize {
        // No subscribers is not an error; nobody is looking.
        self.tx.send(event).unwrap_or(0)
    }

    /// Subscribe to every event on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<EntityEvent<K>> {
        self.tx.subscribe()
    }

    /// Subscribe to the events of a single entity.
    ///
    /// A subscriber that falls behind skips what it missed rather than
    /// failing. The stream ends when the bus is dropped.
    pub fn subscribe_entity(&self, id: K) -> impl Stream<Item = EntityEvent<K>> + Send + 'static {
        let mut rx = self.tx.subscribe();
        stream! {
            loop {
                match rx.recv().await {
                    Ok(event) if event.id() == &id => yield event,
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(%id, skipped, "subscriber lagged, skipping missed events");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let bus: EventBus<&str> = EventBus::new(8);
        assert_eq!(bus.publish(Feature::Like, "v1", true, 1), 0);
    }

    #[tokio::test]
    async fn test_zero_capacity_still_delivers() {
        let bus = EventBus::new(0);
        let mut rx = bus.subscribe();

        assert_eq!(bus.publish_deleted("v1"), 1);
        assert_eq!(rx.recv().await.unwrap(), EntityEvent::Deleted { id: "v1" });
    }

    #[tokio::test]
    async fn test_all_subscribers_receive() {
        let bus = EventBus::new(8);
        let mut feed = bus.subscribe();
        let mut detail = bus.subscribe();

        assert_eq!(bus.publish(Feature::Like, "v1", true, 5), 2);

        let expected = EntityEvent::StateChanged {
            feature: Feature::Like,
            id: "v1",
            state: true,
            count: 5,
        };
        assert_eq!(feed.recv().await.unwrap(), expected);
        assert_eq!(detail.recv().await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_no_replay_for_late_subscribers() {
        let bus = EventBus::new(8);
        bus.publish(Feature::Save, "v1", true, 1);

        let mut late = bus.subscribe();
        bus.publish_deleted("v1");

        assert_eq!(late.recv().await.unwrap(), EntityEvent::Deleted { id: "v1" });
    }

    #[tokio::test]
    async fn test_entity_stream_filters_and_orders() {
        let bus = EventBus::new(16);
        let stream = bus.subscribe_entity("v1");
        futures::pin_mut!(stream);

        bus.publish(Feature::Like, "v1", true, 1);
        bus.publish(Feature::Like, "v2", true, 9);
        bus.publish(Feature::Like, "v1", false, 0);
        bus.publish_deleted("v1");

        let first = stream.next().await.unwrap();
        let second = stream.next().await.unwrap();
        let third = stream.next().await.unwrap();

        assert!(matches!(first, EntityEvent::StateChanged { state: true, .. }));
        assert!(matches!(second, EntityEvent::StateChanged { state: false, .. }));
        assert_eq!(third, EntityEvent::Deleted { id: "v1" });
    }

    #[tokio::test]
    async fn test_lagging_entity_stream_skips() {
        let bus = EventBus::new(2);
        let stream = bus.subscribe_entity("v1");
        futures::pin_mut!(stream);

        for count in 0..5 {
            bus.publish(Feature::Like, "v1", count % 2 == 0, count);
        }

        match stream.next().await.unwrap() {
            EntityEvent::StateChanged { count, .. } => assert_eq!(count, 3),
            other => panic!("unexpected event {:?}", other),
        }
    }
}
