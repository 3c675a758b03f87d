//! In-process change-notification hub
//!
//! One broadcast channel per room. Mutators publish after each successful
//! store operation; every subscriber of that room receives the notice.
//! Lagging subscribers drop old notices rather than block the sender -
//! harmless here, since a notice only ever means "refetch".

use std::collections::HashMap;

use tokio::sync::{broadcast, RwLock};
use tracing::{debug, instrument};

use pokerplan_core::RoomCode;

use crate::protocol::ChangeNotice;

/// Default per-subscriber notice buffer.
const DEFAULT_CAPACITY: usize = 64;

/// Fan-out hub keyed by room code.
pub struct ChangeHub {
    capacity: usize,
    channels: RwLock<HashMap<RoomCode, broadcast::Sender<ChangeNotice>>>,
}

impl ChangeHub {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribe to a room's change notices.
    ///
    /// The channel is created lazily on first subscription.
    #[instrument(skip(self))]
    pub async fn subscribe(&self, code: &RoomCode) -> broadcast::Receiver<ChangeNotice> {
        let mut channels = self.channels.write().await;
        channels
            .entry(code.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Publish a notice to every subscriber of its room.
    ///
    /// Returns the number of subscribers reached. Rooms without any
    /// subscriber are dropped from the map on the way out.
    #[instrument(skip(self), fields(code = %notice.room_code, entity = ?notice.entity))]
    pub async fn publish(&self, notice: ChangeNotice) -> usize {
        let reached = {
            let channels = self.channels.read().await;
            match channels.get(&notice.room_code) {
                Some(sender) => sender.send(notice.clone()).unwrap_or(0),
                None => 0,
            }
        };

        if reached == 0 {
            let mut channels = self.channels.write().await;
            if let Some(sender) = channels.get(&notice.room_code) {
                if sender.receiver_count() == 0 {
                    channels.remove(&notice.room_code);
                    debug!(code = %notice.room_code, "Dropped channel without subscribers");
                }
            }
        }

        reached
    }

    /// Number of rooms with a live channel.
    pub async fn room_count(&self) -> usize {
        self.channels.read().await.len()
    }
}

impl Default for ChangeHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::EntityKind;

    fn code(s: &str) -> RoomCode {
        RoomCode::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_publish_reaches_all_room_subscribers() {
        let hub = ChangeHub::new();
        let room = code("ABC234");
        let mut first = hub.subscribe(&room).await;
        let mut second = hub.subscribe(&room).await;

        let reached = hub
            .publish(ChangeNotice::new(room.clone(), EntityKind::Vote))
            .await;
        assert_eq!(reached, 2);
        assert_eq!(first.recv().await.unwrap().entity, EntityKind::Vote);
        assert_eq!(second.recv().await.unwrap().entity, EntityKind::Vote);
    }

    #[tokio::test]
    async fn test_rooms_are_isolated() {
        let hub = ChangeHub::new();
        let mut watching = hub.subscribe(&code("ABC234")).await;
        let _other = hub.subscribe(&code("XYZ789")).await;

        hub.publish(ChangeNotice::new(code("XYZ789"), EntityKind::Story))
            .await;
        assert!(watching.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_reaches_nobody() {
        let hub = ChangeHub::new();
        let reached = hub
            .publish(ChangeNotice::new(code("ABC234"), EntityKind::Room))
            .await;
        assert_eq!(reached, 0);
    }

    #[tokio::test]
    async fn test_abandoned_channel_is_pruned() {
        let hub = ChangeHub::new();
        let room = code("ABC234");
        drop(hub.subscribe(&room).await);
        assert_eq!(hub.room_count().await, 1);

        hub.publish(ChangeNotice::new(room, EntityKind::Room)).await;
        assert_eq!(hub.room_count().await, 0);
    }
}
