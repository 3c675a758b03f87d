//! Change notifications and watcher events

use serde::{Deserialize, Serialize};

use pokerplan_core::{RoomCode, RoomSnapshot};

/// Which entity collection changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Room,
    Participant,
    Story,
    Vote,
}

/// A change notification.
///
/// Carries no state on purpose: receivers must refetch the room snapshot
/// rather than trust a payload, which avoids partial-update races across
/// the four related collections. Delivery is at-least-once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeNotice {
    pub room_code: RoomCode,
    pub entity: EntityKind,
}

impl ChangeNotice {
    pub fn new(room_code: RoomCode, entity: EntityKind) -> Self {
        Self { room_code, entity }
    }
}

/// Events a [`crate::RoomWatcher`] delivers to its consumer.
#[derive(Debug, Clone)]
pub enum RoomEvent {
    /// A fresh consistent view of the room.
    Snapshot(RoomSnapshot),
    /// The locally-known participant is gone from the roster. Raised once;
    /// the stored identity is cleared and a rejoin is required.
    Kicked,
    /// The notification stream ended; no further events will arrive.
    Closed,
}
