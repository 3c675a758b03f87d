//! Participant model
//!
//! Participants are identified by `(room_code, name)` - the display name is
//! the identity key. Rejoining with the same name merges into the existing
//! row (last writer wins); two people cannot share a name in one room.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::code::RoomCode;

/// One human in a room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub room_code: RoomCode,
    pub name: String,
    pub is_facilitator: bool,
    /// False marks an observer: excluded from tallies and progress counters.
    pub is_voter: bool,
    pub joined_at: DateTime<Utc>,
    /// Heartbeat timestamp, refreshed while the client is connected.
    pub last_seen_at: Option<DateTime<Utc>>,
}

impl Participant {
    pub fn new(room_code: RoomCode, name: String, is_facilitator: bool) -> Self {
        Self {
            room_code,
            name,
            is_facilitator,
            is_voter: true,
            joined_at: Utc::now(),
            last_seen_at: None,
        }
    }
}

/// Roster entry with the participant's current vote, for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantView {
    pub name: String,
    pub is_facilitator: bool,
    pub is_voter: bool,
    pub vote: Option<f64>,
}
