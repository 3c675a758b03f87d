//! Vote model
//!
//! Votes are scoped to the current story implicitly: the whole set is
//! cleared whenever voting (re)starts or the room advances, so at most one
//! generation of votes is live per room at a time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::code::RoomCode;

/// One participant's submitted value for the story currently being voted on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    pub room_code: RoomCode,
    pub participant_name: String,
    pub value: f64,
    pub created_at: DateTime<Utc>,
}
