//! Storage repository traits
//!
//! These traits define the persistence interface, allowing for different
//! implementations (SQLite, mock, future network backend). The room state
//! machine only ever talks to these.

use chrono::{DateTime, Utc};

use crate::code::RoomCode;
use crate::error::Result;
use crate::models::{
    NewStory, Participant, ParticipantView, Room, RoomSnapshot, Story, Vote, VoteHistoryEntry,
};

/// Room repository operations
pub trait RoomRepository {
    /// Create a new room
    fn create_room(&self, room: &Room) -> Result<()>;

    /// Find a room by code
    fn find_room(&self, code: &RoomCode) -> Result<Option<Room>>;

    /// Update a room's state fields
    fn update_room(&self, room: &Room) -> Result<()>;

    /// Delete a room (children cascade)
    fn delete_room(&self, code: &RoomCode) -> Result<()>;

    /// Bump a room's last-activity timestamp
    fn touch_room(&self, code: &RoomCode, at: DateTime<Utc>) -> Result<()>;

    /// Delete rooms whose last activity predates the cutoff; returns the count
    fn sweep_idle_rooms(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    /// Load the full consistent view of a room in a single read
    fn load_snapshot(&self, code: &RoomCode) -> Result<Option<RoomSnapshot>>;
}

/// Participant repository operations
pub trait ParticipantRepository {
    /// Insert a participant, or merge onto the existing row of the same name
    /// (last writer wins; `joined_at` and `is_voter` of the original are kept)
    fn upsert_participant(&self, participant: &Participant) -> Result<()>;

    /// Find a participant by name
    fn find_participant(&self, code: &RoomCode, name: &str) -> Result<Option<Participant>>;

    /// List the roster with current votes, ordered by join time
    fn list_participants(&self, code: &RoomCode) -> Result<Vec<ParticipantView>>;

    /// Grant or revoke facilitator status
    fn set_facilitator(&self, code: &RoomCode, name: &str, is_facilitator: bool) -> Result<()>;

    /// Toggle between voter and observer
    fn set_voter(&self, code: &RoomCode, name: &str, is_voter: bool) -> Result<()>;

    /// Remove a participant (their vote row cascades)
    fn remove_participant(&self, code: &RoomCode, name: &str) -> Result<()>;

    /// Refresh the heartbeat timestamp; false if the participant is gone
    fn record_heartbeat(&self, code: &RoomCode, name: &str, at: DateTime<Utc>) -> Result<bool>;
}

/// Story repository operations
pub trait StoryRepository {
    /// Append one story at the end of the queue
    fn append_story(&self, code: &RoomCode, story: &NewStory) -> Result<Story>;

    /// Append several stories, preserving their order, atomically
    fn append_stories(&self, code: &RoomCode, stories: &[NewStory]) -> Result<Vec<Story>>;

    /// Find a story by id
    fn find_story(&self, id: i64) -> Result<Option<Story>>;

    /// List a room's stories ordered by queue position
    fn list_stories(&self, code: &RoomCode) -> Result<Vec<Story>>;

    /// Update a story's mutable fields (title, link, estimate, voted_at)
    fn update_story(&self, story: &Story) -> Result<()>;

    /// Delete a story and compact the remaining order indices, atomically
    fn delete_story(&self, code: &RoomCode, id: i64) -> Result<()>;

    /// Rewrite all order indices to match the given id sequence, atomically
    fn reorder_stories(&self, code: &RoomCode, ordered_ids: &[i64]) -> Result<()>;
}

/// Vote repository operations
pub trait VoteRepository {
    /// Insert or replace a participant's vote
    fn upsert_vote(
        &self,
        code: &RoomCode,
        participant_name: &str,
        value: f64,
        at: DateTime<Utc>,
    ) -> Result<()>;

    /// Delete a participant's vote
    fn delete_vote(&self, code: &RoomCode, participant_name: &str) -> Result<()>;

    /// List the current vote generation
    fn list_votes(&self, code: &RoomCode) -> Result<Vec<Vote>>;

    /// Clear all votes for a room
    fn clear_votes(&self, code: &RoomCode) -> Result<()>;
}

/// Vote history repository operations (append-only)
pub trait HistoryRepository {
    /// Append one reveal batch, atomically
    fn append_history(&self, entries: &[VoteHistoryEntry]) -> Result<()>;

    /// List all history records for a room, newest reveal first
    fn list_history(&self, code: &RoomCode) -> Result<Vec<VoteHistoryEntry>>;
}

/// Combined storage interface
///
/// Provides access to all repository operations.
/// Implementations may be backed by SQLite, mocks, or network.
pub trait Storage:
    RoomRepository + ParticipantRepository + StoryRepository + VoteRepository + HistoryRepository
{
}

// Blanket implementation: any type implementing all traits implements Storage
impl<T> Storage for T where
    T: RoomRepository + ParticipantRepository + StoryRepository + VoteRepository + HistoryRepository
{
}
