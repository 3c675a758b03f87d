//! Core data models

mod history;
mod participant;
mod room;
mod snapshot;
mod story;
mod vote;

pub use history::{RecordedVote, StoryHistory, VoteHistoryEntry};
pub use participant::{Participant, ParticipantView};
pub use room::{Room, VotingPhase, VotingTimer};
pub use snapshot::RoomSnapshot;
pub use story::{NewStory, Story};
pub use vote::Vote;
