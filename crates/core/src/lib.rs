//! Pokerplan Core Library
//!
//! Data model, statistics, storage, and the voting state machine for the
//! pokerplan estimation tool.

pub mod code;
pub mod config;
pub mod error;
pub mod invariants;
pub mod models;
pub mod service;
pub mod stats;
pub mod storage;

pub use code::RoomCode;
pub use config::EstimationConfig;
pub use error::{Error, Result};
pub use models::*;
pub use service::RoomService;
pub use stats::VoteStatistics;
pub use storage::{
    Database, HistoryRepository, ParticipantRepository, RoomRepository, Storage, StoryRepository,
    VoteRepository,
};
