//! Error types for the synchronization layer

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Event stream closed")]
    StreamClosed,

    #[error("Core error: {0}")]
    Core(#[from] pokerplan_core::Error),
}

pub type Result<T> = std::result::Result<T, SyncError>;
