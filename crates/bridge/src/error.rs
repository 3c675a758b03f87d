//! Error types for the issue-tracker bridge

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Permission denied: {0}")]
    Permission(String),

    #[error("Issue not found: {0}")]
    IssueNotFound(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Tracker API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
