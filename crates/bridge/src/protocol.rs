//! Bridge wire types and the transport contract

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;

/// Default numeric field holding story points on the tracker side.
pub const DEFAULT_POINT_FIELD: &str = "customfield_10166";

/// Tracker credentials, held in memory for the duration of one publish.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub token: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            token: token.into(),
        }
    }
}

// The token must never leak into logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// One estimate to publish to one issue.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub base_url: String,
    pub issue_key: String,
    pub credentials: Credentials,
    pub points: f64,
    /// Post a templated comment on the issue.
    pub add_comment: bool,
    /// Numeric fields to set to the point value; empty skips the update.
    pub point_fields: Vec<String>,
}

impl PublishRequest {
    pub fn new(
        base_url: impl Into<String>,
        issue_key: impl Into<String>,
        credentials: Credentials,
        points: f64,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            issue_key: issue_key.into(),
            credentials,
            points,
            add_comment: true,
            point_fields: vec![DEFAULT_POINT_FIELD.to_string()],
        }
    }
}

/// Per-action results of a publish.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PublishOutcome {
    pub comment_added: bool,
    pub fields_updated: bool,
    pub updated_fields: Vec<String>,
    /// Set when the publish succeeded overall but a secondary action failed.
    pub warning: Option<String>,
}

/// HTTP-ish method of a bridge round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
    Get,
    Post,
    Put,
}

/// A single request handed to the transport.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    /// Header name-value pairs, authorization included.
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    /// The transport must give up after this long.
    pub timeout: Duration,
}

/// The transport's answer to one round trip.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A single timeout-bounded request/response exchange with the tracker.
///
/// Implemented by whatever actually carries the bytes: an HTTP client, the
/// browser-extension relay, or a mock in tests. A transport failure (DNS,
/// timeout, dropped relay) is reported as [`BridgeError::Network`]; an HTTP
/// error status is NOT a transport failure and must come back as a response.
pub trait BridgeTransport {
    fn round_trip(&self, request: &ApiRequest) -> std::result::Result<ApiResponse, BridgeError>;
}
