//! Pokerplan Issue-Tracker Bridge
//!
//! Publishes a finalized estimate back to an issue tracker: optionally a
//! templated comment, optionally one or more numeric point fields. The
//! actual wire transport (browser extension relay, HTTP client, test mock)
//! is behind [`BridgeTransport`]: one timeout-bounded round trip per call.
//! Credentials pass through in memory and are never persisted here.

pub mod error;
pub mod protocol;
pub mod publish;

pub use error::{BridgeError, Result};
pub use protocol::{
    ApiRequest, ApiResponse, BridgeTransport, Credentials, Method, PublishOutcome, PublishRequest,
};
pub use publish::IssuePublisher;
