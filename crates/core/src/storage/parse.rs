//! Database value parsing utilities
//!
//! Provides error-safe parsing of stored values.

use chrono::{DateTime, Utc};
use rusqlite::Error as SqlError;
use uuid::Uuid;

use crate::code::RoomCode;
use crate::models::VotingPhase;

fn conversion_failure<E>(err: E) -> SqlError
where
    E: std::error::Error + Send + Sync + 'static,
{
    SqlError::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(err))
}

/// Parse a room code from a database string column.
pub fn parse_room_code(s: &str) -> Result<RoomCode, SqlError> {
    RoomCode::parse(s).map_err(|e| {
        SqlError::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            format!("invalid room code: {e}").into(),
        )
    })
}

/// Parse a UUID from a database string column.
pub fn parse_uuid(s: &str) -> Result<Uuid, SqlError> {
    Uuid::parse_str(s).map_err(conversion_failure)
}

/// Parse a DateTime from an RFC3339 string.
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, SqlError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(conversion_failure)
}

/// Parse an optional DateTime from an RFC3339 string.
pub fn parse_datetime_opt(s: Option<String>) -> Result<Option<DateTime<Utc>>, SqlError> {
    s.map(|s| parse_datetime(&s)).transpose()
}

/// Parse a voting phase from its stored text form.
pub fn phase_from_str(s: &str) -> VotingPhase {
    match s {
        "voting" => VotingPhase::Voting,
        "revealed" => VotingPhase::Revealed,
        _ => VotingPhase::Idle,
    }
}

/// Extension trait for converting rusqlite Results to Option.
pub trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>, SqlError>;
}

impl<T> OptionalExt<T> for Result<T, SqlError> {
    fn optional(self) -> Result<Option<T>, SqlError> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(SqlError::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
