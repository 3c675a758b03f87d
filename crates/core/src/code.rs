//! Room code generation and validation
//!
//! Rooms are addressed by a short 6-character code. The alphabet excludes
//! visually ambiguous characters (0/O, 1/I) so codes survive being read
//! aloud or scribbled on a whiteboard.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Characters a room code may contain.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Length of a room code.
pub const CODE_LEN: usize = 6;

/// A validated, uppercase room code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode(String);

impl RoomCode {
    /// Generate a fresh random code.
    ///
    /// Collisions are statistically negligible at this keyspace; callers
    /// that insist can retry on a unique-constraint violation.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let code = (0..CODE_LEN)
            .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
            .collect();
        Self(code)
    }

    /// Parse user input into a room code.
    ///
    /// Input is trimmed and normalized to uppercase before validation.
    pub fn parse(input: &str) -> Result<Self> {
        let normalized = input.trim().to_ascii_uppercase();
        if normalized.len() != CODE_LEN {
            return Err(Error::Validation(format!(
                "Room code must be {CODE_LEN} characters, got {}",
                normalized.len()
            )));
        }
        if let Some(bad) = normalized
            .bytes()
            .find(|b| !CODE_ALPHABET.contains(b))
        {
            return Err(Error::Validation(format!(
                "Room code contains invalid character '{}'",
                bad as char
            )));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RoomCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
