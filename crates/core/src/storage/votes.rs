//! Vote storage operations

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use tracing::instrument;

use super::parse::{parse_datetime, parse_room_code};
use crate::code::RoomCode;
use crate::error::Result;
use crate::models::Vote;

pub struct VoteStore<'a> {
    conn: &'a Connection,
}

impl<'a> VoteStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert or replace a participant's vote
    #[instrument(skip(self))]
    pub fn upsert(
        &self,
        code: &RoomCode,
        participant_name: &str,
        value: f64,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO votes (room_code, participant_name, value, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (room_code, participant_name)
             DO UPDATE SET value = excluded.value, created_at = excluded.created_at",
            params![code.as_str(), participant_name, value, at.to_rfc3339()],
        )?;
        Ok(())
    }

    /// Delete a participant's vote
    #[instrument(skip(self))]
    pub fn delete(&self, code: &RoomCode, participant_name: &str) -> Result<()> {
        self.conn.execute(
            "DELETE FROM votes WHERE room_code = ?1 AND participant_name = ?2",
            params![code.as_str(), participant_name],
        )?;
        Ok(())
    }

    /// List the current vote generation
    #[instrument(skip(self))]
    pub fn list(&self, code: &RoomCode) -> Result<Vec<Vote>> {
        let mut stmt = self.conn.prepare(
            "SELECT room_code, participant_name, value, created_at
             FROM votes WHERE room_code = ?1 ORDER BY participant_name",
        )?;

        let votes = stmt
            .query_map(params![code.as_str()], |row| {
                Ok(Vote {
                    room_code: parse_room_code(&row.get::<_, String>(0)?)?,
                    participant_name: row.get(1)?,
                    value: row.get(2)?,
                    created_at: parse_datetime(&row.get::<_, String>(3)?)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(votes)
    }

    /// Clear all votes for a room
    #[instrument(skip(self))]
    pub fn clear(&self, code: &RoomCode) -> Result<()> {
        self.conn.execute(
            "DELETE FROM votes WHERE room_code = ?1",
            params![code.as_str()],
        )?;
        Ok(())
    }
}
