//! Participant storage operations

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use tracing::instrument;

use super::parse::{parse_datetime, parse_datetime_opt, parse_room_code, OptionalExt};
use crate::code::RoomCode;
use crate::error::Result;
use crate::models::{Participant, ParticipantView};

pub struct ParticipantStore<'a> {
    conn: &'a Connection,
}

impl<'a> ParticipantStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert a participant, or merge onto an existing row of the same name.
    ///
    /// Rejoin semantics: facilitator status and heartbeat are taken from the
    /// new row (last writer wins), while `joined_at` and the voter/observer
    /// flag of the original row are kept.
    #[instrument(skip(self, participant), fields(code = %participant.room_code, name = %participant.name))]
    pub fn upsert(&self, participant: &Participant) -> Result<()> {
        self.conn.execute(
            "INSERT INTO participants (room_code, name, is_facilitator, is_voter, joined_at, last_seen_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (room_code, name)
             DO UPDATE SET is_facilitator = excluded.is_facilitator,
                           last_seen_at = excluded.last_seen_at",
            params![
                participant.room_code.as_str(),
                participant.name,
                participant.is_facilitator as i32,
                participant.is_voter as i32,
                participant.joined_at.to_rfc3339(),
                participant.last_seen_at.map(|at| at.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    /// Find a participant by name
    #[instrument(skip(self))]
    pub fn find(&self, code: &RoomCode, name: &str) -> Result<Option<Participant>> {
        let mut stmt = self.conn.prepare(
            "SELECT room_code, name, is_facilitator, is_voter, joined_at, last_seen_at
             FROM participants WHERE room_code = ?1 AND name = ?2",
        )?;

        let participant = stmt
            .query_row(params![code.as_str(), name], |row| {
                Ok(Participant {
                    room_code: parse_room_code(&row.get::<_, String>(0)?)?,
                    name: row.get(1)?,
                    is_facilitator: row.get::<_, i32>(2)? != 0,
                    is_voter: row.get::<_, i32>(3)? != 0,
                    joined_at: parse_datetime(&row.get::<_, String>(4)?)?,
                    last_seen_at: parse_datetime_opt(row.get::<_, Option<String>>(5)?)?,
                })
            })
            .optional()?;

        Ok(participant)
    }

    /// List the roster with each participant's current vote
    #[instrument(skip(self))]
    pub fn list(&self, code: &RoomCode) -> Result<Vec<ParticipantView>> {
        let mut stmt = self.conn.prepare(
            "SELECT p.name, p.is_facilitator, p.is_voter, v.value
             FROM participants p
             LEFT JOIN votes v ON v.room_code = p.room_code AND v.participant_name = p.name
             WHERE p.room_code = ?1
             ORDER BY p.joined_at, p.name",
        )?;

        let views = stmt
            .query_map(params![code.as_str()], |row| {
                Ok(ParticipantView {
                    name: row.get(0)?,
                    is_facilitator: row.get::<_, i32>(1)? != 0,
                    is_voter: row.get::<_, i32>(2)? != 0,
                    vote: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(views)
    }

    /// Grant or revoke facilitator status
    #[instrument(skip(self))]
    pub fn set_facilitator(&self, code: &RoomCode, name: &str, is_facilitator: bool) -> Result<()> {
        self.conn.execute(
            "UPDATE participants SET is_facilitator = ?1 WHERE room_code = ?2 AND name = ?3",
            params![is_facilitator as i32, code.as_str(), name],
        )?;
        Ok(())
    }

    /// Toggle between voter and observer
    #[instrument(skip(self))]
    pub fn set_voter(&self, code: &RoomCode, name: &str, is_voter: bool) -> Result<()> {
        self.conn.execute(
            "UPDATE participants SET is_voter = ?1 WHERE room_code = ?2 AND name = ?3",
            params![is_voter as i32, code.as_str(), name],
        )?;
        Ok(())
    }

    /// Remove a participant; their vote row cascades
    #[instrument(skip(self))]
    pub fn remove(&self, code: &RoomCode, name: &str) -> Result<()> {
        self.conn.execute(
            "DELETE FROM participants WHERE room_code = ?1 AND name = ?2",
            params![code.as_str(), name],
        )?;
        Ok(())
    }

    /// Refresh the heartbeat timestamp.
    ///
    /// Returns false when no row was updated - the participant has been
    /// removed, which doubles as the kick signal for polling clients.
    #[instrument(skip(self))]
    pub fn record_heartbeat(&self, code: &RoomCode, name: &str, at: DateTime<Utc>) -> Result<bool> {
        let updated = self.conn.execute(
            "UPDATE participants SET last_seen_at = ?1 WHERE room_code = ?2 AND name = ?3",
            params![at.to_rfc3339(), code.as_str(), name],
        )?;
        Ok(updated > 0)
    }
}
