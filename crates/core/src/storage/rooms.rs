//! Room storage operations

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use tracing::instrument;

use super::parse::{parse_datetime, parse_datetime_opt, parse_room_code, phase_from_str, OptionalExt};
use crate::code::RoomCode;
use crate::error::Result;
use crate::models::{Room, RoomSnapshot, VotingTimer};

pub struct RoomStore<'a> {
    conn: &'a Connection,
}

impl<'a> RoomStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Create a new room
    #[instrument(skip(self, room), fields(code = %room.code))]
    pub fn create(&self, room: &Room) -> Result<()> {
        self.conn.execute(
            "INSERT INTO rooms (code, voting_phase, current_story_index, timer_duration,
                                timer_ends_at, issue_tracker_base_url, created_at, last_activity)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                room.code.as_str(),
                room.phase.as_str(),
                room.current_story_index,
                room.timer.map(|t| t.duration_seconds),
                room.timer.map(|t| t.ends_at.to_rfc3339()),
                room.issue_tracker_base_url,
                room.created_at.to_rfc3339(),
                room.last_activity.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Find a room by code
    #[instrument(skip(self))]
    pub fn find(&self, code: &RoomCode) -> Result<Option<Room>> {
        let mut stmt = self.conn.prepare(
            "SELECT code, voting_phase, current_story_index, timer_duration, timer_ends_at,
                    issue_tracker_base_url, created_at, last_activity
             FROM rooms WHERE code = ?1",
        )?;

        let room = stmt
            .query_row(params![code.as_str()], row_to_room)
            .optional()?;

        Ok(room)
    }

    /// Update a room's state fields
    #[instrument(skip(self, room), fields(code = %room.code))]
    pub fn update(&self, room: &Room) -> Result<()> {
        self.conn.execute(
            "UPDATE rooms SET voting_phase = ?1, current_story_index = ?2, timer_duration = ?3,
                              timer_ends_at = ?4, issue_tracker_base_url = ?5, last_activity = ?6
             WHERE code = ?7",
            params![
                room.phase.as_str(),
                room.current_story_index,
                room.timer.map(|t| t.duration_seconds),
                room.timer.map(|t| t.ends_at.to_rfc3339()),
                room.issue_tracker_base_url,
                room.last_activity.to_rfc3339(),
                room.code.as_str(),
            ],
        )?;
        Ok(())
    }

    /// Delete a room; participants, stories, votes and history cascade
    #[instrument(skip(self))]
    pub fn delete(&self, code: &RoomCode) -> Result<()> {
        self.conn
            .execute("DELETE FROM rooms WHERE code = ?1", params![code.as_str()])?;
        Ok(())
    }

    /// Bump last_activity
    #[instrument(skip(self))]
    pub fn touch(&self, code: &RoomCode, at: DateTime<Utc>) -> Result<()> {
        self.conn.execute(
            "UPDATE rooms SET last_activity = ?1 WHERE code = ?2",
            params![at.to_rfc3339(), code.as_str()],
        )?;
        Ok(())
    }

    /// Delete rooms idle since before the cutoff
    #[instrument(skip(self))]
    pub fn sweep_idle(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let deleted = self.conn.execute(
            "DELETE FROM rooms WHERE last_activity < ?1",
            params![cutoff.to_rfc3339()],
        )?;
        Ok(deleted as u64)
    }

    /// Load room, roster (with votes) and story queue in one consistent read
    #[instrument(skip(self))]
    pub fn load_snapshot(&self, code: &RoomCode) -> Result<Option<RoomSnapshot>> {
        let tx = self.conn.unchecked_transaction()?;

        let Some(room) = RoomStore::new(&tx).find(code)? else {
            return Ok(None);
        };
        let participants = super::participants::ParticipantStore::new(&tx).list(code)?;
        let stories = super::stories::StoryStore::new(&tx).list(code)?;

        tx.commit()?;

        Ok(Some(RoomSnapshot {
            room,
            participants,
            stories,
        }))
    }
}

fn row_to_room(row: &Row<'_>) -> std::result::Result<Room, rusqlite::Error> {
    let duration: Option<u32> = row.get(3)?;
    let ends_at = parse_datetime_opt(row.get::<_, Option<String>>(4)?)?;
    let timer = match (duration, ends_at) {
        (Some(duration_seconds), Some(ends_at)) => Some(VotingTimer {
            duration_seconds,
            ends_at,
        }),
        _ => None,
    };

    Ok(Room {
        code: parse_room_code(&row.get::<_, String>(0)?)?,
        phase: phase_from_str(&row.get::<_, String>(1)?),
        current_story_index: row.get(2)?,
        timer,
        issue_tracker_base_url: row.get(5)?,
        created_at: parse_datetime(&row.get::<_, String>(6)?)?,
        last_activity: parse_datetime(&row.get::<_, String>(7)?)?,
    })
}
