//! Vote history storage operations
//!
//! Append-only: rows are written once at reveal time and never touched.

use rusqlite::{params, Connection};
use tracing::instrument;

use super::parse::{parse_datetime, parse_datetime_opt, parse_room_code, parse_uuid};
use crate::code::RoomCode;
use crate::error::Result;
use crate::models::VoteHistoryEntry;

pub struct HistoryStore<'a> {
    conn: &'a Connection,
}

impl<'a> HistoryStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Append one reveal batch atomically
    #[instrument(skip(self, entries), fields(count = entries.len()))]
    pub fn append(&self, entries: &[VoteHistoryEntry]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO vote_history
                     (id, room_code, story_id, story_title, participant_name, value, voted_at, revealed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for entry in entries {
                stmt.execute(params![
                    entry.id.to_string(),
                    entry.room_code.as_str(),
                    entry.story_id,
                    entry.story_title,
                    entry.participant_name,
                    entry.value,
                    entry.voted_at.map(|at| at.to_rfc3339()),
                    entry.revealed_at.to_rfc3339(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// List all history records for a room, newest reveal first
    #[instrument(skip(self))]
    pub fn list(&self, code: &RoomCode) -> Result<Vec<VoteHistoryEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, room_code, story_id, story_title, participant_name, value, voted_at, revealed_at
             FROM vote_history WHERE room_code = ?1
             ORDER BY revealed_at DESC, participant_name",
        )?;

        let entries = stmt
            .query_map(params![code.as_str()], |row| {
                Ok(VoteHistoryEntry {
                    id: parse_uuid(&row.get::<_, String>(0)?)?,
                    room_code: parse_room_code(&row.get::<_, String>(1)?)?,
                    story_id: row.get(2)?,
                    story_title: row.get(3)?,
                    participant_name: row.get(4)?,
                    value: row.get(5)?,
                    voted_at: parse_datetime_opt(row.get::<_, Option<String>>(6)?)?,
                    revealed_at: parse_datetime(&row.get::<_, String>(7)?)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }
}
