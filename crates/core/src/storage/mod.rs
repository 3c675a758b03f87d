//! SQLite storage layer for pokerplan

mod history;
mod migrations;
mod parse;
mod participants;
mod rooms;
mod stories;
mod traits;
mod votes;

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::instrument;

use crate::code::RoomCode;
use crate::error::Result;
use crate::models::{
    NewStory, Participant, ParticipantView, Room, RoomSnapshot, Story, Vote, VoteHistoryEntry,
};

pub use history::HistoryStore;
pub use participants::ParticipantStore;
pub use rooms::RoomStore;
pub use stories::StoryStore;
pub use traits::{
    HistoryRepository, ParticipantRepository, RoomRepository, Storage, StoryRepository,
    VoteRepository,
};
pub use votes::VoteStore;

/// Main database handle
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Open in-memory database (for testing)
    #[instrument]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initialize database schema via migrations
    fn init(&self) -> Result<()> {
        migrations::run_migrations(&self.conn)?;
        Ok(())
    }

    /// Get current schema version
    pub fn schema_version(&self) -> u32 {
        self.conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap_or(0)
    }

    /// Get room store
    pub fn rooms(&self) -> RoomStore<'_> {
        RoomStore::new(&self.conn)
    }

    /// Get participant store
    pub fn participants(&self) -> ParticipantStore<'_> {
        ParticipantStore::new(&self.conn)
    }

    /// Get story store
    pub fn stories(&self) -> StoryStore<'_> {
        StoryStore::new(&self.conn)
    }

    /// Get vote store
    pub fn votes(&self) -> VoteStore<'_> {
        VoteStore::new(&self.conn)
    }

    /// Get vote history store
    pub fn history(&self) -> HistoryStore<'_> {
        HistoryStore::new(&self.conn)
    }
}

// Implement repository traits for Database
// This enables using Database through the trait interface

impl RoomRepository for Database {
    fn create_room(&self, room: &Room) -> Result<()> {
        self.rooms().create(room)
    }

    fn find_room(&self, code: &RoomCode) -> Result<Option<Room>> {
        self.rooms().find(code)
    }

    fn update_room(&self, room: &Room) -> Result<()> {
        self.rooms().update(room)
    }

    fn delete_room(&self, code: &RoomCode) -> Result<()> {
        self.rooms().delete(code)
    }

    fn touch_room(&self, code: &RoomCode, at: DateTime<Utc>) -> Result<()> {
        self.rooms().touch(code, at)
    }

    fn sweep_idle_rooms(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        self.rooms().sweep_idle(cutoff)
    }

    fn load_snapshot(&self, code: &RoomCode) -> Result<Option<RoomSnapshot>> {
        self.rooms().load_snapshot(code)
    }
}

impl ParticipantRepository for Database {
    fn upsert_participant(&self, participant: &Participant) -> Result<()> {
        self.participants().upsert(participant)
    }

    fn find_participant(&self, code: &RoomCode, name: &str) -> Result<Option<Participant>> {
        self.participants().find(code, name)
    }

    fn list_participants(&self, code: &RoomCode) -> Result<Vec<ParticipantView>> {
        self.participants().list(code)
    }

    fn set_facilitator(&self, code: &RoomCode, name: &str, is_facilitator: bool) -> Result<()> {
        self.participants().set_facilitator(code, name, is_facilitator)
    }

    fn set_voter(&self, code: &RoomCode, name: &str, is_voter: bool) -> Result<()> {
        self.participants().set_voter(code, name, is_voter)
    }

    fn remove_participant(&self, code: &RoomCode, name: &str) -> Result<()> {
        self.participants().remove(code, name)
    }

    fn record_heartbeat(&self, code: &RoomCode, name: &str, at: DateTime<Utc>) -> Result<bool> {
        self.participants().record_heartbeat(code, name, at)
    }
}

impl StoryRepository for Database {
    fn append_story(&self, code: &RoomCode, story: &NewStory) -> Result<Story> {
        self.stories().append(code, story)
    }

    fn append_stories(&self, code: &RoomCode, stories: &[NewStory]) -> Result<Vec<Story>> {
        self.stories().append_many(code, stories)
    }

    fn find_story(&self, id: i64) -> Result<Option<Story>> {
        self.stories().find(id)
    }

    fn list_stories(&self, code: &RoomCode) -> Result<Vec<Story>> {
        self.stories().list(code)
    }

    fn update_story(&self, story: &Story) -> Result<()> {
        self.stories().update(story)
    }

    fn delete_story(&self, code: &RoomCode, id: i64) -> Result<()> {
        self.stories().delete(code, id)
    }

    fn reorder_stories(&self, code: &RoomCode, ordered_ids: &[i64]) -> Result<()> {
        self.stories().reorder(code, ordered_ids)
    }
}

impl VoteRepository for Database {
    fn upsert_vote(
        &self,
        code: &RoomCode,
        participant_name: &str,
        value: f64,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.votes().upsert(code, participant_name, value, at)
    }

    fn delete_vote(&self, code: &RoomCode, participant_name: &str) -> Result<()> {
        self.votes().delete(code, participant_name)
    }

    fn list_votes(&self, code: &RoomCode) -> Result<Vec<Vote>> {
        self.votes().list(code)
    }

    fn clear_votes(&self, code: &RoomCode) -> Result<()> {
        self.votes().clear(code)
    }
}

impl HistoryRepository for Database {
    fn append_history(&self, entries: &[VoteHistoryEntry]) -> Result<()> {
        self.history().append(entries)
    }

    fn list_history(&self, code: &RoomCode) -> Result<Vec<VoteHistoryEntry>> {
        self.history().list(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_room(db: &Database) -> RoomCode {
        let code = RoomCode::generate();
        db.rooms().create(&Room::new(code.clone())).unwrap();
        code
    }

    fn join(db: &Database, code: &RoomCode, name: &str, facilitator: bool) {
        db.participants()
            .upsert(&Participant::new(code.clone(), name.to_string(), facilitator))
            .unwrap();
    }

    #[test]
    fn test_open_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path().join("pokerplan.db")).unwrap();
        assert!(db.schema_version() >= 3);
    }

    #[test]
    fn test_room_roundtrip() {
        let db = Database::open_in_memory().unwrap();
        let code = setup_room(&db);

        let found = db.rooms().find(&code).unwrap().unwrap();
        assert_eq!(found.code, code);
        assert!(found.timer.is_none());

        let missing = RoomCode::parse("ZZZZZ9").unwrap();
        assert!(db.rooms().find(&missing).unwrap().is_none());
    }

    #[test]
    fn test_participant_rejoin_keeps_voter_flag() {
        let db = Database::open_in_memory().unwrap();
        let code = setup_room(&db);
        join(&db, &code, "ana", false);
        db.participants().set_voter(&code, "ana", false).unwrap();

        // Rejoin under the same name: facilitator flag is taken from the
        // new row, observer status survives
        join(&db, &code, "ana", true);

        let ana = db.participants().find(&code, "ana").unwrap().unwrap();
        assert!(ana.is_facilitator);
        assert!(!ana.is_voter);
        assert_eq!(db.participants().list(&code).unwrap().len(), 1);
    }

    #[test]
    fn test_kick_cascades_vote_row() {
        let db = Database::open_in_memory().unwrap();
        let code = setup_room(&db);
        join(&db, &code, "ana", false);
        db.votes()
            .upsert(&code, "ana", 5.0, Utc::now())
            .unwrap();

        db.participants().remove(&code, "ana").unwrap();
        assert!(db.votes().list(&code).unwrap().is_empty());
    }

    #[test]
    fn test_heartbeat_reports_removal() {
        let db = Database::open_in_memory().unwrap();
        let code = setup_room(&db);
        join(&db, &code, "ana", false);

        assert!(db
            .participants()
            .record_heartbeat(&code, "ana", Utc::now())
            .unwrap());
        db.participants().remove(&code, "ana").unwrap();
        assert!(!db
            .participants()
            .record_heartbeat(&code, "ana", Utc::now())
            .unwrap());
    }

    #[test]
    fn test_story_append_assigns_dense_indices() {
        let db = Database::open_in_memory().unwrap();
        let code = setup_room(&db);

        let a = db.stories().append(&code, &NewStory::new("A")).unwrap();
        let b = db.stories().append(&code, &NewStory::new("B")).unwrap();
        assert_eq!(a.order_index, 0);
        assert_eq!(b.order_index, 1);
    }

    #[test]
    fn test_delete_story_compacts_indices() {
        let db = Database::open_in_memory().unwrap();
        let code = setup_room(&db);
        let _a = db.stories().append(&code, &NewStory::new("A")).unwrap();
        let b = db.stories().append(&code, &NewStory::new("B")).unwrap();
        let _c = db.stories().append(&code, &NewStory::new("C")).unwrap();

        db.stories().delete(&code, b.id).unwrap();

        let remaining = db.stories().list(&code).unwrap();
        let titles: Vec<_> = remaining.iter().map(|s| s.title.as_str()).collect();
        let indices: Vec<_> = remaining.iter().map(|s| s.order_index).collect();
        assert_eq!(titles, ["A", "C"]);
        assert_eq!(indices, [0, 1]);
    }

    #[test]
    fn test_reorder_roundtrip() {
        let db = Database::open_in_memory().unwrap();
        let code = setup_room(&db);
        let a = db.stories().append(&code, &NewStory::new("A")).unwrap();
        let b = db.stories().append(&code, &NewStory::new("B")).unwrap();
        let c = db.stories().append(&code, &NewStory::new("C")).unwrap();

        db.stories().reorder(&code, &[c.id, a.id, b.id]).unwrap();

        let reordered = db.stories().list(&code).unwrap();
        let titles: Vec<_> = reordered.iter().map(|s| s.title.as_str()).collect();
        let indices: Vec<_> = reordered.iter().map(|s| s.order_index).collect();
        assert_eq!(titles, ["C", "A", "B"]);
        assert_eq!(indices, [0, 1, 2]);
    }

    #[test]
    fn test_reorder_rejects_wrong_id_set() {
        let db = Database::open_in_memory().unwrap();
        let code = setup_room(&db);
        let a = db.stories().append(&code, &NewStory::new("A")).unwrap();
        let b = db.stories().append(&code, &NewStory::new("B")).unwrap();

        assert!(db.stories().reorder(&code, &[a.id]).is_err());
        assert!(db.stories().reorder(&code, &[a.id, b.id, 999]).is_err());
        // Failed reorder must leave the queue untouched
        let titles: Vec<_> = db
            .stories()
            .list(&code)
            .unwrap()
            .into_iter()
            .map(|s| s.title)
            .collect();
        assert_eq!(titles, ["A", "B"]);
    }

    #[test]
    fn test_snapshot_joins_votes_onto_roster() {
        let db = Database::open_in_memory().unwrap();
        let code = setup_room(&db);
        join(&db, &code, "ana", true);
        join(&db, &code, "ben", false);
        db.stories().append(&code, &NewStory::new("A")).unwrap();
        db.votes().upsert(&code, "ana", 8.0, Utc::now()).unwrap();

        let snapshot = db.rooms().load_snapshot(&code).unwrap().unwrap();
        assert_eq!(snapshot.participants.len(), 2);
        assert_eq!(snapshot.stories.len(), 1);
        let ana = snapshot
            .participants
            .iter()
            .find(|p| p.name == "ana")
            .unwrap();
        assert_eq!(ana.vote, Some(8.0));
        assert_eq!(snapshot.current_story().unwrap().title, "A");
    }

    #[test]
    fn test_sweep_deletes_only_idle_rooms() {
        let db = Database::open_in_memory().unwrap();
        let idle = setup_room(&db);
        let active = setup_room(&db);

        let two_days_ago = Utc::now() - chrono::Duration::hours(48);
        db.rooms().touch(&idle, two_days_ago).unwrap();

        let cutoff = Utc::now() - chrono::Duration::hours(24);
        assert_eq!(db.rooms().sweep_idle(cutoff).unwrap(), 1);
        assert!(db.rooms().find(&idle).unwrap().is_none());
        assert!(db.rooms().find(&active).unwrap().is_some());
    }

    #[test]
    fn test_room_delete_cascades_children() {
        let db = Database::open_in_memory().unwrap();
        let code = setup_room(&db);
        join(&db, &code, "ana", true);
        db.stories().append(&code, &NewStory::new("A")).unwrap();
        db.votes().upsert(&code, "ana", 3.0, Utc::now()).unwrap();

        db.rooms().delete(&code).unwrap();
        assert!(db.participants().list(&code).unwrap().is_empty());
        assert!(db.stories().list(&code).unwrap().is_empty());
        assert!(db.votes().list(&code).unwrap().is_empty());
    }
}
