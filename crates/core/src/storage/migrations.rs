//! Database migration system
//!
//! Tracks schema versions and applies migrations in order.

use rusqlite::Connection;
use tracing::{info, instrument};

use crate::error::Result;

/// A database migration
pub struct Migration {
    /// Version number (must be sequential starting from 1)
    pub version: u32,
    /// Description of what this migration does
    pub description: &'static str,
    /// SQL to run for this migration
    pub sql: &'static str,
}

/// All migrations in order
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Initial schema",
        sql: r#"
            -- Rooms table
            CREATE TABLE IF NOT EXISTS rooms (
                code TEXT PRIMARY KEY,
                voting_phase TEXT NOT NULL DEFAULT 'idle',
                current_story_index INTEGER NOT NULL DEFAULT 0,
                timer_duration INTEGER,
                timer_ends_at TEXT,
                issue_tracker_base_url TEXT,
                created_at TEXT NOT NULL,
                last_activity TEXT NOT NULL
            );

            -- Participants table (name is the identity key within a room)
            CREATE TABLE IF NOT EXISTS participants (
                room_code TEXT NOT NULL,
                name TEXT NOT NULL,
                is_facilitator INTEGER NOT NULL DEFAULT 0,
                is_voter INTEGER NOT NULL DEFAULT 1,
                joined_at TEXT NOT NULL,
                PRIMARY KEY (room_code, name),
                FOREIGN KEY (room_code) REFERENCES rooms(code) ON DELETE CASCADE
            );

            -- Stories table
            CREATE TABLE IF NOT EXISTS stories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                room_code TEXT NOT NULL,
                title TEXT NOT NULL,
                external_link TEXT,
                order_index INTEGER NOT NULL,
                final_estimate REAL,
                voted_at TEXT,
                FOREIGN KEY (room_code) REFERENCES rooms(code) ON DELETE CASCADE
            );

            -- Votes table (one generation of votes per room at a time;
            -- cleared on every voting transition, hence no story reference)
            CREATE TABLE IF NOT EXISTS votes (
                room_code TEXT NOT NULL,
                participant_name TEXT NOT NULL,
                value REAL NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (room_code, participant_name),
                FOREIGN KEY (room_code) REFERENCES rooms(code) ON DELETE CASCADE,
                FOREIGN KEY (room_code, participant_name)
                    REFERENCES participants(room_code, name) ON DELETE CASCADE
            );

            -- Vote history table (append-only reveal snapshots)
            CREATE TABLE IF NOT EXISTS vote_history (
                id TEXT PRIMARY KEY,
                room_code TEXT NOT NULL,
                story_id INTEGER NOT NULL,
                story_title TEXT NOT NULL,
                participant_name TEXT NOT NULL,
                value REAL NOT NULL,
                voted_at TEXT,
                revealed_at TEXT NOT NULL,
                FOREIGN KEY (room_code) REFERENCES rooms(code) ON DELETE CASCADE
            );
        "#,
    },
    Migration {
        version: 2,
        description: "Add indexes for query performance",
        sql: r#"
            -- Queue ordering
            CREATE INDEX IF NOT EXISTS idx_stories_room_order ON stories(room_code, order_index);

            -- Roster and vote lookups per room
            CREATE INDEX IF NOT EXISTS idx_participants_room ON participants(room_code);
            CREATE INDEX IF NOT EXISTS idx_votes_room ON votes(room_code);

            -- History retrieval, newest reveal first
            CREATE INDEX IF NOT EXISTS idx_history_room_revealed
                ON vote_history(room_code, revealed_at);

            -- Idle-room sweep
            CREATE INDEX IF NOT EXISTS idx_rooms_last_activity ON rooms(last_activity);
        "#,
    },
    Migration {
        version: 3,
        description: "Add participant heartbeat column",
        sql: r#"
            -- Refreshed periodically by connected clients; used to show
            -- online status and to detect removal server-side
            ALTER TABLE participants ADD COLUMN last_seen_at TEXT;
        "#,
    },
];

/// Initialize the migrations table
fn init_migrations_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )",
        [],
    )?;
    Ok(())
}

/// Get the current schema version
fn get_current_version(conn: &Connection) -> Result<u32> {
    let version: Option<u32> = conn
        .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
            row.get(0)
        })
        .unwrap_or(None);
    Ok(version.unwrap_or(0))
}

/// Record that a migration was applied
fn record_migration(conn: &Connection, migration: &Migration) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![
            migration.version,
            migration.description,
            chrono::Utc::now().to_rfc3339()
        ],
    )?;
    Ok(())
}

/// Run all pending migrations
#[instrument(skip(conn))]
pub fn run_migrations(conn: &Connection) -> Result<()> {
    init_migrations_table(conn)?;

    let current_version = get_current_version(conn)?;

    for migration in MIGRATIONS {
        if migration.version > current_version {
            info!(
                version = migration.version,
                description = migration.description,
                "Applying migration"
            );

            conn.execute_batch(migration.sql)?;
            record_migration(conn, migration)?;
        }
    }

    let new_version = get_current_version(conn)?;
    if new_version > current_version {
        info!(
            from = current_version,
            to = new_version,
            "Database schema updated"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Get the latest migration version (test helper)
    fn latest_version() -> u32 {
        MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
    }

    #[test]
    fn test_migrations_run() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let version = get_current_version(&conn).unwrap();
        assert_eq!(version, latest_version());
    }

    #[test]
    fn test_migrations_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        // Run twice
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let version = get_current_version(&conn).unwrap();
        assert_eq!(version, latest_version());
    }

    #[test]
    fn test_migrations_sequential() {
        for (i, migration) in MIGRATIONS.iter().enumerate() {
            assert_eq!(
                migration.version as usize,
                i + 1,
                "Migration {} should have version {}",
                migration.description,
                i + 1
            );
        }
    }
}
