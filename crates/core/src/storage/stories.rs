//! Story storage operations
//!
//! Queue positions are dense, zero-based integers. Deleting compacts the
//! remaining indices; reordering rewrites all of them inside a single
//! transaction so no client can observe a partially-reordered queue.

use rusqlite::{params, Connection, Row};
use tracing::instrument;

use super::parse::{parse_datetime_opt, parse_room_code, OptionalExt};
use crate::code::RoomCode;
use crate::error::{Error, Result};
use crate::models::{NewStory, Story};

pub struct StoryStore<'a> {
    conn: &'a Connection,
}

impl<'a> StoryStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Append one story at the end of the queue
    #[instrument(skip(self, story), fields(title = %story.title))]
    pub fn append(&self, code: &RoomCode, story: &NewStory) -> Result<Story> {
        let order_index = self.next_order_index(code)?;
        self.insert_at(code, story, order_index)
    }

    /// Append several stories, preserving their order, atomically
    #[instrument(skip(self, stories), fields(count = stories.len()))]
    pub fn append_many(&self, code: &RoomCode, stories: &[NewStory]) -> Result<Vec<Story>> {
        let tx = self.conn.unchecked_transaction()?;
        let store = StoryStore::new(&tx);

        let mut order_index = store.next_order_index(code)?;
        let mut created = Vec::with_capacity(stories.len());
        for story in stories {
            created.push(store.insert_at(code, story, order_index)?);
            order_index += 1;
        }

        tx.commit()?;
        Ok(created)
    }

    /// Find a story by id
    #[instrument(skip(self))]
    pub fn find(&self, id: i64) -> Result<Option<Story>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, room_code, title, external_link, order_index, final_estimate, voted_at
             FROM stories WHERE id = ?1",
        )?;

        let story = stmt.query_row(params![id], row_to_story).optional()?;
        Ok(story)
    }

    /// List a room's stories in queue order
    #[instrument(skip(self))]
    pub fn list(&self, code: &RoomCode) -> Result<Vec<Story>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, room_code, title, external_link, order_index, final_estimate, voted_at
             FROM stories WHERE room_code = ?1 ORDER BY order_index",
        )?;

        let stories = stmt
            .query_map(params![code.as_str()], row_to_story)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(stories)
    }

    /// Update a story's mutable fields
    #[instrument(skip(self, story), fields(id = story.id))]
    pub fn update(&self, story: &Story) -> Result<()> {
        self.conn.execute(
            "UPDATE stories SET title = ?1, external_link = ?2, final_estimate = ?3, voted_at = ?4
             WHERE id = ?5",
            params![
                story.title,
                story.external_link,
                story.final_estimate,
                story.voted_at.map(|at| at.to_rfc3339()),
                story.id,
            ],
        )?;
        Ok(())
    }

    /// Delete a story and compact the remaining order indices
    #[instrument(skip(self))]
    pub fn delete(&self, code: &RoomCode, id: i64) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;

        let deleted = tx.execute(
            "DELETE FROM stories WHERE room_code = ?1 AND id = ?2",
            params![code.as_str(), id],
        )?;
        if deleted == 0 {
            return Err(Error::NotFound(format!("Story {id} not found")));
        }

        // Re-pack remaining indices to stay dense
        let remaining: Vec<i64> = {
            let mut stmt = tx.prepare(
                "SELECT id FROM stories WHERE room_code = ?1 ORDER BY order_index",
            )?;
            let rows = stmt
                .query_map(params![code.as_str()], |row| row.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };
        for (index, story_id) in remaining.iter().enumerate() {
            tx.execute(
                "UPDATE stories SET order_index = ?1 WHERE id = ?2",
                params![index as i64, story_id],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Rewrite all order indices to match the given id sequence
    #[instrument(skip(self, ordered_ids), fields(count = ordered_ids.len()))]
    pub fn reorder(&self, code: &RoomCode, ordered_ids: &[i64]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;

        let current: Vec<i64> = {
            let mut stmt = tx.prepare(
                "SELECT id FROM stories WHERE room_code = ?1 ORDER BY order_index",
            )?;
            let rows = stmt
                .query_map(params![code.as_str()], |row| row.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };

        let mut expected = current.clone();
        let mut given = ordered_ids.to_vec();
        expected.sort_unstable();
        given.sort_unstable();
        if expected != given {
            return Err(Error::Validation(
                "Reorder must list every story of the room exactly once".into(),
            ));
        }

        for (index, story_id) in ordered_ids.iter().enumerate() {
            tx.execute(
                "UPDATE stories SET order_index = ?1 WHERE room_code = ?2 AND id = ?3",
                params![index as i64, code.as_str(), story_id],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn next_order_index(&self, code: &RoomCode) -> Result<i64> {
        let max: i64 = self.conn.query_row(
            "SELECT COALESCE(MAX(order_index), -1) FROM stories WHERE room_code = ?1",
            params![code.as_str()],
            |row| row.get(0),
        )?;
        Ok(max + 1)
    }

    fn insert_at(&self, code: &RoomCode, story: &NewStory, order_index: i64) -> Result<Story> {
        self.conn.execute(
            "INSERT INTO stories (room_code, title, external_link, order_index)
             VALUES (?1, ?2, ?3, ?4)",
            params![code.as_str(), story.title, story.external_link, order_index],
        )?;
        let id = self.conn.last_insert_rowid();
        Ok(Story {
            id,
            room_code: code.clone(),
            title: story.title.clone(),
            external_link: story.external_link.clone(),
            order_index,
            final_estimate: None,
            voted_at: None,
        })
    }
}

fn row_to_story(row: &Row<'_>) -> std::result::Result<Story, rusqlite::Error> {
    Ok(Story {
        id: row.get(0)?,
        room_code: parse_room_code(&row.get::<_, String>(1)?)?,
        title: row.get(2)?,
        external_link: row.get(3)?,
        order_index: row.get(4)?,
        final_estimate: row.get(5)?,
        voted_at: parse_datetime_opt(row.get::<_, Option<String>>(6)?)?,
    })
}
