//! Vote history models
//!
//! History is an append log: every reveal writes one immutable record per
//! participant-vote pair. Re-voting a story produces a new disjoint batch.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::code::RoomCode;
use crate::stats::VoteStatistics;

/// One immutable participant-vote record, written at reveal time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteHistoryEntry {
    pub id: Uuid,
    pub room_code: RoomCode,
    pub story_id: i64,
    pub story_title: String,
    pub participant_name: String,
    pub value: f64,
    /// When the underlying vote was cast, if known.
    pub voted_at: Option<DateTime<Utc>>,
    pub revealed_at: DateTime<Utc>,
}

/// A participant-vote pair inside a story's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedVote {
    pub participant: String,
    pub value: f64,
}

/// Aggregated history for one story: the latest reveal's vote set plus
/// statistics computed over that snapshot (not over live votes).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryHistory {
    pub story_id: i64,
    pub title: String,
    pub final_estimate: Option<f64>,
    pub revealed_at: DateTime<Utc>,
    pub votes: Vec<RecordedVote>,
    pub statistics: VoteStatistics,
}

impl StoryHistory {
    /// Group raw history records into per-story summaries.
    ///
    /// A story that was revealed more than once keeps only its latest batch
    /// (same `revealed_at`). Output is ordered most-recently-revealed first.
    pub fn collate(
        entries: &[VoteHistoryEntry],
        final_estimates: &HashMap<i64, f64>,
    ) -> Vec<StoryHistory> {
        let mut latest_batch: HashMap<i64, DateTime<Utc>> = HashMap::new();
        for entry in entries {
            latest_batch
                .entry(entry.story_id)
                .and_modify(|at| {
                    if entry.revealed_at > *at {
                        *at = entry.revealed_at;
                    }
                })
                .or_insert(entry.revealed_at);
        }

        struct Batch {
            title: String,
            revealed_at: DateTime<Utc>,
            votes: Vec<RecordedVote>,
        }

        let mut batches: HashMap<i64, Batch> = HashMap::new();
        for entry in entries {
            if latest_batch.get(&entry.story_id) != Some(&entry.revealed_at) {
                continue;
            }
            batches
                .entry(entry.story_id)
                .or_insert_with(|| Batch {
                    title: entry.story_title.clone(),
                    revealed_at: entry.revealed_at,
                    votes: Vec::new(),
                })
                .votes
                .push(RecordedVote {
                    participant: entry.participant_name.clone(),
                    value: entry.value,
                });
        }

        let mut result: Vec<StoryHistory> = batches
            .into_iter()
            .filter_map(|(story_id, batch)| {
                let values: Vec<f64> = batch.votes.iter().map(|v| v.value).collect();
                let statistics = VoteStatistics::compute(&values)?;
                Some(StoryHistory {
                    story_id,
                    title: batch.title,
                    final_estimate: final_estimates.get(&story_id).copied(),
                    revealed_at: batch.revealed_at,
                    votes: batch.votes,
                    statistics,
                })
            })
            .collect();
        result.sort_by(|a, b| b.revealed_at.cmp(&a.revealed_at));
        result
    }
}
