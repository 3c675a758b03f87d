//! Room service - the voting state machine
//!
//! All mutating operations on a room go through this service: it validates
//! inputs, enforces the phase transitions, persists through the repository
//! traits, and hands back the refreshed snapshot for fan-out. Facilitator
//! gating is the caller's responsibility; the service enforces only the
//! rules that keep room state consistent.
//!
//! Phases: Idle (no active vote) -> Voting (accepting votes) -> Revealed
//! (votes locked and visible) -> Idle (next story).

use std::collections::HashMap;

use chrono::Utc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::code::RoomCode;
use crate::config::EstimationConfig;
use crate::error::{Error, Result};
use crate::models::{
    NewStory, Participant, Room, RoomSnapshot, Story, StoryHistory, VoteHistoryEntry, VotingPhase,
    VotingTimer,
};
use crate::stats;
use crate::storage::{
    HistoryRepository, ParticipantRepository, RoomRepository, Storage, StoryRepository,
    VoteRepository,
};

/// Service coordinating one backing store's rooms.
pub struct RoomService<S: Storage> {
    storage: S,
    config: EstimationConfig,
}

impl<S: Storage> RoomService<S> {
    pub fn new(storage: S, config: EstimationConfig) -> Self {
        Self { storage, config }
    }

    pub fn config(&self) -> &EstimationConfig {
        &self.config
    }

    /// Create a room with a fresh random code.
    #[instrument(skip(self))]
    pub fn create_room(&self) -> Result<Room> {
        let room = Room::new(RoomCode::generate());
        self.storage.create_room(&room)?;
        info!(code = %room.code, "Room created");
        Ok(room)
    }

    /// Join a room, or merge onto an existing participant of the same name.
    #[instrument(skip(self))]
    pub fn join_room(
        &self,
        code: &RoomCode,
        name: &str,
        is_facilitator: bool,
    ) -> Result<RoomSnapshot> {
        self.require_room(code)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Validation("Participant name must not be empty".into()));
        }

        let mut participant = Participant::new(code.clone(), name.to_string(), is_facilitator);
        participant.last_seen_at = Some(Utc::now());
        self.storage.upsert_participant(&participant)?;
        self.touch(code)?;
        self.snapshot_of(code)
    }

    /// Refresh a participant's heartbeat. Returns false when the
    /// participant no longer exists (they have been removed).
    #[instrument(skip(self))]
    pub fn heartbeat(&self, code: &RoomCode, name: &str) -> Result<bool> {
        self.storage.record_heartbeat(code, name, Utc::now())
    }

    /// Submit (`Some`) or retract (`None`) a vote.
    ///
    /// Observers are rejected; values must be members of the allowed scale.
    /// The phase is deliberately not enforced here - the presentation layer
    /// gates the card deck outside the Voting phase.
    #[instrument(skip(self))]
    pub fn submit_vote(
        &self,
        code: &RoomCode,
        name: &str,
        value: Option<f64>,
    ) -> Result<RoomSnapshot> {
        self.require_room(code)?;
        let participant = self.require_participant(code, name)?;
        if !participant.is_voter {
            return Err(Error::Conflict(format!(
                "{name} is an observer and cannot vote"
            )));
        }

        match value {
            None => self.storage.delete_vote(code, name)?,
            Some(v) => {
                if !self.config.scale.contains(&v) {
                    return Err(Error::Validation(format!(
                        "{v} is not on the estimation scale"
                    )));
                }
                self.storage.upsert_vote(code, name, v, Utc::now())?;
            }
        }
        self.touch(code)?;
        self.snapshot_of(code)
    }

    /// Start (or restart) a voting round.
    ///
    /// Valid from Idle or Revealed. An optional new story is appended to
    /// the queue without advancing the current-story pointer. All votes are
    /// cleared; an optional timer stores its duration next to the absolute
    /// end timestamp.
    #[instrument(skip(self, new_story))]
    pub fn start_voting(
        &self,
        code: &RoomCode,
        new_story: Option<NewStory>,
        timer_seconds: Option<u32>,
    ) -> Result<RoomSnapshot> {
        let mut room = self.require_room(code)?;
        if room.phase == VotingPhase::Voting {
            return Err(Error::Conflict("Voting is already in progress".into()));
        }
        if timer_seconds == Some(0) {
            return Err(Error::Validation("Timer duration must be positive".into()));
        }

        if let Some(story) = new_story {
            self.storage.append_story(code, &story)?;
        }
        self.storage.clear_votes(code)?;

        let now = Utc::now();
        room.phase = VotingPhase::Voting;
        room.timer = timer_seconds.map(|secs| VotingTimer::start(now, secs));
        room.last_activity = now;
        self.storage.update_room(&room)?;
        info!(code = %code, timer = ?timer_seconds, "Voting started");
        self.snapshot_of(code)
    }

    /// Lock and reveal the current votes.
    ///
    /// Valid from Voting. Revealing while already Revealed is an idempotent
    /// no-op so that two facilitators racing on the button cannot write a
    /// duplicate history batch.
    #[instrument(skip(self))]
    pub fn reveal_votes(&self, code: &RoomCode) -> Result<RoomSnapshot> {
        let mut room = self.require_room(code)?;
        match room.phase {
            VotingPhase::Revealed => return self.snapshot_of(code),
            VotingPhase::Idle => {
                return Err(Error::Conflict("No voting round to reveal".into()));
            }
            VotingPhase::Voting => {}
        }

        let now = Utc::now();
        let votes = self.storage.list_votes(code)?;
        if let Some(story) = self.current_story(&room)? {
            if !votes.is_empty() {
                let entries: Vec<VoteHistoryEntry> = votes
                    .iter()
                    .map(|vote| VoteHistoryEntry {
                        id: Uuid::new_v4(),
                        room_code: code.clone(),
                        story_id: story.id,
                        story_title: story.title.clone(),
                        participant_name: vote.participant_name.clone(),
                        value: vote.value,
                        voted_at: Some(vote.created_at),
                        revealed_at: now,
                    })
                    .collect();
                self.storage.append_history(&entries)?;

                if story.voted_at.is_none() {
                    let mut resolved = story;
                    resolved.voted_at = Some(now);
                    self.storage.update_story(&resolved)?;
                }
            }
        }

        room.phase = VotingPhase::Revealed;
        room.last_activity = now;
        self.storage.update_room(&room)?;
        info!(code = %code, votes = votes.len(), "Votes revealed");
        self.snapshot_of(code)
    }

    /// Move to the next story in the queue.
    ///
    /// Only meaningful from Revealed, but tolerated from any phase. If the
    /// current story has no final estimate yet and votes are live, the
    /// nearest scale member to the median is filled in before the votes are
    /// cleared. A manually set estimate is never overwritten.
    #[instrument(skip(self))]
    pub fn advance_to_next_story(&self, code: &RoomCode) -> Result<RoomSnapshot> {
        let mut room = self.require_room(code)?;

        if let Some(story) = self.current_story(&room)? {
            if story.final_estimate.is_none() {
                let votes = self.storage.list_votes(code)?;
                if !votes.is_empty() {
                    let values: Vec<f64> = votes.iter().map(|v| v.value).collect();
                    let estimate =
                        stats::nearest_allowed(stats::median(&values), &self.config.scale);
                    let mut estimated = story;
                    estimated.final_estimate = Some(estimate);
                    self.storage.update_story(&estimated)?;
                    info!(code = %code, estimate, "Final estimate auto-filled from median");
                }
            }
        }

        self.storage.clear_votes(code)?;
        room.current_story_index += 1;
        room.phase = VotingPhase::Idle;
        room.timer = None;
        room.last_activity = Utc::now();
        self.storage.update_room(&room)?;
        self.snapshot_of(code)
    }

    /// Fix a story's final estimate manually. Any phase; no recompute.
    #[instrument(skip(self))]
    pub fn set_final_estimate(
        &self,
        code: &RoomCode,
        story_id: i64,
        value: f64,
    ) -> Result<RoomSnapshot> {
        if !value.is_finite() || value < 0.0 {
            return Err(Error::Validation(format!(
                "Final estimate must be a non-negative number, got {value}"
            )));
        }
        self.require_room(code)?;
        let mut story = self.require_story(code, story_id)?;
        story.final_estimate = Some(value);
        self.storage.update_story(&story)?;
        self.touch(code)?;
        self.snapshot_of(code)
    }

    /// Append one story at the end of the queue.
    #[instrument(skip(self, story), fields(title = %story.title))]
    pub fn add_story(&self, code: &RoomCode, story: NewStory) -> Result<RoomSnapshot> {
        self.require_room(code)?;
        if story.title.trim().is_empty() {
            return Err(Error::Validation("Story title must not be empty".into()));
        }
        self.storage.append_story(code, &story)?;
        self.touch(code)?;
        self.snapshot_of(code)
    }

    /// Bulk-import stories, one per line, auto-linking ticket references
    /// against the room's issue-tracker base URL.
    #[instrument(skip(self, lines))]
    pub fn import_stories(&self, code: &RoomCode, lines: &[&str]) -> Result<RoomSnapshot> {
        let room = self.require_room(code)?;
        let stories: Vec<NewStory> = lines
            .iter()
            .filter(|line| !line.trim().is_empty())
            .map(|line| NewStory::from_import_line(line, room.issue_tracker_base_url.as_deref()))
            .collect();
        if stories.is_empty() {
            return Err(Error::Validation("Nothing to import".into()));
        }
        self.storage.append_stories(code, &stories)?;
        self.touch(code)?;
        self.snapshot_of(code)
    }

    /// Edit a story's title and link.
    #[instrument(skip(self, title, external_link))]
    pub fn edit_story(
        &self,
        code: &RoomCode,
        story_id: i64,
        title: &str,
        external_link: Option<String>,
    ) -> Result<RoomSnapshot> {
        self.require_room(code)?;
        if title.trim().is_empty() {
            return Err(Error::Validation("Story title must not be empty".into()));
        }
        let mut story = self.require_story(code, story_id)?;
        story.title = title.trim().to_string();
        story.external_link = external_link;
        self.storage.update_story(&story)?;
        self.touch(code)?;
        self.snapshot_of(code)
    }

    /// Delete a story; remaining queue positions are compacted.
    #[instrument(skip(self))]
    pub fn delete_story(&self, code: &RoomCode, story_id: i64) -> Result<RoomSnapshot> {
        self.require_room(code)?;
        self.require_story(code, story_id)?;
        self.storage.delete_story(code, story_id)?;
        self.touch(code)?;
        self.snapshot_of(code)
    }

    /// Reorder the queue to the given id sequence.
    #[instrument(skip(self, ordered_ids))]
    pub fn reorder_stories(&self, code: &RoomCode, ordered_ids: &[i64]) -> Result<RoomSnapshot> {
        self.require_room(code)?;
        self.storage.reorder_stories(code, ordered_ids)?;
        self.touch(code)?;
        self.snapshot_of(code)
    }

    /// Promote a participant to facilitator. Several may coexist.
    #[instrument(skip(self))]
    pub fn promote_to_facilitator(&self, code: &RoomCode, name: &str) -> Result<RoomSnapshot> {
        self.require_room(code)?;
        self.require_participant(code, name)?;
        self.storage.set_facilitator(code, name, true)?;
        self.touch(code)?;
        self.snapshot_of(code)
    }

    /// Toggle a participant between voter and observer.
    #[instrument(skip(self))]
    pub fn set_voter_status(
        &self,
        code: &RoomCode,
        name: &str,
        is_voter: bool,
    ) -> Result<RoomSnapshot> {
        self.require_room(code)?;
        self.require_participant(code, name)?;
        self.storage.set_voter(code, name, is_voter)?;
        self.touch(code)?;
        self.snapshot_of(code)
    }

    /// Remove a participant from the room.
    ///
    /// Facilitators cannot be kicked; demote them first. The participant's
    /// vote row is removed along with them.
    #[instrument(skip(self))]
    pub fn kick_participant(&self, code: &RoomCode, name: &str) -> Result<RoomSnapshot> {
        self.require_room(code)?;
        let target = self.require_participant(code, name)?;
        if target.is_facilitator {
            return Err(Error::Conflict(format!(
                "{name} is a facilitator and cannot be removed"
            )));
        }
        self.storage.remove_participant(code, name)?;
        self.touch(code)?;
        info!(code = %code, name, "Participant removed");
        self.snapshot_of(code)
    }

    /// Set or clear the issue-tracker base URL used for auto-linking.
    #[instrument(skip(self, base_url))]
    pub fn set_issue_tracker_base_url(
        &self,
        code: &RoomCode,
        base_url: Option<String>,
    ) -> Result<RoomSnapshot> {
        let mut room = self.require_room(code)?;
        room.issue_tracker_base_url =
            base_url.map(|url| url.trim().trim_end_matches('/').to_string());
        room.last_activity = Utc::now();
        self.storage.update_room(&room)?;
        self.snapshot_of(code)
    }

    /// Read-only snapshot. Does not bump `last_activity`: passive reads
    /// must not feed back into the change stream.
    #[instrument(skip(self))]
    pub fn room_snapshot(&self, code: &RoomCode) -> Result<RoomSnapshot> {
        self.snapshot_of(code)
    }

    /// Per-story vote history, newest reveal first, with statistics
    /// computed over the recorded snapshots rather than live votes.
    #[instrument(skip(self))]
    pub fn vote_history(&self, code: &RoomCode) -> Result<Vec<StoryHistory>> {
        self.require_room(code)?;
        let entries = self.storage.list_history(code)?;
        let final_estimates: HashMap<i64, f64> = self
            .storage
            .list_stories(code)?
            .into_iter()
            .filter_map(|story| story.final_estimate.map(|estimate| (story.id, estimate)))
            .collect();
        Ok(StoryHistory::collate(&entries, &final_estimates))
    }

    /// Delete rooms idle for longer than the configured TTL.
    #[instrument(skip(self))]
    pub fn sweep_idle_rooms(&self) -> Result<u64> {
        let cutoff = Utc::now() - self.config.room_ttl();
        let swept = self.storage.sweep_idle_rooms(cutoff)?;
        if swept > 0 {
            warn!(swept, "Swept idle rooms");
        }
        Ok(swept)
    }

    fn require_room(&self, code: &RoomCode) -> Result<Room> {
        self.storage
            .find_room(code)?
            .ok_or_else(|| Error::NotFound(format!("Room {code} not found")))
    }

    fn require_participant(&self, code: &RoomCode, name: &str) -> Result<Participant> {
        self.storage
            .find_participant(code, name)?
            .ok_or_else(|| Error::NotFound(format!("Participant {name} not found in {code}")))
    }

    fn require_story(&self, code: &RoomCode, story_id: i64) -> Result<Story> {
        match self.storage.find_story(story_id)? {
            Some(story) if story.room_code == *code => Ok(story),
            _ => Err(Error::NotFound(format!("Story {story_id} not found"))),
        }
    }

    fn current_story(&self, room: &Room) -> Result<Option<Story>> {
        let stories = self.storage.list_stories(&room.code)?;
        Ok(usize::try_from(room.current_story_index)
            .ok()
            .and_then(|index| stories.into_iter().nth(index)))
    }

    fn snapshot_of(&self, code: &RoomCode) -> Result<RoomSnapshot> {
        self.storage
            .load_snapshot(code)?
            .ok_or_else(|| Error::NotFound(format!("Room {code} not found")))
    }

    fn touch(&self, code: &RoomCode) -> Result<()> {
        self.storage.touch_room(code, Utc::now())
    }
}
