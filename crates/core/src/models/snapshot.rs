//! Room snapshot - the full consistent view clients render from
//!
//! Loaded in one read; the synchronization layer refetches the whole
//! snapshot on every change notification instead of trusting payloads.

use serde::{Deserialize, Serialize};

use crate::stats::{self, VoteStatistics};

use super::{ParticipantView, Room, Story, VotingPhase};

/// Consistent view of a room with roster (including votes) and story queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub room: Room,
    /// Ordered by join time.
    pub participants: Vec<ParticipantView>,
    /// Ordered by queue position.
    pub stories: Vec<Story>,
}

impl RoomSnapshot {
    /// The story the pointer currently rests on, if any.
    pub fn current_story(&self) -> Option<&Story> {
        usize::try_from(self.room.current_story_index)
            .ok()
            .and_then(|i| self.stories.get(i))
    }

    pub fn contains_participant(&self, name: &str) -> bool {
        self.participants.iter().any(|p| p.name == name)
    }

    /// Submitted vote values of voters (observers excluded).
    pub fn votes(&self) -> Vec<f64> {
        self.participants
            .iter()
            .filter(|p| p.is_voter)
            .filter_map(|p| p.vote)
            .collect()
    }

    /// Number of participants counted toward voting progress.
    pub fn voter_count(&self) -> usize {
        self.participants.iter().filter(|p| p.is_voter).count()
    }

    /// Number of voters who have submitted a vote.
    pub fn voted_count(&self) -> usize {
        self.participants
            .iter()
            .filter(|p| p.is_voter && p.vote.is_some())
            .count()
    }

    /// Statistics over the live vote set; `None` while no votes exist.
    pub fn statistics(&self) -> Option<VoteStatistics> {
        VoteStatistics::compute(&self.votes())
    }

    /// Estimate suggested to the facilitator once votes are revealed:
    /// the scale member nearest the median.
    pub fn suggested_estimate(&self, scale: &[f64]) -> Option<f64> {
        if self.room.phase != VotingPhase::Revealed || scale.is_empty() {
            return None;
        }
        let votes = self.votes();
        if votes.is_empty() {
            return None;
        }
        Some(stats::nearest_allowed(stats::median(&votes), scale))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::RoomCode;
    use crate::config::DEFAULT_SCALE;

    fn snapshot(phase: VotingPhase, views: Vec<ParticipantView>) -> RoomSnapshot {
        let mut room = Room::new(RoomCode::parse("ABC234").unwrap());
        room.phase = phase;
        RoomSnapshot {
            room,
            participants: views,
            stories: Vec::new(),
        }
    }

    fn voter(name: &str, vote: Option<f64>) -> ParticipantView {
        ParticipantView {
            name: name.to_string(),
            is_facilitator: false,
            is_voter: true,
            vote,
        }
    }

    fn observer(name: &str, vote: Option<f64>) -> ParticipantView {
        ParticipantView {
            is_voter: false,
            ..voter(name, vote)
        }
    }

    #[test]
    fn test_observers_excluded_from_counts_and_votes() {
        let snap = snapshot(
            VotingPhase::Voting,
            vec![
                voter("ana", Some(5.0)),
                voter("ben", None),
                observer("obs", Some(13.0)),
            ],
        );
        assert_eq!(snap.voter_count(), 2);
        assert_eq!(snap.voted_count(), 1);
        assert_eq!(snap.votes(), vec![5.0]);
    }

    #[test]
    fn test_suggested_estimate_only_when_revealed() {
        let views = vec![voter("ana", Some(5.0)), voter("ben", Some(8.0))];
        let hidden = snapshot(VotingPhase::Voting, views.clone());
        assert_eq!(hidden.suggested_estimate(DEFAULT_SCALE), None);

        let revealed = snapshot(VotingPhase::Revealed, views);
        // median 6.5; tie between 5 and 8 resolves low
        assert_eq!(revealed.suggested_estimate(DEFAULT_SCALE), Some(5.0));
    }

    #[test]
    fn test_current_story_out_of_bounds_is_none() {
        let snap = snapshot(VotingPhase::Idle, Vec::new());
        assert!(snap.current_story().is_none());
    }
}
