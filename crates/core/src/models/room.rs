//! Room model - one voting session

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::code::RoomCode;

/// Phase of a room's voting round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VotingPhase {
    /// No active vote, results not shown.
    Idle,
    /// Accepting votes.
    Voting,
    /// Votes locked and visible.
    Revealed,
}

impl VotingPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            VotingPhase::Idle => "idle",
            VotingPhase::Voting => "voting",
            VotingPhase::Revealed => "revealed",
        }
    }
}

/// A bounded voting round.
///
/// The duration is stored alongside the absolute end so any client can
/// recover the start as `ends_at - duration` without clock-sync assumptions
/// beyond trusting the server's clock at start time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingTimer {
    pub duration_seconds: u32,
    pub ends_at: DateTime<Utc>,
}

impl VotingTimer {
    pub fn start(now: DateTime<Utc>, duration_seconds: u32) -> Self {
        Self {
            duration_seconds,
            ends_at: now + Duration::seconds(i64::from(duration_seconds)),
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.ends_at - Duration::seconds(i64::from(self.duration_seconds))
    }

    /// Seconds left on the timer, clamped at zero.
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> i64 {
        (self.ends_at - now).num_seconds().max(0)
    }
}

/// A Room is one estimation session, addressed by a short code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub code: RoomCode,
    pub phase: VotingPhase,
    /// Pointer into the ordered story queue. May be past the end when the
    /// queue is empty or exhausted.
    pub current_story_index: i64,
    pub timer: Option<VotingTimer>,
    /// Base URL used to auto-link ticket references on bulk import.
    pub issue_tracker_base_url: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Updated on state-changing operations only, never on reads.
    pub last_activity: DateTime<Utc>,
}

impl Room {
    pub fn new(code: RoomCode) -> Self {
        let now = Utc::now();
        Self {
            code,
            phase: VotingPhase::Idle,
            current_story_index: 0,
            timer: None,
            issue_tracker_base_url: None,
            created_at: now,
            last_activity: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_start_recovers_from_end() {
        let now = Utc::now();
        let timer = VotingTimer::start(now, 60);
        assert_eq!(timer.started_at(), now);
        assert_eq!(timer.remaining_seconds(now), 60);
        assert_eq!(timer.remaining_seconds(timer.ends_at), 0);
    }

    #[test]
    fn test_timer_remaining_clamps_at_zero() {
        let now = Utc::now();
        let timer = VotingTimer::start(now, 5);
        assert_eq!(timer.remaining_seconds(now + Duration::seconds(30)), 0);
    }
}
