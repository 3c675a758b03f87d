//! Developer guardrails and invariants
//!
//! Debug assertions for detecting impossible states during development.
//! These checks are compiled out in release builds.

use crate::models::{Room, RoomSnapshot, VotingPhase};

/// Validate that a Room's state is internally consistent
pub fn assert_room_invariants(room: &Room) {
    // A timer only exists while a round is running or locked for review
    debug_assert!(
        !(room.phase == VotingPhase::Idle && room.timer.is_some()),
        "Room {} is Idle but carries a timer",
        room.code
    );

    debug_assert!(
        room.current_story_index >= 0,
        "Room {} has negative story pointer {}",
        room.code,
        room.current_story_index
    );

    debug_assert!(
        room.last_activity >= room.created_at,
        "Room {} was active before it was created",
        room.code
    );
}

/// Validate that a snapshot is internally consistent
pub fn assert_snapshot_invariants(snapshot: &RoomSnapshot) {
    assert_room_invariants(&snapshot.room);

    // Queue positions must be dense and zero-based
    for (expected, story) in snapshot.stories.iter().enumerate() {
        debug_assert!(
            story.order_index == expected as i64,
            "Room {} story {} has order_index {}, expected {}",
            snapshot.room.code,
            story.id,
            story.order_index,
            expected
        );
    }

    debug_assert!(
        snapshot.voted_count() <= snapshot.voter_count(),
        "Room {} counts more submitted votes than voters",
        snapshot.room.code
    );

    // Observers never contribute to the tally
    debug_assert!(
        snapshot.votes().len() == snapshot.voted_count(),
        "Room {} tally does not match voter submissions",
        snapshot.room.code
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::RoomCode;
    use crate::models::VotingTimer;
    use chrono::Utc;

    fn make_room() -> Room {
        Room::new(RoomCode::parse("ABC234").unwrap())
    }

    #[test]
    fn test_fresh_room_is_valid() {
        assert_room_invariants(&make_room());
    }

    #[test]
    fn test_voting_room_with_timer_is_valid() {
        let mut room = make_room();
        room.phase = VotingPhase::Voting;
        room.timer = Some(VotingTimer::start(Utc::now(), 60));
        assert_room_invariants(&room);
    }

    #[test]
    #[should_panic(expected = "carries a timer")]
    fn test_idle_room_with_timer_panics() {
        let mut room = make_room();
        room.timer = Some(VotingTimer::start(Utc::now(), 60));
        assert_room_invariants(&room);
    }

    #[test]
    fn test_empty_snapshot_is_valid() {
        let snapshot = RoomSnapshot {
            room: make_room(),
            participants: Vec::new(),
            stories: Vec::new(),
        };
        assert_snapshot_invariants(&snapshot);
    }
}
