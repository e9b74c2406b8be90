//! Participant progress updater.
//!
//! Merges a computed [`ProgressDelta`] into the stored participant and
//! detects the one-way active -> completed transition.

use chrono::{DateTime, Utc};

use crate::challenge::{Challenge, Participant, ParticipantStatus};
use crate::ids::UserId;
use crate::progress::ProgressDelta;

/// Result of a successful merge.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantUpdate {
    pub participant: Participant,
    /// True only on the call that crossed the target
    pub just_completed: bool,
}

/// Apply `delta` to `user_id`'s participant record inside `challenge`.
///
/// Returns `None` when the participant is missing or no longer active.
pub fn apply_progress(
    challenge: &mut Challenge,
    user_id: &UserId,
    delta: &ProgressDelta,
    now: DateTime<Utc>,
) -> Option<ParticipantUpdate> {
    let target = challenge.target();
    let participant = challenge
        .participant_mut(user_id)
        .filter(|p| p.is_active())?;

    delta.apply_to(&mut participant.progress);

    let mut just_completed = false;
    if let Some(target) = target {
        if participant.progress.current_value >= target
            && participant.status != ParticipantStatus::Completed
        {
            participant.status = ParticipantStatus::Completed;
            just_completed = true;
        }
    }

    let update = ParticipantUpdate {
        participant: participant.clone(),
        just_completed,
    };
    challenge.updated_at = now;
    Some(update)
}
