//! Milestone detection.

use crate::challenge::{Milestone, Participant};

/// Milestones `participant` has newly crossed, in threshold order.
///
/// Each returned threshold is recorded in `milestones_reached`, so a
/// threshold fires at most once per participant.
pub fn detect_milestones(participant: &mut Participant, milestones: &[Milestone]) -> Vec<Milestone> {
    let current = participant.progress.current_value;
    let mut crossed: Vec<Milestone> = milestones
        .iter()
        .filter(|m| m.value <= current && !participant.has_reached(m.value))
        .cloned()
        .collect();
    crossed.sort_by(|a, b| a.value.total_cmp(&b.value));
    crossed.dedup_by(|a, b| a.value == b.value);

    participant
        .milestones_reached
        .extend(crossed.iter().map(|m| m.value));
    crossed
}
