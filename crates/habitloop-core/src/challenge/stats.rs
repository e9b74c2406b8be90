//! Aggregate statistics for a challenge.

use serde::{Deserialize, Serialize};

use super::{Participant, ParticipantStatus};

/// Summary numbers shown on the challenge card and in the ended event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChallengeStats {
    /// Participants that have not dropped
    pub participant_count: u32,
    pub completed_count: u32,
    /// Mean progress percentage toward the target, or mean raw value
    /// when the challenge has no target
    pub average_progress: f64,
    /// Highest best streak among enrolled participants
    pub top_streak: u32,
}

impl ChallengeStats {
    pub fn recompute(participants: &[Participant], target: Option<f64>) -> Self {
        let enrolled: Vec<&Participant> = participants
            .iter()
            .filter(|p| p.status != ParticipantStatus::Dropped)
            .collect();

        if enrolled.is_empty() {
            return Self::default();
        }

        let completed_count = enrolled
            .iter()
            .filter(|p| p.status == ParticipantStatus::Completed)
            .count() as u32;

        let top_streak = enrolled
            .iter()
            .map(|p| p.progress.best_streak)
            .max()
            .unwrap_or(0);

        let total: f64 = enrolled
            .iter()
            .map(|p| match target {
                Some(t) if t > 0.0 => (p.progress.current_value / t).min(1.0) * 100.0,
                _ => p.progress.current_value,
            })
            .sum();
        let average_progress = (total / enrolled.len() as f64).round();

        Self {
            participant_count: enrolled.len() as u32,
            completed_count,
            average_progress,
            top_streak,
        }
    }
}
