//! Progress computation.
//!
//! Each [`ChallengeType`] maps to one [`ProgressComputer`] through
//! [`computer_for`]; adding a type means adding one computer and one match
//! arm there. Computers are pure: the engine loads entries, a computer turns
//! them into a [`ProgressDelta`].

mod consistency;
mod cumulative;
mod qualify;
mod streak;

pub use consistency::ConsistencyComputer;
pub use cumulative::CumulativeComputer;
pub use qualify::{bucket_by_day, day_qualifies, qualifying_days, DayBuckets, MatchRule};
pub use streak::StreakComputer;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::challenge::{Challenge, ChallengeType, Participant, Progress};
use crate::error::{CoreError, Result};
use crate::habit::HabitEntry;
use crate::ids::HabitId;

/// Fields a computer produced. `None` leaves the stored field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressDelta {
    pub current_value: Option<f64>,
    pub current_streak: Option<u32>,
    pub best_streak: Option<u32>,
    pub completion_rate: Option<u32>,
    pub last_logged_at: Option<DateTime<Utc>>,
}

impl ProgressDelta {
    /// Overwrite the numeric fields this delta carries.
    pub fn apply_to(&self, progress: &mut Progress) {
        if let Some(v) = self.current_value {
            progress.current_value = v;
        }
        if let Some(s) = self.current_streak {
            progress.current_streak = s;
        }
        if let Some(b) = self.best_streak {
            // best streak never goes down, whatever the computer reported
            progress.best_streak = progress.best_streak.max(b);
        }
        if let Some(r) = self.completion_rate {
            progress.completion_rate = r;
        }
        if let Some(at) = self.last_logged_at {
            progress.last_logged_at = Some(at);
        }
    }
}

/// Everything a computer may look at.
#[derive(Debug, Clone, Copy)]
pub struct ComputeInput<'a> {
    pub challenge: &'a Challenge,
    pub participant: &'a Participant,
    /// Resolved via [`effective_habit_ids`]
    pub habit_ids: &'a [HabitId],
    /// Entries for `habit_ids`; incomplete ones are ignored
    pub entries: &'a [HabitEntry],
    pub now: DateTime<Utc>,
}

impl<'a> ComputeInput<'a> {
    /// Completed entries on effective habits that satisfy the daily minimum.
    pub fn counted_entries(&self) -> Vec<&'a HabitEntry> {
        let min = self.challenge.rules.minimum_daily_value;
        self.entries
            .iter()
            .filter(|e| e.completed && self.habit_ids.contains(&e.habit_id))
            .filter(|e| match (min, e.value) {
                (Some(min), Some(v)) => v >= min,
                _ => true,
            })
            .collect()
    }

    pub fn match_rule(&self) -> Result<MatchRule<'a>> {
        MatchRule::for_challenge(self.challenge, self.habit_ids)
    }

    pub fn latest_logged_at(&self) -> Option<DateTime<Utc>> {
        self.counted_entries().iter().map(|e| e.date).max()
    }
}

/// Turns an entry history into updated progress for one challenge type.
pub trait ProgressComputer: Send + Sync {
    /// `Ok(None)` means this computer has nothing to update.
    fn compute(&self, input: &ComputeInput<'_>) -> Result<Option<ProgressDelta>>;
}

/// Single dispatch point from challenge type to computer.
pub fn computer_for(kind: ChallengeType) -> &'static dyn ProgressComputer {
    match kind {
        ChallengeType::Streak => &StreakComputer,
        ChallengeType::Cumulative | ChallengeType::TeamGoal => &CumulativeComputer,
        ChallengeType::Consistency => &ConsistencyComputer,
    }
}

/// Habits whose entries count for this participant: the linked list if
/// non-empty, else the legacy single link, else the triggering habit.
pub fn effective_habit_ids(participant: &Participant, trigger: &HabitId) -> Vec<HabitId> {
    let linked = participant.linked_habits();
    if linked.is_empty() {
        vec![trigger.clone()]
    } else {
        linked
    }
}

pub(crate) fn require_start(challenge: &Challenge) -> Result<DateTime<Utc>> {
    challenge
        .start_date
        .ok_or_else(|| CoreError::malformed(&challenge.id, "start_date is not set"))
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::challenge::HabitMatchMode;

    #[test]
    fn test_effective_ids_fall_back_to_trigger() {
        let trigger = HabitId::new("trigger");

        let mut p = participant(&[]);
        assert_eq!(effective_habit_ids(&p, &trigger), vec![trigger.clone()]);

        p.linked_habit_id = Some(HabitId::new("legacy"));
        assert_eq!(effective_habit_ids(&p, &trigger), habits(&["legacy"]));

        p.linked_habit_ids = habits(&["a", "b"]);
        assert_eq!(effective_habit_ids(&p, &trigger), habits(&["a", "b"]));
    }

    #[test]
    fn test_delta_keeps_best_streak_monotonic() {
        let mut progress = Progress {
            best_streak: 9,
            ..Default::default()
        };
        let delta = ProgressDelta {
            current_streak: Some(2),
            best_streak: Some(2),
            ..Default::default()
        };
        delta.apply_to(&mut progress);
        assert_eq!(progress.current_streak, 2);
        assert_eq!(progress.best_streak, 9);
    }

    #[test]
    fn test_delta_leaves_missing_fields_untouched() {
        let mut progress = Progress {
            current_value: 4.0,
            completion_rate: 40,
            ..Default::default()
        };
        let delta = ProgressDelta {
            current_value: Some(5.0),
            ..Default::default()
        };
        delta.apply_to(&mut progress);
        assert_eq!(progress.current_value, 5.0);
        assert_eq!(progress.completion_rate, 40);
    }

    #[test]
    fn test_team_goal_uses_cumulative_algorithm() {
        let today = Utc::now().date_naive();
        let entries = vec![entry("h1", today, Some(3.0)), entry("h1", today, Some(4.0))];
        let p = participant(&["h1"]);
        let ids = habits(&["h1"]);

        let mut results = Vec::new();
        for kind in [ChallengeType::Cumulative, ChallengeType::TeamGoal] {
            let c = challenge(kind, HabitMatchMode::Any);
            let input = ComputeInput {
                challenge: &c,
                participant: &p,
                habit_ids: &ids,
                entries: &entries,
                now: Utc::now(),
            };
            results.push(computer_for(kind).compute(&input).unwrap().unwrap());
        }
        assert_eq!(results[0], results[1]);
        assert_eq!(results[0].current_value, Some(7.0));
    }

    #[test]
    fn test_minimum_daily_value_filters_small_entries() {
        let today = Utc::now().date_naive();
        let entries = vec![
            entry("h1", today, Some(1.0)),
            entry("h1", today, Some(5.0)),
            entry("h1", today, None),
        ];
        let mut c = challenge(ChallengeType::Cumulative, HabitMatchMode::Any);
        c.rules.minimum_daily_value = Some(2.0);
        let p = participant(&["h1"]);
        let ids = habits(&["h1"]);
        let input = ComputeInput {
            challenge: &c,
            participant: &p,
            habit_ids: &ids,
            entries: &entries,
            now: Utc::now(),
        };
        assert_eq!(input.counted_entries().len(), 2);
    }
}
