//! Day qualification shared by every computer.

use chrono::NaiveDate;
use std::collections::{BTreeMap, HashSet};

use crate::challenge::{Challenge, HabitMatchMode};
use crate::error::{CoreError, Result};
use crate::habit::HabitEntry;
use crate::ids::HabitId;

/// Distinct habits completed on each UTC calendar day.
pub type DayBuckets = BTreeMap<NaiveDate, HashSet<HabitId>>;

pub fn bucket_by_day<'a>(entries: impl IntoIterator<Item = &'a HabitEntry>) -> DayBuckets {
    let mut buckets = DayBuckets::new();
    for entry in entries.into_iter().filter(|e| e.completed) {
        buckets
            .entry(entry.day())
            .or_default()
            .insert(entry.habit_id.clone());
    }
    buckets
}

/// Match mode resolved against a participant's effective habits.
#[derive(Debug, Clone, Copy)]
pub struct MatchRule<'a> {
    pub mode: HabitMatchMode,
    pub minimum: u32,
    pub habit_ids: &'a [HabitId],
}

impl<'a> MatchRule<'a> {
    pub fn for_challenge(challenge: &Challenge, habit_ids: &'a [HabitId]) -> Result<Self> {
        let minimum = match challenge.habit_match_mode {
            HabitMatchMode::Minimum => challenge.habit_match_minimum.ok_or_else(|| {
                CoreError::malformed(&challenge.id, "minimum match mode without habit_match_minimum")
            })?,
            _ => 0,
        };
        Ok(Self {
            mode: challenge.habit_match_mode,
            minimum,
            habit_ids,
        })
    }

    pub fn qualifies(&self, completed: &HashSet<HabitId>) -> bool {
        day_qualifies(self.mode, self.minimum, self.habit_ids, completed)
    }
}

/// Whether a day with `completed` habits satisfies the match mode.
pub fn day_qualifies(
    mode: HabitMatchMode,
    minimum: u32,
    habit_ids: &[HabitId],
    completed: &HashSet<HabitId>,
) -> bool {
    if habit_ids.is_empty() {
        return false;
    }
    match mode {
        HabitMatchMode::Single | HabitMatchMode::Any => {
            habit_ids.iter().any(|h| completed.contains(h))
        }
        HabitMatchMode::All => habit_ids.iter().all(|h| completed.contains(h)),
        HabitMatchMode::Minimum => {
            let distinct: HashSet<&HabitId> =
                habit_ids.iter().filter(|h| completed.contains(*h)).collect();
            distinct.len() >= minimum as usize
        }
    }
}

/// Days in `buckets` that qualify under `rule`.
pub fn qualifying_days(buckets: &DayBuckets, rule: &MatchRule<'_>) -> Vec<NaiveDate> {
    buckets
        .iter()
        .filter(|(_, completed)| rule.qualifies(completed))
        .map(|(day, _)| *day)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::testing::*;

    fn set(ids: &[&str]) -> HashSet<HabitId> {
        ids.iter().map(|h| HabitId::new(h)).collect()
    }

    #[test]
    fn test_all_mode_needs_every_habit() {
        let linked = habits(&["A", "B"]);
        assert!(!day_qualifies(HabitMatchMode::All, 0, &linked, &set(&["A"])));
        assert!(day_qualifies(HabitMatchMode::All, 0, &linked, &set(&["A", "B"])));
    }

    #[test]
    fn test_minimum_mode_counts_distinct_habits() {
        let linked = habits(&["A", "B", "C"]);
        assert!(day_qualifies(HabitMatchMode::Minimum, 2, &linked, &set(&["A", "C"])));
        assert!(!day_qualifies(HabitMatchMode::Minimum, 2, &linked, &set(&["B"])));
    }

    #[test]
    fn test_any_mode_ignores_unlinked_habits() {
        let linked = habits(&["A"]);
        assert!(day_qualifies(HabitMatchMode::Any, 0, &linked, &set(&["A", "Z"])));
        assert!(!day_qualifies(HabitMatchMode::Single, 0, &linked, &set(&["Z"])));
    }

    #[test]
    fn test_buckets_skip_incomplete_entries() {
        let d = day(2024, 3, 1);
        let mut missed = entry("A", d, None);
        missed.completed = false;
        let entries = vec![entry("B", d, None), missed];

        let buckets = bucket_by_day(&entries);
        assert_eq!(buckets[&d], set(&["B"]));
    }

    #[test]
    fn test_minimum_mode_without_threshold_is_malformed() {
        let c = challenge(
            crate::challenge::ChallengeType::Streak,
            HabitMatchMode::Minimum,
        );
        let ids = habits(&["A"]);
        assert!(matches!(
            MatchRule::for_challenge(&c, &ids),
            Err(CoreError::MalformedChallenge { .. })
        ));
    }
}
