//! Running totals inside the challenge window. Team goals share this
//! algorithm.

use crate::error::Result;

use super::{bucket_by_day, qualifying_days, ComputeInput, ProgressComputer, ProgressDelta};

pub struct CumulativeComputer;

impl ProgressComputer for CumulativeComputer {
    fn compute(&self, input: &ComputeInput<'_>) -> Result<Option<ProgressDelta>> {
        let challenge = input.challenge;
        let in_window: Vec<_> = input
            .counted_entries()
            .into_iter()
            .filter(|e| challenge.start_date.map_or(true, |start| e.date >= start))
            .filter(|e| challenge.end_date.map_or(true, |end| e.date <= end))
            .collect();

        let current_value = if challenge.habit_match_mode.is_any() {
            in_window.iter().map(|e| e.value.unwrap_or(1.0)).sum::<f64>()
        } else {
            // one point per qualifying day, not a raw value sum
            let rule = input.match_rule()?;
            let buckets = bucket_by_day(in_window.iter().copied());
            qualifying_days(&buckets, &rule).len() as f64
        };

        Ok(Some(ProgressDelta {
            current_value: Some(current_value),
            last_logged_at: in_window.iter().map(|e| e.date).max(),
            ..Default::default()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::challenge::{Challenge, ChallengeType, HabitMatchMode};
    use crate::habit::HabitEntry;
    use crate::progress::testing::*;
    use chrono::Utc;

    fn run(c: &Challenge, linked: &[&str], entries: &[HabitEntry]) -> f64 {
        let p = participant(linked);
        let ids = habits(linked);
        let input = ComputeInput {
            challenge: c,
            participant: &p,
            habit_ids: &ids,
            entries,
            now: Utc::now(),
        };
        CumulativeComputer
            .compute(&input)
            .unwrap()
            .unwrap()
            .current_value
            .unwrap()
    }

    #[test]
    fn test_any_mode_sums_values_and_counts_valueless_entries() {
        let c = challenge(ChallengeType::Cumulative, HabitMatchMode::Any);
        let d = day(2024, 2, 1);
        let entries = vec![
            entry("H1", d, Some(2.5)),
            entry("H1", d, None),
            entry("H1", day(2024, 2, 2), Some(4.0)),
        ];
        assert_eq!(run(&c, &["H1"], &entries), 7.5);
    }

    #[test]
    fn test_window_excludes_entries_outside_dates() {
        let mut c = challenge(ChallengeType::Cumulative, HabitMatchMode::Single);
        c.start_date = Some(at_noon(day(2024, 2, 2)) - chrono::Duration::hours(12));
        c.end_date = Some(at_noon(day(2024, 2, 3)));
        let entries = vec![
            entry("H1", day(2024, 2, 1), Some(100.0)),
            entry("H1", day(2024, 2, 2), Some(1.0)),
            entry("H1", day(2024, 2, 3), Some(2.0)),
            entry("H1", day(2024, 2, 4), Some(100.0)),
        ];
        assert_eq!(run(&c, &["H1"], &entries), 3.0);
    }

    #[test]
    fn test_all_mode_scores_qualifying_days() {
        let c = challenge(ChallengeType::Cumulative, HabitMatchMode::All);
        let entries = vec![
            entry("A", day(2024, 2, 1), Some(50.0)),
            entry("B", day(2024, 2, 1), Some(50.0)),
            entry("A", day(2024, 2, 2), Some(50.0)),
        ];
        assert_eq!(run(&c, &["A", "B"], &entries), 1.0);
    }

    #[test]
    fn test_minimum_mode_scores_qualifying_days() {
        let mut c = challenge(ChallengeType::TeamGoal, HabitMatchMode::Minimum);
        c.habit_match_minimum = Some(2);
        let entries = vec![
            entry("A", day(2024, 2, 1), None),
            entry("C", day(2024, 2, 1), None),
            entry("B", day(2024, 2, 2), None),
            entry("A", day(2024, 2, 3), None),
            entry("B", day(2024, 2, 3), None),
            entry("C", day(2024, 2, 3), None),
        ];
        assert_eq!(run(&c, &["A", "B", "C"], &entries), 2.0);
    }

    #[test]
    fn test_repeated_runs_are_identical() {
        let mut c = challenge(ChallengeType::Cumulative, HabitMatchMode::Any);
        c.start_date = Some(at_noon(day(2024, 1, 1)));
        let entries = vec![
            entry("H1", day(2024, 1, 2), Some(3.0)),
            entry("H1", day(2024, 1, 5), Some(1.5)),
        ];
        let first = run(&c, &["H1"], &entries);
        let second = run(&c, &["H1"], &entries);
        assert_eq!(first, second);
        assert_eq!(first, 4.5);
    }
}
