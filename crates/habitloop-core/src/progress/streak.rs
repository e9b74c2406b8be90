//! Consecutive qualifying days ending today.

use crate::error::Result;

use super::{bucket_by_day, ComputeInput, ProgressComputer, ProgressDelta};

pub struct StreakComputer;

impl ProgressComputer for StreakComputer {
    fn compute(&self, input: &ComputeInput<'_>) -> Result<Option<ProgressDelta>> {
        let previous_best = input.participant.progress.best_streak;
        let counted = input.counted_entries();

        if counted.is_empty() {
            return Ok(Some(ProgressDelta {
                current_value: Some(0.0),
                current_streak: Some(0),
                best_streak: Some(previous_best),
                ..Default::default()
            }));
        }

        let rule = input.match_rule()?;
        let buckets = bucket_by_day(counted.iter().copied());

        // Walk back from today; an absent day ends the run like a failed one.
        let mut streak: u32 = 0;
        let mut day = input.now.date_naive();
        while let Some(completed) = buckets.get(&day) {
            if !rule.qualifies(completed) {
                break;
            }
            streak += 1;
            match day.pred_opt() {
                Some(prev) => day = prev,
                None => break,
            }
        }

        Ok(Some(ProgressDelta {
            current_value: Some(f64::from(streak)),
            current_streak: Some(streak),
            best_streak: Some(previous_best.max(streak)),
            completion_rate: None,
            last_logged_at: input.latest_logged_at(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::challenge::{ChallengeType, HabitMatchMode};
    use crate::habit::HabitEntry;
    use crate::progress::testing::*;
    use chrono::{Duration, NaiveDate};
    use proptest::prelude::*;

    fn run(
        mode: HabitMatchMode,
        linked: &[&str],
        entries: &[HabitEntry],
        today: NaiveDate,
        previous_best: u32,
    ) -> ProgressDelta {
        let c = challenge(ChallengeType::Streak, mode);
        let mut p = participant(linked);
        p.progress.best_streak = previous_best;
        let ids = habits(linked);
        let input = ComputeInput {
            challenge: &c,
            participant: &p,
            habit_ids: &ids,
            entries,
            now: at_noon(today),
        };
        StreakComputer.compute(&input).unwrap().unwrap()
    }

    #[test]
    fn test_counts_consecutive_days_ending_today() {
        let today = day(2024, 5, 10);
        let entries: Vec<_> = (0..4)
            .map(|i| entry("H1", today - Duration::days(i), None))
            .collect();

        let delta = run(HabitMatchMode::Any, &["H1"], &entries, today, 0);
        assert_eq!(delta.current_streak, Some(4));
        assert_eq!(delta.current_value, Some(4.0));
        assert_eq!(delta.best_streak, Some(4));
    }

    #[test]
    fn test_gap_stops_the_walk() {
        let today = day(2024, 5, 10);
        let entries = vec![
            entry("H1", today, None),
            entry("H1", today - Duration::days(1), None),
            entry("H1", today - Duration::days(3), None),
        ];
        let delta = run(HabitMatchMode::Any, &["H1"], &entries, today, 0);
        assert_eq!(delta.current_streak, Some(2));
    }

    #[test]
    fn test_missing_today_means_zero() {
        let today = day(2024, 5, 10);
        let entries = vec![entry("H1", today - Duration::days(1), None)];
        let delta = run(HabitMatchMode::Any, &["H1"], &entries, today, 6);
        assert_eq!(delta.current_streak, Some(0));
        assert_eq!(delta.best_streak, Some(6));
    }

    #[test]
    fn test_all_mode_breaks_on_partial_day() {
        // H1 every day for 5 days, H2 only days 1-3; today is day 5.
        let day1 = day(2024, 1, 1);
        let mut entries = Vec::new();
        for i in 0..5 {
            entries.push(entry("H1", day1 + Duration::days(i), None));
        }
        for i in 0..3 {
            entries.push(entry("H2", day1 + Duration::days(i), None));
        }

        let today = day1 + Duration::days(4);
        let delta = run(HabitMatchMode::All, &["H1", "H2"], &entries, today, 0);
        assert_eq!(delta.current_streak, Some(0));

        let delta = run(
            HabitMatchMode::All,
            &["H1", "H2"],
            &entries,
            day1 + Duration::days(2),
            0,
        );
        assert_eq!(delta.current_streak, Some(3));
    }

    #[test]
    fn test_no_entries_returns_zeroed_progress() {
        let delta = run(HabitMatchMode::Any, &["H1"], &[], day(2024, 1, 1), 3);
        assert_eq!(delta.current_streak, Some(0));
        assert_eq!(delta.current_value, Some(0.0));
        assert_eq!(delta.best_streak, Some(3));
        assert_eq!(delta.last_logged_at, None);
    }

    proptest! {
        #[test]
        fn streak_matches_backward_walk_and_best_never_drops(
            offsets in proptest::collection::vec(0i64..20, 0..30),
            previous_best in 0u32..15,
        ) {
            let today = day(2024, 6, 30);
            let entries: Vec<_> = offsets
                .iter()
                .map(|o| entry("H1", today - Duration::days(*o), None))
                .collect();

            let mut expected = 0u32;
            while offsets.contains(&i64::from(expected)) {
                expected += 1;
            }

            let delta = run(HabitMatchMode::Any, &["H1"], &entries, today, previous_best);
            prop_assert_eq!(delta.current_streak, Some(expected));
            prop_assert!(delta.best_streak.unwrap() >= previous_best);
            prop_assert!(delta.best_streak.unwrap() >= expected);
        }
    }
}
