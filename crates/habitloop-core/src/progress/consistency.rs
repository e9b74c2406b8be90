//! Share of elapsed challenge days that qualified.

use chrono::Duration;
use std::collections::BTreeSet;

use crate::error::Result;

use super::{
    bucket_by_day, qualifying_days, require_start, ComputeInput, ProgressComputer, ProgressDelta,
};

pub struct ConsistencyComputer;

impl ProgressComputer for ConsistencyComputer {
    fn compute(&self, input: &ComputeInput<'_>) -> Result<Option<ProgressDelta>> {
        let challenge = input.challenge;
        let start = require_start(challenge)?;
        let until = match challenge.end_date {
            Some(end) if end < input.now => end,
            _ => input.now,
        };

        let elapsed = until - start;
        let day_secs = Duration::days(1).num_seconds();
        // ceil for positive spans; zero or negative means nothing to score yet
        let duration_days = (elapsed.num_seconds() + day_secs - 1).div_euclid(day_secs);
        if duration_days <= 0 {
            return Ok(None);
        }

        let in_window: Vec<_> = input
            .counted_entries()
            .into_iter()
            .filter(|e| e.date >= start && e.date <= until)
            .collect();

        let days = if challenge.habit_match_mode.is_any() {
            in_window
                .iter()
                .map(|e| e.day())
                .collect::<BTreeSet<_>>()
                .len()
        } else {
            let rule = input.match_rule()?;
            let buckets = bucket_by_day(in_window.iter().copied());
            qualifying_days(&buckets, &rule).len()
        };

        // calendar days can outnumber elapsed days when start is late in a day
        let rate = (days as f64 / duration_days as f64 * 100.0).round().min(100.0);

        Ok(Some(ProgressDelta {
            current_value: Some(days as f64),
            completion_rate: Some(rate as u32),
            last_logged_at: in_window.iter().map(|e| e.date).max(),
            ..Default::default()
        }))
    }
}
