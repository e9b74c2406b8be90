//! Challenge progress engine.
//!
//! Entry point for the check-in flow. A check-in is committed before the
//! engine runs, and nothing in here may fail it: every error is folded into
//! a [`ProgressOutcome`] with `processed: false`.
//!
//! Flow per check-in:
//! 1. membership cache fast path
//! 2. habit lookup and candidate resolution
//! 3. per candidate: compute, merge, detect milestones, persist, emit
//!
//! Each candidate challenge is processed inside its own error boundary, so
//! one malformed record never blocks updates to the others.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::cache::{self, MembershipCache};
use crate::challenge::{Challenge, ChallengeType, Milestone, ParticipantStatus, Progress};
use crate::error::Result;
use crate::events::{self, ChallengeEvent};
use crate::ids::{ChallengeId, HabitId, UserId};
use crate::milestones::detect_milestones;
use crate::progress::{computer_for, effective_habit_ids, ComputeInput};
use crate::resolver::ChallengeQueryResolver;
use crate::storage::{CacheConfig, Collaborators};
use crate::updater::apply_progress;

/// Engine switches, usually taken from `[cache]` in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub cache_enabled: bool,
    pub warm_on_first_checkin: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&CacheConfig::default())
    }
}

impl From<&CacheConfig> for EngineSettings {
    fn from(cfg: &CacheConfig) -> Self {
        Self {
            cache_enabled: cfg.enabled,
            warm_on_first_checkin: cfg.warm_on_first_checkin,
        }
    }
}

/// Progress written to one challenge by one check-in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeUpdate {
    pub challenge_id: ChallengeId,
    #[serde(rename = "type")]
    pub kind: ChallengeType,
    pub progress: Progress,
    pub status: ParticipantStatus,
    /// True on the check-in that reached the target
    #[serde(default)]
    pub just_completed: bool,
    /// Milestones first crossed by this check-in
    #[serde(default)]
    pub milestones: Vec<Milestone>,
}

/// Result handed back to the check-in flow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressOutcome {
    pub processed: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub updates: Vec<ChallengeUpdate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProgressOutcome {
    pub fn skipped(message: impl Into<String>) -> Self {
        Self {
            processed: false,
            message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            processed: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn updated(updates: Vec<ChallengeUpdate>) -> Self {
        Self {
            processed: true,
            updates,
            ..Default::default()
        }
    }
}

/// The challenge progress engine.
pub struct ChallengeEngine {
    services: Collaborators,
    cache: Arc<dyn MembershipCache>,
    settings: EngineSettings,
}

impl ChallengeEngine {
    pub fn new(
        services: Collaborators,
        cache: Arc<dyn MembershipCache>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            services,
            cache,
            settings,
        }
    }

    /// Recompute progress after `user_id` checked in on `habit_id`.
    pub async fn process_challenge_progress(
        &self,
        user_id: &UserId,
        habit_id: &HabitId,
    ) -> ProgressOutcome {
        self.process_challenge_progress_at(user_id, habit_id, Utc::now())
            .await
    }

    /// Same as [`Self::process_challenge_progress`] with an explicit clock.
    pub async fn process_challenge_progress_at(
        &self,
        user_id: &UserId,
        habit_id: &HabitId,
        now: DateTime<Utc>,
    ) -> ProgressOutcome {
        match self.process(user_id, habit_id, now).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(
                    user_id = %user_id,
                    habit_id = %habit_id,
                    error = %e,
                    "challenge progress processing failed"
                );
                ProgressOutcome::failed(e.to_string())
            }
        }
    }

    /// Drop the cached membership for `user_id`.
    pub async fn invalidate_cache(&self, user_id: &UserId) {
        self.cache.invalidate(user_id).await;
    }

    /// Rebuild the cached membership for `user_id`.
    pub async fn warm_cache_for_user(&self, user_id: &UserId) {
        cache::warm(
            self.cache.as_ref(),
            self.services.challenges.as_ref(),
            user_id,
        )
        .await;
    }

    async fn process(
        &self,
        user_id: &UserId,
        habit_id: &HabitId,
        now: DateTime<Utc>,
    ) -> Result<ProgressOutcome> {
        let cached = if self.settings.cache_enabled {
            self.cache.get(user_id).await
        } else {
            None
        };
        if let Some(membership) = &cached {
            if membership.excludes(habit_id) {
                tracing::debug!(
                    user_id = %user_id,
                    habit_id = %habit_id,
                    "fast path: habit not in any active challenge"
                );
                return Ok(ProgressOutcome::skipped(
                    "habit is not linked to any active challenge",
                ));
            }
        }

        let outcome = self.process_candidates(user_id, habit_id, now).await;

        if cached.is_none() && self.settings.cache_enabled && self.settings.warm_on_first_checkin {
            self.warm_cache_for_user(user_id).await;
        }
        outcome
    }

    async fn process_candidates(
        &self,
        user_id: &UserId,
        habit_id: &HabitId,
        now: DateTime<Utc>,
    ) -> Result<ProgressOutcome> {
        let Some(habit) = self.services.habits.get_habit(habit_id).await? else {
            return Ok(ProgressOutcome::skipped(format!(
                "habit '{habit_id}' not found"
            )));
        };

        let candidates = ChallengeQueryResolver::new(self.services.challenges.as_ref())
            .resolve(user_id, &habit)
            .await?;
        if candidates.is_empty() {
            return Ok(ProgressOutcome::skipped("no active challenges for this habit"));
        }

        let mut updates = Vec::new();
        for challenge in candidates {
            let challenge_id = challenge.id.clone();
            match self.update_challenge(challenge, user_id, habit_id, now).await {
                Ok(Some(update)) => updates.push(update),
                Ok(None) => {}
                Err(e) => tracing::warn!(
                    challenge_id = %challenge_id,
                    user_id = %user_id,
                    error = %e,
                    "skipping challenge after update failure"
                ),
            }
        }
        if updates.is_empty() {
            return Ok(ProgressOutcome::skipped(
                "no challenge progress was recorded",
            ));
        }
        Ok(ProgressOutcome::updated(updates))
    }

    async fn update_challenge(
        &self,
        mut challenge: Challenge,
        user_id: &UserId,
        habit_id: &HabitId,
        now: DateTime<Utc>,
    ) -> Result<Option<ChallengeUpdate>> {
        let habit_ids = match challenge.participant(user_id) {
            Some(participant) => effective_habit_ids(participant, habit_id),
            None => return Ok(None),
        };
        let entries = self
            .services
            .entries
            .completed_entries(user_id, &habit_ids)
            .await?;

        let delta = match challenge.participant(user_id) {
            Some(participant) => {
                let input = ComputeInput {
                    challenge: &challenge,
                    participant,
                    habit_ids: &habit_ids,
                    entries: &entries,
                    now,
                };
                computer_for(challenge.kind).compute(&input)?
            }
            None => None,
        };
        let Some(delta) = delta else {
            tracing::debug!(challenge_id = %challenge.id, "no progress to record yet");
            return Ok(None);
        };

        let Some(update) = apply_progress(&mut challenge, user_id, &delta, now) else {
            return Ok(None);
        };

        let thresholds = challenge.milestones.clone();
        let (crossed, participant) = match challenge.participant_mut(user_id) {
            Some(participant) => (detect_milestones(participant, &thresholds), participant.clone()),
            None => (Vec::new(), update.participant),
        };
        challenge.refresh_stats();
        self.services.challenges.save_challenge(&challenge).await?;

        tracing::debug!(
            challenge_id = %challenge.id,
            user_id = %user_id,
            current_value = participant.progress.current_value,
            current_streak = participant.progress.current_streak,
            "participant progress saved"
        );

        for milestone in &crossed {
            tracing::info!(
                challenge_id = %challenge.id,
                user_id = %user_id,
                threshold = milestone.value,
                "milestone reached"
            );
            let event = ChallengeEvent::milestone(&challenge, milestone.clone(), now);
            self.deliver(&challenge, user_id, &event).await;
        }
        if update.just_completed {
            tracing::info!(challenge_id = %challenge.id, user_id = %user_id, "participant completed challenge");
            let event = ChallengeEvent::completed(&challenge, participant.progress.current_value, now);
            self.deliver(&challenge, user_id, &event).await;
        }

        Ok(Some(ChallengeUpdate {
            challenge_id: challenge.id.clone(),
            kind: challenge.kind,
            progress: participant.progress,
            status: participant.status,
            just_completed: update.just_completed,
            milestones: crossed,
        }))
    }

    async fn deliver(&self, challenge: &Challenge, actor: &UserId, event: &ChallengeEvent) {
        events::deliver(
            self.services.feed.as_ref(),
            self.services.notifier.as_ref(),
            challenge,
            actor,
            event,
        )
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_follow_cache_config() {
        let cfg = CacheConfig {
            enabled: false,
            warm_on_first_checkin: true,
        };
        let settings = EngineSettings::from(&cfg);
        assert!(!settings.cache_enabled);
        assert!(settings.warm_on_first_checkin);
        assert!(EngineSettings::default().cache_enabled);
    }

    #[test]
    fn test_outcome_serializes_without_empty_fields() {
        let json = serde_json::to_value(ProgressOutcome::skipped("nothing to do")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "processed": false, "message": "nothing to do" })
        );
    }
}
