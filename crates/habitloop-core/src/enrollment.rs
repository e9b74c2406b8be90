//! Challenge creation and membership changes.
//!
//! Every change here rewrites the challenge's aggregate stats and refreshes
//! the affected users' membership cache entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::cache::{self, MembershipCache};
use crate::challenge::{
    Challenge, ChallengeRules, ChallengeStats, ChallengeStatus, ChallengeType, HabitMatchMode,
    Milestone, Participant, ParticipantStatus,
};
use crate::error::{CoreError, Result, ValidationError};
use crate::ids::{ChallengeId, HabitId, UserId, WorkspaceId};
use crate::storage::Collaborators;

/// Fields a member supplies when creating a challenge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeDraft {
    pub workspace_id: WorkspaceId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub kind: ChallengeType,
    #[serde(default)]
    pub habit_match_mode: HabitMatchMode,
    #[serde(default)]
    pub habit_match_minimum: Option<u32>,
    #[serde(default)]
    pub habit_template_id: Option<HabitId>,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rules: ChallengeRules,
    #[serde(default)]
    pub milestones: Vec<Milestone>,
}

impl ChallengeDraft {
    pub fn new(workspace_id: WorkspaceId, title: impl Into<String>, kind: ChallengeType) -> Self {
        Self {
            workspace_id,
            title: title.into(),
            description: String::new(),
            kind,
            habit_match_mode: HabitMatchMode::default(),
            habit_match_minimum: None,
            habit_template_id: None,
            start_date: None,
            end_date: None,
            rules: ChallengeRules::default(),
            milestones: Vec::new(),
        }
    }

    /// Check the draft before any record is written.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(invalid("title", "must not be empty"));
        }

        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start >= end {
                return Err(ValidationError::InvalidTimeRange { start, end });
            }
        }

        match (self.habit_match_mode, self.habit_match_minimum) {
            (HabitMatchMode::Minimum, None) | (HabitMatchMode::Minimum, Some(0)) => {
                return Err(invalid(
                    "habit_match_minimum",
                    "minimum mode needs a minimum of at least 1",
                ));
            }
            (HabitMatchMode::Minimum, Some(_)) | (_, None) => {}
            (mode, Some(_)) => {
                return Err(invalid(
                    "habit_match_minimum",
                    format!("only applies to minimum mode, not {}", mode.as_str()),
                ));
            }
        }

        if let Some(target) = self.rules.target_value {
            if !target.is_finite() || target <= 0.0 {
                return Err(invalid("rules.target_value", "must be greater than zero"));
            }
        }

        let ascending = self
            .milestones
            .windows(2)
            .all(|pair| pair[0].value < pair[1].value);
        if !ascending {
            return Err(invalid("milestones", "thresholds must be strictly ascending"));
        }

        Ok(())
    }
}

fn invalid(field: &str, message: impl Into<String>) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.to_string(),
        message: message.into(),
    }
}

/// Create, join, leave and cancel operations.
pub struct Enrollment {
    services: Collaborators,
    cache: Arc<dyn MembershipCache>,
}

impl Enrollment {
    pub fn new(services: Collaborators, cache: Arc<dyn MembershipCache>) -> Self {
        Self { services, cache }
    }

    /// Create a challenge with `creator` as its first participant.
    pub async fn create_challenge(
        &self,
        draft: ChallengeDraft,
        creator: &UserId,
        linked_habits: Vec<HabitId>,
        now: DateTime<Utc>,
    ) -> Result<Challenge> {
        draft.validate()?;
        let linked = self
            .validate_links(
                creator,
                linked_habits,
                draft.habit_match_mode,
                draft.habit_match_minimum,
            )
            .await?;

        let status = match draft.start_date {
            Some(start) if start > now => ChallengeStatus::Upcoming,
            _ => ChallengeStatus::Active,
        };

        let mut challenge = Challenge {
            id: ChallengeId::generate(),
            workspace_id: draft.workspace_id,
            created_by: creator.clone(),
            title: draft.title.trim().to_string(),
            description: draft.description,
            kind: draft.kind,
            habit_match_mode: draft.habit_match_mode,
            habit_match_minimum: draft.habit_match_minimum,
            habit_template_id: draft.habit_template_id,
            start_date: draft.start_date,
            end_date: draft.end_date,
            status,
            rules: draft.rules,
            milestones: draft.milestones,
            participants: vec![Participant::new(creator.clone(), linked, now)],
            stats: ChallengeStats::default(),
            created_at: now,
            updated_at: now,
        };
        challenge.refresh_stats();
        self.services.challenges.save_challenge(&challenge).await?;

        tracing::info!(
            challenge_id = %challenge.id,
            kind = %challenge.kind,
            status = %challenge.status,
            "challenge created"
        );
        self.refresh_membership(creator).await;
        Ok(challenge)
    }

    /// Enroll `user_id`. A dropped participant is reactivated with the new
    /// links and keeps their earlier progress and fired milestones.
    pub async fn join(
        &self,
        challenge_id: &ChallengeId,
        user_id: &UserId,
        linked_habits: Vec<HabitId>,
        now: DateTime<Utc>,
    ) -> Result<Challenge> {
        let mut challenge = self.load(challenge_id).await?;
        if challenge.status.is_terminal() {
            return Err(invalid(
                "status",
                format!("cannot join a {} challenge", challenge.status),
            )
            .into());
        }

        let linked = self
            .validate_links(
                user_id,
                linked_habits,
                challenge.habit_match_mode,
                challenge.habit_match_minimum,
            )
            .await?;

        match challenge.participant_mut(user_id) {
            Some(existing) if existing.status != ParticipantStatus::Dropped => {
                return Err(ValidationError::AlreadyParticipant(user_id.to_string()).into());
            }
            Some(existing) => {
                existing.status = ParticipantStatus::Active;
                existing.linked_habit_ids = linked;
                existing.linked_habit_id = None;
            }
            None => challenge
                .participants
                .push(Participant::new(user_id.clone(), linked, now)),
        }

        challenge.updated_at = now;
        challenge.refresh_stats();
        self.services.challenges.save_challenge(&challenge).await?;

        tracing::info!(challenge_id = %challenge.id, user_id = %user_id, "participant joined");
        self.refresh_membership(user_id).await;
        Ok(challenge)
    }

    /// Mark `user_id` as dropped. The creator has to cancel instead.
    pub async fn leave(
        &self,
        challenge_id: &ChallengeId,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Challenge> {
        let mut challenge = self.load(challenge_id).await?;
        if &challenge.created_by == user_id {
            return Err(ValidationError::CreatorCannotLeave.into());
        }

        let participant = challenge
            .participant_mut(user_id)
            .filter(|p| p.is_active())
            .ok_or_else(|| ValidationError::NotParticipant(user_id.to_string()))?;
        participant.status = ParticipantStatus::Dropped;

        challenge.updated_at = now;
        challenge.refresh_stats();
        self.services.challenges.save_challenge(&challenge).await?;

        tracing::info!(challenge_id = %challenge.id, user_id = %user_id, "participant left");
        self.refresh_membership(user_id).await;
        Ok(challenge)
    }

    /// Cancel an upcoming or active challenge. Creator only.
    pub async fn cancel(
        &self,
        challenge_id: &ChallengeId,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Challenge> {
        let mut challenge = self.load(challenge_id).await?;
        if &challenge.created_by != user_id {
            return Err(ValidationError::NotCreator.into());
        }
        if !challenge.status.can_transition_to(ChallengeStatus::Cancelled) {
            return Err(ValidationError::InvalidTransition {
                from: challenge.status.to_string(),
                to: ChallengeStatus::Cancelled.to_string(),
            }
            .into());
        }

        challenge.status = ChallengeStatus::Cancelled;
        challenge.updated_at = now;
        challenge.refresh_stats();
        self.services.challenges.save_challenge(&challenge).await?;

        tracing::info!(challenge_id = %challenge.id, "challenge cancelled");
        for member in challenge.enrolled_user_ids() {
            self.refresh_membership(&member).await;
        }
        Ok(challenge)
    }

    async fn load(&self, challenge_id: &ChallengeId) -> Result<Challenge> {
        self.services
            .challenges
            .get_challenge(challenge_id)
            .await?
            .ok_or_else(|| CoreError::not_found("challenge", challenge_id))
    }

    /// Check ownership and the match mode's habit count; returns the links
    /// with duplicates removed, in the order given.
    async fn validate_links(
        &self,
        user_id: &UserId,
        linked_habits: Vec<HabitId>,
        mode: HabitMatchMode,
        minimum: Option<u32>,
    ) -> Result<Vec<HabitId>> {
        let mut linked: Vec<HabitId> = Vec::with_capacity(linked_habits.len());
        for habit_id in linked_habits {
            if !linked.contains(&habit_id) {
                linked.push(habit_id);
            }
        }

        for habit_id in &linked {
            let habit = self
                .services
                .habits
                .get_habit(habit_id)
                .await?
                .ok_or_else(|| CoreError::not_found("habit", habit_id))?;
            if &habit.user_id != user_id {
                return Err(ValidationError::HabitNotOwned {
                    habit_id: habit_id.to_string(),
                    user_id: user_id.to_string(),
                }
                .into());
            }
        }

        let required = match mode {
            HabitMatchMode::All => 1,
            HabitMatchMode::Minimum => minimum.unwrap_or(1),
            HabitMatchMode::Single | HabitMatchMode::Any => 0,
        };
        if (linked.len() as u64) < u64::from(required) {
            return Err(ValidationError::NotEnoughHabits {
                required,
                linked: linked.len(),
            }
            .into());
        }

        Ok(linked)
    }

    async fn refresh_membership(&self, user_id: &UserId) {
        self.cache.invalidate(user_id).await;
        cache::warm(
            self.cache.as_ref(),
            self.services.challenges.as_ref(),
            user_id,
        )
        .await;
    }
}
