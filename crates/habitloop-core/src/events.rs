use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::challenge::{Challenge, ChallengeStats, Milestone};
use crate::ids::{ChallengeId, UserId, WorkspaceId};
use crate::storage::{FeedSink, Notifier};

/// Every engine-visible change to a challenge produces a ChallengeEvent.
/// The feed stores them; the notifier turns them into push payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChallengeEvent {
    /// A participant crossed a milestone threshold for the first time.
    MilestoneReached {
        challenge_id: ChallengeId,
        title: String,
        milestone: Milestone,
        at: DateTime<Utc>,
    },
    /// A participant reached the challenge target.
    ParticipantCompleted {
        challenge_id: ChallengeId,
        title: String,
        current_value: f64,
        at: DateTime<Utc>,
    },
    ChallengeStarted {
        challenge_id: ChallengeId,
        title: String,
        at: DateTime<Utc>,
    },
    ChallengeEnded {
        challenge_id: ChallengeId,
        title: String,
        stats: ChallengeStats,
        at: DateTime<Utc>,
    },
}

/// Feed record types shown in the workspace activity stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedEventType {
    ChallengeMilestone,
    ChallengeCompleted,
    ChallengeStarted,
    ChallengeEnded,
}

impl FeedEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedEventType::ChallengeMilestone => "challenge_milestone",
            FeedEventType::ChallengeCompleted => "challenge_completed",
            FeedEventType::ChallengeStarted => "challenge_started",
            FeedEventType::ChallengeEnded => "challenge_ended",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Workspace,
}

/// Activity record handed to the feed store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedRecord {
    pub workspace_id: WorkspaceId,
    pub user_id: UserId,
    #[serde(rename = "type")]
    pub kind: FeedEventType,
    pub data: serde_json::Value,
    pub visibility: Visibility,
    pub created_at: DateTime<Utc>,
}

/// Push payload fanned out to every recipient's devices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushNotification {
    pub recipients: Vec<UserId>,
    pub title: String,
    pub body: String,
    pub challenge_id: ChallengeId,
}

impl ChallengeEvent {
    pub fn milestone(challenge: &Challenge, milestone: Milestone, at: DateTime<Utc>) -> Self {
        ChallengeEvent::MilestoneReached {
            challenge_id: challenge.id.clone(),
            title: challenge.title.clone(),
            milestone,
            at,
        }
    }

    pub fn completed(challenge: &Challenge, current_value: f64, at: DateTime<Utc>) -> Self {
        ChallengeEvent::ParticipantCompleted {
            challenge_id: challenge.id.clone(),
            title: challenge.title.clone(),
            current_value,
            at,
        }
    }

    pub fn started(challenge: &Challenge, at: DateTime<Utc>) -> Self {
        ChallengeEvent::ChallengeStarted {
            challenge_id: challenge.id.clone(),
            title: challenge.title.clone(),
            at,
        }
    }

    pub fn ended(challenge: &Challenge, at: DateTime<Utc>) -> Self {
        ChallengeEvent::ChallengeEnded {
            challenge_id: challenge.id.clone(),
            title: challenge.title.clone(),
            stats: challenge.stats.clone(),
            at,
        }
    }

    pub fn feed_type(&self) -> FeedEventType {
        match self {
            ChallengeEvent::MilestoneReached { .. } => FeedEventType::ChallengeMilestone,
            ChallengeEvent::ParticipantCompleted { .. } => FeedEventType::ChallengeCompleted,
            ChallengeEvent::ChallengeStarted { .. } => FeedEventType::ChallengeStarted,
            ChallengeEvent::ChallengeEnded { .. } => FeedEventType::ChallengeEnded,
        }
    }

    pub fn challenge_id(&self) -> &ChallengeId {
        match self {
            ChallengeEvent::MilestoneReached { challenge_id, .. }
            | ChallengeEvent::ParticipantCompleted { challenge_id, .. }
            | ChallengeEvent::ChallengeStarted { challenge_id, .. }
            | ChallengeEvent::ChallengeEnded { challenge_id, .. } => challenge_id,
        }
    }

    pub fn at(&self) -> DateTime<Utc> {
        match self {
            ChallengeEvent::MilestoneReached { at, .. }
            | ChallengeEvent::ParticipantCompleted { at, .. }
            | ChallengeEvent::ChallengeStarted { at, .. }
            | ChallengeEvent::ChallengeEnded { at, .. } => *at,
        }
    }

    /// Feed record attributed to `user_id`.
    pub fn to_feed_record(
        &self,
        workspace_id: &WorkspaceId,
        user_id: &UserId,
    ) -> Result<FeedRecord, serde_json::Error> {
        Ok(FeedRecord {
            workspace_id: workspace_id.clone(),
            user_id: user_id.clone(),
            kind: self.feed_type(),
            data: serde_json::to_value(self)?,
            visibility: Visibility::Workspace,
            created_at: self.at(),
        })
    }

    pub fn notification(&self, recipients: Vec<UserId>) -> PushNotification {
        let (title, body) = match self {
            ChallengeEvent::MilestoneReached {
                title, milestone, ..
            } => (
                format!("Milestone reached in {title}"),
                milestone.label.clone(),
            ),
            ChallengeEvent::ParticipantCompleted { title, .. } => (
                format!("{title} complete"),
                "You hit the challenge target.".to_string(),
            ),
            ChallengeEvent::ChallengeStarted { title, .. } => (
                format!("{title} has started"),
                "Check in today to get going.".to_string(),
            ),
            ChallengeEvent::ChallengeEnded { title, stats, .. } => (
                format!("{title} has ended"),
                format!(
                    "{} of {} participants finished.",
                    stats.completed_count, stats.participant_count
                ),
            ),
        };
        PushNotification {
            recipients,
            title,
            body,
            challenge_id: self.challenge_id().clone(),
        }
    }
}

/// Hand `event` to the feed and push every enrolled participant.
///
/// Delivery failures are logged and swallowed; the challenge record has
/// already been persisted by the time events go out.
pub async fn deliver(
    feed: &dyn FeedSink,
    notifier: &dyn Notifier,
    challenge: &Challenge,
    actor: &UserId,
    event: &ChallengeEvent,
) {
    match event.to_feed_record(&challenge.workspace_id, actor) {
        Ok(record) => {
            if let Err(e) = feed.publish(&record).await {
                tracing::warn!(
                    challenge_id = %challenge.id,
                    kind = record.kind.as_str(),
                    error = %e,
                    "feed publish failed"
                );
            }
        }
        Err(e) => tracing::warn!(challenge_id = %challenge.id, error = %e, "feed record encoding failed"),
    }

    let push = event.notification(challenge.enrolled_user_ids());
    if let Err(e) = notifier.broadcast(&push).await {
        tracing::warn!(challenge_id = %challenge.id, error = %e, "push broadcast failed");
    }
}
