//! Challenge and participant records.
//!
//! A [`Challenge`] is one document: its rules, milestones, participants and
//! aggregate stats travel together and are persisted as a unit.

mod stats;

pub use stats::ChallengeStats;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::{ChallengeId, HabitId, UserId, WorkspaceId};

/// How progress is measured for a challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeType {
    /// Consecutive qualifying days ending today
    Streak,
    /// Running total inside the challenge window
    Cumulative,
    /// Share of elapsed days that qualified
    Consistency,
    /// Shared total; computed like `Cumulative`
    TeamGoal,
}

impl ChallengeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeType::Streak => "streak",
            ChallengeType::Cumulative => "cumulative",
            ChallengeType::Consistency => "consistency",
            ChallengeType::TeamGoal => "team_goal",
        }
    }
}

impl fmt::Display for ChallengeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How several linked habits combine into one "day qualifies" signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HabitMatchMode {
    /// One habit per participant; workspace-wide challenges use this mode
    #[default]
    Single,
    /// Any linked habit completed
    Any,
    /// Every linked habit completed
    All,
    /// At least `habit_match_minimum` linked habits completed
    Minimum,
}

impl HabitMatchMode {
    /// `Single` and `Any` qualify a day on one completion.
    pub fn is_any(&self) -> bool {
        matches!(self, HabitMatchMode::Single | HabitMatchMode::Any)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HabitMatchMode::Single => "single",
            HabitMatchMode::Any => "any",
            HabitMatchMode::All => "all",
            HabitMatchMode::Minimum => "minimum",
        }
    }
}

/// Challenge-level lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeStatus {
    Upcoming,
    Active,
    Completed,
    Cancelled,
    Expired,
}

impl ChallengeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeStatus::Upcoming => "upcoming",
            ChallengeStatus::Active => "active",
            ChallengeStatus::Completed => "completed",
            ChallengeStatus::Cancelled => "cancelled",
            ChallengeStatus::Expired => "expired",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "upcoming" => Some(ChallengeStatus::Upcoming),
            "active" => Some(ChallengeStatus::Active),
            "completed" => Some(ChallengeStatus::Completed),
            "cancelled" => Some(ChallengeStatus::Cancelled),
            "expired" => Some(ChallengeStatus::Expired),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ChallengeStatus::Completed | ChallengeStatus::Cancelled | ChallengeStatus::Expired
        )
    }

    /// Monotonic transitions: upcoming -> active -> (completed | expired),
    /// with cancellation allowed from any non-terminal state. Upcoming may
    /// expire directly when its window closed before it was activated.
    pub fn can_transition_to(&self, next: ChallengeStatus) -> bool {
        use ChallengeStatus::*;
        matches!(
            (self, next),
            (Upcoming, Active)
                | (Upcoming, Expired)
                | (Upcoming, Cancelled)
                | (Active, Completed)
                | (Active, Expired)
                | (Active, Cancelled)
        )
    }
}

impl fmt::Display for ChallengeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Participant enrollment status. `Completed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantStatus {
    Active,
    Completed,
    Dropped,
}

impl ParticipantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantStatus::Active => "active",
            ParticipantStatus::Completed => "completed",
            ParticipantStatus::Dropped => "dropped",
        }
    }
}

/// Tunable rules attached to a challenge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChallengeRules {
    /// Value at which a participant completes the challenge
    #[serde(default)]
    pub target_value: Option<f64>,
    #[serde(default)]
    pub target_unit: Option<String>,
    #[serde(default)]
    pub grace_period_hours: u32,
    #[serde(default)]
    pub allow_makeup_days: bool,
    /// Entries whose value falls below this do not count
    #[serde(default)]
    pub minimum_daily_value: Option<f64>,
}

/// A progress threshold that fires once per participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub value: f64,
    pub label: String,
}

/// A participant's computed progress.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    #[serde(default)]
    pub current_value: f64,
    #[serde(default)]
    pub current_streak: u32,
    #[serde(default)]
    pub best_streak: u32,
    /// Percentage, 0-100
    #[serde(default)]
    pub completion_rate: u32,
    #[serde(default)]
    pub last_logged_at: Option<DateTime<Utc>>,
}

/// One user's enrollment in one challenge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: UserId,
    pub joined_at: DateTime<Utc>,
    pub status: ParticipantStatus,
    /// Single-habit link kept for records written before multi-habit links
    #[serde(default)]
    pub linked_habit_id: Option<HabitId>,
    #[serde(default)]
    pub linked_habit_ids: Vec<HabitId>,
    #[serde(default)]
    pub progress: Progress,
    /// Milestone thresholds already fired for this participant
    #[serde(default)]
    pub milestones_reached: Vec<f64>,
}

impl Participant {
    pub fn new(user_id: UserId, linked_habit_ids: Vec<HabitId>, joined_at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            joined_at,
            status: ParticipantStatus::Active,
            linked_habit_id: None,
            linked_habit_ids,
            progress: Progress::default(),
            milestones_reached: Vec::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ParticipantStatus::Active
    }

    /// Habits explicitly linked by this participant: the multi-habit list
    /// when present, otherwise the legacy single link.
    pub fn linked_habits(&self) -> Vec<HabitId> {
        if !self.linked_habit_ids.is_empty() {
            return self.linked_habit_ids.clone();
        }
        self.linked_habit_id.iter().cloned().collect()
    }

    pub fn has_linked(&self, habit_id: &HabitId) -> bool {
        self.linked_habit_id.as_ref() == Some(habit_id) || self.linked_habit_ids.contains(habit_id)
    }

    pub fn has_reached(&self, threshold: f64) -> bool {
        self.milestones_reached.iter().any(|t| *t == threshold)
    }
}

/// A time-boxed group goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Challenge {
    pub id: ChallengeId,
    pub workspace_id: WorkspaceId,
    pub created_by: UserId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub kind: ChallengeType,
    #[serde(default)]
    pub habit_match_mode: HabitMatchMode,
    #[serde(default)]
    pub habit_match_minimum: Option<u32>,
    /// Workspace habit template this challenge tracks, if any
    #[serde(default)]
    pub habit_template_id: Option<HabitId>,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    pub status: ChallengeStatus,
    #[serde(default)]
    pub rules: ChallengeRules,
    #[serde(default)]
    pub milestones: Vec<Milestone>,
    #[serde(default)]
    pub participants: Vec<Participant>,
    #[serde(default)]
    pub stats: ChallengeStats,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Challenge {
    pub fn participant(&self, user_id: &UserId) -> Option<&Participant> {
        self.participants.iter().find(|p| &p.user_id == user_id)
    }

    pub fn participant_mut(&mut self, user_id: &UserId) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| &p.user_id == user_id)
    }

    pub fn target(&self) -> Option<f64> {
        self.rules.target_value
    }

    /// Users who are still enrolled (not dropped).
    pub fn enrolled_user_ids(&self) -> Vec<UserId> {
        self.participants
            .iter()
            .filter(|p| p.status != ParticipantStatus::Dropped)
            .map(|p| p.user_id.clone())
            .collect()
    }

    /// True when the challenge binds no specific habit and accepts any
    /// habit from its workspace.
    pub fn is_workspace_wide(&self) -> bool {
        self.habit_template_id.is_none() && self.habit_match_mode == HabitMatchMode::Single
    }

    pub fn refresh_stats(&mut self) {
        self.stats = ChallengeStats::recompute(&self.participants, self.target());
    }
}
