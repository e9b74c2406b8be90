//! Persistence and collaborator interfaces.
//!
//! The engine only talks to the traits defined here. [`Database`] implements
//! the document-store side for a single process; [`LogNotifier`] stands in
//! for the push delivery service.

mod config;
pub mod database;
pub mod migrations;
mod notify;

pub use config::{CacheConfig, Config, LoggingConfig, SchedulerConfig};
pub use database::Database;
pub use notify::LogNotifier;

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

use crate::challenge::{Challenge, ChallengeStatus};
use crate::error::{ConfigError, Result};
use crate::events::{FeedRecord, PushNotification};
use crate::habit::{Habit, HabitEntry};
use crate::ids::{ChallengeId, HabitId, UserId, WorkspaceId};

/// Returns `~/.config/habitloop[-dev]/` based on HABITLOOP_ENV.
///
/// Set HABITLOOP_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("HABITLOOP_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("habitloop-dev")
    } else {
        base_dir.join("habitloop")
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::LoadFailed {
        path: dir.clone(),
        message: e.to_string(),
    })?;
    Ok(dir)
}

/// Document store for challenge records.
#[async_trait]
pub trait ChallengeStore: Send + Sync {
    async fn get_challenge(&self, id: &ChallengeId) -> Result<Option<Challenge>>;

    /// Insert or replace the whole document.
    async fn save_challenge(&self, challenge: &Challenge) -> Result<()>;

    async fn list_challenges(&self, status: Option<ChallengeStatus>) -> Result<Vec<Challenge>>;

    /// Active challenges bound to a workspace habit template.
    async fn active_by_template(&self, template_id: &HabitId) -> Result<Vec<Challenge>>;

    /// Active challenges where `user_id` explicitly linked `habit_id`.
    async fn active_linking(&self, user_id: &UserId, habit_id: &HabitId)
        -> Result<Vec<Challenge>>;

    /// Active single-mode challenges in a workspace with no habit binding.
    async fn active_workspace_wide(&self, workspace_id: &WorkspaceId) -> Result<Vec<Challenge>>;

    /// Upcoming or active challenges that list `user_id` as a participant.
    async fn open_participations(&self, user_id: &UserId) -> Result<Vec<Challenge>>;
}

/// Habits, owned by the habit service.
#[async_trait]
pub trait HabitStore: Send + Sync {
    async fn get_habit(&self, id: &HabitId) -> Result<Option<Habit>>;

    async fn save_habit(&self, habit: &Habit) -> Result<()>;

    async fn list_habits(&self, user_id: &UserId) -> Result<Vec<Habit>>;
}

/// Check-in history, owned by the check-in flow.
#[async_trait]
pub trait EntryStore: Send + Sync {
    async fn record_entry(&self, entry: &HabitEntry) -> Result<()>;

    /// Completed entries for `user_id` across `habit_ids`, oldest first.
    async fn completed_entries(
        &self,
        user_id: &UserId,
        habit_ids: &[HabitId],
    ) -> Result<Vec<HabitEntry>>;
}

/// Workspace activity feed.
#[async_trait]
pub trait FeedSink: Send + Sync {
    async fn publish(&self, record: &FeedRecord) -> Result<()>;
}

/// Push delivery. Device registration and retry policy live behind this.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn broadcast(&self, notification: &PushNotification) -> Result<()>;
}

/// The external collaborators shared by the engine, enrollment and the
/// lifecycle scheduler.
#[derive(Clone)]
pub struct Collaborators {
    pub challenges: Arc<dyn ChallengeStore>,
    pub habits: Arc<dyn HabitStore>,
    pub entries: Arc<dyn EntryStore>,
    pub feed: Arc<dyn FeedSink>,
    pub notifier: Arc<dyn Notifier>,
}

impl Collaborators {
    /// Every store backed by one database, with pushes sent to `notifier`.
    pub fn from_database(db: Arc<Database>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            challenges: db.clone(),
            habits: db.clone(),
            entries: db.clone(),
            feed: db,
            notifier,
        }
    }
}
