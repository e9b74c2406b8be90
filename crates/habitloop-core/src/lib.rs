//! # Habitloop Core Library
//!
//! This library provides the challenge progress engine behind Habitloop's
//! group habit challenges. Members join shared challenges, and every habit
//! check-in may move their progress forward under the challenge's rules.
//! The `habitloop` CLI is a thin front-end over the same library.
//!
//! ## Architecture
//!
//! - **Progress computers**: pure functions from an entry history to a
//!   progress delta, one per challenge type, selected by [`computer_for`]
//! - **Engine**: fast-path cache check, candidate resolution, and a
//!   per-challenge update pass with its own error boundary
//! - **Lifecycle**: an hourly sweep that starts and ends challenges by date
//! - **Storage**: SQLite document store and TOML-based configuration
//!
//! ## Key Components
//!
//! - [`ChallengeEngine`]: check-in entry point
//! - [`LifecycleScheduler`]: status transitions by wall clock
//! - [`Enrollment`]: create, join, leave and cancel
//! - [`Database`]: challenge, habit, entry and feed persistence
//! - [`Config`]: application configuration management

pub mod cache;
pub mod challenge;
pub mod engine;
pub mod enrollment;
pub mod error;
pub mod events;
pub mod habit;
pub mod ids;
pub mod lifecycle;
pub mod milestones;
pub mod progress;
pub mod resolver;
pub mod storage;
pub mod updater;

pub use cache::{InMemoryMembershipCache, MembershipCache, MembershipSet};
pub use challenge::{
    Challenge, ChallengeRules, ChallengeStats, ChallengeStatus, ChallengeType, HabitMatchMode,
    Milestone, Participant, ParticipantStatus, Progress,
};
pub use engine::{ChallengeEngine, ChallengeUpdate, EngineSettings, ProgressOutcome};
pub use enrollment::{ChallengeDraft, Enrollment};
pub use error::{ConfigError, CoreError, DatabaseError, ValidationError};
pub use events::{ChallengeEvent, FeedEventType, FeedRecord, PushNotification};
pub use habit::{Habit, HabitEntry};
pub use ids::{ChallengeId, HabitId, UserId, WorkspaceId};
pub use lifecycle::{LifecycleScheduler, SweepReport};
pub use progress::{computer_for, ProgressComputer, ProgressDelta};
pub use resolver::ChallengeQueryResolver;
pub use storage::{
    ChallengeStore, Collaborators, Config, Database, EntryStore, FeedSink, HabitStore,
    LogNotifier, Notifier,
};
