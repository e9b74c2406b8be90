//! Shared harness for the engine integration tests.
//!
//! Everything runs over an in-memory [`Database`]; pushes are captured by a
//! recording notifier and resolver lookups are counted by a store wrapper.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use habitloop_core::error::{CoreError, DatabaseError, Result};
use habitloop_core::{
    Challenge, ChallengeDraft, ChallengeEngine, ChallengeId, ChallengeStatus, ChallengeStore,
    ChallengeType, Collaborators, Database, EngineSettings, Enrollment, EntryStore, Habit,
    HabitEntry, HabitId, HabitStore, InMemoryMembershipCache, LifecycleScheduler, Notifier,
    PushNotification, UserId, WorkspaceId,
};

// ============================================================================
// Dates
// ============================================================================

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn noon(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.from_utc_datetime(&day(y, m, d).and_hms_opt(12, 0, 0).unwrap())
}

// ============================================================================
// Collaborator doubles
// ============================================================================

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<PushNotification>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<PushNotification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn broadcast(&self, notification: &PushNotification) -> Result<()> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// Challenge store that counts resolver lookups and can be told to fail.
pub struct CountingStore {
    inner: Arc<Database>,
    pub resolver_calls: AtomicUsize,
    pub fail_participations: AtomicBool,
}

impl CountingStore {
    pub fn new(inner: Arc<Database>) -> Self {
        Self {
            inner,
            resolver_calls: AtomicUsize::new(0),
            fail_participations: AtomicBool::new(false),
        }
    }

    pub fn resolver_calls(&self) -> usize {
        self.resolver_calls.load(Ordering::SeqCst)
    }

    fn count(&self) {
        self.resolver_calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChallengeStore for CountingStore {
    async fn get_challenge(&self, id: &ChallengeId) -> Result<Option<Challenge>> {
        self.inner.get_challenge(id).await
    }

    async fn save_challenge(&self, challenge: &Challenge) -> Result<()> {
        self.inner.save_challenge(challenge).await
    }

    async fn list_challenges(&self, status: Option<ChallengeStatus>) -> Result<Vec<Challenge>> {
        self.inner.list_challenges(status).await
    }

    async fn active_by_template(&self, template_id: &HabitId) -> Result<Vec<Challenge>> {
        self.count();
        self.inner.active_by_template(template_id).await
    }

    async fn active_linking(&self, user_id: &UserId, habit_id: &HabitId) -> Result<Vec<Challenge>> {
        self.count();
        self.inner.active_linking(user_id, habit_id).await
    }

    async fn active_workspace_wide(&self, workspace_id: &WorkspaceId) -> Result<Vec<Challenge>> {
        self.count();
        self.inner.active_workspace_wide(workspace_id).await
    }

    async fn open_participations(&self, user_id: &UserId) -> Result<Vec<Challenge>> {
        if self.fail_participations.load(Ordering::SeqCst) {
            return Err(CoreError::Database(DatabaseError::Locked));
        }
        self.inner.open_participations(user_id).await
    }
}

/// Habit store that is always unavailable.
pub struct UnavailableHabits;

#[async_trait]
impl HabitStore for UnavailableHabits {
    async fn get_habit(&self, _id: &HabitId) -> Result<Option<Habit>> {
        Err(DatabaseError::QueryFailed("habit service unavailable".into()).into())
    }

    async fn save_habit(&self, _habit: &Habit) -> Result<()> {
        Err(DatabaseError::QueryFailed("habit service unavailable".into()).into())
    }

    async fn list_habits(&self, _user_id: &UserId) -> Result<Vec<Habit>> {
        Err(DatabaseError::QueryFailed("habit service unavailable".into()).into())
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub db: Arc<Database>,
    pub store: Arc<CountingStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub cache: Arc<InMemoryMembershipCache>,
    pub services: Collaborators,
    pub engine: ChallengeEngine,
    pub enrollment: Enrollment,
    pub scheduler: LifecycleScheduler,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(EngineSettings::default())
    }

    pub fn with_settings(settings: EngineSettings) -> Self {
        let db = Arc::new(Database::open_memory().unwrap());
        let store = Arc::new(CountingStore::new(db.clone()));
        let notifier = Arc::new(RecordingNotifier::default());
        let cache = Arc::new(InMemoryMembershipCache::new());

        let services = Collaborators {
            challenges: store.clone(),
            habits: db.clone(),
            entries: db.clone(),
            feed: db.clone(),
            notifier: notifier.clone(),
        };

        Self {
            engine: ChallengeEngine::new(services.clone(), cache.clone(), settings),
            enrollment: Enrollment::new(services.clone(), cache.clone()),
            scheduler: LifecycleScheduler::new(services.clone()),
            db,
            store,
            notifier,
            cache,
            services,
        }
    }

    pub async fn habit(&self, id: &str, user: &str, workspace: Option<&str>) -> HabitId {
        let habit = Habit {
            id: HabitId::new(id),
            user_id: UserId::new(user),
            name: id.to_string(),
            template_id: None,
            workspace_id: workspace.map(WorkspaceId::new),
        };
        self.db.save_habit(&habit).await.unwrap();
        habit.id
    }

    pub async fn log(&self, user: &str, habit: &str, at: DateTime<Utc>, value: Option<f64>) {
        let entry = HabitEntry {
            user_id: UserId::new(user),
            habit_id: HabitId::new(habit),
            date: at,
            completed: true,
            value,
        };
        self.db.record_entry(&entry).await.unwrap();
    }

    pub async fn create(
        &self,
        draft: ChallengeDraft,
        creator: &str,
        habits: &[&str],
        now: DateTime<Utc>,
    ) -> Challenge {
        self.enrollment
            .create_challenge(
                draft,
                &UserId::new(creator),
                habits.iter().map(|h| HabitId::new(h)).collect(),
                now,
            )
            .await
            .unwrap()
    }

    pub async fn reload(&self, id: &ChallengeId) -> Challenge {
        self.db.get_challenge(id).await.unwrap().unwrap()
    }

    pub fn feed_types(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self
            .db
            .recent_feed(&WorkspaceId::new("w1"), 100)
            .unwrap()
            .into_iter()
            .map(|r| r.kind.as_str().to_string())
            .collect();
        kinds.reverse();
        kinds
    }
}

/// A January 2024 challenge in workspace `w1`.
pub fn january(kind: ChallengeType) -> ChallengeDraft {
    let mut draft = ChallengeDraft::new(WorkspaceId::new("w1"), "January", kind);
    draft.start_date = Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    draft.end_date = Some(Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap());
    draft
}
