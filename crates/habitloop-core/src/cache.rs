//! Membership cache.
//!
//! Per-user set of habit ids linked to that user's active challenges, used
//! to skip the resolver for check-ins that cannot touch a challenge. The
//! cache is never authoritative: a missing entry always falls through to
//! the full resolver path.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashSet;

use crate::error::Result;
use crate::ids::{HabitId, UserId};
use crate::storage::ChallengeStore;

/// Cached membership for one user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipSet {
    pub habits: HashSet<HabitId>,
    /// Set when the user takes part in a challenge without linked habits.
    /// Such challenges count whatever habit triggered the check-in, so no
    /// habit can be ruled out.
    pub open: bool,
}

impl MembershipSet {
    /// True when a check-in on `habit_id` cannot affect any challenge.
    pub fn excludes(&self, habit_id: &HabitId) -> bool {
        !self.open && !self.habits.contains(habit_id)
    }
}

/// Storage behind the fast path. Swap in a shared cache for
/// multi-instance deployments.
#[async_trait]
pub trait MembershipCache: Send + Sync {
    async fn get(&self, user_id: &UserId) -> Option<MembershipSet>;

    async fn set(&self, user_id: &UserId, membership: MembershipSet);

    async fn invalidate(&self, user_id: &UserId);
}

/// Process-local cache for a single engine instance.
#[derive(Debug, Default)]
pub struct InMemoryMembershipCache {
    entries: DashMap<UserId, MembershipSet>,
}

impl InMemoryMembershipCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl MembershipCache for InMemoryMembershipCache {
    async fn get(&self, user_id: &UserId) -> Option<MembershipSet> {
        self.entries.get(user_id).map(|entry| entry.value().clone())
    }

    async fn set(&self, user_id: &UserId, membership: MembershipSet) {
        self.entries.insert(user_id.clone(), membership);
    }

    async fn invalidate(&self, user_id: &UserId) {
        self.entries.remove(user_id);
    }
}

/// Build the membership set for `user_id` from their upcoming and active
/// participations. Upcoming challenges are included because the lifecycle
/// sweep activates them without touching the cache.
pub async fn load_membership(store: &dyn ChallengeStore, user_id: &UserId) -> Result<MembershipSet> {
    let challenges = store.open_participations(user_id).await?;

    let mut membership = MembershipSet::default();
    for challenge in &challenges {
        let Some(participant) = challenge.participant(user_id).filter(|p| p.is_active()) else {
            continue;
        };
        let linked = participant.linked_habits();
        if linked.is_empty() {
            membership.open = true;
        }
        membership.habits.extend(linked);
    }
    Ok(membership)
}

/// Reload `user_id`'s entry. On failure the entry is evicted so the next
/// check-in takes the full resolver path.
pub async fn warm(cache: &dyn MembershipCache, store: &dyn ChallengeStore, user_id: &UserId) {
    match load_membership(store, user_id).await {
        Ok(membership) => {
            tracing::debug!(
                user_id = %user_id,
                habits = membership.habits.len(),
                open = membership.open,
                "membership cache warmed"
            );
            cache.set(user_id, membership).await;
        }
        Err(e) => {
            tracing::warn!(user_id = %user_id, error = %e, "cache warm failed, evicting");
            cache.invalidate(user_id).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::challenge::{ChallengeStatus, ChallengeType, HabitMatchMode, ParticipantStatus};
    use crate::ids::ChallengeId;
    use crate::progress::testing::{challenge, participant};
    use crate::storage::Database;

    #[tokio::test]
    async fn test_warm_collects_active_links() {
        let db = Database::open_memory().unwrap();

        let mut first = challenge(ChallengeType::Streak, HabitMatchMode::All);
        first.participants.push(participant(&["a", "b"]));
        db.save_challenge(&first).await.unwrap();

        let mut second = challenge(ChallengeType::Cumulative, HabitMatchMode::Any);
        second.id = ChallengeId::new("c2");
        let mut legacy = participant(&[]);
        legacy.linked_habit_id = Some(HabitId::new("c"));
        second.participants.push(legacy);
        db.save_challenge(&second).await.unwrap();

        let mut finished = challenge(ChallengeType::Cumulative, HabitMatchMode::Any);
        finished.id = ChallengeId::new("c3");
        finished.status = ChallengeStatus::Completed;
        finished.participants.push(participant(&["old"]));
        db.save_challenge(&finished).await.unwrap();

        let cache = InMemoryMembershipCache::new();
        let user = UserId::new("u1");
        warm(&cache, &db, &user).await;

        let set = cache.get(&user).await.unwrap();
        assert!(!set.open);
        assert!(!set.excludes(&HabitId::new("a")));
        assert!(!set.excludes(&HabitId::new("c")));
        assert!(set.excludes(&HabitId::new("old")));
        assert!(set.excludes(&HabitId::new("unrelated")));
    }

    #[tokio::test]
    async fn test_participation_without_links_keeps_set_open() {
        let db = Database::open_memory().unwrap();
        let mut c = challenge(ChallengeType::Streak, HabitMatchMode::Single);
        c.participants.push(participant(&[]));
        db.save_challenge(&c).await.unwrap();

        let membership = load_membership(&db, &UserId::new("u1")).await.unwrap();
        assert!(membership.open);
        assert!(!membership.excludes(&HabitId::new("anything")));
    }

    #[tokio::test]
    async fn test_dropped_participation_is_ignored() {
        let db = Database::open_memory().unwrap();
        let mut c = challenge(ChallengeType::Streak, HabitMatchMode::Any);
        let mut p = participant(&["a"]);
        p.status = ParticipantStatus::Dropped;
        c.participants.push(p);
        db.save_challenge(&c).await.unwrap();

        let membership = load_membership(&db, &UserId::new("u1")).await.unwrap();
        assert!(membership.habits.is_empty());
        assert!(membership.excludes(&HabitId::new("a")));
    }

    #[tokio::test]
    async fn test_invalidate_removes_entry() {
        let cache = InMemoryMembershipCache::new();
        let user = UserId::new("u1");
        cache.set(&user, MembershipSet::default()).await;
        assert_eq!(cache.len(), 1);

        cache.invalidate(&user).await;
        assert!(cache.get(&user).await.is_none());
        assert!(cache.is_empty());
    }
}
