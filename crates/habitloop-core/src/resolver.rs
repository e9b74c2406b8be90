//! Challenge query resolver.
//!
//! Finds the active challenges a check-in on one habit can affect.

use std::collections::HashSet;

use crate::challenge::Challenge;
use crate::error::Result;
use crate::habit::Habit;
use crate::ids::UserId;
use crate::storage::ChallengeStore;

/// Resolves candidate challenges for a `(user, habit)` pair.
pub struct ChallengeQueryResolver<'a> {
    store: &'a dyn ChallengeStore,
}

impl<'a> ChallengeQueryResolver<'a> {
    pub fn new(store: &'a dyn ChallengeStore) -> Self {
        Self { store }
    }

    /// Active challenges matching any of:
    /// 1. bound to the template `habit` derives from,
    /// 2. `user_id` explicitly linked `habit`,
    /// 3. workspace-wide single-mode challenges in `habit`'s workspace.
    ///
    /// Challenges where `user_id` is not an active participant are dropped.
    pub async fn resolve(&self, user_id: &UserId, habit: &Habit) -> Result<Vec<Challenge>> {
        let mut candidates = Vec::new();

        if let Some(template_id) = &habit.template_id {
            candidates.extend(self.store.active_by_template(template_id).await?);
        }
        candidates.extend(self.store.active_linking(user_id, &habit.id).await?);
        if let Some(workspace_id) = &habit.workspace_id {
            candidates.extend(
                self.store
                    .active_workspace_wide(workspace_id)
                    .await?
                    .into_iter()
                    .filter(Challenge::is_workspace_wide),
            );
        }

        let mut seen = HashSet::new();
        let resolved: Vec<Challenge> = candidates
            .into_iter()
            .filter(|c| seen.insert(c.id.clone()))
            .filter(|c| {
                c.participant(user_id)
                    .map(|p| p.is_active())
                    .unwrap_or(false)
            })
            .collect();

        tracing::debug!(
            user_id = %user_id,
            habit_id = %habit.id,
            count = resolved.len(),
            "resolved candidate challenges"
        );
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::challenge::{ChallengeStatus, ChallengeType, HabitMatchMode, ParticipantStatus};
    use crate::ids::{ChallengeId, HabitId, WorkspaceId};
    use crate::progress::testing::{challenge, participant};
    use crate::storage::Database;

    fn habit(template: Option<&str>, workspace: Option<&str>) -> Habit {
        Habit {
            id: HabitId::new("h1"),
            user_id: UserId::new("u1"),
            name: "Read".to_string(),
            template_id: template.map(HabitId::new),
            workspace_id: workspace.map(WorkspaceId::new),
        }
    }

    async fn save(db: &Database, id: &str, edit: impl FnOnce(&mut Challenge)) {
        let mut c = challenge(ChallengeType::Cumulative, HabitMatchMode::Any);
        c.id = ChallengeId::new(id);
        c.participants.push(participant(&[]));
        edit(&mut c);
        db.save_challenge(&c).await.unwrap();
    }

    fn ids(challenges: &[Challenge]) -> Vec<&str> {
        let mut ids: Vec<&str> = challenges.iter().map(|c| c.id.as_str()).collect();
        ids.sort_unstable();
        ids
    }

    #[tokio::test]
    async fn test_union_of_three_rules() {
        let db = Database::open_memory().unwrap();
        save(&db, "template", |c| c.habit_template_id = Some(HabitId::new("tpl"))).await;
        save(&db, "linked", |c| {
            c.participants[0].linked_habit_ids = vec![HabitId::new("h1")]
        })
        .await;
        save(&db, "wide", |c| c.habit_match_mode = HabitMatchMode::Single).await;
        save(&db, "other", |c| {
            c.participants[0].linked_habit_ids = vec![HabitId::new("h2")]
        })
        .await;

        let resolver = ChallengeQueryResolver::new(&db);
        let found = resolver
            .resolve(&UserId::new("u1"), &habit(Some("tpl"), Some("w1")))
            .await
            .unwrap();
        assert_eq!(ids(&found), vec!["linked", "template", "wide"]);

        // a personal habit outside any workspace only sees explicit links
        let found = resolver
            .resolve(&UserId::new("u1"), &habit(None, None))
            .await
            .unwrap();
        assert_eq!(ids(&found), vec!["linked"]);
    }

    #[tokio::test]
    async fn test_challenge_matching_several_rules_appears_once() {
        let db = Database::open_memory().unwrap();
        save(&db, "both", |c| {
            c.habit_template_id = Some(HabitId::new("tpl"));
            c.participants[0].linked_habit_ids = vec![HabitId::new("h1")];
        })
        .await;

        let found = ChallengeQueryResolver::new(&db)
            .resolve(&UserId::new("u1"), &habit(Some("tpl"), None))
            .await
            .unwrap();
        assert_eq!(ids(&found), vec!["both"]);
    }

    #[tokio::test]
    async fn test_inactive_participants_and_challenges_are_discarded() {
        let db = Database::open_memory().unwrap();
        save(&db, "dropped", |c| {
            c.habit_template_id = Some(HabitId::new("tpl"));
            c.participants[0].status = ParticipantStatus::Dropped;
        })
        .await;
        save(&db, "stranger", |c| {
            c.habit_template_id = Some(HabitId::new("tpl"));
            c.participants[0].user_id = UserId::new("u2");
        })
        .await;
        save(&db, "upcoming", |c| {
            c.habit_template_id = Some(HabitId::new("tpl"));
            c.status = ChallengeStatus::Upcoming;
        })
        .await;

        let found = ChallengeQueryResolver::new(&db)
            .resolve(&UserId::new("u1"), &habit(Some("tpl"), Some("w1")))
            .await
            .unwrap();
        assert!(found.is_empty());
    }
}
