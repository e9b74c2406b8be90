//! Challenge lifecycle scheduler.
//!
//! A recurring sweep that moves challenges through their statuses by
//! wall-clock date:
//! - upcoming -> active once `start_date` has passed
//! - active -> completed once `end_date` has passed
//! - upcoming -> expired when the whole window passed before activation
//!
//! Transitions are gated on the stored status, so re-running a sweep never
//! repeats one.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::challenge::{Challenge, ChallengeStatus};
use crate::error::Result;
use crate::events::{self, ChallengeEvent};
use crate::ids::ChallengeId;
use crate::storage::Collaborators;

/// What one sweep changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub started: Vec<ChallengeId>,
    pub ended: Vec<ChallengeId>,
    pub expired: Vec<ChallengeId>,
    /// Challenges whose transition could not be saved
    pub failed: Vec<ChallengeId>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.started.is_empty()
            && self.ended.is_empty()
            && self.expired.is_empty()
            && self.failed.is_empty()
    }
}

/// Status `challenge` should move to at `now`, if any.
pub fn due_transition(challenge: &Challenge, now: DateTime<Utc>) -> Option<ChallengeStatus> {
    let passed = |date: Option<DateTime<Utc>>| date.is_some_and(|d| d <= now);
    match challenge.status {
        ChallengeStatus::Upcoming if passed(challenge.end_date) => Some(ChallengeStatus::Expired),
        ChallengeStatus::Upcoming if passed(challenge.start_date) => Some(ChallengeStatus::Active),
        ChallengeStatus::Active if passed(challenge.end_date) => Some(ChallengeStatus::Completed),
        _ => None,
    }
}

pub struct LifecycleScheduler {
    services: Collaborators,
}

impl LifecycleScheduler {
    pub fn new(services: Collaborators) -> Self {
        Self { services }
    }

    /// Apply every transition due at `now`.
    ///
    /// # Errors
    /// Returns an error only if the challenge listing itself fails; a
    /// failure on one challenge is recorded in the report and the sweep
    /// continues.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let mut report = SweepReport::default();

        for status in [ChallengeStatus::Upcoming, ChallengeStatus::Active] {
            let challenges = self.services.challenges.list_challenges(Some(status)).await?;
            for challenge in challenges {
                let Some(next) = due_transition(&challenge, now) else {
                    continue;
                };
                let id = challenge.id.clone();
                match self.transition(challenge, next, now).await {
                    Ok(()) => match next {
                        ChallengeStatus::Active => report.started.push(id),
                        ChallengeStatus::Completed => report.ended.push(id),
                        _ => report.expired.push(id),
                    },
                    Err(e) => {
                        tracing::warn!(challenge_id = %id, to = %next, error = %e, "lifecycle transition failed");
                        report.failed.push(id);
                    }
                }
            }
        }

        Ok(report)
    }

    async fn transition(
        &self,
        mut challenge: Challenge,
        next: ChallengeStatus,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let from = challenge.status;
        challenge.status = next;
        challenge.updated_at = now;
        challenge.refresh_stats();
        self.services.challenges.save_challenge(&challenge).await?;

        tracing::info!(challenge_id = %challenge.id, from = %from, to = %next, "challenge status changed");

        let event = match next {
            ChallengeStatus::Active => ChallengeEvent::started(&challenge, now),
            ChallengeStatus::Completed => ChallengeEvent::ended(&challenge, now),
            _ => return Ok(()),
        };
        events::deliver(
            self.services.feed.as_ref(),
            self.services.notifier.as_ref(),
            &challenge,
            &challenge.created_by,
            &event,
        )
        .await;
        Ok(())
    }

    /// Sweep every `period` until `shutdown` flips to true or its sender
    /// is dropped. The first sweep runs immediately.
    pub async fn run(&self, period: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.sweep(Utc::now()).await {
                        Ok(report) if !report.is_empty() => tracing::info!(
                            started = report.started.len(),
                            ended = report.ended.len(),
                            expired = report.expired.len(),
                            failed = report.failed.len(),
                            "lifecycle sweep"
                        ),
                        Ok(_) => tracing::debug!("lifecycle sweep: nothing due"),
                        Err(e) => tracing::error!(error = %e, "lifecycle sweep failed"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("lifecycle scheduler stopping");
                        break;
                    }
                }
            }
        }
    }
}
