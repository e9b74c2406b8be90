//! Check-in command: records the entry, then runs the progress engine.

use clap::Args;

use habitloop_core::{EntryStore, HabitEntry, HabitId, UserId};

use super::{print_json, time_or_now, App, CliResult};

#[derive(Args)]
pub struct CheckinArgs {
    /// User checking in
    user: String,
    /// Habit checked in on
    habit: String,
    /// Logged amount (minutes, pages, ...)
    #[arg(long)]
    value: Option<f64>,
    /// Check-in time (YYYY-MM-DD or RFC 3339, default now)
    #[arg(long)]
    at: Option<String>,
    /// Record the entry as not completed
    #[arg(long)]
    skipped: bool,
}

pub async fn run(args: CheckinArgs, app: &App) -> CliResult {
    let at = time_or_now(args.at.as_deref())?;
    let entry = HabitEntry {
        user_id: UserId::from(args.user),
        habit_id: HabitId::from(args.habit),
        date: at,
        completed: !args.skipped,
        value: args.value,
    };
    app.db.record_entry(&entry).await?;

    if !entry.completed {
        tracing::info!(user_id = %entry.user_id, habit_id = %entry.habit_id, "skipped check-in recorded");
        return Ok(());
    }

    let outcome = app
        .engine()
        .process_challenge_progress_at(&entry.user_id, &entry.habit_id, at)
        .await;
    print_json(&outcome)
}
