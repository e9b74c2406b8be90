//! Lifecycle sweep commands for CLI.

use clap::Subcommand;
use std::time::Duration;
use tokio::sync::watch;

use super::{print_json, time_or_now, App, CliResult};

#[derive(Subcommand)]
pub enum SchedulerAction {
    /// Run one sweep and print what changed
    Sweep {
        /// Sweep as of this time (YYYY-MM-DD or RFC 3339, default now)
        #[arg(long)]
        at: Option<String>,
    },
    /// Sweep on the configured interval until interrupted
    Run {
        /// Override `scheduler.sweep_interval_secs`
        #[arg(long)]
        interval_secs: Option<u64>,
    },
}

pub async fn run(action: SchedulerAction, app: &App) -> CliResult {
    match action {
        SchedulerAction::Sweep { at } => {
            let now = time_or_now(at.as_deref())?;
            let report = app.scheduler().sweep(now).await?;
            print_json(&report)?;
        }
        SchedulerAction::Run { interval_secs } => {
            let secs = interval_secs.unwrap_or(app.config.scheduler.sweep_interval_secs);
            if secs == 0 {
                return Err("interval must be greater than zero".into());
            }

            let (tx, rx) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    let _ = tx.send(true);
                }
            });

            tracing::info!(interval_secs = secs, "lifecycle scheduler started");
            app.scheduler().run(Duration::from_secs(secs), rx).await;
        }
    }
    Ok(())
}
