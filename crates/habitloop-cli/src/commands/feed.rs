use clap::Args;

use habitloop_core::WorkspaceId;

use super::{print_json, App, CliResult};

#[derive(Args)]
pub struct FeedArgs {
    /// Workspace to show
    workspace: String,
    #[arg(long, default_value_t = 20)]
    limit: usize,
}

pub fn run(args: FeedArgs, app: &App) -> CliResult {
    let records = app
        .db
        .recent_feed(&WorkspaceId::from(args.workspace), args.limit)?;
    print_json(&records)
}
