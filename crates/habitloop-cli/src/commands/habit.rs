//! Habit registration commands for CLI.

use clap::Subcommand;

use habitloop_core::{Habit, HabitId, HabitStore, UserId, WorkspaceId};

use super::{print_json, App, CliResult};

#[derive(Subcommand)]
pub enum HabitAction {
    /// Register a habit for a user
    Add {
        /// Habit id
        id: String,
        /// Owning user
        #[arg(long)]
        user: String,
        #[arg(long, default_value = "")]
        name: String,
        /// Workspace habit template this habit derives from
        #[arg(long)]
        template: Option<String>,
        /// Workspace the habit belongs to
        #[arg(long)]
        workspace: Option<String>,
    },
    /// List a user's habits
    List {
        #[arg(long)]
        user: String,
    },
}

pub async fn run(action: HabitAction, app: &App) -> CliResult {
    match action {
        HabitAction::Add {
            id,
            user,
            name,
            template,
            workspace,
        } => {
            let habit = Habit {
                name: if name.is_empty() { id.clone() } else { name },
                id: HabitId::from(id),
                user_id: UserId::from(user),
                template_id: template.map(HabitId::from),
                workspace_id: workspace.map(WorkspaceId::from),
            };
            app.db.save_habit(&habit).await?;
            print_json(&habit)?;
        }
        HabitAction::List { user } => {
            let habits = app.db.list_habits(&UserId::from(user)).await?;
            print_json(&habits)?;
        }
    }
    Ok(())
}
