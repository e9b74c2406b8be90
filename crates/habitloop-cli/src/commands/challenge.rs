//! Challenge management commands for CLI.

use chrono::Utc;
use clap::{Subcommand, ValueEnum};

use habitloop_core::{
    ChallengeDraft, ChallengeId, ChallengeStatus, ChallengeStore, ChallengeType, HabitId,
    HabitMatchMode, Milestone, UserId, WorkspaceId,
};

use super::{parse_time, print_json, App, CliResult};

#[derive(Clone, Copy, ValueEnum)]
pub enum KindArg {
    Streak,
    Cumulative,
    Consistency,
    TeamGoal,
}

impl From<KindArg> for ChallengeType {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Streak => ChallengeType::Streak,
            KindArg::Cumulative => ChallengeType::Cumulative,
            KindArg::Consistency => ChallengeType::Consistency,
            KindArg::TeamGoal => ChallengeType::TeamGoal,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Single,
    Any,
    All,
    Minimum,
}

impl From<ModeArg> for HabitMatchMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Single => HabitMatchMode::Single,
            ModeArg::Any => HabitMatchMode::Any,
            ModeArg::All => HabitMatchMode::All,
            ModeArg::Minimum => HabitMatchMode::Minimum,
        }
    }
}

#[derive(Subcommand)]
pub enum ChallengeAction {
    /// Create a challenge; the creator joins automatically
    Create {
        /// Challenge title
        title: String,
        /// Workspace the challenge belongs to
        #[arg(long)]
        workspace: String,
        /// Creating user
        #[arg(long)]
        user: String,
        #[arg(long, value_enum, default_value = "streak")]
        kind: KindArg,
        #[arg(long, value_enum, default_value = "single")]
        mode: ModeArg,
        /// Required habits per day in minimum mode
        #[arg(long)]
        minimum: Option<u32>,
        /// Workspace habit template the challenge tracks
        #[arg(long)]
        template: Option<String>,
        /// Start date (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        start: Option<String>,
        /// End date, inclusive (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        end: Option<String>,
        #[arg(long)]
        target: Option<f64>,
        #[arg(long)]
        unit: Option<String>,
        /// Entries below this value do not count
        #[arg(long)]
        min_daily: Option<f64>,
        /// Milestone as VALUE or VALUE:LABEL (repeatable)
        #[arg(long = "milestone")]
        milestones: Vec<String>,
        /// Habit the creator links (repeatable)
        #[arg(long = "habit")]
        habits: Vec<String>,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Join a challenge
    Join {
        id: String,
        #[arg(long)]
        user: String,
        /// Habit to link (repeatable)
        #[arg(long = "habit")]
        habits: Vec<String>,
    },
    /// Leave a challenge
    Leave {
        id: String,
        #[arg(long)]
        user: String,
    },
    /// Cancel a challenge (creator only)
    Cancel {
        id: String,
        #[arg(long)]
        user: String,
    },
    /// Show one challenge as JSON
    Show { id: String },
    /// List challenges
    List {
        /// Filter by status (upcoming, active, completed, cancelled, expired)
        #[arg(long)]
        status: Option<String>,
    },
}

fn parse_milestone(raw: &str) -> Result<Milestone, String> {
    let (value, label) = match raw.split_once(':') {
        Some((value, label)) => (value, label.trim().to_string()),
        None => (raw, String::new()),
    };
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid milestone '{raw}': expected VALUE or VALUE:LABEL"))?;
    let label = if label.is_empty() {
        value.to_string()
    } else {
        label
    };
    Ok(Milestone { value, label })
}

fn habit_ids(raw: Vec<String>) -> Vec<HabitId> {
    raw.into_iter().map(HabitId::from).collect()
}

pub async fn run(action: ChallengeAction, app: &App) -> CliResult {
    let now = Utc::now();

    match action {
        ChallengeAction::Create {
            title,
            workspace,
            user,
            kind,
            mode,
            minimum,
            template,
            start,
            end,
            target,
            unit,
            min_daily,
            milestones,
            habits,
            description,
        } => {
            let mut draft = ChallengeDraft::new(WorkspaceId::from(workspace), title, kind.into());
            draft.description = description;
            draft.habit_match_mode = mode.into();
            draft.habit_match_minimum = minimum;
            draft.habit_template_id = template.map(HabitId::from);
            draft.start_date = start.as_deref().map(|s| parse_time(s, false)).transpose()?;
            draft.end_date = end.as_deref().map(|s| parse_time(s, true)).transpose()?;
            draft.rules.target_value = target;
            draft.rules.target_unit = unit;
            draft.rules.minimum_daily_value = min_daily;
            draft.milestones = milestones
                .iter()
                .map(|m| parse_milestone(m))
                .collect::<Result<Vec<_>, _>>()?;

            let challenge = app
                .enrollment()
                .create_challenge(draft, &UserId::from(user), habit_ids(habits), now)
                .await?;
            print_json(&challenge)?;
        }
        ChallengeAction::Join { id, user, habits } => {
            let challenge = app
                .enrollment()
                .join(&ChallengeId::from(id), &UserId::from(user), habit_ids(habits), now)
                .await?;
            print_json(&challenge)?;
        }
        ChallengeAction::Leave { id, user } => {
            let challenge = app
                .enrollment()
                .leave(&ChallengeId::from(id), &UserId::from(user), now)
                .await?;
            print_json(&challenge)?;
        }
        ChallengeAction::Cancel { id, user } => {
            let challenge = app
                .enrollment()
                .cancel(&ChallengeId::from(id), &UserId::from(user), now)
                .await?;
            print_json(&challenge)?;
        }
        ChallengeAction::Show { id } => match app.db.get_challenge(&ChallengeId::from(id.as_str())).await? {
            Some(challenge) => print_json(&challenge)?,
            None => return Err(format!("challenge '{id}' not found").into()),
        },
        ChallengeAction::List { status } => {
            let status = match status.as_deref() {
                Some(raw) => Some(
                    ChallengeStatus::parse(raw).ok_or_else(|| format!("unknown status '{raw}'"))?,
                ),
                None => None,
            };
            let challenges = app.db.list_challenges(status).await?;
            print_json(&challenges)?;
        }
    }
    Ok(())
}
