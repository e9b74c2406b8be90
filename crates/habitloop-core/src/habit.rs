//! Habits and their check-in entries.
//!
//! Both are owned by the check-in flow; the engine only reads them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{HabitId, UserId, WorkspaceId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Habit {
    pub id: HabitId,
    pub user_id: UserId,
    #[serde(default)]
    pub name: String,
    /// Workspace habit template this personal habit derives from
    #[serde(default)]
    pub template_id: Option<HabitId>,
    #[serde(default)]
    pub workspace_id: Option<WorkspaceId>,
}

/// One logged check-in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HabitEntry {
    pub user_id: UserId,
    pub habit_id: HabitId,
    pub date: DateTime<Utc>,
    pub completed: bool,
    #[serde(default)]
    pub value: Option<f64>,
}

impl HabitEntry {
    /// UTC calendar day this entry counts toward.
    pub fn day(&self) -> NaiveDate {
        self.date.date_naive()
    }
}
