//! SQLite-backed document store.
//!
//! Provides persistent storage for:
//! - Challenge documents (JSON), plus member/link index tables
//! - Habits and check-in entries
//! - The workspace activity feed

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::{data_dir, migrations, ChallengeStore, EntryStore, FeedSink, HabitStore};
use crate::challenge::{Challenge, ChallengeStatus, HabitMatchMode};
use crate::error::{DatabaseError, Result};
use crate::events::FeedRecord;
use crate::habit::{Habit, HabitEntry};
use crate::ids::{ChallengeId, HabitId, UserId, WorkspaceId};

/// SQLite database for challenge, habit and feed storage.
///
/// The connection sits behind a mutex; every trait method runs its SQL
/// synchronously and never holds the lock across an await point.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open the database at `~/.config/habitloop/habitloop.db`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_default() -> Result<Self> {
        Self::open(data_dir()?.join("habitloop.db"))
    }

    /// Open (or create) the database at `path`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path: PathBuf = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)
            .map_err(|source| DatabaseError::OpenFailed { path, source })?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database (for tests and dry runs).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(DatabaseError::from)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        migrations::migrate(&conn)
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        Ok(self.conn.lock().map_err(|_| DatabaseError::Locked)?)
    }

    fn query_challenges<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<Challenge>> {
        let docs: Vec<String> = {
            let conn = self.lock()?;
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt.query_map(params, |row| row.get::<_, String>(0))?;
            rows.collect::<rusqlite::Result<_>>()?
        };
        docs.iter()
            .map(|doc| Ok(serde_json::from_str(doc)?))
            .collect()
    }

    fn put_challenge(&self, challenge: &Challenge) -> Result<()> {
        let doc = serde_json::to_string(challenge)?;
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO challenges (id, workspace_id, status, habit_template_id, match_mode, doc, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                workspace_id = excluded.workspace_id,
                status = excluded.status,
                habit_template_id = excluded.habit_template_id,
                match_mode = excluded.match_mode,
                doc = excluded.doc,
                updated_at = excluded.updated_at",
            params![
                challenge.id.as_str(),
                challenge.workspace_id.as_str(),
                challenge.status.as_str(),
                challenge.habit_template_id.as_ref().map(|h| h.as_str()),
                challenge.habit_match_mode.as_str(),
                doc,
                challenge.updated_at.to_rfc3339(),
            ],
        )?;

        // Rebuild the derived index rows for this document.
        tx.execute(
            "DELETE FROM challenge_members WHERE challenge_id = ?1",
            params![challenge.id.as_str()],
        )?;
        tx.execute(
            "DELETE FROM challenge_links WHERE challenge_id = ?1",
            params![challenge.id.as_str()],
        )?;
        for participant in &challenge.participants {
            tx.execute(
                "INSERT INTO challenge_members (challenge_id, user_id, status) VALUES (?1, ?2, ?3)",
                params![
                    challenge.id.as_str(),
                    participant.user_id.as_str(),
                    participant.status.as_str(),
                ],
            )?;
            let habits = participant
                .linked_habit_ids
                .iter()
                .chain(participant.linked_habit_id.iter());
            for habit_id in habits {
                tx.execute(
                    "INSERT OR IGNORE INTO challenge_links (challenge_id, user_id, habit_id)
                     VALUES (?1, ?2, ?3)",
                    params![
                        challenge.id.as_str(),
                        participant.user_id.as_str(),
                        habit_id.as_str(),
                    ],
                )?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Most recent feed records for a workspace, newest first.
    pub fn recent_feed(&self, workspace_id: &WorkspaceId, limit: usize) -> Result<Vec<FeedRecord>> {
        let rows: Vec<(String, String, String, String, String)> = {
            let conn = self.lock()?;
            let mut stmt = conn.prepare(
                "SELECT workspace_id, user_id, type, data, created_at
                 FROM feed WHERE workspace_id = ?1
                 ORDER BY id DESC LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![workspace_id.as_str(), limit as i64], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
            })?;
            rows.collect::<rusqlite::Result<_>>()?
        };

        rows.into_iter()
            .map(|(workspace, user, kind, data, created_at)| {
                Ok(FeedRecord {
                    workspace_id: WorkspaceId::new(workspace),
                    user_id: UserId::new(user),
                    kind: serde_json::from_value(serde_json::Value::String(kind))?,
                    data: serde_json::from_str(&data)?,
                    visibility: Default::default(),
                    created_at: parse_ts(&created_at)?,
                })
            })
            .collect()
    }
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .map_err(|e| DatabaseError::QueryFailed(format!("bad timestamp '{raw}': {e}")))?
        .with_timezone(&Utc))
}

#[async_trait]
impl ChallengeStore for Database {
    async fn get_challenge(&self, id: &ChallengeId) -> Result<Option<Challenge>> {
        let doc: Option<String> = {
            let conn = self.lock()?;
            conn.query_row(
                "SELECT doc FROM challenges WHERE id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )
            .optional()?
        };
        match doc {
            Some(doc) => Ok(Some(serde_json::from_str(&doc)?)),
            None => Ok(None),
        }
    }

    async fn save_challenge(&self, challenge: &Challenge) -> Result<()> {
        self.put_challenge(challenge)
    }

    async fn list_challenges(&self, status: Option<ChallengeStatus>) -> Result<Vec<Challenge>> {
        match status {
            Some(status) => self.query_challenges(
                "SELECT doc FROM challenges WHERE status = ?1 ORDER BY id",
                params![status.as_str()],
            ),
            None => self.query_challenges("SELECT doc FROM challenges ORDER BY id", params![]),
        }
    }

    async fn active_by_template(&self, template_id: &HabitId) -> Result<Vec<Challenge>> {
        self.query_challenges(
            "SELECT doc FROM challenges
             WHERE habit_template_id = ?1 AND status = ?2",
            params![template_id.as_str(), ChallengeStatus::Active.as_str()],
        )
    }

    async fn active_linking(
        &self,
        user_id: &UserId,
        habit_id: &HabitId,
    ) -> Result<Vec<Challenge>> {
        self.query_challenges(
            "SELECT c.doc FROM challenges c
             JOIN challenge_links l ON l.challenge_id = c.id
             WHERE l.user_id = ?1 AND l.habit_id = ?2 AND c.status = ?3",
            params![
                user_id.as_str(),
                habit_id.as_str(),
                ChallengeStatus::Active.as_str()
            ],
        )
    }

    async fn active_workspace_wide(&self, workspace_id: &WorkspaceId) -> Result<Vec<Challenge>> {
        self.query_challenges(
            "SELECT doc FROM challenges
             WHERE workspace_id = ?1 AND habit_template_id IS NULL
               AND match_mode = ?2 AND status = ?3",
            params![
                workspace_id.as_str(),
                HabitMatchMode::Single.as_str(),
                ChallengeStatus::Active.as_str()
            ],
        )
    }

    async fn open_participations(&self, user_id: &UserId) -> Result<Vec<Challenge>> {
        self.query_challenges(
            "SELECT c.doc FROM challenges c
             JOIN challenge_members m ON m.challenge_id = c.id
             WHERE m.user_id = ?1 AND c.status IN (?2, ?3)",
            params![
                user_id.as_str(),
                ChallengeStatus::Upcoming.as_str(),
                ChallengeStatus::Active.as_str()
            ],
        )
    }
}

#[async_trait]
impl HabitStore for Database {
    async fn get_habit(&self, id: &HabitId) -> Result<Option<Habit>> {
        let conn = self.lock()?;
        let habit = conn
            .query_row(
                "SELECT id, user_id, name, template_id, workspace_id FROM habits WHERE id = ?1",
                params![id.as_str()],
                row_to_habit,
            )
            .optional()?;
        Ok(habit)
    }

    async fn save_habit(&self, habit: &Habit) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO habits (id, user_id, name, template_id, workspace_id)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                habit.id.as_str(),
                habit.user_id.as_str(),
                habit.name,
                habit.template_id.as_ref().map(|t| t.as_str()),
                habit.workspace_id.as_ref().map(|w| w.as_str()),
            ],
        )?;
        Ok(())
    }

    async fn list_habits(&self, user_id: &UserId) -> Result<Vec<Habit>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, name, template_id, workspace_id
             FROM habits WHERE user_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![user_id.as_str()], row_to_habit)?;
        let habits = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(habits)
    }
}

fn row_to_habit(row: &rusqlite::Row<'_>) -> rusqlite::Result<Habit> {
    Ok(Habit {
        id: HabitId::new(row.get::<_, String>(0)?),
        user_id: UserId::new(row.get::<_, String>(1)?),
        name: row.get(2)?,
        template_id: row.get::<_, Option<String>>(3)?.map(HabitId::new),
        workspace_id: row.get::<_, Option<String>>(4)?.map(WorkspaceId::new),
    })
}

#[async_trait]
impl EntryStore for Database {
    async fn record_entry(&self, entry: &HabitEntry) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO habit_entries (user_id, habit_id, date, completed, value)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.user_id.as_str(),
                entry.habit_id.as_str(),
                entry.date.to_rfc3339(),
                entry.completed,
                entry.value,
            ],
        )?;
        Ok(())
    }

    async fn completed_entries(
        &self,
        user_id: &UserId,
        habit_ids: &[HabitId],
    ) -> Result<Vec<HabitEntry>> {
        if habit_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; habit_ids.len()].join(", ");
        let sql = format!(
            "SELECT habit_id, date, value FROM habit_entries
             WHERE completed = 1 AND user_id = ? AND habit_id IN ({placeholders})
             ORDER BY date, id"
        );
        let bind = std::iter::once(user_id.as_str()).chain(habit_ids.iter().map(|h| h.as_str()));

        let rows: Vec<(String, String, Option<f64>)> = {
            let conn = self.lock()?;
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(bind), |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?;
            rows.collect::<rusqlite::Result<_>>()?
        };

        rows.into_iter()
            .map(|(habit_id, date, value)| {
                Ok(HabitEntry {
                    user_id: user_id.clone(),
                    habit_id: HabitId::new(habit_id),
                    date: parse_ts(&date)?,
                    completed: true,
                    value,
                })
            })
            .collect()
    }
}

#[async_trait]
impl FeedSink for Database {
    async fn publish(&self, record: &FeedRecord) -> Result<()> {
        let data = serde_json::to_string(&record.data)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO feed (workspace_id, user_id, type, data, visibility, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.workspace_id.as_str(),
                record.user_id.as_str(),
                record.kind.as_str(),
                data,
                "workspace",
                record.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}
