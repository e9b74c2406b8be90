//! Subcommand implementations and the shared application context.

pub mod challenge;
pub mod checkin;
pub mod config;
pub mod feed;
pub mod habit;
pub mod scheduler;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use habitloop_core::{
    ChallengeEngine, Collaborators, Config, CoreError, Database, EngineSettings, Enrollment,
    InMemoryMembershipCache, LifecycleScheduler, LogNotifier,
};

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Open stores and engine pieces for one CLI invocation.
pub struct App {
    pub config: Config,
    pub db: Arc<Database>,
    pub services: Collaborators,
    cache: Arc<InMemoryMembershipCache>,
}

impl App {
    pub fn open(config: Config, db_path: Option<PathBuf>) -> Result<Self, CoreError> {
        let path = match db_path {
            Some(path) => path,
            None => config.database_path()?,
        };
        let db = Arc::new(Database::open(&path)?);
        tracing::debug!(path = %path.display(), "database opened");

        Ok(Self {
            services: Collaborators::from_database(db.clone(), Arc::new(LogNotifier)),
            cache: Arc::new(InMemoryMembershipCache::new()),
            config,
            db,
        })
    }

    pub fn engine(&self) -> ChallengeEngine {
        ChallengeEngine::new(
            self.services.clone(),
            self.cache.clone(),
            EngineSettings::from(&self.config.cache),
        )
    }

    pub fn enrollment(&self) -> Enrollment {
        Enrollment::new(self.services.clone(), self.cache.clone())
    }

    pub fn scheduler(&self) -> LifecycleScheduler {
        LifecycleScheduler::new(self.services.clone())
    }
}

pub fn print_json<T: Serialize>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Parse an RFC 3339 timestamp or a bare `YYYY-MM-DD` date. A bare date
/// resolves to the start of the day, or its last second with `end_of_day`.
pub fn parse_time(raw: &str, end_of_day: bool) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| format!("invalid date '{raw}': use YYYY-MM-DD or RFC 3339"))?;
    let time = if end_of_day {
        NaiveTime::from_hms_opt(23, 59, 59)
    } else {
        Some(NaiveTime::MIN)
    };
    let time = time.ok_or_else(|| format!("invalid date '{raw}'"))?;
    Ok(Utc.from_utc_datetime(&date.and_time(time)))
}

/// `--at` override or the current time.
pub fn time_or_now(raw: Option<&str>) -> Result<DateTime<Utc>, String> {
    match raw {
        Some(raw) => parse_time(raw, false),
        None => Ok(Utc::now()),
    }
}
