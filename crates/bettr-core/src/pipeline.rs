//! One-shot report pipeline
//!
//! Each invocation drains the activity source, merges today's record into the
//! shared history and writes the result back. Nothing here fails the caller:
//! source and store problems are logged and degrade to zero or empty data.

use crate::activity::{ActivitySegment, SourceError};
use crate::config::Settings;
use crate::day::day_of;
use crate::extractor::{extract_details, UsageDetails};
use crate::goal::{evaluate_progress, summarize_week, GoalConfig, GoalProgress, WeekSummary};
use crate::merger::{merge_history, unmerged_legacy_days};
use crate::store::{AggregationStore, KeyValueStore};
use crate::{AggregationSnapshot, DailyRecord};
use chrono::{DateTime, Local, NaiveDate, TimeZone};
use futures::Stream;
use serde::Serialize;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub struct ReportOutcome {
    /// What this run computed, whether or not it was persisted.
    pub snapshot: AggregationSnapshot,
    pub source_failed: bool,
    pub history_written: bool,
    pub snapshot_written: bool,
    pub processing_time_ms: u32,
}

impl ReportOutcome {
    pub fn today(&self) -> DailyRecord {
        self.snapshot.today()
    }
}

/// Runs the pipeline against an already opened store. `now` is captured once
/// by the caller and decides which calendar day is "today".
pub async fn run_report<K, S, Tz>(
    store: &AggregationStore<K>,
    source: S,
    now: DateTime<Tz>,
) -> ReportOutcome
where
    K: KeyValueStore,
    S: Stream<Item = Result<ActivitySegment, SourceError>> + Unpin,
    Tz: TimeZone,
{
    let start = Instant::now();
    let day = day_of(&now);

    let (details, source_failed) = match extract_details(source).await {
        Ok(details) => (details, false),
        Err(err) => {
            tracing::warn!(error = %err, %day, "Activity source failed, recording no usage");
            (UsageDetails::default(), true)
        }
    };

    if details.is_empty() && !source_failed {
        tracing::debug!(%day, "Activity source reported no usage");
    }

    let today = DailyRecord::new(day, details.total_hours, details.app_usage);
    let existing = store.read_history();
    let legacy = store.read_legacy_snapshots();
    let recovered = unmerged_legacy_days(&existing, &legacy);
    if !recovered.is_empty() {
        tracing::info!(days = recovered.len(), "Folding legacy snapshots into daily history");
    }
    let history = merge_history(&existing, &legacy, &today);

    let history_written = match store.write_history(&history) {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(error = %err, "Daily history not written");
            false
        }
    };

    let snapshot = AggregationSnapshot::new(&today, details.category_usage, history);
    let snapshot_written = match store.write_snapshot(&snapshot) {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(error = %err, "Latest snapshot not written");
            false
        }
    };

    tracing::info!(
        %day,
        total_hours = snapshot.total_hours,
        days = snapshot.history.len(),
        legacy = legacy.len(),
        "Stored daily screen time"
    );

    ReportOutcome {
        snapshot,
        source_failed,
        history_written,
        snapshot_written,
        processing_time_ms: start.elapsed().as_millis() as u32,
    }
}

/// Opens the shared namespace from `settings`, runs the pipeline for the
/// current local instant and drops the handle.
pub async fn generate_report<S>(settings: &Settings, source: S) -> ReportOutcome
where
    S: Stream<Item = Result<ActivitySegment, SourceError>> + Unpin,
{
    let now = Local::now();
    match settings.open_store() {
        Ok(kv) => run_report(&AggregationStore::new(kv), source, now).await,
        Err(err) => {
            tracing::warn!(error = %err, "Shared store unavailable, report will not persist");
            let scratch = AggregationStore::new(crate::store::MemoryStore::new());
            let mut outcome = run_report(&scratch, source, now).await;
            outcome.history_written = false;
            outcome.snapshot_written = false;
            outcome
        }
    }
}

/// What the host app shows for a given day.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub today: DailyRecord,
    pub goal: GoalConfig,
    pub progress: GoalProgress,
    pub week: WeekSummary,
}

/// Reads history and goal from the store and evaluates them for `today`.
/// A day with no stored record counts as zero usage.
pub fn load_dashboard<K: KeyValueStore>(store: &AggregationStore<K>, today: NaiveDate) -> Dashboard {
    let history = store.read_history();
    let goal = store.read_goal();
    let record = history
        .iter()
        .find(|record| record.day == today)
        .cloned()
        .unwrap_or_else(|| DailyRecord::empty(today));

    Dashboard {
        progress: evaluate_progress(record.total_hours, &goal),
        week: summarize_week(&history, today, &goal),
        today: record,
        goal,
    }
}
