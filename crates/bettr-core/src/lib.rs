#![deny(clippy::all)]

pub mod activity;
mod breakdown;
pub mod config;
pub mod day;
mod extractor;
mod goal;
mod merger;
mod pipeline;
pub mod store;

pub use activity::{
    ActivitySegment, ApplicationActivity, CategoryActivity, RecordedSegment, SourceError,
    SourceStream,
};
pub use breakdown::*;
pub use extractor::*;
pub use goal::*;
pub use merger::*;
pub use pipeline::*;
pub use store::{AggregationStore, FileStore, KeyValueStore, MemoryStore, StoreError};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label used for any application or category the source cannot name.
pub const UNKNOWN_LABEL: &str = "Unknown";

pub const SECONDS_PER_HOUR: f64 = 3600.0;

/// Hours keyed by application or category name.
///
/// Ordered so that two encodings of the same usage are byte-identical.
pub type UsageMap = BTreeMap<String, f64>;

/// One calendar day of usage. The `day` is the dedup key of every history list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyRecord {
    #[serde(rename = "date", with = "day::serde_day")]
    pub day: NaiveDate,
    pub total_hours: f64,
    #[serde(default)]
    pub app_usage: UsageMap,
}

impl DailyRecord {
    pub fn new(day: NaiveDate, total_hours: f64, app_usage: UsageMap) -> Self {
        Self {
            day,
            total_hours,
            app_usage,
        }
    }

    /// Zero-usage record, used when the activity source yields nothing usable.
    pub fn empty(day: NaiveDate) -> Self {
        Self::new(day, 0.0, UsageMap::new())
    }
}

/// The "latest" full record, overwritten on every pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationSnapshot {
    #[serde(rename = "date", with = "day::serde_day")]
    pub day: NaiveDate,
    pub total_hours: f64,
    pub total_seconds: f64,
    #[serde(default)]
    pub app_usage: UsageMap,
    #[serde(default)]
    pub category_usage: UsageMap,
    #[serde(rename = "dailyHistory", default)]
    pub history: Vec<DailyRecord>,
}

impl AggregationSnapshot {
    /// Builds a snapshot for `today`. `total_seconds` is always derived from the hours.
    pub fn new(today: &DailyRecord, category_usage: UsageMap, history: Vec<DailyRecord>) -> Self {
        Self {
            day: today.day,
            total_hours: today.total_hours,
            total_seconds: today.total_hours * SECONDS_PER_HOUR,
            app_usage: today.app_usage.clone(),
            category_usage,
            history,
        }
    }

    pub fn today(&self) -> DailyRecord {
        DailyRecord::new(self.day, self.total_hours, self.app_usage.clone())
    }
}

/// A per-run record written under `screentime_<unix-timestamp>` by older pipeline versions.
///
/// `day` is `None` when the stored date could not be interpreted; such snapshots
/// are skipped by the merger.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacySnapshot {
    pub key: String,
    pub day: Option<NaiveDate>,
    pub total_hours: f64,
    pub total_seconds: f64,
    pub app_usage: UsageMap,
    pub category_usage: UsageMap,
}

impl LegacySnapshot {
    pub fn to_daily_record(&self) -> Option<DailyRecord> {
        self.day
            .map(|day| DailyRecord::new(day, self.total_hours, self.app_usage.clone()))
    }
}
