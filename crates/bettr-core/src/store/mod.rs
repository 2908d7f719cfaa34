//! Shared aggregation store
//!
//! The report extension and the host app are separate processes that share one
//! app-group key-value namespace. A store handle is opened per pipeline run and
//! dropped afterwards; nothing is cached between runs.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::goal::{GoalConfig, DEFAULT_GOAL_HOURS};
use crate::{day, AggregationSnapshot, DailyRecord, LegacySnapshot, UsageMap};
use rayon::prelude::*;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Merged daily history list.
pub const HISTORY_KEY: &str = "dailyScreenTime";
/// Latest full snapshot.
pub const LATEST_KEY: &str = "screentime_latest";
/// Prefix of legacy per-run snapshot keys (`screentime_<unix-timestamp>`).
pub const LEGACY_PREFIX: &str = "screentime_";
/// List of legacy snapshot keys, built by a single prefix scan.
pub const LEGACY_MANIFEST_KEY: &str = "screentime_legacy_manifest";
/// User's daily goal in hours.
pub const GOAL_THRESHOLD_KEY: &str = "goalThreshold";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid store key {0:?}")]
    InvalidKey(String),
    #[error("store I/O error for {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {key}: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("refusing to encode {key}: {reason}")]
    Encode { key: String, reason: String },
}

/// A flat, string-keyed byte store with no transactions.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;
    /// Keys starting with `prefix`, sorted.
    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for &T {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        (**self).keys_with_prefix(prefix)
    }
}

/// Unix timestamp of a legacy snapshot key, or `None` if `key` is not one.
pub fn legacy_timestamp(key: &str) -> Option<i64> {
    let suffix = key.strip_prefix(LEGACY_PREFIX)?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredLegacySnapshot {
    #[serde(default)]
    date: Value,
    total_hours: f64,
    #[serde(default)]
    total_seconds: Option<f64>,
    #[serde(default)]
    app_usage: UsageMap,
    #[serde(default)]
    category_usage: UsageMap,
}

/// Typed access to the persisted pipeline state.
///
/// Reads never fail: missing or corrupt values are logged and read as empty.
/// Writes return an error and leave the previous value untouched.
pub struct AggregationStore<S> {
    kv: S,
}

impl<S: KeyValueStore> AggregationStore<S> {
    pub fn new(kv: S) -> Self {
        Self { kv }
    }

    pub fn kv(&self) -> &S {
        &self.kv
    }

    pub fn read_history(&self) -> Vec<DailyRecord> {
        match self.read_json::<Vec<DailyRecord>>(HISTORY_KEY) {
            Ok(history) => history.unwrap_or_default(),
            Err(err) => {
                tracing::warn!(error = %err, "Discarding unreadable daily history");
                Vec::new()
            }
        }
    }

    pub fn read_snapshot(&self) -> Option<AggregationSnapshot> {
        match self.read_json(LATEST_KEY) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::warn!(error = %err, "Discarding unreadable latest snapshot");
                None
            }
        }
    }

    /// Decodes every legacy snapshot, oldest first. Corrupt entries are skipped.
    ///
    /// Builds the legacy manifest on first use.
    pub fn read_legacy_snapshots(&self) -> Vec<LegacySnapshot> {
        self.decode_legacy_snapshots(self.legacy_keys())
    }

    /// Like [`Self::read_legacy_snapshots`], but never writes the manifest.
    pub fn peek_legacy_snapshots(&self) -> Vec<LegacySnapshot> {
        self.decode_legacy_snapshots(self.peek_legacy_keys())
    }

    /// Legacy snapshot keys ordered by their timestamp.
    ///
    /// Read from the manifest when present. Otherwise the namespace is scanned
    /// once and the manifest written for later runs.
    pub fn legacy_keys(&self) -> Vec<String> {
        match self.read_manifest() {
            Some(keys) => sort_legacy_keys(keys),
            None => self.rebuild_legacy_manifest(),
        }
    }

    /// Legacy keys from the manifest, or from a scan when it is missing.
    /// Leaves the namespace untouched.
    pub fn peek_legacy_keys(&self) -> Vec<String> {
        match self.read_manifest() {
            Some(keys) => sort_legacy_keys(keys),
            None => self.scan_legacy_keys(),
        }
    }

    /// Scans the namespace for legacy keys and records them in the manifest.
    pub fn rebuild_legacy_manifest(&self) -> Vec<String> {
        let keys = self.scan_legacy_keys();
        tracing::debug!(count = keys.len(), "Built legacy snapshot manifest");

        if let Err(err) = self.write_json(LEGACY_MANIFEST_KEY, &keys) {
            tracing::warn!(error = %err, "Failed to write legacy manifest");
        }
        keys
    }

    fn read_manifest(&self) -> Option<Vec<String>> {
        match self.read_json::<Vec<String>>(LEGACY_MANIFEST_KEY) {
            Ok(keys) => keys,
            Err(err) => {
                tracing::warn!(error = %err, "Legacy manifest unreadable, rescanning");
                None
            }
        }
    }

    fn scan_legacy_keys(&self) -> Vec<String> {
        match self.kv.keys_with_prefix(LEGACY_PREFIX) {
            Ok(keys) => sort_legacy_keys(keys),
            Err(err) => {
                tracing::warn!(error = %err, "Legacy key scan failed");
                Vec::new()
            }
        }
    }

    fn decode_legacy_snapshots(&self, keys: Vec<String>) -> Vec<LegacySnapshot> {
        let blobs: Vec<(String, Vec<u8>)> = keys
            .into_iter()
            .filter_map(|key| match self.kv.get(&key) {
                Ok(Some(bytes)) => Some((key, bytes)),
                Ok(None) => None,
                Err(err) => {
                    tracing::warn!(key = %key, error = %err, "Failed to read legacy snapshot");
                    None
                }
            })
            .collect();

        blobs
            .into_par_iter()
            .filter_map(|(key, bytes)| match decode_legacy(&key, &bytes) {
                Ok(snapshot) => Some(snapshot),
                Err(err) => {
                    tracing::warn!(error = %err, "Skipping corrupt legacy snapshot");
                    None
                }
            })
            .collect()
    }

    pub fn write_history(&self, history: &[DailyRecord]) -> Result<(), StoreError> {
        for record in history {
            check_record(HISTORY_KEY, record)?;
        }
        self.write_json(HISTORY_KEY, history)
    }

    pub fn write_snapshot(&self, snapshot: &AggregationSnapshot) -> Result<(), StoreError> {
        check_finite(LATEST_KEY, "totalHours", snapshot.total_hours)?;
        check_finite(LATEST_KEY, "totalSeconds", snapshot.total_seconds)?;
        check_usage(LATEST_KEY, "appUsage", &snapshot.app_usage)?;
        check_usage(LATEST_KEY, "categoryUsage", &snapshot.category_usage)?;
        for record in &snapshot.history {
            check_record(LATEST_KEY, record)?;
        }
        self.write_json(LATEST_KEY, snapshot)
    }

    /// The daily goal. Missing or unusable values fall back to 2 hours.
    pub fn read_goal(&self) -> GoalConfig {
        let threshold = match self.read_json::<f64>(GOAL_THRESHOLD_KEY) {
            Ok(Some(hours)) if hours.is_finite() && hours >= 0.0 => hours,
            Ok(Some(hours)) => {
                tracing::warn!(hours, "Ignoring invalid goal threshold");
                DEFAULT_GOAL_HOURS
            }
            Ok(None) => DEFAULT_GOAL_HOURS,
            Err(err) => {
                tracing::warn!(error = %err, "Discarding unreadable goal threshold");
                DEFAULT_GOAL_HOURS
            }
        };
        GoalConfig::new(threshold)
    }

    pub fn write_goal(&self, goal: &GoalConfig) -> Result<(), StoreError> {
        let hours = goal.threshold_hours;
        if !hours.is_finite() || hours < 0.0 {
            return Err(StoreError::Encode {
                key: GOAL_THRESHOLD_KEY.to_string(),
                reason: format!("goal threshold must be a non-negative number, got {hours}"),
            });
        }
        self.write_json(GOAL_THRESHOLD_KEY, &hours)
    }

    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let Some(bytes) = self.kv.get(key)? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StoreError::Decode {
                key: key.to_string(),
                source,
            })
    }

    fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(value).map_err(|err| StoreError::Encode {
            key: key.to_string(),
            reason: err.to_string(),
        })?;
        self.kv.set(key, &bytes)
    }
}

fn sort_legacy_keys(keys: Vec<String>) -> Vec<String> {
    let mut keyed: Vec<(i64, String)> = keys
        .into_iter()
        .filter_map(|key| legacy_timestamp(&key).map(|ts| (ts, key)))
        .collect();
    keyed.sort();
    keyed.dedup();
    keyed.into_iter().map(|(_, key)| key).collect()
}

fn decode_legacy(key: &str, bytes: &[u8]) -> Result<LegacySnapshot, StoreError> {
    let stored: StoredLegacySnapshot =
        serde_json::from_slice(bytes).map_err(|source| StoreError::Decode {
            key: key.to_string(),
            source,
        })?;

    Ok(LegacySnapshot {
        key: key.to_string(),
        day: day::parse_stored_day(&stored.date),
        total_hours: stored.total_hours,
        total_seconds: stored
            .total_seconds
            .unwrap_or(stored.total_hours * crate::SECONDS_PER_HOUR),
        app_usage: stored.app_usage,
        category_usage: stored.category_usage,
    })
}

fn check_record(key: &str, record: &DailyRecord) -> Result<(), StoreError> {
    check_finite(key, "totalHours", record.total_hours)?;
    check_usage(key, "appUsage", &record.app_usage)
}

fn check_usage(key: &str, field: &str, usage: &UsageMap) -> Result<(), StoreError> {
    usage
        .iter()
        .try_for_each(|(name, hours)| check_finite(key, &format!("{field}[{name}]"), *hours))
}

// serde_json writes NaN and infinity as null, which would not read back.
fn check_finite(key: &str, field: &str, value: f64) -> Result<(), StoreError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(StoreError::Encode {
            key: key.to_string(),
            reason: format!("{field} is not a finite number ({value})"),
        })
    }
}
