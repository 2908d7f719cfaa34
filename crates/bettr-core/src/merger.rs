//! Daily history merge
//!
//! Precedence per day, lowest to highest: legacy snapshots, existing history,
//! today's record. The result holds one record per day, sorted ascending.

use crate::{DailyRecord, LegacySnapshot};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Merges today's record into the persisted history.
///
/// Pure: the same inputs always produce the same output. Legacy snapshots
/// are expected in write order; a later snapshot for the same day replaces an
/// earlier one. Snapshots without a usable day are skipped.
pub fn merge_history(
    existing: &[DailyRecord],
    legacy: &[LegacySnapshot],
    today: &DailyRecord,
) -> Vec<DailyRecord> {
    let mut by_day: BTreeMap<NaiveDate, DailyRecord> = BTreeMap::new();

    for snapshot in legacy {
        match snapshot.to_daily_record() {
            Some(record) => {
                by_day.insert(record.day, record);
            }
            None => {
                tracing::debug!(key = %snapshot.key, "Skipping legacy snapshot without a day");
            }
        }
    }

    for record in existing {
        by_day.insert(record.day, record.clone());
    }

    by_day.insert(today.day, today.clone());

    by_day.into_values().collect()
}

/// Legacy days that existing history does not cover yet.
pub fn unmerged_legacy_days(existing: &[DailyRecord], legacy: &[LegacySnapshot]) -> Vec<NaiveDate> {
    let mut days: Vec<NaiveDate> = legacy
        .iter()
        .filter_map(|snapshot| snapshot.day)
        .filter(|day| !existing.iter().any(|record| record.day == *day))
        .collect();
    days.sort_unstable();
    days.dedup();
    days
}
