//! Usage ranking and duration labels for the report views

use crate::{UsageMap, SECONDS_PER_HOUR};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageBar {
    pub label: String,
    pub hours: f64,
    /// `hours` relative to the largest entry, for bar length.
    pub share_of_max: f64,
}

/// Usage sorted by hours, descending. Ties are ordered by label.
pub fn rank_usage(usage: &UsageMap) -> Vec<UsageBar> {
    let mut entries: Vec<(&String, f64)> = usage.iter().map(|(k, v)| (k, *v)).collect();
    entries.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    let max = entries
        .first()
        .map(|(_, hours)| *hours)
        .filter(|hours| *hours > 0.0)
        .unwrap_or(1.0);

    entries
        .into_iter()
        .map(|(label, hours)| UsageBar {
            label: label.clone(),
            hours,
            share_of_max: hours / max,
        })
        .collect()
}

/// Formats hours as `"3h 25m"`, `"2h"` or `"40m"`, rounding to the nearest minute.
pub fn format_hours(hours: f64) -> String {
    let total_minutes = if hours.is_finite() && hours > 0.0 {
        (hours * 60.0).round() as u64
    } else {
        0
    };
    let (h, m) = (total_minutes / 60, total_minutes % 60);
    match (h, m) {
        (0, m) => format!("{m}m"),
        (h, 0) => format!("{h}h"),
        (h, m) => format!("{h}h {m}m"),
    }
}

/// Formats seconds as `HH:MM`, truncating partial minutes.
pub fn format_clock(seconds: f64) -> String {
    let whole = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    format!("{:02}:{:02}", whole / SECONDS_PER_HOUR as u64, (whole / 60) % 60)
}
