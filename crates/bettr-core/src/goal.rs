//! Goal progress and weekly trend
//!
//! Turns today's total and the persisted history into what the progress bar
//! and the week chart display.

use crate::day::week_days;
use crate::DailyRecord;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;

/// Daily goal used until the user sets one.
pub const DEFAULT_GOAL_HOURS: f64 = 2.0;

/// Ratio at which the band turns from green to yellow.
pub const YELLOW_BAND_START: f64 = 0.5;
/// Ratio at which the band turns from yellow to red.
pub const RED_BAND_START: f64 = 0.9;
/// Ratio from which the goal counts as almost reached.
pub const APPROACHING_GOAL_RATIO: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalConfig {
    pub threshold_hours: f64,
}

impl GoalConfig {
    pub fn new(threshold_hours: f64) -> Self {
        Self { threshold_hours }
    }
}

impl Default for GoalConfig {
    fn default() -> Self {
        Self::new(DEFAULT_GOAL_HOURS)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorBand {
    Green,
    Yellow,
    Red,
}

impl ColorBand {
    pub fn for_ratio(ratio: f64) -> Self {
        if ratio < YELLOW_BAND_START {
            ColorBand::Green
        } else if ratio < RED_BAND_START {
            ColorBand::Yellow
        } else {
            ColorBand::Red
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ColorBand::Green => "green",
            ColorBand::Yellow => "yellow",
            ColorBand::Red => "red",
        }
    }
}

impl std::fmt::Display for ColorBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalProgress {
    pub total_hours: f64,
    pub threshold_hours: f64,
    /// `total / threshold`, clamped to `[0, 1]`.
    pub progress_ratio: f64,
    pub exceeded_goal: bool,
    pub approaching_goal: bool,
    pub color_band: ColorBand,
}

/// `min(total / threshold, 1.0)`. A zero or invalid threshold reads as a full bar.
pub fn progress_ratio(total_hours: f64, threshold_hours: f64) -> f64 {
    if !(threshold_hours.is_finite() && threshold_hours > 0.0) {
        return 1.0;
    }
    let total = if total_hours.is_nan() { 0.0 } else { total_hours };
    (total / threshold_hours).clamp(0.0, 1.0)
}

pub fn evaluate_progress(total_hours: f64, goal: &GoalConfig) -> GoalProgress {
    let ratio = progress_ratio(total_hours, goal.threshold_hours);
    GoalProgress {
        total_hours,
        threshold_hours: goal.threshold_hours,
        progress_ratio: ratio,
        exceeded_goal: total_hours > goal.threshold_hours,
        approaching_goal: ratio >= APPROACHING_GOAL_RATIO,
        color_band: ColorBand::for_ratio(ratio),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekPoint {
    pub day: NaiveDate,
    pub total_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekSummary {
    /// Sunday through Saturday; days without history are zero.
    pub points: Vec<WeekPoint>,
    pub average_hours: f64,
    pub within_goal: bool,
}

/// The calendar week containing `today`, with absent days filled as zero.
/// Empty when that week falls outside chrono's date range.
pub fn week_series(history: &[DailyRecord], today: NaiveDate) -> Vec<WeekPoint> {
    let by_day: HashMap<NaiveDate, f64> = history
        .iter()
        .map(|record| (record.day, record.total_hours))
        .collect();

    week_days(today)
        .into_iter()
        .flatten()
        .map(|day| WeekPoint {
            day,
            total_hours: by_day.get(&day).copied().unwrap_or(0.0),
        })
        .collect()
}

/// Week series plus the mean over its days with nonzero usage (0 if none do).
pub fn summarize_week(history: &[DailyRecord], today: NaiveDate, goal: &GoalConfig) -> WeekSummary {
    let points = week_series(history, today);
    let average_hours = average_of_active(&points);
    WeekSummary {
        points,
        average_hours,
        within_goal: average_hours <= goal.threshold_hours,
    }
}

fn average_of_active(points: &[WeekPoint]) -> f64 {
    let active: Vec<f64> = points
        .iter()
        .map(|p| p.total_hours)
        .filter(|hours| *hours > 0.0)
        .collect();
    if active.is_empty() {
        0.0
    } else {
        active.iter().sum::<f64>() / active.len() as f64
    }
}
