//! Single-pass extraction of per-app and per-category hours
//!
//! The raw stream is drained strictly in order: a segment, then each of its
//! categories, then each category's applications. Nothing is buffered.

use crate::activity::{ActivitySegment, SourceError};
use crate::{UsageMap, SECONDS_PER_HOUR};
use futures::{Stream, StreamExt};

/// Usage for one time window, in hours.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UsageDetails {
    /// Sum of segment totals. May differ from the sum of `app_usage`.
    pub total_hours: f64,
    pub app_usage: UsageMap,
    pub category_usage: UsageMap,
}

impl UsageDetails {
    pub fn is_empty(&self) -> bool {
        self.total_hours == 0.0 && self.app_usage.is_empty() && self.category_usage.is_empty()
    }
}

/// Consumes the activity stream once and folds it into hour totals.
///
/// Unnamed apps and categories are counted under `"Unknown"`. An empty stream
/// yields empty maps. Any error from the source aborts the fold.
pub async fn extract_details<S>(mut segments: S) -> Result<UsageDetails, SourceError>
where
    S: Stream<Item = Result<ActivitySegment, SourceError>> + Unpin,
{
    let mut details = UsageDetails::default();

    while let Some(segment) = segments.next().await {
        let mut segment = segment?;
        details.total_hours += to_hours(segment.total_activity_duration);

        while let Some(category) = segment.categories.next().await {
            let mut category = category?;
            accumulate(
                &mut details.category_usage,
                category.label(),
                category.total_activity_duration,
            );

            while let Some(app) = category.applications.next().await {
                let app = app?;
                accumulate(&mut details.app_usage, app.label(), app.total_activity_duration);
            }
        }
    }

    Ok(details)
}

fn accumulate(usage: &mut UsageMap, label: &str, seconds: f64) {
    let hours = to_hours(seconds);
    match usage.get_mut(label) {
        Some(total) => *total += hours,
        None => {
            usage.insert(label.to_string(), hours);
        }
    }
}

/// Seconds to hours. Negative or non-finite durations count as zero.
fn to_hours(seconds: f64) -> f64 {
    if seconds.is_finite() && seconds > 0.0 {
        seconds / SECONDS_PER_HOUR
    } else {
        0.0
    }
}
