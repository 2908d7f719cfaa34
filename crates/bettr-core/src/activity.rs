//! Raw activity source model
//!
//! The OS hands the report extension an async, single-pass stream of activity
//! segments. Each segment nests a stream of categories, and each category a
//! stream of applications. None of the levels can be replayed or iterated
//! concurrently.

use futures::stream::{self, BoxStream, StreamExt};
use serde::Deserialize;

/// Failure of the raw activity source itself.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("activity source unavailable: {0}")]
    Unavailable(String),
    #[error("activity enumeration failed: {0}")]
    Enumeration(String),
}

/// One level of the raw activity stream.
pub type SourceStream<T> = BoxStream<'static, Result<T, SourceError>>;

pub struct ActivitySegment {
    /// Seconds of activity in this segment.
    pub total_activity_duration: f64,
    pub categories: SourceStream<CategoryActivity>,
}

pub struct CategoryActivity {
    pub display_name: Option<String>,
    /// Seconds of activity in this category.
    pub total_activity_duration: f64,
    pub applications: SourceStream<ApplicationActivity>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationActivity {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub bundle_identifier: Option<String>,
    /// Seconds of activity for this application.
    #[serde(default)]
    pub total_activity_duration: f64,
}

impl ApplicationActivity {
    /// Display name, else bundle identifier, else `"Unknown"`.
    pub fn label(&self) -> &str {
        non_empty(self.display_name.as_deref())
            .or_else(|| non_empty(self.bundle_identifier.as_deref()))
            .unwrap_or(crate::UNKNOWN_LABEL)
    }
}

impl CategoryActivity {
    pub fn label(&self) -> &str {
        non_empty(self.display_name.as_deref()).unwrap_or(crate::UNKNOWN_LABEL)
    }
}

fn non_empty(name: Option<&str>) -> Option<&str> {
    name.filter(|n| !n.trim().is_empty())
}

// =============================================================================
// Recorded segments
// =============================================================================

/// A fully materialized segment, as captured in a JSON activity dump.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedSegment {
    #[serde(default)]
    pub total_activity_duration: f64,
    #[serde(default)]
    pub categories: Vec<RecordedCategory>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedCategory {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub total_activity_duration: f64,
    #[serde(default)]
    pub applications: Vec<ApplicationActivity>,
}

/// Replays recorded segments as a live activity stream.
pub fn replay(segments: Vec<RecordedSegment>) -> SourceStream<ActivitySegment> {
    stream::iter(segments.into_iter().map(|segment| {
        Ok(ActivitySegment {
            total_activity_duration: segment.total_activity_duration,
            categories: replay_categories(segment.categories),
        })
    }))
    .boxed()
}

fn replay_categories(categories: Vec<RecordedCategory>) -> SourceStream<CategoryActivity> {
    stream::iter(categories.into_iter().map(|category| {
        Ok(CategoryActivity {
            display_name: category.display_name,
            total_activity_duration: category.total_activity_duration,
            applications: stream::iter(category.applications.into_iter().map(Ok)).boxed(),
        })
    }))
    .boxed()
}

/// A source that fails on first poll.
pub fn unavailable(reason: impl Into<String>) -> SourceStream<ActivitySegment> {
    stream::once(futures::future::ready(Err(SourceError::Unavailable(
        reason.into(),
    ))))
    .boxed()
}
