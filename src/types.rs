//! Shared primitive types used across the forecasting engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single observation in a time-indexed series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimePoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl TimePoint {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Ordered sequence of observations with strictly increasing timestamps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub points: Vec<TimePoint>,
}

impl Series {
    pub fn new(points: Vec<TimePoint>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Raw observation values, in series order.
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn last_point(&self) -> Option<&TimePoint> {
        self.points.last()
    }

    /// True when every timestamp is strictly greater than its predecessor.
    pub fn is_strictly_increasing(&self) -> bool {
        self.points
            .windows(2)
            .all(|w| w[0].timestamp < w[1].timestamp)
    }
}

/// Domain hint supplied by the caller alongside a series. Used only by the
/// compatibility scorer to annotate seasonality-aware models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesType {
    Sales,
    Revenue,
    Inventory,
    Traffic,
    Other,
}
