//! Series statistics - pure numeric profile of an input series.
//!
//! Everything here is computed fresh per request; nothing is stored. The
//! compatibility scorer and the prediction generator both start from this
//! profile.

use crate::engine::error::{EngineError, Result};
use crate::types::Series;
use serde::{Deserialize, Serialize};

/// Statistical profile of a series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesStats {
    pub mean: f64,
    /// Population standard deviation (divide by N).
    pub std_dev: f64,
    /// stdDev / mean * 100. Reported as `f64::INFINITY` when the mean is
    /// zero; this sentinel policy is shared with the scorer.
    pub volatility_pct: f64,
    /// Percentage change from the first-half mean to the second-half mean.
    /// Zero for series shorter than 2 points or with a zero first-half mean.
    pub trend_strength_pct: f64,
}

impl SeriesStats {
    /// Volatility for callers that cannot work with the infinity sentinel.
    /// Fails with `DivisionByZero` when the series mean is zero.
    pub fn volatility_checked(&self) -> Result<f64> {
        if self.volatility_pct.is_infinite() {
            return Err(EngineError::DivisionByZero("volatility with zero mean"));
        }
        Ok(self.volatility_pct)
    }
}

/// Compute the statistical profile of a series.
///
/// Fails with `InsufficientData` on an empty series; defined for every
/// series of length >= 1.
pub fn compute_stats(series: &Series) -> Result<SeriesStats> {
    if series.is_empty() {
        return Err(EngineError::InsufficientData {
            required: 1,
            actual: 0,
        });
    }

    let values = series.values();
    let n = values.len();
    let mean = values.iter().sum::<f64>() / n as f64;

    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
    let std_dev = variance.sqrt();

    let volatility_pct = if mean == 0.0 {
        f64::INFINITY
    } else {
        std_dev / mean * 100.0
    };

    let trend_strength_pct = trend_strength(&values);

    Ok(SeriesStats {
        mean,
        std_dev,
        volatility_pct,
        trend_strength_pct,
    })
}

/// First-half vs second-half percentage change. The first half takes
/// floor(N/2) points and the second half starts at ceil(N/2), so the middle
/// point of an odd-length series belongs to neither half.
fn trend_strength(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }

    let first_len = n / 2;
    let second_start = n - n / 2; // ceil(n/2)

    let first_mean = values[..first_len].iter().sum::<f64>() / first_len as f64;
    let second_half = &values[second_start..];
    let second_mean = second_half.iter().sum::<f64>() / second_half.len() as f64;

    if first_mean == 0.0 {
        return 0.0;
    }

    (second_mean - first_mean) / first_mean * 100.0
}
