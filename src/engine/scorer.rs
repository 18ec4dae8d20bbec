//! Compatibility scorer - ranks models against a series' statistical profile.
//!
//! The score is a heuristic prior standing in for expensive cross-validation.
//! It is advisory only: it ranks and annotates models but never blocks a
//! selection. All thresholds come from `EngineConfig`.

use crate::engine::stats::{compute_stats, SeriesStats};
use crate::engine::types::{EngineConfig, ModelDescriptor, ModelKind};
use crate::types::{Series, SeriesType};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// A model's compatibility rating for one series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelScore {
    pub model_id: u32,
    pub model_name: String,
    /// Integer score in `[score_floor, score_ceiling]`.
    pub score: i32,
    pub recommended: bool,
    pub reason: String,
}

/// Score a single model against a series.
///
/// Series with fewer than 3 points get the base score without any statistics
/// being computed. Everything else applies the model family's adjustment
/// rules and clamps into the configured band.
#[instrument(skip(model, series, config), fields(model = %model.name))]
pub fn score_model(
    model: &ModelDescriptor,
    series: &Series,
    series_type: Option<SeriesType>,
    config: &EngineConfig,
) -> ModelScore {
    if series.len() < 3 {
        debug!("Series too short to profile; returning base score");
        return ModelScore {
            model_id: model.id,
            model_name: model.name.clone(),
            score: config.base_score,
            recommended: config.base_score >= config.recommend_threshold,
            reason: format!("Score {}: series too short to profile", config.base_score),
        };
    }

    // Length >= 3 was checked above, so the profile always exists.
    let stats = compute_stats(series).unwrap_or(SeriesStats {
        mean: 0.0,
        std_dev: 0.0,
        volatility_pct: f64::INFINITY,
        trend_strength_pct: 0.0,
    });

    let adjustment = kind_adjustment(model.kind(), &stats, series.len(), series_type);
    let score = (config.base_score + adjustment).clamp(config.score_floor, config.score_ceiling);
    let recommended = score >= config.recommend_threshold;

    let reason = describe(score, &stats, recommended);
    debug!("Scored {} at {} ({:+})", model.name, score, adjustment);

    ModelScore {
        model_id: model.id,
        model_name: model.name.clone(),
        score,
        recommended,
        reason,
    }
}

/// Per-family adjustment rules. Each family reacts to a different mix of
/// volatility, trend strength, length, and the caller's series-type hint.
/// An infinite volatility (zero-mean series) lands in every "very volatile"
/// branch, which is the intended reading of the sentinel.
fn kind_adjustment(
    kind: ModelKind,
    stats: &SeriesStats,
    len: usize,
    series_type: Option<SeriesType>,
) -> i32 {
    let vol = stats.volatility_pct;
    let trend = stats.trend_strength_pct.abs();
    let mut adj = 0;

    match kind {
        ModelKind::Trend => {
            if trend > 5.0 {
                adj += 15;
            }
            if vol < 10.0 {
                adj += 5;
            }
            if vol > 30.0 {
                adj -= 10;
            }
            if len >= 12 {
                adj += 5;
            }
        }
        ModelKind::MovingAverage => {
            if vol < 15.0 {
                adj += 15;
            }
            if trend > 20.0 {
                adj -= 10;
            }
            if len >= 6 {
                adj += 5;
            }
        }
        ModelKind::Smoothing => {
            if (10.0..30.0).contains(&vol) {
                adj += 10;
            }
            if len >= 12 {
                adj += 5;
            }
            if trend > 40.0 {
                adj -= 5;
            }
        }
        ModelKind::Polynomial => {
            if trend > 10.0 {
                adj += 10;
            }
            if vol > 40.0 {
                adj -= 10;
            }
            if len >= 18 {
                adj += 5;
            }
        }
        ModelKind::Autoregressive => {
            if len >= 24 {
                adj += 10;
            }
            if vol < 20.0 {
                adj += 5;
            }
            if len < 6 {
                adj -= 10;
            }
        }
        ModelKind::Ensemble => {
            if vol > 20.0 {
                adj += 10;
            }
            if len >= 12 {
                adj += 5;
            }
            if trend > 15.0 {
                adj += 5;
            }
        }
        ModelKind::NonlinearApprox => {
            if vol > 25.0 {
                adj += 10;
            }
            if len >= 24 {
                adj += 10;
            }
            if len < 12 {
                adj -= 15;
            }
        }
        ModelKind::Seasonal => {
            let seasonal_domain = matches!(
                series_type,
                Some(SeriesType::Sales) | Some(SeriesType::Revenue)
            );
            if seasonal_domain && len > 24 {
                adj += 15;
            }
            if len >= 24 {
                adj += 5;
            }
            if len < 12 {
                adj -= 15;
            }
        }
        ModelKind::Default => {}
    }

    adj
}

/// Human-readable explanation of the rating.
fn describe(score: i32, stats: &SeriesStats, recommended: bool) -> String {
    let mut notes = Vec::new();

    if stats.volatility_pct.is_infinite() || stats.volatility_pct > 30.0 {
        notes.push("high volatility".to_string());
    } else if stats.volatility_pct < 10.0 {
        notes.push("low volatility".to_string());
    }

    if stats.trend_strength_pct.abs() > 10.0 {
        notes.push(format!("{:.0}% trend", stats.trend_strength_pct));
    }

    if recommended {
        notes.push("recommended".to_string());
    }

    if notes.is_empty() {
        format!("Score {} on a balanced profile", score)
    } else {
        format!("Score {}: {}", score, notes.join(", "))
    }
}

/// Score every model in a catalog and return the ranking, best first.
pub fn rank_models(
    models: &[ModelDescriptor],
    series: &Series,
    series_type: Option<SeriesType>,
    config: &EngineConfig,
) -> Vec<ModelScore> {
    let mut scores: Vec<ModelScore> = models
        .iter()
        .map(|m| score_model(m, series, series_type, config))
        .collect();
    scores.sort_by(|a, b| b.score.cmp(&a.score));
    scores
}
