//! Outcome correlator - matches predictions to later-recorded actuals and
//! tracks per-forecast accuracy.
//!
//! Recording is a check-then-act sequence (duplicate check, then insert), so
//! it runs under a mutex; the store's unique constraint on
//! `(forecast_id, outcome_date)` is the backstop beneath it.

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::engine::error::{EngineError, Result};
use crate::engine::storage::{ForecastStore, OutcomeStore};
use crate::engine::types::{
    EngineConfig, Forecast, ForecastPatch, ForecastStatus, Outcome, PendingOutcome,
    PendingPriority,
};

/// Correlates stored forecasts with recorded outcomes.
pub struct OutcomeCorrelator {
    forecasts: Arc<dyn ForecastStore>,
    outcomes: Arc<dyn OutcomeStore>,
    config: EngineConfig,
    record_lock: Mutex<()>,
}

impl OutcomeCorrelator {
    pub fn new(
        forecasts: Arc<dyn ForecastStore>,
        outcomes: Arc<dyn OutcomeStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            forecasts,
            outcomes,
            config,
            record_lock: Mutex::new(()),
        }
    }

    /// Record an actual value for a previously predicted date.
    ///
    /// Fails with `UnknownForecast`, `DateNotPredicted`, or
    /// `DuplicateOutcome`. The duplicate check and the insert are serialized
    /// so two concurrent calls cannot both pass the check.
    #[instrument(skip(self))]
    pub async fn record_outcome(
        &self,
        forecast_id: i64,
        date: NaiveDate,
        actual_value: f64,
    ) -> Result<Outcome> {
        let _guard = self.record_lock.lock().await;

        let forecast = self
            .forecasts
            .get(forecast_id)
            .await?
            .ok_or(EngineError::UnknownForecast(forecast_id))?;

        let predicted = predicted_dates(&forecast);
        if !predicted.contains_key(&date) {
            return Err(EngineError::DateNotPredicted { forecast_id, date });
        }

        let existing = self.outcomes.list_for_forecast(forecast_id).await?;
        if existing.iter().any(|o| o.outcome_date == date) {
            return Err(EngineError::DuplicateOutcome { forecast_id, date });
        }

        let mut outcome = Outcome {
            id: None,
            forecast_id,
            outcome_date: date,
            actual_value,
            recorded_at: Utc::now(),
        };
        let id = self.outcomes.create(&outcome).await?;
        outcome.id = Some(id);

        info!(
            "Recorded outcome {} for forecast {} on {}",
            actual_value, forecast_id, date
        );
        Ok(outcome)
    }

    /// Windowed accuracy for one forecast: the mean per-point accuracy over
    /// the most recent `accuracy_window` outcomes, newest by `recorded_at`.
    /// Returns `None` when no outcome exists yet. On success the stored
    /// forecast's `accuracy_score` is patched.
    #[instrument(skip(self))]
    pub async fn compute_accuracy(&self, forecast_id: i64) -> Result<Option<f64>> {
        let forecast = self
            .forecasts
            .get(forecast_id)
            .await?
            .ok_or(EngineError::UnknownForecast(forecast_id))?;

        let mut outcomes = self.outcomes.list_for_forecast(forecast_id).await?;
        if outcomes.is_empty() {
            debug!("Forecast {} has no outcomes yet", forecast_id);
            return Ok(None);
        }

        // Most recent first; ids break exact timestamp ties.
        outcomes.sort_by(|a, b| {
            b.recorded_at
                .cmp(&a.recorded_at)
                .then(b.id.cmp(&a.id))
        });

        let predicted = predicted_dates(&forecast);
        let window: Vec<f64> = outcomes
            .iter()
            .filter_map(|o| {
                predicted
                    .get(&o.outcome_date)
                    .map(|&p| point_accuracy(p, o.actual_value))
            })
            .take(self.config.accuracy_window)
            .collect();

        if window.is_empty() {
            return Ok(None);
        }

        let accuracy = window.iter().sum::<f64>() / window.len() as f64;
        debug!(
            "Forecast {} windowed accuracy {:.1}% over {} outcome(s)",
            forecast_id,
            accuracy,
            window.len()
        );

        self.forecasts
            .update(
                forecast_id,
                ForecastPatch {
                    accuracy_score: Some(accuracy),
                    status: None,
                    updated_at: Some(Utc::now()),
                },
            )
            .await?;

        Ok(Some(accuracy))
    }

    /// Every predicted date at or before `as_of` on an active forecast with
    /// no matching outcome, sorted by priority then by overdue days, both
    /// descending.
    pub fn find_pending_outcomes(
        &self,
        forecasts: &[Forecast],
        outcomes: &[Outcome],
        as_of: DateTime<Utc>,
    ) -> Vec<PendingOutcome> {
        let as_of_date = as_of.date_naive();
        let mut pending = Vec::new();

        for forecast in forecasts {
            if forecast.status != ForecastStatus::Active {
                continue;
            }
            let Some(forecast_id) = forecast.id else {
                continue;
            };

            for point in &forecast.predicted_series.points {
                let date = point.timestamp.date_naive();
                if date > as_of_date {
                    continue;
                }
                let matched = outcomes
                    .iter()
                    .any(|o| o.forecast_id == forecast_id && o.outcome_date == date);
                if matched {
                    continue;
                }

                let overdue_days = (as_of_date - date).num_days();
                let priority = if overdue_days > self.config.pending_high_days {
                    PendingPriority::High
                } else if overdue_days > self.config.pending_medium_days {
                    PendingPriority::Medium
                } else {
                    PendingPriority::Low
                };

                pending.push(PendingOutcome {
                    forecast_id,
                    forecast_title: forecast.title.clone(),
                    predicted_date: date,
                    predicted_value: point.value,
                    overdue_days,
                    priority,
                });
            }
        }

        pending.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(b.overdue_days.cmp(&a.overdue_days))
        });
        pending
    }
}

/// Predicted value per calendar date, since outcomes reference dates rather
/// than full timestamps.
fn predicted_dates(forecast: &Forecast) -> HashMap<NaiveDate, f64> {
    forecast
        .predicted_series
        .points
        .iter()
        .map(|p| (p.timestamp.date_naive(), p.value))
        .collect()
}

/// Accuracy of one (prediction, actual) pair as a percentage in [0, 100].
/// The deviation is taken relative to the predicted level; a prediction of
/// zero is fully right for a zero actual and fully wrong otherwise.
fn point_accuracy(predicted: f64, actual: f64) -> f64 {
    if predicted == 0.0 {
        return if actual == 0.0 { 100.0 } else { 0.0 };
    }
    (100.0 * (1.0 - (predicted - actual).abs() / predicted.abs())).clamp(0.0, 100.0)
}
