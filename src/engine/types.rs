//! Core types and data structures for the forecasting engine.

use crate::types::Series;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Model families the prediction generator knows how to dispatch on.
/// The registry stays purely descriptive; the family is derived from the
/// descriptor name, and unknown names fall back to `Default` on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    Trend,
    MovingAverage,
    Smoothing,
    Polynomial,
    NonlinearApprox,
    Autoregressive,
    Ensemble,
    Seasonal,
    Default,
}

impl ModelKind {
    /// Map a registry model name to its algorithm family.
    pub fn from_name(name: &str) -> Self {
        match name {
            "linear-trend" => ModelKind::Trend,
            "moving-average" => ModelKind::MovingAverage,
            "exponential-smoothing" => ModelKind::Smoothing,
            "polynomial-regression" => ModelKind::Polynomial,
            "neural-approximation" => ModelKind::NonlinearApprox,
            "autoregressive" => ModelKind::Autoregressive,
            "ensemble-tree" => ModelKind::Ensemble,
            "seasonal-decomposition" => ModelKind::Seasonal,
            _ => ModelKind::Default,
        }
    }
}

/// Broad model category shown to users when picking a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelCategory {
    Statistical,
    MachineLearning,
    AiPowered,
}

/// How much statistics background a model assumes of its user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Beginner,
    Intermediate,
    Advanced,
}

/// Configuration value attached to a model descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f64),
    Bool(bool),
    Text(String),
}

impl ParamValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ParamValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

/// Immutable descriptor of a forecasting model in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub id: u32,
    pub name: String,
    pub category: ModelCategory,
    pub complexity: Complexity,
    pub parameters: HashMap<String, ParamValue>,
    pub best_for: String,
}

impl ModelDescriptor {
    /// Algorithm family used by the scorer and the generator.
    pub fn kind(&self) -> ModelKind {
        ModelKind::from_name(&self.name)
    }

    /// Numeric parameter lookup with a fallback default.
    pub fn numeric_param(&self, key: &str, default: f64) -> f64 {
        self.parameters
            .get(key)
            .and_then(|p| p.as_number())
            .unwrap_or(default)
    }
}

/// Lifecycle status of a stored forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastStatus {
    Active,
    Paused,
    Completed,
    Error,
}

/// A stored forecast: input series, predicted continuation, tracked accuracy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Forecast {
    /// Database record ID (set by the store)
    pub id: Option<i64>,
    pub title: String,
    pub forecast_type: String,
    pub model_name: String,
    pub input_series: Series,
    pub predicted_series: Series,
    /// Mean accuracy over the most recent outcome window; unset until the
    /// first outcome arrives.
    pub accuracy_score: Option<f64>,
    pub time_horizon: u32,
    pub status: ForecastStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update applied to a stored forecast. `None` fields are left as-is.
#[derive(Debug, Clone, Default)]
pub struct ForecastPatch {
    pub accuracy_score: Option<f64>,
    pub status: Option<ForecastStatus>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A later-recorded actual value for a previously predicted date.
/// Immutable once created; at most one per `(forecast_id, outcome_date)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    pub id: Option<i64>,
    pub forecast_id: i64,
    pub outcome_date: NaiveDate,
    pub actual_value: f64,
    pub recorded_at: DateTime<Utc>,
}

/// Urgency of a predicted date that still has no recorded outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingPriority {
    Low,
    Medium,
    High,
}

/// A predicted date at or before the as-of instant with no matching outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingOutcome {
    pub forecast_id: i64,
    pub forecast_title: String,
    pub predicted_date: NaiveDate,
    pub predicted_value: f64,
    pub overdue_days: i64,
    pub priority: PendingPriority,
}

/// Kind of recurring background job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    AccuracyUpdate,
    DailyReport,
    WeeklySummary,
    ModelEvaluation,
}

/// How often a scheduled task recurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

/// Task lifecycle. `Running` is transient and exclusive: a task already
/// running is never selected again within the same tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Active,
    Paused,
    Running,
    Error,
}

/// When a task fires: time of day plus the weekly/monthly anchor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskScheduleConfig {
    pub time_of_day: NaiveTime,
    /// 0 = Sunday .. 6 = Saturday; required for weekly tasks.
    pub day_of_week: Option<u32>,
    /// 1-based calendar day; required for monthly tasks. Clamped to the
    /// length of the target month.
    pub day_of_month: Option<u32>,
    pub enabled: bool,
}

/// A recurring background job with a computed next-run time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledTask {
    pub id: String,
    pub task_type: TaskType,
    pub frequency: Frequency,
    pub config: TaskScheduleConfig,
    pub next_run: DateTime<Utc>,
    pub last_run: Option<DateTime<Utc>>,
    pub status: TaskStatus,
}

/// Terminal status of a single task execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    /// Core computation succeeded but at least one sink delivery failed.
    Partial,
    Failed,
}

/// Append-only record of one task execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskExecutionResult {
    pub task_id: String,
    pub execution_time: DateTime<Utc>,
    pub status: ExecutionStatus,
    pub forecasts_processed: usize,
    pub alerts_sent: usize,
    pub reports_generated: usize,
    pub errors: Vec<String>,
}

/// Alert raised when a forecast's windowed accuracy drops below threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccuracyAlert {
    pub forecast_id: i64,
    pub forecast_title: String,
    pub accuracy_pct: f64,
    pub threshold_pct: f64,
    pub raised_at: DateTime<Utc>,
}

/// Cross-forecast metrics handed to the report sink by reporting tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportPayload {
    pub task_type: TaskType,
    pub generated_at: DateTime<Utc>,
    pub total_forecasts: usize,
    pub active_forecasts: usize,
    pub average_accuracy_pct: Option<f64>,
    /// Mean windowed accuracy per model name, for model evaluation reports.
    pub per_model_accuracy: HashMap<String, f64>,
    pub summary: String,
}

/// Calendar step between predicted points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastStep {
    /// Calendar-aware monthly stepping (the reference behavior).
    Monthly,
    /// Reuse the spacing between the last two input points.
    Inferred,
}

/// Engine-wide tunables. Thresholds are configuration, not derived values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Number of most recent outcomes averaged into a forecast's accuracy
    pub accuracy_window: usize,
    /// Windowed accuracy below this raises an alert
    pub alert_threshold_pct: f64,
    /// Compatibility score baseline
    pub base_score: i32,
    /// Compatibility score clamp floor
    pub score_floor: i32,
    /// Compatibility score clamp ceiling
    pub score_ceiling: i32,
    /// Score at or above which a model is annotated as recommended
    pub recommend_threshold: i32,
    /// Multiplicative noise band for the smoothing model
    pub noise_band: (f64, f64),
    /// Additive noise amplitude as a fraction of the series stddev
    pub stddev_noise_fraction: f64,
    /// Calendar step between predicted points
    pub forecast_step: ForecastStep,
    /// Scheduler polling interval in seconds
    pub tick_interval_seconds: u64,
    /// Bounded timeout for external sink calls in seconds
    pub sink_timeout_seconds: u64,
    /// Execution history cap (newest first)
    pub history_cap: usize,
    /// Overdue days beyond which a pending outcome is high priority
    pub pending_high_days: i64,
    /// Overdue days beyond which a pending outcome is medium priority
    pub pending_medium_days: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            accuracy_window: 5,
            alert_threshold_pct: 75.0,
            base_score: 70,
            score_floor: 40,
            score_ceiling: 95,
            recommend_threshold: 85,
            noise_band: (0.85, 1.15),
            stddev_noise_fraction: 0.05,
            forecast_step: ForecastStep::Monthly,
            tick_interval_seconds: 60,
            sink_timeout_seconds: 10,
            history_cap: 100,
            pending_high_days: 30,
            pending_medium_days: 7,
        }
    }
}
