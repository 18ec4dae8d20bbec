//! Scheduler - recurring accuracy re-evaluation and reporting tasks.
//!
//! One logical timer drives ticks; tasks due on a tick run sequentially in
//! registration order, so at-most-one-concurrent-execution-per-task holds
//! trivially. Each task body is caught at its own boundary: a failing task
//! marks itself `error` without aborting the tick for the others. Missed
//! runs are never backfilled; `next_run` always moves forward from the tick
//! that executed the task.

use chrono::{DateTime, Datelike, Duration as ChronoDuration, NaiveDate, NaiveTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::engine::correlator::OutcomeCorrelator;
use crate::engine::error::{EngineError, Result};
use crate::engine::notifier::NotificationSink;
use crate::engine::storage::{ForecastStore, OutcomeStore, TaskStore};
use crate::engine::types::{
    AccuracyAlert, EngineConfig, ExecutionStatus, ForecastPatch, ForecastStatus, Frequency,
    ReportPayload, ScheduledTask, TaskExecutionResult, TaskScheduleConfig, TaskStatus, TaskType,
};

/// Next occurrence of the task's slot strictly after `now`.
pub fn compute_next_run(
    frequency: Frequency,
    config: &TaskScheduleConfig,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    let tod = config.time_of_day;
    match frequency {
        Frequency::Daily => {
            let today = now.date_naive().and_time(tod).and_utc();
            if today > now {
                today
            } else {
                today + ChronoDuration::days(1)
            }
        }
        Frequency::Weekly => {
            let target = config.day_of_week.unwrap_or(0) % 7;
            let today_dow = now.weekday().num_days_from_sunday();
            let days_ahead = (target + 7 - today_dow) % 7;
            let candidate = (now.date_naive() + ChronoDuration::days(days_ahead as i64))
                .and_time(tod)
                .and_utc();
            if candidate > now {
                candidate
            } else {
                candidate + ChronoDuration::days(7)
            }
        }
        Frequency::Monthly => {
            let day = config.day_of_month.unwrap_or(1);
            let candidate = month_slot(now.year(), now.month(), day, tod);
            if candidate > now {
                candidate
            } else {
                let (year, month) = if now.month() == 12 {
                    (now.year() + 1, 1)
                } else {
                    (now.year(), now.month() + 1)
                };
                month_slot(year, month, day, tod)
            }
        }
    }
}

/// The requested day clamped to the target month's length.
fn month_slot(year: i32, month: u32, day: u32, tod: NaiveTime) -> DateTime<Utc> {
    let clamped = day.clamp(1, days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, clamped)
        .expect("clamped day is always valid")
        .and_time(tod)
        .and_utc()
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .expect("first of month is always valid")
        .pred_opt()
        .expect("month start has a predecessor")
        .day()
}

/// The task set seeded when the store holds none.
pub fn default_tasks(now: DateTime<Utc>) -> Vec<ScheduledTask> {
    let defs: [(&str, TaskType, Frequency, TaskScheduleConfig); 4] = [
        (
            "accuracy-update",
            TaskType::AccuracyUpdate,
            Frequency::Daily,
            TaskScheduleConfig {
                time_of_day: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                day_of_week: None,
                day_of_month: None,
                enabled: true,
            },
        ),
        (
            "daily-report",
            TaskType::DailyReport,
            Frequency::Daily,
            TaskScheduleConfig {
                time_of_day: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
                day_of_week: None,
                day_of_month: None,
                enabled: true,
            },
        ),
        (
            "weekly-summary",
            TaskType::WeeklySummary,
            Frequency::Weekly,
            TaskScheduleConfig {
                time_of_day: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
                day_of_week: Some(1), // Monday
                day_of_month: None,
                enabled: true,
            },
        ),
        (
            "model-evaluation",
            TaskType::ModelEvaluation,
            Frequency::Monthly,
            TaskScheduleConfig {
                time_of_day: NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
                day_of_week: None,
                day_of_month: Some(1),
                enabled: true,
            },
        ),
    ];

    defs.into_iter()
        .map(|(id, task_type, frequency, config)| {
            let next_run = compute_next_run(frequency, &config, now);
            ScheduledTask {
                id: id.to_string(),
                task_type,
                frequency,
                config,
                next_run,
                last_run: None,
                status: TaskStatus::Active,
            }
        })
        .collect()
}

/// The in-memory task list the tick function operates on. Persisted through
/// `TaskStore` after every tick; no ambient globals.
#[derive(Debug, Clone, Default)]
pub struct SchedulerState {
    pub tasks: Vec<ScheduledTask>,
}

/// Drives recurring tasks against the stores and sinks.
pub struct Scheduler {
    state: SchedulerState,
    correlator: OutcomeCorrelator,
    forecasts: Arc<dyn ForecastStore>,
    task_store: Arc<dyn TaskStore>,
    sink: Arc<dyn NotificationSink>,
    report_recipients: Vec<String>,
    config: EngineConfig,
}

impl Scheduler {
    /// Loads persisted tasks, seeding the defaults when none exist.
    pub async fn new(
        forecasts: Arc<dyn ForecastStore>,
        outcomes: Arc<dyn OutcomeStore>,
        task_store: Arc<dyn TaskStore>,
        sink: Arc<dyn NotificationSink>,
        report_recipients: Vec<String>,
        config: EngineConfig,
    ) -> Result<Self> {
        let mut tasks = task_store.load().await?;
        if tasks.is_empty() {
            tasks = default_tasks(Utc::now());
            task_store.save(&tasks).await?;
            info!("Seeded {} default scheduled tasks", tasks.len());
        }

        let correlator =
            OutcomeCorrelator::new(forecasts.clone(), outcomes, config.clone());

        Ok(Self {
            state: SchedulerState { tasks },
            correlator,
            forecasts,
            task_store,
            sink,
            report_recipients,
            config,
        })
    }

    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    /// Enable or disable a task and persist the change, so it survives a
    /// restart. Disabling never interrupts an in-flight execution; it only
    /// stops future ticks from selecting the task. Unknown ids are a no-op.
    pub async fn set_enabled(&mut self, task_id: &str, enabled: bool) -> Result<()> {
        let Some(task) = self.state.tasks.iter_mut().find(|t| t.id == task_id) else {
            return Ok(());
        };
        task.config.enabled = enabled;
        task.status = if enabled {
            TaskStatus::Active
        } else {
            TaskStatus::Paused
        };
        self.task_store.save(&self.state.tasks).await?;
        info!("Task {} {}", task_id, if enabled { "enabled" } else { "disabled" });
        Ok(())
    }

    /// Main execution loop - polls at the configured interval.
    pub async fn run(mut self) {
        info!(
            "Scheduler running with {} task(s), tick every {}s",
            self.state.tasks.len(),
            self.config.tick_interval_seconds
        );

        let mut interval =
            tokio::time::interval(Duration::from_secs(self.config.tick_interval_seconds));

        loop {
            interval.tick().await;
            let results = self.tick(Utc::now()).await;
            if !results.is_empty() {
                info!("Tick executed {} task(s)", results.len());
            }
        }
    }

    /// Execute every due task sequentially, in registration order.
    ///
    /// A task is due when it is enabled, not paused or already running, and
    /// its `next_run` is at or before `now`. Tasks left in `error` by a
    /// previous run stay eligible so a transient failure heals itself.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> Vec<TaskExecutionResult> {
        let mut results = Vec::new();

        for idx in 0..self.state.tasks.len() {
            let due = {
                let task = &self.state.tasks[idx];
                task.config.enabled
                    && matches!(task.status, TaskStatus::Active | TaskStatus::Error)
                    && task.next_run <= now
            };
            if !due {
                continue;
            }

            self.state.tasks[idx].status = TaskStatus::Running;
            let task = self.state.tasks[idx].clone();
            debug!("Executing task {} ({:?})", task.id, task.task_type);

            let result = self.execute(&task, now).await;

            let task = &mut self.state.tasks[idx];
            task.status = if result.status == ExecutionStatus::Failed {
                TaskStatus::Error
            } else {
                TaskStatus::Active
            };
            task.last_run = Some(now);
            // Recomputed from the execution time, not the missed slot.
            task.next_run = compute_next_run(task.frequency, &task.config, now);

            if let Err(e) = self.task_store.append_history(&result).await {
                error!("Failed to append execution history: {}", e);
            }
            results.push(result);
        }

        if !results.is_empty() {
            if let Err(e) = self.task_store.save(&self.state.tasks).await {
                error!("Failed to persist scheduler state: {}", e);
            }
        }

        results
    }

    /// Per-task boundary: any failure lands in the result's error list and
    /// the execution status, never in a panic or early return from the tick.
    async fn execute(&self, task: &ScheduledTask, now: DateTime<Utc>) -> TaskExecutionResult {
        let outcome = match task.task_type {
            TaskType::AccuracyUpdate => self.run_accuracy_update(now).await,
            TaskType::DailyReport | TaskType::WeeklySummary | TaskType::ModelEvaluation => {
                self.run_report(task.task_type, now).await
            }
        };

        match outcome {
            Ok(mut result) => {
                result.task_id = task.id.clone();
                result.execution_time = now;
                result
            }
            Err(e) => {
                let failure = EngineError::TaskExecutionFailure(e.to_string());
                error!("Task {} failed: {}", task.id, failure);
                TaskExecutionResult {
                    task_id: task.id.clone(),
                    execution_time: now,
                    status: ExecutionStatus::Failed,
                    forecasts_processed: 0,
                    alerts_sent: 0,
                    reports_generated: 0,
                    errors: vec![failure.to_string()],
                }
            }
        }
    }

    /// Recompute accuracy for every active forecast and alert on the ones
    /// below the configured threshold. Forecasts left in `error` by an
    /// earlier failure are retried and flipped back to `active` on success.
    async fn run_accuracy_update(&self, now: DateTime<Utc>) -> Result<TaskExecutionResult> {
        let forecasts = self.forecasts.list().await?;

        let mut processed = 0;
        let mut alerts_sent = 0;
        let mut errors = Vec::new();

        for forecast in forecasts
            .iter()
            .filter(|f| matches!(f.status, ForecastStatus::Active | ForecastStatus::Error))
        {
            let Some(forecast_id) = forecast.id else {
                continue;
            };

            match self.correlator.compute_accuracy(forecast_id).await {
                Ok(maybe_accuracy) => {
                    processed += 1;
                    if forecast.status == ForecastStatus::Error {
                        if let Err(e) = self
                            .set_forecast_status(forecast_id, ForecastStatus::Active, now)
                            .await
                        {
                            errors.push(format!("status for forecast {}: {}", forecast_id, e));
                        }
                    }

                    let Some(accuracy) = maybe_accuracy else {
                        // Nothing recorded yet; still counts as visited.
                        continue;
                    };
                    if accuracy < self.config.alert_threshold_pct {
                        let alert = AccuracyAlert {
                            forecast_id,
                            forecast_title: forecast.title.clone(),
                            accuracy_pct: accuracy,
                            threshold_pct: self.config.alert_threshold_pct,
                            raised_at: now,
                        };
                        match self.with_sink_timeout(self.sink.send_alert(&alert)).await {
                            Ok(()) => alerts_sent += 1,
                            Err(e) => {
                                warn!("Alert delivery failed for forecast {}: {}", forecast_id, e);
                                errors.push(format!("alert for forecast {}: {}", forecast_id, e));
                            }
                        }
                    }
                }
                Err(e) => {
                    errors.push(format!("accuracy for forecast {}: {}", forecast_id, e));
                    if let Err(e) = self
                        .set_forecast_status(forecast_id, ForecastStatus::Error, now)
                        .await
                    {
                        errors.push(format!("status for forecast {}: {}", forecast_id, e));
                    }
                }
            }
        }

        // Sink failures degrade to partial as long as the core computations
        // went through; a tick with no successes at all is a failure.
        let status = if errors.is_empty() {
            ExecutionStatus::Success
        } else if processed > 0 {
            ExecutionStatus::Partial
        } else {
            ExecutionStatus::Failed
        };

        Ok(TaskExecutionResult {
            task_id: String::new(),
            execution_time: now,
            status,
            forecasts_processed: processed,
            alerts_sent,
            reports_generated: 0,
            errors,
        })
    }

    /// Aggregate cross-forecast metrics and hand the payload to the report
    /// sink. Content rendering lives on the sink side; this only triggers
    /// and bookkeeps.
    async fn run_report(
        &self,
        task_type: TaskType,
        now: DateTime<Utc>,
    ) -> Result<TaskExecutionResult> {
        let forecasts = self.forecasts.list().await?;

        let active = forecasts
            .iter()
            .filter(|f| f.status == ForecastStatus::Active)
            .count();

        let scored: Vec<f64> = forecasts.iter().filter_map(|f| f.accuracy_score).collect();
        let average = if scored.is_empty() {
            None
        } else {
            Some(scored.iter().sum::<f64>() / scored.len() as f64)
        };

        let mut per_model: HashMap<String, Vec<f64>> = HashMap::new();
        for forecast in &forecasts {
            if let Some(score) = forecast.accuracy_score {
                per_model
                    .entry(forecast.model_name.clone())
                    .or_default()
                    .push(score);
            }
        }
        let per_model_accuracy = per_model
            .into_iter()
            .map(|(model, scores)| {
                let mean = scores.iter().sum::<f64>() / scores.len() as f64;
                (model, mean)
            })
            .collect();

        let payload = ReportPayload {
            task_type,
            generated_at: now,
            total_forecasts: forecasts.len(),
            active_forecasts: active,
            average_accuracy_pct: average,
            per_model_accuracy,
            summary: match average {
                Some(avg) => format!(
                    "{} forecast(s), {} active, average accuracy {:.1}%",
                    forecasts.len(),
                    active,
                    avg
                ),
                None => format!(
                    "{} forecast(s), {} active, no accuracy data yet",
                    forecasts.len(),
                    active
                ),
            },
        };

        let mut errors = Vec::new();
        let mut reports_generated = 0;
        match self
            .with_sink_timeout(self.sink.send_report(&payload, &self.report_recipients))
            .await
        {
            Ok(()) => reports_generated = 1,
            Err(e) => {
                warn!("Report delivery failed: {}", e);
                errors.push(format!("report delivery: {}", e));
            }
        }

        let status = if errors.is_empty() {
            ExecutionStatus::Success
        } else {
            // The aggregation itself succeeded.
            ExecutionStatus::Partial
        };

        Ok(TaskExecutionResult {
            task_id: String::new(),
            execution_time: now,
            status,
            forecasts_processed: forecasts.len(),
            alerts_sent: 0,
            reports_generated,
            errors,
        })
    }

    async fn set_forecast_status(
        &self,
        forecast_id: i64,
        status: ForecastStatus,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.forecasts
            .update(
                forecast_id,
                ForecastPatch {
                    accuracy_score: None,
                    status: Some(status),
                    updated_at: Some(now),
                },
            )
            .await?;
        Ok(())
    }

    /// Bounded wait on an external sink so a hung collaborator cannot stall
    /// the tick.
    async fn with_sink_timeout(
        &self,
        fut: impl std::future::Future<Output = anyhow::Result<()>>,
    ) -> anyhow::Result<()> {
        match timeout(Duration::from_secs(self.config.sink_timeout_seconds), fut).await {
            Ok(result) => result,
            Err(_) => Err(anyhow::anyhow!(
                "sink call timed out after {}s",
                self.config.sink_timeout_seconds
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::notifier::ChannelSink;
    use crate::engine::storage::MemoryStore;
    use crate::engine::types::Forecast;
    use crate::types::{Series, TimePoint};
    use chrono::{Months, TimeZone};
    use tokio::sync::mpsc;

    fn daily_config(hour: u32) -> TaskScheduleConfig {
        TaskScheduleConfig {
            time_of_day: NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
            day_of_week: None,
            day_of_month: None,
            enabled: true,
        }
    }

    #[test]
    fn test_daily_next_run_before_and_after_slot() {
        let config = daily_config(9);
        let before = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        assert_eq!(
            compute_next_run(Frequency::Daily, &config, before),
            Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()
        );

        let after = Utc.with_ymd_and_hms(2024, 1, 1, 9, 30, 0).unwrap();
        assert_eq!(
            compute_next_run(Frequency::Daily, &config, after),
            Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_daily_slot_exactly_now_rolls_forward() {
        let config = daily_config(9);
        let at_slot = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        assert_eq!(
            compute_next_run(Frequency::Daily, &config, at_slot),
            Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_weekly_rolls_to_following_monday() {
        let config = TaskScheduleConfig {
            time_of_day: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            day_of_week: Some(1), // Monday
            day_of_month: None,
            enabled: true,
        };
        // 2024-01-03 is a Wednesday.
        let wednesday = Utc.with_ymd_and_hms(2024, 1, 3, 12, 0, 0).unwrap();
        assert_eq!(
            compute_next_run(Frequency::Weekly, &config, wednesday),
            Utc.with_ymd_and_hms(2024, 1, 8, 8, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_weekly_same_day_past_time_waits_a_week() {
        let config = TaskScheduleConfig {
            time_of_day: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            day_of_week: Some(1),
            day_of_month: None,
            enabled: true,
        };
        // 2024-01-08 is a Monday, already past 08:00.
        let monday_noon = Utc.with_ymd_and_hms(2024, 1, 8, 12, 0, 0).unwrap();
        assert_eq!(
            compute_next_run(Frequency::Weekly, &config, monday_noon),
            Utc.with_ymd_and_hms(2024, 1, 15, 8, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_monthly_clamps_to_month_length() {
        let config = TaskScheduleConfig {
            time_of_day: NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
            day_of_week: None,
            day_of_month: Some(31),
            enabled: true,
        };
        // From mid-February 2024 (a leap year), day 31 clamps to the 29th.
        let now = Utc.with_ymd_and_hms(2024, 2, 15, 0, 0, 0).unwrap();
        assert_eq!(
            compute_next_run(Frequency::Monthly, &config, now),
            Utc.with_ymd_and_hms(2024, 2, 29, 6, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_monthly_rolls_over_year_boundary() {
        let config = TaskScheduleConfig {
            time_of_day: NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
            day_of_week: None,
            day_of_month: Some(1),
            enabled: true,
        };
        let december = Utc.with_ymd_and_hms(2023, 12, 15, 0, 0, 0).unwrap();
        assert_eq!(
            compute_next_run(Frequency::Monthly, &config, december),
            Utc.with_ymd_and_hms(2024, 1, 1, 7, 0, 0).unwrap()
        );
    }

    async fn scheduler_with_sink() -> (
        Scheduler,
        Arc<MemoryStore>,
        mpsc::Receiver<AccuracyAlert>,
        mpsc::Receiver<ReportPayload>,
    ) {
        let store = MemoryStore::new(100);
        let (alert_tx, alert_rx) = mpsc::channel(16);
        let (report_tx, report_rx) = mpsc::channel(16);
        let sink = Arc::new(ChannelSink::new(alert_tx, report_tx));

        let scheduler = Scheduler::new(
            store.clone() as Arc<dyn ForecastStore>,
            store.clone() as Arc<dyn OutcomeStore>,
            store.clone() as Arc<dyn TaskStore>,
            sink,
            vec!["ops@example.com".to_string()],
            EngineConfig::default(),
        )
        .await
        .unwrap();

        (scheduler, store, alert_rx, report_rx)
    }

    fn low_accuracy_forecast(start: DateTime<Utc>) -> Forecast {
        let input = Series::new(vec![TimePoint::new(start, 100.0)]);
        let predicted = Series::new(vec![
            TimePoint::new(start + Months::new(1), 200.0),
            TimePoint::new(start + Months::new(2), 210.0),
        ]);
        Forecast {
            id: None,
            title: "Overshooting forecast".to_string(),
            forecast_type: "sales".to_string(),
            model_name: "linear-trend".to_string(),
            input_series: input,
            predicted_series: predicted,
            accuracy_score: None,
            time_horizon: 2,
            status: ForecastStatus::Active,
            created_at: start,
            updated_at: start,
        }
    }

    #[tokio::test]
    async fn test_seeds_default_tasks_when_store_is_empty() {
        let (scheduler, store, _alert_rx, _report_rx) = scheduler_with_sink().await;
        assert_eq!(scheduler.state().tasks.len(), 4);
        assert_eq!(store.load().await.unwrap().len(), 4);
        for task in &scheduler.state().tasks {
            assert_eq!(task.status, TaskStatus::Active);
            assert!(task.config.enabled);
        }
    }

    #[tokio::test]
    async fn test_due_accuracy_task_alerts_below_threshold() {
        let (mut scheduler, store, mut alert_rx, _report_rx) = scheduler_with_sink().await;

        let start = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        let forecast = low_accuracy_forecast(start);
        let id = ForecastStore::create(store.as_ref(), &forecast).await.unwrap();

        // Actual came in far below the prediction: 100 vs 200 -> 50%.
        let correlator = OutcomeCorrelator::new(
            store.clone() as Arc<dyn ForecastStore>,
            store.clone() as Arc<dyn OutcomeStore>,
            EngineConfig::default(),
        );
        correlator
            .record_outcome(id, (start + Months::new(1)).date_naive(), 100.0)
            .await
            .unwrap();

        // Keep only the accuracy task eligible.
        for task_id in ["daily-report", "weekly-summary", "model-evaluation"] {
            scheduler.set_enabled(task_id, false).await.unwrap();
        }

        let far_future = Utc.with_ymd_and_hms(2030, 1, 1, 12, 0, 0).unwrap();
        let results = scheduler.tick(far_future).await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, ExecutionStatus::Success);
        assert_eq!(results[0].alerts_sent, 1);

        let alert = alert_rx.try_recv().unwrap();
        assert_eq!(alert.forecast_id, id);
        assert!(alert.accuracy_pct < 75.0);

        // Accuracy landed on the stored forecast as well.
        let stored = ForecastStore::get(store.as_ref(), id).await.unwrap().unwrap();
        assert!((stored.accuracy_score.unwrap() - 50.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_disable_survives_reload_from_store() {
        let (mut scheduler, store, _alert_rx, _report_rx) = scheduler_with_sink().await;
        scheduler.set_enabled("daily-report", false).await.unwrap();

        // The change landed in the store, not just in memory.
        let persisted = store.load().await.unwrap();
        let task = persisted.iter().find(|t| t.id == "daily-report").unwrap();
        assert!(!task.config.enabled);
        assert_eq!(task.status, TaskStatus::Paused);

        // A scheduler rebuilt over the same store still sees it disabled.
        let (alert_tx, _alert_rx2) = mpsc::channel(16);
        let (report_tx, _report_rx2) = mpsc::channel(16);
        let reloaded = Scheduler::new(
            store.clone() as Arc<dyn ForecastStore>,
            store.clone() as Arc<dyn OutcomeStore>,
            store.clone() as Arc<dyn TaskStore>,
            Arc::new(ChannelSink::new(alert_tx, report_tx)),
            vec![],
            EngineConfig::default(),
        )
        .await
        .unwrap();
        let task = reloaded
            .state()
            .tasks
            .iter()
            .find(|t| t.id == "daily-report")
            .unwrap();
        assert!(!task.config.enabled);
        assert_eq!(task.status, TaskStatus::Paused);
    }

    #[tokio::test]
    async fn test_error_forecast_heals_on_successful_reevaluation() {
        let (mut scheduler, store, _alert_rx, _report_rx) = scheduler_with_sink().await;

        let start = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        let mut forecast = low_accuracy_forecast(start);
        forecast.status = ForecastStatus::Error;
        let id = ForecastStore::create(store.as_ref(), &forecast).await.unwrap();

        for task_id in ["daily-report", "weekly-summary", "model-evaluation"] {
            scheduler.set_enabled(task_id, false).await.unwrap();
        }

        let far_future = Utc.with_ymd_and_hms(2030, 1, 1, 12, 0, 0).unwrap();
        let results = scheduler.tick(far_future).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, ExecutionStatus::Success);

        let stored = ForecastStore::get(store.as_ref(), id).await.unwrap().unwrap();
        assert_eq!(stored.status, ForecastStatus::Active);
    }

    #[tokio::test]
    async fn test_tick_recomputes_next_run_from_now() {
        let (mut scheduler, _store, _alert_rx, mut report_rx) = scheduler_with_sink().await;

        for task_id in ["accuracy-update", "weekly-summary", "model-evaluation"] {
            scheduler.set_enabled(task_id, false).await.unwrap();
        }

        let now = Utc.with_ymd_and_hms(2030, 6, 1, 12, 0, 0).unwrap();
        let results = scheduler.tick(now).await;
        assert_eq!(results.len(), 1);
        assert!(report_rx.try_recv().is_ok());

        let task = scheduler
            .state()
            .tasks
            .iter()
            .find(|t| t.id == "daily-report")
            .unwrap();
        assert_eq!(task.last_run, Some(now));
        // Daily at 08:00, executed at noon: next slot is tomorrow morning,
        // not a backfill of the thousands of missed slots.
        assert_eq!(
            task.next_run,
            Utc.with_ymd_and_hms(2030, 6, 2, 8, 0, 0).unwrap()
        );
        assert_eq!(task.status, TaskStatus::Active);
    }

    #[tokio::test]
    async fn test_sink_failure_degrades_report_to_partial() {
        let store = MemoryStore::new(100);
        // Channel sinks with dropped receivers fail every send.
        let (alert_tx, alert_rx) = mpsc::channel(1);
        let (report_tx, report_rx) = mpsc::channel(1);
        drop(alert_rx);
        drop(report_rx);
        let sink = Arc::new(ChannelSink::new(alert_tx, report_tx));

        let mut scheduler = Scheduler::new(
            store.clone() as Arc<dyn ForecastStore>,
            store.clone() as Arc<dyn OutcomeStore>,
            store.clone() as Arc<dyn TaskStore>,
            sink,
            vec![],
            EngineConfig::default(),
        )
        .await
        .unwrap();

        for task_id in ["accuracy-update", "weekly-summary", "model-evaluation"] {
            scheduler.set_enabled(task_id, false).await.unwrap();
        }

        let now = Utc.with_ymd_and_hms(2030, 6, 1, 12, 0, 0).unwrap();
        let results = scheduler.tick(now).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, ExecutionStatus::Partial);
        assert_eq!(results[0].reports_generated, 0);
        assert!(!results[0].errors.is_empty());

        // Partial is not a task failure.
        let task = scheduler
            .state()
            .tasks
            .iter()
            .find(|t| t.id == "daily-report")
            .unwrap();
        assert_eq!(task.status, TaskStatus::Active);
    }

    #[tokio::test]
    async fn test_execution_history_is_recorded_newest_first() {
        let (mut scheduler, store, _alert_rx, _report_rx) = scheduler_with_sink().await;

        for task_id in ["accuracy-update", "weekly-summary", "model-evaluation"] {
            scheduler.set_enabled(task_id, false).await.unwrap();
        }

        let day1 = Utc.with_ymd_and_hms(2030, 6, 1, 12, 0, 0).unwrap();
        let day2 = Utc.with_ymd_and_hms(2030, 6, 2, 12, 0, 0).unwrap();
        scheduler.tick(day1).await;
        scheduler.tick(day2).await;

        let history = store.history().await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].execution_time, day2);
        assert_eq!(history[1].execution_time, day1);
    }
}
