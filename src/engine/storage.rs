//! Storage abstraction layer for the forecasting engine.
//!
//! Formal contracts for forecast, outcome, and task persistence, with a
//! SQLite implementation for production and an in-memory implementation for
//! tests and demos. The engine never talks to a database directly; it only
//! sees these traits.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{sqlite::SqlitePoolOptions, FromRow, Pool, Sqlite};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use crate::engine::types::{
    Forecast, ForecastPatch, Outcome, ScheduledTask, TaskExecutionResult,
};
use crate::types::Series;

/// Persistence contract for stored forecasts.
#[async_trait]
pub trait ForecastStore: Send + Sync {
    async fn list(&self) -> Result<Vec<Forecast>>;

    async fn get(&self, id: i64) -> Result<Option<Forecast>>;

    /// Saves a new forecast and returns its assigned id.
    async fn create(&self, forecast: &Forecast) -> Result<i64>;

    /// Applies a partial update; `None` fields keep their stored value.
    async fn update(&self, id: i64, patch: ForecastPatch) -> Result<()>;
}

/// Persistence contract for recorded outcomes.
#[async_trait]
pub trait OutcomeStore: Send + Sync {
    async fn list(&self) -> Result<Vec<Outcome>>;

    async fn list_for_forecast(&self, forecast_id: i64) -> Result<Vec<Outcome>>;

    /// Saves a new outcome. The backend must reject a second outcome for the
    /// same `(forecast_id, outcome_date)` pair; that constraint is the
    /// atomicity backstop behind the correlator's duplicate check.
    async fn create(&self, outcome: &Outcome) -> Result<i64>;
}

/// Persistence contract for scheduled tasks and their execution history.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn load(&self) -> Result<Vec<ScheduledTask>>;

    async fn save(&self, tasks: &[ScheduledTask]) -> Result<()>;

    /// Appends an execution result, trimming the history to the cap.
    async fn append_history(&self, result: &TaskExecutionResult) -> Result<()>;

    /// Execution history, newest first.
    async fn history(&self) -> Result<Vec<TaskExecutionResult>>;
}

// ---------------------------------------------------------------------------
// SQLite implementation
// ---------------------------------------------------------------------------

/// Helper type for deserializing forecasts from SQLite.
#[derive(FromRow)]
struct ForecastRow {
    id: i64,
    title: String,
    forecast_type: String,
    model_name: String,
    input_series: String,     // JSON
    predicted_series: String, // JSON
    accuracy_score: Option<f64>,
    time_horizon: i64,
    status: String, // Enum serialized to string
    created_at: String,
    updated_at: String,
}

#[derive(FromRow)]
struct OutcomeRow {
    id: i64,
    forecast_id: i64,
    outcome_date: String,
    actual_value: f64,
    recorded_at: String,
}

/// SQLite implementation of all three store contracts.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
    history_cap: usize,
}

impl SqliteStore {
    /// Connects to (or creates) the database file and ensures the schema.
    pub async fn new(db_path: &str, history_cap: usize) -> Result<Arc<Self>> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&format!("sqlite:{}?mode=rwc", db_path))
            .await
            .context("Failed to connect to SQLite database")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS forecasts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                forecast_type TEXT NOT NULL,
                model_name TEXT NOT NULL,
                input_series TEXT NOT NULL,
                predicted_series TEXT NOT NULL,
                accuracy_score REAL,
                time_horizon INTEGER NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&pool)
        .await
        .context("Failed to create forecasts table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS outcomes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                forecast_id INTEGER NOT NULL,
                outcome_date TEXT NOT NULL,
                actual_value REAL NOT NULL,
                recorded_at TEXT NOT NULL,
                UNIQUE (forecast_id, outcome_date),
                FOREIGN KEY (forecast_id) REFERENCES forecasts (id)
            );
            "#,
        )
        .execute(&pool)
        .await
        .context("Failed to create outcomes table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                body TEXT NOT NULL
            );
            "#,
        )
        .execute(&pool)
        .await
        .context("Failed to create tasks table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS task_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                body TEXT NOT NULL
            );
            "#,
        )
        .execute(&pool)
        .await
        .context("Failed to create task_history table")?;

        info!("SqliteStore initialized at {}", db_path);

        Ok(Arc::new(Self { pool, history_cap }))
    }

    fn row_to_forecast(&self, row: ForecastRow) -> Result<Forecast> {
        Ok(Forecast {
            id: Some(row.id),
            title: row.title,
            forecast_type: row.forecast_type,
            model_name: row.model_name,
            input_series: serde_json::from_str::<Series>(&row.input_series)?,
            predicted_series: serde_json::from_str::<Series>(&row.predicted_series)?,
            accuracy_score: row.accuracy_score,
            time_horizon: row.time_horizon as u32,
            status: serde_json::from_str(&row.status)?,
            created_at: parse_ts(&row.created_at)?,
            updated_at: parse_ts(&row.updated_at)?,
        })
    }

    fn row_to_outcome(&self, row: OutcomeRow) -> Result<Outcome> {
        Ok(Outcome {
            id: Some(row.id),
            forecast_id: row.forecast_id,
            outcome_date: row
                .outcome_date
                .parse::<NaiveDate>()
                .context("Invalid outcome_date in store")?,
            actual_value: row.actual_value,
            recorded_at: parse_ts(&row.recorded_at)?,
        })
    }
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .context("Invalid timestamp in store")?
        .with_timezone(&Utc))
}

#[async_trait]
impl ForecastStore for SqliteStore {
    async fn list(&self) -> Result<Vec<Forecast>> {
        let rows: Vec<ForecastRow> =
            sqlx::query_as("SELECT * FROM forecasts ORDER BY created_at ASC")
                .fetch_all(&self.pool)
                .await
                .context("Failed to fetch forecasts")?;

        rows.into_iter().map(|r| self.row_to_forecast(r)).collect()
    }

    async fn get(&self, id: i64) -> Result<Option<Forecast>> {
        let row: Option<ForecastRow> = sqlx::query_as("SELECT * FROM forecasts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch forecast by id")?;

        match row {
            Some(row) => Ok(Some(self.row_to_forecast(row)?)),
            None => Ok(None),
        }
    }

    async fn create(&self, forecast: &Forecast) -> Result<i64> {
        debug!("Inserting forecast '{}'", forecast.title);

        let result = sqlx::query(
            r#"
            INSERT INTO forecasts (
                title, forecast_type, model_name, input_series, predicted_series,
                accuracy_score, time_horizon, status, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?);
            "#,
        )
        .bind(&forecast.title)
        .bind(&forecast.forecast_type)
        .bind(&forecast.model_name)
        .bind(serde_json::to_string(&forecast.input_series)?)
        .bind(serde_json::to_string(&forecast.predicted_series)?)
        .bind(forecast.accuracy_score)
        .bind(forecast.time_horizon as i64)
        .bind(serde_json::to_string(&forecast.status)?)
        .bind(forecast.created_at.to_rfc3339())
        .bind(forecast.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to insert forecast")?;

        Ok(result.last_insert_rowid())
    }

    async fn update(&self, id: i64, patch: ForecastPatch) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE forecasts
            SET
                accuracy_score = COALESCE(?, accuracy_score),
                status = COALESCE(?, status),
                updated_at = COALESCE(?, updated_at)
            WHERE id = ?;
            "#,
        )
        .bind(patch.accuracy_score)
        .bind(match patch.status {
            Some(status) => Some(serde_json::to_string(&status)?),
            None => None,
        })
        .bind(patch.updated_at.map(|t| t.to_rfc3339()))
        .bind(id)
        .execute(&self.pool)
        .await
        .context(format!("Failed to update forecast {}", id))?;

        Ok(())
    }
}

#[async_trait]
impl OutcomeStore for SqliteStore {
    async fn list(&self) -> Result<Vec<Outcome>> {
        let rows: Vec<OutcomeRow> =
            sqlx::query_as("SELECT * FROM outcomes ORDER BY recorded_at ASC")
                .fetch_all(&self.pool)
                .await
                .context("Failed to fetch outcomes")?;

        rows.into_iter().map(|r| self.row_to_outcome(r)).collect()
    }

    async fn list_for_forecast(&self, forecast_id: i64) -> Result<Vec<Outcome>> {
        let rows: Vec<OutcomeRow> = sqlx::query_as(
            "SELECT * FROM outcomes WHERE forecast_id = ? ORDER BY recorded_at ASC",
        )
        .bind(forecast_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch outcomes for forecast")?;

        rows.into_iter().map(|r| self.row_to_outcome(r)).collect()
    }

    async fn create(&self, outcome: &Outcome) -> Result<i64> {
        debug!(
            "Recording outcome for forecast {} on {}",
            outcome.forecast_id, outcome.outcome_date
        );

        let result = sqlx::query(
            r#"
            INSERT INTO outcomes (forecast_id, outcome_date, actual_value, recorded_at)
            VALUES (?, ?, ?, ?);
            "#,
        )
        .bind(outcome.forecast_id)
        .bind(outcome.outcome_date.to_string())
        .bind(outcome.actual_value)
        .bind(outcome.recorded_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to insert outcome")?;

        Ok(result.last_insert_rowid())
    }
}

#[async_trait]
impl TaskStore for SqliteStore {
    async fn load(&self) -> Result<Vec<ScheduledTask>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT body FROM tasks ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch tasks")?;

        rows.into_iter()
            .map(|(body,)| serde_json::from_str(&body).context("Invalid task body in store"))
            .collect()
    }

    async fn save(&self, tasks: &[ScheduledTask]) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        for task in tasks {
            sqlx::query(
                r#"
                INSERT INTO tasks (id, body) VALUES (?, ?)
                ON CONFLICT (id) DO UPDATE SET body = excluded.body;
                "#,
            )
            .bind(&task.id)
            .bind(serde_json::to_string(task)?)
            .execute(&mut *tx)
            .await
            .context("Failed to save task")?;
        }

        tx.commit().await.context("Failed to commit task save")?;
        Ok(())
    }

    async fn append_history(&self, result: &TaskExecutionResult) -> Result<()> {
        sqlx::query("INSERT INTO task_history (body) VALUES (?)")
            .bind(serde_json::to_string(result)?)
            .execute(&self.pool)
            .await
            .context("Failed to append task history")?;

        // Keep only the newest entries.
        sqlx::query(
            r#"
            DELETE FROM task_history
            WHERE id NOT IN (SELECT id FROM task_history ORDER BY id DESC LIMIT ?);
            "#,
        )
        .bind(self.history_cap as i64)
        .execute(&self.pool)
        .await
        .context("Failed to trim task history")?;

        Ok(())
    }

    async fn history(&self) -> Result<Vec<TaskExecutionResult>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT body FROM task_history ORDER BY id DESC")
                .fetch_all(&self.pool)
                .await
                .context("Failed to fetch task history")?;

        rows.into_iter()
            .map(|(body,)| serde_json::from_str(&body).context("Invalid history body in store"))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemoryInner {
    forecasts: Vec<Forecast>,
    outcomes: Vec<Outcome>,
    tasks: Vec<ScheduledTask>,
    history: Vec<TaskExecutionResult>,
    next_forecast_id: i64,
    next_outcome_id: i64,
}

/// In-memory implementation of all three store contracts, for tests and the
/// demo binary. Enforces the same `(forecast_id, outcome_date)` uniqueness
/// the SQLite schema does.
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
    history_cap: usize,
}

impl MemoryStore {
    pub fn new(history_cap: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(MemoryInner {
                next_forecast_id: 1,
                next_outcome_id: 1,
                ..MemoryInner::default()
            }),
            history_cap,
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ForecastStore for MemoryStore {
    async fn list(&self) -> Result<Vec<Forecast>> {
        Ok(self.lock().forecasts.clone())
    }

    async fn get(&self, id: i64) -> Result<Option<Forecast>> {
        Ok(self.lock().forecasts.iter().find(|f| f.id == Some(id)).cloned())
    }

    async fn create(&self, forecast: &Forecast) -> Result<i64> {
        let mut inner = self.lock();
        let id = inner.next_forecast_id;
        inner.next_forecast_id += 1;

        let mut stored = forecast.clone();
        stored.id = Some(id);
        inner.forecasts.push(stored);
        Ok(id)
    }

    async fn update(&self, id: i64, patch: ForecastPatch) -> Result<()> {
        let mut inner = self.lock();
        let forecast = inner
            .forecasts
            .iter_mut()
            .find(|f| f.id == Some(id))
            .ok_or_else(|| anyhow!("forecast {} not found", id))?;

        if let Some(score) = patch.accuracy_score {
            forecast.accuracy_score = Some(score);
        }
        if let Some(status) = patch.status {
            forecast.status = status;
        }
        if let Some(updated_at) = patch.updated_at {
            forecast.updated_at = updated_at;
        }
        Ok(())
    }
}

#[async_trait]
impl OutcomeStore for MemoryStore {
    async fn list(&self) -> Result<Vec<Outcome>> {
        Ok(self.lock().outcomes.clone())
    }

    async fn list_for_forecast(&self, forecast_id: i64) -> Result<Vec<Outcome>> {
        Ok(self
            .lock()
            .outcomes
            .iter()
            .filter(|o| o.forecast_id == forecast_id)
            .cloned()
            .collect())
    }

    async fn create(&self, outcome: &Outcome) -> Result<i64> {
        let mut inner = self.lock();
        if inner.outcomes.iter().any(|o| {
            o.forecast_id == outcome.forecast_id && o.outcome_date == outcome.outcome_date
        }) {
            return Err(anyhow!(
                "unique constraint violated: ({}, {})",
                outcome.forecast_id,
                outcome.outcome_date
            ));
        }

        let id = inner.next_outcome_id;
        inner.next_outcome_id += 1;

        let mut stored = outcome.clone();
        stored.id = Some(id);
        inner.outcomes.push(stored);
        Ok(id)
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn load(&self) -> Result<Vec<ScheduledTask>> {
        Ok(self.lock().tasks.clone())
    }

    async fn save(&self, tasks: &[ScheduledTask]) -> Result<()> {
        self.lock().tasks = tasks.to_vec();
        Ok(())
    }

    async fn append_history(&self, result: &TaskExecutionResult) -> Result<()> {
        let mut inner = self.lock();
        inner.history.insert(0, result.clone());
        inner.history.truncate(self.history_cap);
        Ok(())
    }

    async fn history(&self) -> Result<Vec<TaskExecutionResult>> {
        Ok(self.lock().history.clone())
    }
}
