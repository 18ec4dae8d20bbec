//! Main entry point for the Foresight forecasting engine demo.
//!
//! Wires the engine against a local SQLite store, walks one series through
//! model selection, generation, and outcome tracking, then lets the
//! scheduler take over.

use anyhow::Result;
use chrono::{Months, TimeZone, Utc};
use foresight::engine::{
    generate, rank_models, EngineConfig, Forecast, ForecastStatus, ForecastStore, LogSink,
    ModelRegistry, OutcomeCorrelator, OutcomeStore, RandomNoise, Scheduler, SqliteStore,
    TaskStore,
};
use foresight::types::{Series, SeriesType, TimePoint};
use std::sync::Arc;
use tracing::{info, Level};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    info!("Starting Foresight engine demo");

    let config = EngineConfig::default();
    let store = SqliteStore::new("./forecasts.db", config.history_cap).await?;

    let mut registry = ModelRegistry::new();
    registry.seed();
    info!("Registry seeded with {} models", registry.models().len());

    // Twelve months of steadily growing sales.
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let input = Series::new(
        (0..12)
            .map(|i| TimePoint::new(start + Months::new(i), 100.0 + 10.0 * i as f64))
            .collect(),
    );

    // Model selection step: rank the catalog against the series.
    let ranking = rank_models(registry.models(), &input, Some(SeriesType::Sales), &config);
    for scored in ranking.iter().take(3) {
        info!(
            "Candidate {}: {} ({})",
            scored.model_name,
            scored.score,
            if scored.recommended { "recommended" } else { "viable" }
        );
    }

    let chosen = registry
        .get_by_name(&ranking[0].model_name)
        .expect("ranked model comes from the catalog");

    let mut noise = RandomNoise::from_entropy();
    let predicted = generate(&input, chosen, 6, &config, &mut noise)?;
    info!(
        "Generated {} predicted points with {}",
        predicted.len(),
        chosen.name
    );

    let now = Utc::now();
    let forecast = Forecast {
        id: None,
        title: "Demo sales forecast".to_string(),
        forecast_type: "sales".to_string(),
        model_name: chosen.name.clone(),
        input_series: input,
        predicted_series: predicted.clone(),
        accuracy_score: None,
        time_horizon: 6,
        status: ForecastStatus::Active,
        created_at: now,
        updated_at: now,
    };

    let forecast_store: Arc<dyn ForecastStore> = store.clone();
    let outcome_store: Arc<dyn OutcomeStore> = store.clone();
    let forecast_id = forecast_store.create(&forecast).await?;
    info!("Stored forecast {}", forecast_id);

    // Pretend the first predicted month resolved close to the prediction.
    let correlator = OutcomeCorrelator::new(
        forecast_store.clone(),
        outcome_store,
        config.clone(),
    );
    let first_predicted = predicted.points[0];
    correlator
        .record_outcome(
            forecast_id,
            first_predicted.timestamp.date_naive(),
            first_predicted.value * 0.97,
        )
        .await?;
    if let Some(accuracy) = correlator.compute_accuracy(forecast_id).await? {
        info!("Windowed accuracy after first outcome: {:.1}%", accuracy);
    }

    // Hand off to the scheduler for recurring re-evaluation and reports.
    let scheduler = Scheduler::new(
        forecast_store,
        store.clone(),
        store.clone() as Arc<dyn TaskStore>,
        Arc::new(LogSink),
        vec!["dashboard@example.com".to_string()],
        config,
    )
    .await?;

    let scheduler_handle = tokio::spawn(async move {
        scheduler.run().await;
    });

    // Let a few ticks go by, then shut down the demo.
    tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;
    info!("Demo completed. 'forecasts.db' holds the persisted state.");

    scheduler_handle.abort();

    Ok(())
}
