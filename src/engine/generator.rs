//! Prediction generator - produces a forecast continuation for a model.
//!
//! The registry stays descriptive; dispatch happens here over `ModelKind`.
//! A name the dispatch does not recognize falls back to the plain trend
//! projection rather than erroring, so catalog growth never breaks
//! generation.

use crate::engine::error::{EngineError, Result};
use crate::engine::noise::NoiseSource;
use crate::engine::stats::{compute_stats, SeriesStats};
use crate::engine::types::{EngineConfig, ForecastStep, ModelDescriptor, ModelKind};
use crate::types::{Series, TimePoint};
use chrono::{DateTime, Duration, Months, Utc};
use tracing::{debug, instrument};

/// Generate `horizon_periods` predicted points following the input series.
///
/// Output timestamps are strictly after the last input timestamp, advancing
/// by the configured `ForecastStep`. Values are noise-perturbed, clamped to
/// be non-negative, and rounded to 2 decimal places. The input series is
/// never mutated.
///
/// Fails with `InsufficientData` when the input has no points.
#[instrument(skip_all, fields(model = %model.name, horizon = horizon_periods))]
pub fn generate(
    series: &Series,
    model: &ModelDescriptor,
    horizon_periods: u32,
    config: &EngineConfig,
    noise: &mut dyn NoiseSource,
) -> Result<Series> {
    let Some(last) = series.last_point() else {
        return Err(EngineError::InsufficientData {
            required: 1,
            actual: 0,
        });
    };

    let stats = compute_stats(series)?;
    let last_value = last.value;

    // trend_strength_pct compares half-means whose centers sit about N/2
    // steps apart; the per-step growth rate divides by that gap.
    let half_gap = (series.len() as f64 / 2.0).max(1.0);
    let trend = stats.trend_strength_pct / 100.0 / half_gap;

    let kind = model.kind();
    debug!(
        "Generating with {:?}: trend/step {:.4}, mean {:.2}, stddev {:.2}",
        kind, trend, stats.mean, stats.std_dev
    );

    let step = step_duration(series, config);
    let mut points = Vec::with_capacity(horizon_periods as usize);

    for i in 1..=horizon_periods {
        let raw = predicted_value(kind, model, series, &stats, last_value, trend, i, config, noise);

        // Residual noise proportional to the observed spread.
        let perturbed =
            raw + noise.draw(-1.0, 1.0) * stats.std_dev * config.stddev_noise_fraction;
        let value = round2(perturbed.max(0.0));

        points.push(TimePoint::new(advance(last.timestamp, step, i), value));
    }

    Ok(Series::new(points))
}

/// Step descriptor resolved once per generation.
#[derive(Debug, Clone, Copy)]
enum Step {
    Monthly,
    Fixed(Duration),
}

fn step_duration(series: &Series, config: &EngineConfig) -> Step {
    match config.forecast_step {
        ForecastStep::Monthly => Step::Monthly,
        ForecastStep::Inferred => {
            let n = series.len();
            if n >= 2 {
                let spacing =
                    series.points[n - 1].timestamp - series.points[n - 2].timestamp;
                Step::Fixed(spacing)
            } else {
                // A single point gives no spacing to infer from.
                Step::Monthly
            }
        }
    }
}

fn advance(from: DateTime<Utc>, step: Step, periods: u32) -> DateTime<Utc> {
    match step {
        Step::Monthly => from
            .checked_add_months(Months::new(periods))
            .unwrap_or(from + Duration::days(30 * periods as i64)),
        Step::Fixed(spacing) => from + spacing * periods as i32,
    }
}

#[allow(clippy::too_many_arguments)]
fn predicted_value(
    kind: ModelKind,
    model: &ModelDescriptor,
    series: &Series,
    stats: &SeriesStats,
    last_value: f64,
    trend: f64,
    step: u32,
    config: &EngineConfig,
    noise: &mut dyn NoiseSource,
) -> f64 {
    let i = step as f64;
    match kind {
        ModelKind::Trend => last_value + trend * stats.mean * i,

        ModelKind::MovingAverage => {
            let window = model.numeric_param("window", 3.0).max(1.0) as usize;
            let values = series.values();
            let tail = &values[values.len().saturating_sub(window)..];
            let avg = tail.iter().sum::<f64>() / tail.len() as f64;
            avg * (1.0 + trend * i * 0.5)
        }

        ModelKind::Smoothing => {
            let (lo, hi) = config.noise_band;
            last_value * (1.0 + trend).powf(i) * noise.draw(lo, hi)
        }

        ModelKind::Polynomial => {
            // Quadratic in the step index, coefficients tied to the trend
            // and the last observed level.
            let a = last_value * trend * 0.02;
            let b = last_value * trend * 0.6;
            let c = last_value;
            a * i * i + b * i + c
        }

        ModelKind::NonlinearApprox => {
            let activated = (trend * i * 0.3).tanh();
            let squashed = 1.0 / (1.0 + (-activated).exp());
            let blended = last_value * (0.8 + 0.4 * squashed);
            blended + last_value * 0.02 * (i * 0.5).sin()
        }

        ModelKind::Autoregressive => {
            let lag_weight = model.numeric_param("lag_weight", 0.7).clamp(0.0, 1.0);
            lag_weight * last_value + (1.0 - lag_weight) * stats.mean
                + trend * last_value * 0.1 * i
        }

        ModelKind::Ensemble => {
            let trees = model.numeric_param("trees", 5.0).max(1.0) as usize;
            let sum: f64 = (0..trees)
                .map(|_| last_value * (1.0 + trend * i) * noise.draw(0.9, 1.1))
                .sum();
            sum / trees as f64
        }

        ModelKind::Seasonal => {
            let period = model.numeric_param("period", 12.0).max(1.0);
            let seasonal = 1.0 + 0.15 * (2.0 * std::f64::consts::PI * i / period).sin();
            last_value * (1.0 + trend * i) * seasonal
        }

        ModelKind::Default => last_value * (1.0 + trend * i),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::noise::{FlatNoise, RandomNoise};
    use crate::engine::registry::ModelRegistry;
    use chrono::TimeZone;

    fn monthly_series(values: &[f64]) -> Series {
        let points = values
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                TimePoint::new(
                    Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap()
                        + Months::new(i as u32),
                    v,
                )
            })
            .collect();
        Series::new(points)
    }

    fn linear_input() -> Series {
        // 12 monthly points rising by 10 from 100.
        monthly_series(&(0..12).map(|i| 100.0 + 10.0 * i as f64).collect::<Vec<_>>())
    }

    #[test]
    fn test_every_model_honors_the_contract() {
        let mut registry = ModelRegistry::new();
        registry.seed();
        let config = EngineConfig::default();
        let input = linear_input();
        let last_input_ts = input.last_point().unwrap().timestamp;

        for model in registry.models() {
            let mut noise = RandomNoise::new(11);
            let forecast = generate(&input, model, 8, &config, &mut noise).unwrap();
            assert_eq!(forecast.len(), 8, "model {}", model.name);
            assert!(forecast.is_strictly_increasing(), "model {}", model.name);
            assert!(
                forecast.points[0].timestamp > last_input_ts,
                "model {}",
                model.name
            );
            for p in &forecast.points {
                assert!(p.value >= 0.0, "model {} produced {}", model.name, p.value);
            }
        }
    }

    #[test]
    fn test_trend_model_tracks_linear_extrapolation() {
        let mut registry = ModelRegistry::new();
        registry.seed();
        let config = EngineConfig::default();
        let input = linear_input();
        let model = registry.get_by_name("linear-trend").unwrap();

        let mut noise = RandomNoise::new(3);
        let forecast = generate(&input, model, 6, &config, &mut noise).unwrap();

        // Monotone within the noise band: each step adds well above the
        // +-5% stddev perturbation.
        for pair in forecast.points.windows(2) {
            assert!(pair[1].value >= pair[0].value - 4.0);
        }

        // Straight-line extrapolation ends at 210 + 6*10 = 270.
        let straight = 210.0 + 60.0;
        let end = forecast.points.last().unwrap().value;
        assert!(
            (end - straight).abs() <= straight * 0.10,
            "ended at {end}, expected within 10% of {straight}"
        );
    }

    #[test]
    fn test_empty_series_is_rejected() {
        let mut registry = ModelRegistry::new();
        registry.seed();
        let config = EngineConfig::default();
        let model = registry.get_by_name("linear-trend").unwrap();
        let mut noise = FlatNoise;
        let err = generate(&Series::default(), model, 6, &config, &mut noise).unwrap_err();
        assert!(matches!(err, EngineError::InsufficientData { .. }));
    }

    #[test]
    fn test_unrecognized_name_falls_back_to_default_projection() {
        let config = EngineConfig::default();
        let input = linear_input();
        let mut model = {
            let mut registry = ModelRegistry::new();
            registry.seed();
            registry.get_by_name("linear-trend").unwrap().clone()
        };
        model.name = "experimental-variant".to_string();

        let mut noise = FlatNoise;
        let forecast = generate(&input, &model, 3, &config, &mut noise).unwrap();
        assert_eq!(forecast.len(), 3);
        // Default projection grows multiplicatively off the last value.
        assert!(forecast.points[0].value > 200.0);
    }

    #[test]
    fn test_flat_noise_makes_generation_deterministic() {
        let mut registry = ModelRegistry::new();
        registry.seed();
        let config = EngineConfig::default();
        let input = linear_input();
        let model = registry.get_by_name("moving-average").unwrap();

        let mut noise_a = FlatNoise;
        let mut noise_b = FlatNoise;
        let a = generate(&input, model, 5, &config, &mut noise_a).unwrap();
        let b = generate(&input, model, 5, &config, &mut noise_b).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_values_are_rounded_to_two_decimals() {
        let mut registry = ModelRegistry::new();
        registry.seed();
        let config = EngineConfig::default();
        let input = monthly_series(&[3.17, 4.91, 6.23, 7.77, 9.41, 11.03]);
        let model = registry.get_by_name("exponential-smoothing").unwrap();

        let mut noise = RandomNoise::new(99);
        let forecast = generate(&input, model, 4, &config, &mut noise).unwrap();
        for p in &forecast.points {
            assert!((p.value * 100.0 - (p.value * 100.0).round()).abs() < 1e-9);
        }
    }

    #[test]
    fn test_inferred_step_reuses_input_spacing() {
        let mut registry = ModelRegistry::new();
        registry.seed();
        let config = EngineConfig {
            forecast_step: ForecastStep::Inferred,
            ..EngineConfig::default()
        };

        // Weekly spacing.
        let points = (0..6)
            .map(|i| {
                TimePoint::new(
                    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                        + Duration::weeks(i),
                    100.0 + i as f64,
                )
            })
            .collect();
        let input = Series::new(points);

        let model = registry.get_by_name("linear-trend").unwrap();
        let mut noise = FlatNoise;
        let forecast = generate(&input, model, 2, &config, &mut noise).unwrap();

        let last_input_ts = input.last_point().unwrap().timestamp;
        assert_eq!(
            forecast.points[0].timestamp,
            last_input_ts + Duration::weeks(1)
        );
        assert_eq!(
            forecast.points[1].timestamp,
            last_input_ts + Duration::weeks(2)
        );
    }
}
