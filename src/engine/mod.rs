//! Forecast computation & monitoring engine.
//!
//! The registry describes models, the scorer ranks them against a series,
//! the generator produces the predicted continuation, the correlator tracks
//! accuracy as actuals arrive, and the scheduler re-evaluates and reports on
//! a timer. Persistence and notification transports stay behind the traits
//! in `storage` and `notifier`.

pub mod correlator;
pub mod error;
pub mod generator;
pub mod noise;
pub mod notifier;
pub mod registry;
pub mod scheduler;
pub mod scorer;
pub mod stats;
pub mod storage;
pub mod types;

// Re-export main types
pub use types::{
    AccuracyAlert, Complexity, EngineConfig, ExecutionStatus, Forecast, ForecastPatch,
    ForecastStatus, ForecastStep, Frequency, ModelCategory, ModelDescriptor, ModelKind,
    Outcome, ParamValue, PendingOutcome, PendingPriority, ReportPayload, ScheduledTask,
    TaskExecutionResult, TaskScheduleConfig, TaskStatus, TaskType,
};

// Re-export key components
pub use correlator::OutcomeCorrelator;
pub use error::{EngineError, Result};
pub use generator::generate;
pub use noise::{FlatNoise, NoiseSource, RandomNoise};
pub use notifier::{ChannelSink, LogSink, NotificationSink};
pub use registry::ModelRegistry;
pub use scheduler::{compute_next_run, default_tasks, Scheduler, SchedulerState};
pub use scorer::{rank_models, score_model, ModelScore};
pub use stats::{compute_stats, SeriesStats};
pub use storage::{ForecastStore, MemoryStore, OutcomeStore, SqliteStore, TaskStore};
