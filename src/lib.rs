//! Foresight - forecast computation & monitoring engine
//!
//! This crate provides the model registry, compatibility scoring, prediction
//! generation, outcome correlation, and task scheduling behind a forecasting
//! dashboard. Rendering, export, and authentication are external callers.

pub mod engine;
pub mod types;

// Re-export main types for convenience
pub use types::{Series, SeriesType, TimePoint};
