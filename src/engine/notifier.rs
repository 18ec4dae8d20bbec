//! Notification sinks - where alerts and reports leave the engine.
//!
//! Delivery transport is outside the core; the scheduler only sees this
//! trait. Sink calls are wrapped in a bounded timeout at the call site so a
//! non-responding sink can never stall a tick.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::engine::types::{AccuracyAlert, ReportPayload};

/// Outbound contract for alerting and reporting.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver a low-accuracy alert for one forecast.
    async fn send_alert(&self, alert: &AccuracyAlert) -> Result<()>;

    /// Deliver an aggregated report to the given recipients.
    async fn send_report(&self, payload: &ReportPayload, recipients: &[String]) -> Result<()>;
}

/// Sink that writes notifications to the log. The default in the demo
/// binary, and a reasonable fallback when no transport is wired up.
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn send_alert(&self, alert: &AccuracyAlert) -> Result<()> {
        warn!(
            "Accuracy alert: forecast '{}' (id {}) at {:.1}% (threshold {:.1}%)",
            alert.forecast_title, alert.forecast_id, alert.accuracy_pct, alert.threshold_pct
        );
        Ok(())
    }

    async fn send_report(&self, payload: &ReportPayload, recipients: &[String]) -> Result<()> {
        info!(
            "Report {:?} for {} recipient(s): {}",
            payload.task_type,
            recipients.len(),
            payload.summary
        );
        Ok(())
    }
}

/// Sink that forwards notifications over mpsc channels, so tests can assert
/// exactly what the scheduler emitted.
pub struct ChannelSink {
    alerts: mpsc::Sender<AccuracyAlert>,
    reports: mpsc::Sender<ReportPayload>,
}

impl ChannelSink {
    pub fn new(
        alerts: mpsc::Sender<AccuracyAlert>,
        reports: mpsc::Sender<ReportPayload>,
    ) -> Self {
        Self { alerts, reports }
    }
}

#[async_trait]
impl NotificationSink for ChannelSink {
    async fn send_alert(&self, alert: &AccuracyAlert) -> Result<()> {
        self.alerts
            .send(alert.clone())
            .await
            .map_err(|e| anyhow!("alert channel closed: {}", e))
    }

    async fn send_report(&self, payload: &ReportPayload, _recipients: &[String]) -> Result<()> {
        self.reports
            .send(payload.clone())
            .await
            .map_err(|e| anyhow!("report channel closed: {}", e))
    }
}
