//! User-facing alerts.
//!
//! The engine reports noteworthy outcomes (a listing arrived in real time, a
//! mutation failed, the live channel gave up) through an [`AlertSink`]. How
//! they reach the user is up to the embedder.

use parking_lot::Mutex;
use propsync_types::EventEnvelope;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Success => "success",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// Receives alerts.
pub trait AlertSink: Send + Sync {
    fn alert(&self, severity: Severity, message: &str);

    fn success(&self, message: &str) {
        self.alert(Severity::Success, message);
    }

    fn info(&self, message: &str) {
        self.alert(Severity::Info, message);
    }

    fn warning(&self, message: &str) {
        self.alert(Severity::Warning, message);
    }

    fn error(&self, message: &str) {
        self.alert(Severity::Error, message);
    }
}

/// Writes alerts to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAlertSink;

impl AlertSink for TracingAlertSink {
    fn alert(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Success | Severity::Info => info!(%severity, "{message}"),
            Severity::Warning => warn!(%severity, "{message}"),
            Severity::Error => error!(%severity, "{message}"),
        }
    }
}

/// One recorded alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub severity: Severity,
    pub message: String,
}

/// Keeps every alert in memory, oldest first.
#[derive(Debug, Default)]
pub struct RecordingAlertSink {
    alerts: Mutex<Vec<Alert>>,
}

impl RecordingAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of everything recorded so far.
    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().clone()
    }

    /// Drains the recorded alerts.
    pub fn take(&self) -> Vec<Alert> {
        std::mem::take(&mut *self.alerts.lock())
    }

    /// Number of recorded alerts with the given severity.
    pub fn count(&self, severity: Severity) -> usize {
        self.alerts
            .lock()
            .iter()
            .filter(|a| a.severity == severity)
            .count()
    }
}

impl AlertSink for RecordingAlertSink {
    fn alert(&self, severity: Severity, message: &str) {
        self.alerts.lock().push(Alert {
            severity,
            message: message.to_string(),
        });
    }
}

/// The alert a real-time notification should raise, if any.
pub fn realtime_alert(envelope: &EventEnvelope) -> Option<(Severity, String)> {
    match envelope {
        EventEnvelope::Connection { .. } => None,
        EventEnvelope::PropertyCreated(p) => Some((
            Severity::Success,
            format!("New property \"{}\" added in real-time", p.name),
        )),
        EventEnvelope::PropertyUpdated(p) => Some((
            Severity::Info,
            format!("Property \"{}\" updated in real-time", p.name),
        )),
        EventEnvelope::PropertyDeleted(p) => Some((
            Severity::Warning,
            format!("Property \"{}\" was removed", p.name),
        )),
    }
}
