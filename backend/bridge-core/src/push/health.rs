//! Connection health derived from push delivery outcomes.

use std::fmt::Display;
use std::sync::Arc;

use log::warn;
use serde::Serialize;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionHealth {
    Healthy,
    /// At least one recent delivery failed.
    Degraded,
    /// Failures reached the configured threshold.
    Disconnected,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub status: ConnectionHealth,
    pub delivered: u64,
    pub failed: u64,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
}

impl Default for HealthReport {
    fn default() -> Self {
        Self {
            status: ConnectionHealth::Healthy,
            delivered: 0,
            failed: 0,
            consecutive_failures: 0,
            last_error: None,
        }
    }
}

/// Shared health indicator. Clones observe and update the same report.
#[derive(Clone)]
pub struct HealthMonitor {
    report: Arc<watch::Sender<HealthReport>>,
    failure_threshold: u32,
}

impl HealthMonitor {
    pub fn new(failure_threshold: u32) -> Self {
        let (report, _) = watch::channel(HealthReport::default());
        Self {
            report: Arc::new(report),
            failure_threshold: failure_threshold.max(1),
        }
    }

    pub fn record_success(&self) {
        self.report.send_modify(|report| {
            report.delivered += 1;
            report.consecutive_failures = 0;
            report.status = ConnectionHealth::Healthy;
        });
    }

    pub fn record_failure(&self, error: &impl Display) {
        let threshold = self.failure_threshold;
        self.report.send_modify(|report| {
            report.failed += 1;
            report.consecutive_failures = report.consecutive_failures.saturating_add(1);
            report.last_error = Some(error.to_string());
            report.status = if report.consecutive_failures >= threshold {
                ConnectionHealth::Disconnected
            } else {
                ConnectionHealth::Degraded
            };
        });

        if self.report.borrow().status == ConnectionHealth::Disconnected {
            warn!("Bridge connection marked disconnected: {}", error);
        }
    }

    pub fn current(&self) -> HealthReport {
        self.report.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<HealthReport> {
        self.report.subscribe()
    }
}
