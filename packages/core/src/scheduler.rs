//! Rule evaluation scheduler.
//!
//! Drives the two periodic passes: the overdue check on a short interval
//! and the calibration check on a long one. A failed pass is logged and
//! counted; the loop carries on with the next tick.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};

use crate::metrics::AppMetrics;
use crate::rules::RulesEngine;

/// Intervals for the two passes.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub overdue_interval: Duration,
    pub calibration_interval: Duration,
}

/// Run both rule passes until `shutdown` flips to `true` or its sender
/// is dropped.
///
/// Both intervals fire immediately on start. When both are due at once
/// the calibration pass runs first so a freshly expired asset is already
/// suspended when the overdue pass looks at it.
pub async fn run_rules_scheduler(
    engine: RulesEngine,
    metrics: Arc<AppMetrics>,
    config: SchedulerConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut overdue = time::interval(config.overdue_interval);
    let mut calibration = time::interval(config.calibration_interval);
    overdue.set_missed_tick_behavior(MissedTickBehavior::Delay);
    calibration.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(
        "Rules scheduler started (overdue: {}s, calibration: {}s)",
        config.overdue_interval.as_secs(),
        config.calibration_interval.as_secs()
    );

    loop {
        tokio::select! {
            biased;

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    tracing::info!("Shutdown signal received. Stopping rules scheduler.");
                    break;
                }
            }

            _ = calibration.tick() => {
                tick_calibration(&engine, &metrics).await;
            }

            _ = overdue.tick() => {
                tick_overdue(&engine, &metrics).await;
            }
        }
    }

    tracing::info!("Rules scheduler stopped cleanly");
}

/// Run one overdue pass. Extracted for testability.
async fn tick_overdue(engine: &RulesEngine, metrics: &AppMetrics) {
    match engine.run_overdue_check().await {
        Ok(summary) => metrics.record_overdue_pass(&summary),
        Err(err) => {
            metrics
                .rule_check_errors_total
                .with_label_values(&["overdue"])
                .inc();
            tracing::error!("Overdue check failed, retrying next tick: {}", err);
        }
    }
}

/// Run one calibration pass. Extracted for testability.
async fn tick_calibration(engine: &RulesEngine, metrics: &AppMetrics) {
    match engine.run_calibration_check().await {
        Ok(summary) => metrics.record_calibration_pass(&summary),
        Err(err) => {
            metrics
                .rule_check_errors_total
                .with_label_values(&["calibration"])
                .inc();
            tracing::error!("Calibration check failed, retrying next tick: {}", err);
        }
    }
}
