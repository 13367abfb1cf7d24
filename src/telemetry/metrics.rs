//! Prometheus metrics setup and metric definitions

use crate::domain::AuditAction;
use crate::error::ErrorKind;
use anyhow::{Context, Result};
use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub const TRANSITIONS_TOTAL: &str = "encounter_transitions_total";
pub const SERVICE_ERRORS_TOTAL: &str = "encounter_service_errors_total";

/// Install the Prometheus recorder and return a handle for rendering metrics.
pub fn install_prometheus_recorder() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus recorder")
}

/// Register metric descriptions and emit initial zero values so Prometheus output
/// includes HELP/TYPE lines for all metrics from startup (not just after first use).
pub fn describe_metrics() {
    describe_counter!(
        TRANSITIONS_TOTAL,
        "Committed and audited encounter mutations by action"
    );
    describe_counter!(
        SERVICE_ERRORS_TOTAL,
        "Encounter service failures by error kind"
    );

    counter!(TRANSITIONS_TOTAL, "action" => AuditAction::EncounterCreated.as_str()).absolute(0);
    for kind in ErrorKind::ALL {
        counter!(SERVICE_ERRORS_TOTAL, "kind" => kind.as_str()).absolute(0);
    }
}

pub fn record_transition(action: AuditAction) {
    counter!(TRANSITIONS_TOTAL, "action" => action.as_str()).increment(1);
}

pub fn record_error(kind: ErrorKind) {
    counter!(SERVICE_ERRORS_TOTAL, "kind" => kind.as_str()).increment(1);
}
