// SPDX-License-Identifier: Apache-2.0

//! Prometheus metrics for the machine-controller.
//!
//! All metrics carry the namespace prefix `machine_controller` and are exposed via the
//! `/metrics` HTTP endpoint started in `main`.
//!
//! # Metrics Categories
//!
//! - **Reconciliation Metrics** - reconciliation counts and durations, per resource kind
//! - **Provider Metrics** - cloud API call counts and durations, per provider and operation
//! - **Machine Lifecycle Metrics** - instance creation/deletion counts
//! - **Leader Election Metrics** - leadership state changes
//!
//! # Example
//!
//! ```rust,no_run
//! use machine_controller::metrics::record_reconciliation_success;
//!
//! record_reconciliation_success("Machine", std::time::Duration::from_millis(50));
//! ```

use prometheus::{
    CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;

const METRICS_NAMESPACE: &str = "machine_controller";

/// Global Prometheus metrics registry, exposed via `/metrics`.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Reconciliation Metrics
// ============================================================================

/// Total number of reconciliations by resource kind and outcome.
///
/// Labels: `resource_type` (`Machine`, `MachineSet`, `MachineDeployment`), `status`
/// (`success`, `error`, `requeue`).
pub static RECONCILIATION_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_reconciliations_total"),
        "Total number of reconciliations by resource type and status",
    );
    let counter = CounterVec::new(opts, &["resource_type", "status"]).unwrap();
    METRICS_REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

/// Duration of reconciliations in seconds, by resource kind.
pub static RECONCILIATION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_reconciliation_duration_seconds"),
        "Duration of reconciliations in seconds by resource type",
    )
    .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]);
    let histogram = HistogramVec::new(opts, &["resource_type"]).unwrap();
    METRICS_REGISTRY.register(Box::new(histogram.clone())).unwrap();
    histogram
});

/// Total number of requeue operations, by resource kind and reason.
pub static REQUEUE_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_requeues_total"),
        "Total number of requeue operations by resource type and reason",
    );
    let counter = CounterVec::new(opts, &["resource_type", "reason"]).unwrap();
    METRICS_REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

// ============================================================================
// Machine Lifecycle Metrics
// ============================================================================

/// Total number of cloud instances created, by provider name.
pub static INSTANCES_CREATED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_instances_created_total"),
        "Total number of cloud instances created by provider",
    );
    let counter = CounterVec::new(opts, &["provider"]).unwrap();
    METRICS_REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

/// Total number of cloud instances deleted, by provider name.
pub static INSTANCES_DELETED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_instances_deleted_total"),
        "Total number of cloud instances deleted by provider",
    );
    let counter = CounterVec::new(opts, &["provider"]).unwrap();
    METRICS_REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

/// Number of Machines currently in a terminal error state, by provider.
pub static MACHINES_ERRORED: LazyLock<GaugeVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_machines_errored"),
        "Number of Machines currently carrying a terminal error, by provider",
    );
    let gauge = GaugeVec::new(opts, &["provider"]).unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

// ============================================================================
// Provider Metrics
// ============================================================================

/// Total number of cloud provider API calls, by provider, operation, and outcome.
///
/// Labels: `provider`, `operation` (`create`, `get`, `cleanup`, `validate`, `migrate_uid`),
/// `status` (`success`, `error`).
pub static PROVIDER_CALLS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_provider_calls_total"),
        "Total number of cloud provider API calls by provider, operation, and status",
    );
    let counter = CounterVec::new(opts, &["provider", "operation", "status"]).unwrap();
    METRICS_REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

/// Duration of cloud provider API calls in seconds, by provider and operation.
pub static PROVIDER_CALL_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_provider_call_duration_seconds"),
        "Duration of cloud provider API calls in seconds by provider and operation",
    )
    .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0]);
    let histogram = HistogramVec::new(opts, &["provider", "operation"]).unwrap();
    METRICS_REGISTRY.register(Box::new(histogram.clone())).unwrap();
    histogram
});

// ============================================================================
// Leader Election Metrics
// ============================================================================

/// Total number of leader election events, by status (`acquired`, `lost`, `renewed`).
pub static LEADER_ELECTIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_leader_elections_total"),
        "Total number of leader election events by status",
    );
    let counter = CounterVec::new(opts, &["status"]).unwrap();
    METRICS_REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

/// Current leader election status for this pod; 1 if leader, 0 if follower.
pub static LEADER_STATUS: LazyLock<GaugeVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_leader_status"),
        "Current leader election status (1 = leader, 0 = follower)",
    );
    let gauge = GaugeVec::new(opts, &["pod_name"]).unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record a successful reconciliation.
pub fn record_reconciliation_success(resource_type: &str, duration: Duration) {
    RECONCILIATION_TOTAL.with_label_values(&[resource_type, "success"]).inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[resource_type])
        .observe(duration.as_secs_f64());
}

/// Record a failed reconciliation.
pub fn record_reconciliation_error(resource_type: &str, duration: Duration) {
    RECONCILIATION_TOTAL.with_label_values(&[resource_type, "error"]).inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[resource_type])
        .observe(duration.as_secs_f64());
}

/// Record a reconciliation requeue.
pub fn record_reconciliation_requeue(resource_type: &str, reason: &str) {
    RECONCILIATION_TOTAL.with_label_values(&[resource_type, "requeue"]).inc();
    REQUEUE_TOTAL.with_label_values(&[resource_type, reason]).inc();
}

/// Record a cloud instance creation.
pub fn record_instance_created(provider: &str) {
    INSTANCES_CREATED_TOTAL.with_label_values(&[provider]).inc();
}

/// Record a cloud instance deletion.
pub fn record_instance_deleted(provider: &str) {
    INSTANCES_DELETED_TOTAL.with_label_values(&[provider]).inc();
}

/// Record a cloud provider API call and its duration.
pub fn record_provider_call(provider: &str, operation: &str, success: bool, duration: Duration) {
    let status = if success { "success" } else { "error" };
    PROVIDER_CALLS_TOTAL.with_label_values(&[provider, operation, status]).inc();
    PROVIDER_CALL_DURATION_SECONDS
        .with_label_values(&[provider, operation])
        .observe(duration.as_secs_f64());
}

/// Record leader election acquired.
pub fn record_leader_elected(pod_name: &str) {
    LEADER_ELECTIONS_TOTAL.with_label_values(&["acquired"]).inc();
    LEADER_STATUS.with_label_values(&[pod_name]).set(1.0);
}

/// Record leader election lost.
pub fn record_leader_lost(pod_name: &str) {
    LEADER_ELECTIONS_TOTAL.with_label_values(&["lost"]).inc();
    LEADER_STATUS.with_label_values(&[pod_name]).set(0.0);
}

/// Gather and encode all metrics in Prometheus text format.
///
/// # Errors
///
/// Returns an error if encoding the registry fails.
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_reconciliation_success_updates_counter_and_histogram() {
        record_reconciliation_success("MachineTest", Duration::from_millis(50));
        let counter = RECONCILIATION_TOTAL.with_label_values(&["MachineTest", "success"]);
        assert!(counter.get() > 0.0);
        let histogram = RECONCILIATION_DURATION_SECONDS.with_label_values(&["MachineTest"]);
        assert!(histogram.get_sample_count() > 0);
    }

    #[test]
    fn record_provider_call_updates_counter() {
        record_provider_call("fake", "create", true, Duration::from_millis(10));
        let counter = PROVIDER_CALLS_TOTAL.with_label_values(&["fake", "create", "success"]);
        assert!(counter.get() > 0.0);
    }

    #[test]
    fn gather_metrics_includes_namespace() {
        record_reconciliation_success("GatherTest", Duration::from_millis(10));
        let text = gather_metrics().expect("metrics gather should succeed");
        assert!(text.contains("machine_controller"));
        assert!(text.contains("reconciliations_total"));
    }
}
