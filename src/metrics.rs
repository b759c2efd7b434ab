//! Core metrics definitions.
//!
//! All metrics follow Prometheus naming conventions: `_total` for
//! counters, `_seconds` for duration histograms. The embedding daemon
//! installs the recorder; the core only emits through the `metrics` facade.

use metrics::{counter, describe_counter, describe_histogram, histogram};

/// Register all core metrics with descriptions.
pub fn register_core_metrics() {
    describe_counter!(
        "gantry_deploy_total",
        "Total number of replicas planned for deployment (by node)"
    );
    describe_counter!(
        "gantry_deploy_errors_total",
        "Total number of replica launches that failed (by node)"
    );
    describe_histogram!(
        "gantry_container_create_duration_seconds",
        "Time from engine create to persisted metadata for one replica"
    );
}

/// Record how many replicas a node was asked to launch.
pub fn record_deploy_count(nodename: &str, count: usize) {
    counter!("gantry_deploy_total", "node" => nodename.to_string()).increment(count as u64);
}

/// Record a failed replica launch.
pub fn record_deploy_error(nodename: &str) {
    counter!("gantry_deploy_errors_total", "node" => nodename.to_string()).increment(1);
}

/// Record the wall time of one successful replica launch.
pub fn record_create_duration(duration_secs: f64) {
    histogram!("gantry_container_create_duration_seconds").record(duration_secs);
}
