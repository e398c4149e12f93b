//! Prometheus metrics recorder and counter name constants.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics`
/// endpoint. Must be called once at server startup before any metrics
/// are recorded.
pub fn install_recorder() -> PrometheusHandle {
    let builder = PrometheusBuilder::new();
    let handle = builder
        .install_recorder()
        .expect("failed to install metrics recorder");
    info!("prometheus metrics recorder installed");
    handle
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

// Metric name constants to avoid typos across modules.

/// Admission attempts total (counter).
pub const LISTENERS_TOTAL: &str = "listeners_total";
/// Admissions rejected before upgrade (counter).
pub const LISTENERS_REJECTED_TOTAL: &str = "listeners_rejected_total";
/// Subscribers admitted and registered (counter).
pub const LISTENERS_APPROVED_TOTAL: &str = "listeners_approved_total";
/// Subscribers removed on connection close (counter).
pub const LISTENERS_REMOVED_TOTAL: &str = "listeners_removed_total";
/// Records relayed with their original payload (counter).
pub const LOGS_TRANSFERRED_TOTAL: &str = "logs_transferred_total";
/// Records withheld and replaced by a denial payload (counter).
pub const LOGS_FILTERED_TOTAL: &str = "logs_filtered_total";
/// Bytes of original payload relayed (counter).
pub const BYTES_TRANSFERRED_TOTAL: &str = "bytes_transferred_total";
/// Bytes of original payload withheld (counter).
pub const BYTES_FILTERED_TOTAL: &str = "bytes_filtered_total";
/// Records dropped because a subscriber's send queue was full (counter).
pub const SEND_QUEUE_DROPS_TOTAL: &str = "send_queue_drops_total";
