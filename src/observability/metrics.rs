//! Metrics collection.
//!
//! Prometheus-compatible metrics with typed convenience functions for
//! recording enforcement activity.

use std::sync::atomic::{AtomicBool, Ordering};

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::FenceWatchError;

/// Guard to prevent double-initialization of the metrics recorder.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initializes the global metrics recorder.
///
/// When `port` is `Some`, a Prometheus HTTP listener is started on
/// `127.0.0.1:<port>`. When `None`, the recorder is installed without an
/// HTTP endpoint (metrics are recorded internally and can be read
/// programmatically).
///
/// # Errors
///
/// Returns `FenceWatchError::Io` if the recorder or HTTP listener cannot
/// be installed (e.g. port already in use).
pub fn init_metrics(port: Option<u16>) -> Result<(), FenceWatchError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(());
    }
    port.map_or_else(
        || PrometheusBuilder::new().install_recorder().map(|_| ()),
        |p| {
            PrometheusBuilder::new()
                .with_http_listener(([127, 0, 0, 1], p))
                .install()
        },
    )
    .map_err(|e| FenceWatchError::Io(std::io::Error::other(e.to_string())))?;

    describe_metrics();
    Ok(())
}

/// Registers metric descriptions with the global recorder.
fn describe_metrics() {
    describe_counter!(
        "fencewatch_warnings_total",
        "Warning messages sent to players found outside a fence"
    );
    describe_counter!(
        "fencewatch_punishments_total",
        "Punishments issued to players that stayed outside a fence"
    );
    describe_counter!(
        "fencewatch_restart_requests_total",
        "Restart requests raised by workers"
    );
    describe_counter!(
        "fencewatch_rcon_errors_total",
        "RCON operations that returned an error"
    );
    describe_gauge!(
        "fencewatch_players_outside",
        "Players currently tracked as outside their team's fences"
    );
}

/// Records a warning message sent to a player.
pub fn record_warning() {
    counter!("fencewatch_warnings_total").increment(1);
}

/// Records an issued punishment.
pub fn record_punishment() {
    counter!("fencewatch_punishments_total").increment(1);
}

/// Records a restart request with its originating reason.
pub fn record_restart_request(reason: &'static str) {
    counter!("fencewatch_restart_requests_total", "reason" => reason).increment(1);
}

/// Records a failed RCON operation.
pub fn record_rcon_error(operation: &'static str) {
    counter!("fencewatch_rcon_errors_total", "operation" => operation).increment(1);
}

/// Updates the number of players currently tracked as outside.
#[allow(clippy::cast_precision_loss)]
pub fn set_players_outside(server: &str, count: usize) {
    gauge!("fencewatch_players_outside", "server" => server.to_string()).set(count as f64);
}
