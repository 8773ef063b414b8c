//! The `run` command: worker supervision and process restart.
//!
//! Builds one connection pool and worker per configured server, then
//! multiplexes every worker's restart indication against the process-wide
//! shutdown signal. A shutdown signal exits cleanly; a worker restart
//! request re-executes the current binary with the same arguments after a
//! short grace period for in-flight operations.

use std::sync::Arc;
use std::time::Duration;

use tokio::signal::unix::{SignalKind, signal};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::cli::args::RunArgs;
use crate::config;
use crate::error::{ExitCode, FenceWatchError};
use crate::observability::init_metrics;
use crate::rcon::pool::ConnectionPool;
use crate::rcon::protocol::TcpConnector;
use crate::watch::Worker;

/// Grace period between cancellation and process exit, letting in-flight
/// RCON calls unwind.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Monitor the configured servers until shutdown or restart.
///
/// # Errors
///
/// Returns a config error when the configuration cannot be loaded, or an
/// I/O error when the metrics endpoint or the replacement process cannot
/// be started.
pub async fn run(args: &RunArgs) -> Result<(), FenceWatchError> {
    if let Some(port) = args.metrics_port {
        init_metrics(Some(port))?;
        info!(port, "Prometheus metrics endpoint started");
    }

    info!(config = %args.config.display(), "loading configuration");
    let loaded = config::load(&args.config)?;
    for warning in &loaded.warnings {
        warn!(location = %warning.location, "{}", warning.message);
    }

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    let mut workers = Vec::with_capacity(loaded.config.servers.len());
    let mut tasks = JoinSet::new();
    for server in &loaded.config.servers {
        let connector = TcpConnector::new(server.host.clone(), server.port, server.password.clone());
        let pool = Arc::new(ConnectionPool::new(Box::new(connector)));
        let worker = Arc::new(Worker::new(server.clone(), pool, cancel.child_token()));

        tasks.spawn({
            let worker = Arc::clone(&worker);
            async move {
                if let Err(e) = Arc::clone(&worker).run().await {
                    error!(host = %worker.host(), error = %e, "worker terminated");
                }
            }
        });
        workers.push(worker);
    }

    let restart_origin = {
        let indications: Vec<_> = workers
            .iter()
            .map(|w| Box::pin(w.restart_signal().requested()))
            .collect();
        async move {
            let (_, index, _) = futures::future::select_all(indications).await;
            index
        }
    };

    tokio::select! {
        () = cancel.cancelled() => {
            info!("shutdown signal received");
            drain(tasks).await;
            Ok(())
        }
        index = restart_origin => {
            info!(host = %workers[index].host(), "worker requested restart");
            cancel.cancel();
            drain(tasks).await;
            restart_process()
        }
    }
}

/// Waits for worker tasks to unwind, bounded by the grace period.
async fn drain(mut tasks: JoinSet<()>) {
    let deadline = tokio::time::sleep(SHUTDOWN_GRACE);
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            () = &mut deadline => {
                warn!(remaining = tasks.len(), "workers did not stop within the grace period");
                tasks.abort_all();
                return;
            }
            joined = tasks.join_next() => {
                if joined.is_none() {
                    return;
                }
            }
        }
    }
}

fn spawn_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
        cancel.cancel();
    });
}

/// Re-executes the current binary with the same arguments and environment,
/// then exits this process.
fn restart_process() -> Result<(), FenceWatchError> {
    let executable = std::env::current_exe()?;
    info!(executable = %executable.display(), "restarting");

    std::process::Command::new(executable)
        .args(std::env::args_os().skip(1))
        .spawn()?;

    std::process::exit(ExitCode::SUCCESS);
}
