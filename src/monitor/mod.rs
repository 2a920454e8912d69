//! Monitor mode
//!
//! Repeats a test run on a fixed delay and exposes request metrics for
//! Prometheus to scrape. Every iteration starts from the initial variables.

pub mod metrics;
pub mod server;

use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tracing::info;

use crate::errors::ApitestError;
use crate::pipeline::{RunSummary, TestRunner, TestSet, Variables};
use crate::signals;
use server::MetricsServer;

pub const DEFAULT_PORT: u16 = 2112;
pub const DEFAULT_DELAY: Duration = Duration::from_secs(300);

/// Monitor mode settings
#[derive(Debug, Clone, Copy)]
pub struct MonitorOptions {
    /// Metrics listener port
    pub port: u16,
    /// Pause between the end of one run and the start of the next
    pub delay: Duration,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self { port: DEFAULT_PORT, delay: DEFAULT_DELAY }
    }
}

/// Serve metrics and repeat the run until Ctrl+C
pub async fn run_monitor<F>(
    runner: &mut TestRunner,
    set: &TestSet,
    initial: &Variables,
    options: MonitorOptions,
    on_summary: F,
) -> Result<(), ApitestError>
where
    F: FnMut(usize, &RunSummary),
{
    let handle = metrics::install_recorder()?;
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, options.port));
    let server = MetricsServer::bind(addr, handle).await?;
    info!(addr = %server.local_addr()?, delay = ?options.delay, "monitor mode started");

    let server_task = tokio::spawn(server.run());
    monitor_loop(runner, set, initial, options.delay, signals::wait_for_interrupt(), on_summary).await;
    server_task.abort();

    info!("monitor mode stopped");
    Ok(())
}

/// Run, wait `delay`, repeat, until `shutdown` resolves.
///
/// A pending run or wait is cancelled as soon as `shutdown` completes.
/// Returns the number of completed iterations.
pub async fn monitor_loop<S, F>(
    runner: &mut TestRunner,
    set: &TestSet,
    initial: &Variables,
    delay: Duration,
    shutdown: S,
    mut on_summary: F,
) -> usize
where
    S: Future<Output = ()>,
    F: FnMut(usize, &RunSummary),
{
    tokio::pin!(shutdown);
    let mut completed = 0;

    loop {
        let mut variables = initial.clone();
        let summary = tokio::select! {
            _ = &mut shutdown => break,
            summary = runner.run(set, &mut variables) => summary,
        };

        completed += 1;
        info!(iteration = completed, total = summary.total, failed = summary.failed, "monitor iteration finished");
        on_summary(completed, &summary);

        tokio::select! {
            _ = &mut shutdown => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    completed
}
