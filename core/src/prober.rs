//! The probe abstraction and its fan-out/fan-in lifecycle.
//!
//! [`perform_probes`] runs one task per host specification plus a single
//! output emitter. Teardown is strictly ordered: every probe task finishes
//! (dropping its sender handle, which is what closes the report channel),
//! the final error count is read, and only then is the emitter joined, so
//! nothing a probe sent can be lost to an early exit.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error};

use smtprobe_protocols::error::ProbeError;

use crate::output;
use crate::report::ProbeReport;

pub mod smtp;

/// How many finished reports may queue up before probe tasks start waiting
/// on the emitter.
const REPORT_QUEUE_DEPTH: usize = 10;

/// A strategy that turns one host specification into a finished report body.
///
/// Implementations fully contain their own failures as [`ProbeError`]; the
/// lifecycle below never aborts a run because one probe failed.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, spec: &str) -> Result<String, ProbeError>;
}

/// Shared state of one probe run.
struct RunStatus {
    errors: AtomicU32,
    reports: mpsc::Sender<ProbeReport>,
}

impl RunStatus {
    fn count_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }
}

/// Probes every target concurrently, writing one block per target to `sink`.
///
/// Returns the number of failed probes. Blocks appear in completion order,
/// each written as one contiguous unit.
pub async fn perform_probes<W>(prober: Arc<dyn Prober>, targets: Vec<String>, sink: W) -> u32
where
    W: AsyncWrite + Send + Unpin + 'static,
{
    let (tx, rx) = mpsc::channel(REPORT_QUEUE_DEPTH);
    let emitter = tokio::spawn(output::emit_reports(rx, sink));

    let status = Arc::new(RunStatus {
        errors: AtomicU32::new(0),
        reports: tx,
    });

    let mut probes: JoinSet<()> = JoinSet::new();
    for target in targets {
        probes.spawn(probe_host(prober.clone(), target, status.clone()));
    }
    debug!("spawned {} probe tasks", probes.len());

    while let Some(joined) = probes.join_next().await {
        if let Err(err) = joined {
            // A probe that panicked never formatted its report; all that is
            // left to do is count it.
            error!("probe task failed: {err}");
            status.count_error();
        }
    }

    let errors: u32 = status.errors.load(Ordering::Relaxed);

    // Last sender handle. Dropping it closes the report channel, after which
    // the emitter drains whatever is still queued and exits.
    drop(status);
    if let Err(err) = emitter.await {
        error!("output emitter failed: {err}");
    }

    errors
}

/// One probe task: exactly one report sent, at most one error counted, on
/// every `Result` path.
async fn probe_host(prober: Arc<dyn Prober>, target: String, status: Arc<RunStatus>) {
    let report = match prober.probe(&target).await {
        Ok(body) => ProbeReport::success(body),
        Err(err) => {
            status.count_error();
            ProbeReport::failure(&target, &err)
        }
    };

    if status.reports.send(report).await.is_err() {
        error!("report channel closed before {target} could report");
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
