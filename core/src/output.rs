//! The single writer that serializes probe output.
//!
//! Every probe task sends its finished report here. Funneling all writes
//! through one task keeps each block contiguous on the output stream no
//! matter how the probes themselves interleave.

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::error;

use crate::report::ProbeReport;

/// Drains `reports` into `sink` in arrival order until every sender is gone
/// and the queue is empty.
pub(crate) async fn emit_reports<W>(mut reports: mpsc::Receiver<ProbeReport>, mut sink: W)
where
    W: AsyncWrite + Unpin,
{
    while let Some(report) = reports.recv().await {
        if let Err(err) = sink.write_all(report.render().as_bytes()).await {
            error!("failed to write probe report: {err}");
            continue;
        }
        if let Err(err) = sink.flush().await {
            error!("failed to flush probe output: {err}");
        }
    }
}
