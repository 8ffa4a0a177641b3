//! Result blocks produced by probes and drained by the output emitter.

use smtprobe_protocols::error::ProbeError;

/// One self-contained result block for a single probed host.
///
/// Exactly one of these exists per probe, success or failure, so input count
/// and output count always correlate one to one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    body: String,
    failed: bool,
}

impl ProbeReport {
    pub fn success(body: String) -> Self {
        Self {
            body,
            failed: false,
        }
    }

    /// An error block naming the host specification and the failure cause.
    pub fn failure(spec: &str, err: &ProbeError) -> Self {
        Self {
            body: format!("{spec}: probe failed: {err}"),
            failed: true,
        }
    }

    pub fn failed(&self) -> bool {
        self.failed
    }

    /// The rendered block, newline-terminated, written to the output stream
    /// as a single unit.
    pub fn render(&self) -> String {
        let mut block: String = self.body.clone();
        if !block.ends_with('\n') {
            block.push('\n');
        }
        block
    }
}
