//! The production probe strategy: a real SMTP/TLS conversation.

use async_trait::async_trait;

use smtprobe_common::config::Config;
use smtprobe_protocols::error::ProbeError;
use smtprobe_protocols::smtp;

use crate::prober::Prober;

/// Probes hosts by speaking SMTP to them, upgrading to TLS via STARTTLS or
/// handshaking immediately, as configured.
pub struct SmtpProber {
    config: Config,
}

impl SmtpProber {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Prober for SmtpProber {
    async fn probe(&self, spec: &str) -> Result<String, ProbeError> {
        smtp::probe(spec, &self.config).await
    }
}
