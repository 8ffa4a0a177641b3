use std::io;

use thiserror::Error;
use tokio_rustls::rustls;

use smtprobe_common::target::TargetError;

/// Failure modes of a single host probe.
///
/// A probe fully contains its own failure: callers format these into a
/// report line and tally them, they never match on a variant to change
/// control flow.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("invalid host specification: {0}")]
    Target(#[from] TargetError),
    #[error("connection to {authority} failed: {source}")]
    Connect {
        authority: String,
        source: io::Error,
    },
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),
    #[error("connection closed before {0}")]
    Closed(&'static str),
    #[error("malformed reply line {0:?}")]
    MalformedReply(String),
    #[error("unexpected reply to {command}: {reply}")]
    UnexpectedReply {
        command: &'static str,
        reply: String,
    },
    #[error("server does not advertise STARTTLS")]
    StarttlsNotOffered,
    #[error("invalid TLS server name {0:?}")]
    InvalidServerName(String),
    #[error("TLS handshake failed: {0}")]
    Tls(#[from] rustls::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}
