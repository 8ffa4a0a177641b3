use crate::target::PortSpec;

/// Immutable settings for one probe run, built once from the command line
/// and passed down by reference.
#[derive(Clone, Debug)]
pub struct Config {
    /// Port applied to host specifications that omit one.
    pub default_port: PortSpec,
    /// Start the TLS handshake immediately upon connection instead of
    /// upgrading the session via STARTTLS.
    pub tls_on_connect: bool,
}
