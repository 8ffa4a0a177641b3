use clap::Parser;

use smtprobe_common::target::PortSpec;

#[derive(Parser)]
#[command(name = "smtprobe")]
#[command(version)]
#[command(about = "Probe SMTP hosts for TLS health.")]
pub struct CommandLine {
    /// Hosts to probe, as `host`, `host:port` or `[v6addr]:port`
    #[arg(value_name = "HOST")]
    pub hosts: Vec<String>,

    /// Port to connect to when a host does not name one
    #[arg(long, default_value = "smtp(25)")]
    pub port: PortSpec,

    /// Start TLS immediately upon connection
    #[arg(long)]
    pub tls_on_connect: bool,
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
