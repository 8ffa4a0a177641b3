mod commands;
mod terminal;

use std::process::ExitCode;
use std::sync::Arc;

use clap::CommandFactory;

use commands::CommandLine;
use smtprobe_common::config::Config;
use smtprobe_core::prober::{self, smtp::SmtpProber};
use terminal::logging;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let commands = CommandLine::parse_args();

    logging::init();

    if commands.hosts.is_empty() {
        let usage = CommandLine::command().render_help();
        eprint!("{usage}");
        return Ok(ExitCode::from(1));
    }

    let cfg = Config {
        default_port: commands.port,
        tls_on_connect: commands.tls_on_connect,
    };

    let prober = Arc::new(SmtpProber::new(cfg));
    let errors: u32 = prober::perform_probes(prober, commands.hosts, tokio::io::stdout()).await;

    if errors != 0 {
        let program: String = std::env::args()
            .next()
            .unwrap_or_else(|| "smtprobe".to_string());
        eprintln!("{program}: encountered {errors} errors");
        return Ok(ExitCode::from(1));
    }

    Ok(ExitCode::SUCCESS)
}
