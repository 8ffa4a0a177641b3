//! End-to-end probe runs against loopback SMTP fixtures.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::AsyncReadExt;

use smtprobe_common::config::Config;
use smtprobe_core::prober::{self, smtp::SmtpProber};

use crate::util::{self, FixtureMode};

fn config(tls_on_connect: bool) -> Config {
    Config {
        default_port: "smtp(25)".parse().expect("default port spec"),
        tls_on_connect,
    }
}

fn target(addr: SocketAddr) -> String {
    format!("127.0.0.1:{}", addr.port())
}

/// Runs the full fan-out/fan-in lifecycle with the real SMTP prober and
/// collects everything the emitter wrote.
async fn run_probes(cfg: Config, targets: Vec<String>) -> (u32, String) {
    let prober = Arc::new(SmtpProber::new(cfg));
    let (sink, mut collector) = tokio::io::duplex(64 * 1024);

    let output = tokio::spawn(async move {
        let mut collected = String::new();
        collector
            .read_to_string(&mut collected)
            .await
            .expect("collect probe output");
        collected
    });

    let errors = prober::perform_probes(prober, targets, sink).await;
    (errors, output.await.expect("join output collector"))
}

#[tokio::test]
async fn starttls_upgrade_reports_tls_parameters() {
    let addr = util::spawn_server(FixtureMode::Starttls).await;

    let (errors, out) = run_probes(config(false), vec![target(addr)]).await;

    assert_eq!(errors, 0, "unexpected probe failure:\n{out}");
    assert!(out.contains("greeting: 220 fixture.test ESMTP ready"));
    assert!(out.contains("tls: TLSv1_3"), "no TLS line in:\n{out}");
    assert!(out.contains("8BITMIME"));
}

#[tokio::test]
async fn tls_on_connect_probes_inside_the_handshake() {
    let addr = util::spawn_server(FixtureMode::TlsOnConnect).await;

    let (errors, out) = run_probes(config(true), vec![target(addr)]).await;

    assert_eq!(errors, 0, "unexpected probe failure:\n{out}");
    assert!(out.contains("greeting: 220 fixture.test ESMTP ready"));
    assert!(out.contains("tls: TLSv1_3"), "no TLS line in:\n{out}");
}

#[tokio::test]
async fn missing_starttls_fails_the_probe() {
    let addr = util::spawn_server(FixtureMode::Plain {
        features: vec!["8BITMIME".to_string()],
    })
    .await;

    let (errors, out) = run_probes(config(false), vec![target(addr)]).await;

    assert_eq!(errors, 1);
    assert!(out.contains("probe failed: server does not advertise STARTTLS"));
}

#[tokio::test]
async fn rejected_greeting_fails_the_probe() {
    let addr = util::spawn_server(FixtureMode::RejectGreeting).await;

    let (errors, out) = run_probes(config(false), vec![target(addr)]).await;

    assert_eq!(errors, 1);
    assert!(out.contains("unexpected reply to greeting: 554"));
}

#[tokio::test]
async fn refused_connection_fails_the_probe() {
    let addr = util::unused_port().await;

    let (errors, out) = run_probes(config(false), vec![target(addr)]).await;

    assert_eq!(errors, 1);
    assert!(out.contains("probe failed"));
    assert!(out.contains(&target(addr)));
}

#[tokio::test]
async fn malformed_host_spec_counts_as_probe_error() {
    let (errors, out) = run_probes(config(false), vec!["[2001:db8::25".to_string()]).await;

    assert_eq!(errors, 1);
    assert!(out.contains("probe failed: invalid host specification"));
}

#[tokio::test]
async fn two_unreachable_hosts_report_two_errors() {
    let first = util::unused_port().await;
    let second = util::unused_port().await;

    let (errors, out) = run_probes(config(false), vec![target(first), target(second)]).await;

    assert_eq!(errors, 2);
    assert_eq!(out.matches("probe failed").count(), 2);
    assert!(out.contains(&target(first)));
    assert!(out.contains(&target(second)));
}

#[tokio::test]
async fn mixed_outcomes_keep_one_block_per_host() {
    let good = util::spawn_server(FixtureMode::Starttls).await;
    let bad = util::unused_port().await;

    let (errors, out) = run_probes(config(false), vec![target(good), target(bad)]).await;

    assert_eq!(errors, 1);
    assert!(out.contains("tls: TLSv1_3"), "no success block in:\n{out}");
    assert_eq!(out.matches("probe failed").count(), 1);
}
