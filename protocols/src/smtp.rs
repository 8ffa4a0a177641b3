//! Minimal SMTP client conversation for probing.
//!
//! Speaks just enough of RFC 5321 to judge a server's TLS health: greeting,
//! `EHLO`, `STARTTLS`, `QUIT`. Replies are parsed with multi-line support
//! (`250-…` continuation lines terminated by a `250 …` line).

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, trace};

use smtprobe_common::config::Config;
use smtprobe_common::target::HostSpec;

use crate::error::ProbeError;
use crate::tls;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REPLY_TIMEOUT: Duration = Duration::from_secs(30);

/// Name we introduce ourselves with. Probes never accept mail, so a fixed
/// non-resolving name is fine.
const EHLO_NAME: &str = "smtprobe.invalid";

/// Runs one full probe conversation against `spec`.
///
/// Returns the rendered success block; every failure mode, including a
/// malformed host specification, surfaces as a [`ProbeError`].
pub async fn probe(spec: &str, cfg: &Config) -> Result<String, ProbeError> {
    let target: HostSpec = spec.parse()?;
    let authority: String = target.authority(&cfg.default_port);
    debug!("probing {authority}");

    let stream = connect(&authority).await?;
    let peer: SocketAddr = stream.peer_addr()?;
    let mut report = ReportBlock::new(&authority, peer);

    if cfg.tls_on_connect {
        let stream = tls::handshake(stream, target.host()).await?;
        report.tls = Some(tls::describe(&stream));

        let mut session = Session::new(stream);
        report.note_greeting(&expect_code(
            session.read_reply("greeting").await?,
            220,
            "greeting",
        )?);
        report.note_features(&ehlo(&mut session).await?);
        session.quit().await;
    } else {
        let mut session = Session::new(stream);
        report.note_greeting(&expect_code(
            session.read_reply("greeting").await?,
            220,
            "greeting",
        )?);

        if !ehlo(&mut session).await?.has_feature("STARTTLS") {
            return Err(ProbeError::StarttlsNotOffered);
        }
        expect_code(
            session.command("STARTTLS", "STARTTLS").await?,
            220,
            "STARTTLS",
        )?;

        let stream = tls::handshake(session.into_inner(), target.host()).await?;
        report.tls = Some(tls::describe(&stream));

        // The session restarts from scratch inside TLS; greet again.
        let mut session = Session::new(stream);
        report.note_features(&ehlo(&mut session).await?);
        session.quit().await;
    }

    Ok(report.render())
}

async fn connect(authority: &str) -> Result<TcpStream, ProbeError> {
    timeout(CONNECT_TIMEOUT, TcpStream::connect(authority))
        .await
        .map_err(|_| ProbeError::Timeout("connect"))?
        .map_err(|source| ProbeError::Connect {
            authority: authority.to_string(),
            source,
        })
}

async fn ehlo<S>(session: &mut Session<S>) -> Result<SmtpReply, ProbeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let reply = session
        .command(&format!("EHLO {EHLO_NAME}"), "EHLO")
        .await?;
    expect_code(reply, 250, "EHLO")
}

fn expect_code(
    reply: SmtpReply,
    want: u16,
    command: &'static str,
) -> Result<SmtpReply, ProbeError> {
    if reply.code == want {
        Ok(reply)
    } else {
        Err(ProbeError::UnexpectedReply {
            command,
            reply: reply.first_line().to_string(),
        })
    }
}

/// One parsed SMTP reply, possibly spanning several lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpReply {
    pub code: u16,
    pub lines: Vec<String>,
}

impl SmtpReply {
    pub fn first_line(&self) -> &str {
        self.lines.first().map(String::as_str).unwrap_or("")
    }

    /// EHLO keywords, one per line past the server's greeting line, with the
    /// reply-code prefix already stripped.
    pub fn features(&self) -> impl Iterator<Item = &str> {
        self.lines
            .iter()
            .skip(1)
            .map(|line| line.get(4..).unwrap_or(""))
    }

    pub fn has_feature(&self, keyword: &str) -> bool {
        self.features().any(|feature| {
            feature
                .split_whitespace()
                .next()
                .is_some_and(|word| word.eq_ignore_ascii_case(keyword))
        })
    }
}

/// Splits a raw reply line into its code and continuation marker.
fn parse_reply_line(line: &str) -> Result<(u16, bool), ProbeError> {
    let code: u16 = line
        .get(..3)
        .filter(|digits| digits.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|digits| digits.parse().ok())
        .ok_or_else(|| ProbeError::MalformedReply(line.to_string()))?;

    let more: bool = match line.as_bytes().get(3) {
        None | Some(b' ') => false,
        Some(b'-') => true,
        Some(_) => return Err(ProbeError::MalformedReply(line.to_string())),
    };

    Ok((code, more))
}

/// A live SMTP exchange over any stream, plaintext or TLS.
struct Session<S> {
    stream: BufReader<S>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Session<S> {
    fn new(stream: S) -> Self {
        Self {
            stream: BufReader::new(stream),
        }
    }

    /// Reads one full reply, following continuation lines.
    async fn read_reply(&mut self, waiting_for: &'static str) -> Result<SmtpReply, ProbeError> {
        let mut code: Option<u16> = None;
        let mut lines: Vec<String> = Vec::new();

        loop {
            let line = self.read_line(waiting_for).await?;
            let (line_code, more) = parse_reply_line(&line)?;
            if *code.get_or_insert(line_code) != line_code {
                return Err(ProbeError::MalformedReply(line));
            }
            lines.push(line);
            if !more {
                break;
            }
        }

        Ok(SmtpReply {
            code: code.unwrap_or(0),
            lines,
        })
    }

    async fn read_line(&mut self, waiting_for: &'static str) -> Result<String, ProbeError> {
        let mut raw = String::new();
        let n: usize = timeout(REPLY_TIMEOUT, self.stream.read_line(&mut raw))
            .await
            .map_err(|_| ProbeError::Timeout(waiting_for))??;
        if n == 0 {
            return Err(ProbeError::Closed(waiting_for));
        }

        while raw.ends_with('\n') || raw.ends_with('\r') {
            raw.pop();
        }
        trace!("<<< {raw}");
        Ok(raw)
    }

    /// Sends one command line and reads the reply to it.
    async fn command(
        &mut self,
        line: &str,
        waiting_for: &'static str,
    ) -> Result<SmtpReply, ProbeError> {
        trace!(">>> {line}");
        self.stream.write_all(line.as_bytes()).await?;
        self.stream.write_all(b"\r\n").await?;
        self.stream.flush().await?;
        self.read_reply(waiting_for).await
    }

    /// Parting courtesy; the probe result is already decided by now.
    async fn quit(&mut self) {
        let _ = self.command("QUIT", "QUIT").await;
    }

    fn into_inner(self) -> S {
        // SMTP is lock-step up to this point: the server sends nothing past
        // the reply we just consumed, so the read buffer is empty.
        self.stream.into_inner()
    }
}

/// Accumulates the success report for one host.
struct ReportBlock {
    heading: String,
    peer: SocketAddr,
    greeting: Option<String>,
    tls: Option<String>,
    features: Vec<String>,
}

impl ReportBlock {
    fn new(authority: &str, peer: SocketAddr) -> Self {
        Self {
            heading: authority.to_string(),
            peer,
            greeting: None,
            tls: None,
            features: Vec::new(),
        }
    }

    fn note_greeting(&mut self, reply: &SmtpReply) {
        self.greeting = Some(reply.first_line().to_string());
    }

    fn note_features(&mut self, reply: &SmtpReply) {
        self.features = reply.features().map(str::to_string).collect();
    }

    fn render(self) -> String {
        let mut block: String = format!("{}\n", self.heading);
        block.push_str(&format!("  address: {}\n", self.peer));
        if let Some(greeting) = self.greeting {
            block.push_str(&format!("  greeting: {greeting}\n"));
        }
        if let Some(tls) = self.tls {
            block.push_str(&format!("  tls: {tls}\n"));
        }
        if !self.features.is_empty() {
            block.push_str(&format!("  features: {}\n", self.features.join(", ")));
        }
        block
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
