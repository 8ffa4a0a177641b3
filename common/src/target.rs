//! # Probe Target Model
//!
//! Defines the possible inputs for a probe run.
//!
//! This module handles parsing and representing probe targets, which can be:
//! * A bare hostname or IPv4 address (e.g., `mx.example.com`, `192.0.2.10`).
//! * A host with an explicit port (e.g., `mx.example.com:587`).
//! * A bracketed IPv6 address, with or without a port (e.g., `[2001:db8::25]:465`).
//! * A bare IPv6 address (e.g., `2001:db8::25`).
//!
//! Targets that omit a port fall back to a default [`PortSpec`], itself
//! written either as a plain number (`25`) or as a labelled service
//! descriptor (`smtp(25)`).

use std::fmt;
use std::net::Ipv6Addr;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TargetError {
    #[error("empty host specification")]
    EmptyHost,
    #[error("invalid host specification '{0}'")]
    InvalidHost(String),
    #[error("invalid port '{0}'")]
    InvalidPort(String),
    #[error("unterminated '[' in host specification '{0}'")]
    UnterminatedBracket(String),
    #[error("invalid port specification '{0}'")]
    InvalidPortSpec(String),
}

/// One host to be probed, as supplied on the command line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostSpec {
    host: String,
    port: Option<u16>,
}

impl HostSpec {
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// The `host:port` form to dial, with `default` filling in a missing port.
    ///
    /// IPv6 addresses come out bracketed so the port separator stays
    /// unambiguous.
    pub fn authority(&self, default: &PortSpec) -> String {
        let port: u16 = self.port.unwrap_or_else(|| default.number());
        if self.host.parse::<Ipv6Addr>().is_ok() {
            format!("[{}]:{}", self.host, port)
        } else {
            format!("{}:{}", self.host, port)
        }
    }
}

impl fmt::Display for HostSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bracketed: bool = self.host.parse::<Ipv6Addr>().is_ok();
        match (self.port, bracketed) {
            (Some(port), true) => write!(f, "[{}]:{}", self.host, port),
            (Some(port), false) => write!(f, "{}:{}", self.host, port),
            (None, _) => f.write_str(&self.host),
        }
    }
}

impl FromStr for HostSpec {
    type Err = TargetError;

    /// Parses a string into a `HostSpec`.
    ///
    /// Supported formats:
    /// * **Host**: `mx.example.com`, `192.0.2.10`, `2001:db8::25`.
    /// * **Host and port**: `mx.example.com:587`, `[2001:db8::25]:465`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(TargetError::EmptyHost);
        }

        if let Some(rest) = s.strip_prefix('[') {
            return parse_bracketed(rest, s);
        }

        // A bare IPv6 address is all colons and hex; it never carries a port.
        if s.parse::<Ipv6Addr>().is_ok() {
            return Ok(HostSpec {
                host: s.to_string(),
                port: None,
            });
        }

        match s.rsplit_once(':') {
            Some((host, _)) if host.contains(':') => Err(TargetError::InvalidHost(s.to_string())),
            Some(("", _)) => Err(TargetError::EmptyHost),
            Some((host, port)) => Ok(HostSpec {
                host: host.to_string(),
                port: Some(parse_port(port)?),
            }),
            None => Ok(HostSpec {
                host: s.to_string(),
                port: None,
            }),
        }
    }
}

/// Parses the remainder of a `[v6addr]` or `[v6addr]:port` form.
fn parse_bracketed(rest: &str, original_s: &str) -> Result<HostSpec, TargetError> {
    let Some((host, after)) = rest.split_once(']') else {
        return Err(TargetError::UnterminatedBracket(original_s.to_string()));
    };

    if host.is_empty() {
        return Err(TargetError::EmptyHost);
    }

    let port: Option<u16> = match after {
        "" => None,
        _ => {
            let Some(port_str) = after.strip_prefix(':') else {
                return Err(TargetError::InvalidHost(original_s.to_string()));
            };
            Some(parse_port(port_str)?)
        }
    };

    Ok(HostSpec {
        host: host.to_string(),
        port,
    })
}

fn parse_port(s: &str) -> Result<u16, TargetError> {
    s.parse::<u16>()
        .map_err(|_| TargetError::InvalidPort(s.to_string()))
}

/// The default port descriptor applied to targets without an explicit port.
///
/// Written as a plain number (`25`) or a labelled form (`smtp(25)`); the
/// label is cosmetic and only the number is dialled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortSpec {
    label: Option<String>,
    number: u16,
}

impl PortSpec {
    pub fn number(&self) -> u16 {
        self.number
    }
}

impl fmt::Display for PortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) => write!(f, "{}({})", label, self.number),
            None => write!(f, "{}", self.number),
        }
    }
}

impl FromStr for PortSpec {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        if let Some(open) = s.find('(') {
            let Some(inner) = s[open..].strip_prefix('(').and_then(|t| t.strip_suffix(')')) else {
                return Err(TargetError::InvalidPortSpec(s.to_string()));
            };
            let label = &s[..open];
            if label.is_empty() {
                return Err(TargetError::InvalidPortSpec(s.to_string()));
            }
            return Ok(PortSpec {
                label: Some(label.to_string()),
                number: parse_port(inner)?,
            });
        }

        Ok(PortSpec {
            label: None,
            number: parse_port(s)?,
        })
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
