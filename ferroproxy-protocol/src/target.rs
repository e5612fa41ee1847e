//! Request target and `Host` header handling

use crate::request::ParseError;
use std::fmt;

/// Destination host and port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authority {
    pub host: String,
    pub port: u16,
}

impl Authority {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Resolve the upstream host and port from a `Host` header.
///
/// Handles bracketed IPv6 literals with an optional `:port`. The host is
/// lowercased. Anything that cannot be split cleanly falls back to the whole
/// header as hostname with `default_port`.
pub fn parse_host_header(header: &str, default_port: u16) -> Authority {
    let header = header.trim();
    let fallback = || Authority::new(header, default_port);

    let (host, port) = if let Some(rest) = header.strip_prefix('[') {
        let Some((host, after)) = rest.split_once(']') else {
            return fallback();
        };
        let port = match after {
            "" => None,
            _ => match after.strip_prefix(':') {
                Some(port) => Some(port),
                None => return fallback(),
            },
        };
        (host, port)
    } else {
        match header.matches(':').count() {
            0 => (header, None),
            1 => match header.split_once(':') {
                Some((host, port)) => (host, Some(port)),
                None => return fallback(),
            },
            // Bare IPv6 literal without brackets
            _ => return fallback(),
        }
    };

    if host.is_empty() {
        return fallback();
    }

    let port = match port {
        None | Some("") => default_port,
        Some(port) => match port.parse::<u16>() {
            Ok(port) => port,
            Err(_) => return fallback(),
        },
    };

    Authority::new(host.to_ascii_lowercase(), port)
}

/// Rewrite an absolute-URI target to origin-form.
///
/// `http://host/path?q` becomes `/path?q`; `http://host` becomes `/`. Targets
/// that are already origin-form are returned unchanged.
pub fn origin_form(target: &str) -> String {
    let rest = target
        .strip_prefix("http://")
        .or_else(|| target.strip_prefix("https://"));

    match rest {
        Some(rest) => match rest.find('/') {
            Some(0) => target.to_string(),
            Some(i) => rest[i..].to_string(),
            None if rest.is_empty() => target.to_string(),
            None => "/".to_string(),
        },
        None => target.to_string(),
    }
}

/// Parse a CONNECT authority-form target (`host:port`, `[v6]:port`).
pub fn parse_connect_target(target: &str) -> Result<Authority, ParseError> {
    let invalid = || ParseError::ConnectTarget(target.to_string());

    let (host, port) = target.rsplit_once(':').ok_or_else(invalid)?;
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    if host.is_empty() {
        return Err(invalid());
    }
    let port = port.parse::<u16>().map_err(|_| invalid())?;

    Ok(Authority::new(host, port))
}
