//! Parsed HTTP/1.1 requests
//!
//! An [`HttpRequest`] is built once per inbound connection from the raw header
//! block and body, and never mutated afterwards.

use crate::constants::CRLF;
use bytes::{Bytes, BytesMut};
use std::net::SocketAddr;
use thiserror::Error;

/// Reasons a header block cannot become an [`HttpRequest`]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty header block")]
    Empty,

    #[error("request line must have 3 fields, got {0}")]
    RequestLine(usize),

    #[error("invalid Content-Length: {0}")]
    ContentLength(String),

    #[error("invalid CONNECT target: {0}")]
    ConnectTarget(String),
}

/// Decode bytes as Latin-1 so every byte value survives a round trip.
pub fn latin1_decode(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Inverse of [`latin1_decode`]; characters outside Latin-1 become `?`.
pub fn latin1_encode(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

/// Header map with lowercased names.
///
/// Lookups are case-insensitive. Inserting an existing name replaces its value
/// in place, so the last duplicate wins and the first position is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.entries.push((name, value.to_string())),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Body length declared by `Content-Length`.
///
/// A missing or non-numeric header means an empty body. Chunked bodies are
/// not supported and are never drained.
pub fn content_length(headers: &Headers) -> Result<usize, ParseError> {
    match headers.get("content-length") {
        Some(value) if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) => value
            .parse::<usize>()
            .map_err(|_| ParseError::ContentLength(value.to_string())),
        _ => Ok(0),
    }
}

/// Request line and headers, before the body has been read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub method: String,
    pub target: String,
    pub version: String,
    pub headers: Headers,
}

impl RequestHead {
    /// Parse a header block (terminator included or not).
    pub fn parse(block: &[u8]) -> Result<Self, ParseError> {
        let text = latin1_decode(block);
        let mut lines = text.split(CRLF);

        let request_line = lines.next().filter(|l| !l.is_empty()).ok_or(ParseError::Empty)?;
        let fields: Vec<&str> = request_line.split_whitespace().collect();
        let [method, target, version] = fields.as_slice() else {
            return Err(ParseError::RequestLine(fields.len()));
        };

        let mut headers = Headers::new();
        for line in lines {
            // Lines without a colon are skipped, not rejected
            if let Some((name, value)) = line.split_once(':') {
                headers.insert(name.trim(), value.trim());
            }
        }

        Ok(Self {
            method: method.to_string(),
            target: target.to_string(),
            version: version.to_string(),
            headers,
        })
    }

    pub fn content_length(&self) -> Result<usize, ParseError> {
        content_length(&self.headers)
    }
}

/// A parsed HTTP/1.1 request
#[derive(Debug, Clone)]
pub struct HttpRequest {
    method: String,
    path: String,
    version: String,
    headers: Headers,
    body: Bytes,
    client: SocketAddr,
    raw: Bytes,
}

impl HttpRequest {
    /// Assemble a request from its parsed head, the raw header block and the body.
    pub fn new(head: RequestHead, raw_head: &[u8], body: Bytes, client: SocketAddr) -> Self {
        let mut raw = BytesMut::with_capacity(raw_head.len() + body.len());
        raw.extend_from_slice(raw_head);
        raw.extend_from_slice(&body);

        Self {
            method: head.method,
            path: head.target,
            version: head.version,
            headers: head.headers,
            body,
            client,
            raw: raw.freeze(),
        }
    }

    /// Parse a complete request image (header block followed by body).
    pub fn parse(raw: &[u8], client: SocketAddr) -> Result<Self, ParseError> {
        let split = raw
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .map_or(raw.len(), |i| i + 4);
        let (raw_head, rest) = raw.split_at(split);
        let head = RequestHead::parse(raw_head)?;
        let length = head.content_length()?.min(rest.len());
        let body = Bytes::copy_from_slice(&rest[..length]);
        Ok(Self::new(head, raw_head, body, client))
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Request target: origin-form, absolute-URI or CONNECT authority
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn client(&self) -> SocketAddr {
        self.client
    }

    /// Full byte image as received from the client
    pub fn raw(&self) -> &Bytes {
        &self.raw
    }

    pub fn is_connect(&self) -> bool {
        self.method.eq_ignore_ascii_case("CONNECT")
    }

    /// Serialize for an upstream server, with `target` replacing the original
    /// request target. Headers keep their stored order and lowercased names.
    pub fn to_upstream_bytes(&self, target: &str) -> Bytes {
        let mut lines = Vec::with_capacity(self.headers.len() + 1);
        lines.push(format!("{} {} {}", self.method, target, self.version));
        for (name, value) in self.headers.iter() {
            lines.push(format!("{name}: {value}"));
        }
        let head = lines.join(CRLF) + CRLF + CRLF;

        let mut out = BytesMut::with_capacity(head.len() + self.body.len());
        out.extend_from_slice(&latin1_encode(&head));
        out.extend_from_slice(&self.body);
        out.freeze()
    }
}
