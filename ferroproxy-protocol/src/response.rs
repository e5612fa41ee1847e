//! Responses written by the proxy itself, and upstream response inspection

use crate::request::latin1_decode;
use bytes::Bytes;
use http::StatusCode;

/// Reply to a successful CONNECT, after which the socket carries raw bytes
pub const CONNECTION_ESTABLISHED: &[u8] = b"HTTP/1.1 200 Connection Established\r\n\r\n";

/// Empty-bodied status response, e.g. `HTTP/1.1 403 Forbidden`.
pub fn status_response(status: StatusCode) -> Bytes {
    Bytes::from(format!(
        "HTTP/1.1 {} {}\r\nContent-Length: 0\r\n\r\n",
        status.as_u16(),
        status.canonical_reason().unwrap_or("")
    ))
}

/// Status code of a response header block, if the status line has one.
pub fn status_code(head: &[u8]) -> Option<u16> {
    let end = head
        .windows(2)
        .position(|w| w == b"\r\n")
        .unwrap_or(head.len());
    let line = latin1_decode(&head[..end]);
    line.split_whitespace().nth(1)?.parse().ok()
}

/// Whether an upstream header block is a `101` switch to WebSocket.
pub fn is_websocket_upgrade(head: &[u8]) -> bool {
    if status_code(head) != Some(101) {
        return false;
    }

    latin1_decode(head).split("\r\n").skip(1).any(|line| {
        line.split_once(':').is_some_and(|(name, value)| {
            name.trim().eq_ignore_ascii_case("upgrade")
                && value.trim().eq_ignore_ascii_case("websocket")
        })
    })
}
