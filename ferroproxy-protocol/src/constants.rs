//! Protocol constants

/// Blank line terminating an HTTP/1.1 header block
pub const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Line separator inside a header block
pub const CRLF: &str = "\r\n";

/// Maximum header block size (64KB)
pub const MAX_HEAD_SIZE: usize = 64 * 1024;
