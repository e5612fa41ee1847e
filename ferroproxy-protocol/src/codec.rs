//! Codec that frames HTTP/1.1 header blocks
//!
//! Yields everything up to and including the first `\r\n\r\n`. Bytes after
//! the terminator stay in the read buffer so the caller can recover them
//! (request body prefix, early tunnel data, response body prefix).

use crate::constants::{HEAD_TERMINATOR, MAX_HEAD_SIZE};
use bytes::{Bytes, BytesMut};
use std::io;
use tokio_util::codec::Decoder;

/// Header block codec
///
/// ```text
/// ┌──────────────────────────────┬──────────┬───────────────┐
/// │ start line + header lines    │ \r\n\r\n │ left in buffer│
/// └──────────────────────────────┴──────────┴───────────────┘
///   yielded as one `Bytes` item ────────────┘
/// ```
#[derive(Debug, Clone, Copy)]
pub struct HeadCodec {
    max_head_size: usize,
    /// Offset already scanned without finding the terminator
    next_index: usize,
}

impl Default for HeadCodec {
    fn default() -> Self {
        Self::with_max_head_size(MAX_HEAD_SIZE)
    }
}

impl HeadCodec {
    /// Create a new codec with the default max head size
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new codec with a custom max head size
    pub fn with_max_head_size(max_head_size: usize) -> Self {
        Self {
            max_head_size,
            next_index: 0,
        }
    }

    /// Get the configured max head size
    pub fn max_head_size(&self) -> usize {
        self.max_head_size
    }
}

impl Decoder for HeadCodec {
    type Item = Bytes;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Re-scan the last three bytes in case the terminator straddles reads
        let start = self.next_index.saturating_sub(HEAD_TERMINATOR.len() - 1);

        let found = src[start..]
            .windows(HEAD_TERMINATOR.len())
            .position(|window| window == HEAD_TERMINATOR);

        match found {
            Some(offset) => {
                let end = start + offset + HEAD_TERMINATOR.len();
                if end > self.max_head_size {
                    return Err(head_too_large(end, self.max_head_size));
                }
                self.next_index = 0;
                Ok(Some(src.split_to(end).freeze()))
            }
            None => {
                if src.len() > self.max_head_size {
                    return Err(head_too_large(src.len(), self.max_head_size));
                }
                self.next_index = src.len();
                Ok(None)
            }
        }
    }
}

fn head_too_large(size: usize, limit: usize) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("Header block too large: {size} bytes (max: {limit})"),
    )
}
