// src/framing.rs
use crate::errors::{Result, WatchError};

/// Splits a chunked byte stream into newline-terminated records.
///
/// Bytes are buffered until a line break arrives, so a record (or a multi-byte
/// UTF-8 character inside it) may be split across any number of chunks.
#[derive(Debug, Default)]
pub struct FrameReader {
    buffer: Vec<u8>,
    // bytes at the front of `buffer` already known to contain no '\n'
    scanned: usize,
}

impl FrameReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one delivery chunk.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Splits off the next complete record, without its line break.
    pub fn next_record(&mut self) -> Option<Result<String>> {
        let offset = self.buffer[self.scanned..].iter().position(|&b| b == b'\n');
        let Some(offset) = offset else {
            self.scanned = self.buffer.len();
            return None;
        };
        let end = self.scanned + offset;
        let mut line: Vec<u8> = self.buffer.drain(..=end).collect();
        line.pop();
        self.scanned = 0;
        Some(String::from_utf8(line).map_err(|_| WatchError::Utf8))
    }

    /// Bytes received but not yet terminated by a line break.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Ends the stream, dropping any unterminated trailing fragment.
    ///
    /// Returns the dropped fragment when it held anything but whitespace.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        self.scanned = 0;
        let text = String::from_utf8_lossy(&rest);
        if text.trim().is_empty() {
            None
        } else {
            Some(text.into_owned())
        }
    }
}
