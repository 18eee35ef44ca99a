//! Byte framer: splits a raw byte stream into newline-delimited frames.
//!
//! [`LineFramer`] is the push-based core: feed it chunks of any size and it
//! hands back every completed line. [`FrameReader`] drives a `LineFramer`
//! from an [`AsyncRead`] source and yields frames one at a time.
//!
//! Frames are trimmed of ASCII whitespace; empty and whitespace-only lines
//! are never emitted. A final line without a trailing newline is still
//! emitted when the source ends.

use std::collections::VecDeque;

use tokio::io::{AsyncRead, AsyncReadExt};

/// One candidate JSON document, without its line terminator.
pub type Frame = Vec<u8>;

const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

/// Incremental newline framer with a growable line buffer.
#[derive(Debug, Default)]
pub struct LineFramer {
    buf: Vec<u8>,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `chunk` and return every line it completes, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();
        let mut rest = chunk;

        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            self.buf.extend_from_slice(&rest[..pos]);
            rest = &rest[pos + 1..];
            frames.extend(take_frame(&mut self.buf));
        }

        self.buf.extend_from_slice(rest);
        frames
    }

    /// Flush the unterminated remainder at end of input.
    pub fn finish(&mut self) -> Option<Frame> {
        take_frame(&mut self.buf)
    }

    /// Bytes held for a line that has not been terminated yet.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Drop any partial line.
    pub fn reset(&mut self) {
        self.buf.clear();
    }
}

fn take_frame(buf: &mut Vec<u8>) -> Option<Frame> {
    let line = std::mem::take(buf);
    let trimmed = line.trim_ascii();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == line.len() {
        Some(line)
    } else {
        Some(trimmed.to_vec())
    }
}

/// Pulls frames out of an async byte source.
///
/// Once the source is exhausted every further call returns `Ok(None)`.
pub struct FrameReader<R> {
    reader: R,
    framer: LineFramer,
    ready: VecDeque<Frame>,
    chunk: Vec<u8>,
    bytes_read: u64,
    exhausted: bool,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self::with_chunk_size(reader, DEFAULT_CHUNK_SIZE)
    }

    /// Read the source `chunk_size` bytes at a time (minimum 1).
    pub fn with_chunk_size(reader: R, chunk_size: usize) -> Self {
        Self {
            reader,
            framer: LineFramer::new(),
            ready: VecDeque::new(),
            chunk: vec![0; chunk_size.max(1)],
            bytes_read: 0,
            exhausted: false,
        }
    }

    /// The next frame, or `None` at end of input.
    pub async fn next_frame(&mut self) -> std::io::Result<Option<Frame>> {
        loop {
            if let Some(frame) = self.ready.pop_front() {
                return Ok(Some(frame));
            }
            if self.exhausted {
                return Ok(None);
            }

            let n = self.reader.read(&mut self.chunk).await?;
            if n == 0 {
                self.exhausted = true;
                self.ready.extend(self.framer.finish());
            } else {
                self.bytes_read += n as u64;
                let frames = self.framer.push(&self.chunk[..n]);
                self.ready.extend(frames);
            }
        }
    }

    /// Total bytes consumed from the source so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }
}
