//! Null-terminated message framing.
//!
//! A byte stream carries no message boundaries of its own, so every message on
//! the wire is terminated by a single [`SENTINEL`] byte. The [`Framer`] pulls
//! bytes from a reader until it sees the sentinel and hands back everything
//! before it.
//!
//! Bytes that arrive after the sentinel in the same read belong to the next
//! message. They stay buffered inside the framer and are consumed first by the
//! following call, so pipelined messages are never dropped.
use std::io::{self, Read, Write};

use log::{debug, trace};

/// Terminates every frame. Never part of a legal payload.
pub const SENTINEL: u8 = 0;

const READ_CHUNK: usize = 1024;

#[derive(Debug, Default)]
pub struct Framer {
    pending: Vec<u8>,
}

impl Framer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the next complete frame, without its sentinel.
    ///
    /// Returns `Ok(None)` when the reader reaches end of stream before a
    /// sentinel is seen. Any partial frame buffered at that point is dropped.
    pub fn next_frame<R: Read>(&mut self, reader: &mut R) -> io::Result<Option<Vec<u8>>> {
        let mut scanned = 0;
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            if let Some(pos) = self.pending[scanned..].iter().position(|b| *b == SENTINEL) {
                let end = scanned + pos;
                let frame = self.pending[..end].to_vec();
                self.pending.drain(..=end);
                trace!(
                    "framed {} bytes, {} bytes carried over",
                    frame.len(),
                    self.pending.len()
                );
                return Ok(Some(frame));
            }
            scanned = self.pending.len();

            let read = match reader.read(&mut chunk) {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };

            if read == 0 {
                if !self.pending.is_empty() {
                    debug!(
                        "stream ended with {} bytes of an unterminated frame",
                        self.pending.len()
                    );
                    self.pending.clear();
                }
                return Ok(None);
            }

            self.pending.extend_from_slice(&chunk[..read]);
        }
    }

    /// Read the next frame and decode it as text, replacing invalid UTF-8.
    pub fn next_message<R: Read>(&mut self, reader: &mut R) -> io::Result<Option<String>> {
        Ok(self.next_frame(reader)?.map(|frame| decode(&frame)))
    }

    /// Bytes received but not yet framed.
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }
}

pub fn decode(frame: &[u8]) -> String {
    String::from_utf8_lossy(frame).into_owned()
}

/// Message bytes followed by the sentinel.
pub fn encode(message: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(message.len() + 1);
    out.extend_from_slice(message.as_bytes());
    out.push(SENTINEL);
    out
}

/// Write one complete frame and flush it.
pub fn write_frame<W: Write>(writer: &mut W, message: &str) -> io::Result<()> {
    writer.write_all(&encode(message))?;
    writer.flush()
}
