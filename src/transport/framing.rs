//! Newline-delimited JSON framing.
//!
//! One frame per line in both directions. The link is slow and lossy, so the
//! inbound side must survive partial lines, interleaved garbage, and frames
//! it does not understand: anything that fails to parse as a single JSON
//! object is dropped silently (logged at debug), and a line that grows past
//! the cap without a terminator is discarded to bound memory.

use crate::error::Result;
use crate::protocol::Frame;
use log::debug;

/// Lines longer than this without a newline are treated as garbage.
const MAX_LINE_BYTES: usize = 8 * 1024;

/// Serialize a frame as one newline-terminated JSON line.
pub fn encode_line(frame: &Frame) -> Result<Vec<u8>> {
    let mut line = serde_json::to_vec(frame)?;
    line.push(b'\n');
    Ok(line)
}

/// Accumulates raw bytes from the link and yields parsed frames.
#[derive(Default)]
pub struct LineAssembler {
    buffer: Vec<u8>,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes; returns every complete, parseable frame they finish.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();

        for &b in bytes {
            if b == b'\n' {
                if let Some(frame) = Self::parse_line(&self.buffer) {
                    frames.push(frame);
                }
                self.buffer.clear();
            } else {
                self.buffer.push(b);
                if self.buffer.len() > MAX_LINE_BYTES {
                    debug!("discarding oversized unterminated line");
                    self.buffer.clear();
                }
            }
        }

        frames
    }

    fn parse_line(line: &[u8]) -> Option<Frame> {
        let trimmed: &[u8] = {
            let start = line.iter().position(|b| !b.is_ascii_whitespace())?;
            let end = line.iter().rposition(|b| !b.is_ascii_whitespace())?;
            &line[start..=end]
        };
        match serde_json::from_slice::<Frame>(trimmed) {
            Ok(frame) => Some(frame),
            Err(e) => {
                debug!("dropping unparseable line: {}", e);
                None
            }
        }
    }
}
