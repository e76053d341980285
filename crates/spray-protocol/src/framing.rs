//! Incremental splitting of a byte stream into line records.
//!
//! Reads from a socket arrive in arbitrary chunks. [`LineFramer`] buffers
//! them and yields one [`Frame`] per complete line, so the records produced
//! never depend on where the chunk boundaries fell.

/// Output of the framer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A complete line with surrounding whitespace trimmed. Never empty.
    Line(Vec<u8>),
    /// A line longer than the limit was dropped, terminator included.
    Oversized {
        /// Number of bytes discarded.
        discarded: usize,
    },
}

/// Splits inbound bytes at `\n`, bounding each line to `max_line_bytes`.
///
/// A line that grows past the limit is dropped and the framer skips
/// everything up to the next line feed before resuming.
#[derive(Debug)]
pub struct LineFramer {
    buffer: Vec<u8>,
    max_line_bytes: usize,
    // Bytes dropped so far from the oversized line being skipped.
    skipping: Option<usize>,
}

impl LineFramer {
    /// Creates a framer. A limit of zero is raised to one byte.
    #[must_use]
    pub fn new(max_line_bytes: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_line_bytes: max_line_bytes.max(1),
            skipping: None,
        }
    }

    /// Longest accepted line, terminator included.
    #[must_use]
    pub const fn max_line_bytes(&self) -> usize {
        self.max_line_bytes
    }

    /// Bytes held back waiting for a line feed.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Feeds a chunk and returns the frames it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();
        let mut chunk = chunk;

        if let Some(dropped) = self.skipping {
            match chunk.iter().position(|byte| *byte == b'\n') {
                Some(end) => {
                    frames.push(Frame::Oversized {
                        discarded: dropped + end + 1,
                    });
                    self.skipping = None;
                    chunk = chunk.get(end + 1..).unwrap_or_default();
                }
                None => {
                    self.skipping = Some(dropped + chunk.len());
                    return frames;
                }
            }
        }

        let search_from = self.buffer.len();
        self.buffer.extend_from_slice(chunk);
        self.drain_lines(search_from, &mut frames);

        if self.buffer.len() > self.max_line_bytes {
            self.skipping = Some(self.buffer.len());
            self.buffer.clear();
        }
        frames
    }

    /// Consumes the framer at end of stream and returns the size of any
    /// unterminated tail, which is never dispatched.
    #[must_use]
    pub fn finish(self) -> usize {
        self.buffer.len() + self.skipping.unwrap_or(0)
    }

    fn drain_lines(&mut self, search_from: usize, frames: &mut Vec<Frame>) {
        let Some(complete) = self
            .buffer
            .get(search_from..)
            .and_then(|tail| tail.iter().rposition(|byte| *byte == b'\n'))
            .map(|offset| search_from + offset + 1)
        else {
            return;
        };
        let rest = self.buffer.split_off(complete);
        let complete_lines = std::mem::replace(&mut self.buffer, rest);

        for record in complete_lines.split_inclusive(|byte| *byte == b'\n') {
            if record.len() > self.max_line_bytes {
                frames.push(Frame::Oversized {
                    discarded: record.len(),
                });
            } else {
                let line = record.trim_ascii();
                if !line.is_empty() {
                    frames.push(Frame::Line(line.to_vec()));
                }
            }
        }
    }
}
