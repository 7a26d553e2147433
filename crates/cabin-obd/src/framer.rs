//! Line framing over a byte stream
//!
//! Raw chunks are appended to an accumulator; every delimiter-terminated
//! prefix is cut out, decoded (lossy UTF-8), trimmed and emitted. At most
//! one partial line stays buffered between reads, and it is bounded by
//! `max_line_bytes`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::{Buf, BytesMut};
use tracing::{debug, trace};

use crate::config::FramingConfig;
use crate::error::ObdError;
use crate::transport::{Transport, TransportError};

/// Incremental line splitter
#[derive(Debug)]
pub struct LineFramer {
    buffer: BytesMut,
    delimiter: u8,
    max_line: usize,
}

impl LineFramer {
    pub fn new(config: &FramingConfig) -> Self {
        Self {
            buffer: BytesMut::with_capacity(config.read_chunk_bytes),
            delimiter: config.delimiter,
            max_line: config.max_line_bytes,
        }
    }

    /// Append a chunk and push every line it completes onto `lines`
    ///
    /// Fails once a line (complete or still partial) exceeds the maximum.
    /// Lines completed ahead of the overlong one are still pushed. The
    /// framer should be discarded after a failure.
    pub fn feed(&mut self, chunk: &[u8], lines: &mut Vec<String>) -> Result<(), ObdError> {
        self.buffer.extend_from_slice(chunk);

        while let Some(pos) = self.buffer.iter().position(|&b| b == self.delimiter) {
            if pos > self.max_line {
                return Err(ObdError::FrameTooLong {
                    len: pos,
                    max: self.max_line,
                });
            }
            let raw = self.buffer.split_to(pos);
            self.buffer.advance(1);
            lines.push(String::from_utf8_lossy(&raw).trim().to_string());
        }

        if self.buffer.len() > self.max_line {
            return Err(ObdError::FrameTooLong {
                len: self.buffer.len(),
                max: self.max_line,
            });
        }

        Ok(())
    }

    /// Bytes of the current partial line
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

/// Lazy, non-restartable sequence of lines read from a transport
///
/// Yields `Ok(line)` for each framed line. The sequence ends (`None`) on
/// end of stream or as soon as the stop flag is cleared, even with lines
/// still queued. A read or framing failure is yielded once as `Err`, after
/// the lines framed ahead of it, and then the sequence ends.
pub struct LineReader {
    transport: Arc<dyn Transport>,
    framer: LineFramer,
    chunk: Vec<u8>,
    framed: Vec<String>,
    ready: VecDeque<String>,
    failure: Option<ObdError>,
    keep_running: Option<Arc<AtomicBool>>,
    finished: bool,
}

impl LineReader {
    pub fn new(transport: Arc<dyn Transport>, config: &FramingConfig) -> Self {
        Self {
            transport,
            framer: LineFramer::new(config),
            chunk: vec![0u8; config.read_chunk_bytes.max(1)],
            framed: Vec::new(),
            ready: VecDeque::new(),
            failure: None,
            keep_running: None,
            finished: false,
        }
    }

    /// Check `flag` before every read and every yielded line; stop once
    /// it is false
    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.keep_running = Some(flag);
        self
    }

    fn should_continue(&self) -> bool {
        self.keep_running
            .as_ref()
            .map(|f| f.load(Ordering::SeqCst))
            .unwrap_or(true)
    }
}

impl Iterator for LineReader {
    type Item = Result<String, ObdError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            // Also covers a read that returned after stop(): its lines are
            // dropped rather than yielded
            if !self.should_continue() {
                self.ready.clear();
                self.failure = None;
                self.finished = true;
                return None;
            }
            if let Some(line) = self.ready.pop_front() {
                return Some(Ok(line));
            }
            if let Some(e) = self.failure.take() {
                return Some(Err(e));
            }
            if self.finished {
                return None;
            }

            match self.transport.read(&mut self.chunk) {
                Ok(0) => {
                    debug!(pending = self.framer.pending(), "End of stream");
                    self.finished = true;
                }
                Ok(n) => {
                    trace!(bytes = n, "Read chunk");
                    let fed = self.framer.feed(&self.chunk[..n], &mut self.framed);
                    self.ready.extend(self.framed.drain(..));
                    if let Err(e) = fed {
                        self.failure = Some(e);
                        self.finished = true;
                    }
                }
                Err(TransportError::ConnectionClosed) => {
                    // Closed by stop(); not a failure
                    self.finished = true;
                }
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e.into()));
                }
            }
        }
    }
}
