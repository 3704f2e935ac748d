use std::io::{self, Read};

use crate::error::{Result, RouteError};

/// Default upper bound of bytes buffered between `mark` and `reset`.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 64 * 1024 * 1024;

/// A reader that remembers everything read since `mark` so detection can
/// rewind and offer the same bytes to the next candidate format.
///
/// At most `limit` bytes are retained. Once a reader consumes more than that,
/// the buffer is dropped and `reset` reports `RewindExhausted`.
pub struct RewindableSource<R> {
    inner: R,
    buffer: Vec<u8>,
    position: usize,
    limit: usize,
    marked: bool,
    exhausted: bool,
}

impl<R: Read> RewindableSource<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
            position: 0,
            limit: DEFAULT_READ_BUFFER_SIZE,
            marked: false,
            exhausted: false,
        }
    }

    /// Start remembering bytes from the current position on.
    pub fn mark(&mut self, limit: usize) {
        self.buffer.drain(..self.position);
        self.position = 0;
        self.limit = limit;
        self.marked = true;
        self.exhausted = self.buffer.len() > limit;
    }

    /// Rewind to the mark.
    pub fn reset(&mut self) -> Result<()> {
        if !self.marked || self.exhausted {
            return Err(RouteError::RewindExhausted { limit: self.limit });
        }
        self.position = 0;
        Ok(())
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for RewindableSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.position < self.buffer.len() {
            let n = (&self.buffer[self.position..]).read(buf)?;
            self.position += n;
            return Ok(n);
        }

        let n = self.inner.read(buf)?;
        if self.marked && !self.exhausted {
            if self.buffer.len() + n > self.limit {
                self.exhausted = true;
                self.buffer = Vec::new();
            } else {
                self.buffer.extend_from_slice(&buf[..n]);
            }
        }
        self.position = self.buffer.len();
        Ok(n)
    }
}
