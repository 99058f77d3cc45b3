//! Record encoder writing escaped fields into an output ring.

use std::io::{self, Write};

use crate::error::CodecError;
use crate::ring::RingBuffer;
use crate::{BUFFER_SIZE, ESCAPE, FIELD_SEPARATOR, MAX_FIELDS, RECORD_SEPARATOR, is_special};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Open { mark: usize, fields: usize },
    Cancelled,
}

/// Builds records in a bounded output buffer.
///
/// A record is opened by [`Encoder::begin`], filled by [`Encoder::put_field`]
/// and sealed by [`Encoder::end`]. If any step would overflow the buffer or
/// the field limit, the whole record is rolled back and the remaining calls
/// for that record fail with [`CodecError::BufferFull`] until the next
/// `begin`. Bytes of an unsealed record are never handed to the transport.
#[derive(Debug, Clone)]
pub struct Encoder {
    buffer: RingBuffer<BUFFER_SIZE>,
    state: State,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder {
    /// Creates an encoder with an empty buffer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buffer: RingBuffer::new(),
            state: State::Idle,
        }
    }

    /// Opens a record, discarding any record left unsealed.
    pub fn begin(&mut self) {
        if let State::Open { mark, .. } = self.state {
            self.buffer.truncate(mark);
        }
        self.state = State::Open {
            mark: self.buffer.len(),
            fields: 0,
        };
    }

    /// Appends one field to the open record, opening one if needed.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::TooManyFields`] or [`CodecError::BufferFull`]
    /// after cancelling the record.
    pub fn put_field(&mut self, field: &[u8]) -> Result<(), CodecError> {
        let (mark, fields) = self.open_record()?;
        if fields == MAX_FIELDS {
            self.cancel();
            return Err(CodecError::TooManyFields);
        }
        let separated = fields == 0 || self.buffer.push(&[FIELD_SEPARATOR]);
        if !separated || !self.push_escaped(field) {
            self.cancel();
            return Err(CodecError::BufferFull);
        }
        self.state = State::Open {
            mark,
            fields: fields + 1,
        };
        Ok(())
    }

    /// Seals the open record, opening an empty one if needed.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::BufferFull`] when the terminator does not fit or
    /// the record was already cancelled.
    pub fn end(&mut self) -> Result<(), CodecError> {
        if let Err(error) = self.open_record() {
            self.state = State::Idle;
            return Err(error);
        }
        if !self.buffer.push(&[RECORD_SEPARATOR]) {
            self.cancel();
            self.state = State::Idle;
            return Err(CodecError::BufferFull);
        }
        self.state = State::Idle;
        Ok(())
    }

    /// Encodes a complete record from `fields`.
    ///
    /// # Errors
    ///
    /// Propagates the first failure of [`Encoder::put_field`] or
    /// [`Encoder::end`]; the buffer is then left as it was before the call.
    pub fn write_record<I, F>(&mut self, fields: I) -> Result<(), CodecError>
    where
        I: IntoIterator<Item = F>,
        F: AsRef<[u8]>,
    {
        self.begin();
        for field in fields {
            if let Err(error) = self.put_field(field.as_ref()) {
                self.state = State::Idle;
                return Err(error);
            }
        }
        self.end()
    }

    /// Drops the open record and rejects further fields until the next `begin`.
    pub fn cancel(&mut self) {
        if let State::Open { mark, .. } = self.state {
            self.buffer.truncate(mark);
        }
        self.state = State::Cancelled;
    }

    /// Number of sealed bytes waiting for the transport.
    #[must_use]
    pub const fn pending(&self) -> usize {
        match self.state {
            State::Open { mark, .. } => mark,
            State::Idle | State::Cancelled => self.buffer.len(),
        }
    }

    /// Returns `true` when no sealed byte waits for the transport.
    #[must_use]
    pub const fn is_flushed(&self) -> bool {
        self.pending() == 0
    }

    /// Sealed bytes in order, for inspection.
    pub fn sealed_bytes(&self) -> impl Iterator<Item = u8> + '_ {
        self.buffer.iter().take(self.pending())
    }

    /// Writes sealed bytes to `writer` until none remain.
    ///
    /// Progress is kept across calls, so a flush interrupted by
    /// [`CodecError::WouldBlock`] resumes where it stopped.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::WouldBlock`] when the writer cannot take more
    /// bytes now and [`CodecError::Io`] on any other transport failure.
    pub fn flush_to<W: Write + ?Sized>(&mut self, writer: &mut W) -> Result<usize, CodecError> {
        let mut written = 0;
        while !self.is_flushed() {
            let pending = self.pending();
            let readable = self.buffer.readable();
            let chunk = readable
                .get(..pending.min(readable.len()))
                .unwrap_or_default();
            match writer.write(chunk) {
                Ok(0) => return Err(CodecError::Io(io::ErrorKind::WriteZero.into())),
                Ok(count) => {
                    self.consume(count);
                    written += count;
                }
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => {
                    return Err(CodecError::WouldBlock);
                }
                Err(error) => return Err(CodecError::Io(error)),
            }
        }
        Ok(written)
    }

    fn consume(&mut self, count: usize) {
        self.buffer.discard(count);
        if let State::Open { mark, fields } = self.state {
            self.state = State::Open {
                mark: mark.saturating_sub(count),
                fields,
            };
        }
    }

    fn open_record(&mut self) -> Result<(usize, usize), CodecError> {
        match self.state {
            State::Idle => {
                self.begin();
                Ok((self.buffer.len(), 0))
            }
            State::Open { mark, fields } => Ok((mark, fields)),
            State::Cancelled => Err(CodecError::BufferFull),
        }
    }

    fn push_escaped(&mut self, field: &[u8]) -> bool {
        let mut bytes = field.iter().peekable();
        while let Some(&byte) = bytes.next() {
            let escaped = match byte {
                ESCAPE => bytes.peek().is_none_or(|next| is_special(**next)),
                other => is_special(other),
            };
            if escaped && !self.buffer.push(&[ESCAPE]) {
                return false;
            }
            if !self.buffer.push(&[byte]) {
                return false;
            }
        }
        true
    }
}
