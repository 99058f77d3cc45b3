//! Record decoder reading escaped fields from an input ring.

use std::io::{self, Read};
use std::str::Utf8Error;

use crate::error::CodecError;
use crate::ring::RingBuffer;
use crate::{BUFFER_SIZE, ESCAPE, FIELD_SEPARATOR, MAX_FIELDS, RECORD_SEPARATOR, is_special};

/// One decoded record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<Vec<u8>>,
}

impl Record {
    /// Builds a record from owned or borrowed fields.
    pub fn new<I, F>(fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<Vec<u8>>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` for a record without fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Raw field bytes.
    #[must_use]
    pub fn fields(&self) -> &[Vec<u8>] {
        &self.fields
    }

    /// Raw bytes of field `index`.
    #[must_use]
    pub fn field(&self, index: usize) -> Option<&[u8]> {
        self.fields.get(index).map(Vec::as_slice)
    }

    /// Fields as text.
    ///
    /// # Errors
    ///
    /// Returns the first UTF-8 decoding failure.
    pub fn to_strs(&self) -> Result<Vec<&str>, Utf8Error> {
        self.fields
            .iter()
            .map(|field| std::str::from_utf8(field))
            .collect()
    }

    /// Consumes the record, yielding its fields.
    #[must_use]
    pub fn into_fields(self) -> Vec<Vec<u8>> {
        self.fields
    }
}

enum Scan {
    Incomplete,
    Complete { record: Record, consumed: usize },
}

/// Extracts records from a bounded input buffer.
///
/// [`Decoder::try_record`] returns the record at the head of the buffer
/// without removing it; [`Decoder::advance`] drops it. Bare record
/// separators are skipped unless empty records are allowed.
#[derive(Debug, Clone)]
pub struct Decoder {
    buffer: RingBuffer<BUFFER_SIZE>,
    allow_empty: bool,
    returned: Option<usize>,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder {
    /// Creates a decoder that skips empty records.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buffer: RingBuffer::new(),
            allow_empty: false,
            returned: None,
        }
    }

    /// Creates a decoder with the given empty-record mode.
    #[must_use]
    pub const fn with_allow_empty(allow_empty: bool) -> Self {
        Self {
            buffer: RingBuffer::new(),
            allow_empty,
            returned: None,
        }
    }

    /// Whether bare record separators are surfaced as empty records.
    #[must_use]
    pub const fn allow_empty(&self) -> bool {
        self.allow_empty
    }

    /// Switches the empty-record mode.
    pub const fn set_allow_empty(&mut self, allow_empty: bool) {
        self.allow_empty = allow_empty;
    }

    /// Number of buffered bytes not yet consumed.
    #[must_use]
    pub const fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Appends raw transport bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::MessageTooBig`] when `bytes` do not fit; the
    /// buffer is left unchanged.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        if self.buffer.push(bytes) {
            Ok(())
        } else {
            Err(CodecError::MessageTooBig)
        }
    }

    /// Performs one read from `reader` into the free space of the buffer.
    ///
    /// Returns the number of bytes read; zero means end of stream.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::WouldBlock`] when no data is ready,
    /// [`CodecError::MessageTooBig`] when the buffer has no room left and
    /// [`CodecError::Io`] on any other transport failure.
    pub fn fill_from<R: Read + ?Sized>(&mut self, reader: &mut R) -> Result<usize, CodecError> {
        loop {
            let slot = self.buffer.writable();
            if slot.is_empty() {
                return Err(CodecError::MessageTooBig);
            }
            match reader.read(slot) {
                Ok(count) => {
                    self.buffer.commit(count);
                    return Ok(count);
                }
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => {
                    return Err(CodecError::WouldBlock);
                }
                Err(error) => return Err(CodecError::Io(error)),
            }
        }
    }

    /// Returns the record at the head of the buffer.
    ///
    /// `Ok(None)` means no complete record has arrived yet. Calling this
    /// again before [`Decoder::advance`] yields the same record.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::MessageTooBig`] when the buffer is full without
    /// a complete record, or a record carries more than [`MAX_FIELDS`]
    /// fields.
    pub fn try_record(&mut self) -> Result<Option<Record>, CodecError> {
        loop {
            match self.scan()? {
                Scan::Incomplete if self.buffer.is_full() => {
                    return Err(CodecError::MessageTooBig);
                }
                Scan::Incomplete => {
                    self.returned = None;
                    return Ok(None);
                }
                Scan::Complete { record, consumed } if record.is_empty() && !self.allow_empty => {
                    self.buffer.discard(consumed);
                }
                Scan::Complete { record, consumed } => {
                    self.returned = Some(consumed);
                    return Ok(Some(record));
                }
            }
        }
    }

    /// Drops the record last returned by [`Decoder::try_record`].
    pub fn advance(&mut self) {
        if let Some(consumed) = self.returned.take() {
            self.buffer.discard(consumed);
        }
    }

    /// Drops every buffered byte.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.returned = None;
    }

    fn scan(&self) -> Result<Scan, CodecError> {
        let mut fields: Vec<Vec<u8>> = Vec::new();
        let mut field = Vec::new();
        let mut offset = 0;
        while let Some(byte) = self.buffer.get(offset) {
            match byte {
                ESCAPE => match self.buffer.get(offset + 1) {
                    None => return Ok(Scan::Incomplete),
                    Some(next) if is_special(next) => {
                        field.push(next);
                        offset += 2;
                        continue;
                    }
                    Some(_) => field.push(ESCAPE),
                },
                FIELD_SEPARATOR => {
                    fields.push(std::mem::take(&mut field));
                    if fields.len() >= MAX_FIELDS {
                        return Err(CodecError::MessageTooBig);
                    }
                }
                RECORD_SEPARATOR => {
                    if !fields.is_empty() || !field.is_empty() {
                        fields.push(field);
                    }
                    return Ok(Scan::Complete {
                        record: Record { fields },
                        consumed: offset + 1,
                    });
                }
                other => field.push(other),
            }
            offset += 1;
        }
        Ok(Scan::Incomplete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn decode_one(input: &[u8]) -> Option<Record> {
        let mut decoder = Decoder::new();
        decoder.feed(input).expect("feed");
        decoder.try_record().expect("decode")
    }

    #[rstest]
    #[case(b"done\n".as_slice(), vec!["done"])]
    #[case(b"a\\ b c\n".as_slice(), vec!["a b", "c"])]
    #[case(b"a \n".as_slice(), vec!["a", ""])]
    #[case(b"\\x\n".as_slice(), vec!["\\x"])]
    #[case(b"tail\\\\\n".as_slice(), vec!["tail\\"])]
    #[case(b"nl\\\nx\n".as_slice(), vec!["nl\nx"])]
    fn unescapes_fields(#[case] input: &[u8], #[case] expected: Vec<&str>) {
        let record = decode_one(input).expect("complete record");
        assert_eq!(record.to_strs().expect("utf8"), expected);
    }

    #[test]
    fn waits_for_terminator() {
        assert_eq!(decode_one(b"partial"), None);
        assert_eq!(decode_one(b"escape\\"), None);
    }

    #[test]
    fn repeats_record_until_advanced() {
        let mut decoder = Decoder::new();
        decoder.feed(b"one\ntwo\n").expect("feed");
        let first = decoder.try_record().expect("decode");
        assert_eq!(decoder.try_record().expect("decode"), first);
        decoder.advance();
        let second = decoder.try_record().expect("decode").expect("record");
        assert_eq!(second.field(0), Some(b"two".as_slice()));
        decoder.advance();
        assert_eq!(decoder.try_record().expect("decode"), None);
        assert_eq!(decoder.buffered(), 0);
    }

    #[rstest]
    #[case(false, vec![vec!["x"]])]
    #[case(true, vec![vec![], vec!["x"]])]
    fn empty_record_mode(#[case] allow_empty: bool, #[case] expected: Vec<Vec<&str>>) {
        let mut decoder = Decoder::with_allow_empty(allow_empty);
        decoder.feed(b"\nx\n").expect("feed");
        let mut seen = Vec::new();
        while let Some(record) = decoder.try_record().expect("decode") {
            seen.push(
                record
                    .to_strs()
                    .expect("utf8")
                    .into_iter()
                    .map(str::to_owned)
                    .collect::<Vec<_>>(),
            );
            decoder.advance();
        }
        assert_eq!(seen, expected);
    }

    #[test]
    fn full_buffer_without_terminator_is_too_big() {
        let mut decoder = Decoder::new();
        decoder.feed(&[b'a'; BUFFER_SIZE]).expect("feed");
        assert!(matches!(
            decoder.try_record(),
            Err(CodecError::MessageTooBig)
        ));
    }

    #[test]
    fn too_many_fields_is_too_big() {
        let mut decoder = Decoder::new();
        let line = format!("{}\n", vec!["f"; MAX_FIELDS + 1].join(" "));
        decoder.feed(line.as_bytes()).expect("feed");
        assert!(matches!(
            decoder.try_record(),
            Err(CodecError::MessageTooBig)
        ));
    }

    #[test]
    fn exactly_max_fields_is_accepted() {
        let line = format!("{}\n", vec!["f"; MAX_FIELDS].join(" "));
        let record = decode_one(line.as_bytes()).expect("record");
        assert_eq!(record.len(), MAX_FIELDS);
    }

    #[test]
    fn fill_from_reads_into_free_space() {
        let mut decoder = Decoder::new();
        let mut source = b"id app\n".as_slice();
        assert_eq!(decoder.fill_from(&mut source).expect("read"), 7);
        assert_eq!(decoder.fill_from(&mut source).expect("eof"), 0);
        let record = decoder.try_record().expect("decode").expect("record");
        assert_eq!(record.to_strs().expect("utf8"), vec!["id", "app"]);
    }
}
