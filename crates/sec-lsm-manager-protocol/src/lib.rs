//! Line-oriented record codec shared by the sec-lsm-manager daemon and client.
//!
//! A record is a list of byte fields. On the wire, fields are separated by a
//! single space and a record ends with a line feed. Spaces, line feeds and
//! backslashes inside a field are escaped with a backslash. The [`Encoder`]
//! and [`Decoder`] each own an independent fixed-capacity [`RingBuffer`] of
//! [`BUFFER_SIZE`] bytes, and no record may carry more than [`MAX_FIELDS`]
//! fields.

mod decoder;
mod encoder;
mod error;
mod ring;
pub mod wire;

pub use decoder::{Decoder, Record};
pub use encoder::Encoder;
pub use error::CodecError;
pub use ring::RingBuffer;
pub use wire::ErrorKind;

/// Maximum number of fields in one record.
pub const MAX_FIELDS: usize = 20;

/// Capacity in bytes of each direction's buffer.
pub const BUFFER_SIZE: usize = 2000;

/// Byte separating two fields of a record.
pub const FIELD_SEPARATOR: u8 = b' ';

/// Byte terminating a record.
pub const RECORD_SEPARATOR: u8 = b'\n';

/// Byte escaping a separator or another escape inside a field.
pub const ESCAPE: u8 = b'\\';

/// Returns `true` for the bytes that carry framing meaning on the wire.
#[must_use]
pub const fn is_special(byte: u8) -> bool {
    matches!(byte, FIELD_SEPARATOR | RECORD_SEPARATOR | ESCAPE)
}
