//! Entry header codec.
//!
//! Every entry starts with an 80-byte header; all integers little-endian:
//!
//! | Offset | Size | Field                |
//! |--------|------|----------------------|
//! | 0x00   | 64   | name (Shift_JIS, NUL-terminated) |
//! | 0x40   | 4    | header_size (0x50)   |
//! | 0x44   | 4    | file_size            |
//! | 0x48   | 4    | next_header_offset   |
//! | 0x4C   | 4    | unknown (0x43424140) |
//!
//! `next_header_offset` is relative to the start of the header carrying it.
//! The archive ends with a terminator: empty name, `file_size` and
//! `next_header_offset` both `-1`.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Cursor, Write};

use crate::codec::{decode_name, encode_name, NAME_FIELD_SIZE};
use crate::error::{PakError, PakResult};

/// On-disk size of one header.
pub const HEADER_SIZE: usize = 0x50;
/// Value observed in the last header field of every known archive.
pub const UNKNOWN_CONST: i32 = 0x43424140;
/// Payloads are padded so the next header starts on this boundary.
pub const ALIGNMENT: usize = 16;
/// `file_size` / `next_header_offset` of the terminator.
pub const SENTINEL: i32 = -1;
/// Largest payload whose `next_header_offset` still fits an `i32`.
pub const MAX_FILE_SIZE: u64 = 0x7FFF_FFA0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryHeader {
    pub name:               String,
    pub header_size:        i32,
    pub file_size:          i32,
    pub next_header_offset: i32,
    pub unknown:            i32,
}

impl EntryHeader {
    /// Header for a payload of `file_size` bytes, padded to [`ALIGNMENT`].
    ///
    /// Returns `None` when `file_size` exceeds [`MAX_FILE_SIZE`].
    pub fn for_file(name: impl Into<String>, file_size: u64) -> Option<Self> {
        if file_size > MAX_FILE_SIZE {
            return None;
        }
        let next = HEADER_SIZE as u64 + file_size + alignment_for(file_size) as u64;
        Some(Self {
            name:               name.into(),
            header_size:        HEADER_SIZE as i32,
            file_size:          file_size as i32,
            next_header_offset: next as i32,
            unknown:            UNKNOWN_CONST,
        })
    }

    pub fn terminator() -> Self {
        Self {
            name:               String::new(),
            header_size:        HEADER_SIZE as i32,
            file_size:          SENTINEL,
            next_header_offset: SENTINEL,
            unknown:            UNKNOWN_CONST,
        }
    }

    pub fn with_unknown(mut self, unknown: i32) -> Self {
        self.unknown = unknown;
        self
    }

    /// An empty name marks the end of the archive.
    pub fn is_terminator(&self) -> bool {
        self.name.is_empty()
    }

    /// Bytes between the end of the payload and the next header, as the
    /// header declares them.  Negative when the offsets are inconsistent.
    pub fn padding_len(&self) -> i64 {
        self.next_header_offset as i64 - self.header_size as i64 - self.file_size as i64
    }

    /// Decode a header from the first [`HEADER_SIZE`] bytes of `buf`.
    ///
    /// No cross-field validation is done here.
    pub fn decode(buf: &[u8]) -> PakResult<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(PakError::CorruptArchive(format!(
                "header needs {HEADER_SIZE} bytes, got {}",
                buf.len()
            )));
        }
        let name = decode_name(&buf[..NAME_FIELD_SIZE])?;

        let mut fields = Cursor::new(&buf[NAME_FIELD_SIZE..HEADER_SIZE]);
        Ok(Self {
            name,
            header_size:        fields.read_i32::<LittleEndian>()?,
            file_size:          fields.read_i32::<LittleEndian>()?,
            next_header_offset: fields.read_i32::<LittleEndian>()?,
            unknown:            fields.read_i32::<LittleEndian>()?,
        })
    }

    /// Encode all five fields as held.  The terminator's name slot is all
    /// zeros; any other name must be encodable.
    pub fn encode(&self) -> PakResult<[u8; HEADER_SIZE]> {
        let field = if self.is_terminator() {
            [0u8; NAME_FIELD_SIZE]
        } else {
            encode_name(&self.name)?
        };

        let mut buf = [0u8; HEADER_SIZE];
        buf[..NAME_FIELD_SIZE].copy_from_slice(&field);
        let mut tail = &mut buf[NAME_FIELD_SIZE..];
        tail.write_i32::<LittleEndian>(self.header_size)?;
        tail.write_i32::<LittleEndian>(self.file_size)?;
        tail.write_i32::<LittleEndian>(self.next_header_offset)?;
        tail.write_i32::<LittleEndian>(self.unknown)?;
        Ok(buf)
    }

    pub fn write<W: Write>(&self, mut writer: W) -> PakResult<()> {
        writer.write_all(&self.encode()?)?;
        Ok(())
    }
}

/// Encode a header with the canonical `header_size` and `unknown` values.
pub fn encode_header(
    name:               &str,
    file_size:          i32,
    next_header_offset: i32,
) -> PakResult<[u8; HEADER_SIZE]> {
    EntryHeader {
        name:               name.to_owned(),
        header_size:        HEADER_SIZE as i32,
        file_size,
        next_header_offset,
        unknown:            UNKNOWN_CONST,
    }
    .encode()
}

/// Padding needed after a payload of `file_size` bytes.
#[inline]
pub fn alignment_for(file_size: u64) -> usize {
    ((ALIGNMENT as u64 - file_size % ALIGNMENT as u64) % ALIGNMENT as u64) as usize
}

pub(crate) fn unexpected_eof(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, format!("stream ended inside {what}"))
}
