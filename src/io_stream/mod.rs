//! Streaming archive engine: reader and writer.
//!
//! # Reader
//! [`PakReader`] walks an archive header by header.  The format has no
//! index: each header says how far away the next one is, so the only way
//! through is forward.  The reader is a small state machine:
//!
//! ```text
//! AwaitingHeader -> (decode) -> StreamingPayload -> SkippingPadding -> AwaitingHeader
//!                      |
//!                      +-> Finished   (terminator header)
//! ```
//!
//! Payload bytes are moved through one bounded transfer buffer; a read is
//! never larger than what is left of the current payload, so a payload's
//! last chunk never swallows the start of the next header.
//!
//! # Writer
//! [`PakWriter`] accepts entries one at a time, writes the header, streams
//! the payload, pads it to the 16-byte boundary and, on
//! [`finish`](PakWriter::finish), appends the terminator.
//!
//! Neither side seeks; any `Read`/`Write` works.  After an error the
//! reader or writer is left mid-record and must not be reused.

use std::io::{self, Read, Write};
use std::path::PathBuf;

use crate::confirm::ConfirmationHook;
use crate::error::{PakError, PakResult};
use crate::header::{
    alignment_for, unexpected_eof, EntryHeader, ALIGNMENT, HEADER_SIZE, SENTINEL, UNKNOWN_CONST,
};

/// Default transfer buffer: 8 KiB.
pub const DEFAULT_BUFFER_SIZE: usize = 8192;

const ZERO_PADDING: [u8; ALIGNMENT] = [0u8; ALIGNMENT];

// ── Reader ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    AwaitingHeader,
    StreamingPayload { remaining: u64, padding: u64 },
    SkippingPadding { remaining: u64 },
    /// Terminator decoded; nothing after it is read.
    Finished,
}

/// A decoded, validated header and where it sits in the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub header: EntryHeader,
    /// Absolute offset of the header.
    pub offset: u64,
}

pub struct PakReader<R: Read> {
    reader:      R,
    archive_len: u64,
    buf:         Vec<u8>,
    position:    u64,
    state:       ReaderState,
}

impl<R: Read> PakReader<R> {
    /// `archive_len` is the total byte length of the archive; every
    /// declared `file_size` must be smaller.
    pub fn new(reader: R, archive_len: u64) -> Self {
        Self::with_buffer_size(reader, archive_len, DEFAULT_BUFFER_SIZE)
    }

    pub fn with_buffer_size(reader: R, archive_len: u64, buffer_size: usize) -> Self {
        Self {
            reader,
            archive_len,
            buf:      vec![0u8; buffer_size.max(1)],
            position: 0,
            state:    ReaderState::AwaitingHeader,
        }
    }

    pub fn state(&self) -> ReaderState { self.state }

    /// Bytes consumed from the source so far.
    pub fn position(&self) -> u64 { self.position }

    /// Decode and validate the next header.
    ///
    /// Returns `None` once the terminator is reached.  A payload left
    /// unread by the previous entry is skipped first.
    pub fn next_entry(&mut self, hook: &mut dyn ConfirmationHook) -> PakResult<Option<Entry>> {
        match self.state {
            ReaderState::Finished => return Ok(None),
            ReaderState::StreamingPayload { .. } | ReaderState::SkippingPadding { .. } => {
                self.skip_payload()?;
            }
            ReaderState::AwaitingHeader => {}
        }

        let offset = self.position;
        let header = self.read_header()?;
        tracing::debug!(
            offset,
            name = %header.name,
            header_size = header.header_size,
            file_size = header.file_size,
            next_header_offset = header.next_header_offset,
            unknown = header.unknown,
            "decoded header"
        );

        if header.is_terminator() {
            if header.file_size != SENTINEL || header.next_header_offset != SENTINEL {
                tracing::warn!(
                    "Terminator at {offset:#x} has odd sizes \
                     (file size {:#x}, next header offset {:#x})",
                    header.file_size,
                    header.next_header_offset
                );
            }
            self.state = ReaderState::Finished;
            return Ok(None);
        }

        let padding = self.validate(&header, offset, hook)?;
        self.state = ReaderState::StreamingPayload {
            remaining: header.file_size as u64,
            padding,
        };
        Ok(Some(Entry { header, offset }))
    }

    /// Stream the pending payload into `out`, then skip its padding.
    /// Returns the number of payload bytes written.
    pub fn copy_payload<W: Write + ?Sized>(&mut self, out: &mut W) -> PakResult<u64> {
        let (mut remaining, padding) = match self.state {
            ReaderState::StreamingPayload { remaining, padding } => (remaining, padding),
            ReaderState::SkippingPadding { .. } => {
                self.skip_padding()?;
                return Ok(0);
            }
            _ => {
                let err = io::Error::new(io::ErrorKind::InvalidInput, "no payload pending");
                return Err(err.into());
            }
        };

        let mut written = 0u64;
        while remaining > 0 {
            let n = self.fill(remaining, "payload")?;
            out.write_all(&self.buf[..n])?;
            remaining -= n as u64;
            written   += n as u64;
        }

        self.state = ReaderState::SkippingPadding { remaining: padding };
        self.skip_padding()?;
        Ok(written)
    }

    /// Discard the pending payload and its padding.
    pub fn skip_payload(&mut self) -> PakResult<u64> {
        self.copy_payload(&mut io::sink())
    }

    // ── Internal helpers ─────────────────────────────────────────────────────

    fn read_header(&mut self) -> PakResult<EntryHeader> {
        let mut raw = [0u8; HEADER_SIZE];
        let mut filled = 0;
        while filled < HEADER_SIZE {
            match self.reader.read(&mut raw[filled..]) {
                Ok(0) => {
                    return Err(PakError::CorruptArchive(format!(
                        "archive ends at offset {:#x} without a terminator header",
                        self.position + filled as u64
                    )));
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        self.position += HEADER_SIZE as u64;
        EntryHeader::decode(&raw)
    }

    /// Cross-field checks.  Returns the padding to skip after the payload.
    fn validate(
        &self,
        header: &EntryHeader,
        offset: u64,
        hook:   &mut dyn ConfirmationHook,
    ) -> PakResult<u64> {
        if header.header_size != HEADER_SIZE as i32 {
            let prompt = format!(
                "Odd header size ({:#x}) for \"{}\" at offset {offset:#x}, \
                 would you like to continue extracting?",
                header.header_size, header.name
            );
            if !hook.confirm(&prompt) {
                return Err(PakError::UserAborted(format!(
                    "odd header size {:#x} for \"{}\"",
                    header.header_size, header.name
                )));
            }
        }

        // Checked before anything is allocated or created for the entry.
        if header.file_size < 0 || header.file_size as u64 >= self.archive_len {
            return Err(PakError::CorruptArchive(format!(
                "invalid file size {:#x} for \"{}\" (archive is {} bytes)",
                header.file_size, header.name, self.archive_len
            )));
        }

        if header.next_header_offset < header.file_size {
            let prompt = format!(
                "Odd next header offset ({:#x}) for \"{}\" at offset {offset:#x}, \
                 would you like to continue extracting?",
                header.next_header_offset, header.name
            );
            if !hook.confirm(&prompt) {
                return Err(PakError::UserAborted(format!(
                    "odd next header offset {:#x} for \"{}\"",
                    header.next_header_offset, header.name
                )));
            }
        }

        if header.unknown != UNKNOWN_CONST {
            tracing::warn!(
                "Odd unknown value for \"{}\": expected {UNKNOWN_CONST:#x}, got {:#x}",
                header.name,
                header.unknown
            );
        }

        let padding = header.padding_len();
        if padding < 0 {
            return Err(PakError::CorruptArchive(format!(
                "next header of \"{}\" would start {} bytes before the end of its payload",
                header.name, -padding
            )));
        }
        if padding as usize != alignment_for(header.file_size as u64) {
            tracing::debug!(name = %header.name, padding, "irregular padding");
        }
        Ok(padding as u64)
    }

    fn skip_padding(&mut self) -> PakResult<()> {
        let mut remaining = match self.state {
            ReaderState::SkippingPadding { remaining } => remaining,
            _ => return Ok(()),
        };
        while remaining > 0 {
            let n = self.fill(remaining, "padding")?;
            remaining -= n as u64;
        }
        self.state = ReaderState::AwaitingHeader;
        Ok(())
    }

    /// One read of at most `limit` bytes into the transfer buffer.
    fn fill(&mut self, limit: u64, what: &str) -> PakResult<usize> {
        let want = limit.min(self.buf.len() as u64) as usize;
        loop {
            match self.reader.read(&mut self.buf[..want]) {
                Ok(0) => return Err(unexpected_eof(what).into()),
                Ok(n) => {
                    self.position += n as u64;
                    return Ok(n);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn already_finished() -> PakError {
    io::Error::new(io::ErrorKind::InvalidInput, "archive already finished").into()
}

// ── Writer ───────────────────────────────────────────────────────────────────

pub struct PakWriter<W: Write> {
    writer:          W,
    buf:             Vec<u8>,
    unknown:         i32,
    entries_written: usize,
    bytes_written:   u64,
    finished:        bool,
}

impl<W: Write> PakWriter<W> {
    pub fn new(writer: W) -> Self {
        Self::with_options(writer, DEFAULT_BUFFER_SIZE, UNKNOWN_CONST)
    }

    /// `unknown` is written to the last field of every header, the
    /// terminator included.
    pub fn with_options(writer: W, buffer_size: usize, unknown: i32) -> Self {
        Self {
            writer,
            buf:             vec![0u8; buffer_size.max(1)],
            unknown,
            entries_written: 0,
            bytes_written:   0,
            finished:        false,
        }
    }

    /// Append one entry whose payload is the next `size` bytes of `data`.
    ///
    /// The header is fully encoded before anything is written, so a bad
    /// name or size leaves the sink unchanged.
    pub fn add_entry<R: Read>(&mut self, name: &str, size: u64, mut data: R) -> PakResult<()> {
        if self.finished {
            return Err(already_finished());
        }

        let header = EntryHeader::for_file(name, size)
            .ok_or_else(|| PakError::FileTooLarge { path: PathBuf::from(name), size })?
            .with_unknown(self.unknown);
        let encoded = header.encode()?;

        self.writer.write_all(&encoded)?;
        self.bytes_written += HEADER_SIZE as u64;

        let mut remaining = size;
        while remaining > 0 {
            let want = remaining.min(self.buf.len() as u64) as usize;
            let n = match data.read(&mut self.buf[..want]) {
                Ok(0) => return Err(unexpected_eof(&format!("source data for \"{name}\"")).into()),
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            self.writer.write_all(&self.buf[..n])?;
            remaining -= n as u64;
        }

        let padding = alignment_for(size);
        self.writer.write_all(&ZERO_PADDING[..padding])?;
        self.bytes_written += size + padding as u64;
        self.entries_written += 1;

        tracing::debug!(name, size, padding, next = header.next_header_offset, "wrote entry");
        Ok(())
    }

    pub fn add_bytes(&mut self, name: &str, data: &[u8]) -> PakResult<()> {
        self.add_entry(name, data.len() as u64, data)
    }

    /// Write the terminator and flush.  Must be called exactly once.
    pub fn finish(&mut self) -> PakResult<()> {
        if self.finished {
            return Err(already_finished());
        }
        EntryHeader::terminator()
            .with_unknown(self.unknown)
            .write(&mut self.writer)?;
        self.writer.flush()?;
        self.bytes_written += HEADER_SIZE as u64;
        self.finished = true;
        Ok(())
    }

    pub fn entries_written(&self) -> usize { self.entries_written }

    /// Header, payload and padding bytes written so far.
    pub fn bytes_written(&self) -> u64 { self.bytes_written }

    pub fn get_ref(&self) -> &W { &self.writer }

    pub fn into_inner(self) -> W { self.writer }
}
