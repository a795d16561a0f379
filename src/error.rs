use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PakError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A name field could not be decoded, or a file name has characters
    /// with no Shift_JIS representation.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Encoded name plus its NUL terminator does not fit the 64-byte field.
    #[error("Name too long: \"{name}\" encodes to {len} bytes (maximum 63)")]
    NameTooLong { name: String, len: usize },

    #[error("Entry name is empty")]
    EmptyName,

    /// fileSize is a signed 32-bit field on disk.
    #[error("File too large for a PAK entry: {} ({size} bytes)", path.display())]
    FileTooLarge { path: PathBuf, size: u64 },

    #[error("Corrupt archive: {0}")]
    CorruptArchive(String),

    #[error("Aborted: {0}")]
    UserAborted(String),
}

impl From<walkdir::Error> for PakError {
    fn from(e: walkdir::Error) -> Self {
        let msg = e.to_string();
        let io = e
            .into_io_error()
            .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, msg));
        PakError::Io(io)
    }
}

pub type PakResult<T> = Result<T, PakError>;
