pub mod codec;
pub mod header;
pub mod confirm;
pub mod error;
pub mod io_stream;
pub mod archive;

pub use header::{EntryHeader, encode_header, alignment_for, HEADER_SIZE, UNKNOWN_CONST};
pub use confirm::{ConfirmationHook, FixedAnswer};
pub use error::{PakError, PakResult};
pub use io_stream::{PakReader, PakWriter, Entry};
pub use archive::{
    extract, list, rebuild, EntryInfo, EntryOrder, ExtractOptions, ListOptions, RebuildOptions,
};
