//! High-level operations: extract, list and rebuild.
//!
//! ```no_run
//! use paktools::archive::{extract, rebuild, ExtractOptions, RebuildOptions};
//! use paktools::confirm::FixedAnswer;
//!
//! // Folder -> archive
//! rebuild("data", "data.pak", &mut FixedAnswer(true), &RebuildOptions::default())?;
//!
//! // Archive -> folder
//! let summary = extract("data.pak", "data", &mut FixedAnswer(true), &ExtractOptions::default())?;
//! println!("{} files", summary.files);
//! # Ok::<(), paktools::PakError>(())
//! ```

use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use crate::confirm::ConfirmationHook;
use crate::error::{PakError, PakResult};
use crate::header::{EntryHeader, ALIGNMENT, UNKNOWN_CONST};
use crate::io_stream::{PakReader, PakWriter, DEFAULT_BUFFER_SIZE};

// ── Options ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub buffer_size: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self { buffer_size: DEFAULT_BUFFER_SIZE }
    }
}

#[derive(Debug, Clone)]
pub struct ListOptions {
    /// Compute a BLAKE3 digest of every payload while scanning.
    pub hash_payloads: bool,
    pub buffer_size:   usize,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self { hash_payloads: false, buffer_size: DEFAULT_BUFFER_SIZE }
    }
}

/// Order in which a folder's files are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryOrder {
    /// Directory listing order.  Stable within one run, but differs
    /// between filesystems.
    #[default]
    Listing,
    /// Byte-wise by file name; reproducible everywhere.
    Name,
}

#[derive(Debug, Clone)]
pub struct RebuildOptions {
    pub order:       EntryOrder,
    /// Written to the last field of every header.
    pub unknown:     i32,
    pub buffer_size: usize,
}

impl Default for RebuildOptions {
    fn default() -> Self {
        Self {
            order:       EntryOrder::Listing,
            unknown:     UNKNOWN_CONST,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

// ── Results ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    pub files: usize,
    pub bytes: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildSummary {
    pub files:         usize,
    pub payload_bytes: u64,
    /// Total archive length, terminator included.
    pub archive_bytes: u64,
}

/// One entry as reported by [`list`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryInfo {
    pub name:               String,
    pub offset:             u64,
    pub header_size:        i32,
    pub file_size:          i32,
    pub next_header_offset: i32,
    pub padding:            i64,
    pub unknown:            i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blake3:             Option<String>,
}

// ── Extraction ────────────────────────────────────────────────────────────────

/// Extract every entry of the archive at `source` into `destination`.
///
/// `destination` is created if missing.  If it already holds anything,
/// `hook` is asked once before files of matching name are overwritten.
/// The first error stops the run; files written before it stay on disk.
pub fn extract<P: AsRef<Path>, Q: AsRef<Path>>(
    source:      P,
    destination: Q,
    hook:        &mut dyn ConfirmationHook,
    opts:        &ExtractOptions,
) -> PakResult<ExtractSummary> {
    let file = File::open(source.as_ref())?;
    let archive_len = file.metadata()?.len();
    extract_from(file, archive_len, destination.as_ref(), hook, opts)
}

/// [`extract`] for an already opened source of `archive_len` bytes.
pub fn extract_from<R: Read>(
    source:      R,
    archive_len: u64,
    destination: &Path,
    hook:        &mut dyn ConfirmationHook,
    opts:        &ExtractOptions,
) -> PakResult<ExtractSummary> {
    prepare_destination(destination, hook)?;

    let mut reader = PakReader::with_buffer_size(source, archive_len, opts.buffer_size);
    let mut summary = ExtractSummary::default();

    while let Some(entry) = reader.next_entry(hook)? {
        let name = &entry.header.name;
        let out_path = resolve_entry_path(destination, name)?;
        if let Some(parent) = out_path.parent() {
            if parent != destination {
                fs::create_dir_all(parent)?;
            }
        }

        tracing::info!("Extracting file \"{name}\"...");
        let mut out = File::create(&out_path)?;
        let written = reader.copy_payload(&mut out)?;
        out.flush()?;

        summary.files += 1;
        summary.bytes += written;
    }

    tracing::debug!(files = summary.files, bytes = summary.bytes, "extraction finished");
    Ok(summary)
}

fn prepare_destination(destination: &Path, hook: &mut dyn ConfirmationHook) -> PakResult<()> {
    match fs::read_dir(destination) {
        Ok(mut children) => {
            if children.next().is_some() {
                let prompt = format!(
                    "Warning! The destination folder ({}) is not empty. \
                     Some files may be overwritten.\nDo you want to proceed?",
                    destination.display()
                );
                if !hook.confirm(&prompt) {
                    return Err(PakError::UserAborted(format!(
                        "destination folder {} is not empty",
                        destination.display()
                    )));
                }
            }
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::info!("Destination folder does not exist. Creating it...");
            fs::create_dir_all(destination)?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Entry names are relative paths; nothing may land outside `destination`.
fn resolve_entry_path(destination: &Path, name: &str) -> PakResult<PathBuf> {
    let rel = Path::new(name);
    if rel.components().any(|c| !matches!(c, Component::Normal(_))) {
        return Err(PakError::CorruptArchive(format!(
            "entry name \"{name}\" does not stay inside the destination folder"
        )));
    }
    Ok(destination.join(rel))
}

// ── Listing ───────────────────────────────────────────────────────────────────

/// Scan the archive at `source` and describe every entry without
/// extracting anything.
pub fn list<P: AsRef<Path>>(
    source: P,
    hook:   &mut dyn ConfirmationHook,
    opts:   &ListOptions,
) -> PakResult<Vec<EntryInfo>> {
    let file = File::open(source.as_ref())?;
    let archive_len = file.metadata()?.len();
    list_from(file, archive_len, hook, opts)
}

pub fn list_from<R: Read>(
    source:      R,
    archive_len: u64,
    hook:        &mut dyn ConfirmationHook,
    opts:        &ListOptions,
) -> PakResult<Vec<EntryInfo>> {
    let mut reader = PakReader::with_buffer_size(source, archive_len, opts.buffer_size);
    let mut out = Vec::new();

    while let Some(entry) = reader.next_entry(hook)? {
        let blake3 = if opts.hash_payloads {
            let mut hasher = blake3::Hasher::new();
            reader.copy_payload(&mut hasher)?;
            Some(hasher.finalize().to_hex().to_string())
        } else {
            reader.skip_payload()?;
            None
        };

        let h = entry.header;
        out.push(EntryInfo {
            padding:            h.padding_len(),
            name:               h.name,
            offset:             entry.offset,
            header_size:        h.header_size,
            file_size:          h.file_size,
            next_header_offset: h.next_header_offset,
            unknown:            h.unknown,
            blake3,
        });
    }
    Ok(out)
}

// ── Reconstruction ────────────────────────────────────────────────────────────

/// A source file whose header has already been checked.
#[derive(Debug)]
struct PlannedEntry {
    name: String,
    path: PathBuf,
    size: u64,
}

/// Pack the regular files directly inside `source` into an archive at
/// `destination`.
///
/// Every name and size is checked before `destination` is touched.  An
/// existing archive is only truncated after `hook` agrees.  A failure
/// while writing leaves a partial archive behind.
pub fn rebuild<P: AsRef<Path>, Q: AsRef<Path>>(
    source:      P,
    destination: Q,
    hook:        &mut dyn ConfirmationHook,
    opts:        &RebuildOptions,
) -> PakResult<RebuildSummary> {
    let destination = destination.as_ref();
    let plan = plan_entries(source.as_ref(), Some(destination), opts.order)?;

    if destination.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("destination {} is a directory", destination.display()),
        )
        .into());
    }

    if destination.exists() {
        let prompt = format!(
            "Warning! The destination package file ({}) already exists.\n\
             Do you want to overwrite it?",
            destination.display()
        );
        if !hook.confirm(&prompt) {
            return Err(PakError::UserAborted(format!(
                "destination package file {} already exists",
                destination.display()
            )));
        }
    } else if let Some(parent) = destination.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            tracing::info!("Creating parent folders for package file...");
            fs::create_dir_all(parent)?;
        }
    }

    let file = File::create(destination)?;
    let (_, summary) = write_entries(&plan, BufWriter::new(file), opts)?;
    Ok(summary)
}

/// [`rebuild`] into any sink, returning it once the terminator is written.
pub fn rebuild_into<P: AsRef<Path>, W: Write>(
    source: P,
    sink:   W,
    opts:   &RebuildOptions,
) -> PakResult<(W, RebuildSummary)> {
    let plan = plan_entries(source.as_ref(), None, opts.order)?;
    write_entries(&plan, sink, opts)
}

fn plan_entries(
    source: &Path,
    skip:   Option<&Path>,
    order:  EntryOrder,
) -> PakResult<Vec<PlannedEntry>> {
    // An archive written into its own source folder must not pack itself.
    let skip = skip.and_then(|p| p.canonicalize().ok());

    let mut plan = Vec::new();
    for ent in WalkDir::new(source).min_depth(1).max_depth(1).follow_links(false) {
        let ent = ent?;
        let path = ent.path();

        // Symlinks count when they point at a regular file.
        let meta = match fs::metadata(path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("skipping dangling link {}", path.display());
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        if !meta.is_file() {
            continue;
        }
        if let Some(skip) = &skip {
            if path.canonicalize().ok().as_ref() == Some(skip) {
                tracing::debug!("skipping destination archive {}", path.display());
                continue;
            }
        }

        let name = ent
            .file_name()
            .to_str()
            .ok_or_else(|| {
                PakError::Encoding(format!("file name {:?} is not valid Unicode", ent.file_name()))
            })?
            .to_owned();
        let size = meta.len();

        let header = EntryHeader::for_file(name.as_str(), size)
            .ok_or_else(|| PakError::FileTooLarge { path: path.to_path_buf(), size })?;
        header.encode()?;

        plan.push(PlannedEntry { name, path: path.to_path_buf(), size });
    }

    if order == EntryOrder::Name {
        plan.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));
    }
    Ok(plan)
}

fn write_entries<W: Write>(
    plan: &[PlannedEntry],
    sink: W,
    opts: &RebuildOptions,
) -> PakResult<(W, RebuildSummary)> {
    let mut writer = PakWriter::with_options(sink, opts.buffer_size, opts.unknown);
    let mut payload_bytes = 0u64;

    for entry in plan {
        tracing::info!("Adding file \"{}\"...", entry.name);
        let file = File::open(&entry.path)?;
        writer.add_entry(&entry.name, entry.size, file)?;
        payload_bytes += entry.size;
    }

    tracing::debug!("Adding terminator");
    writer.finish()?;

    let summary = RebuildSummary {
        files: writer.entries_written(),
        payload_bytes,
        archive_bytes: writer.bytes_written(),
    };
    debug_assert_eq!(summary.archive_bytes % ALIGNMENT as u64, 0);
    Ok((writer.into_inner(), summary))
}
