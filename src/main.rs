use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use paktools::archive::{
    self, EntryInfo, EntryOrder, ExtractOptions, ListOptions, RebuildOptions,
};
use paktools::confirm::{ConfirmationHook, FixedAnswer};
use paktools::header::UNKNOWN_CONST;
use paktools::io_stream::DEFAULT_BUFFER_SIZE;
use paktools::PakResult;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::Level;

/// EX_SOFTWARE from sysexits.h.
const EXIT_FAILURE: u8 = 70;

#[derive(Parser)]
#[command(
    name = "paktools",
    version,
    about = "Extract .pak archives into folders and rebuild folders into .pak archives",
    long_about = "Each INPUT that is a file is extracted; each INPUT that is a folder is packed."
)]
struct Cli {
    /// Files to extract or folders to pack
    #[arg(required = true, num_args = 1..)]
    inputs: Vec<PathBuf>,
    /// Output folder (for a .pak input) or .pak file (for a folder input)
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Answer "yes" to every confirmation
    #[arg(short, long, conflicts_with = "no")]
    yes: bool,
    /// Answer "no" to every confirmation
    #[arg(long)]
    no: bool,
    /// List the entries of each .pak input instead of extracting
    #[arg(short, long)]
    list: bool,
    /// With --list: print entries as JSON
    #[arg(long, requires = "list")]
    json: bool,
    /// With --list: include a BLAKE3 digest of every payload
    #[arg(long, requires = "list")]
    hash: bool,
    /// Pack entries sorted by file name instead of directory order
    #[arg(long)]
    sort: bool,
    /// Value written to the unknown header field (decimal or 0x-hex)
    #[arg(long, value_parser = parse_unknown, default_value_t = UNKNOWN_CONST)]
    unknown: i32,
    /// Transfer buffer size in bytes
    #[arg(long, default_value_t = DEFAULT_BUFFER_SIZE)]
    buffer_size: usize,
    /// Debug logging
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,
    /// Only warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::WARN
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    if let Err(msg) = check_usage(&cli) {
        Cli::command().error(ErrorKind::ArgumentConflict, msg).exit();
    }

    let mut hook: Box<dyn ConfirmationHook> = if cli.yes {
        Box::new(FixedAnswer(true))
    } else if cli.no {
        Box::new(FixedAnswer(false))
    } else {
        Box::new(TerminalHook)
    };

    let mut failed = false;
    for input in &cli.inputs {
        if let Err(e) = run_one(&cli, input, hook.as_mut()) {
            tracing::error!("{}: {e}", input.display());
            failed = true;
        }
    }

    if failed {
        eprintln!("Operation failed.");
        ExitCode::from(EXIT_FAILURE)
    } else {
        println!("Operation completed.");
        ExitCode::SUCCESS
    }
}

fn check_usage(cli: &Cli) -> Result<(), String> {
    let Some(output) = &cli.output else { return Ok(()) };
    if cli.inputs.len() > 1 {
        return Err("--output can only be used with a single input".into());
    }
    let input = &cli.inputs[0];
    if input.is_file() && output.is_file() {
        return Err(format!(
            "output {} is an existing file; extraction needs a folder",
            output.display()
        ));
    }
    if input.is_dir() && output.is_dir() {
        return Err(format!(
            "output {} is an existing folder; packing needs a file path",
            output.display()
        ));
    }
    Ok(())
}

fn run_one(cli: &Cli, input: &Path, hook: &mut dyn ConfirmationHook) -> PakResult<()> {
    let meta = std::fs::metadata(input)?;

    // ── List ─────────────────────────────────────────────────────────────────
    if cli.list {
        if !meta.is_file() {
            return Err(invalid_input(input, "only .pak files can be listed").into());
        }
        let opts = ListOptions { hash_payloads: cli.hash, buffer_size: cli.buffer_size };
        let entries = archive::list(input, hook, &opts)?;
        if cli.json {
            let json = serde_json::to_string_pretty(&entries)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            println!("{json}");
        } else {
            print_table(input, &entries);
        }
        return Ok(());
    }

    // ── Extract ──────────────────────────────────────────────────────────────
    if meta.is_file() {
        let dest = match &cli.output {
            Some(o) => o.clone(),
            None => default_extract_dir(input)?,
        };
        tracing::info!("Extracting {} into {}", input.display(), dest.display());
        let opts = ExtractOptions { buffer_size: cli.buffer_size };
        let summary = archive::extract(input, &dest, hook, &opts)?;
        tracing::info!("{} file(s), {} bytes extracted", summary.files, summary.bytes);
        return Ok(());
    }

    // ── Rebuild ──────────────────────────────────────────────────────────────
    if meta.is_dir() {
        let dest = match &cli.output {
            Some(o) => o.clone(),
            None => default_archive_path(input)?,
        };
        tracing::info!("Packing {} into {}", input.display(), dest.display());
        let opts = RebuildOptions {
            order:       if cli.sort { EntryOrder::Name } else { EntryOrder::Listing },
            unknown:     cli.unknown,
            buffer_size: cli.buffer_size,
        };
        let summary = archive::rebuild(input, &dest, hook, &opts)?;
        tracing::info!(
            "{} file(s), {} payload bytes, {} bytes written",
            summary.files, summary.payload_bytes, summary.archive_bytes
        );
        return Ok(());
    }

    Err(invalid_input(input, "neither a file nor a folder").into())
}

// ── helpers ──────────────────────────────────────────────────────────────────

/// Prompts on the terminal; defaults to "no".
struct TerminalHook;

impl ConfirmationHook for TerminalHook {
    fn confirm(&mut self, prompt: &str) -> bool {
        match inquire::Confirm::new(prompt).with_default(false).prompt() {
            Ok(answer) => answer,
            Err(e) => {
                tracing::warn!("cannot ask for confirmation ({e}); assuming \"no\"");
                false
            }
        }
    }
}

fn print_table(input: &Path, entries: &[EntryInfo]) {
    println!("Archive: {}", input.display());
    println!("{:>10} {:>10} {:>10} {:>4}  {:<40} BLAKE3", "Offset", "Size", "Next", "Pad", "Name");
    for e in entries {
        println!(
            "{:>#10x} {:>10} {:>#10x} {:>4}  {:<40} {}",
            e.offset,
            e.file_size,
            e.next_header_offset,
            e.padding,
            e.name,
            e.blake3.as_deref().unwrap_or("-"),
        );
    }
    println!("{} entries", entries.len());
}

fn invalid_input(path: &Path, why: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, format!("{}: {why}", path.display()))
}

/// `data.pak` -> `data`, `archive` -> `archive_dir`.
fn default_extract_dir(input: &Path) -> io::Result<PathBuf> {
    if input.extension().is_some() {
        return Ok(input.with_extension(""));
    }
    let mut name = input
        .file_name()
        .ok_or_else(|| invalid_input(input, "has no file name"))?
        .to_os_string();
    name.push("_dir");
    Ok(input.with_file_name(name))
}

/// `data/` -> `data.pak`, next to the folder.
fn default_archive_path(input: &Path) -> io::Result<PathBuf> {
    let base = match input.file_name() {
        Some(_) => input.to_path_buf(),
        None => input.canonicalize()?,
    };
    let mut name = base
        .file_name()
        .ok_or_else(|| invalid_input(input, "has no folder name"))?
        .to_os_string();
    name.push(".pak");
    Ok(base.with_file_name(name))
}

fn parse_unknown(s: &str) -> Result<i32, String> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).map(|v| v as i32),
        None => s.parse::<i32>(),
    };
    parsed.map_err(|e| format!("invalid value {s:?}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_dir_strips_last_extension() {
        assert_eq!(default_extract_dir(Path::new("x/data.pak")).unwrap(), Path::new("x/data"));
        assert_eq!(default_extract_dir(Path::new("a.tar.pak")).unwrap(), Path::new("a.tar"));
        let bare = default_extract_dir(Path::new("x/archive")).unwrap();
        assert_eq!(bare, Path::new("x/archive_dir"));
    }

    #[test]
    fn archive_path_is_a_sibling() {
        assert_eq!(default_archive_path(Path::new("x/data")).unwrap(), Path::new("x/data.pak"));
        assert_eq!(default_archive_path(Path::new("x/data/")).unwrap(), Path::new("x/data.pak"));
    }

    #[test]
    fn unknown_accepts_decimal_and_hex() {
        assert_eq!(parse_unknown("0x43424140"), Ok(UNKNOWN_CONST));
        assert_eq!(parse_unknown("1128415552"), Ok(UNKNOWN_CONST));
        assert_eq!(parse_unknown("0xFFFFFFFF"), Ok(-1));
        assert_eq!(parse_unknown("-5"), Ok(-5));
        assert!(parse_unknown("0xZZ").is_err());
        assert!(parse_unknown("").is_err());
    }

    #[test]
    fn cli_rejects_yes_with_no() {
        assert!(Cli::try_parse_from(["paktools", "-y", "--no", "a.pak"]).is_err());
        assert!(Cli::try_parse_from(["paktools", "--json", "a.pak"]).is_err());
        let cli = Cli::try_parse_from(["paktools", "--unknown", "0x10", "dir"]).unwrap();
        assert_eq!(cli.unknown, 0x10);
        assert_eq!(cli.buffer_size, DEFAULT_BUFFER_SIZE);
    }

    #[test]
    fn output_needs_single_input() {
        let cli = Cli::try_parse_from(["paktools", "-o", "out", "a.pak", "b.pak"]).unwrap();
        assert!(check_usage(&cli).is_err());
    }
}
