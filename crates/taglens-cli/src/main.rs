//! taglens - Dump metadata tags from audio files
//!
//! This tool sniffs each input's container format, decodes every metadata
//! field it recognizes and prints them as `Group:Tag: value` lines or JSON.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, ValueEnum};
use std::collections::HashSet;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use taglens_core::{AudioFormat, AudioParser, MetadataRecord, ParserConfig};
use tracing::{debug, info, trace, warn, Level};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Dump metadata tags from audio files
#[derive(Parser, Debug)]
#[command(name = "taglens")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    input: InputMode,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Only print keys starting with this prefix (e.g. `Audio:FLAC` or `ID3`)
    #[arg(short, long)]
    group: Option<String>,

    /// Skip files whose content was already seen
    #[arg(long)]
    skip_duplicates: bool,

    /// Bytes read before sniffing the format
    #[arg(long, default_value = "65536", env = "TAGLENS_PREFIX_LEN")]
    prefix_len: usize,

    /// Character cap for XML and text blobs
    #[arg(long, default_value = "10000")]
    text_limit: usize,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct InputMode {
    /// Path to a single audio file
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Path to a directory of audio files to process
    #[arg(short, long)]
    directory: Option<PathBuf>,
}

/// Output format for decoded records
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// `Group:Tag: value` lines
    Text,
    /// One JSON object per file
    Json,
}

/// Tracks seen file contents and run totals
#[derive(Default)]
struct Session {
    /// blake3 digests of files already printed
    seen: HashSet<String>,
    stats: SessionStats,
}

#[derive(Default, Debug, PartialEq, Eq)]
struct SessionStats {
    parsed: usize,
    empty: usize,
    duplicates_skipped: usize,
    failed: usize,
}

impl Session {
    fn new() -> Self {
        Self::default()
    }

    /// Full blake3 hex digest of the file contents
    fn content_hash(data: &[u8]) -> String {
        blake3::hash(data).to_hex().to_string()
    }

    /// Records `hash`; returns false if it was already seen
    fn register(&mut self, hash: String) -> bool {
        if self.seen.insert(hash) {
            true
        } else {
            self.stats.duplicates_skipped += 1;
            false
        }
    }

    fn print_summary(&self) {
        info!(
            "Summary: {} parsed, {} without metadata, {} duplicates skipped, {} failed",
            self.stats.parsed,
            self.stats.empty,
            self.stats.duplicates_skipped,
            self.stats.failed
        );
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let stdout = io::stdout();
    let mut out = stdout.lock();

    // Dispatch based on input mode
    if let Some(ref file) = cli.input.file {
        process_single_file(&cli, file, &mut out)
    } else if let Some(ref directory) = cli.input.directory {
        process_directory(&cli, directory, &mut out)
    } else {
        bail!("Either --file or --directory must be specified")
    }
}

impl Cli {
    fn parser_config(&self) -> ParserConfig {
        ParserConfig::new()
            .prefix_len(self.prefix_len)
            .text_limit(self.text_limit)
    }
}

/// Process a single audio file
fn process_single_file(cli: &Cli, file: &Path, out: &mut impl Write) -> Result<()> {
    if !file.exists() {
        bail!("Input file does not exist: {}", file.display());
    }
    if !file.is_file() {
        bail!("Input path is not a file: {}", file.display());
    }

    let mut session = Session::new();
    process_file(cli, file, &mut session, out)?;
    session.print_summary();
    Ok(())
}

/// Process a directory of audio files recursively
fn process_directory(cli: &Cli, directory: &Path, out: &mut impl Write) -> Result<()> {
    if !directory.exists() {
        bail!("Directory does not exist: {}", directory.display());
    }
    if !directory.is_dir() {
        bail!("Path is not a directory: {}", directory.display());
    }

    info!("Scanning directory: {}", directory.display());

    let mut session = Session::new();
    let mut files_seen = 0;

    for entry in WalkDir::new(directory)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        // Skip hidden files
        if path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with('.'))
            .unwrap_or(false)
        {
            continue;
        }

        if !is_likely_audio(path) {
            trace!("Skipping non-audio: {}", path.display());
            continue;
        }

        debug!("Processing: {}", path.display());
        if let Err(e) = process_file(cli, path, &mut session, out) {
            // Log error but continue with other files
            warn!("Error processing {}: {:#}", path.display(), e);
            session.stats.failed += 1;
        }
        files_seen += 1;
    }

    info!("Processed {} audio files", files_seen);
    session.print_summary();
    Ok(())
}

/// Heuristic to determine if a file is worth handing to the parser
fn is_likely_audio(path: &Path) -> bool {
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        if AudioFormat::from_extension(ext) != AudioFormat::Unknown {
            return true;
        }
    }

    // Unknown or missing extension: sniff the first bytes
    let Ok(file) = fs::File::open(path) else {
        return false;
    };
    let mut magic = Vec::with_capacity(64);
    if file.take(64).read_to_end(&mut magic).is_err() {
        return false;
    }
    AudioFormat::sniff(&magic, None, &ParserConfig::default()) != AudioFormat::Unknown
}

/// Parse one file and print its record
fn process_file(
    cli: &Cli,
    path: &Path,
    session: &mut Session,
    out: &mut impl Write,
) -> Result<()> {
    if cli.skip_duplicates {
        let data =
            fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))?;
        let hash = Session::content_hash(&data);
        if !session.register(hash) {
            debug!("Skipping duplicate: {}", path.display());
            return Ok(());
        }
    }

    let record = AudioParser::from_path(path)
        .with_config(cli.parser_config())
        .parse()
        .with_context(|| format!("Failed to parse: {}", path.display()))?;
    session.stats.parsed += 1;

    if record.is_empty() {
        debug!("No metadata in {}", path.display());
        session.stats.empty += 1;
        return Ok(());
    }

    match cli.format {
        OutputFormat::Text => write_text(out, path, &record, cli.group.as_deref()),
        OutputFormat::Json => write_json(out, path, &record, cli.group.as_deref()),
    }
    .context("Failed to write output")?;
    Ok(())
}

fn in_group(key: &str, group: Option<&str>) -> bool {
    group.map_or(true, |prefix| key.starts_with(prefix))
}

fn write_text(
    out: &mut impl Write,
    path: &Path,
    record: &MetadataRecord,
    group: Option<&str>,
) -> Result<()> {
    writeln!(out, "==== {}", path.display())?;
    for (key, value) in record.iter().filter(|(key, _)| in_group(key, group)) {
        writeln!(out, "{}: {}", key, value)?;
    }
    Ok(())
}

fn write_json(
    out: &mut impl Write,
    path: &Path,
    record: &MetadataRecord,
    group: Option<&str>,
) -> Result<()> {
    let mut object = serde_json::Map::new();
    object.insert(
        "SourceFile".to_string(),
        serde_json::Value::String(path.display().to_string()),
    );
    for (key, value) in record.iter().filter(|(key, _)| in_group(key, group)) {
        object.insert(key.to_string(), serde_json::to_value(value)?);
    }
    serde_json::to_writer(&mut *out, &object)?;
    writeln!(out)?;
    Ok(())
}
