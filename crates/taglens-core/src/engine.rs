//! The parse entry point.
//!
//! An [`AudioParser`] owns exactly one source, a path or an in-memory
//! buffer, and turns it into a [`MetadataRecord`] in a single call to
//! [`AudioParser::parse`]. Every call reads the source afresh and builds a
//! new record; parsers share no state.

use crate::containers::Stream;
use crate::error::{Error, Result};
use crate::record::MetadataRecord;
use crate::sniff::AudioFormat;
use std::any::Any;
use std::fs::File;
use std::io::Read;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Bounds applied while reading and walking a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserConfig {
    /// Bytes of a FLAC file handed to the walker
    pub prefix_len: usize,
    /// Window searched for `OpusHead` in an Ogg stream
    pub opus_window_len: usize,
    /// Character cap for free-form text blobs
    pub text_limit: usize,
    /// Vorbis comment entries decoded per block
    pub max_comments: usize,
    /// FLAC metadata blocks walked
    pub max_blocks: usize,
    /// ASF codec entries and descriptors, MP4 items decoded per list
    pub max_entries: usize,
    /// ID3v2 frames walked per tag
    pub max_frames: usize,
    /// Bytes scanned for the first MPEG frame sync
    pub sync_scan_len: usize,
    /// ADTS frames counted for the AAC duration
    pub max_adts_frames: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            prefix_len: 64 * 1024,
            opus_window_len: 4096,
            text_limit: 10_000,
            max_comments: 200,
            max_blocks: 128,
            max_entries: 256,
            max_frames: 4096,
            sync_scan_len: 64 * 1024,
            max_adts_frames: 1_000_000,
        }
    }
}

impl ParserConfig {
    /// Creates a new parser config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of bytes read before sniffing
    pub fn prefix_len(mut self, len: usize) -> Self {
        self.prefix_len = len;
        self
    }

    /// Sets the window searched for `OpusHead`
    pub fn opus_window_len(mut self, len: usize) -> Self {
        self.opus_window_len = len;
        self
    }

    /// Sets the character cap for text blobs
    pub fn text_limit(mut self, limit: usize) -> Self {
        self.text_limit = limit;
        self
    }

    /// Sets the Vorbis comment cap
    pub fn max_comments(mut self, max: usize) -> Self {
        self.max_comments = max;
        self
    }

    /// Sets the FLAC block cap
    pub fn max_blocks(mut self, max: usize) -> Self {
        self.max_blocks = max;
        self
    }

    /// Sets the ASF / MP4 list entry cap
    pub fn max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }

    /// Sets the ID3v2 frame cap
    pub fn max_frames(mut self, max: usize) -> Self {
        self.max_frames = max;
        self
    }

    /// Sets how far to look for the first MPEG frame
    pub fn sync_scan_len(mut self, len: usize) -> Self {
        self.sync_scan_len = len;
        self
    }

    /// Sets the ADTS frame counting cap
    pub fn max_adts_frames(mut self, max: usize) -> Self {
        self.max_adts_frames = max;
        self
    }
}

#[derive(Debug, Clone)]
enum Source {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

/// Decodes the metadata of one audio file
#[derive(Debug, Clone)]
pub struct AudioParser {
    source: Source,
    config: ParserConfig,
}

impl AudioParser {
    /// Creates a parser from exactly one of a path and a buffer.
    ///
    /// Supplying both or neither is an [`Error::InvalidSource`].
    pub fn new(file_path: Option<PathBuf>, file_data: Option<Vec<u8>>) -> Result<Self> {
        let source = match (file_path, file_data) {
            (Some(path), None) => Source::Path(path),
            (None, Some(data)) => Source::Bytes(data),
            (Some(_), Some(_)) => {
                return Err(Error::invalid_source(
                    "both a file path and file data were given",
                ))
            }
            (None, None) => {
                return Err(Error::invalid_source("neither a file path nor file data was given"))
            }
        };
        Ok(Self {
            source,
            config: ParserConfig::default(),
        })
    }

    /// Creates a parser that reads `path`
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            source: Source::Path(path.into()),
            config: ParserConfig::default(),
        }
    }

    /// Creates a parser over an in-memory file
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        Self {
            source: Source::Bytes(data.into()),
            config: ParserConfig::default(),
        }
    }

    /// Replaces the limits
    pub fn with_config(mut self, config: ParserConfig) -> Self {
        self.config = config;
        self
    }

    /// The limits in effect
    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// The source path, if this parser reads from disk
    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            Source::Path(path) => Some(path),
            Source::Bytes(_) => None,
        }
    }

    /// Sniffs the format and decodes every field it can.
    ///
    /// An unrecognized or undecodable file gives an empty record, not an
    /// error. Errors are limited to I/O on the source and to a failure
    /// escaping a walker, which is reported as [`Error::MetadataRead`].
    pub fn parse(&self) -> Result<MetadataRecord> {
        match &self.source {
            Source::Path(path) => self.parse_path(path),
            Source::Bytes(data) => {
                let format = AudioFormat::sniff(data, None, &self.config);
                self.decode(format, data, data.len() as u64)
            }
        }
    }

    /// Reads the file with a single sequential read.
    ///
    /// The extent is fixed before any byte is read: a `.flac` name reads
    /// `prefix_len` bytes, everything else reads to the end. FLAC content
    /// found under another name is cut back to the prefix so both routes
    /// hand the walker the same bytes.
    fn parse_path(&self, path: &Path) -> Result<MetadataRecord> {
        let file = File::open(path).map_err(|e| Error::file_read(path, e))?;
        let file_size = file
            .metadata()
            .map_err(|e| Error::file_read(path, e))?
            .len();

        let extension = path.extension().and_then(|e| e.to_str());
        let limit = match extension.map(AudioFormat::from_extension) {
            Some(AudioFormat::Flac) => (self.config.prefix_len as u64).min(file_size),
            _ => file_size,
        };

        let mut data = Vec::with_capacity(limit as usize);
        file.take(limit)
            .read_to_end(&mut data)
            .map_err(|e| Error::file_read(path, e))?;

        let format = AudioFormat::sniff(&data, extension, &self.config);
        if !format.needs_full_stream() {
            data.truncate(self.config.prefix_len);
        }
        debug!(
            "read {} of {} bytes from {}",
            data.len(),
            file_size,
            path.display()
        );
        self.decode(format, &data, file_size)
    }

    fn decode(&self, format: AudioFormat, data: &[u8], file_size: u64) -> Result<MetadataRecord> {
        let stream = Stream::new(data, file_size, &self.config);
        let record = panic::catch_unwind(AssertUnwindSafe(|| format.decode_stream(&stream)))
            .map_err(|payload| {
                Error::metadata_read(format!(
                    "{} decoder failed: {}",
                    format,
                    panic_message(payload.as_ref())
                ))
            })?;
        debug!("{}: {} fields", format, record.len());
        Ok(record)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

/// Parses the file at `path` with default limits
pub fn parse_file(path: impl AsRef<Path>) -> Result<MetadataRecord> {
    AudioParser::from_path(path.as_ref()).parse()
}

/// Parses an in-memory file with default limits
pub fn parse_bytes(data: &[u8]) -> Result<MetadataRecord> {
    AudioParser::from_bytes(data).parse()
}
