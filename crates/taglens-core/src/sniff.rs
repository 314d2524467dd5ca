//! Format detection and dispatch.
//!
//! [`AudioFormat::sniff`] looks at the leading bytes (and, only when they are
//! inconclusive, the file extension) to pick a container family. Each family
//! maps to exactly one walker in [`crate::containers`].

use crate::composite;
use crate::containers::{aac, asf, dsf, flac, mp4, mpeg, ogg, riff, Stream, Walk};
use crate::decode;
use crate::engine::ParserConfig;
use crate::record::MetadataRecord;
use std::fmt;
use tracing::debug;

/// Audio container families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioFormat {
    /// MPEG audio with optional ID3v2 / Lyrics3 / ID3v1
    Mp3,
    /// RIFF WAVE
    Wav,
    /// Native FLAC
    Flac,
    /// Ogg Vorbis
    Ogg,
    /// Ogg Opus
    Opus,
    /// ASF / Windows Media Audio
    Wma,
    /// DSD Stream File
    Dsf,
    /// Raw AAC (ADIF or ADTS)
    Aac,
    /// MPEG-4 audio
    M4a,
    /// Not recognized
    Unknown,
}

impl AudioFormat {
    /// Every recognized format
    pub const ALL: [AudioFormat; 9] = [
        Self::Mp3,
        Self::Wav,
        Self::Flac,
        Self::Ogg,
        Self::Opus,
        Self::Wma,
        Self::Dsf,
        Self::Aac,
        Self::M4a,
    ];

    /// Picks the format of a stream from its first bytes.
    ///
    /// `extension` (with or without the leading dot, any case) breaks the
    /// Vorbis/Opus tie and is the fallback when no signature matches.
    pub fn sniff(prefix: &[u8], extension: Option<&str>, config: &ParserConfig) -> Self {
        let by_extension = extension.map(Self::from_extension).unwrap_or(Self::Unknown);

        let format = match prefix {
            [b'I', b'D', b'3', ..] | [0xFF, 0xFB | 0xF3 | 0xF2, ..] => Self::Mp3,
            _ if prefix.len() >= 12 && prefix.starts_with(b"RIFF") && &prefix[8..12] == b"WAVE" => {
                Self::Wav
            }
            _ if prefix.starts_with(b"fLaC") => Self::Flac,
            _ if prefix.starts_with(b"OggS") => {
                let window = &prefix[..prefix.len().min(config.opus_window_len)];
                if decode::find(window, b"OpusHead").is_some() || by_extension == Self::Opus {
                    Self::Opus
                } else {
                    Self::Ogg
                }
            }
            _ if prefix.starts_with(&asf::guids::HEADER.0) => Self::Wma,
            _ if prefix.starts_with(b"DSD ") => Self::Dsf,
            _ if prefix.starts_with(b"ADIF") || aac::is_adts_sync(prefix) => Self::Aac,
            _ if mp4::has_audio_brand(prefix) => Self::M4a,
            _ if mpeg::FrameHeader::parse(prefix).is_some() => Self::Mp3,
            _ => by_extension,
        };
        debug!("sniffed {} (extension {:?})", format, extension);
        format
    }

    /// Maps a file extension to a format
    pub fn from_extension(extension: &str) -> Self {
        let extension = extension.trim_start_matches('.').to_ascii_lowercase();
        match extension.as_str() {
            "mp3" => Self::Mp3,
            "wav" | "wave" => Self::Wav,
            "flac" => Self::Flac,
            "ogg" | "oga" => Self::Ogg,
            "opus" => Self::Opus,
            "wma" | "asf" => Self::Wma,
            "dsf" => Self::Dsf,
            "aac" | "adts" => Self::Aac,
            "m4a" | "m4b" => Self::M4a,
            _ => Self::Unknown,
        }
    }

    /// `File:FileType` value
    pub fn name(self) -> &'static str {
        match self {
            Self::Mp3 => "MP3",
            Self::Wav => "WAV",
            Self::Flac => "FLAC",
            Self::Ogg => "OGG",
            Self::Opus => "OPUS",
            Self::Wma => "WMA",
            Self::Dsf => "DSF",
            Self::Aac => "AAC",
            Self::M4a => "M4A",
            Self::Unknown => "Unknown",
        }
    }

    /// Canonical file extension, without the dot
    pub fn extension(self) -> Option<&'static str> {
        Some(match self {
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
            Self::Flac => "flac",
            Self::Ogg => "ogg",
            Self::Opus => "opus",
            Self::Wma => "wma",
            Self::Dsf => "dsf",
            Self::Aac => "aac",
            Self::M4a => "m4a",
            Self::Unknown => return None,
        })
    }

    /// `File:MIMEType` value
    pub fn mime_type(self) -> Option<&'static str> {
        Some(match self {
            Self::Mp3 => "audio/mpeg",
            Self::Wav => "audio/x-wav",
            Self::Flac => "audio/flac",
            Self::Ogg | Self::Opus => "audio/ogg",
            Self::Wma => "audio/x-ms-wma",
            Self::Dsf => "audio/dsd",
            Self::Aac => "audio/aac",
            Self::M4a => "audio/mp4",
            Self::Unknown => return None,
        })
    }

    /// Whether the walker looks past the read prefix.
    ///
    /// FLAC metadata blocks precede the audio; everything else either has
    /// trailing tags, a size-derived duration, or an object layout that may
    /// put the interesting parts anywhere.
    pub fn needs_full_stream(self) -> bool {
        !matches!(self, Self::Flac | Self::Unknown)
    }

    fn walker(self) -> Option<fn(&Stream<'_>) -> Walk> {
        Some(match self {
            Self::Mp3 => mpeg::walk,
            Self::Wav => riff::walk,
            Self::Flac => flac::walk,
            Self::Ogg => ogg::walk_vorbis,
            Self::Opus => ogg::walk_opus,
            Self::Wma => asf::walk,
            Self::Dsf => dsf::walk,
            Self::Aac => aac::walk,
            Self::M4a => mp4::walk,
            Self::Unknown => return None,
        })
    }

    /// Decodes a complete in-memory file as this format, with default limits
    pub fn decode(self, data: &[u8]) -> MetadataRecord {
        let config = ParserConfig::default();
        self.decode_stream(&Stream::new(data, data.len() as u64, &config))
    }

    /// Runs the walker, then adds the composite and `File:*` fields.
    ///
    /// A walk that decoded nothing stays empty.
    pub(crate) fn decode_stream(self, stream: &Stream<'_>) -> MetadataRecord {
        let Some(walker) = self.walker() else {
            return MetadataRecord::new();
        };
        let Walk {
            mut record,
            duration,
        } = walker(stream);
        if record.is_empty() {
            debug!("{} walker found nothing", self);
            return record;
        }

        if let Some(source) = duration {
            composite::apply(self, &source, &mut record);
        }
        record.insert("File:FileType", self.name());
        if let Some(extension) = self.extension() {
            record.insert("File:FileTypeExtension", extension);
        }
        if let Some(mime) = self.mime_type() {
            record.insert("File:MIMEType", mime);
        }
        record.insert("File:FileSize", stream.file_size);
        record
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
