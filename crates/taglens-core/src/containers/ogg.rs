//! Ogg Vorbis and Opus header scanning.
//!
//! Pages are not reassembled. The walker searches the stream for the first
//! identification and comment packet signatures and decodes from there, so a
//! header split across two pages decodes short and its fields drop out.

use super::vorbis::VorbisComments;
use super::{Stream, Walk};
use crate::composite::DurationSource;
use crate::decode;
use crate::record::{MetadataRecord, Value};
use tracing::debug;

const VORBIS_ID: &[u8] = b"\x01vorbis";
const VORBIS_COMMENT: &[u8] = b"\x03vorbis";
const OPUS_HEAD: &[u8] = b"OpusHead";
const OPUS_TAGS: &[u8] = b"OpusTags";

/// Nominal rate used to estimate Opus durations; OpusHead carries none
const OPUS_NOMINAL_BPS: u64 = 96_000;

/// Vorbis identification header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VorbisIdent {
    /// Vorbis version (always 0)
    pub version: u32,
    /// Channel count
    pub channels: u8,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Maximum bitrate, 0 if unset
    pub bitrate_max: i32,
    /// Nominal bitrate, 0 if unset
    pub bitrate_nominal: i32,
    /// Minimum bitrate, 0 if unset
    pub bitrate_min: i32,
}

impl VorbisIdent {
    /// Decodes the packet body following `\x01vorbis`
    pub fn parse(body: &[u8]) -> Option<Self> {
        let signed = |offset| decode::u32_le(body, offset).map(|v| v as i32);
        Some(Self {
            version: decode::u32_le(body, 0)?,
            channels: decode::u8_at(body, 4)?,
            sample_rate: decode::u32_le(body, 5)?,
            bitrate_max: signed(9)?,
            bitrate_nominal: signed(13)?,
            bitrate_min: signed(17)?,
        })
    }

    fn write(&self, record: &mut MetadataRecord) {
        record.insert_aliased("Audio:OGG:VorbisVersion", &["Vorbis:VorbisVersion"], self.version);
        record.insert_aliased("Audio:OGG:AudioChannels", &["Vorbis:AudioChannels"], self.channels);
        record.insert("Audio:OGG:SampleRate", format!("{} Hz", self.sample_rate));
        record.insert("Vorbis:SampleRate", self.sample_rate);
        if self.bitrate_nominal > 0 {
            record.insert("Audio:OGG:NominalBitrate", format!("{} bps", self.bitrate_nominal));
            record.insert("Vorbis:NominalBitrate", format!("{} kbps", self.bitrate_nominal / 1000));
        }
        if self.bitrate_max > 0 {
            record.insert("Audio:OGG:MaximumBitrate", format!("{} bps", self.bitrate_max));
        }
        if self.bitrate_min > 0 {
            record.insert("Audio:OGG:MinimumBitrate", format!("{} bps", self.bitrate_min));
        }
    }
}

/// Opus identification header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpusHead {
    /// Encapsulation version
    pub version: u8,
    /// Output channel count
    pub channels: u8,
    /// Samples to discard at 48 kHz
    pub pre_skip: u16,
    /// Original input sample rate
    pub input_sample_rate: u32,
    /// Output gain, Q7.8 dB
    pub output_gain: i16,
    /// Channel mapping family
    pub mapping_family: u8,
}

impl OpusHead {
    /// Decodes the packet body following `OpusHead`
    pub fn parse(body: &[u8]) -> Option<Self> {
        Some(Self {
            version: decode::u8_at(body, 0)?,
            channels: decode::u8_at(body, 1)?,
            pre_skip: decode::u16_le(body, 2)?,
            input_sample_rate: decode::u32_le(body, 4)?,
            output_gain: decode::i16_le(body, 8)?,
            mapping_family: decode::u8_at(body, 10)?,
        })
    }

    /// Output gain in dB
    pub fn gain_db(&self) -> f64 {
        f64::from(self.output_gain) / 256.0
    }

    fn write(&self, record: &mut MetadataRecord) {
        record.insert_aliased("Audio:OPUS:OpusVersion", &["Opus:OpusVersion"], self.version);
        record.insert_aliased("Audio:OPUS:AudioChannels", &["Opus:AudioChannels"], self.channels);
        record.insert_aliased("Audio:OPUS:PreSkip", &["Opus:PreSkip"], self.pre_skip);
        record.insert("Audio:OPUS:SampleRate", format!("{} Hz", self.input_sample_rate));
        record.insert("Opus:SampleRate", self.input_sample_rate);
        record.insert("Audio:OPUS:OutputGain", format!("{:.2} dB", self.gain_db()));
        // linear factor; a zero gain is exactly 1
        let factor = if self.output_gain == 0 {
            Value::Int(1)
        } else {
            Value::Float(10f64.powf(self.gain_db() / 20.0))
        };
        record.insert("Opus:OutputGain", factor);
        record.insert("Audio:OPUS:ChannelMappingFamily", self.mapping_family);
    }
}

fn packet_after<'a>(data: &'a [u8], signature: &[u8]) -> Option<&'a [u8]> {
    let pos = decode::find(data, signature)?;
    Some(&data[pos + signature.len()..])
}

/// Walks an Ogg Vorbis stream
pub(crate) fn walk_vorbis(stream: &Stream<'_>) -> Walk {
    let data = stream.data;
    let mut walk = Walk::new();
    if !data.starts_with(b"OggS") {
        return walk;
    }
    let record = &mut walk.record;

    if let Some(ident) = packet_after(data, VORBIS_ID).and_then(VorbisIdent::parse) {
        debug!("Vorbis identification header: {} Hz", ident.sample_rate);
        record.insert("Audio:OGG:Format", "Ogg Vorbis");
        ident.write(record);
        if ident.bitrate_nominal > 0 {
            walk.duration = Some(DurationSource::Bitrate {
                payload_bytes: stream.file_size,
                bits_per_second: ident.bitrate_nominal as u64,
            });
        }
    }

    if let Some(body) = packet_after(data, VORBIS_COMMENT) {
        if let Some(comments) = VorbisComments::parse(body, stream.config.max_comments) {
            record.insert("Audio:OGG:Format", "Ogg Vorbis");
            comments.write_generic("Audio:OGG", record);
        }
    }
    walk
}

/// Walks an Ogg Opus stream
pub(crate) fn walk_opus(stream: &Stream<'_>) -> Walk {
    let data = stream.data;
    let mut walk = Walk::new();
    if !data.starts_with(b"OggS") {
        return walk;
    }
    let record = &mut walk.record;

    if let Some(head) = packet_after(data, OPUS_HEAD).and_then(OpusHead::parse) {
        debug!("OpusHead: {} channels", head.channels);
        record.insert("Audio:OPUS:Format", "Opus");
        head.write(record);
        walk.duration = Some(DurationSource::Bitrate {
            payload_bytes: stream.file_size,
            bits_per_second: OPUS_NOMINAL_BPS,
        });
    }

    if let Some(body) = packet_after(data, OPUS_TAGS) {
        if let Some(comments) = VorbisComments::parse(body, stream.config.max_comments) {
            record.insert("Audio:OPUS:Format", "Opus");
            comments.write_generic("Audio:OPUS", record);
        }
    }
    walk
}
