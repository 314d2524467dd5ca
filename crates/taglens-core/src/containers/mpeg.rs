//! MPEG audio frame headers and the MP3 walker.
//!
//! An MP3 is an optional ID3v2 tag, a run of self-synchronizing frames and
//! optional Lyrics3/ID3v1 blocks at the tail. Only the first valid frame
//! header is decoded; without demuxing every frame the duration is an
//! estimate from file size and bitrate.

use super::{id3, lyrics3, Stream, Walk};
use crate::composite::DurationSource;
use crate::decode::BitField;
use crate::record::{MetadataRecord, Value};
use tracing::{debug, trace};

const VERSION: BitField = BitField::msb(1, 3, 2);
const LAYER: BitField = BitField::msb(1, 5, 2);
const PROTECTION: BitField = BitField::msb(1, 7, 1);
const BITRATE: BitField = BitField::msb(2, 0, 4);
const SAMPLE_RATE: BitField = BitField::msb(2, 4, 2);
const PADDING: BitField = BitField::msb(2, 6, 1);
const CHANNEL_MODE: BitField = BitField::msb(3, 0, 2);
const MODE_EXTENSION: BitField = BitField::msb(3, 2, 2);
const COPYRIGHT: BitField = BitField::msb(3, 4, 1);
const ORIGINAL: BitField = BitField::msb(3, 5, 1);
const EMPHASIS: BitField = BitField::msb(3, 6, 2);

// kbps, indexed by the 4-bit bitrate index; 0 = free format, 15 = invalid
const BITRATES_V1_L1: [u16; 15] = [0, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448];
const BITRATES_V1_L2: [u16; 15] = [0, 32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384];
const BITRATES_V1_L3: [u16; 15] = [0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320];
const BITRATES_V2_L1: [u16; 15] = [0, 32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256];
const BITRATES_V2_L23: [u16; 15] = [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160];

/// MPEG audio version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegVersion {
    /// MPEG-1
    V1,
    /// MPEG-2 LSF
    V2,
    /// Unofficial MPEG-2.5
    V25,
}

impl MpegVersion {
    fn label(self) -> &'static str {
        match self {
            Self::V1 => "1",
            Self::V2 => "2",
            Self::V25 => "2.5",
        }
    }

    fn numeric(self) -> Value {
        match self {
            Self::V1 => Value::Int(1),
            Self::V2 => Value::Int(2),
            Self::V25 => Value::Float(2.5),
        }
    }

    fn sample_rates(self) -> [u32; 3] {
        match self {
            Self::V1 => [44100, 48000, 32000],
            Self::V2 => [22050, 24000, 16000],
            Self::V25 => [11025, 12000, 8000],
        }
    }
}

/// Channel mode from the frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    /// Two independent channels
    Stereo,
    /// Joint stereo (mode extension applies)
    JointStereo,
    /// Dual mono
    DualChannel,
    /// Mono
    SingleChannel,
}

impl ChannelMode {
    fn name(self) -> &'static str {
        match self {
            Self::Stereo => "Stereo",
            Self::JointStereo => "Joint Stereo",
            Self::DualChannel => "Dual Channel",
            Self::SingleChannel => "Single Channel",
        }
    }
}

/// A decoded, validated frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Audio version
    pub version: MpegVersion,
    /// Layer 1..=3
    pub layer: u8,
    /// CRC follows the header
    pub crc_protected: bool,
    /// Bitrate in kbit/s
    pub bitrate_kbps: u16,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Padding slot present
    pub padding: bool,
    /// Channel mode
    pub channel_mode: ChannelMode,
    /// Raw mode extension bits
    pub mode_extension: u8,
    /// Copyright bit
    pub copyright: bool,
    /// Original media bit
    pub original: bool,
    /// Raw emphasis code
    pub emphasis: u8,
}

impl FrameHeader {
    /// Decodes the 4 bytes at the start of `data`, rejecting reserved and
    /// free-format values
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < 4 || data[0] != 0xFF || data[1] & 0xE0 != 0xE0 {
            return None;
        }
        let field = |f: BitField| f.extract(data).map(|v| v as u8);

        let version = match field(VERSION)? {
            0 => MpegVersion::V25,
            2 => MpegVersion::V2,
            3 => MpegVersion::V1,
            _ => return None,
        };
        let layer = match field(LAYER)? {
            1 => 3,
            2 => 2,
            3 => 1,
            _ => return None,
        };
        let table = match (version, layer) {
            (MpegVersion::V1, 1) => &BITRATES_V1_L1,
            (MpegVersion::V1, 2) => &BITRATES_V1_L2,
            (MpegVersion::V1, _) => &BITRATES_V1_L3,
            (_, 1) => &BITRATES_V2_L1,
            _ => &BITRATES_V2_L23,
        };
        let bitrate_kbps = *table.get(usize::from(field(BITRATE)?))?;
        if bitrate_kbps == 0 {
            return None;
        }
        let sample_rate = *version.sample_rates().get(usize::from(field(SAMPLE_RATE)?))?;
        let channel_mode = match field(CHANNEL_MODE)? {
            0 => ChannelMode::Stereo,
            1 => ChannelMode::JointStereo,
            2 => ChannelMode::DualChannel,
            _ => ChannelMode::SingleChannel,
        };

        Some(Self {
            version,
            layer,
            crc_protected: field(PROTECTION)? == 0,
            bitrate_kbps,
            sample_rate,
            padding: field(PADDING)? == 1,
            channel_mode,
            mode_extension: field(MODE_EXTENSION)?,
            copyright: field(COPYRIGHT)? == 1,
            original: field(ORIGINAL)? == 1,
            emphasis: field(EMPHASIS)?,
        })
    }

    fn layer_roman(&self) -> &'static str {
        match self.layer {
            1 => "I",
            2 => "II",
            _ => "III",
        }
    }

    fn emphasis_name(&self) -> &'static str {
        match self.emphasis {
            0 => "None",
            1 => "50/15 ms",
            2 => "Reserved",
            _ => "CCIT J.17",
        }
    }

    /// Writes both presentations: `Audio:MP3:*` text and `MPEG:*` numbers
    pub fn write(&self, record: &mut MetadataRecord) {
        record.insert("Audio:MP3:MPEGAudioVersion", self.version.label());
        record.insert("MPEG:MPEGAudioVersion", self.version.numeric());
        record.insert("Audio:MP3:AudioLayer", self.layer_roman());
        record.insert("MPEG:AudioLayer", self.layer);
        record.insert("Audio:MP3:HasPadding", self.padding);
        record.insert_aliased("Audio:MP3:ChannelMode", &["MPEG:ChannelMode"], self.channel_mode.name());

        if self.channel_mode == ChannelMode::JointStereo && self.layer == 3 {
            let ms = self.mode_extension & 0x02 != 0;
            let intensity = self.mode_extension & 0x01 != 0;
            let on_off = |b: bool| if b { "On" } else { "Off" };
            record.insert("Audio:MP3:MSStereo", ms);
            record.insert("Audio:MP3:IntensityStereo", intensity);
            record.insert("MPEG:MSStereo", on_off(ms));
            record.insert("MPEG:IntensityStereo", on_off(intensity));
        }

        record.insert_aliased("Audio:MP3:Copyright", &["MPEG:CopyrightFlag"], self.copyright);
        record.insert_aliased("Audio:MP3:OriginalMedia", &["MPEG:OriginalMedia"], self.original);
        record.insert_aliased("Audio:MP3:Emphasis", &["MPEG:Emphasis"], self.emphasis_name());
        record.insert_aliased(
            "Audio:MP3:AudioBitrate",
            &["MPEG:AudioBitrate"],
            format!("{} kbps", self.bitrate_kbps),
        );
        record.insert("Audio:MP3:SampleRate", format!("{} Hz", self.sample_rate));
        record.insert("MPEG:SampleRate", self.sample_rate);
    }
}

/// Finds the first valid frame header at or after `from`, looking at no
/// more than `limit` candidate positions
pub fn find_frame(data: &[u8], from: usize, limit: usize) -> Option<(usize, FrameHeader)> {
    let end = data.len().saturating_sub(3).min(from.saturating_add(limit));
    (from..end).find_map(|pos| {
        if data[pos] != 0xFF || data[pos + 1] & 0xE0 != 0xE0 {
            return None;
        }
        FrameHeader::parse(&data[pos..]).map(|header| (pos, header))
    })
}

/// Walks an MP3 file
pub(crate) fn walk(stream: &Stream<'_>) -> Walk {
    let data = stream.data;
    let config = stream.config;
    let mut walk = Walk::new();
    let record = &mut walk.record;

    let mut audio_start = 0usize;
    let mut tag_len = 0u64;
    if let Some(tag) = id3::Id3Tag::parse(data, config.max_frames) {
        let header = tag.header;
        debug!("ID3v2.{}.{} tag, {} bytes", header.major, header.minor, header.size);
        record.insert("Audio:MP3:Format", "MP3");
        record.insert("Audio:MP3:HasID3v2", true);
        record.insert("Audio:MP3:ID3v2Version", format!("{}.{}", header.major, header.minor));
        record.insert("Audio:MP3:ID3v2Size", header.size);
        record.insert("File:ID3Size", header.total_len());

        for (field, value) in &tag.fields {
            let value = value.as_str();
            match field {
                id3::FrameField::Title => {
                    record.insert("Audio:MP3:Title", value);
                    record.insert_if_absent("XMP:Title", value);
                }
                id3::FrameField::Encoder => {
                    record.insert_aliased("Audio:MP3:Encoder", &["ID3:Encoder"], value);
                }
                id3::FrameField::EncoderSettings => {
                    record.insert_aliased(
                        "Audio:MP3:EncoderSettings",
                        &["ID3:EncoderSettings"],
                        value,
                    );
                }
                other => record.insert(format!("Audio:MP3:{}", other.tag_name()), value),
            }
        }
        tag_len = header.total_len();
        audio_start = usize::try_from(tag_len).unwrap_or(usize::MAX);
    }

    if let Some((pos, header)) = find_frame(data, audio_start, config.sync_scan_len) {
        trace!("MPEG frame sync at {}", pos);
        record.insert("Audio:MP3:Format", "MP3");
        header.write(record);
        walk.duration = Some(DurationSource::Bitrate {
            payload_bytes: stream.file_size.saturating_sub(tag_len),
            bits_per_second: u64::from(header.bitrate_kbps) * 1000,
        });
    }

    if !walk.record.is_empty() {
        walk.record.merge(lyrics3::scan(data));
        walk.record.merge(id3::id3v1(data));
    }
    walk
}
