//! Raw AAC streams: ADIF and ADTS headers.

use super::{Stream, Walk};
use crate::composite::DurationSource;
use crate::decode::{self, BitCursor, BitField};
use crate::record::MetadataRecord;
use tracing::{debug, trace};

const ADIF_MAGIC: &[u8] = b"ADIF";
const ADTS_HEADER_LEN: usize = 7;
const SAMPLES_PER_FRAME: u64 = 1024;

const SAMPLE_RATES: [u32; 12] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000,
];

/// Bits of the fixed + variable ADTS header
mod adts_fields {
    use crate::decode::BitField;

    pub(super) const MPEG_ID: BitField = BitField::msb(1, 4, 1);
    pub(super) const LAYER: BitField = BitField::msb(1, 5, 2);
    pub(super) const PROTECTION_ABSENT: BitField = BitField::msb(1, 7, 1);
    pub(super) const PROFILE: BitField = BitField::msb(2, 0, 2);
    pub(super) const SAMPLE_RATE_INDEX: BitField = BitField::msb(2, 2, 4);
    /// Straddles bytes 2 and 3
    pub(super) const CHANNEL_CONFIG: BitField = BitField::msb(2, 7, 3);
    pub(super) const ORIGINAL: BitField = BitField::msb(3, 2, 1);
    pub(super) const HOME: BitField = BitField::msb(3, 3, 1);
    /// Header included; spans bytes 3 to 5
    pub(super) const FRAME_LENGTH: BitField = BitField::msb(3, 6, 13);
    pub(super) const BUFFER_FULLNESS: BitField = BitField::msb(5, 3, 11);
    pub(super) const RAW_BLOCKS: BitField = BitField::msb(6, 6, 2);
}

fn profile_name(profile: u8) -> &'static str {
    match profile {
        0 => "Main",
        1 => "LC",
        2 => "SSR",
        _ => "LTP",
    }
}

fn channel_config_name(config: u8) -> &'static str {
    match config {
        0 => "Defined in AOT",
        1 => "Mono",
        2 => "Stereo",
        3 => "3 channels",
        4 => "4 channels",
        5 => "5 channels",
        6 => "5.1",
        _ => "7.1",
    }
}

/// True if `data` opens with an ADTS sync word and layer 0
pub fn is_adts_sync(data: &[u8]) -> bool {
    matches!(data, [0xFF, b1, ..] if b1 & 0xF6 == 0xF0)
}

/// One ADTS frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdtsHeader {
    /// MPEG-2 (`true`) or MPEG-4 identifier
    pub mpeg2: bool,
    /// Always 0 in valid streams
    pub layer: u8,
    /// No CRC follows the header
    pub protection_absent: bool,
    /// Audio object type minus one
    pub profile: u8,
    /// Index into the sampling frequency table
    pub sample_rate_index: u8,
    /// Channel configuration
    pub channel_config: u8,
    /// Original/copy flag
    pub original: bool,
    /// Home flag
    pub home: bool,
    /// Frame length, header included
    pub frame_length: u16,
    /// Buffer fullness; 0x7FF signals VBR
    pub buffer_fullness: u16,
    /// Raw data blocks in the frame
    pub raw_blocks: u8,
}

impl AdtsHeader {
    /// Parses a header at the start of `data`
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < ADTS_HEADER_LEN || !is_adts_sync(data) {
            return None;
        }
        use adts_fields::*;
        let get = |field: BitField| field.extract(data);
        Some(Self {
            mpeg2: get(MPEG_ID)? == 1,
            layer: get(LAYER)? as u8,
            protection_absent: get(PROTECTION_ABSENT)? == 1,
            profile: get(PROFILE)? as u8,
            sample_rate_index: get(SAMPLE_RATE_INDEX)? as u8,
            channel_config: get(CHANNEL_CONFIG)? as u8,
            original: get(ORIGINAL)? == 1,
            home: get(HOME)? == 1,
            frame_length: get(FRAME_LENGTH)? as u16,
            buffer_fullness: get(BUFFER_FULLNESS)? as u16,
            raw_blocks: get(RAW_BLOCKS)? as u8 + 1,
        })
    }

    /// Sample rate in Hz, `None` for reserved indices
    pub fn sample_rate(&self) -> Option<u32> {
        SAMPLE_RATES.get(usize::from(self.sample_rate_index)).copied()
    }

    fn write(&self, record: &mut MetadataRecord) {
        record.insert("AAC:Format", "ADTS");
        record.insert("AAC:HasADTS", true);
        record.insert("AAC:MPEGVersion", if self.mpeg2 { "MPEG-2" } else { "MPEG-4" });
        record.insert("AAC:Layer", self.layer);
        record.insert("AAC:ProtectionAbsent", self.protection_absent);
        record.insert_aliased("AAC:Profile", &["Audio:Profile"], profile_name(self.profile));
        if let Some(rate) = self.sample_rate() {
            record.insert_aliased("AAC:SampleRate", &["Audio:SampleRate"], rate);
        }
        if self.channel_config > 0 {
            record.insert_aliased("AAC:ChannelConfiguration", &["Audio:Channels"], self.channel_config);
        } else {
            record.insert("AAC:ChannelConfiguration", self.channel_config);
        }
        record.insert("AAC:ChannelConfigurationName", channel_config_name(self.channel_config));
        record.insert("AAC:OriginalCopy", self.original);
        record.insert("AAC:Home", self.home);
        if self.frame_length > 0 {
            record.insert("AAC:FrameLength", self.frame_length);
        }
        if self.buffer_fullness == 0x7FF {
            record.insert("AAC:VariableBitrate", true);
        } else if self.buffer_fullness > 0 {
            record.insert("AAC:BufferFullness", self.buffer_fullness);
        }
        record.insert("AAC:NumberOfFrames", self.raw_blocks);
    }
}

/// The stream-level ADIF header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdifHeader {
    /// 72-bit copyright id, when present
    pub copyright_id: Option<[u8; 9]>,
    /// Original/copy flag
    pub original: bool,
    /// Home flag
    pub home: bool,
    /// Variable (`true`) or constant bitstream
    pub variable: bool,
    /// Bitrate in bits/s; a peak value for variable streams
    pub bitrate: u32,
    /// Program config elements
    pub program_config_elements: u8,
    /// Buffer fullness, constant streams only
    pub buffer_fullness: Option<u32>,
}

impl AdifHeader {
    /// Parses the header following the `ADIF` magic.
    ///
    /// The copyright id is optional and shifts every later field by 72 bits,
    /// so this reads sequentially instead of through fixed [`BitField`]s.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if !data.starts_with(ADIF_MAGIC) {
            return None;
        }
        let mut bits = BitCursor::new(data, ADIF_MAGIC.len());
        let copyright_id = if bits.flag()? {
            let mut id = [0u8; 9];
            for byte in &mut id {
                *byte = bits.read(8)? as u8;
            }
            Some(id)
        } else {
            None
        };
        let original = bits.flag()?;
        let home = bits.flag()?;
        let variable = bits.flag()?;
        let bitrate = bits.read(23)? as u32;
        let program_config_elements = bits.read(4)? as u8 + 1;
        let buffer_fullness = if variable {
            None
        } else {
            Some(bits.read(20)? as u32)
        };
        Some(Self {
            copyright_id,
            original,
            home,
            variable,
            bitrate,
            program_config_elements,
            buffer_fullness,
        })
    }

    fn write(&self, record: &mut MetadataRecord) {
        record.insert("AAC:Format", "ADIF");
        record.insert("AAC:HasADIF", true);
        record.insert("AAC:CopyrightIDPresent", self.copyright_id.is_some());
        if let Some(id) = &self.copyright_id {
            record.insert("AAC:CopyrightID", decode::hex_upper(id));
        }
        record.insert("AAC:OriginalCopy", self.original);
        record.insert("AAC:Home", self.home);
        record.insert(
            "AAC:BitstreamType",
            if self.variable { "Variable" } else { "Constant" },
        );
        if self.bitrate > 0 {
            record.insert_aliased("AAC:Bitrate", &["Audio:Bitrate"], self.bitrate);
        }
        if self.variable {
            record.insert("AAC:VariableBitrate", true);
        }
        record.insert("AAC:ProgramConfigElements", self.program_config_elements);
        if let Some(fullness) = self.buffer_fullness.filter(|&f| f > 0) {
            record.insert("AAC:BufferFullness", fullness);
        }
    }
}

/// Counts consecutive ADTS frames from the start of `data`.
///
/// Returns `(frames, raw_blocks)`; counting stops at the first broken sync,
/// an impossible frame length, a truncated frame, or after `max_frames`.
pub fn count_adts_frames(data: &[u8], max_frames: usize) -> (u64, u64) {
    let mut pos = 0usize;
    let mut frames = 0u64;
    let mut blocks = 0u64;
    while (frames as usize) < max_frames {
        let Some(header) = data.get(pos..).and_then(AdtsHeader::parse) else {
            break;
        };
        let len = usize::from(header.frame_length);
        if len < ADTS_HEADER_LEN || pos + len > data.len() {
            trace!("ADTS frame at {} ends the run (length {})", pos, len);
            break;
        }
        frames += 1;
        blocks += u64::from(header.raw_blocks);
        pos += len;
    }
    (frames, blocks)
}

/// Walks an ADIF or ADTS stream
pub(crate) fn walk(stream: &Stream<'_>) -> Walk {
    let data = stream.data;
    let mut walk = Walk::new();

    if let Some(header) = AdifHeader::parse(data) {
        debug!("ADIF header, {} bps", header.bitrate);
        walk.record.insert("Audio:Format", "AAC");
        header.write(&mut walk.record);
        return walk;
    }

    let Some(header) = AdtsHeader::parse(data) else {
        return walk;
    };
    walk.record.insert("Audio:Format", "AAC");
    header.write(&mut walk.record);

    let (frames, blocks) = count_adts_frames(data, stream.config.max_adts_frames);
    debug!("{} ADTS frames", frames);
    if frames > 0 {
        walk.record.insert("AAC:FrameCount", frames);
    }
    if let Some(rate) = header.sample_rate() {
        if blocks > 0 {
            walk.duration = Some(DurationSource::Samples {
                total_samples: blocks * SAMPLES_PER_FRAME,
                sample_rate: rate,
            });
        }
    }
    walk
}
