//! FLAC metadata block walker.
//!
//! After `fLaC` each block starts with a 4-byte header: last-block flag in
//! the top bit, 7-bit block type, 24-bit big-endian length.

use super::riff::Chunks;
use super::vorbis::VorbisComments;
use super::{Stream, Walk};
use crate::composite::DurationSource;
use crate::decode::{self, BitField, ByteCursor};
use crate::record::MetadataRecord;
use tracing::{debug, trace};

const SAMPLE_RATE: BitField = BitField::msb(10, 0, 20);
const CHANNELS: BitField = BitField::msb(12, 4, 3);
const BITS_PER_SAMPLE: BitField = BitField::msb(12, 7, 5);

/// Metadata block types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    /// 0
    StreamInfo,
    /// 1
    Padding,
    /// 2
    Application,
    /// 3
    SeekTable,
    /// 4
    VorbisComment,
    /// 5
    CueSheet,
    /// 6
    Picture,
    /// 7..=126
    Reserved(u8),
}

impl From<u8> for BlockType {
    fn from(code: u8) -> Self {
        match code {
            0 => Self::StreamInfo,
            1 => Self::Padding,
            2 => Self::Application,
            3 => Self::SeekTable,
            4 => Self::VorbisComment,
            5 => Self::CueSheet,
            6 => Self::Picture,
            other => Self::Reserved(other),
        }
    }
}

/// A borrowed metadata block
#[derive(Debug, Clone, Copy)]
pub struct Block<'a> {
    /// Block type
    pub block_type: BlockType,
    /// Last-block flag
    pub is_last: bool,
    /// Length from the header
    pub declared_len: u32,
    /// Payload, clamped to the available bytes
    pub payload: &'a [u8],
}

/// Iterator over metadata blocks
#[derive(Debug, Clone)]
pub struct Blocks<'a> {
    data: &'a [u8],
    pos: usize,
    remaining: usize,
    done: bool,
}

impl<'a> Blocks<'a> {
    /// Walks blocks starting at `offset` (4 for a bare stream)
    pub fn new(data: &'a [u8], offset: usize, max_blocks: usize) -> Self {
        Self {
            data,
            pos: offset,
            remaining: max_blocks,
            done: false,
        }
    }
}

impl<'a> Iterator for Blocks<'a> {
    type Item = Block<'a>;

    fn next(&mut self) -> Option<Block<'a>> {
        if self.done || self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let header = decode::u8_at(self.data, self.pos)?;
        let declared_len = decode::u24_be(self.data, self.pos + 1)?;
        let code = header & 0x7F;
        if code == 127 {
            self.done = true;
            return None;
        }
        let start = self.pos + 4;
        let end = start.saturating_add(declared_len as usize);
        let payload = &self.data[start..end.min(self.data.len())];

        let is_last = header & 0x80 != 0;
        self.done = is_last || end >= self.data.len();
        self.pos = end;

        Some(Block {
            block_type: BlockType::from(code),
            is_last,
            declared_len,
            payload,
        })
    }
}

/// STREAMINFO fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    /// Minimum block size in samples
    pub min_block_size: u16,
    /// Maximum block size in samples
    pub max_block_size: u16,
    /// Minimum frame size in bytes
    pub min_frame_size: u32,
    /// Maximum frame size in bytes
    pub max_frame_size: u32,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Channel count
    pub channels: u8,
    /// Bits per sample
    pub bits_per_sample: u8,
    /// Low 32 bits of the sample count (bytes 14..18 only)
    pub total_samples: u32,
    /// MD5 of the decoded audio, lowercase hex
    pub md5: String,
}

impl StreamInfo {
    /// Decodes a STREAMINFO payload (34 bytes)
    pub fn parse(payload: &[u8]) -> Option<Self> {
        if payload.len() < 34 {
            return None;
        }
        Some(Self {
            min_block_size: decode::u16_be(payload, 0)?,
            max_block_size: decode::u16_be(payload, 2)?,
            min_frame_size: decode::u24_be(payload, 4)?,
            max_frame_size: decode::u24_be(payload, 7)?,
            sample_rate: SAMPLE_RATE.extract(payload)? as u32,
            channels: CHANNELS.extract(payload)? as u8 + 1,
            bits_per_sample: BITS_PER_SAMPLE.extract(payload)? as u8 + 1,
            // The sample count field is 36 bits from byte 13; only bytes
            // 14..18 are read.
            total_samples: decode::u32_be(payload, 14)?,
            md5: decode::hex_lower(decode::bytes(payload, 18, 16)?),
        })
    }

    fn write(&self, record: &mut MetadataRecord) {
        record.insert_aliased("FLAC:BlockSizeMin", &["Audio:FLAC:BlockSizeMin"], self.min_block_size);
        record.insert_aliased("FLAC:BlockSizeMax", &["Audio:FLAC:BlockSizeMax"], self.max_block_size);
        record.insert_aliased("FLAC:FrameSizeMin", &["Audio:FLAC:FrameSizeMin"], self.min_frame_size);
        record.insert_aliased("FLAC:FrameSizeMax", &["Audio:FLAC:FrameSizeMax"], self.max_frame_size);
        record.insert("FLAC:SampleRate", self.sample_rate);
        record.insert("Audio:FLAC:SampleRate", format!("{} Hz", self.sample_rate));
        record.insert_aliased("FLAC:Channels", &["Audio:FLAC:Channels"], self.channels);
        record.insert_aliased("FLAC:BitsPerSample", &["Audio:FLAC:BitsPerSample"], self.bits_per_sample);
        if self.total_samples > 0 {
            record.insert_aliased("FLAC:TotalSamples", &["Audio:FLAC:TotalSamples"], self.total_samples);
        }
        record.insert_aliased("FLAC:MD5Signature", &["Audio:FLAC:MD5Signature"], self.md5.as_str());
    }
}

/// Walks a native FLAC stream
pub(crate) fn walk(stream: &Stream<'_>) -> Walk {
    let data = stream.data;
    let config = stream.config;
    let mut walk = Walk::new();
    if !data.starts_with(b"fLaC") {
        return walk;
    }

    let record = &mut walk.record;
    record.insert("Audio:FLAC:Format", "FLAC");
    record.insert("Audio:FLAC:IsFLAC", true);

    for block in Blocks::new(data, 4, config.max_blocks) {
        trace!("FLAC block {:?} ({} bytes)", block.block_type, block.declared_len);
        match block.block_type {
            BlockType::StreamInfo => {
                let Some(info) = StreamInfo::parse(block.payload) else {
                    continue;
                };
                info.write(record);
                if info.total_samples > 0 && info.sample_rate > 0 {
                    walk.duration = Some(DurationSource::RoundedSamples {
                        total_samples: u64::from(info.total_samples),
                        sample_rate: info.sample_rate,
                    });
                }
            }
            BlockType::VorbisComment => {
                if let Some(comments) = VorbisComments::parse(block.payload, config.max_comments) {
                    comments.write_flac(record);
                }
            }
            BlockType::Application => application(block.payload, record),
            BlockType::Picture => {
                picture(block.payload, record);
            }
            _ => {}
        }
    }
    walk
}

/// APPLICATION block; some encoders carry a whole RIFF header inside
fn application(payload: &[u8], record: &mut MetadataRecord) {
    let Some(app_id) = payload.get(..4) else {
        return;
    };
    let app_id = String::from_utf8_lossy(app_id).into_owned();
    record.insert("FLAC:ApplicationID", app_id.as_str());

    let app_data = &payload[4..];
    let window = &app_data[..app_data.len().min(100)];
    let Some(riff) = decode::find(window, b"RIFF") else {
        return;
    };
    if riff + 12 > app_data.len() {
        return;
    }
    debug!("RIFF data inside FLAC application block {}", app_id);

    for chunk in Chunks::new(app_data, riff + 12) {
        if chunk.declared_len == 0 || !chunk.is_complete() {
            break;
        }
        record.insert(format!("FLAC:RIFF:{}:Present", chunk.id), "Yes");
        record.insert(format!("FLAC:RIFF:{}:Size", chunk.id), chunk.declared_len);
    }
    record.insert("FLAC:RIFF:Present", "Yes");
    record.insert("FLAC:RIFF:ApplicationID", app_id);
}

const PICTURE_TYPES: [&str; 21] = [
    "Other",
    "32x32 PNG Icon",
    "Other Icon",
    "Front Cover",
    "Back Cover",
    "Leaflet",
    "Media",
    "Lead Artist",
    "Artist",
    "Conductor",
    "Band",
    "Composer",
    "Lyricist",
    "Recording Studio or Location",
    "Recording Session",
    "Performance",
    "Capture from Movie or Video",
    "Bright(ly) Colored Fish",
    "Illustration",
    "Band Logo",
    "Publisher Logo",
];

fn picture(payload: &[u8], record: &mut MetadataRecord) -> Option<()> {
    let mut cursor = ByteCursor::new(payload);
    let kind = cursor.u32_be()?;
    let mime_len = cursor.u32_be()? as usize;
    let mime = String::from_utf8_lossy(cursor.take(mime_len)?).into_owned();
    let desc_len = cursor.u32_be()? as usize;
    let description = String::from_utf8_lossy(cursor.take(desc_len)?).into_owned();
    let width = cursor.u32_be()?;
    let height = cursor.u32_be()?;
    let depth = cursor.u32_be()?;
    cursor.skip(4)?;
    let length = cursor.u32_be()?;

    match PICTURE_TYPES.get(kind as usize) {
        Some(name) => record.insert("FLAC:PictureType", *name),
        None => record.insert("FLAC:PictureType", kind),
    }
    record.insert("FLAC:PictureMIMEType", mime);
    if !description.is_empty() {
        record.insert("FLAC:PictureDescription", description);
    }
    record.insert("FLAC:PictureWidth", width);
    record.insert("FLAC:PictureHeight", height);
    record.insert("FLAC:PictureBitsPerPixel", depth);
    record.insert("FLAC:PictureLength", length);
    Some(())
}
