//! DSF (DSD Stream File).
//!
//! Three little-endian chunks, each `id(4) + u64 size` with the size counting
//! the chunk header: `DSD ` (file size, metadata pointer), `fmt `, `data`.
//! The optional ID3v2 tag lives at the metadata pointer, after the audio.

use super::id3::Id3Tag;
use super::riff::FourCC;
use super::{Stream, Walk};
use crate::composite::DurationSource;
use crate::decode;
use crate::record::MetadataRecord;
use tracing::{debug, trace};

const CHUNK_HEADER_LEN: u64 = 12;
const FMT_LEN: usize = 52;

fn channel_type_name(channel_type: u32) -> Option<&'static str> {
    Some(match channel_type {
        1 => "Mono",
        2 => "Stereo",
        3 => "3 channels",
        4 => "Quad",
        5 => "4 channels",
        6 => "5 channels",
        7 => "5.1 channels",
        _ => return None,
    })
}

/// `fmt ` chunk contents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DsfFormat {
    /// Format version (1)
    pub version: u32,
    /// Format id, 0 = DSD raw
    pub format_id: u32,
    /// Speaker layout code
    pub channel_type: u32,
    /// Channel count
    pub channels: u32,
    /// Sampling frequency in Hz
    pub sample_rate: u32,
    /// 1 or 8
    pub bits_per_sample: u32,
    /// Samples per channel
    pub sample_count: u64,
    /// Block size per channel (4096)
    pub block_size: u32,
}

impl DsfFormat {
    /// Parses a whole `fmt ` chunk, header included
    pub fn parse(chunk: &[u8]) -> Option<Self> {
        if chunk.len() < FMT_LEN || &chunk[..4] != b"fmt " {
            return None;
        }
        Some(Self {
            version: decode::u32_le(chunk, 12)?,
            format_id: decode::u32_le(chunk, 16)?,
            channel_type: decode::u32_le(chunk, 20)?,
            channels: decode::u32_le(chunk, 24)?,
            sample_rate: decode::u32_le(chunk, 28)?,
            bits_per_sample: decode::u32_le(chunk, 32)?,
            sample_count: decode::u64_le(chunk, 36)?,
            block_size: decode::u32_le(chunk, 44)?,
        })
    }

    /// Raw stream bitrate in bits/s
    pub fn bitrate(&self) -> u64 {
        u64::from(self.sample_rate) * u64::from(self.channels) * u64::from(self.bits_per_sample)
    }

    fn write(&self, record: &mut MetadataRecord) {
        record.insert("DSF:FormatVersion", self.version);
        record.insert("DSF:FormatID", self.format_id);
        if self.format_id == 0 {
            record.insert("DSF:FormatName", "DSD Raw");
        }
        record.insert("DSF:ChannelType", self.channel_type);
        if let Some(name) = channel_type_name(self.channel_type) {
            record.insert("DSF:ChannelTypeName", name);
        }
        record.insert_aliased("DSF:ChannelNumber", &["Audio:Channels"], self.channels);
        record.insert_aliased("DSF:SampleRate", &["Audio:SampleRate"], self.sample_rate);
        record.insert_aliased("DSF:BitsPerSample", &["Audio:BitsPerSample"], self.bits_per_sample);
        record.insert("DSF:SampleCount", self.sample_count);
        record.insert("DSF:BlockSizePerChannel", self.block_size);
        let bitrate = self.bitrate();
        if bitrate > 0 {
            record.insert_aliased("DSF:Bitrate", &["Audio:Bitrate"], bitrate);
        }
    }
}

fn metadata_tag(data: &[u8], pointer: u64, max_frames: usize, record: &mut MetadataRecord) {
    let Some(tag_data) = usize::try_from(pointer).ok().and_then(|p| data.get(p..)) else {
        trace!("metadata pointer {} is past the buffer", pointer);
        return;
    };
    let Some(tag) = Id3Tag::parse(tag_data, max_frames) else {
        return;
    };
    record.insert("DSF:HasID3v2", true);
    for (field, value) in &tag.fields {
        if *field == super::id3::FrameField::Title {
            record.insert_if_absent("XMP:Title", value.as_str());
        }
        record.insert(format!("ID3:{}", field.tag_name()), value.as_str());
    }
}

/// Walks a DSF file
pub(crate) fn walk(stream: &Stream<'_>) -> Walk {
    let data = stream.data;
    let mut walk = Walk::new();
    if !data.starts_with(b"DSD ") {
        return walk;
    }
    let record = &mut walk.record;
    record.insert("DSF:Format", "DSD Stream File");
    record.insert("DSF:HasDSFHeader", true);

    let mut format = None;
    let mut pos = 0usize;
    while let (Some(id), Some(size)) = (decode::array::<4>(data, pos), decode::u64_le(data, pos + 4)) {
        if size < CHUNK_HEADER_LEN {
            trace!("chunk at {} declares {} bytes", pos, size);
            break;
        }
        let chunk = decode::bytes(data, pos, usize::try_from(size).unwrap_or(usize::MAX));
        match &id {
            b"DSD " => {
                if let Some(total) = decode::u64_le(data, pos + 12) {
                    record.insert("DSF:FileSize", total);
                }
                if let Some(pointer) = decode::u64_le(data, pos + 20).filter(|&p| p > 0) {
                    record.insert("DSF:MetadataOffset", pointer);
                    metadata_tag(data, pointer, stream.config.max_frames, record);
                }
            }
            b"fmt " => {
                if let Some(parsed) = chunk.and_then(DsfFormat::parse) {
                    debug!("DSF fmt: {} Hz, {} channels", parsed.sample_rate, parsed.channels);
                    parsed.write(record);
                    format = Some(parsed);
                }
            }
            b"data" => {
                record.insert("DSF:DataChunkOffset", pos as u64 + CHUNK_HEADER_LEN);
                record.insert("DSF:DataChunkSize", size - CHUNK_HEADER_LEN);
            }
            other => trace!("skipping DSF chunk {}", FourCC(*other)),
        }
        match usize::try_from(size).ok().and_then(|s| pos.checked_add(s)) {
            Some(next) if next < data.len() => pos = next,
            _ => break,
        }
    }

    if let Some(fmt) = format.filter(|f| f.sample_rate > 0 && f.sample_count > 0) {
        walk.duration = Some(DurationSource::Samples {
            total_samples: fmt.sample_count,
            sample_rate: fmt.sample_rate,
        });
    }
    walk
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::id3::tests::{frame, tag};
    use crate::engine::ParserConfig;
    use pretty_assertions::assert_eq;

    fn dsd_chunk(total: u64, pointer: u64) -> Vec<u8> {
        let mut out = b"DSD ".to_vec();
        out.extend_from_slice(&28u64.to_le_bytes());
        out.extend_from_slice(&total.to_le_bytes());
        out.extend_from_slice(&pointer.to_le_bytes());
        out
    }

    fn fmt_chunk(channel_type: u32, channels: u32, rate: u32, samples: u64) -> Vec<u8> {
        let mut out = b"fmt ".to_vec();
        out.extend_from_slice(&52u64.to_le_bytes());
        for value in [1, 0, channel_type, channels, rate, 1] {
            out.extend_from_slice(&u32::to_le_bytes(value));
        }
        out.extend_from_slice(&samples.to_le_bytes());
        out.extend_from_slice(&4096u32.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out
    }

    fn data_chunk(len: usize) -> Vec<u8> {
        let mut out = b"data".to_vec();
        out.extend_from_slice(&((len as u64) + 12).to_le_bytes());
        out.extend(vec![0x69u8; len]);
        out
    }

    fn dsf(id3: &[u8]) -> Vec<u8> {
        let fmt = fmt_chunk(2, 2, 2_822_400, 2_822_400 * 3);
        let audio = data_chunk(64);
        let pointer = if id3.is_empty() {
            0
        } else {
            (28 + fmt.len() + audio.len()) as u64
        };
        let total = (28 + fmt.len() + audio.len() + id3.len()) as u64;
        [dsd_chunk(total, pointer), fmt, audio, id3.to_vec()].concat()
    }

    fn run(data: &[u8]) -> Walk {
        let config = ParserConfig::default();
        walk(&Stream::new(data, data.len() as u64, &config))
    }

    #[test]
    fn test_chunks() {
        let data = dsf(&[]);
        let walk = run(&data);
        let r = &walk.record;
        assert_eq!(r.get_str("DSF:Format"), Some("DSD Stream File"));
        assert_eq!(r.get_int("DSF:FileSize"), Some(data.len() as i64));
        assert_eq!(r.get_str("DSF:ChannelTypeName"), Some("Stereo"));
        assert_eq!(r.get_int("Audio:Channels"), Some(2));
        assert_eq!(r.get_int("DSF:SampleRate"), Some(2_822_400));
        assert_eq!(r.get_int("DSF:BlockSizePerChannel"), Some(4096));
        assert_eq!(r.get_int("DSF:Bitrate"), Some(5_644_800));
        assert_eq!(r.get_int("DSF:DataChunkSize"), Some(64));
        assert_eq!(r.get_int("DSF:DataChunkOffset"), Some(28 + 52 + 12));
        assert!(!r.contains_key("DSF:MetadataOffset"));
        assert_eq!(
            walk.duration,
            Some(DurationSource::Samples {
                total_samples: 2_822_400 * 3,
                sample_rate: 2_822_400
            })
        );
    }

    #[test]
    fn test_trailing_id3() {
        let id3 = tag(3, &[frame(b"TIT2", b"\x00DSD Track"), frame(b"TPE1", b"\x00Someone")], 0);
        let r = run(&dsf(&id3)).record;
        assert_eq!(r.get("DSF:HasID3v2").and_then(|v| v.as_bool()), Some(true));
        assert_eq!(r.get_str("ID3:Title"), Some("DSD Track"));
        assert_eq!(r.get_str("ID3:Artist"), Some("Someone"));
        assert_eq!(r.get_str("XMP:Title"), Some("DSD Track"));
    }

    #[test]
    fn test_bad_pointer_and_chunk_size() {
        let mut data = dsf(&[]);
        data[20..28].copy_from_slice(&u64::MAX.to_le_bytes());
        // fmt chunk claims fewer bytes than its header
        data[32..40].copy_from_slice(&4u64.to_le_bytes());
        let walk = run(&data);
        assert_eq!(
            walk.record.get_str("DSF:MetadataOffset"),
            Some("18446744073709551615")
        );
        assert!(!walk.record.contains_key("DSF:HasID3v2"));
        assert!(walk.duration.is_none());
        assert!(!walk.record.contains_key("DSF:SampleRate"));
    }
}
