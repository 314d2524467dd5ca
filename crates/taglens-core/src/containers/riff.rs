//! RIFF/WAVE chunk walker.
//!
//! A RIFF file is `RIFF` + size + form type followed by a flat sequence of
//! chunks: 4-byte ASCII id, 4-byte little-endian length, payload, and one
//! pad byte when the length is odd. [`Chunks`] walks that sequence using the
//! length alone, so unknown chunk types cost nothing to skip. The same
//! iterator walks `LIST` bodies and RIFF data smuggled inside FLAC
//! APPLICATION blocks.

use super::{id3, Stream, Walk};
use crate::composite::DurationSource;
use crate::decode::{self, text};
use crate::record::MetadataRecord;
use std::fmt;
use tracing::{debug, trace};

/// Four-character chunk code
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    /// Renders the code as text, replacing non-printable bytes
    pub fn to_lossy_string(&self) -> String {
        self.0
            .iter()
            .map(|&b| if b.is_ascii_graphic() || b == b' ' { char::from(b) } else { '?' })
            .collect()
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_lossy_string())
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCC({:?})", self.to_lossy_string())
    }
}

/// A borrowed view of one chunk
#[derive(Debug, Clone, Copy)]
pub struct Chunk<'a> {
    /// Chunk id
    pub id: FourCC,
    /// Offset of the chunk header in the walked buffer
    pub offset: usize,
    /// Length from the header
    pub declared_len: u32,
    /// Payload, clamped to the bytes actually available
    pub payload: &'a [u8],
}

impl Chunk<'_> {
    /// True when the whole declared payload is inside the buffer
    pub fn is_complete(&self) -> bool {
        self.payload.len() == self.declared_len as usize
    }
}

/// Iterator over consecutive RIFF chunks
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Chunks<'a> {
    /// Starts walking `data` at `offset`
    pub fn new(data: &'a [u8], offset: usize) -> Self {
        Self { data, pos: offset }
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Chunk<'a>;

    fn next(&mut self) -> Option<Chunk<'a>> {
        let offset = self.pos;
        let id = decode::array::<4>(self.data, offset)?;
        let declared_len = decode::u32_le(self.data, offset + 4)?;
        let start = offset + 8;
        let end = start.saturating_add(declared_len as usize).min(self.data.len());

        let padded = (declared_len as usize).saturating_add((declared_len & 1) as usize);
        self.pos = start.saturating_add(padded);

        Some(Chunk {
            id: FourCC(id),
            offset,
            declared_len,
            payload: &self.data[start..end],
        })
    }
}

/// Fields of a `fmt ` chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveFormat {
    /// Format tag (1 = PCM, 3 = IEEE float, 0xFFFE = extensible, ...)
    pub format_tag: u16,
    /// Channel count
    pub channels: u16,
    /// Samples per second
    pub sample_rate: u32,
    /// Average byte rate
    pub avg_bytes_per_sec: u32,
    /// Bytes per sample frame
    pub block_align: u16,
    /// Bits per sample
    pub bits_per_sample: u16,
    /// Sub-format code of `WAVE_FORMAT_EXTENSIBLE`
    pub sub_format: Option<u16>,
}

const WAVE_FORMAT_EXTENSIBLE: u16 = 0xFFFE;

impl WaveFormat {
    /// Decodes a `fmt ` payload (at least 16 bytes)
    pub fn parse(payload: &[u8]) -> Option<Self> {
        if payload.len() < 16 {
            return None;
        }
        let format_tag = decode::u16_le(payload, 0)?;
        let sub_format = if format_tag == WAVE_FORMAT_EXTENSIBLE {
            decode::u16_le(payload, 24)
        } else {
            None
        };
        Some(Self {
            format_tag,
            channels: decode::u16_le(payload, 2)?,
            sample_rate: decode::u32_le(payload, 4)?,
            avg_bytes_per_sec: decode::u32_le(payload, 8)?,
            block_align: decode::u16_le(payload, 12)?,
            bits_per_sample: decode::u16_le(payload, 14)?,
            sub_format,
        })
    }

    fn write(&self, record: &mut MetadataRecord) {
        let encoding = encoding_name(self.format_tag);
        let standard = match self.format_tag {
            1 => "Microsoft PCM".to_string(),
            _ => encoding.clone(),
        };
        record.insert("Audio:WAV:Encoding", encoding);
        record.insert("RIFF:Encoding", standard);
        if let Some(sub) = self.sub_format {
            record.insert_aliased("Audio:WAV:SubFormat", &["RIFF:SubFormat"], encoding_name(sub));
        }
        record.insert_aliased("Audio:WAV:NumChannels", &["RIFF:NumChannels"], self.channels);
        record.insert("Audio:WAV:SampleRate", format!("{} Hz", self.sample_rate));
        record.insert("RIFF:SampleRate", self.sample_rate);
        record.insert_aliased(
            "Audio:WAV:AvgBytesPerSec",
            &["RIFF:AvgBytesPerSec"],
            self.avg_bytes_per_sec,
        );
        record.insert_aliased("Audio:WAV:BlockAlign", &["RIFF:BlockAlign"], self.block_align);
        record.insert_aliased(
            "Audio:WAV:BitsPerSample",
            &["RIFF:BitsPerSample"],
            self.bits_per_sample,
        );
    }
}

fn encoding_name(format_tag: u16) -> String {
    match format_tag {
        0x0001 => "PCM",
        0x0002 => "Microsoft ADPCM",
        0x0003 => "IEEE Float",
        0x0006 => "A-law",
        0x0007 => "μ-law",
        0x0011 => "ADPCM",
        0x0050 => "MPEG",
        0x0055 => "MP3",
        WAVE_FORMAT_EXTENSIBLE => "Extensible",
        other => return format!("Format {}", other),
    }
    .to_string()
}

/// Walks a RIFF/WAVE file
pub(crate) fn walk(stream: &Stream<'_>) -> Walk {
    let data = stream.data;
    let mut walk = Walk::new();
    if !data.starts_with(b"RIFF") || data.get(8..12) != Some(b"WAVE".as_slice()) {
        return walk;
    }

    let record = &mut walk.record;
    record.insert("Audio:WAV:Format", "WAV");
    record.insert("Audio:WAV:IsRIFF", true);

    let mut format = None;
    let mut data_size = None;

    for chunk in Chunks::new(data, 12) {
        trace!("RIFF chunk {} at {} ({} bytes)", chunk.id, chunk.offset, chunk.declared_len);
        match &chunk.id.0 {
            b"fmt " => {
                if let Some(fmt) = WaveFormat::parse(chunk.payload) {
                    fmt.write(record);
                    format = Some(fmt);
                }
            }
            b"data" => {
                if chunk.is_complete() {
                    data_size = Some(u64::from(chunk.declared_len));
                }
            }
            b"LIST" => walk_list(&chunk, record, stream.config.text_limit),
            b"guan" => guano(&chunk, 0, record, stream.config.text_limit),
            b"acid" => acid(&chunk, record),
            b"id3 " | b"ID3 " => embedded_id3(&chunk, record, stream.config.max_frames),
            b"iXML" => xml_blob("RIFF:iXML", &chunk, record, stream.config.text_limit),
            b"aXML" => xml_blob("RIFF:aXML", &chunk, record, stream.config.text_limit),
            b"UMID" | b"umid" => umid(&chunk, record),
            _ => {}
        }
    }

    if let (Some(fmt), Some(size)) = (format, data_size) {
        debug!("WAV data chunk of {} bytes", size);
        walk.duration = Some(DurationSource::Pcm {
            data_size: size,
            sample_rate: fmt.sample_rate,
            channels: fmt.channels,
            bits_per_sample: fmt.bits_per_sample,
        });
    }
    walk
}

fn walk_list(chunk: &Chunk<'_>, record: &mut MetadataRecord, text_limit: usize) {
    let Some(list_type) = chunk.payload.get(..4) else {
        return;
    };
    match list_type {
        b"INFO" => {
            record.insert("Audio:WAV:HasINFOChunk", true);
            for sub in Chunks::new(chunk.payload, 4) {
                let tag = match &sub.id.0 {
                    b"INAM" => "Title",
                    b"IART" => "Artist",
                    b"ICMT" => "Comment",
                    b"ICRD" => "DateCreated",
                    b"IGNR" => "Genre",
                    b"ICOP" => "Copyright",
                    b"ISFT" => "Software",
                    _ => continue,
                };
                let value = text::lenient(sub.payload);
                let value = value.trim();
                if value.is_empty() {
                    continue;
                }
                if tag == "Title" {
                    record.insert_if_absent("XMP:Title", value);
                }
                record.insert(format!("Audio:WAV:{}", tag), value);
            }
        }
        b"GUAN" | b"guan" => guano(chunk, 4, record, text_limit),
        _ => {}
    }
}

/// GUANO bat-acoustics metadata: `Key: Value` (or `Key=Value`) lines
fn guano(chunk: &Chunk<'_>, skip: usize, record: &mut MetadataRecord, text_limit: usize) {
    record.insert("RIFF:Guano:Present", "Yes");
    record.insert("RIFF:Guano:DataSize", chunk.declared_len);

    let body = text::lenient(chunk.payload.get(skip..).unwrap_or_default());
    let body = body.trim_matches('\0');
    if body.is_empty() {
        return;
    }

    for line in body.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let pair = if line.contains(':') {
            line.split_once(':')
        } else {
            line.split_once('=')
        };
        let Some((key, value)) = pair else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());
        if key.is_empty() || value.is_empty() {
            continue;
        }
        let tag: String = key.chars().filter(|c| *c != ' ' && *c != '-').collect();
        record.insert(format!("RIFF:Guano:{}", tag), value);
    }

    let (data, truncated) = text::truncate_chars(body, text_limit);
    record.insert("RIFF:Guano:Data", data);
    if truncated {
        record.insert("RIFF:Guano:Truncated", "Yes");
    }
}

/// ACID loop information
fn acid(chunk: &Chunk<'_>, record: &mut MetadataRecord) {
    let p = chunk.payload;
    record.insert("RIFF:Acid:Present", "Yes");
    record.insert("RIFF:Acid:DataSize", chunk.declared_len);

    if let Some(flags) = decode::u32_le(p, 0) {
        record.insert("RIFF:Acid:Flags", format!("0x{:08X}", flags));
        record.insert("RIFF:Acid:OneShot", flags & 0x01 != 0);
        if flags & 0x02 != 0 {
            if let Some(root) = decode::u16_le(p, 4) {
                record.insert("RIFF:Acid:RootNote", root);
            }
        }
    }
    if let Some(beats) = decode::u32_le(p, 12) {
        record.insert("RIFF:Acid:Beats", beats);
    }
    if let (Some(denominator), Some(numerator)) = (decode::u16_le(p, 16), decode::u16_le(p, 18)) {
        if denominator > 0 {
            record.insert("RIFF:Acid:TimeSignature", format!("{}/{}", numerator, denominator));
        }
    }
    if let Some(tempo) = decode::f32_le(p, 20).filter(|t| t.is_finite()) {
        record.insert("RIFF:Acid:Tempo", format!("{:.2} bpm", tempo));
    }
}

fn embedded_id3(chunk: &Chunk<'_>, record: &mut MetadataRecord, max_frames: usize) {
    record.insert("RIFF:ID3:Present", "Yes");
    let Some(tag) = id3::Id3Tag::parse(chunk.payload, max_frames) else {
        record.insert("RIFF:ID3:DataSize", chunk.declared_len);
        return;
    };
    let header = &tag.header;
    record.insert("RIFF:ID3:Version", format!("2.{}.{}", header.major, header.minor));
    record.insert("RIFF:ID3:Size", header.size);
    record.insert("RIFF:ID3:Flags", format!("0x{:02X}", header.flags));
    for (field, value) in &tag.fields {
        record.insert(format!("RIFF:ID3:{}", field.tag_name()), value.as_str());
    }
}

fn xml_blob(group: &str, chunk: &Chunk<'_>, record: &mut MetadataRecord, text_limit: usize) {
    let body = text::lenient(chunk.payload);
    let body = body.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    if body.is_empty() {
        return;
    }
    record.insert(format!("{}:Present", group), "Yes");
    record.insert(format!("{}:DataSize", group), chunk.declared_len);
    let (data, truncated) = text::truncate_chars(body, text_limit);
    record.insert(format!("{}:Data", group), data);
    if truncated {
        record.insert(format!("{}:Truncated", group), "Yes");
    }
}

/// SMPTE UMID: 32-byte basic or 64-byte extended
fn umid(chunk: &Chunk<'_>, record: &mut MetadataRecord) {
    let p = chunk.payload;
    if p.len() < 32 {
        return;
    }
    record.insert("RIFF:UMID:Present", "Yes");
    record.insert("RIFF:UMID:DataSize", chunk.declared_len);
    record.insert("RIFF:UMID:MaterialNumber", decode::hex_upper(&p[..32]));
    if let Some(instance) = p.get(32..64) {
        record.insert("RIFF:UMID:InstanceNumber", decode::hex_upper(instance));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ParserConfig;
    use crate::record::Value;
    use pretty_assertions::assert_eq;

    fn chunk(id: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = id.to_vec();
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(payload);
        if payload.len() % 2 == 1 {
            out.push(0);
        }
        out
    }

    fn fmt_payload(tag: u16, channels: u16, rate: u32, bits: u16) -> Vec<u8> {
        let block_align = channels * bits / 8;
        let mut p = Vec::new();
        p.extend_from_slice(&tag.to_le_bytes());
        p.extend_from_slice(&channels.to_le_bytes());
        p.extend_from_slice(&rate.to_le_bytes());
        p.extend_from_slice(&(rate * u32::from(block_align)).to_le_bytes());
        p.extend_from_slice(&block_align.to_le_bytes());
        p.extend_from_slice(&bits.to_le_bytes());
        p
    }

    fn wave(chunks: &[Vec<u8>]) -> Vec<u8> {
        let body: Vec<u8> = chunks.concat();
        let mut out = b"RIFF".to_vec();
        out.extend_from_slice(&((body.len() + 4) as u32).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend(body);
        out
    }

    fn run(data: &[u8]) -> Walk {
        let config = ParserConfig::default();
        walk(&Stream::new(data, data.len() as u64, &config))
    }

    #[test]
    fn test_chunk_iterator_pads_odd_lengths() {
        let data = [chunk(b"abcd", b"xyz"), chunk(b"efgh", b"12")].concat();
        let ids: Vec<_> = Chunks::new(&data, 0).map(|c| c.id.to_string()).collect();
        assert_eq!(ids, vec!["abcd", "efgh"]);
    }

    #[test]
    fn test_chunk_iterator_clamps_oversized() {
        let mut data = b"data".to_vec();
        data.extend_from_slice(&u32::MAX.to_le_bytes());
        data.extend_from_slice(b"abc");
        let chunks: Vec<_> = Chunks::new(&data, 0).collect();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].payload, b"abc");
        assert!(!chunks[0].is_complete());
    }

    #[test]
    fn test_pcm_format() {
        let data = wave(&[chunk(b"fmt ", &fmt_payload(1, 2, 44100, 16))]);
        let walk = run(&data);
        let r = &walk.record;
        assert_eq!(r.get_str("RIFF:Encoding"), Some("Microsoft PCM"));
        assert_eq!(r.get_str("Audio:WAV:Encoding"), Some("PCM"));
        assert_eq!(r.get_int("RIFF:NumChannels"), Some(2));
        assert_eq!(r.get_int("RIFF:SampleRate"), Some(44100));
        assert_eq!(r.get_str("Audio:WAV:SampleRate"), Some("44100 Hz"));
        assert_eq!(r.get_int("RIFF:BitsPerSample"), Some(16));
        assert!(walk.duration.is_none());
    }

    #[test]
    fn test_float_format() {
        let data = wave(&[chunk(b"fmt ", &fmt_payload(3, 1, 48000, 32))]);
        assert_eq!(run(&data).record.get_str("RIFF:Encoding"), Some("IEEE Float"));
    }

    #[test]
    fn test_duration_source() {
        let data = wave(&[
            chunk(b"fmt ", &fmt_payload(1, 2, 44100, 16)),
            chunk(b"data", &vec![0u8; 1000]),
        ]);
        let walk = run(&data);
        assert_eq!(
            walk.duration,
            Some(DurationSource::Pcm {
                data_size: 1000,
                sample_rate: 44100,
                channels: 2,
                bits_per_sample: 16,
            })
        );
    }

    #[test]
    fn test_info_list() {
        let mut list = b"INFO".to_vec();
        list.extend(chunk(b"INAM", b"Night Calls\0"));
        list.extend(chunk(b"IART", b"Recorder\0"));
        list.extend(chunk(b"IXYZ", b"ignored"));
        let data = wave(&[chunk(b"LIST", &list)]);
        let r = run(&data).record;
        assert_eq!(r.get("Audio:WAV:HasINFOChunk"), Some(&Value::Bool(true)));
        assert_eq!(r.get_str("Audio:WAV:Title"), Some("Night Calls"));
        assert_eq!(r.get_str("XMP:Title"), Some("Night Calls"));
        assert_eq!(r.get_str("Audio:WAV:Artist"), Some("Recorder"));
    }

    #[test]
    fn test_guano() {
        let body = b"GUANO|Version: 1.0\nMake: Pettersson\n# comment\nLoc Position=51.5 -0.1\n";
        let data = wave(&[chunk(b"guan", body)]);
        let r = run(&data).record;
        assert_eq!(r.get_str("RIFF:Guano:Present"), Some("Yes"));
        assert_eq!(r.get_str("RIFF:Guano:GUANO|Version"), Some("1.0"));
        assert_eq!(r.get_str("RIFF:Guano:Make"), Some("Pettersson"));
        assert_eq!(r.get_str("RIFF:Guano:LocPosition"), Some("51.5 -0.1"));
        assert!(!r.contains_key("RIFF:Guano:Truncated"));
    }

    #[test]
    fn test_xml_truncation() {
        let xml = format!("<BWFXML>{}</BWFXML>", "a".repeat(20));
        let data = wave(&[chunk(b"iXML", xml.as_bytes())]);
        let config = ParserConfig::new().text_limit(10);
        let r = walk(&Stream::new(&data, data.len() as u64, &config)).record;
        assert_eq!(r.get_str("RIFF:iXML:Data"), Some("<BWFXML>aa..."));
        assert_eq!(r.get_str("RIFF:iXML:Truncated"), Some("Yes"));
    }

    #[test]
    fn test_acid() {
        let mut p = Vec::new();
        p.extend_from_slice(&0x02u32.to_le_bytes());
        p.extend_from_slice(&60u16.to_le_bytes());
        p.extend_from_slice(&0u16.to_le_bytes());
        p.extend_from_slice(&0f32.to_le_bytes());
        p.extend_from_slice(&8u32.to_le_bytes());
        p.extend_from_slice(&4u16.to_le_bytes());
        p.extend_from_slice(&3u16.to_le_bytes());
        p.extend_from_slice(&120.5f32.to_le_bytes());
        let r = run(&wave(&[chunk(b"acid", &p)])).record;
        assert_eq!(r.get_str("RIFF:Acid:Flags"), Some("0x00000002"));
        assert_eq!(r.get_int("RIFF:Acid:RootNote"), Some(60));
        assert_eq!(r.get_int("RIFF:Acid:Beats"), Some(8));
        assert_eq!(r.get_str("RIFF:Acid:TimeSignature"), Some("3/4"));
        assert_eq!(r.get_str("RIFF:Acid:Tempo"), Some("120.50 bpm"));
    }

    #[test]
    fn test_umid() {
        let p: Vec<u8> = (0u8..64).collect();
        let r = run(&wave(&[chunk(b"UMID", &p)])).record;
        assert_eq!(
            r.get_str("RIFF:UMID:MaterialNumber").map(str::len),
            Some(64)
        );
        assert!(r.get_str("RIFF:UMID:InstanceNumber").unwrap().starts_with("2021"));
    }

    #[test]
    fn test_not_riff() {
        assert!(run(b"RIFX\0\0\0\0WAVE").record.is_empty());
        assert!(run(b"RIFF\0\0\0\0AVI ").record.is_empty());
    }
}
