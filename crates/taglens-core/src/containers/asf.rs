//! ASF (WMA) object scanning.
//!
//! Every ASF object starts with a 16-byte GUID and a little-endian u64 size
//! that includes the 24-byte object header. Instead of descending from the
//! Header Object's child count, the walker searches the whole buffer for each
//! known object GUID and decodes every occurrence whose declared size fits.
//! A Header Object with a broken size or child count still yields its
//! children this way.

use super::{Stream, Walk};
use crate::composite::{self, DurationSource};
use crate::decode::{self, text, ByteCursor};
use crate::record::MetadataRecord;
use chrono::DateTime;
use std::fmt;
use tracing::{debug, trace};

/// A GUID in its on-disk byte order.
///
/// ASF stores the first three fields little-endian, so the bytes differ from
/// the hyphenated text form in the first eight positions.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Guid(pub [u8; 16]);

impl Guid {
    /// Builds the on-disk form from the fields of the hyphenated text form
    pub const fn from_fields(d1: u32, d2: u16, d3: u16, d4: [u8; 8]) -> Self {
        let a = d1.to_le_bytes();
        let b = d2.to_le_bytes();
        let c = d3.to_le_bytes();
        Self([
            a[0], a[1], a[2], a[3], b[0], b[1], c[0], c[1], d4[0], d4[1], d4[2], d4[3], d4[4],
            d4[5], d4[6], d4[7],
        ])
    }

    /// Reads a GUID at `offset`
    pub fn read(data: &[u8], offset: usize) -> Option<Self> {
        decode::array(data, offset).map(Self)
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:08X}-{:04X}-{:04X}-{}-{}",
            u32::from_le_bytes([b[0], b[1], b[2], b[3]]),
            u16::from_le_bytes([b[4], b[5]]),
            u16::from_le_bytes([b[6], b[7]]),
            decode::hex_upper(&b[8..10]),
            decode::hex_upper(&b[10..16]),
        )
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Guid({})", self)
    }
}

/// Known object and type GUIDs
pub mod guids {
    use super::Guid;

    /// Header Object
    pub const HEADER: Guid = Guid::from_fields(
        0x75B2_2630,
        0x668E,
        0x11CF,
        [0xA6, 0xD9, 0x00, 0xAA, 0x00, 0x62, 0xCE, 0x6C],
    );
    /// File Properties Object
    pub const FILE_PROPERTIES: Guid = Guid::from_fields(
        0x8CAB_DCA1,
        0xA947,
        0x11CF,
        [0x8E, 0xE4, 0x00, 0xC0, 0x0C, 0x20, 0x53, 0x65],
    );
    /// Stream Properties Object
    pub const STREAM_PROPERTIES: Guid = Guid::from_fields(
        0xB7DC_0791,
        0xA9B7,
        0x11CF,
        [0x8E, 0xE6, 0x00, 0xC0, 0x0C, 0x20, 0x53, 0x65],
    );
    /// Codec List Object
    pub const CODEC_LIST: Guid = Guid::from_fields(
        0x86D1_5240,
        0x311D,
        0x11D0,
        [0xA3, 0xA4, 0x00, 0xA0, 0xC9, 0x03, 0x48, 0xF6],
    );
    /// Content Description Object
    pub const CONTENT_DESCRIPTION: Guid = Guid::from_fields(
        0x75B2_2633,
        0x668E,
        0x11CF,
        [0xA6, 0xD9, 0x00, 0xAA, 0x00, 0x62, 0xCE, 0x6C],
    );
    /// Extended Content Description Object
    pub const EXTENDED_CONTENT_DESCRIPTION: Guid = Guid::from_fields(
        0xD2D0_A440,
        0xE307,
        0x11D2,
        [0x97, 0xF0, 0x00, 0xA0, 0xC9, 0x5E, 0xA8, 0x50],
    );
    /// Stream type: audio
    pub const AUDIO_MEDIA: Guid = Guid::from_fields(
        0xF869_9E40,
        0x5B4D,
        0x11CF,
        [0xA8, 0xFD, 0x00, 0x80, 0x5F, 0x5C, 0x44, 0x2B],
    );
    /// Stream type: video
    pub const VIDEO_MEDIA: Guid = Guid::from_fields(
        0xBC19_EFC0,
        0x5B4D,
        0x11CF,
        [0xA8, 0xFD, 0x00, 0x80, 0x5F, 0x5C, 0x44, 0x2B],
    );
    /// Error correction: audio spread
    pub const AUDIO_SPREAD: Guid = Guid::from_fields(
        0xBFC3_CD50,
        0x618F,
        0x11CF,
        [0x8B, 0xB2, 0x00, 0xAA, 0x00, 0xB4, 0xE2, 0x20],
    );
    /// Error correction: none
    pub const NO_ERROR_CORRECTION: Guid = Guid::from_fields(
        0x20FB_5700,
        0x5B55,
        0x11CF,
        [0xA8, 0xFD, 0x00, 0x80, 0x5F, 0x5C, 0x44, 0x2B],
    );
}

const OBJECT_HEADER_LEN: usize = 24;
const FILE_PROPERTIES_LEN: u64 = 104;
const STREAM_PROPERTIES_LEN: u64 = 78;
/// 100ns ticks between 1601-01-01 and 1970-01-01
const FILETIME_UNIX_EPOCH: u64 = 116_444_736_000_000_000;
const TICKS_PER_SECOND: u64 = 10_000_000;

/// Every complete object with the given GUID, header included
fn objects<'a>(data: &'a [u8], guid: &'a Guid, min_len: u64) -> impl Iterator<Item = &'a [u8]> + 'a {
    decode::find_all(data, &guid.0).filter_map(move |pos| {
        let size = decode::u64_le(data, pos + 16)?;
        if size < min_len {
            trace!("{} at {} too small: {}", guid, pos, size);
            return None;
        }
        let end = pos.checked_add(usize::try_from(size).ok()?)?;
        data.get(pos..end)
    })
}

/// Renders a FILETIME as `YYYY:MM:DD HH:MM:SS` UTC
pub fn filetime_to_string(filetime: u64) -> Option<String> {
    let since_unix = filetime.checked_sub(FILETIME_UNIX_EPOCH)?;
    let secs = i64::try_from(since_unix / TICKS_PER_SECOND).ok()?;
    let nanos = (since_unix % TICKS_PER_SECOND) as u32 * 100;
    let time = DateTime::from_timestamp(secs, nanos)?;
    Some(time.format("%Y:%m:%d %H:%M:%S").to_string())
}

fn file_properties(obj: &[u8], walk: &mut Walk) {
    let record = &mut walk.record;
    let field = |offset| decode::u64_le(obj, offset).unwrap_or(0);
    let dword = |offset| decode::u32_le(obj, offset).unwrap_or(0);

    if let Some(id) = Guid::read(obj, 24) {
        record.insert("ASF:FileID", id.to_string());
    }
    let file_length = field(40);
    if file_length > 0 {
        record.insert_aliased("Audio:WMA:FileLength", &["ASF:FileLength"], file_length);
    }
    if let Some(created) = filetime_to_string(field(48)) {
        record.insert_aliased("Audio:WMA:CreationDate", &["ASF:CreationDate"], created);
    }
    let packets = field(56);
    if packets > 0 {
        record.insert_aliased("Audio:WMA:DataPacketsCount", &["ASF:DataPackets"], packets);
    }
    let play = field(64);
    if play > 0 {
        walk.duration = Some(DurationSource::Filetime { hundred_ns: play });
    }
    let send = field(72);
    if send > 0 {
        let formatted = composite::format_duration(send as f64 / TICKS_PER_SECOND as f64);
        record.insert_aliased("Audio:WMA:SendDuration", &["ASF:SendDuration"], formatted);
    }
    let preroll = field(80);
    if preroll > 0 {
        record.insert("Audio:WMA:Preroll", format!("{} ms", preroll));
        record.insert("ASF:Preroll", preroll);
    }
    record.insert("ASF:Flags", dword(88));
    for (offset, canonical, alias) in [
        (92, "Audio:WMA:MinPacketSize", "ASF:MinPacketSize"),
        (96, "Audio:WMA:MaxPacketSize", "ASF:MaxPacketSize"),
    ] {
        let size = dword(offset);
        if size > 0 {
            record.insert_aliased(canonical, &[alias], size);
        }
    }
    let max_bitrate = dword(100);
    if max_bitrate > 0 {
        record.insert("Audio:WMA:MaxBitrate", format!("{} bps", max_bitrate));
        record.insert("ASF:MaxBitrate", format!("{:.0} kbps", f64::from(max_bitrate) / 1000.0));
    }
}

/// Descriptive name for a WAVEFORMATEX codec id
pub fn codec_name(format_tag: u16) -> String {
    let name = match format_tag {
        0x0001 => "PCM",
        0x0002 => "Microsoft ADPCM",
        0x0003 => "IEEE Float",
        0x0011 => "Intel IMA ADPCM",
        0x0031 => "GSM 6.10",
        0x0050 => "MPEG",
        0x0055 => "MP3",
        0x00FF | 0x1610 => "AAC",
        0x0160 => "Windows Media Audio V1",
        0x0161 => "Windows Media Audio V2",
        0x0162 => "Windows Media Audio 9 Professional",
        0x0163 => "Windows Media Audio 9 Lossless",
        0x000A | 0x0164 => "Windows Media Audio 9 Voice",
        _ => return format!("Unknown (0x{:04X})", format_tag),
    };
    name.to_string()
}

fn stream_properties(obj: &[u8], record: &mut MetadataRecord) {
    let stream_type = Guid::read(obj, 24);
    match stream_type {
        Some(guids::AUDIO_MEDIA) => {
            record.insert_aliased("Audio:WMA:StreamType", &["ASF:StreamType"], "Audio")
        }
        Some(guids::VIDEO_MEDIA) => {
            record.insert_aliased("Audio:WMA:StreamType", &["ASF:StreamType"], "Video")
        }
        _ => {}
    }
    match Guid::read(obj, 40) {
        Some(guids::AUDIO_SPREAD) => record.insert_aliased(
            "Audio:WMA:ErrorCorrectionType",
            &["ASF:ErrorCorrectionType"],
            "Audio Spread",
        ),
        Some(guids::NO_ERROR_CORRECTION) => record.insert_aliased(
            "Audio:WMA:ErrorCorrectionType",
            &["ASF:ErrorCorrectionType"],
            "No Error Correction",
        ),
        _ => {}
    }
    if let Some(offset) = decode::u64_le(obj, 56) {
        record.insert(
            "ASF:TimeOffset",
            format!("{:.2} s", offset as f64 / TICKS_PER_SECOND as f64),
        );
    }
    let stream_number = decode::u16_le(obj, 72).unwrap_or(0) & 0x7F;
    if stream_number > 0 {
        record.insert_aliased("Audio:WMA:StreamNumber", &["ASF:StreamNumber"], stream_number);
    }

    if stream_type != Some(guids::AUDIO_MEDIA) {
        return;
    }
    let specific_len = decode::u32_le(obj, 64).unwrap_or(0) as usize;
    let Some(format) = decode::bytes(obj, STREAM_PROPERTIES_LEN as usize, specific_len) else {
        return;
    };
    if format.len() < 16 {
        return;
    }
    let mut cursor = ByteCursor::new(format);
    let (Some(tag), Some(channels), Some(rate), Some(avg), Some(align), Some(bits)) = (
        cursor.u16_le(),
        cursor.u16_le(),
        cursor.u32_le(),
        cursor.u32_le(),
        cursor.u16_le(),
        cursor.u16_le(),
    ) else {
        return;
    };
    debug!("ASF audio stream: codec 0x{:04X}, {} Hz", tag, rate);
    let name = codec_name(tag);
    record.insert("Audio:WMA:AudioCodecID", tag);
    record.insert("ASF:AudioCodecID", format!("{:04X}", tag));
    record.insert_aliased("Audio:WMA:AudioCodecName", &["ASF:AudioCodecName"], name);
    if channels > 0 {
        record.insert_aliased("Audio:WMA:AudioChannels", &["ASF:AudioChannels"], channels);
    }
    if rate > 0 {
        record.insert("Audio:WMA:AudioSampleRate", format!("{} Hz", rate));
        record.insert("ASF:AudioSampleRate", rate);
    }
    if avg > 0 {
        record.insert("Audio:WMA:AvgBytesPerSec", avg);
    }
    if align > 0 {
        record.insert("Audio:WMA:BlockAlign", align);
    }
    if bits > 0 {
        record.insert("Audio:WMA:BitsPerSample", bits);
    }
}

/// One Codec List entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecEntry {
    /// 1 video, 2 audio, 0xFFFF unknown
    pub kind: u16,
    /// Codec name
    pub name: String,
    /// Codec description
    pub description: String,
}

/// Decodes the entries of a Codec List object body
pub fn codec_entries(body: &[u8], max_entries: usize) -> Vec<CodecEntry> {
    let mut cursor = ByteCursor::new(body);
    let mut entries = Vec::new();
    // reserved GUID, then the count
    if cursor.skip(16).is_none() {
        return entries;
    }
    let count = cursor.u32_le().unwrap_or(0) as usize;
    for _ in 0..count.min(max_entries) {
        let Some(entry) = codec_entry(&mut cursor) else {
            break;
        };
        entries.push(entry);
    }
    entries
}

fn codec_entry(cursor: &mut ByteCursor<'_>) -> Option<CodecEntry> {
    let kind = cursor.u16_le()?;
    let name_chars = cursor.u16_le()? as usize;
    let name = text::utf16le(cursor.take(name_chars * 2)?);
    let desc_chars = cursor.u16_le()? as usize;
    let description = text::utf16le(cursor.take(desc_chars * 2)?);
    let info_len = cursor.u16_le()? as usize;
    cursor.skip(info_len)?;
    Some(CodecEntry {
        kind,
        name,
        description,
    })
}

fn codec_list(obj: &[u8], max_entries: usize, record: &mut MetadataRecord) {
    for entry in codec_entries(&obj[OBJECT_HEADER_LEN..], max_entries) {
        match entry.kind {
            2 => {
                if !entry.name.is_empty() {
                    record.insert_if_absent("Audio:WMA:AudioCodecName", entry.name.as_str());
                }
                if !entry.description.is_empty() {
                    record.insert_aliased(
                        "Audio:WMA:AudioCodecDescription",
                        &["ASF:AudioCodecDescription"],
                        entry.description.as_str(),
                    );
                }
            }
            1 if !entry.name.is_empty() => {
                record.insert("ASF:VideoCodecName", entry.name.as_str());
            }
            _ => {}
        }
    }
}

fn capped(value: String, limit: usize) -> String {
    text::truncate_chars(&value, limit).0
}

fn content_description(obj: &[u8], text_limit: usize, record: &mut MetadataRecord) {
    let mut cursor = ByteCursor::new(&obj[OBJECT_HEADER_LEN..]);
    let mut lengths = [0usize; 5];
    for len in &mut lengths {
        match cursor.u16_le() {
            Some(v) => *len = v as usize,
            None => return,
        }
    }
    for (len, tag) in lengths
        .into_iter()
        .zip(["Title", "Artist", "Copyright", "Description", "Rating"])
    {
        let Some(raw) = cursor.take(len) else {
            return;
        };
        let value = capped(text::utf16le(raw), text_limit);
        if value.is_empty() {
            continue;
        }
        if let Some(xmp) = xmp_alias(tag) {
            record.insert_if_absent(xmp, value.as_str());
        }
        record.insert(format!("Audio:WMA:{}", tag), value);
    }
}

/// Maps an Extended Content Description name to its tag.
///
/// Names compare case-insensitively and accept either path separator;
/// unknown names keep their casing with separators replaced by `_`.
fn descriptor_tag(name: &str) -> String {
    let upper = name.to_ascii_uppercase().replace('\\', "/");
    let known = match upper.as_str() {
        "WM/TITLE" | "TITLE" => "Title",
        "WM/AUTHOR" | "AUTHOR" | "WM/ARTIST" | "ARTIST" => "Artist",
        "WM/COPYRIGHT" | "COPYRIGHT" => "Copyright",
        "WM/DESCRIPTION" | "DESCRIPTION" => "Description",
        "WM/ALBUMTITLE" | "WM/ALBUM" | "ALBUM" => "Album",
        "WM/GENRE" | "GENRE" => "Genre",
        "WM/YEAR" | "YEAR" => "Year",
        "WM/TRACKNUMBER" | "WM/TRACK" | "TRACK" => "Track",
        "WM/ALBUMARTIST" => "AlbumArtist",
        "WM/COMPOSER" => "Composer",
        "WM/LYRICS" => "Lyrics",
        "WM/ENCODINGSETTINGS" => "EncodingSettings",
        _ => return name.replace(['/', '\\', ' '], "_"),
    };
    known.to_string()
}

/// Generic `XMP:*` key a WMA tag also feeds, first writer wins
fn xmp_alias(tag: &str) -> Option<&'static str> {
    match tag {
        "Title" => Some("XMP:Title"),
        "Artist" => Some("XMP:Artist"),
        "Album" => Some("XMP:Album"),
        _ => None,
    }
}

fn extended_content_description(
    obj: &[u8],
    max_entries: usize,
    text_limit: usize,
    record: &mut MetadataRecord,
) {
    let mut cursor = ByteCursor::new(&obj[OBJECT_HEADER_LEN..]);
    let count = cursor.u16_le().unwrap_or(0) as usize;
    for index in 0..count.min(max_entries) {
        let Some((name, kind, value)) = descriptor(&mut cursor) else {
            trace!("descriptor {} of {} runs past the object", index, count);
            break;
        };
        let tag = descriptor_tag(&name);
        if tag.is_empty() {
            continue;
        }
        let key = format!("Audio:WMA:{}", tag);
        match kind {
            0 => {
                let text = capped(text::utf16le(value), text_limit);
                if text.is_empty() {
                    continue;
                }
                if let Some(xmp) = xmp_alias(&tag) {
                    record.insert_if_absent(xmp, text.as_str());
                }
                if tag == "EncodingSettings" {
                    record.insert_aliased(&key, &["ASF:EncodingSettings"], text);
                } else {
                    record.insert(key, text);
                }
            }
            1 => record.insert(key, decode::hex_upper(value)),
            2 => {
                let set = value.iter().any(|&b| b != 0);
                record.insert(key, if set { "Yes" } else { "No" });
            }
            3 => {
                if let Some(v) = decode::u32_le(value, 0) {
                    record.insert(key, v);
                }
            }
            4 => {
                if let Some(v) = decode::u64_le(value, 0) {
                    record.insert(key, v);
                }
            }
            5 => {
                if let Some(v) = decode::u16_le(value, 0) {
                    record.insert(key, v);
                }
            }
            _ => {}
        }
    }
}

fn descriptor<'a>(cursor: &mut ByteCursor<'a>) -> Option<(String, u16, &'a [u8])> {
    let name_len = cursor.u16_le()? as usize;
    let name = text::utf16le(cursor.take(name_len)?);
    let kind = cursor.u16_le()?;
    let value_len = cursor.u16_le()? as usize;
    let value = cursor.take(value_len)?;
    Some((name, kind, value))
}

/// Walks an ASF file
pub(crate) fn walk(stream: &Stream<'_>) -> Walk {
    let data = stream.data;
    let config = stream.config;
    let mut walk = Walk::new();
    if !data.starts_with(&guids::HEADER.0) {
        return walk;
    }
    walk.record.insert("Audio:WMA:HasASF", true);

    for obj in objects(data, &guids::FILE_PROPERTIES, FILE_PROPERTIES_LEN) {
        file_properties(obj, &mut walk);
    }
    let record = &mut walk.record;
    for obj in objects(data, &guids::STREAM_PROPERTIES, STREAM_PROPERTIES_LEN) {
        stream_properties(obj, record);
    }
    let header_len = OBJECT_HEADER_LEN as u64;
    for obj in objects(data, &guids::CODEC_LIST, header_len + 20) {
        codec_list(obj, config.max_entries, record);
    }
    for obj in objects(data, &guids::CONTENT_DESCRIPTION, header_len + 10) {
        content_description(obj, config.text_limit, record);
    }
    for obj in objects(data, &guids::EXTENDED_CONTENT_DESCRIPTION, header_len + 2) {
        extended_content_description(obj, config.max_entries, config.text_limit, record);
    }
    walk
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ParserConfig;
    use pretty_assertions::assert_eq;

    fn utf16(s: &str) -> Vec<u8> {
        s.encode_utf16().flat_map(u16::to_le_bytes).collect()
    }

    fn object(guid: Guid, body: &[u8]) -> Vec<u8> {
        let mut out = guid.0.to_vec();
        out.extend_from_slice(&((body.len() + OBJECT_HEADER_LEN) as u64).to_le_bytes());
        out.extend_from_slice(body);
        out
    }

    fn header(children: &[Vec<u8>]) -> Vec<u8> {
        let mut body = (children.len() as u32).to_le_bytes().to_vec();
        body.extend_from_slice(&[1, 2]);
        for child in children {
            body.extend_from_slice(child);
        }
        object(guids::HEADER, &body)
    }

    fn file_properties_obj(play: u64, created: u64) -> Vec<u8> {
        let mut body = [0x11u8; 16].to_vec();
        body.extend_from_slice(&123_456u64.to_le_bytes());
        body.extend_from_slice(&created.to_le_bytes());
        body.extend_from_slice(&42u64.to_le_bytes());
        body.extend_from_slice(&play.to_le_bytes());
        body.extend_from_slice(&play.to_le_bytes());
        body.extend_from_slice(&3000u64.to_le_bytes());
        body.extend_from_slice(&2u32.to_le_bytes());
        body.extend_from_slice(&3200u32.to_le_bytes());
        body.extend_from_slice(&3200u32.to_le_bytes());
        body.extend_from_slice(&128_000u32.to_le_bytes());
        object(guids::FILE_PROPERTIES, &body)
    }

    fn audio_stream_obj() -> Vec<u8> {
        let mut format = 0x0161u16.to_le_bytes().to_vec();
        format.extend_from_slice(&2u16.to_le_bytes());
        format.extend_from_slice(&44100u32.to_le_bytes());
        format.extend_from_slice(&16000u32.to_le_bytes());
        format.extend_from_slice(&2973u16.to_le_bytes());
        format.extend_from_slice(&16u16.to_le_bytes());
        format.extend_from_slice(&0u16.to_le_bytes());

        let mut body = guids::AUDIO_MEDIA.0.to_vec();
        body.extend_from_slice(&guids::AUDIO_SPREAD.0);
        body.extend_from_slice(&0u64.to_le_bytes());
        body.extend_from_slice(&(format.len() as u32).to_le_bytes());
        body.extend_from_slice(&0u32.to_le_bytes());
        body.extend_from_slice(&1u16.to_le_bytes());
        body.extend_from_slice(&0u32.to_le_bytes());
        body.extend_from_slice(&format);
        object(guids::STREAM_PROPERTIES, &body)
    }

    fn content_description_obj(fields: [&str; 5]) -> Vec<u8> {
        let encoded: Vec<Vec<u8>> = fields.iter().map(|s| utf16(s)).collect();
        let mut body = Vec::new();
        for field in &encoded {
            body.extend_from_slice(&(field.len() as u16).to_le_bytes());
        }
        for field in &encoded {
            body.extend_from_slice(field);
        }
        object(guids::CONTENT_DESCRIPTION, &body)
    }

    fn string_descriptor(name: &str, value: &str) -> Vec<u8> {
        let name = utf16(name);
        let value = utf16(value);
        let mut out = (name.len() as u16).to_le_bytes().to_vec();
        out.extend_from_slice(&name);
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&(value.len() as u16).to_le_bytes());
        out.extend_from_slice(&value);
        out
    }

    fn typed_descriptor(name: &str, kind: u16, value: &[u8]) -> Vec<u8> {
        let name = utf16(name);
        let mut out = (name.len() as u16).to_le_bytes().to_vec();
        out.extend_from_slice(&name);
        out.extend_from_slice(&kind.to_le_bytes());
        out.extend_from_slice(&(value.len() as u16).to_le_bytes());
        out.extend_from_slice(value);
        out
    }

    fn extended_obj(descriptors: &[Vec<u8>]) -> Vec<u8> {
        let mut body = (descriptors.len() as u16).to_le_bytes().to_vec();
        for d in descriptors {
            body.extend_from_slice(d);
        }
        object(guids::EXTENDED_CONTENT_DESCRIPTION, &body)
    }

    fn run(data: &[u8]) -> Walk {
        let config = ParserConfig::default();
        walk(&Stream::new(data, data.len() as u64, &config))
    }

    #[test]
    fn test_guid_byte_order() {
        assert_eq!(
            decode::hex_lower(&guids::HEADER.0),
            "3026b2758e66cf11a6d900aa0062ce6c"
        );
        assert_eq!(
            decode::hex_lower(&guids::FILE_PROPERTIES.0),
            "a1dcab8c47a9cf118ee400c00c205365"
        );
        assert_eq!(
            decode::hex_lower(&guids::CODEC_LIST.0),
            "4052d1861d31d011a3a400a0c90348f6"
        );
        assert_eq!(
            guids::HEADER.to_string(),
            "75B22630-668E-11CF-A6D9-00AA0062CE6C"
        );
    }

    #[test]
    fn test_filetime() {
        // 2009-02-13 23:31:30 UTC
        let filetime = FILETIME_UNIX_EPOCH + 1_234_567_890 * TICKS_PER_SECOND;
        assert_eq!(filetime_to_string(filetime).as_deref(), Some("2009:02:13 23:31:30"));
        assert_eq!(filetime_to_string(5), None);
    }

    #[test]
    fn test_file_and_stream_properties() {
        let created = FILETIME_UNIX_EPOCH + 1_234_567_890 * TICKS_PER_SECOND;
        let data = header(&[file_properties_obj(1_810_000_000, created), audio_stream_obj()]);
        let walk = run(&data);
        let r = &walk.record;
        assert_eq!(r.get("Audio:WMA:HasASF").and_then(|v| v.as_bool()), Some(true));
        assert_eq!(r.get_str("ASF:FileID"), Some("11111111-1111-1111-1111-111111111111"));
        assert_eq!(r.get_int("ASF:FileLength"), Some(123_456));
        assert_eq!(r.get_str("ASF:CreationDate"), Some("2009:02:13 23:31:30"));
        assert_eq!(r.get_int("ASF:DataPackets"), Some(42));
        assert_eq!(r.get_str("Audio:WMA:SendDuration"), Some("0:03:01"));
        assert_eq!(r.get_str("Audio:WMA:Preroll"), Some("3000 ms"));
        assert_eq!(r.get_str("ASF:MaxBitrate"), Some("128 kbps"));
        assert_eq!(
            walk.duration,
            Some(DurationSource::Filetime {
                hundred_ns: 1_810_000_000
            })
        );

        assert_eq!(r.get_str("ASF:StreamType"), Some("Audio"));
        assert_eq!(r.get_str("ASF:ErrorCorrectionType"), Some("Audio Spread"));
        assert_eq!(r.get_str("ASF:TimeOffset"), Some("0.00 s"));
        assert_eq!(r.get_int("ASF:StreamNumber"), Some(1));
        assert_eq!(r.get_str("ASF:AudioCodecID"), Some("0161"));
        assert_eq!(r.get_str("Audio:WMA:AudioCodecName"), Some("Windows Media Audio V2"));
        assert_eq!(r.get_int("Audio:WMA:AudioChannels"), Some(2));
        assert_eq!(r.get_str("Audio:WMA:AudioSampleRate"), Some("44100 Hz"));
        assert_eq!(r.get_int("Audio:WMA:BitsPerSample"), Some(16));
    }

    #[test]
    fn test_codec_list() {
        let mut body = [0u8; 16].to_vec();
        body.extend_from_slice(&1u32.to_le_bytes());
        body.extend_from_slice(&2u16.to_le_bytes());
        let name = utf16("Windows Media Audio 9.2");
        body.extend_from_slice(&((name.len() / 2) as u16).to_le_bytes());
        body.extend_from_slice(&name);
        let desc = utf16(" 128 kbps, 44 kHz, stereo 1-pass CBR");
        body.extend_from_slice(&((desc.len() / 2) as u16).to_le_bytes());
        body.extend_from_slice(&desc);
        body.extend_from_slice(&2u16.to_le_bytes());
        body.extend_from_slice(&[0x61, 0x01]);

        let data = header(&[object(guids::CODEC_LIST, &body)]);
        let r = run(&data).record;
        assert_eq!(r.get_str("Audio:WMA:AudioCodecName"), Some("Windows Media Audio 9.2"));
        assert_eq!(
            r.get_str("ASF:AudioCodecDescription"),
            Some(" 128 kbps, 44 kHz, stereo 1-pass CBR")
        );
    }

    #[test]
    fn test_extended_overrides_content_description() {
        let data = header(&[
            content_description_obj(["Plain Title", "Plain Artist", "", "", ""]),
            extended_obj(&[
                string_descriptor("WM/AlbumTitle", "Record"),
                string_descriptor("WM/Author", "Extended Artist"),
                string_descriptor("WM/EncodingSettings", "Lavf58"),
                string_descriptor("Custom Field/Name", "x"),
                typed_descriptor("IsVBR", 2, &[1, 0, 0, 0]),
                typed_descriptor("WM/TrackNumber", 3, &7u32.to_le_bytes()),
                typed_descriptor("WM/Picture", 1, &[0xDE, 0xAD]),
            ]),
        ]);
        let r = run(&data).record;
        assert_eq!(r.get_str("Audio:WMA:Title"), Some("Plain Title"));
        assert_eq!(r.get_str("XMP:Title"), Some("Plain Title"));
        assert_eq!(r.get_str("Audio:WMA:Artist"), Some("Extended Artist"));
        assert_eq!(r.get_str("Audio:WMA:Album"), Some("Record"));
        assert_eq!(r.get_str("ASF:EncodingSettings"), Some("Lavf58"));
        assert_eq!(r.get_str("Audio:WMA:Custom_Field_Name"), Some("x"));
        assert_eq!(r.get_str("Audio:WMA:IsVBR"), Some("Yes"));
        assert_eq!(r.get_int("Audio:WMA:Track"), Some(7));
        assert_eq!(r.get_str("Audio:WMA:WM_Picture"), Some("DEAD"));
    }

    #[test]
    fn test_descriptor_names_ignore_case() {
        let data = header(&[extended_obj(&[
            string_descriptor("WM/ARTIST", "Upper Artist"),
            string_descriptor("ALBUM", "Upper Album"),
            string_descriptor("wm\\title", "Lower Title"),
            string_descriptor("Wm/Genre", "Ambient"),
            string_descriptor("My Tag", "kept"),
        ])]);
        let r = run(&data).record;
        assert_eq!(r.get_str("Audio:WMA:Artist"), Some("Upper Artist"));
        assert_eq!(r.get_str("Audio:WMA:Album"), Some("Upper Album"));
        assert_eq!(r.get_str("Audio:WMA:Title"), Some("Lower Title"));
        assert_eq!(r.get_str("Audio:WMA:Genre"), Some("Ambient"));
        assert_eq!(r.get_str("Audio:WMA:My_Tag"), Some("kept"));
        assert_eq!(r.get_str("XMP:Artist"), Some("Upper Artist"));
        assert_eq!(r.get_str("XMP:Album"), Some("Upper Album"));
        assert_eq!(r.get_str("XMP:Title"), Some("Lower Title"));
        assert!(!r.contains_key("Audio:WMA:WM_ARTIST"));
        assert!(!r.contains_key("Audio:WMA:ALBUM"));
    }

    #[test]
    fn test_xmp_aliases_first_writer_wins() {
        let data = header(&[
            content_description_obj(["Plain Title", "Plain Artist", "", "", ""]),
            extended_obj(&[
                string_descriptor("Author", "Extended Artist"),
                string_descriptor("WM/AlbumTitle", "Record"),
            ]),
        ]);
        let r = run(&data).record;
        assert_eq!(r.get_str("XMP:Artist"), Some("Plain Artist"));
        assert_eq!(r.get_str("Audio:WMA:Artist"), Some("Extended Artist"));
        assert_eq!(r.get_str("XMP:Album"), Some("Record"));
    }

    #[test]
    fn test_broken_header_size_still_scans_children() {
        let mut data = header(&[content_description_obj(["T", "", "", "", ""])]);
        data[16..24].copy_from_slice(&u64::MAX.to_le_bytes());
        let r = run(&data).record;
        assert_eq!(r.get_str("Audio:WMA:Title"), Some("T"));
    }

    #[test]
    fn test_oversized_object_is_skipped() {
        let mut obj = file_properties_obj(10_000_000, 0);
        obj[16..24].copy_from_slice(&10_000u64.to_le_bytes());
        let data = header(&[obj]);
        let walk = run(&data);
        assert!(walk.duration.is_none());
        assert!(!walk.record.contains_key("ASF:FileID"));
    }

    #[test]
    fn test_not_asf() {
        assert!(run(b"RIFF\0\0\0\0WAVE").record.is_empty());
    }
}
