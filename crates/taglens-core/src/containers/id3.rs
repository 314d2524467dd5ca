//! ID3v2 tag and frame walker, plus the trailing ID3v1 block.
//!
//! The ID3v2 header is 10 bytes: `ID3`, major and minor version, flags and a
//! synchsafe size that excludes the header. Frames follow as 4-byte id,
//! 4-byte big-endian size, 2 flag bytes and the payload. Walking stops at
//! padding (an all-zero id), at an id that is not uppercase alphanumeric,
//! or when a frame would run past the tag.

use crate::decode::{self, text};
use crate::record::MetadataRecord;
use tracing::trace;

/// Decoded ID3v2 tag header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagHeader {
    /// Major version (3 for ID3v2.3)
    pub major: u8,
    /// Revision
    pub minor: u8,
    /// Header flags
    pub flags: u8,
    /// Tag size excluding the 10-byte header
    pub size: u32,
}

impl TagHeader {
    /// Size of the fixed header
    pub const LEN: usize = 10;

    /// Parses the header at the start of `data`
    pub fn parse(data: &[u8]) -> Option<Self> {
        if !data.starts_with(b"ID3") {
            return None;
        }
        Some(Self {
            major: decode::u8_at(data, 3)?,
            minor: decode::u8_at(data, 4)?,
            flags: decode::u8_at(data, 5)?,
            size: decode::synchsafe_at(data, 6)?,
        })
    }

    /// Header plus body
    pub fn total_len(&self) -> u64 {
        Self::LEN as u64 + u64::from(self.size)
    }

    fn has_extended_header(&self) -> bool {
        self.flags & 0x40 != 0
    }
}

/// A borrowed frame view
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    /// Frame id, e.g. `TIT2`
    pub id: [u8; 4],
    /// Offset of the frame header within the tag
    pub offset: usize,
    /// Payload, guaranteed in bounds
    pub payload: &'a [u8],
}

/// Iterator over the frames of one tag
#[derive(Debug, Clone)]
pub struct Frames<'a> {
    tag: &'a [u8],
    pos: usize,
    remaining: usize,
}

impl<'a> Frames<'a> {
    /// Walks the frames in `tag` (header included), at most `max_frames`
    pub fn new(tag: &'a [u8], header: &TagHeader, max_frames: usize) -> Self {
        let mut pos = TagHeader::LEN;
        if header.has_extended_header() {
            let ext = match header.major {
                4 => decode::synchsafe_at(tag, pos).map(|n| n as usize),
                _ => decode::u32_be(tag, pos).map(|n| n as usize + 4),
            };
            pos = pos.saturating_add(ext.unwrap_or(usize::MAX));
        }
        let end = tag.len().min(TagHeader::LEN + header.size as usize);
        Self {
            tag: &tag[..end],
            pos,
            remaining: max_frames,
        }
    }
}

impl<'a> Iterator for Frames<'a> {
    type Item = Frame<'a>;

    fn next(&mut self) -> Option<Frame<'a>> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let offset = self.pos;
        let id = decode::array::<4>(self.tag, offset)?;
        if id == [0; 4] || !id.iter().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()) {
            return None;
        }
        let size = decode::u32_be(self.tag, offset + 4)? as usize;
        let payload = decode::bytes(self.tag, offset + 10, size)?;
        self.pos = offset + 10 + size;
        Some(Frame { id, offset, payload })
    }
}

/// Frames mapped to named fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameField {
    /// `TIT2`
    Title,
    /// `TPE1`
    Artist,
    /// `TALB`
    Album,
    /// `TYER` / `TDRC`
    Year,
    /// `TENC`
    Encoder,
    /// `TSSE`
    EncoderSettings,
    /// `TCON`
    Genre,
    /// `TRCK`
    Track,
    /// `COMM`
    Comment,
}

impl FrameField {
    /// Maps a frame id to a field
    pub fn from_id(id: &[u8; 4]) -> Option<Self> {
        Some(match id {
            b"TIT2" => Self::Title,
            b"TPE1" => Self::Artist,
            b"TALB" => Self::Album,
            b"TYER" | b"TDRC" => Self::Year,
            b"TENC" => Self::Encoder,
            b"TSSE" => Self::EncoderSettings,
            b"TCON" => Self::Genre,
            b"TRCK" => Self::Track,
            b"COMM" => Self::Comment,
            _ => return None,
        })
    }

    /// Tag name used in output keys
    pub fn tag_name(self) -> &'static str {
        match self {
            Self::Title => "Title",
            Self::Artist => "Artist",
            Self::Album => "Album",
            Self::Year => "Year",
            Self::Encoder => "Encoder",
            Self::EncoderSettings => "EncoderSettings",
            Self::Genre => "Genre",
            Self::Track => "Track",
            Self::Comment => "Comment",
        }
    }
}

/// A parsed ID3v2 tag: header plus the recognized text fields in tag order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Id3Tag {
    /// Tag header
    pub header: TagHeader,
    /// Decoded fields; later frames of the same kind follow earlier ones
    pub fields: Vec<(FrameField, String)>,
}

impl Id3Tag {
    /// Parses the tag at the start of `data`
    pub fn parse(data: &[u8], max_frames: usize) -> Option<Self> {
        let header = TagHeader::parse(data)?;
        let mut fields = Vec::new();
        for frame in Frames::new(data, &header, max_frames) {
            let Some(field) = FrameField::from_id(&frame.id) else {
                continue;
            };
            let value = match field {
                FrameField::Comment => comment_text(frame.payload),
                _ => text::encoded_text(frame.payload),
            };
            match value {
                Some(value) if !value.trim().is_empty() => {
                    fields.push((field, value.trim().to_string()));
                }
                _ => trace!(
                    "skipping undecodable frame {} at {}",
                    String::from_utf8_lossy(&frame.id),
                    frame.offset
                ),
            }
        }
        Some(Self { header, fields })
    }

    /// Last value decoded for `field`
    pub fn get(&self, field: FrameField) -> Option<&str> {
        self.fields
            .iter()
            .rev()
            .find(|(f, _)| *f == field)
            .map(|(_, v)| v.as_str())
    }
}

/// `COMM`: encoding, 3-byte language, NUL-terminated description, text
fn comment_text(payload: &[u8]) -> Option<String> {
    let (&marker, rest) = payload.split_first()?;
    let encoding = text::TextEncoding::try_from(marker).ok()?;
    let body = rest.get(3..)?;
    let wide = matches!(
        encoding,
        text::TextEncoding::Utf16Bom | text::TextEncoding::Utf16Be
    );
    let split = if wide {
        body.chunks_exact(2)
            .position(|pair| pair == [0, 0])
            .map(|i| i * 2 + 2)
    } else {
        body.iter().position(|&b| b == 0).map(|i| i + 1)
    };
    let text_bytes = match split {
        Some(at) => &body[at..],
        None => body,
    };
    // UTF-16 text after the description carries its own BOM
    Some(encoding.decode(text_bytes))
}

/// ID3v1 block in the last 128 bytes
pub(crate) fn id3v1(data: &[u8]) -> MetadataRecord {
    let mut record = MetadataRecord::new();
    let Some(start) = data.len().checked_sub(128) else {
        return record;
    };
    let block = &data[start..];
    if !block.starts_with(b"TAG") {
        return record;
    }

    let field = |from: usize, len: usize| {
        let raw = text::latin1(&block[from..from + len]);
        let value = raw.trim_end_matches(['\0', ' ']).to_string();
        (!value.is_empty()).then_some(value)
    };
    for (tag, from, len) in [("Title", 3, 30), ("Artist", 33, 30), ("Album", 63, 30), ("Year", 93, 4)] {
        if let Some(value) = field(from, len) {
            record.insert(format!("ID3v1:{}", tag), value);
        }
    }
    // v1.1 keeps a track number in the last two comment bytes
    if block[125] == 0 && block[126] != 0 {
        if let Some(comment) = field(97, 28) {
            record.insert("ID3v1:Comment", comment);
        }
        record.insert("ID3v1:Track", block[126]);
    } else if let Some(comment) = field(97, 30) {
        record.insert("ID3v1:Comment", comment);
    }
    if block[127] != 0xFF {
        record.insert("ID3v1:Genre", block[127]);
    }
    record
}
