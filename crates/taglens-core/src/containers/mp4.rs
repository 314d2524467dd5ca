//! MPEG-4 audio (M4A) boxes: `ftyp`, `moov/mvhd` and the iTunes `ilst`.

use super::riff::FourCC;
use super::{Stream, Walk};
use crate::composite::DurationSource;
use crate::decode::{self, text};
use crate::record::{MetadataRecord, Value};
use tracing::{debug, trace};

/// Brands that mark an audio-only MPEG-4 file
pub const AUDIO_BRANDS: [&[u8; 4]; 5] = [b"M4A ", b"M4B ", b"M4P ", b"F4A ", b"F4B "];

/// One box: type and payload (header stripped)
#[derive(Debug, Clone, Copy)]
pub struct Mp4Box<'a> {
    /// Box type
    pub kind: FourCC,
    /// Offset of the box header
    pub offset: usize,
    /// Contents after the header
    pub payload: &'a [u8],
}

/// Iterator over sibling boxes
#[derive(Debug, Clone)]
pub struct Boxes<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Boxes<'a> {
    /// Iterates over the boxes laid out back to back in `data`
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }
}

impl<'a> Iterator for Boxes<'a> {
    type Item = Mp4Box<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.pos;
        let size = decode::u32_be(self.data, offset)?;
        let kind = FourCC(decode::array(self.data, offset + 4)?);
        let (header_len, total) = match size {
            0 => (8, self.data.len() - offset),
            1 => {
                let large = decode::u64_be(self.data, offset + 8)?;
                (16, usize::try_from(large).ok()?)
            }
            n => (8, n as usize),
        };
        if total < header_len {
            trace!("box {} at {} declares {} bytes", kind, offset, total);
            self.pos = self.data.len();
            return None;
        }
        let end = offset.checked_add(total)?.min(self.data.len());
        self.pos = end;
        Some(Mp4Box {
            kind,
            offset,
            payload: self.data.get(offset + header_len..end)?,
        })
    }
}

fn child<'a>(data: &'a [u8], kind: &[u8; 4]) -> Option<&'a [u8]> {
    Boxes::new(data)
        .find(|b| &b.kind.0 == kind)
        .map(|b| b.payload)
}

/// True if the file opens with an `ftyp` naming an audio brand
pub fn has_audio_brand(data: &[u8]) -> bool {
    data.get(4..8) == Some(b"ftyp".as_slice())
        && decode::array::<4>(data, 8).is_some_and(|brand| AUDIO_BRANDS.contains(&&brand))
}

fn brand_text(brand: &[u8]) -> String {
    text::latin1(brand)
        .trim_end_matches([' ', '\0'])
        .to_string()
}

fn ftyp(payload: &[u8], record: &mut MetadataRecord) {
    let Some(major) = decode::bytes(payload, 0, 4) else {
        return;
    };
    record.insert_aliased(
        "Audio:M4A:MajorBrand",
        &["QuickTime:MajorBrand"],
        brand_text(major),
    );
    if let Some(minor) = decode::u32_be(payload, 4) {
        record.insert_aliased("Audio:M4A:MinorVersion", &["QuickTime:MinorVersion"], minor);
    }
    let brands: Vec<String> = payload
        .get(8..)
        .unwrap_or_default()
        .chunks_exact(4)
        .map(brand_text)
        .filter(|brand| !brand.is_empty())
        .collect();
    if !brands.is_empty() {
        record.insert_aliased(
            "Audio:M4A:CompatibleBrands",
            &["QuickTime:CompatibleBrands"],
            Value::List(brands),
        );
    }
}

/// `mvhd`: returns `(time_scale, duration)`
fn mvhd(payload: &[u8]) -> Option<(u32, u64)> {
    match decode::u8_at(payload, 0)? {
        1 => Some((decode::u32_be(payload, 20)?, decode::u64_be(payload, 24)?)),
        _ => Some((
            decode::u32_be(payload, 12)?,
            u64::from(decode::u32_be(payload, 16)?),
        )),
    }
}

fn ilst_tag(kind: &[u8; 4]) -> Option<&'static str> {
    Some(match kind {
        b"\xA9nam" => "Title",
        b"\xA9ART" => "Artist",
        b"\xA9alb" => "Album",
        b"\xA9day" => "Year",
        b"\xA9too" => "Encoder",
        b"aART" => "AlbumArtist",
        b"\xA9gen" => "Genre",
        b"\xA9wrt" => "Composer",
        _ => return None,
    })
}

fn ilst(payload: &[u8], max_entries: usize, record: &mut MetadataRecord) {
    for item in Boxes::new(payload).take(max_entries) {
        let Some(tag) = ilst_tag(&item.kind.0) else {
            continue;
        };
        // data box: type indicator, locale, value
        let Some(value) = child(item.payload, b"data").and_then(|data| data.get(8..)) else {
            continue;
        };
        let value = text::lenient(value);
        if value.is_empty() {
            continue;
        }
        if tag == "Title" {
            record.insert_if_absent("XMP:Title", value.as_str());
        }
        record.insert_aliased(
            &format!("Audio:M4A:{}", tag),
            &[format!("ItemList:{}", tag).as_str()],
            value,
        );
    }
}

/// `meta` is a full box in ISO files but a plain container in QuickTime
fn meta_children(payload: &[u8]) -> &[u8] {
    if payload.get(4..8) == Some(b"hdlr".as_slice()) {
        payload
    } else {
        payload.get(4..).unwrap_or_default()
    }
}

/// Walks an M4A file
pub(crate) fn walk(stream: &Stream<'_>) -> Walk {
    let data = stream.data;
    let mut walk = Walk::new();
    if data.get(4..8) != Some(b"ftyp".as_slice()) {
        return walk;
    }
    let record = &mut walk.record;

    for top in Boxes::new(data) {
        match &top.kind.0 {
            b"ftyp" => ftyp(top.payload, record),
            b"moov" => {
                debug!("moov at {}", top.offset);
                if let Some((scale, duration)) = child(top.payload, b"mvhd").and_then(mvhd) {
                    record.insert_aliased("Audio:M4A:TimeScale", &["QuickTime:TimeScale"], scale);
                    if scale > 0 && duration > 0 {
                        walk.duration = Some(DurationSource::Samples {
                            total_samples: duration,
                            sample_rate: scale,
                        });
                    }
                }
                let items = child(top.payload, b"udta")
                    .and_then(|udta| child(udta, b"meta"))
                    .and_then(|meta| child(meta_children(meta), b"ilst"));
                if let Some(items) = items {
                    ilst(items, stream.config.max_entries, record);
                }
            }
            _ => {}
        }
    }
    walk
}
