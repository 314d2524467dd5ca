//! Vorbis comment blocks, shared by FLAC, Ogg Vorbis and Opus.
//!
//! Layout: little-endian vendor length, vendor string, little-endian entry
//! count, then that many length-prefixed `KEY=value` strings. Keys compare
//! case-insensitively; values are kept exactly as written.

use crate::decode::ByteCursor;
use crate::record::MetadataRecord;
use tracing::trace;

/// A decoded comment block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VorbisComments {
    /// Encoder vendor string
    pub vendor: String,
    /// Entries in block order, key as written
    pub comments: Vec<(String, String)>,
}

impl VorbisComments {
    /// Decodes a block, reading at most `max_comments` entries.
    ///
    /// Returns `None` if not even the vendor string fits. Entries that run
    /// past the end or lack a `=` end or skip decoding respectively.
    pub fn parse(block: &[u8], max_comments: usize) -> Option<Self> {
        let mut cursor = ByteCursor::new(block);
        let vendor_len = cursor.u32_le()? as usize;
        let vendor = String::from_utf8_lossy(cursor.take(vendor_len)?).into_owned();

        let mut comments = Vec::new();
        let count = cursor.u32_le().unwrap_or(0) as usize;
        for index in 0..count.min(max_comments) {
            let Some(entry) = cursor.u32_le().and_then(|len| cursor.take(len as usize)) else {
                trace!("comment {} of {} runs past the block", index, count);
                break;
            };
            let entry = String::from_utf8_lossy(entry);
            if let Some((key, value)) = entry.split_once('=') {
                comments.push((key.to_string(), value.to_string()));
            }
        }
        Some(Self { vendor, comments })
    }

    /// First value whose key matches `key` case-insensitively
    pub fn get(&self, key: &str) -> Option<&str> {
        self.comments
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// FLAC presentation: a fixed set of normalized `Audio:FLAC:*` keys
    pub fn write_flac(&self, record: &mut MetadataRecord) {
        record.insert("Audio:FLAC:HasVorbisComments", true);
        if !self.vendor.is_empty() {
            record.insert("Vorbis:Vendor", self.vendor.as_str());
        }
        for (key, value) in &self.comments {
            let target = match key.to_ascii_uppercase().as_str() {
                "TITLE" => {
                    record.insert_if_absent("XMP:Title", value.as_str());
                    "Audio:FLAC:Title"
                }
                "ARTIST" => "Audio:FLAC:Artist",
                "ALBUM" => "Audio:FLAC:Album",
                "DATE" | "YEAR" => "Audio:FLAC:Date",
                "COMMENT" | "DESCRIPTION" => "Audio:FLAC:Comment",
                "ENCODER" => "Vorbis:Encoder",
                _ => continue,
            };
            record.insert(target, value.as_str());
        }
    }

    /// Ogg presentation: every entry under `group` with a title-cased key
    pub fn write_generic(&self, group: &str, record: &mut MetadataRecord) {
        if !self.vendor.is_empty() {
            record.insert(format!("{}:Vendor", group), self.vendor.as_str());
            record.insert("Vorbis:Vendor", self.vendor.as_str());
        }
        for (key, value) in &self.comments {
            let upper = key.to_ascii_uppercase();
            let tag = match upper.as_str() {
                "YEAR" => "Date".to_string(),
                _ => title_case(key),
            };
            if tag.is_empty() {
                continue;
            }
            match upper.as_str() {
                "TITLE" => {
                    record.insert_if_absent("XMP:Title", value.as_str());
                }
                "ENCODER" => record.insert("Vorbis:Encoder", value.as_str()),
                _ => {}
            }
            record.insert(format!("{}:{}", group, tag), value.as_str());
        }
    }
}

/// `REPLAYGAIN_TRACK_GAIN` -> `Replaygain_Track_Gain`
fn title_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut at_word_start = true;
    for c in key.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}
