//! Lyrics3 blocks at the tail of MP3 files.
//!
//! Lyrics are optional; nothing in here reports failure. A block that does
//! not frame up simply produces no keys.

use crate::decode::{self, text};
use crate::record::MetadataRecord;

const BEGIN: &[u8] = b"LYRICSBEGIN";
const V1_END: &[u8] = b"LYRICSEND";
const V2_END: &[u8] = b"LYRICS200";
const V1_MAX_LEN: usize = 5100;
const MAX_FIELDS: usize = 50;

/// Scans `data` for a Lyrics3 v2 block, falling back to v1
pub fn scan(data: &[u8]) -> MetadataRecord {
    let mut record = MetadataRecord::new();
    if data.len() < 20 {
        return record;
    }

    if let Some(end) = decode::rfind(data, V2_END) {
        if let Some(fields) = v2_fields(data, end) {
            record.insert("Lyrics3:Version", "2.00");
            record.insert("Lyrics3:HasLyrics3", true);
            match fields {
                Fields::Sized(body) => sized_fields(body, &mut record),
                Fields::Assigned(body) => assigned_fields(body, &mut record),
            }
            return record;
        }
    }

    if let Some(end) = decode::rfind(data, V1_END) {
        let window_start = end.saturating_sub(V1_MAX_LEN + BEGIN.len());
        if let Some(begin) = decode::rfind(&data[window_start..end], BEGIN) {
            let body = &data[window_start + begin + BEGIN.len()..end];
            record.insert("Lyrics3:Version", "1.00");
            record.insert("Lyrics3:HasLyrics3", true);
            let lyrics = text::latin1(body);
            let lyrics = lyrics.trim_end_matches(['\0', ' ']).trim_end();
            if !lyrics.is_empty() {
                record.insert("Lyrics3:LyricsLength", lyrics.chars().count());
                record.insert("Lyrics3:Lyrics", lyrics);
            }
        }
    }
    record
}

enum Fields<'a> {
    /// `LYRICSBEGIN` + `IDn nnnn` fields + 6-digit size + `LYRICS200`
    Sized(&'a [u8]),
    /// `LYRICS200` + 9-digit size + `XXX=value` lines + 9-digit size + `LYRICS200`
    Assigned(&'a [u8]),
}

fn v2_fields(data: &[u8], end: usize) -> Option<Fields<'_>> {
    let sized = end
        .checked_sub(6)
        .and_then(|at| ascii_number(&data[at..end]))
        .filter(|&size| size >= BEGIN.len());
    if let Some(size) = sized {
        let start = (end - 6).checked_sub(size);
        if let Some(start) = start.filter(|&s| data[s..].starts_with(BEGIN)) {
            return Some(Fields::Sized(&data[start + BEGIN.len()..end - 6]));
        }
    }

    let size = ascii_number(data.get(end.checked_sub(9)?..end)?)?;
    let start = (end + 9).checked_sub(size.checked_add(27)?)?;
    let body = data.get(start + V2_END.len()..end - 9)?;
    data[start..].starts_with(V2_END).then_some(Fields::Assigned(body))
}

fn ascii_number(digits: &[u8]) -> Option<usize> {
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}

fn tag_name(id: &str) -> &str {
    match id {
        "IND" => "Indicator",
        "INF" => "Info",
        "AUT" => "Author",
        "EAL" => "Album",
        "EAR" => "Artist",
        "ETT" => "Title",
        "LYR" => "Lyrics",
        "IMG" => "Image",
        other => other,
    }
}

fn sized_fields(body: &[u8], record: &mut MetadataRecord) {
    let mut pos = 0;
    for _ in 0..MAX_FIELDS {
        let Some(id) = decode::bytes(body, pos, 3) else {
            break;
        };
        let Some(len) = decode::bytes(body, pos + 3, 5).and_then(ascii_number) else {
            break;
        };
        let Some(value) = decode::bytes(body, pos + 8, len) else {
            break;
        };
        let id = text::latin1(id);
        record.insert(format!("Lyrics3:{}", tag_name(&id)), text::latin1(value));
        pos += 8 + len;
    }
}

fn assigned_fields(body: &[u8], record: &mut MetadataRecord) {
    let mut pos = 0;
    let mut count = 0;
    while pos < body.len() && count < MAX_FIELDS {
        let Some(eq) = decode::find_from(body, b"=", pos) else {
            break;
        };
        if eq < pos + 3 {
            pos = eq + 1;
            continue;
        }
        let id = text::latin1(&body[eq - 3..eq]);
        let value_start = eq + 1;
        let value_end = body[value_start..]
            .iter()
            .position(|b| matches!(b, b'\n' | b'\r' | 0))
            .map_or(body.len(), |i| value_start + i);
        record.insert(
            format!("Lyrics3:{}", tag_name(&id)),
            text::latin1(&body[value_start..value_end]),
        );
        count += 1;
        pos = value_end + 1;
    }
}
