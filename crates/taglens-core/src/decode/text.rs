//! Text decoding for the encodings audio containers use.

/// ID3v2 text encoding marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// ISO-8859-1
    Latin1,
    /// UTF-16 with byte order mark
    Utf16Bom,
    /// UTF-16 big-endian without BOM
    Utf16Be,
    /// UTF-8
    Utf8,
}

impl TryFrom<u8> for TextEncoding {
    type Error = u8;

    fn try_from(marker: u8) -> std::result::Result<Self, u8> {
        match marker {
            0 => Ok(Self::Latin1),
            1 => Ok(Self::Utf16Bom),
            2 => Ok(Self::Utf16Be),
            3 => Ok(Self::Utf8),
            other => Err(other),
        }
    }
}

impl TextEncoding {
    /// Decodes `data` in this encoding, dropping trailing NULs
    pub fn decode(self, data: &[u8]) -> String {
        let text = match self {
            Self::Latin1 => latin1(data),
            Self::Utf8 => String::from_utf8_lossy(data).into_owned(),
            Self::Utf16Be => utf16(data, false),
            Self::Utf16Bom => match data {
                [0xFE, 0xFF, rest @ ..] => utf16(rest, false),
                [0xFF, 0xFE, rest @ ..] => utf16(rest, true),
                _ => utf16(data, true),
            },
        };
        trim_nuls(&text).to_string()
    }
}

/// Decodes an ID3v2 text frame payload: encoding marker byte, then text.
///
/// Returns `None` for an unknown marker. NUL separators between multiple
/// values (ID3v2.4) are rendered as `/`.
pub fn encoded_text(payload: &[u8]) -> Option<String> {
    let (&marker, rest) = payload.split_first()?;
    let encoding = TextEncoding::try_from(marker).ok()?;
    Some(encoding.decode(rest).replace('\0', "/"))
}

/// ISO-8859-1: every byte is its own code point
pub fn latin1(data: &[u8]) -> String {
    data.iter().map(|&b| char::from(b)).collect()
}

/// UTF-16 in the given byte order; a trailing odd byte is ignored
pub fn utf16(data: &[u8], little_endian: bool) -> String {
    let units: Vec<u16> = data
        .chunks_exact(2)
        .map(|pair| {
            if little_endian {
                u16::from_le_bytes([pair[0], pair[1]])
            } else {
                u16::from_be_bytes([pair[0], pair[1]])
            }
        })
        .collect();
    String::from_utf16_lossy(&units)
}

/// UTF-16LE with trailing NULs removed (ASF strings)
pub fn utf16le(data: &[u8]) -> String {
    trim_nuls(&utf16(data, true)).to_string()
}

/// UTF-8 if valid, otherwise ISO-8859-1; trailing NULs removed.
///
/// RIFF INFO and Lyrics3 text carry no encoding marker and show up in both.
pub fn lenient(data: &[u8]) -> String {
    let text = match std::str::from_utf8(data) {
        Ok(s) => s.to_string(),
        Err(_) => latin1(data),
    };
    trim_nuls(&text).to_string()
}

/// Strips trailing NUL characters
pub fn trim_nuls(text: &str) -> &str {
    text.trim_end_matches('\0')
}

/// Caps `text` at `limit` characters, appending `"..."` when cut.
///
/// Returns the text and whether it was truncated.
pub fn truncate_chars(text: &str, limit: usize) -> (String, bool) {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => (format!("{}...", &text[..cut]), true),
        None => (text.to_string(), false),
    }
}
