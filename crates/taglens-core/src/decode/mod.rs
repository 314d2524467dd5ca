//! Stateless field decoding primitives.
//!
//! Every accessor takes the whole buffer plus an absolute offset and returns
//! `None` when the requested span runs past the end. Walkers chain these with
//! `?` inside small `Option`-returning helpers, so a field that cannot be
//! decoded is simply left out and the walk moves on.
//!
//! ## Layout
//!
//! - fixed-width integers in either byte order (`u16_le`, `u32_be`, ...)
//! - ID3v2 synchsafe integers
//! - sub-byte fields via [`BitField`] and [`BitCursor`]
//! - encoding-tagged and fixed-encoding text via the [`text`] module
//! - byte-pattern search used by the signature-scanning walkers

mod bits;
pub mod text;

pub use bits::{BitCursor, BitField, BitOrder};

/// Reads `N` bytes at `offset` as an array
pub fn array<const N: usize>(data: &[u8], offset: usize) -> Option<[u8; N]> {
    data.get(offset..offset.checked_add(N)?)?.try_into().ok()
}

/// Borrows `len` bytes at `offset`
pub fn bytes(data: &[u8], offset: usize, len: usize) -> Option<&[u8]> {
    data.get(offset..offset.checked_add(len)?)
}

/// Reads one byte
pub fn u8_at(data: &[u8], offset: usize) -> Option<u8> {
    data.get(offset).copied()
}

/// Reads a little-endian u16
pub fn u16_le(data: &[u8], offset: usize) -> Option<u16> {
    array(data, offset).map(u16::from_le_bytes)
}

/// Reads a big-endian u16
pub fn u16_be(data: &[u8], offset: usize) -> Option<u16> {
    array(data, offset).map(u16::from_be_bytes)
}

/// Reads a little-endian i16
pub fn i16_le(data: &[u8], offset: usize) -> Option<i16> {
    array(data, offset).map(i16::from_le_bytes)
}

/// Reads a big-endian 24-bit unsigned integer
pub fn u24_be(data: &[u8], offset: usize) -> Option<u32> {
    let [a, b, c] = array::<3>(data, offset)?;
    Some(u32::from(a) << 16 | u32::from(b) << 8 | u32::from(c))
}

/// Reads a little-endian u32
pub fn u32_le(data: &[u8], offset: usize) -> Option<u32> {
    array(data, offset).map(u32::from_le_bytes)
}

/// Reads a big-endian u32
pub fn u32_be(data: &[u8], offset: usize) -> Option<u32> {
    array(data, offset).map(u32::from_be_bytes)
}

/// Reads a little-endian u64
pub fn u64_le(data: &[u8], offset: usize) -> Option<u64> {
    array(data, offset).map(u64::from_le_bytes)
}

/// Reads a big-endian u64
pub fn u64_be(data: &[u8], offset: usize) -> Option<u64> {
    array(data, offset).map(u64::from_be_bytes)
}

/// Reads a little-endian IEEE-754 single
pub fn f32_le(data: &[u8], offset: usize) -> Option<f32> {
    array(data, offset).map(f32::from_le_bytes)
}

/// Decodes a 4-byte synchsafe integer (7 significant bits per byte)
pub fn synchsafe(raw: [u8; 4]) -> u32 {
    raw.iter()
        .fold(0u32, |acc, &b| (acc << 7) | u32::from(b & 0x7F))
}

/// Reads a synchsafe integer at `offset`
pub fn synchsafe_at(data: &[u8], offset: usize) -> Option<u32> {
    array(data, offset).map(synchsafe)
}

/// Encodes the low 28 bits of `value` as a synchsafe integer
pub fn encode_synchsafe(value: u32) -> [u8; 4] {
    [
        ((value >> 21) & 0x7F) as u8,
        ((value >> 14) & 0x7F) as u8,
        ((value >> 7) & 0x7F) as u8,
        (value & 0x7F) as u8,
    ]
}

/// Finds the first occurrence of `needle` in `haystack`
pub fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Finds the first occurrence of `needle` at or after `from`
pub fn find_from(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    find(haystack.get(from..)?, needle).map(|pos| pos + from)
}

/// Finds the last occurrence of `needle` in `haystack`
pub fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .rposition(|window| window == needle)
}

/// Iterates over every (possibly overlapping) occurrence of `needle`
pub fn find_all<'a>(haystack: &'a [u8], needle: &'a [u8]) -> impl Iterator<Item = usize> + 'a {
    let mut from = 0;
    std::iter::from_fn(move || {
        let pos = find_from(haystack, needle, from)?;
        from = pos + 1;
        Some(pos)
    })
}

/// Lowercase hex rendering
pub fn hex_lower(data: &[u8]) -> String {
    data.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Uppercase hex rendering
pub fn hex_upper(data: &[u8]) -> String {
    data.iter().map(|b| format!("{:02X}", b)).collect()
}

/// Sequential reader over a byte slice.
///
/// Used by the length-prefixed list decoders (Vorbis comments, ASF
/// descriptors). Reads that would overrun return `None` without moving.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    /// Creates a cursor at the start of `data`
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current offset
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to read
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Takes the next `len` bytes
    pub fn take(&mut self, len: usize) -> Option<&'a [u8]> {
        let out = bytes(self.data, self.pos, len)?;
        self.pos += len;
        Some(out)
    }

    /// Skips `len` bytes
    pub fn skip(&mut self, len: usize) -> Option<()> {
        self.take(len).map(|_| ())
    }

    /// Reads a little-endian u16
    pub fn u16_le(&mut self) -> Option<u16> {
        let v = u16_le(self.data, self.pos)?;
        self.pos += 2;
        Some(v)
    }

    /// Reads a little-endian u32
    pub fn u32_le(&mut self) -> Option<u32> {
        let v = u32_le(self.data, self.pos)?;
        self.pos += 4;
        Some(v)
    }

    /// Reads a big-endian u32
    pub fn u32_be(&mut self) -> Option<u32> {
        let v = u32_be(self.data, self.pos)?;
        self.pos += 4;
        Some(v)
    }

    /// Reads a little-endian u64
    pub fn u64_le(&mut self) -> Option<u64> {
        let v = u64_le(self.data, self.pos)?;
        self.pos += 8;
        Some(v)
    }
}
