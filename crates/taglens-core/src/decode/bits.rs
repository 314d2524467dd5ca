//! Sub-byte field extraction.
//!
//! Codec headers (MPEG audio, ADTS, ADIF, FLAC STREAMINFO) pack fields at
//! arbitrary bit positions, frequently straddling a byte boundary. A
//! [`BitField`] names such a field once as `(byte_offset, bit_offset,
//! bit_width, order)` and can then be applied to any buffer.

/// Bit numbering inside a byte span
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitOrder {
    /// Bit 0 is the most significant bit of the first byte (network order)
    MsbFirst,
    /// Bit 0 is the least significant bit of the first byte
    LsbFirst,
}

/// Descriptor of an unsigned integer packed into a byte span
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitField {
    /// Byte where the field's first bit lives
    pub byte_offset: usize,
    /// Bit index within that byte, counted per `order`
    pub bit_offset: u8,
    /// Width in bits (1..=64)
    pub bit_width: u8,
    /// Bit numbering
    pub order: BitOrder,
}

impl BitField {
    /// MSB-first field starting at `bit_offset` (0 = 0x80) of `byte_offset`
    pub const fn msb(byte_offset: usize, bit_offset: u8, bit_width: u8) -> Self {
        Self {
            byte_offset,
            bit_offset,
            bit_width,
            order: BitOrder::MsbFirst,
        }
    }

    /// LSB-first field starting at `bit_offset` (0 = 0x01) of `byte_offset`
    pub const fn lsb(byte_offset: usize, bit_offset: u8, bit_width: u8) -> Self {
        Self {
            byte_offset,
            bit_offset,
            bit_width,
            order: BitOrder::LsbFirst,
        }
    }

    /// MSB-first field addressed by absolute bit position
    pub const fn at_bit(bit_position: usize, bit_width: u8) -> Self {
        Self::msb(bit_position / 8, (bit_position % 8) as u8, bit_width)
    }

    /// Pulls the field out of `data`, or `None` if it runs past the end
    pub fn extract(&self, data: &[u8]) -> Option<u64> {
        if self.bit_width == 0 || self.bit_width > 64 || self.bit_offset > 7 {
            return None;
        }
        let start = self.byte_offset.checked_mul(8)? + usize::from(self.bit_offset);
        let end = start.checked_add(usize::from(self.bit_width))?;
        if end.div_ceil(8) > data.len() {
            return None;
        }

        let mut value = 0u64;
        for (i, bit) in (start..end).enumerate() {
            let byte = data[bit / 8];
            match self.order {
                BitOrder::MsbFirst => {
                    value = (value << 1) | u64::from((byte >> (7 - bit % 8)) & 1);
                }
                BitOrder::LsbFirst => {
                    value |= u64::from((byte >> (bit % 8)) & 1) << i;
                }
            }
        }
        Some(value)
    }
}

/// Sequential MSB-first bit reader, for headers whose layout depends on
/// earlier flags
#[derive(Debug, Clone)]
pub struct BitCursor<'a> {
    data: &'a [u8],
    bit_pos: usize,
}

impl<'a> BitCursor<'a> {
    /// Creates a reader positioned at `byte_offset`
    pub fn new(data: &'a [u8], byte_offset: usize) -> Self {
        Self {
            data,
            bit_pos: byte_offset.saturating_mul(8),
        }
    }

    /// Reads the next `width` bits
    pub fn read(&mut self, width: u8) -> Option<u64> {
        let value = BitField::at_bit(self.bit_pos, width).extract(self.data)?;
        self.bit_pos += usize::from(width);
        Some(value)
    }

    /// Reads a single flag bit
    pub fn flag(&mut self) -> Option<bool> {
        self.read(1).map(|bit| bit == 1)
    }

    /// Skips `width` bits without bounds checking the skipped span
    pub fn skip(&mut self, width: usize) {
        self.bit_pos = self.bit_pos.saturating_add(width);
    }

    /// Current position in bits
    pub fn bit_position(&self) -> usize {
        self.bit_pos
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_msb_within_byte() {
        // ADTS profile: top two bits of byte 2
        let header = [0xFF, 0xF1, 0x50, 0x80];
        assert_eq!(BitField::msb(2, 0, 2).extract(&header), Some(1));
        // sampling index: next four bits
        assert_eq!(BitField::msb(2, 2, 4).extract(&header), Some(4));
    }

    #[test]
    fn test_msb_across_boundary() {
        // channel config = LSB of byte 2 followed by top two bits of byte 3
        let header = [0xFF, 0xF1, 0x50, 0x80];
        assert_eq!(BitField::msb(2, 7, 3).extract(&header), Some(2));
    }

    #[test]
    fn test_flac_sample_rate_layout() {
        // 44100 = 0x0AC44 packed into bytes 10..13 of STREAMINFO
        let mut block = [0u8; 13];
        block[10] = 0x0A;
        block[11] = 0xC4;
        block[12] = 0x42;
        assert_eq!(BitField::msb(10, 0, 20).extract(&block), Some(44100));
        // channels-1 = 1 in bits 4..7 of byte 12
        assert_eq!(BitField::msb(12, 4, 3).extract(&block), Some(1));
    }

    #[test]
    fn test_lsb_order() {
        let data = [0b1010_0000, 0b0000_0001];
        assert_eq!(BitField::lsb(0, 5, 1).extract(&data), Some(1));
        assert_eq!(BitField::lsb(0, 7, 2).extract(&data), Some(0b11));
    }

    #[test]
    fn test_out_of_bounds() {
        let data = [0xFF];
        assert_eq!(BitField::msb(0, 4, 5).extract(&data), None);
        assert_eq!(BitField::msb(0, 0, 0).extract(&data), None);
        assert_eq!(BitField::msb(0, 0, 8).extract(&data), Some(0xFF));
    }

    #[test]
    fn test_cursor() {
        let data = [0b1011_0000, 0xFF];
        let mut cursor = BitCursor::new(&data, 0);
        assert_eq!(cursor.flag(), Some(true));
        assert_eq!(cursor.read(3), Some(0b011));
        cursor.skip(4);
        assert_eq!(cursor.read(8), Some(0xFF));
        assert_eq!(cursor.read(1), None);
        assert_eq!(cursor.bit_position(), 16);
    }
}
