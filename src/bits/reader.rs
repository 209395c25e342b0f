use crate::error::{Error, Result};

/// LSB-first bit reader over an in-memory DEFLATE stream
///
/// Whole streams are parsed from memory, so the reader borrows the input and
/// refills its 64-bit window straight from the slice.
pub struct BitReader<'a> {
    input: &'a [u8],
    /// Next byte of `input` not yet in the window
    pos: usize,
    window: u64,
    /// Valid low bits in `window`
    len: u8,
}

impl<'a> BitReader<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0, window: 0, len: 0 }
    }

    fn refill(&mut self, n: u8) -> Result<()> {
        debug_assert!(n <= 57);

        // Fast path: a full 8-byte load tops the window up to at least 56 bits
        if let Some(chunk) = self.input.get(self.pos..self.pos + 8) {
            let mut word = [0u8; 8];
            word.copy_from_slice(chunk);
            let take = (63 - self.len) / 8;
            self.window |= u64::from_le_bytes(word) << self.len;
            if take < 8 {
                self.window &= (1u64 << (self.len + take * 8)) - 1;
            }
            self.pos += take as usize;
            self.len += take * 8;
        }

        while self.len < n {
            let byte = *self.input.get(self.pos).ok_or(Error::UnexpectedEof)?;
            self.window |= u64::from(byte) << self.len;
            self.len += 8;
            self.pos += 1;
        }
        Ok(())
    }

    /// Read `n` bits (0-57), first bit in the least significant position
    pub fn read_bits(&mut self, n: u8) -> Result<u64> {
        if n == 0 {
            return Ok(0);
        }
        if self.len < n {
            self.refill(n)?;
        }

        let value = self.window & ((1u64 << n) - 1);
        self.window >>= n;
        self.len -= n;
        Ok(value)
    }

    #[inline]
    pub fn read_bit(&mut self) -> Result<bool> {
        Ok(self.read_bits(1)? != 0)
    }

    /// Skip to the next byte boundary
    pub fn align_to_byte(&mut self) {
        let partial = self.len % 8;
        self.window >>= partial;
        self.len -= partial;
    }

    /// Byte-aligned little-endian u16, as in a stored block header
    pub fn read_u16_le(&mut self) -> Result<u16> {
        self.align_to_byte();
        Ok(self.read_bits(16)? as u16)
    }

    /// Byte-aligned copy of `buf.len()` bytes
    pub fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        self.align_to_byte();

        // Drain whole bytes still held in the window, then copy the rest directly
        let buffered = ((self.len / 8) as usize).min(buf.len());
        for b in &mut buf[..buffered] {
            *b = self.window as u8;
            self.window >>= 8;
            self.len -= 8;
        }

        let rest = &mut buf[buffered..];
        let src = self
            .input
            .get(self.pos..self.pos + rest.len())
            .ok_or(Error::UnexpectedEof)?;
        rest.copy_from_slice(src);
        self.pos += rest.len();
        Ok(())
    }

    /// Bits consumed from the start of the input
    pub fn bits_consumed(&self) -> u64 {
        self.pos as u64 * 8 - u64::from(self.len)
    }

    pub fn is_byte_aligned(&self) -> bool {
        self.len % 8 == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lsb_first() {
        // 0xD3 = 1101_0011, 0xAA
        let data = [0xD3, 0xAA];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read_bits(3).unwrap(), 0b011);
        assert_eq!(reader.read_bits(5).unwrap(), 0b11010);
        assert_eq!(reader.read_bits(8).unwrap(), 0xAA);
        assert!(matches!(reader.read_bit(), Err(Error::UnexpectedEof)));
    }

    #[test]
    fn test_zero_width_read() {
        let mut reader = BitReader::new(&[]);
        assert_eq!(reader.read_bits(0).unwrap(), 0);
        assert_eq!(reader.bits_consumed(), 0);
    }

    #[test]
    fn test_wide_reads_across_refills() {
        let data: Vec<u8> = (1..=16).collect();
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read_bits(4).unwrap(), 0x1);
        assert_eq!(reader.read_bits(57).unwrap(), 0x0080_7060_5040_3020u64);
        assert_eq!(reader.bits_consumed(), 61);
        // Remaining high nibble of byte 8, then bytes 9..
        assert_eq!(reader.read_bits(3).unwrap(), 0);
        assert_eq!(reader.read_bits(16).unwrap(), 0x0a09);
        assert_eq!(reader.bits_consumed(), 80);
    }

    #[test]
    fn test_align_and_u16() {
        let data = [0xFF, 0x34, 0x12, 0xAB];
        let mut reader = BitReader::new(&data);
        reader.read_bits(3).unwrap();
        assert!(!reader.is_byte_aligned());
        assert_eq!(reader.read_u16_le().unwrap(), 0x1234);
        assert_eq!(reader.bits_consumed(), 24);
        assert_eq!(reader.read_bits(8).unwrap(), 0xAB);
    }

    #[test]
    fn test_read_bytes_mixes_window_and_slice() {
        let data: Vec<u8> = (0..20).collect();
        let mut reader = BitReader::new(&data);
        reader.read_bits(5).unwrap();

        let mut buf = [0u8; 12];
        reader.read_bytes(&mut buf).unwrap();
        assert_eq!(buf.to_vec(), (1..13).collect::<Vec<u8>>());
        assert_eq!(reader.read_bits(8).unwrap(), 13);

        let mut too_many = [0u8; 10];
        assert!(matches!(reader.read_bytes(&mut too_many), Err(Error::UnexpectedEof)));
    }
}
