/// LSB-first bit writer producing a DEFLATE stream in memory
///
/// Bits collect in a 64-bit accumulator and are flushed a whole byte at a
/// time, so the last byte is only emitted by [`finish`](Self::finish).
#[derive(Default)]
pub struct BitWriter {
    out: Vec<u8>,
    acc: u64,
    /// Pending bits in `acc` (always < 8 between calls)
    pending: u8,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { out: Vec::with_capacity(capacity), ..Self::default() }
    }

    /// Append the low `n` bits (0-57) of `value`
    pub fn write_bits(&mut self, value: u64, n: u8) {
        debug_assert!(n <= 57);
        if n == 0 {
            return;
        }

        self.acc |= (value & ((1u64 << n) - 1)) << self.pending;
        self.pending += n;
        while self.pending >= 8 {
            self.out.push(self.acc as u8);
            self.acc >>= 8;
            self.pending -= 8;
        }
    }

    #[inline]
    pub fn write_bit(&mut self, bit: bool) {
        self.write_bits(u64::from(bit), 1);
    }

    /// Append a code given MSB-first, as canonical Huffman codes are numbered
    pub fn write_bits_reversed(&mut self, code: u32, length: u8) {
        self.write_bits(u64::from(reverse_bits(code, length)), length);
    }

    /// Zero-pad to the next byte boundary
    pub fn align_to_byte(&mut self) {
        if self.pending > 0 {
            self.out.push(self.acc as u8);
            self.acc = 0;
            self.pending = 0;
        }
    }

    /// Byte-aligned little-endian u16
    pub fn write_u16_le(&mut self, value: u16) {
        self.align_to_byte();
        self.out.extend_from_slice(&value.to_le_bytes());
    }

    /// Byte-aligned raw bytes
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.align_to_byte();
        self.out.extend_from_slice(bytes);
    }

    pub fn bit_len(&self) -> u64 {
        self.out.len() as u64 * 8 + u64::from(self.pending)
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.align_to_byte();
        self.out
    }
}

/// Reverse the bottom `n` bits of `value`
pub(crate) fn reverse_bits(value: u32, n: u8) -> u32 {
    if n == 0 {
        return 0;
    }
    value.reverse_bits() >> (32 - u32::from(n))
}
