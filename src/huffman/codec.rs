use std::sync::{Arc, OnceLock};

use super::table::HuffmanTable;
use crate::bits::writer::reverse_bits;
use crate::bits::BitReader;
use crate::deflate::tables::MAX_CODE_LENGTH;
use crate::error::{Error, Result};

/// A decoded symbol and the number of bits its code took
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodedSym {
    pub symbol: u16,
    pub len: u8,
}

/// Canonical Huffman codec over a [`HuffmanTable`]
///
/// Decoding walks the code one bit at a time and checks, per length, whether
/// the accumulated value falls inside that length's range of canonical codes.
/// Encoding hands out codes already bit-reversed for the LSB-first writer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Huffman {
    table: HuffmanTable,
    /// Codes reversed for direct emission
    reversed: Vec<u32>,
    max_bits: u8,
    /// For each bit length: (first_code, first_symbol_index)
    bit_info: [(u32, usize); MAX_CODE_LENGTH as usize + 2],
    /// Symbols sorted by code length, then by symbol value
    symbols: Vec<u16>,
}

impl Huffman {
    /// Build from a table produced by the tree builder or canonical construction
    pub fn from_table(table: HuffmanTable) -> Self {
        let max_bits = table.max_code_len().min(MAX_CODE_LENGTH);

        let mut bl_count = [0usize; MAX_CODE_LENGTH as usize + 1];
        for &len in &table.code_len {
            if len > 0 && len <= MAX_CODE_LENGTH {
                bl_count[len as usize] += 1;
            }
        }

        let mut symbols: Vec<(u16, u8)> = table
            .code_len
            .iter()
            .enumerate()
            .filter(|(_, &len)| len > 0 && len <= MAX_CODE_LENGTH)
            .map(|(sym, &len)| (sym as u16, len))
            .collect();
        symbols.sort_by_key(|&(sym, len)| (len, sym));

        let mut bit_info = [(0u32, 0usize); MAX_CODE_LENGTH as usize + 2];
        let mut code = 0u32;
        let mut symbol_idx = 0;
        for bits in 1..=MAX_CODE_LENGTH as usize {
            // bl_count[0] stays 0, so the first length starts at code 0
            code = (code + bl_count[bits - 1] as u32) << 1;
            bit_info[bits] = (code, symbol_idx);
            symbol_idx += bl_count[bits];
        }
        bit_info[MAX_CODE_LENGTH as usize + 1] = (0, symbol_idx);

        let reversed = table
            .code
            .iter()
            .zip(&table.code_len)
            .map(|(&c, &l)| if l > 0 { reverse_bits(c as u32, l) } else { 0 })
            .collect();

        Self {
            table,
            reversed,
            max_bits,
            bit_info,
            symbols: symbols.into_iter().map(|(sym, _)| sym).collect(),
        }
    }

    /// Build canonical codes from transmitted code lengths
    ///
    /// Incomplete codes are accepted (a single distance code is common);
    /// over-subscribed ones are not.
    pub fn from_lengths(lengths: &[u8]) -> Result<Self> {
        let table = HuffmanTable::from_lengths(lengths);
        if !table.is_valid() {
            return Err(Error::OversubscribedTable);
        }
        Ok(Self::from_table(table))
    }

    /// Fixed literal/length codec (RFC 1951 section 3.2.6), shared
    pub fn fixed_litlen() -> Arc<Huffman> {
        static FIXED: OnceLock<Arc<Huffman>> = OnceLock::new();
        FIXED.get_or_init(|| Arc::new(Self::from_table(HuffmanTable::fixed_litlen()))).clone()
    }

    /// Fixed distance codec, shared
    pub fn fixed_distance() -> Arc<Huffman> {
        static FIXED: OnceLock<Arc<Huffman>> = OnceLock::new();
        FIXED.get_or_init(|| Arc::new(Self::from_table(HuffmanTable::fixed_distance()))).clone()
    }

    /// Decode the next symbol
    pub fn read_sym(&self, bits: &mut BitReader<'_>) -> Result<DecodedSym> {
        if self.symbols.is_empty() {
            return Err(Error::EmptyHuffmanTable);
        }

        let mut code = 0u32;
        for len in 1..=self.max_bits {
            code = (code << 1) | bits.read_bits(1)? as u32;
            let (first_code, first_idx) = self.bit_info[len as usize];
            let count = self.bit_info[len as usize + 1].1 - first_idx;

            if count > 0 && code >= first_code && code < first_code + count as u32 {
                let idx = first_idx + (code - first_code) as usize;
                return Ok(DecodedSym { symbol: self.symbols[idx], len });
            }
        }

        Err(Error::InvalidHuffmanSymbol { code, len: self.max_bits })
    }

    /// Code for `symbol`, bit-reversed for the LSB-first writer
    #[inline]
    pub fn sym(&self, symbol: u16) -> u32 {
        self.reversed.get(symbol as usize).copied().unwrap_or(0)
    }

    /// Code length of `symbol`, 0 if it has no code
    #[inline]
    pub fn sym_len(&self, symbol: u16) -> u8 {
        self.table.code_len.get(symbol as usize).copied().unwrap_or(0)
    }

    pub fn code_lengths(&self) -> &[u8] {
        &self.table.code_len
    }

    pub fn table(&self) -> &HuffmanTable {
        &self.table
    }

    pub fn num_symbols(&self) -> usize {
        self.table.num_symbols()
    }

    /// Whether no symbol has a code
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::BitWriter;

    #[test]
    fn test_fixed_tables() {
        let lit = Huffman::fixed_litlen();
        assert_eq!(lit.num_symbols(), 288);
        assert_eq!(lit.sym_len(0), 8);
        assert_eq!(lit.sym_len(144), 9);
        assert_eq!(lit.sym_len(256), 7);
        assert_eq!(lit.sym_len(280), 8);
        let dist = Huffman::fixed_distance();
        assert_eq!(dist.num_symbols(), 32);
        assert!((0..32).all(|s| dist.sym_len(s) == 5));
        assert!(Arc::ptr_eq(&lit, &Huffman::fixed_litlen()));
    }

    #[test]
    fn test_simple_decode() {
        let huffman = Huffman::from_lengths(&[1, 1]).unwrap();

        let mut reader = BitReader::new(&[0b00000000]);
        assert_eq!(huffman.read_sym(&mut reader).unwrap(), DecodedSym { symbol: 0, len: 1 });

        let mut reader = BitReader::new(&[0b00000001]);
        assert_eq!(huffman.read_sym(&mut reader).unwrap(), DecodedSym { symbol: 1, len: 1 });
    }

    #[test]
    fn test_encode_decode_fixed_litlen() {
        let lit = Huffman::fixed_litlen();
        let symbols = [0u16, 65, 143, 144, 255, 256, 257, 279, 280, 285];

        let mut writer = BitWriter::new();
        for &s in &symbols {
            writer.write_bits(lit.sym(s) as u64, lit.sym_len(s));
        }
        let bytes = writer.finish();

        let mut reader = BitReader::new(&bytes);
        for &s in &symbols {
            let decoded = lit.read_sym(&mut reader).unwrap();
            assert_eq!(decoded.symbol, s);
            assert_eq!(decoded.len, lit.sym_len(s));
        }
    }

    #[test]
    fn test_incomplete_code_rejects_unused_pattern() {
        // One code of length 1: pattern 1 matches nothing
        let huffman = Huffman::from_lengths(&[0, 1]).unwrap();
        let mut reader = BitReader::new(&[0b00000001]);
        assert!(matches!(
            huffman.read_sym(&mut reader),
            Err(Error::InvalidHuffmanSymbol { .. })
        ));
    }

    #[test]
    fn test_oversubscribed_rejected() {
        assert!(matches!(Huffman::from_lengths(&[1, 1, 1]), Err(Error::OversubscribedTable)));
    }

    #[test]
    fn test_empty_table() {
        let huffman = Huffman::from_lengths(&[0, 0, 0]).unwrap();
        assert!(huffman.is_empty());
        assert_eq!(huffman.sym_len(1), 0);
        assert_eq!(huffman.sym_len(99), 0);
        let mut reader = BitReader::new(&[0u8]);
        assert!(matches!(huffman.read_sym(&mut reader), Err(Error::EmptyHuffmanTable)));
    }
}
