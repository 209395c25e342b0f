use std::fmt;
use std::sync::Arc;

use super::huffman_block::HuffmanBlock;
use super::slice::History;
use super::stored::StoredBlock;
use crate::bits::{BitReader, BitWriter};
use crate::error::{Error, Result};

/// Block header bits: BFINAL (1) + BTYPE (2)
pub const BLOCK_HEADER_BITS: u64 = 3;

/// DEFLATE block type (BTYPE)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlockType {
    Stored = 0,
    FixedHuffman = 1,
    DynamicHuffman = 2,
}

impl BlockType {
    pub fn from_bits(bits: u8) -> Result<Self> {
        match bits {
            0 => Ok(BlockType::Stored),
            1 => Ok(BlockType::FixedHuffman),
            2 => Ok(BlockType::DynamicHuffman),
            other => Err(Error::InvalidBlockType(other)),
        }
    }

    pub fn bits(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BlockType::Stored => "stored",
            BlockType::FixedHuffman => "fixed",
            BlockType::DynamicHuffman => "dynamic",
        };
        f.write_str(name)
    }
}

/// Operations shared by every block representation
///
/// Sizes exclude the 3-bit block header, which the stream accounts for.
pub trait DeflateBlock {
    /// Parse a block body whose header announced `block_type`
    fn parse(
        bits: &mut BitReader<'_>,
        block_type: BlockType,
        history: &History<'_>,
    ) -> Result<Self>
    where
        Self: Sized;

    /// Write the block body
    fn write(&self, writer: &mut BitWriter) -> Result<()>;

    /// Encoded size of the body when it starts at bit `position`
    fn size_bits(&self, position: u64) -> u64;

    fn uncompressed_data(&self) -> &[u8];

    fn block_type(&self) -> BlockType;

    /// Cheap in-place improvements that keep the current tables; returns bits saved
    fn optimise(&mut self) -> u64;
}

impl DeflateBlock for StoredBlock {
    fn parse(
        bits: &mut BitReader<'_>,
        block_type: BlockType,
        _history: &History<'_>,
    ) -> Result<Self> {
        if block_type != BlockType::Stored {
            return Err(Error::Internal(format!("{block_type} block parsed as stored")));
        }
        StoredBlock::parse(bits)
    }

    fn write(&self, writer: &mut BitWriter) -> Result<()> {
        StoredBlock::write(self, writer);
        Ok(())
    }

    fn size_bits(&self, position: u64) -> u64 {
        StoredBlock::size_bits(self, position)
    }

    fn uncompressed_data(&self) -> &[u8] {
        self.data()
    }

    fn block_type(&self) -> BlockType {
        BlockType::Stored
    }

    fn optimise(&mut self) -> u64 {
        0
    }
}

/// A parsed block of either representation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Block {
    Stored(StoredBlock),
    Huffman(HuffmanBlock),
}

impl Block {
    pub fn as_huffman(&self) -> Option<&HuffmanBlock> {
        match self {
            Block::Huffman(block) => Some(block),
            Block::Stored(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.uncompressed_data().is_empty()
    }

    /// The decoded bytes, shared with the block itself
    pub fn data(&self) -> &Arc<[u8]> {
        match self {
            Block::Stored(block) => block.data(),
            Block::Huffman(block) => block.data(),
        }
    }
}

impl From<StoredBlock> for Block {
    fn from(block: StoredBlock) -> Self {
        Block::Stored(block)
    }
}

impl From<HuffmanBlock> for Block {
    fn from(block: HuffmanBlock) -> Self {
        Block::Huffman(block)
    }
}

impl DeflateBlock for Block {
    fn parse(
        bits: &mut BitReader<'_>,
        block_type: BlockType,
        history: &History<'_>,
    ) -> Result<Self> {
        Ok(match block_type {
            BlockType::Stored => Block::Stored(StoredBlock::parse(bits)?),
            BlockType::FixedHuffman | BlockType::DynamicHuffman => {
                Block::Huffman(HuffmanBlock::parse(bits, block_type, history)?)
            }
        })
    }

    fn write(&self, writer: &mut BitWriter) -> Result<()> {
        match self {
            Block::Stored(block) => DeflateBlock::write(block, writer),
            Block::Huffman(block) => DeflateBlock::write(block, writer),
        }
    }

    fn size_bits(&self, position: u64) -> u64 {
        match self {
            Block::Stored(block) => StoredBlock::size_bits(block, position),
            Block::Huffman(block) => DeflateBlock::size_bits(block, position),
        }
    }

    fn uncompressed_data(&self) -> &[u8] {
        match self {
            Block::Stored(block) => block.data(),
            Block::Huffman(block) => block.data(),
        }
    }

    fn block_type(&self) -> BlockType {
        match self {
            Block::Stored(_) => BlockType::Stored,
            Block::Huffman(block) => DeflateBlock::block_type(block),
        }
    }

    fn optimise(&mut self) -> u64 {
        match self {
            Block::Stored(_) => 0,
            Block::Huffman(block) => DeflateBlock::optimise(block),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_type_bits() {
        assert_eq!(BlockType::from_bits(0).unwrap(), BlockType::Stored);
        assert_eq!(BlockType::from_bits(2).unwrap(), BlockType::DynamicHuffman);
        assert!(matches!(BlockType::from_bits(3), Err(Error::InvalidBlockType(3))));
        assert_eq!(BlockType::FixedHuffman.bits(), 1);
        assert_eq!(BlockType::DynamicHuffman.to_string(), "dynamic");
    }

    #[test]
    fn test_stored_dispatch() {
        let block = Block::from(StoredBlock::new(Arc::from(&b"abc"[..])).unwrap());
        assert_eq!(block.block_type(), BlockType::Stored);
        assert_eq!(block.uncompressed_data(), b"abc");
        assert_eq!(block.size_bits(3), 61);
        assert!(block.as_huffman().is_none());
        assert!(!block.is_empty());
    }

    #[test]
    fn test_data_shares_buffer() {
        let bytes: Arc<[u8]> = Arc::from(&b"shared"[..]);
        let block = Block::from(StoredBlock::new(bytes.clone()).unwrap());
        assert!(Arc::ptr_eq(block.data(), &bytes));
    }
}
