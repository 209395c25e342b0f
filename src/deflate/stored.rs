use std::sync::Arc;

use crate::bits::{BitReader, BitWriter};
use crate::error::{Error, Result};

/// Largest payload a stored block can carry
pub const MAX_STORED_LEN: usize = u16::MAX as usize;

/// A stored (uncompressed) block
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredBlock {
    data: Arc<[u8]>,
}

impl StoredBlock {
    pub fn new(data: Arc<[u8]>) -> Result<Self> {
        if data.len() > MAX_STORED_LEN {
            return Err(Error::StoredBlockTooLarge(data.len()));
        }
        Ok(Self { data })
    }

    /// Parse the body of a stored block; the 3-bit block header is already consumed
    pub fn parse(bits: &mut BitReader<'_>) -> Result<Self> {
        bits.align_to_byte();

        let len = bits.read_u16_le()?;
        let nlen = bits.read_u16_le()?;
        if len != !nlen {
            return Err(Error::StoredBlockLengthMismatch { len, nlen });
        }

        let mut data = vec![0u8; len as usize];
        bits.read_bytes(&mut data)?;
        Ok(Self { data: data.into() })
    }

    pub fn write(&self, writer: &mut BitWriter) {
        writer.align_to_byte();
        let len = self.data.len() as u16;
        writer.write_u16_le(len);
        writer.write_u16_le(!len);
        writer.write_bytes(&self.data);
    }

    /// Size of the body in bits when it starts at bit `position`
    ///
    /// Padding to the byte boundary counts, so the size depends on where the
    /// block lands in the stream.
    pub fn size_bits(&self, position: u64) -> u64 {
        let padding = (8 - position % 8) % 8;
        (self.data.len() as u64 + 4) * 8 + padding
    }

    pub fn data(&self) -> &Arc<[u8]> {
        &self.data
    }

    /// Join two stored payloads if the result still fits one block
    pub fn concat(&self, next: &StoredBlock) -> Option<StoredBlock> {
        if self.data.len() + next.data.len() > MAX_STORED_LEN {
            return None;
        }
        let mut joined = Vec::with_capacity(self.data.len() + next.data.len());
        joined.extend_from_slice(&self.data);
        joined.extend_from_slice(&next.data);
        Some(Self { data: joined.into() })
    }
}
