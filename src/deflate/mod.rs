pub mod block;
pub mod header;
pub mod huffman_block;
pub mod slice;
pub mod stored;
pub mod stream;
pub mod tables;
pub mod tokens;

pub use block::{Block, BlockType, DeflateBlock};
pub use header::DynamicHeader;
pub use huffman_block::{HuffmanBlock, PruneMode};
pub use stored::StoredBlock;
pub use stream::{BlockId, BlockInfo, Stream};
pub use tokens::{CodeLengthSymbol, LitLen};
