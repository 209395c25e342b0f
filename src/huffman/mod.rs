pub mod codec;
pub mod table;
pub mod tree;

pub use codec::{DecodedSym, Huffman};
pub use table::{pack_code_lengths, unpack_code_lengths, HuffmanTable, PackOptions};
pub use tree::HuffmanTree;
