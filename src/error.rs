use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // DEFLATE structural errors
    #[error("Invalid DEFLATE block type: {0}")]
    InvalidBlockType(u8),

    #[error("Stored block length mismatch: LEN={len}, NLEN={nlen}")]
    StoredBlockLengthMismatch { len: u16, nlen: u16 },

    #[error("Stored block too large: {0} bytes (max 65535)")]
    StoredBlockTooLarge(usize),

    #[error("Invalid code length symbol: {0}")]
    InvalidCodeLengthSymbol(u16),

    #[error("Code length run overflows header: declared {declared} lengths, decoded {decoded}")]
    CodeLengthOverflow { declared: usize, decoded: usize },

    #[error("Code length repeat with no previous length")]
    MissingPreviousLength,

    #[error("Invalid length code: {0}")]
    InvalidLengthCode(u16),

    #[error("Invalid distance code: {0}")]
    InvalidDistanceCode(u16),

    #[error("Back-reference distance {distance} exceeds available window {available}")]
    InvalidBackReference { distance: u16, available: usize },

    // Huffman decoding errors
    #[error("No Huffman code matches {code:#b} within {len} bits")]
    InvalidHuffmanSymbol { code: u32, len: u8 },

    #[error("Code lengths over-subscribe the code space")]
    OversubscribedTable,

    #[error("Huffman table has no codes")]
    EmptyHuffmanTable,

    #[error("Symbol {0} has no code in the current table")]
    MissingCode(u16),

    // Stream errors
    #[error("DEFLATE stream has no blocks")]
    EmptyStream,

    #[error("Unexpected end of input")]
    UnexpectedEof,

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
