//! Crate-wide error type.
//!
//! Every fallible parse/decode/encode routine in this crate returns a
//! `Result<_, Error>`. Narrower per-module error enums exist where the
//! extra detail is useful to callers (e.g. [`crate::zstd::literals::LiteralsSectionParseError`])
//! and convert into `Error` via `#[from]`.

use alloc::string::String;

/// Errors produced while parsing, decoding, or encoding a Zstandard or
/// Brotli stream.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The input ended before the current field could be fully read.
    #[error("truncated input: needed {need} more byte(s), had {have}")]
    TruncatedInput { need: usize, have: usize },

    /// A frame's magic number did not match the expected value.
    #[error("invalid magic number: got {got:#010x}")]
    InvalidMagic { got: u32 },

    /// A reserved bit or block type was set.
    #[error("reserved bit or block type set where the format requires zero: {context}")]
    ReservedBit { context: &'static str },

    /// The declared window size is outside the format's allowed range.
    #[error("invalid window size: {context}")]
    InvalidWindow { context: String },

    /// An FSE or Huffman table failed an internal consistency check.
    #[error("invalid table: {context}")]
    InvalidTable { context: String },

    /// A sequence's match offset was zero, exceeded available history, or
    /// targeted an uninitialized dictionary region.
    #[error("invalid back-reference: {context}")]
    InvalidBackReference { context: String },

    /// The trailing content checksum did not match the decoded bytes.
    #[error("checksum mismatch: expected {expected:#010x}, got {got:#010x}")]
    ChecksumMismatch { expected: u32, got: u32 },

    /// The declared frame content size did not match the number of bytes
    /// actually produced.
    #[error("content size mismatch: declared {declared}, produced {produced}")]
    ContentSizeMismatch { declared: u64, produced: u64 },

    /// The frame references a dictionary the caller did not provide.
    #[error("dictionary missing: frame requires dictionary id {dict_id}")]
    DictionaryMissing { dict_id: u32 },

    /// A structurally valid but unsupported combination was encountered
    /// (repeat-mode descriptor with no prior table, reserved block type,
    /// compound-dictionary overflow, ...).
    #[error("unsupported: {context}")]
    Unsupported { context: &'static str },

    /// Wraps an I/O error from the underlying reader/writer.
    #[error("i/o error: {0}")]
    Io(#[from] crate::io::Error),
}

pub type Result<T> = core::result::Result<T, Error>;
