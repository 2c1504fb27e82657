//! Huff0: zstd's canonical Huffman coder, used to compress literal bytes.
//!
//! Code lengths are stored inverted relative to usual canonical Huffman
//! convention: a symbol's *weight* `w` gives its code length as
//! `max_num_bits + 1 - w` (weight 0 means "unused"). See
//! <https://github.com/facebook/zstd/blob/dev/doc/zstd_compression_format.md#huffman-coding>.

pub mod decoder;
pub mod encoder;

pub use decoder::{HuffmanDecoder, HuffmanTable};
