//! A Brotli encoder and decoder: real insert-and-copy commands against
//! a four-slot distance cache, a single block type per category. See
//! [`encoder::compress_literal`] and [`decoder::decompress`].

pub mod decoder;
pub mod encoder;
pub mod huffman;
pub mod tables;

pub use decoder::BrotliDecoder;
pub use encoder::BrotliEncoder;
