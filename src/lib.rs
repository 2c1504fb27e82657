//! Zstandard and Brotli compression primitives.
//!
//! `zstd` provides a full Zstandard frame decoder (RFC 8878, including
//! dictionaries) and a literal-mode encoder (Huffman-compressed or raw
//! literals, RLE runs, no LZ match finder). `brotli` provides a Brotli
//! encoder and decoder (RFC 7932) with real insert-and-copy commands
//! against a four-slot distance cache. Both share bit-level I/O
//! (`bit`), FSE (`fse`), and canonical Huffman (`huff0`) building
//! blocks with the Zstandard format; Brotli's own canonical Huffman
//! trees live under `brotli::huffman`.
#![cfg_attr(not(feature = "std"), no_std)]
#![deny(trivial_casts, trivial_numeric_casts, rust_2018_idioms)]

extern crate alloc;

pub mod bit;
pub mod brotli;
pub mod common;
pub mod error;
pub mod fse;
pub mod huff0;
pub mod io;
pub mod zstd;

pub use error::Error;

pub use brotli::decoder::decompress as brotli_decompress;
pub use brotli::encoder::compress_literal as brotli_compress_literal;
pub use brotli::{BrotliDecoder, BrotliEncoder};

pub use zstd::decoder::{decompress as zstd_decompress, decompress_with_dictionary as zstd_decompress_with_dictionary};
pub use zstd::encoder::compress as zstd_compress;
pub use zstd::decoder::FrameDecoder as ZstdDecoder;
pub use zstd::encoder::{CompressionLevel, FrameCompressor as ZstdEncoder};
