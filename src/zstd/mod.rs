//! A Zstandard frame decoder and a literal-mode encoder, sharing the
//! block, literals, sequence, and window machinery in the submodules
//! below. See [`decoder::decompress`] and [`encoder::compress`] for the
//! top-level entry points.

pub mod block;
pub mod decoder;
pub mod dictionary;
pub mod encoder;
pub mod frame;
pub mod literals;
pub mod sequences;
pub mod window;
