//! A literal-mode Zstandard encoder: every block either repeats a single
//! byte (RLE), is stored uncompressed (Raw), or is Huffman-compressed
//! literals with an empty sequences section (no match finder -- this
//! crate does not do LZ77 parsing). The framing, block choice, and
//! checksum trailer still follow the real format exactly, so the
//! output is decodable by any conforming Zstandard decoder.

use alloc::vec::Vec;

use crate::common::MAX_BLOCK_SIZE;
use crate::error::Error;
use crate::huff0::encoder::HuffmanTable;
use crate::zstd::block::{write_block_header, BlockType};
use crate::zstd::frame::write_frame_header;
use crate::zstd::literals::{encode_literals, encode_rle_literals};
use crate::zstd::sequences::write_sequences_header;

#[cfg(feature = "hash")]
use core::hash::Hasher;
#[cfg(feature = "hash")]
use twox_hash::XxHash64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionLevel {
    /// Literal-only Huffman compression, no match search.
    Fast,
}

pub struct FrameCompressor {
    level: CompressionLevel,
    checksum: bool,
}

impl FrameCompressor {
    pub fn new(level: CompressionLevel) -> Self {
        FrameCompressor { level, checksum: false }
    }

    pub fn with_checksum(mut self, checksum: bool) -> Self {
        self.checksum = checksum;
        self
    }

    pub fn compress(&self, data: &[u8]) -> Vec<u8> {
        let _ = self.level;
        let mut out = Vec::with_capacity(data.len() / 2 + 64);
        write_frame_header(&mut out, self.checksum, None, Some(data.len() as u64));

        if data.is_empty() {
            out.extend_from_slice(&write_block_header(true, BlockType::Raw, 0));
        } else {
            let mut offset = 0;
            while offset < data.len() {
                let chunk_len = core::cmp::min(MAX_BLOCK_SIZE as usize, data.len() - offset);
                let chunk = &data[offset..offset + chunk_len];
                offset += chunk_len;
                let last = offset == data.len();
                encode_block(chunk, last, &mut out);
            }
        }

        #[cfg(feature = "hash")]
        if self.checksum {
            let mut hasher = XxHash64::with_seed(0);
            hasher.write(data);
            let checksum = (hasher.finish() & 0xFFFF_FFFF) as u32;
            out.extend_from_slice(&checksum.to_le_bytes());
        }

        out
    }
}

fn encode_block(chunk: &[u8], last: bool, out: &mut Vec<u8>) {
    if let Some(byte) = rle_byte(chunk) {
        out.extend_from_slice(&write_block_header(last, BlockType::RLE, chunk.len() as u32));
        out.push(byte);
        return;
    }

    let mut body = Vec::new();
    if should_attempt_huffman(chunk) {
        if let Ok(compressed) = try_huffman_literal_block(chunk) {
            if compressed.len() < chunk.len() {
                body = compressed;
            }
        }
    }
    if body.is_empty() {
        encode_literals(chunk, None, &mut body).expect("raw literal encoding never fails");
        write_sequences_header(0, None, &mut body);
    }

    if body.len() < chunk.len() {
        out.extend_from_slice(&write_block_header(last, BlockType::Compressed, body.len() as u32));
        out.extend_from_slice(&body);
    } else {
        out.extend_from_slice(&write_block_header(last, BlockType::Raw, chunk.len() as u32));
        out.extend_from_slice(chunk);
    }
}

fn rle_byte(chunk: &[u8]) -> Option<u8> {
    let first = *chunk.first()?;
    if chunk.iter().all(|b| *b == first) {
        Some(first)
    } else {
        None
    }
}

/// Whether Huffman-compressing these literals is worth attempting at
/// all: long enough, and skewed enough in frequency to plausibly beat
/// the raw encoding.
fn should_attempt_huffman(literals: &[u8]) -> bool {
    if literals.len() < 64 {
        return false;
    }
    let mut counts = [0usize; 256];
    for byte in literals {
        counts[*byte as usize] += 1;
    }
    let max_count = counts.iter().copied().max().unwrap_or(0);
    max_count < literals.len() && max_count > literals.len() / 128 + 4
}

fn try_huffman_literal_block(literals: &[u8]) -> Result<Vec<u8>, Error> {
    let mut counts = [0usize; 256];
    for byte in literals {
        counts[*byte as usize] += 1;
    }
    let table = HuffmanTable::from_counts(&counts);

    let mut body = Vec::new();
    encode_literals(literals, Some(&table), &mut body)?;
    write_sequences_header(0, None, &mut body);
    Ok(body)
}

/// Compress `data` into a complete single-frame Zstandard stream at the
/// given level, with a trailing xxhash64 content checksum.
pub fn compress(data: &[u8], level: CompressionLevel) -> Vec<u8> {
    FrameCompressor::new(level).compress(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zstd::decoder::decompress;

    fn round_trip(data: &[u8]) {
        let compressed = compress(data, CompressionLevel::Fast);
        let mut source: &[u8] = &compressed;
        let decompressed = decompress(&mut source).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn round_trips_empty_input() {
        round_trip(b"");
    }

    #[test]
    fn round_trips_an_rle_run() {
        round_trip(&[b'a'; 300]);
    }

    #[test]
    fn round_trips_incompressible_data() {
        let data: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        round_trip(&data);
    }

    #[test]
    fn round_trips_skewed_text() {
        let data = "the quick brown fox jumps over the lazy dog, the dog barked back at the fox repeatedly and loudly"
            .repeat(4)
            .into_bytes();
        round_trip(&data);
    }

    #[test]
    fn emits_rle_block_for_constant_input() {
        let compressed = compress(&[7u8; 50], CompressionLevel::Fast);
        // magic(4) + descriptor(1) + fcs(1, value<256) + block header(3) + 1 RLE byte
        assert_eq!(compressed.len() - 4, 1 + 1 + 3 + 1);
    }

    #[test]
    fn matches_the_documented_empty_frame_bytes() {
        let compressed = compress(b"", CompressionLevel::Fast);
        assert_eq!(
            compressed,
            vec![0x28, 0xB5, 0x2F, 0xFD, 0x20, 0x00, 0x01, 0x00, 0x00]
        );
    }

    #[test]
    fn with_checksum_appends_a_trailer() {
        let compressed = FrameCompressor::new(CompressionLevel::Fast).with_checksum(true).compress(b"hello");
        let mut source: &[u8] = &compressed;
        assert_eq!(decompress(&mut source).unwrap(), b"hello");
    }
}
