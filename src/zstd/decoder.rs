//! Drives a full Zstandard frame: reads the frame header, then decodes
//! blocks one at a time into a [`SlidingWindow`], verifying the trailing
//! content checksum and declared content size once the last block has
//! been seen.

use alloc::vec::Vec;

use crate::error::Error;
use crate::io::Read;
use crate::zstd::block::{parse_block_header, BlockType};
use crate::zstd::dictionary::ZstdDictionary;
use crate::zstd::frame::{read_frame_header, FrameHeader, FrameOrSkippable};
use crate::zstd::literals::{decode_literals, parse_literals_header, LiteralsSectionType};
use crate::zstd::sequences::{decode_sequences, execute_sequences, RepeatOffsets, SequenceFseTables, Sequence};
use crate::zstd::window::SlidingWindow;

#[cfg(feature = "hash")]
use twox_hash::XxHash64;
#[cfg(feature = "hash")]
use core::hash::Hasher;

enum State {
    AwaitingHeader,
    Running,
    Finished,
}

/// Decodes a single Zstandard frame against an `io::Read` source,
/// exposing the result as a growing output buffer.
pub struct FrameDecoder {
    state: State,
    header: Option<FrameHeader>,
    window: SlidingWindow,
    huffman_table: crate::huff0::decoder::HuffmanTable,
    fse_tables: SequenceFseTables,
    repeat_offsets: RepeatOffsets,
    sequence_scratch: Vec<Sequence>,
    literals_scratch: Vec<u8>,
    block_scratch: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        FrameDecoder {
            state: State::AwaitingHeader,
            header: None,
            window: SlidingWindow::new(0),
            huffman_table: crate::huff0::decoder::HuffmanTable::new(),
            fse_tables: SequenceFseTables::default(),
            repeat_offsets: RepeatOffsets::default(),
            sequence_scratch: Vec::new(),
            literals_scratch: Vec::new(),
            block_scratch: Vec::new(),
        }
    }

    /// Read and validate the frame header, skipping any skippable frames
    /// that precede it. Must be called before [`Self::decode_blocks`].
    pub fn init(&mut self, source: &mut dyn Read, dictionary: Option<&ZstdDictionary>) -> Result<(), Error> {
        let header = loop {
            match read_frame_header(source)? {
                FrameOrSkippable::Skippable { length, .. } => {
                    let mut buf = [0u8; 256];
                    let mut remaining = length as usize;
                    while remaining > 0 {
                        let take = remaining.min(buf.len());
                        source.read_exact(&mut buf[..take]).map_err(Error::from)?;
                        remaining -= take;
                    }
                }
                FrameOrSkippable::Frame { frame, .. } => break frame.header,
            }
        };

        let window_size = header.window_size()?;
        self.window = SlidingWindow::new(window_size as usize);

        if let Some(dict_id) = header.dict_id {
            match dictionary {
                Some(dict) if dict.id == dict_id => {
                    self.window.prime_history(&dict.content);
                    self.repeat_offsets = dict.repeat_offsets;
                    self.huffman_table = dict.huffman_table.clone();
                    self.fse_tables.literal_lengths = dict.literal_lengths_table.clone();
                    self.fse_tables.match_lengths = dict.match_lengths_table.clone();
                    self.fse_tables.offsets = dict.offsets_table.clone();
                }
                Some(_) => {
                    return Err(Error::DictionaryMissing { dict_id });
                }
                None => return Err(Error::DictionaryMissing { dict_id }),
            }
        }

        self.header = Some(header);
        self.state = State::Running;
        Ok(())
    }

    /// Decode every remaining block in the frame, including verifying
    /// the trailing checksum if the frame descriptor requested one.
    pub fn decode_blocks(&mut self, source: &mut dyn Read) -> Result<(), Error> {
        match self.state {
            State::Finished => return Ok(()),
            State::AwaitingHeader => {
                return Err(Error::Unsupported {
                    context: "decode_blocks called before init",
                })
            }
            State::Running => {}
        }

        loop {
            let mut header_bytes = [0u8; 3];
            source.read_exact(&mut header_bytes).map_err(Error::from)?;
            let window_size = self
                .header
                .as_ref()
                .expect("Running state implies header is set")
                .window_size()?;
            let block_header = parse_block_header(header_bytes, window_size)?;

            match block_header.block_type {
                BlockType::Raw => {
                    self.block_scratch.resize(block_header.content_size as usize, 0);
                    source.read_exact(&mut self.block_scratch).map_err(Error::from)?;
                    self.window.push(&self.block_scratch);
                }
                BlockType::RLE => {
                    let mut byte = [0u8; 1];
                    source.read_exact(&mut byte).map_err(Error::from)?;
                    let run = alloc::vec![byte[0]; block_header.decompressed_size as usize];
                    self.window.push(&run);
                }
                BlockType::Compressed => {
                    self.block_scratch.resize(block_header.content_size as usize, 0);
                    source.read_exact(&mut self.block_scratch).map_err(Error::from)?;
                    self.decode_compressed_block()?;
                }
                BlockType::Reserved => unreachable!("parse_block_header rejects this"),
            }

            if block_header.last_block {
                self.finish(source)?;
                break;
            }
        }
        Ok(())
    }

    fn decode_compressed_block(&mut self) -> Result<(), Error> {
        let raw = self.block_scratch.clone();
        let (lit_header, lit_header_size) = parse_literals_header(&raw)?;
        let raw_after_lit_header = &raw[lit_header_size as usize..];

        let upper_limit = match lit_header.compressed_size {
            Some(size) => size as usize,
            None => match lit_header.ls_type {
                LiteralsSectionType::RLE => 1,
                LiteralsSectionType::Raw => lit_header.regenerated_size as usize,
                _ => unreachable!(),
            },
        };
        if raw_after_lit_header.len() < upper_limit {
            return Err(Error::TruncatedInput {
                need: upper_limit - raw_after_lit_header.len(),
                have: raw_after_lit_header.len(),
            });
        }

        let literals_raw = &raw_after_lit_header[..upper_limit];
        self.literals_scratch.clear();
        decode_literals(&lit_header, &mut self.huffman_table, literals_raw, &mut self.literals_scratch)?;

        let raw_after_literals = &raw_after_lit_header[upper_limit..];
        let (seq_header, seq_header_size) = crate::zstd::sequences::parse_sequences_header(raw_after_literals)?;
        let raw_sequences = &raw_after_literals[seq_header_size as usize..];

        if seq_header.num_sequences == 0 {
            self.window.push(&self.literals_scratch);
            return Ok(());
        }

        decode_sequences(&seq_header, raw_sequences, &mut self.fse_tables, &mut self.sequence_scratch)?;
        let sequences = core::mem::take(&mut self.sequence_scratch);
        execute_sequences(&sequences, &self.literals_scratch, &mut self.repeat_offsets, &mut self.window)?;
        self.sequence_scratch = sequences;
        Ok(())
    }

    fn finish(&mut self, source: &mut dyn Read) -> Result<(), Error> {
        let header = self.header.as_ref().expect("frame header must be set");

        if header.descriptor.content_checksum_flag() {
            let mut checksum_bytes = [0u8; 4];
            source.read_exact(&mut checksum_bytes).map_err(Error::from)?;
            #[cfg(feature = "hash")]
            {
                let mut hasher = XxHash64::with_seed(0);
                hasher.write(self.window.as_slice());
                let got = (hasher.finish() & 0xFFFF_FFFF) as u32;
                let expected = u32::from_le_bytes(checksum_bytes);
                if got != expected {
                    return Err(Error::ChecksumMismatch { expected, got });
                }
            }
        }

        if let Some(expected) = header.frame_content_size {
            let produced = self.window.len() as u64;
            if expected != produced {
                return Err(Error::ContentSizeMismatch { declared: expected, produced });
            }
        }

        self.state = State::Finished;
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, State::Finished)
    }

    /// Take the fully decoded output, leaving the internal window empty.
    pub fn into_output(mut self) -> Vec<u8> {
        self.window.drain_all()
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Decompress a complete single-frame Zstandard stream.
pub fn decompress(source: &mut dyn Read) -> Result<Vec<u8>, Error> {
    decompress_with_dictionary(source, None)
}

pub fn decompress_with_dictionary(
    source: &mut dyn Read,
    dictionary: Option<&ZstdDictionary>,
) -> Result<Vec<u8>, Error> {
    let mut decoder = FrameDecoder::new();
    decoder.init(source, dictionary)?;
    decoder.decode_blocks(source)?;
    Ok(decoder.into_output())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decompresses_a_single_raw_block_frame() {
        let mut bytes = Vec::new();
        crate::zstd::frame::write_frame_header(&mut bytes, false, None, Some(5));
        bytes.extend_from_slice(&crate::zstd::block::write_block_header(
            true,
            BlockType::Raw,
            5,
        ));
        bytes.extend_from_slice(b"hello");

        let mut source: &[u8] = &bytes;
        let out = decompress(&mut source).unwrap();
        assert_eq!(out, b"hello");
    }

    #[test]
    fn decompresses_an_rle_block_frame() {
        let mut bytes = Vec::new();
        crate::zstd::frame::write_frame_header(&mut bytes, false, None, Some(4));
        bytes.extend_from_slice(&crate::zstd::block::write_block_header(
            true,
            BlockType::RLE,
            4,
        ));
        bytes.push(b'z');

        let mut source: &[u8] = &bytes;
        let out = decompress(&mut source).unwrap();
        assert_eq!(out, b"zzzz");
    }

    #[cfg(feature = "hash")]
    #[test]
    fn flipped_checksum_trailer_byte_is_rejected() {
        use crate::zstd::encoder::{CompressionLevel, FrameCompressor};

        let mut compressed = FrameCompressor::new(CompressionLevel::Fast)
            .with_checksum(true)
            .compress(b"hello world");
        let last = compressed.len() - 1;
        compressed[last] ^= 0xFF;

        let mut source: &[u8] = &compressed;
        let err = decompress(&mut source).unwrap_err();
        assert!(matches!(err, Error::ChecksumMismatch { .. }));
    }
}
