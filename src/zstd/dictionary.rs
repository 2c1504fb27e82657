//! Parsing for Zstandard dictionaries: a magic number, a dictionary id,
//! predefined FSE/Huffman tables, a seeded repeat-offset ring, and raw
//! content that primes the window before the first block.

use alloc::vec::Vec;

use crate::error::Error;
use crate::fse::FSETable;
use crate::huff0::decoder::HuffmanTable;
use crate::zstd::sequences::RepeatOffsets;

pub const DICTIONARY_MAGIC: [u8; 4] = [0x37, 0xA4, 0x30, 0xEC];

const OF_MAX_LOG: u8 = 8;
const ML_MAX_LOG: u8 = 9;
const LL_MAX_LOG: u8 = 9;

pub struct ZstdDictionary {
    pub id: u32,
    pub huffman_table: HuffmanTable,
    pub offsets_table: FSETable,
    pub match_lengths_table: FSETable,
    pub literal_lengths_table: FSETable,
    pub repeat_offsets: RepeatOffsets,
    pub content: Vec<u8>,
}

impl ZstdDictionary {
    pub fn parse(raw: &[u8]) -> Result<ZstdDictionary, Error> {
        if raw.len() < 8 {
            return Err(Error::TruncatedInput {
                need: 8 - raw.len(),
                have: raw.len(),
            });
        }

        let magic = &raw[..4];
        if magic != DICTIONARY_MAGIC {
            return Err(Error::InvalidMagic {
                got: u32::from_le_bytes(magic.try_into().unwrap()),
            });
        }

        let id = u32::from_le_bytes(raw[4..8].try_into().unwrap());
        let raw_tables = &raw[8..];

        let mut huffman_table = HuffmanTable::new();
        let huf_size = huffman_table.build_decoder(raw_tables)?;
        let raw_tables = &raw_tables[huf_size as usize..];

        let mut offsets_table = FSETable::new(32);
        let of_size = offsets_table.build_decoder(raw_tables, OF_MAX_LOG)?;
        let raw_tables = &raw_tables[of_size..];

        let mut match_lengths_table = FSETable::new(53);
        let ml_size = match_lengths_table.build_decoder(raw_tables, ML_MAX_LOG)?;
        let raw_tables = &raw_tables[ml_size..];

        let mut literal_lengths_table = FSETable::new(36);
        let ll_size = literal_lengths_table.build_decoder(raw_tables, LL_MAX_LOG)?;
        let raw_tables = &raw_tables[ll_size..];

        if raw_tables.len() < 12 {
            return Err(Error::TruncatedInput {
                need: 12 - raw_tables.len(),
                have: raw_tables.len(),
            });
        }
        let offset1 = u32::from_le_bytes(raw_tables[0..4].try_into().unwrap());
        let offset2 = u32::from_le_bytes(raw_tables[4..8].try_into().unwrap());
        let offset3 = u32::from_le_bytes(raw_tables[8..12].try_into().unwrap());

        let content = raw_tables[12..].to_vec();

        Ok(ZstdDictionary {
            id,
            huffman_table,
            offsets_table,
            match_lengths_table,
            literal_lengths_table,
            repeat_offsets: RepeatOffsets { offset1, offset2, offset3 },
            content,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_magic() {
        let raw = [0u8; 16];
        assert!(ZstdDictionary::parse(&raw).is_err());
    }

    #[test]
    fn rejects_truncated_header() {
        let raw = DICTIONARY_MAGIC;
        assert!(ZstdDictionary::parse(&raw).is_err());
    }
}
