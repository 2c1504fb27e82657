//! The 3-byte Zstandard block header and the four block types.

use crate::common::MAX_BLOCK_SIZE;
use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    Raw,
    RLE,
    Compressed,
    Reserved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub last_block: bool,
    pub block_type: BlockType,
    /// For `Raw`/`Compressed`, the number of bytes in the block body.
    /// For `RLE`, always 1 (the single repeated byte).
    pub content_size: u32,
    /// The number of bytes the block expands to once decoded.
    pub decompressed_size: u32,
}

/// Parse a 3-byte block header. `window_size` bounds the maximum allowed
/// block size alongside the format's hard 128KiB cap.
pub fn parse_block_header(bytes: [u8; 3], window_size: u64) -> Result<BlockHeader, Error> {
    let last_block = bytes[0] & 0x1 == 1;
    let type_bits = (bytes[0] >> 1) & 0x3;
    let block_size = ((bytes[0] >> 3) as u32) | ((bytes[1] as u32) << 5) | ((bytes[2] as u32) << 13);

    let block_type = match type_bits {
        0 => BlockType::Raw,
        1 => BlockType::RLE,
        2 => BlockType::Compressed,
        3 => BlockType::Reserved,
        _ => unreachable!(),
    };

    if block_type == BlockType::Reserved {
        return Err(Error::ReservedBit {
            context: "block type field is the reserved value 3",
        });
    }

    let block_size_max = core::cmp::min(window_size, MAX_BLOCK_SIZE as u64) as u32;
    if matches!(block_type, BlockType::Raw | BlockType::Compressed) && block_size > block_size_max
    {
        return Err(Error::Unsupported {
            context: "block content size exceeds the maximum allowed block size",
        });
    }

    let (content_size, decompressed_size) = match block_type {
        BlockType::Raw => (block_size, block_size),
        BlockType::RLE => (1, block_size),
        BlockType::Compressed => (block_size, 0),
        BlockType::Reserved => unreachable!(),
    };

    Ok(BlockHeader {
        last_block,
        block_type,
        content_size,
        decompressed_size,
    })
}

/// Serialize a block header. `content_size` is the on-wire body length:
/// for `RLE` blocks this is the decompressed length, not 1.
pub fn write_block_header(
    last_block: bool,
    block_type: BlockType,
    content_size: u32,
) -> [u8; 3] {
    let type_bits: u8 = match block_type {
        BlockType::Raw => 0,
        BlockType::RLE => 1,
        BlockType::Compressed => 2,
        BlockType::Reserved => 3,
    };

    let mut header = [0u8; 3];
    header[0] = (last_block as u8) | (type_bits << 1) | (((content_size & 0x1F) as u8) << 3);
    header[1] = ((content_size >> 5) & 0xFF) as u8;
    header[2] = ((content_size >> 13) & 0xFF) as u8;
    header
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_compressed_block_header() {
        let header = write_block_header(true, BlockType::Compressed, 12345);
        let parsed = parse_block_header(header, 1 << 20).unwrap();
        assert!(parsed.last_block);
        assert_eq!(parsed.block_type, BlockType::Compressed);
        assert_eq!(parsed.content_size, 12345);
    }

    #[test]
    fn rle_block_reports_decompressed_size() {
        let header = write_block_header(false, BlockType::RLE, 500);
        let parsed = parse_block_header(header, 1 << 20).unwrap();
        assert_eq!(parsed.block_type, BlockType::RLE);
        assert_eq!(parsed.content_size, 1);
        assert_eq!(parsed.decompressed_size, 500);
    }

    #[test]
    fn rejects_reserved_block_type() {
        let header = [0b0000_0110, 0, 0];
        assert!(parse_block_header(header, 1 << 20).is_err());
    }

    #[test]
    fn rejects_block_bigger_than_window() {
        let header = write_block_header(false, BlockType::Raw, 5000);
        assert!(parse_block_header(header, 1024).is_err());
    }
}
