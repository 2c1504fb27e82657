//! The literals section: the (possibly Huffman-compressed) stream of
//! literal bytes a block's sequences are assembled around.

use alloc::vec::Vec;

use crate::bit::reverse_reader::BitReaderReversed;
use crate::bit::writer::BitWriter;
use crate::error::Error;
use crate::huff0::{decoder::HuffmanTable as HuffDecTable, encoder::HuffmanTable as HuffEncTable, HuffmanDecoder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralsSectionType {
    Raw,
    RLE,
    Compressed,
    /// Reuses the Huffman table built by a previous `Compressed` section
    /// in the same frame.
    Treeless,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiteralsSectionHeader {
    pub ls_type: LiteralsSectionType,
    pub regenerated_size: u32,
    pub compressed_size: Option<u32>,
    pub num_streams: Option<u8>,
}

/// Parse a literals section header from the start of `source`, returning
/// the header and the number of bytes it occupied.
pub fn parse_literals_header(source: &[u8]) -> Result<(LiteralsSectionHeader, u8), Error> {
    if source.is_empty() {
        return Err(Error::TruncatedInput { need: 1, have: 0 });
    }

    let byte0 = source[0] as u32;
    let type_bits = byte0 & 0x3;
    let size_format = (byte0 >> 2) & 0x3;

    let ls_type = match type_bits {
        0 => LiteralsSectionType::Raw,
        1 => LiteralsSectionType::RLE,
        2 => LiteralsSectionType::Compressed,
        3 => LiteralsSectionType::Treeless,
        _ => unreachable!(),
    };

    match ls_type {
        LiteralsSectionType::Raw | LiteralsSectionType::RLE => {
            if size_format & 0x1 == 0 {
                let regenerated_size = byte0 >> 3;
                Ok((
                    LiteralsSectionHeader {
                        ls_type,
                        regenerated_size,
                        compressed_size: None,
                        num_streams: None,
                    },
                    1,
                ))
            } else if size_format == 0b01 {
                require(source, 2)?;
                let value = byte0 | ((source[1] as u32) << 8);
                Ok((
                    LiteralsSectionHeader {
                        ls_type,
                        regenerated_size: value >> 4,
                        compressed_size: None,
                        num_streams: None,
                    },
                    2,
                ))
            } else {
                require(source, 3)?;
                let value = byte0 | ((source[1] as u32) << 8) | ((source[2] as u32) << 16);
                Ok((
                    LiteralsSectionHeader {
                        ls_type,
                        regenerated_size: value >> 4,
                        compressed_size: None,
                        num_streams: None,
                    },
                    3,
                ))
            }
        }
        LiteralsSectionType::Compressed | LiteralsSectionType::Treeless => {
            match size_format {
                0 | 1 => {
                    require(source, 3)?;
                    let value = byte0 | ((source[1] as u32) << 8) | ((source[2] as u32) << 16);
                    let regenerated_size = (value >> 4) & 0x3FF;
                    let compressed_size = (value >> 14) & 0x3FF;
                    let num_streams = if size_format == 0 { 1 } else { 4 };
                    Ok((
                        LiteralsSectionHeader {
                            ls_type,
                            regenerated_size,
                            compressed_size: Some(compressed_size),
                            num_streams: Some(num_streams),
                        },
                        3,
                    ))
                }
                2 => {
                    require(source, 4)?;
                    let value = byte0
                        | ((source[1] as u32) << 8)
                        | ((source[2] as u32) << 16)
                        | ((source[3] as u32) << 24);
                    let regenerated_size = (value >> 4) & 0x3FFF;
                    let compressed_size = (value >> 18) & 0x3FFF;
                    Ok((
                        LiteralsSectionHeader {
                            ls_type,
                            regenerated_size,
                            compressed_size: Some(compressed_size),
                            num_streams: Some(4),
                        },
                        4,
                    ))
                }
                3 => {
                    require(source, 5)?;
                    let mut value: u64 = 0;
                    for (i, byte) in source[..5].iter().enumerate() {
                        value |= (*byte as u64) << (8 * i);
                    }
                    let regenerated_size = ((value >> 4) & 0x3FFFF) as u32;
                    let compressed_size = ((value >> 22) & 0x3FFFF) as u32;
                    Ok((
                        LiteralsSectionHeader {
                            ls_type,
                            regenerated_size,
                            compressed_size: Some(compressed_size),
                            num_streams: Some(4),
                        },
                        5,
                    ))
                }
                _ => unreachable!(),
            }
        }
    }
}

fn require(source: &[u8], n: usize) -> Result<(), Error> {
    if source.len() < n {
        Err(Error::TruncatedInput {
            need: n - source.len(),
            have: source.len(),
        })
    } else {
        Ok(())
    }
}

/// Decode the body (everything after the header) of a literals section
/// into `target`, given an already-parsed header. For `Compressed`
/// sections this builds a fresh Huffman table into `huff_table`; for
/// `Treeless` it reuses whatever table is already there.
pub fn decode_literals(
    header: &LiteralsSectionHeader,
    huff_table: &mut HuffDecTable,
    source: &[u8],
    target: &mut Vec<u8>,
) -> Result<u32, Error> {
    match header.ls_type {
        LiteralsSectionType::Raw => {
            require(source, header.regenerated_size as usize)?;
            target.extend_from_slice(&source[..header.regenerated_size as usize]);
            Ok(header.regenerated_size)
        }
        LiteralsSectionType::RLE => {
            require(source, 1)?;
            target.resize(target.len() + header.regenerated_size as usize, source[0]);
            Ok(1)
        }
        LiteralsSectionType::Compressed | LiteralsSectionType::Treeless => {
            decompress_huffman_literals(header, huff_table, source, target)
        }
    }
}

fn decompress_huffman_literals(
    header: &LiteralsSectionHeader,
    huff_table: &mut HuffDecTable,
    source: &[u8],
    target: &mut Vec<u8>,
) -> Result<u32, Error> {
    let compressed_size = header.compressed_size.ok_or_else(|| Error::InvalidTable {
        context: "compressed literals section is missing a compressed size".into(),
    })? as usize;
    let num_streams = header.num_streams.ok_or_else(|| Error::InvalidTable {
        context: "compressed literals section is missing a stream count".into(),
    })?;

    require(source, compressed_size)?;
    let source = &source[..compressed_size];
    let mut bytes_read = 0u32;

    match header.ls_type {
        LiteralsSectionType::Compressed => {
            bytes_read += huff_table.build_decoder(source)?;
        }
        LiteralsSectionType::Treeless => {
            if huff_table.max_num_bits == 0 {
                return Err(Error::InvalidTable {
                    context: "treeless literals section with no prior Huffman table".into(),
                });
            }
        }
        _ => unreachable!(),
    }

    let source = &source[bytes_read as usize..];
    target.reserve(header.regenerated_size as usize);

    if num_streams == 4 {
        require(source, 6)?;
        let jump1 = source[0] as usize + ((source[1] as usize) << 8);
        let jump2 = jump1 + source[2] as usize + ((source[3] as usize) << 8);
        let jump3 = jump2 + source[4] as usize + ((source[5] as usize) << 8);
        bytes_read += 6;
        let source = &source[6..];
        require(source, jump3)?;

        let stream1 = &source[..jump1];
        let stream2 = &source[jump1..jump2];
        let stream3 = &source[jump2..jump3];
        let stream4 = &source[jump3..];

        for stream in [stream1, stream2, stream3, stream4] {
            decode_one_huffman_stream(huff_table, stream, target)?;
        }
        bytes_read += source.len() as u32;
    } else {
        decode_one_huffman_stream(huff_table, source, target)?;
        bytes_read += source.len() as u32;
    }

    if target.len() != header.regenerated_size as usize {
        return Err(Error::InvalidBackReference {
            context: alloc::format!(
                "decoded {} literal bytes but header declared {}",
                target.len(),
                header.regenerated_size
            ),
        });
    }

    Ok(bytes_read)
}

fn decode_one_huffman_stream(
    table: &HuffDecTable,
    stream: &[u8],
    target: &mut Vec<u8>,
) -> Result<(), Error> {
    let mut br = BitReaderReversed::new(stream);
    br.skip_sentinel()?;

    let mut decoder = HuffmanDecoder::new(table);
    decoder.init_state(&mut br)?;

    while br.bits_remaining() > -(table.max_num_bits as isize) {
        target.push(decoder.decode_symbol());
        decoder.next_state(&mut br)?;
    }

    Ok(())
}

/// Encode a literals section (header + body) into `out`. Chooses between
/// Raw and Huffman-compressed form by comparing the compressed size
/// against the raw size; callers that have already decided RLE should
/// call [`encode_rle_literals`] instead.
pub fn encode_literals(
    data: &[u8],
    huff_table: Option<&HuffEncTable>,
    out: &mut Vec<u8>,
) -> Result<(), Error> {
    match huff_table {
        Some(table) => encode_compressed_literals(data, table, out),
        None => {
            encode_raw_literals(data, out);
            Ok(())
        }
    }
}

pub fn encode_raw_literals(data: &[u8], out: &mut Vec<u8>) {
    write_raw_or_rle_header(LiteralsSectionType::Raw, data.len() as u32, out);
    out.extend_from_slice(data);
}

pub fn encode_rle_literals(byte: u8, len: u32, out: &mut Vec<u8>) {
    write_raw_or_rle_header(LiteralsSectionType::RLE, len, out);
    out.push(byte);
}

fn write_raw_or_rle_header(ls_type: LiteralsSectionType, regenerated_size: u32, out: &mut Vec<u8>) {
    let type_bits: u8 = match ls_type {
        LiteralsSectionType::Raw => 0,
        LiteralsSectionType::RLE => 1,
        _ => unreachable!(),
    };

    if regenerated_size < 32 {
        out.push(type_bits | ((regenerated_size as u8) << 3));
    } else if regenerated_size < 4096 {
        let value = (type_bits as u32) | (0b01 << 2) | (regenerated_size << 4);
        out.push((value & 0xFF) as u8);
        out.push(((value >> 8) & 0xFF) as u8);
    } else {
        let value = (type_bits as u32) | (0b11 << 2) | (regenerated_size << 4);
        out.push((value & 0xFF) as u8);
        out.push(((value >> 8) & 0xFF) as u8);
        out.push(((value >> 16) & 0xFF) as u8);
    }
}

fn encode_compressed_literals(
    data: &[u8],
    table: &HuffEncTable,
    out: &mut Vec<u8>,
) -> Result<(), Error> {
    let mut huff_table_bytes = Vec::new();
    table.write_weights_raw(&mut huff_table_bytes)?;

    let mut writer = BitWriter::new();
    table.encode(data, &mut writer);
    writer.close_with_terminator();
    let stream = writer.dump();

    let body_len = huff_table_bytes.len() + stream.len();
    let regenerated_size = data.len() as u32;
    let compressed_size = body_len as u32;

    write_compressed_header(
        LiteralsSectionType::Compressed,
        regenerated_size,
        compressed_size,
        1,
        out,
    );
    out.extend_from_slice(&huff_table_bytes);
    out.extend_from_slice(&stream);
    Ok(())
}

fn write_compressed_header(
    ls_type: LiteralsSectionType,
    regenerated_size: u32,
    compressed_size: u32,
    num_streams: u8,
    out: &mut Vec<u8>,
) {
    let type_bits: u8 = match ls_type {
        LiteralsSectionType::Compressed => 2,
        LiteralsSectionType::Treeless => 3,
        _ => unreachable!(),
    };
    let size_format: u32 = if num_streams == 1 { 0 } else { 1 };

    let value: u32 = (type_bits as u32) | (size_format << 2) | (regenerated_size << 4) | (compressed_size << 14);
    out.push((value & 0xFF) as u8);
    out.push(((value >> 8) & 0xFF) as u8);
    out.push(((value >> 16) & 0xFF) as u8);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_raw_header_with_small_size() {
        let mut out = Vec::new();
        encode_raw_literals(b"hello", &mut out);
        let (header, used) = parse_literals_header(&out).unwrap();
        assert_eq!(header.ls_type, LiteralsSectionType::Raw);
        assert_eq!(header.regenerated_size, 5);
        assert_eq!(used, 1);
    }

    #[test]
    fn round_trips_a_raw_header_with_large_size() {
        let data = alloc::vec![7u8; 5000];
        let mut out = Vec::new();
        encode_raw_literals(&data, &mut out);
        let (header, used) = parse_literals_header(&out).unwrap();
        assert_eq!(header.regenerated_size, 5000);
        assert_eq!(used, 3);
    }

    #[test]
    fn decodes_a_raw_section() {
        let mut out = Vec::new();
        encode_raw_literals(b"abcdef", &mut out);
        let (header, used) = parse_literals_header(&out).unwrap();
        let mut table = HuffDecTable::new();
        let mut target = Vec::new();
        decode_literals(&header, &mut table, &out[used as usize..], &mut target).unwrap();
        assert_eq!(target, b"abcdef");
    }

    #[test]
    fn decodes_an_rle_section() {
        let mut out = Vec::new();
        encode_rle_literals(b'x', 4, &mut out);
        let (header, used) = parse_literals_header(&out).unwrap();
        let mut table = HuffDecTable::new();
        let mut target = Vec::new();
        decode_literals(&header, &mut table, &out[used as usize..], &mut target).unwrap();
        assert_eq!(target, b"xxxx");
    }

    #[test]
    fn round_trips_a_huffman_compressed_section() {
        let data: Vec<u8> = b"abababababababababababababaabbbbbc".to_vec();
        let mut counts = [0usize; 256];
        for b in &data {
            counts[*b as usize] += 1;
        }
        let enc_table = HuffEncTable::from_counts(&counts);

        let mut out = Vec::new();
        encode_literals(&data, Some(&enc_table), &mut out).unwrap();

        let (header, used) = parse_literals_header(&out).unwrap();
        assert_eq!(header.ls_type, LiteralsSectionType::Compressed);

        let mut dec_table = HuffDecTable::new();
        let mut target = Vec::new();
        decode_literals(&header, &mut dec_table, &out[used as usize..], &mut target).unwrap();
        assert_eq!(target, data);
    }
}
