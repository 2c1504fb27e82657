//! A Brotli encoder: each chunk of input is turned into a sequence of
//! insert-and-copy commands (literal runs interleaved with back-references
//! into the chunk already produced), using a single-slot hash table to
//! find matches the way [`crate::zstd`]'s encoder side doesn't need to
//! (its own format handles matching upstream of this crate).

use alloc::vec::Vec;

use crate::bit::writer::BitWriter;
use crate::brotli::huffman::{build_lengths, canonical_codes, write_tree, MAX_CODE_LENGTH};
use crate::brotli::tables::{
    copy_length_code, encode_distance_code, explicit_command_code, insert_length_code, DistanceCache,
    DISTANCE_ALPHABET_SIZE, INSERT_LENGTH_CODES,
};

/// Largest chunk a single meta-block can carry: six nibbles of
/// `length - 1` caps the encodable length at 2^24.
pub const MAX_CHUNK_LEN: usize = 1 << 24;

/// Matches shorter than this aren't worth a command's fixed overhead.
const MIN_MATCH_LEN: usize = 4;

pub struct BrotliEncoder {
    window_bits: u8,
}

impl BrotliEncoder {
    pub fn new() -> Self {
        BrotliEncoder { window_bits: 24 }
    }

    pub fn compress_literal(&self, data: &[u8]) -> Vec<u8> {
        let mut writer = BitWriter::new();
        write_window_bits_preamble(self.window_bits, &mut writer);

        if data.is_empty() {
            close_stream(&mut writer);
            writer.close_with_terminator();
            return writer.dump();
        }

        let mut offset = 0;
        while offset < data.len() {
            let chunk_len = core::cmp::min(MAX_CHUNK_LEN, data.len() - offset);
            let chunk = &data[offset..offset + chunk_len];
            offset += chunk_len;
            write_meta_block(chunk, &mut writer);
        }

        close_stream(&mut writer);
        writer.close_with_terminator();
        writer.dump()
    }
}

impl Default for BrotliEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// One insert-and-copy command: insert `insert_len` literal bytes from
/// the chunk, then (unless this is the chunk's trailing command, where
/// `copy_len == 0`) copy `copy_len` bytes from `distance` bytes back in
/// the already-produced output.
struct Command {
    insert_len: u32,
    copy_len: u32,
    distance: u32,
}

/// Single-slot hash table over 4-byte suffixes, used to propose match
/// candidates. A collision just overwrites the older position, trading
/// thoroughness for an O(1), allocation-free lookup.
struct MatchFinder {
    slots: Vec<Option<usize>>,
    len_log: u32,
}

impl MatchFinder {
    fn with_capacity(data_len: usize) -> Self {
        let capacity = data_len.max(16).next_power_of_two();
        MatchFinder { slots: alloc::vec![None; capacity], len_log: capacity.ilog2() }
    }

    #[inline(always)]
    fn key(&self, suffix: &[u8]) -> usize {
        let s0 = suffix[0] as u64;
        let s1 = suffix[1] as u64;
        let s2 = suffix[2] as u64;
        let s3 = suffix[3] as u64;

        const POLY: u64 = 0xCF3BCCDCABu64;
        let s0 = (s0 << 32).wrapping_mul(POLY);
        let s1 = (s1 << 40).wrapping_mul(POLY);
        let s2 = (s2 << 48).wrapping_mul(POLY);
        let s3 = (s3 << 56).wrapping_mul(POLY);

        let index = s0 ^ s1 ^ s2 ^ s3;
        let index = index >> (64 - self.len_log);
        index as usize % self.slots.len()
    }

    #[inline(always)]
    fn get(&self, suffix: &[u8]) -> Option<usize> {
        self.slots[self.key(suffix)]
    }

    #[inline(always)]
    fn insert(&mut self, suffix: &[u8], idx: usize) {
        let key = self.key(suffix);
        self.slots[key] = Some(idx);
    }
}

/// Greedy match finder: scan left to right, taking the first candidate
/// the hash table proposes once it's at least [`MIN_MATCH_LEN`] long.
/// Always ends on a trailing zero-copy command so the meta-block's
/// final insert run (and the command stream as a whole) has a place to
/// land with no dangling distance to resolve.
fn build_commands(chunk: &[u8]) -> Vec<Command> {
    let mut commands = Vec::new();

    if chunk.len() < MIN_MATCH_LEN {
        commands.push(Command { insert_len: chunk.len() as u32, copy_len: 0, distance: 0 });
        return commands;
    }

    let mut finder = MatchFinder::with_capacity(chunk.len());
    let mut i = 0usize;
    let mut run_start = 0usize;

    while i + MIN_MATCH_LEN <= chunk.len() {
        let key_slice = &chunk[i..i + MIN_MATCH_LEN];
        let candidate = finder.get(key_slice);
        finder.insert(key_slice, i);

        let found = candidate.and_then(|pos| {
            let max_len = chunk.len() - i;
            let mut len = 0usize;
            while len < max_len && chunk[pos + len] == chunk[i + len] {
                len += 1;
            }
            if len >= MIN_MATCH_LEN && copy_length_code(len as u32).is_some() {
                Some((pos, len))
            } else {
                None
            }
        });

        match found {
            Some((pos, len)) => {
                commands.push(Command {
                    insert_len: (i - run_start) as u32,
                    copy_len: len as u32,
                    distance: (i - pos) as u32,
                });
                let end = i + len;
                let mut j = i + 1;
                while j < end && j + MIN_MATCH_LEN <= chunk.len() {
                    finder.insert(&chunk[j..j + MIN_MATCH_LEN], j);
                    j += 1;
                }
                i = end;
                run_start = end;
            }
            None => i += 1,
        }
    }

    commands.push(Command { insert_len: (chunk.len() - run_start) as u32, copy_len: 0, distance: 0 });
    commands
}

fn write_window_bits_preamble(window_bits: u8, out: &mut BitWriter) {
    match window_bits {
        16 => out.write_bool(false),
        17 => {
            out.write_bool(true);
            out.write_bits(0u8, 3);
            out.write_bits(0u8, 3);
        }
        18..=24 => {
            out.write_bool(true);
            out.write_bits(window_bits - 17, 3);
        }
        _ => panic!("unsupported Brotli window size"),
    }
}

fn write_meta_block(chunk: &[u8], out: &mut BitWriter) {
    out.write_bool(false); // isLast = 0

    let length = chunk.len() as u32;
    let value = length - 1;
    let bits_needed = 32 - value.leading_zeros().min(32);
    let nibbles_needed = bits_needed.div_ceil(4).max(1);
    let size_nibbles = nibbles_needed.clamp(4, 6);
    out.write_bits(size_nibbles - 4, 2);
    for i in 0..size_nibbles {
        let nibble = (value >> (i * 4)) & 0xF;
        out.write_bits(nibble, 4);
    }
    out.write_bool(false); // isUncompressed = 0

    out.write_bits(0u32, 13); // block-split trivia: one block type per category

    let commands = build_commands(chunk);

    let mut command_counts = [0usize; 704];
    let mut distance_counts = [0usize; DISTANCE_ALPHABET_SIZE];
    let mut literal_counts = [0usize; 256];
    let mut cache = DistanceCache::default();
    let mut cursor = 0usize;
    for cmd in &commands {
        let (insert_code, _, _) = insert_length_code(cmd.insert_len)
            .expect("insert length is bounded by the chunk, which the insert table covers");
        let copy_code = if cmd.copy_len > 0 {
            copy_length_code(cmd.copy_len).expect("match finder only proposes encodable copy lengths").0
        } else {
            0
        };
        command_counts[explicit_command_code(insert_code, copy_code) as usize] += 1;

        for &b in &chunk[cursor..cursor + cmd.insert_len as usize] {
            literal_counts[b as usize] += 1;
        }
        cursor += cmd.insert_len as usize;

        if cmd.copy_len > 0 {
            let (distance_code, _, _) = encode_distance_code(cmd.distance, &cache);
            distance_counts[distance_code as usize] += 1;
            if distance_code != 0 {
                cache.push(cmd.distance);
            }
            cursor += cmd.copy_len as usize;
        }
    }
    if distance_counts.iter().all(|&c| c == 0) {
        distance_counts[0] = 1;
    }

    let command_lengths = build_lengths(&command_counts, MAX_CODE_LENGTH);
    let literal_lengths = build_lengths(&literal_counts, MAX_CODE_LENGTH);
    let distance_lengths = build_lengths(&distance_counts, MAX_CODE_LENGTH);

    write_tree(&literal_lengths, out);
    write_tree(&command_lengths, out);
    write_tree(&distance_lengths, out);

    let command_codes = canonical_codes(&command_lengths);
    let literal_codes = canonical_codes(&literal_lengths);
    let distance_codes = canonical_codes(&distance_lengths);

    let mut cache = DistanceCache::default();
    let mut cursor = 0usize;
    for cmd in &commands {
        let (insert_code, insert_extra_bits, insert_extra_value) = insert_length_code(cmd.insert_len)
            .expect("insert length is bounded by the chunk, which the insert table covers");
        let (copy_code, copy_extra_bits, copy_extra_value) = if cmd.copy_len > 0 {
            copy_length_code(cmd.copy_len).expect("match finder only proposes encodable copy lengths")
        } else {
            (0u8, 0u32, 0u32)
        };

        let symbol = explicit_command_code(insert_code, copy_code) as usize;
        let (code, len) = command_codes[symbol];
        out.write_bits(code, len as usize);
        debug_assert_eq!(INSERT_LENGTH_CODES[insert_code as usize].0, insert_extra_bits);
        if insert_extra_bits > 0 {
            out.write_bits(insert_extra_value, insert_extra_bits as usize);
        }
        if copy_extra_bits > 0 {
            out.write_bits(copy_extra_value, copy_extra_bits as usize);
        }

        for &b in &chunk[cursor..cursor + cmd.insert_len as usize] {
            let (code, len) = literal_codes[b as usize];
            out.write_bits(code, len as usize);
        }
        cursor += cmd.insert_len as usize;

        if cmd.copy_len > 0 {
            let (distance_code, distance_extra_bits, distance_extra_value) = encode_distance_code(cmd.distance, &cache);
            let (code, len) = distance_codes[distance_code as usize];
            out.write_bits(code, len as usize);
            if distance_extra_bits > 0 {
                out.write_bits(distance_extra_value, distance_extra_bits as usize);
            }
            if distance_code != 0 {
                cache.push(cmd.distance);
            }
            cursor += cmd.copy_len as usize;
        }
    }
}

fn close_stream(out: &mut BitWriter) {
    out.write_bool(true); // isLast = 1
    out.write_bool(true); // isEmpty = 1
    out.align_to_byte();
}

/// Compress `data` into a standalone Brotli stream.
pub fn compress_literal(data: &[u8]) -> Vec<u8> {
    BrotliEncoder::new().compress_literal(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brotli::decoder::decompress;

    #[test]
    fn round_trips_a_short_repeating_pattern() {
        let data = b"abcabcabcabc";
        let compressed = compress_literal(data);
        let decompressed = decompress(&compressed).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn round_trips_empty_input() {
        let compressed = compress_literal(b"");
        let decompressed = decompress(&compressed).unwrap();
        assert_eq!(decompressed, b"");
    }

    #[test]
    fn round_trips_a_single_byte() {
        let compressed = compress_literal(b"x");
        let decompressed = decompress(&compressed).unwrap();
        assert_eq!(decompressed, b"x");
    }

    #[test]
    fn round_trips_incompressible_bytes() {
        let data: Vec<u8> = (0..=255u8).cycle().take(600).collect();
        let compressed = compress_literal(&data);
        let decompressed = decompress(&compressed).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn finds_at_least_one_back_reference_in_a_repeating_pattern() {
        let data: Vec<u8> = b"the quick brown fox ".iter().cycle().take(400).copied().collect();
        let commands = build_commands(&data);
        assert!(commands.iter().any(|c| c.copy_len > 0), "expected a real copy command, got {} commands", commands.len());
    }

    #[test]
    fn round_trips_a_long_repeating_pattern_using_back_references() {
        let data: Vec<u8> = b"the quick brown fox jumps over the lazy dog. "
            .iter()
            .cycle()
            .take(5000)
            .copied()
            .collect();
        let compressed = compress_literal(&data);
        let decompressed = decompress(&compressed).unwrap();
        assert_eq!(decompressed, data);
        assert!(compressed.len() < data.len());
    }

    #[test]
    fn round_trips_data_with_a_match_right_at_the_end() {
        let mut data = alloc::vec::Vec::new();
        data.extend_from_slice(b"prefix-bytes-that-do-not-repeat-at-all-0123456789");
        data.extend_from_slice(b"prefix-bytes-that-do-not-repeat-at-all-0123456789");
        let compressed = compress_literal(&data);
        let decompressed = decompress(&compressed).unwrap();
        assert_eq!(decompressed, data);
    }
}
