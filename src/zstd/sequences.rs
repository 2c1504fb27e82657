//! The sequences section: literal-length/match-length/offset triples
//! that, together with the literals stream, describe how to reconstruct
//! a block's decompressed bytes.

use alloc::vec::Vec;

use crate::bit::reverse_reader::BitReaderReversed;
use crate::error::Error;
use crate::fse::{FSEDecoder, FSETable};
use crate::zstd::window::SlidingWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeType {
    Predefined,
    RLE,
    FSECompressed,
    Repeat,
}

fn mode_from_bits(bits: u8) -> ModeType {
    match bits {
        0 => ModeType::Predefined,
        1 => ModeType::RLE,
        2 => ModeType::FSECompressed,
        3 => ModeType::Repeat,
        _ => unreachable!(),
    }
}

fn mode_to_bits(mode: ModeType) -> u8 {
    match mode {
        ModeType::Predefined => 0,
        ModeType::RLE => 1,
        ModeType::FSECompressed => 2,
        ModeType::Repeat => 3,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionModes(pub u8);

impl CompressionModes {
    pub fn ll_mode(&self) -> ModeType {
        mode_from_bits((self.0 >> 6) & 0x3)
    }
    pub fn of_mode(&self) -> ModeType {
        mode_from_bits((self.0 >> 4) & 0x3)
    }
    pub fn ml_mode(&self) -> ModeType {
        mode_from_bits((self.0 >> 2) & 0x3)
    }

    pub fn new(ll: ModeType, of: ModeType, ml: ModeType) -> Self {
        CompressionModes((mode_to_bits(ll) << 6) | (mode_to_bits(of) << 4) | (mode_to_bits(ml) << 2))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SequencesHeader {
    pub num_sequences: u32,
    pub modes: Option<CompressionModes>,
}

/// Parse the variable-length sequence count and, if non-zero, the
/// compression-modes byte. Returns the header and bytes consumed.
pub fn parse_sequences_header(source: &[u8]) -> Result<(SequencesHeader, u8), Error> {
    if source.is_empty() {
        return Err(Error::TruncatedInput { need: 1, have: 0 });
    }
    let byte0 = source[0];

    let (num_sequences, mut bytes_read) = if byte0 == 0 {
        (0u32, 1u8)
    } else if byte0 < 128 {
        (byte0 as u32, 1u8)
    } else if byte0 < 255 {
        if source.len() < 2 {
            return Err(Error::TruncatedInput { need: 1, have: 0 });
        }
        (((byte0 as u32 - 128) << 8) + source[1] as u32, 2u8)
    } else {
        if source.len() < 3 {
            return Err(Error::TruncatedInput {
                need: 3 - source.len(),
                have: source.len(),
            });
        }
        (source[1] as u32 + ((source[2] as u32) << 8) + 0x7F00, 3u8)
    };

    let modes = if num_sequences == 0 {
        None
    } else {
        if source.len() <= bytes_read as usize {
            return Err(Error::TruncatedInput { need: 1, have: 0 });
        }
        let modes = CompressionModes(source[bytes_read as usize]);
        bytes_read += 1;
        Some(modes)
    };

    Ok((SequencesHeader { num_sequences, modes }, bytes_read))
}

pub fn write_sequences_header(num_sequences: u32, modes: Option<CompressionModes>, out: &mut Vec<u8>) {
    if num_sequences == 0 {
        out.push(0);
        return;
    }
    if num_sequences < 128 {
        out.push(num_sequences as u8);
    } else if num_sequences < 0x7F00 {
        let value = num_sequences - 0x80;
        out.push(((value >> 8) as u8) + 0x80);
        out.push((value & 0xFF) as u8);
    } else {
        out.push(255);
        let value = num_sequences - 0x7F00;
        out.push((value & 0xFF) as u8);
        out.push(((value >> 8) & 0xFF) as u8);
    }
    out.push(modes.expect("non-zero sequence count must carry compression modes").0);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sequence {
    pub literal_length: u32,
    pub match_length: u32,
    /// Already resolved against the repeat-offset ring: the actual
    /// distance to copy from, never a ring index.
    pub offset: u32,
}

/// The literal-length code table: (baseline, extra bits) indexed by code.
/// Code 31's baseline is 4096, matching RFC 8878 -- not the 4069 typo
/// that shows up in some historical implementations.
fn ll_code(code: u8) -> (u32, u8) {
    match code {
        0..=15 => (code as u32, 0),
        16 => (16, 1),
        17 => (18, 1),
        18 => (20, 1),
        19 => (22, 1),
        20 => (24, 2),
        21 => (28, 2),
        22 => (32, 3),
        23 => (40, 3),
        24 => (48, 4),
        25 => (64, 6),
        26 => (128, 7),
        27 => (256, 8),
        28 => (512, 9),
        29 => (1024, 10),
        30 => (2048, 11),
        31 => (4096, 12),
        32 => (8192, 13),
        33 => (16384, 14),
        34 => (32768, 15),
        35 => (65536, 16),
        _ => panic!("invalid literal-length code: {code}"),
    }
}

fn ml_code(code: u8) -> (u32, u8) {
    match code {
        0..=31 => (code as u32 + 3, 0),
        32 => (35, 1),
        33 => (37, 1),
        34 => (39, 1),
        35 => (41, 1),
        36 => (43, 2),
        37 => (47, 2),
        38 => (51, 3),
        39 => (59, 3),
        40 => (67, 4),
        41 => (83, 4),
        42 => (99, 5),
        43 => (131, 7),
        44 => (259, 8),
        45 => (515, 9),
        46 => (1027, 10),
        47 => (2051, 11),
        48 => (4099, 12),
        49 => (8195, 13),
        50 => (16387, 14),
        51 => (32771, 15),
        52 => (65539, 16),
        _ => panic!("invalid match-length code: {code}"),
    }
}

const LL_MAX_LOG: u8 = 9;
const ML_MAX_LOG: u8 = 9;
const OF_MAX_LOG: u8 = 8;

/// The three-entry repeat-offset ring, seeded to (1, 4, 8) at the start
/// of every frame and threaded through every block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepeatOffsets {
    pub offset1: u32,
    pub offset2: u32,
    pub offset3: u32,
}

impl Default for RepeatOffsets {
    fn default() -> Self {
        RepeatOffsets { offset1: 1, offset2: 4, offset3: 8 }
    }
}

impl RepeatOffsets {
    /// Resolve a raw offset value (baseline + extra bits, i.e. always
    /// >= 1) and the sequence's literal length into an actual distance,
    /// updating the ring in place.
    fn resolve(&mut self, offset_value: u32, literal_length: u32) -> Result<u32, Error> {
        if offset_value > 3 {
            let offset = offset_value - 3;
            self.offset3 = self.offset2;
            self.offset2 = self.offset1;
            self.offset1 = offset;
            return Ok(offset);
        }

        let mut index = offset_value;
        if literal_length == 0 {
            index += 1;
        }

        let offset = match index {
            1 => self.offset1,
            2 => {
                let offset = self.offset2;
                self.offset2 = self.offset1;
                self.offset1 = offset;
                offset
            }
            3 => {
                let offset = self.offset3;
                self.offset3 = self.offset2;
                self.offset2 = self.offset1;
                self.offset1 = offset;
                offset
            }
            4 => {
                // offset1 - 1, clamped to 1: the ring never contains a
                // zero offset, so an offset1 of 1 resolves to 1 here
                // rather than underflowing.
                let offset = self.offset1.saturating_sub(1).max(1);
                self.offset3 = self.offset2;
                self.offset2 = self.offset1;
                self.offset1 = offset;
                offset
            }
            _ => unreachable!("offset_value <= 3 implies index <= 4"),
        };

        Ok(offset)
    }
}

pub struct SequenceFseTables {
    pub literal_lengths: FSETable,
    pub match_lengths: FSETable,
    pub offsets: FSETable,
}

impl Default for SequenceFseTables {
    fn default() -> Self {
        SequenceFseTables {
            literal_lengths: FSETable::new(36),
            match_lengths: FSETable::new(53),
            offsets: FSETable::new(32),
        }
    }
}

/// Decode all sequences in a block's sequences section into `target`,
/// building/reusing FSE tables in `tables` as the compression modes
/// direct.
pub fn decode_sequences(
    header: &SequencesHeader,
    source: &[u8],
    tables: &mut SequenceFseTables,
    target: &mut Vec<Sequence>,
) -> Result<(), Error> {
    target.clear();
    if header.num_sequences == 0 {
        return Ok(());
    }
    let modes = header.modes.ok_or_else(|| Error::InvalidTable {
        context: "non-empty sequences section has no compression modes byte".into(),
    })?;

    let mut bytes_read = 0usize;
    let ll_rle = update_table(modes.ll_mode(), SeqKind::LiteralLength, &mut tables.literal_lengths, source, LL_MAX_LOG, &mut bytes_read)?;
    let of_rle = update_table(modes.of_mode(), SeqKind::Offset, &mut tables.offsets, &source[bytes_read..], OF_MAX_LOG, &mut bytes_read)?;
    let ml_rle = update_table(modes.ml_mode(), SeqKind::MatchLength, &mut tables.match_lengths, &source[bytes_read..], ML_MAX_LOG, &mut bytes_read)?;

    let bit_stream = &source[bytes_read..];
    let mut br = BitReaderReversed::new(bit_stream);
    br.skip_sentinel()?;

    let mut ll_dec = rle_or_table_decoder(ll_rle, &tables.literal_lengths);
    let mut of_dec = rle_or_table_decoder(of_rle, &tables.offsets);
    let mut ml_dec = rle_or_table_decoder(ml_rle, &tables.match_lengths);

    ll_dec.init_state(&mut br)?;
    of_dec.init_state(&mut br)?;
    ml_dec.init_state(&mut br)?;

    target.reserve(header.num_sequences as usize);

    for i in 0..header.num_sequences {
        let ll_raw_code = ll_dec.decode_symbol();
        let ml_raw_code = ml_dec.decode_symbol();
        let of_code = of_dec.decode_symbol();

        let (ll_base, ll_extra_bits) = ll_code(ll_raw_code);
        let (ml_base, ml_extra_bits) = ml_code(ml_raw_code);

        let of_extra = br.get_bits(of_code as usize)?;
        let offset_value = of_extra as u32 + (1u32 << of_code);
        let ml_extra = br.get_bits(ml_extra_bits as usize)?;
        let ll_extra = br.get_bits(ll_extra_bits as usize)?;

        let literal_length = ll_base + ll_extra as u32;
        let match_length = ml_base + ml_extra as u32;

        target.push(Sequence {
            literal_length,
            match_length,
            // offset field carries the raw decoded value here; resolved
            // against the repeat-offset ring by the caller in execution
            // order (which needs the ring state threaded across blocks).
            offset: offset_value,
        });

        if i + 1 < header.num_sequences {
            ll_dec.update_state(&mut br)?;
            of_dec.update_state(&mut br)?;
            ml_dec.update_state(&mut br)?;
        }
    }

    if br.bits_remaining() > 0 {
        return Err(Error::InvalidBackReference {
            context: alloc::format!(
                "sequences bitstream had {} unused bits remaining",
                br.bits_remaining()
            ),
        });
    }

    Ok(())
}

/// Which of the three sequence trees a table/predefined-distribution
/// call is for. Needed because predefined mode must pick the matching
/// RFC 8878 distribution regardless of how the table happens to be
/// sized in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SeqKind {
    LiteralLength,
    MatchLength,
    Offset,
}

fn update_table(
    mode: ModeType,
    kind: SeqKind,
    table: &mut FSETable,
    source: &[u8],
    max_log: u8,
    bytes_read: &mut usize,
) -> Result<Option<u8>, Error> {
    match mode {
        ModeType::FSECompressed => {
            *bytes_read += table.build_decoder(source, max_log)?;
            Ok(None)
        }
        ModeType::RLE => {
            if source.is_empty() {
                return Err(Error::TruncatedInput { need: 1, have: 0 });
            }
            *bytes_read += 1;
            Ok(Some(source[0]))
        }
        ModeType::Predefined => {
            build_predefined(table, kind);
            Ok(None)
        }
        ModeType::Repeat => {
            if table.accuracy_log == 0 {
                return Err(Error::InvalidTable {
                    context: "repeat mode with no previously-built FSE table".into(),
                });
            }
            Ok(None)
        }
    }
}

fn build_predefined(table: &mut FSETable, kind: SeqKind) {
    use crate::fse::encoder::{ll_dist, ml_dist, of_dist};
    let (probs, acc_log): (&[i32], u8) = match kind {
        SeqKind::LiteralLength => (ll_dist(), 6),
        SeqKind::MatchLength => (ml_dist(), 6),
        SeqKind::Offset => (of_dist(), 5),
    };
    table
        .build_from_probabilities(acc_log, probs)
        .expect("predefined distributions are internally consistent");
}

/// An RLE-mode "decoder" that always returns the same symbol and never
/// consumes bits, so it can share call sites with a real `FSEDecoder`.
enum RleOrTable<'t> {
    Rle(u8),
    Table(FSEDecoder<'t>),
}

fn rle_or_table_decoder(rle: Option<u8>, table: &FSETable) -> RleOrTable<'_> {
    match rle {
        Some(symbol) => RleOrTable::Rle(symbol),
        None => RleOrTable::Table(FSEDecoder::new(table)),
    }
}

impl<'t> RleOrTable<'t> {
    fn decode_symbol(&self) -> u8 {
        match self {
            RleOrTable::Rle(s) => *s,
            RleOrTable::Table(d) => d.decode_symbol(),
        }
    }

    fn init_state(&mut self, br: &mut BitReaderReversed) -> Result<(), Error> {
        match self {
            RleOrTable::Rle(_) => Ok(()),
            RleOrTable::Table(d) => d.init_state(br),
        }
    }

    fn update_state(&mut self, br: &mut BitReaderReversed) -> Result<(), Error> {
        match self {
            RleOrTable::Rle(_) => Ok(()),
            RleOrTable::Table(d) => d.update_state(br),
        }
    }
}

/// Execute a block's decoded sequences against the sliding window,
/// resolving each offset against the repeat-offset ring as it goes, and
/// finally flushing any literals left over after the last sequence.
pub fn execute_sequences(
    sequences: &[Sequence],
    literals: &[u8],
    ring: &mut RepeatOffsets,
    window: &mut SlidingWindow,
) -> Result<(), Error> {
    let mut literals_used = 0usize;

    for seq in sequences {
        let ll = seq.literal_length as usize;
        if literals_used + ll > literals.len() {
            return Err(Error::InvalidBackReference {
                context: "sequence consumed more literal bytes than were available".into(),
            });
        }
        window.push(&literals[literals_used..literals_used + ll]);
        literals_used += ll;

        let distance = ring.resolve(seq.offset, seq.literal_length)?;
        if seq.match_length > 0 {
            window.copy_match(distance as usize, seq.match_length as usize)?;
        }
    }

    if literals_used < literals.len() {
        window.push(&literals[literals_used..]);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predefined_match_length_table_uses_the_match_length_distribution() {
        use crate::fse::encoder::{ll_dist, ml_dist};

        let mut ml_table = FSETable::new(53);
        build_predefined(&mut ml_table, SeqKind::MatchLength);
        let mut expected = FSETable::new(53);
        expected.build_from_probabilities(6, ml_dist()).unwrap();
        assert_eq!(ml_table.symbol_probabilities, expected.symbol_probabilities);

        let mut ll_table = FSETable::new(36);
        build_predefined(&mut ll_table, SeqKind::LiteralLength);
        assert_eq!(ll_table.symbol_probabilities, ll_dist().to_vec());
        assert_ne!(ml_table.symbol_probabilities, ll_table.symbol_probabilities);
    }

    #[test]
    fn resolves_a_brand_new_offset() {
        let mut ring = RepeatOffsets::default();
        let distance = ring.resolve(10, 3).unwrap();
        assert_eq!(distance, 7);
        assert_eq!(ring.offset1, 7);
        assert_eq!(ring.offset2, 1);
        assert_eq!(ring.offset3, 4);
    }

    #[test]
    fn offset_one_minus_one_special_case_clamps_to_one_instead_of_underflowing() {
        // offset_value 3 with literal_length 0 selects index 4, i.e.
        // "offset1 - 1". Starting from the initial ring (1, 4, 8), that
        // would underflow to 0 without the clamp.
        let mut ring = RepeatOffsets::default();
        let distance = ring.resolve(3, 0).unwrap();
        assert_eq!(distance, 1);
        assert_eq!(ring.offset1, 1);
        assert_eq!(ring.offset2, 1);
        assert_eq!(ring.offset3, 4);
    }

    #[test]
    fn repeat_offset_one_stays_in_place_with_nonzero_literal_length() {
        let mut ring = RepeatOffsets::default();
        let distance = ring.resolve(1, 5).unwrap();
        assert_eq!(distance, 1);
        assert_eq!(ring, RepeatOffsets::default());
    }

    #[test]
    fn zero_literal_length_shifts_the_repeat_index() {
        let mut ring = RepeatOffsets::default();
        // offset_value 1 with literal_length 0 means "use what would
        // normally be offset index 2" i.e. offset2.
        let distance = ring.resolve(1, 0).unwrap();
        assert_eq!(distance, 4);
        assert_eq!(ring.offset1, 4);
        assert_eq!(ring.offset2, 1);
    }

    #[test]
    fn zero_literal_length_with_smallest_offset_code_swaps_the_ring_once() {
        // offset_value 1 (ofCode 0, no extra bits) with literal_length 0
        // resolves to the previous offset2 and swaps it into offset1 --
        // exactly once, not repeatedly on replay.
        let mut ring = RepeatOffsets::default();
        let distance = ring.resolve(1, 0).unwrap();
        assert_eq!(distance, ring.offset1);
        assert_eq!(distance, 4);
        let after_first_swap = ring;
        let second_distance = ring.resolve(1, 0).unwrap();
        assert_ne!(second_distance, distance);
        assert_ne!(ring, after_first_swap);
    }

    #[test]
    fn dictionary_seeded_ring_with_nonzero_literal_length_reuses_offset_one() {
        let mut ring = RepeatOffsets { offset1: 7, offset2: 11, offset3: 13 };
        let distance = ring.resolve(1, 5).unwrap();
        assert_eq!(distance, 7);
        assert_eq!(ring, RepeatOffsets { offset1: 7, offset2: 11, offset3: 13 });
    }

    #[test]
    fn num_sequences_header_round_trips_across_all_widths() {
        for (n, modes) in [
            (0u32, None),
            (5, Some(CompressionModes::new(ModeType::Predefined, ModeType::Predefined, ModeType::Predefined))),
            (200, Some(CompressionModes::new(ModeType::RLE, ModeType::RLE, ModeType::RLE))),
            (40000, Some(CompressionModes::new(ModeType::Repeat, ModeType::Repeat, ModeType::Repeat))),
        ] {
            let mut out = Vec::new();
            write_sequences_header(n, modes, &mut out);
            let (header, _) = parse_sequences_header(&out).unwrap();
            assert_eq!(header.num_sequences, n);
        }
    }

    #[test]
    fn execute_sequences_copies_a_simple_match() {
        let mut window = SlidingWindow::new(64);
        let mut ring = RepeatOffsets::default();
        let seqs = [Sequence { literal_length: 3, match_length: 3, offset: 6 }];
        // literals "abc", then repeat-offset-resolved distance 3 (6-3) copies "abc" again
        execute_sequences(&seqs, b"abc", &mut ring, &mut window).unwrap();
        assert_eq!(window.as_slice(), b"abcabc");
    }
}
