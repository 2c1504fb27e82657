//! FSE, short for Finite State Entropy, is an encoding technique that
//! assigns shorter codes to symbols that appear more frequently in data,
//! and longer codes to less frequent symbols.
//!
//! FSE works by mutating a state and using that state to index into a
//! table. Zstandard uses FSE for literal/match lengths and offsets, and
//! Huffman coding (see [`crate::huff0`]) for literal bytes.
//!
//! <https://github.com/facebook/zstd/blob/dev/doc/zstd_compression_format.md#fse>
//!
//! <https://arxiv.org/pdf/1311.2540>

pub mod decoder;
pub mod encoder;

pub use decoder::{Entry, FSEDecoder, FSETable};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decoder_and_encoder_tables_agree() {
        let probs = &[0, 0, -1, 3, 2, 2, (1 << 6) - 8];
        let mut dec_table = FSETable::new(probs.len());
        dec_table.build_from_probabilities(6, probs).unwrap();
        let enc_table = encoder::build_table_from_probabilities(probs, 6);

        for (idx, dec_state) in dec_table.decode.iter().enumerate() {
            let enc_states = &enc_table.states[dec_state.symbol as usize];
            let enc_state = enc_states
                .states
                .iter()
                .find(|state| state.index == idx)
                .unwrap();
            assert_eq!(enc_state.baseline, dec_state.base_line);
            assert_eq!(enc_state.num_bits, dec_state.num_bits);
        }
    }

    #[test]
    fn predefined_tables_mirror_between_decoder_and_encoder() {
        for (probs, acc_log) in [
            (encoder::ll_dist(), 6u8),
            (encoder::ml_dist(), 6u8),
            (encoder::of_dist(), 5u8),
        ] {
            let mut dec_table = FSETable::new(probs.len());
            dec_table.build_from_probabilities(acc_log, probs).unwrap();
            let enc_table = encoder::build_table_from_probabilities(probs, acc_log);
            assert_eq!(dec_table.decode.len(), enc_table.table_size);
        }
    }
}
