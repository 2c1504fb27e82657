//! FSE table construction and stateful decoding.
//!
//! Ported from the normalized-count parsing and table-spreading algorithm
//! used to decode literal-length, match-length, and offset codes.

use alloc::vec::Vec;

use crate::bit::forward_reader::BitReader;
use crate::bit::reverse_reader::BitReaderReversed;
use crate::error::Error;

#[derive(Clone)]
pub struct FSETable {
    /// Indexed by state; used to decode symbols and compute the next state.
    pub decode: Vec<Entry>,

    pub accuracy_log: u8,
    pub symbol_probabilities: Vec<i32>,
    symbol_counter: Vec<u32>,
}

pub struct FSEDecoder<'table> {
    pub state: usize,
    table: &'table FSETable,
}

#[derive(Copy, Clone, Default)]
pub struct Entry {
    pub base_line: usize,
    pub num_bits: u8,
    pub symbol: u8,
}

const ACC_LOG_OFFSET: u8 = 5;

fn highest_bit_set(x: u32) -> u32 {
    assert!(x > 0);
    32 - x.leading_zeros()
}

impl<'t> FSEDecoder<'t> {
    pub fn new(table: &'t FSETable) -> FSEDecoder<'t> {
        FSEDecoder { state: 0, table }
    }

    pub fn decode_symbol(&self) -> u8 {
        self.table.decode[self.state].symbol
    }

    pub fn init_state(&mut self, bits: &mut BitReaderReversed) -> Result<(), Error> {
        if self.table.accuracy_log == 0 {
            return Err(Error::InvalidTable {
                context: "tried to use an uninitialized FSE table".into(),
            });
        }
        self.state = bits.get_bits(self.table.accuracy_log as usize)? as usize;
        Ok(())
    }

    pub fn update_state(&mut self, bits: &mut BitReaderReversed) -> Result<(), Error> {
        let num_bits = self.table.decode[self.state].num_bits as usize;
        let add = bits.get_bits(num_bits)?;
        let base_line = self.table.decode[self.state].base_line;
        let new_state = base_line + add as usize;
        if new_state >= self.table.decode.len() {
            return Err(Error::InvalidTable {
                context: "FSE state transition landed outside the table".into(),
            });
        }
        self.state = new_state;
        Ok(())
    }
}

impl FSETable {
    pub fn new(max_symbol: usize) -> FSETable {
        FSETable {
            symbol_probabilities: Vec::with_capacity(max_symbol.min(256)),
            symbol_counter: Vec::with_capacity(max_symbol.min(256)),
            decode: Vec::new(),
            accuracy_log: 0,
        }
    }

    pub fn reset(&mut self) {
        self.symbol_counter.clear();
        self.symbol_probabilities.clear();
        self.decode.clear();
        self.accuracy_log = 0;
    }

    /// Returns how many bytes (not bits) were read while building the table.
    pub fn build_decoder(&mut self, source: &[u8], max_log: u8) -> Result<usize, Error> {
        self.accuracy_log = 0;
        let bytes_read = self.read_probabilities(source, max_log)?;
        self.build_decoding_table();
        Ok(bytes_read)
    }

    pub fn build_from_probabilities(&mut self, acc_log: u8, probs: &[i32]) -> Result<(), Error> {
        if acc_log == 0 {
            return Err(Error::InvalidTable {
                context: "accuracy log must be at least 1".into(),
            });
        }
        self.symbol_probabilities = probs.to_vec();
        self.accuracy_log = acc_log;
        self.build_decoding_table();
        Ok(())
    }

    fn build_decoding_table(&mut self) {
        self.decode.clear();

        let table_size = 1usize << self.accuracy_log;
        self.decode.resize(table_size, Entry::default());

        // highest index already occupied by a negative-probability symbol
        let mut negative_idx = table_size;

        for symbol in 0..self.symbol_probabilities.len() {
            if self.symbol_probabilities[symbol] == -1 {
                negative_idx -= 1;
                let entry = &mut self.decode[negative_idx];
                entry.symbol = symbol as u8;
                entry.base_line = 0;
                entry.num_bits = self.accuracy_log;
            }
        }

        let mut position = 0;
        for idx in 0..self.symbol_probabilities.len() {
            let symbol = idx as u8;
            if self.symbol_probabilities[idx] <= 0 {
                continue;
            }

            let prob = self.symbol_probabilities[idx];
            for _ in 0..prob {
                let entry = &mut self.decode[position];
                entry.symbol = symbol;

                position = next_position(position, table_size);
                while position >= negative_idx {
                    position = next_position(position, table_size);
                }
            }
        }

        self.symbol_counter.clear();
        self.symbol_counter.resize(self.symbol_probabilities.len(), 0);
        for idx in 0..negative_idx {
            let entry = &mut self.decode[idx];
            let symbol = entry.symbol;
            let prob = self.symbol_probabilities[symbol as usize];

            let symbol_count = self.symbol_counter[symbol as usize];
            let (bl, nb) =
                calc_baseline_and_numbits(table_size as u32, prob as u32, symbol_count);

            self.symbol_counter[symbol as usize] += 1;

            entry.base_line = bl;
            entry.num_bits = nb;
        }
    }

    fn read_probabilities(&mut self, source: &[u8], max_log: u8) -> Result<usize, Error> {
        self.symbol_probabilities.clear();

        let mut br = BitReader::new(source);
        self.accuracy_log = ACC_LOG_OFFSET + (br.get_bits(4)? as u8);
        if self.accuracy_log > max_log {
            return Err(Error::InvalidTable {
                context: alloc::format!(
                    "FSE accuracy log {} exceeds the maximum allowed here ({})",
                    self.accuracy_log, max_log
                ),
            });
        }
        if self.accuracy_log == 0 {
            return Err(Error::InvalidTable {
                context: "accuracy log must be at least 1".into(),
            });
        }

        let probability_sum = 1u32 << self.accuracy_log;
        let mut probability_counter = 0u32;

        while probability_counter < probability_sum {
            let max_remaining_value = probability_sum - probability_counter + 1;
            let bits_to_read = highest_bit_set(max_remaining_value);

            let unchecked_value = br.get_bits(bits_to_read as usize)? as u32;

            let low_threshold = ((1u32 << bits_to_read) - 1) - max_remaining_value;
            let mask = (1u32 << (bits_to_read - 1)) - 1;
            let small_value = unchecked_value & mask;

            let value = if small_value < low_threshold {
                br.return_bits(1)?;
                small_value
            } else if unchecked_value > mask {
                unchecked_value - low_threshold
            } else {
                unchecked_value
            };

            let prob = (value as i32) - 1;

            self.symbol_probabilities.push(prob);
            if prob != 0 {
                if prob > 0 {
                    probability_counter += prob as u32;
                } else {
                    debug_assert!(prob == -1);
                    probability_counter += 1;
                }
            } else {
                loop {
                    let skip_amount = br.get_bits(2)?;
                    for _ in 0..skip_amount {
                        self.symbol_probabilities.push(0);
                    }
                    if skip_amount != 3 {
                        break;
                    }
                }
            }
        }

        if probability_counter != probability_sum {
            return Err(Error::InvalidTable {
                context: alloc::format!(
                    "FSE probability counter {} does not match expected sum {}",
                    probability_counter, probability_sum
                ),
            });
        }
        if self.symbol_probabilities.len() > 256 {
            return Err(Error::InvalidTable {
                context: "too many symbols in FSE distribution".into(),
            });
        }

        let bits_read = br.bits_read();
        let bytes_read = if bits_read % 8 == 0 {
            bits_read / 8
        } else {
            bits_read / 8 + 1
        };
        Ok(bytes_read)
    }
}

fn next_position(mut p: usize, table_size: usize) -> usize {
    p += (table_size >> 1) + (table_size >> 3) + 3;
    p &= table_size - 1;
    p
}

fn calc_baseline_and_numbits(
    num_states_total: u32,
    num_states_symbol: u32,
    state_number: u32,
) -> (usize, u8) {
    let num_state_slices = if 1 << (highest_bit_set(num_states_symbol) - 1) == num_states_symbol {
        num_states_symbol
    } else {
        1 << highest_bit_set(num_states_symbol)
    };

    let num_double_width_state_slices = num_state_slices - num_states_symbol;
    let num_single_width_state_slices = num_states_symbol - num_double_width_state_slices;
    let slice_width = num_states_total / num_state_slices;
    let num_bits = highest_bit_set(slice_width) - 1;

    if state_number < num_double_width_state_slices {
        let baseline =
            num_single_width_state_slices * slice_width + state_number * slice_width * 2;
        (baseline as usize, num_bits as u8 + 1)
    } else {
        let index_shifted = state_number - num_double_width_state_slices;
        ((index_shifted * slice_width) as usize, num_bits as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_table_from_simple_probabilities() {
        let probs = &[0, 0, -1, 3, 2, 2, (1 << 6) - 8];
        let mut t = FSETable::new(probs.len());
        t.build_from_probabilities(6, probs).unwrap();
        assert_eq!(t.decode.len(), 64);
        // every slot must have been assigned a num_bits <= accuracy_log
        assert!(t.decode.iter().all(|e| e.num_bits <= 6));
    }

    #[test]
    fn rejects_accuracy_log_above_max() {
        // 4-bit accuracy-log field = 0 -> accuracy_log = ACC_LOG_OFFSET (5),
        // which exceeds a max_log of 4.
        let mut t = FSETable::new(8);
        assert!(t.build_decoder(&[0x00], 4).is_err());
    }
}
