//! Encoder-side canonical Huffman table construction for zstd literals.

use alloc::vec::Vec;
use core::cmp::Ordering;

use crate::bit::writer::BitWriter;
use crate::error::Error;

pub struct HuffmanTable {
    /// Index is the symbol; value is (bitstring in the low bits, bit count).
    codes: Vec<(u32, u8)>,
    max_num_bits: u8,
}

impl HuffmanTable {
    pub fn build(weights: &[usize]) -> Self {
        let mut sorted = Vec::with_capacity(weights.len());
        struct SortEntry {
            symbol: u8,
            weight: usize,
        }
        for (symbol, weight) in weights.iter().copied().enumerate() {
            if weight > 0 {
                sorted.push(SortEntry {
                    symbol: symbol as u8,
                    weight,
                });
            }
        }
        sorted.sort_by(|left, right| match left.weight.cmp(&right.weight) {
            Ordering::Equal => left.symbol.cmp(&right.symbol),
            other => other,
        });

        let mut table = HuffmanTable {
            codes: alloc::vec![(0, 0); weights.len()],
            max_num_bits: 0,
        };

        if sorted.is_empty() {
            return table;
        }

        let weight_sum = sorted.iter().map(|e| 1usize << (e.weight - 1)).sum::<usize>();
        assert!(weight_sum.is_power_of_two(), "internal error: weight sum not a power of two");
        let max_num_bits = highest_bit_set(weight_sum) - 1;
        table.max_num_bits = max_num_bits as u8;

        let mut current_weight = sorted.last().unwrap().weight;
        let mut current_num_bits = max_num_bits + 1 - current_weight;
        let mut code = (1usize << current_num_bits) - 1;
        for idx in (0..sorted.len()).rev() {
            if current_weight != sorted[idx].weight {
                current_weight = sorted[idx].weight;
                let next_num_bits = max_num_bits + 1 - current_weight;
                code = (1usize << (next_num_bits - current_num_bits)) - 1;
                current_num_bits = next_num_bits;
            }
            table.codes[sorted[idx].symbol as usize] = (code as u32, current_num_bits as u8);
            code = code.saturating_sub(1);
        }

        table
    }

    /// Build a table from raw symbol counts, capped at 11 bits per code as
    /// the wire format requires.
    pub fn from_counts(counts: &[usize; 256]) -> Self {
        let distinct = counts.iter().filter(|c| **c > 0).count();
        if distinct <= 1 {
            return HuffmanTable::build(counts);
        }
        let total: usize = counts.iter().sum();
        let mut weights = [0usize; 256];
        for (symbol, count) in counts.iter().copied().enumerate() {
            if count == 0 {
                continue;
            }
            // weight is derived from -log2(freq), clamped into [1, 11]
            let bits = if count * 2 >= total {
                1
            } else {
                (highest_bit_set(total / count.max(1)) + 1).min(11)
            };
            weights[symbol] = bits;
        }
        HuffmanTable::build(&weights)
    }

    pub fn max_num_bits(&self) -> u8 {
        self.max_num_bits
    }

    pub fn code_for(&self, symbol: u8) -> (u32, u8) {
        self.codes[symbol as usize]
    }

    pub fn encode(&self, data: &[u8], writer: &mut BitWriter) {
        for byte in data {
            let (code, num_bits) = self.code_for(*byte);
            writer.write_bits(code as u64, num_bits as usize);
        }
    }

    /// Serialize the per-symbol weight table using the raw (>127 header)
    /// nibble-packed format: simpler than FSE-compressing the weight
    /// stream and always valid per the wire format.
    pub fn write_weights_raw(&self, out: &mut alloc::vec::Vec<u8>) -> Result<(), Error> {
        let weights = self.weights();
        let num_weights = weights.len();
        if num_weights == 0 || num_weights > 255 {
            return Err(Error::InvalidTable {
                context: "Huffman table has an unencodable number of symbols".into(),
            });
        }
        out.push(127 + num_weights as u8);
        for pair in weights.chunks(2) {
            let hi = pair[0];
            let lo = pair.get(1).copied().unwrap_or(0);
            out.push((hi << 4) | lo);
        }
        Ok(())
    }

    /// Per-symbol weights, omitting the highest-numbered used symbol (its
    /// weight is implied by the power-of-two sum invariant, per the wire
    /// format).
    fn weights(&self) -> Vec<u8> {
        let last_used = match self.codes.iter().rposition(|(_, n)| *n != 0) {
            Some(i) => i,
            None => return Vec::new(),
        };
        self.codes[..last_used]
            .iter()
            .map(|(_, n)| if *n == 0 { 0 } else { self.max_num_bits + 1 - n })
            .collect()
    }
}

/// Assert that the provided value is greater than zero, and return the
/// index of the first set bit (1-based, i.e. floor(log2(x)) + 1).
fn highest_bit_set(x: usize) -> usize {
    assert!(x > 0);
    usize::BITS as usize - x.leading_zeros() as usize
}

/// Spread `amount` symbols across ascending weights as evenly as a
/// canonical Huffman tree allows; used to build a table for literal
/// alphabets with close to uniform frequency.
pub fn distribute_weights(amount: usize) -> Vec<usize> {
    assert!((2..=256).contains(&amount));
    let mut weights = Vec::new();
    let mut target_weight = 1;
    let mut weight_counter = 2;

    weights.push(1);
    weights.push(1);

    while weights.len() < amount {
        let mut add_new = 1usize << (weight_counter - target_weight);
        let available_space = amount - weights.len();

        if add_new > available_space {
            target_weight = weight_counter;
            add_new = 1;
        }

        for _ in 0..add_new {
            weights.push(target_weight);
        }
        weight_counter += 1;
    }

    weights
}

/// Push weights above `max_weight` back down, keeping the total a power of
/// two, so the resulting table fits within the wire format's 11-bit cap.
pub fn redistribute_weights(weights: &mut [usize], max_weight: usize) {
    let max_weight_data = *weights.last().unwrap();
    if max_weight_data <= max_weight {
        return;
    }
    let max_weight = max_weight_data - max_weight;
    let mut added_weights = 0;
    for weight in weights.iter_mut() {
        if *weight < max_weight {
            for add in *weight..max_weight {
                added_weights += 1 << add;
            }
            *weight += max_weight - *weight;
        }
    }

    while added_weights > 0 {
        let mut current_idx = 0;
        let mut current_weight = 0;
        for idx in 0..weights.len() {
            if 1 << (weights[idx] - 1) > added_weights {
                break;
            }
            if weights[idx] > current_weight {
                current_weight = weights[idx];
                current_idx = idx;
            }
        }

        added_weights -= 1 << (current_weight - 1);
        weights[current_idx] -= 1;
    }

    if weights[0] > 1 {
        let offset = weights[0] - 1;
        for weight in weights.iter_mut() {
            *weight -= offset;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn huffman() {
        let table = HuffmanTable::build(&[2, 2, 2, 1, 1]);
        assert_eq!(table.codes[0], (1, 2));
        assert_eq!(table.codes[1], (2, 2));
        assert_eq!(table.codes[2], (3, 2));
        assert_eq!(table.codes[3], (0, 3));
        assert_eq!(table.codes[4], (1, 3));

        let table = HuffmanTable::build(&[4, 3, 2, 0, 1, 1]);
        assert_eq!(table.codes[0], (1, 1));
        assert_eq!(table.codes[1], (1, 2));
        assert_eq!(table.codes[2], (1, 3));
        assert_eq!(table.codes[3], (0, 0));
        assert_eq!(table.codes[4], (0, 4));
        assert_eq!(table.codes[5], (1, 4));
    }

    #[test]
    fn weights_distribution_stays_in_power_of_two_budget() {
        for amount in 2..=256 {
            let mut weights = distribute_weights(amount);
            assert_eq!(weights.len(), amount);
            let sum = weights.iter().copied().map(|weight| 1usize << weight).sum::<usize>();
            assert!(sum.is_power_of_two());

            redistribute_weights(&mut weights, (amount as u32).ilog2() as usize + 1);
            let sum = weights.iter().copied().map(|weight| 1usize << weight).sum::<usize>();
            assert!(sum.is_power_of_two());

            let max_weight = (amount as u32).ilog2() as usize + 3;
            assert!(*weights.last().unwrap() <= max_weight);
        }
    }
}
