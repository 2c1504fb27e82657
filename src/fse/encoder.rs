//! Encoder-side FSE table construction, mirroring [`super::decoder`]'s
//! table spreading exactly so that states computed here land on the same
//! baseline/num_bits a decoder would compute for the same table.

use alloc::vec::Vec;

use crate::bit::writer::BitWriter;

pub struct FSEEncoder<'output> {
    pub(super) table: FSETable,
    writer: &'output mut BitWriter,
}

impl<'output> FSEEncoder<'output> {
    pub fn new(table: FSETable, writer: &'output mut BitWriter) -> Self {
        FSEEncoder { table, writer }
    }

    pub fn into_table(self) -> FSETable {
        self.table
    }

    pub fn encode(&mut self, data: &[u8]) {
        self.write_table();

        let mut state = self.table.start_state(data[data.len() - 1]);
        for x in data[0..data.len() - 1].iter().rev().copied() {
            let next = self.table.next_state(x, state.index);
            let diff = state.index - next.baseline;
            self.writer.write_bits(diff as u64, next.num_bits as usize);
            state = next;
        }
        self.writer.write_bits(state.index as u64, self.acc_log() as usize);
        self.writer.close_with_terminator();
    }

    pub fn encode_interleaved(&mut self, data: &[u8]) {
        self.write_table();

        let mut state_1 = self.table.start_state(data[data.len() - 1]);
        let mut state_2 = self.table.start_state(data[data.len() - 2]);

        let mut idx = data.len() - 4;
        loop {
            {
                let state = state_1;
                let x = data[idx + 1];
                let next = self.table.next_state(x, state.index);
                let diff = state.index - next.baseline;
                self.writer.write_bits(diff as u64, next.num_bits as usize);
                state_1 = next;
            }
            {
                let state = state_2;
                let x = data[idx];
                let next = self.table.next_state(x, state.index);
                let diff = state.index - next.baseline;
                self.writer.write_bits(diff as u64, next.num_bits as usize);
                state_2 = next;
            }

            if idx < 2 {
                break;
            }
            idx -= 2;
        }
        if idx == 1 {
            let state = state_1;
            let x = data[0];
            let next = self.table.next_state(x, state.index);
            let diff = state.index - next.baseline;
            self.writer.write_bits(diff as u64, next.num_bits as usize);
            state_1 = next;

            self.writer.write_bits(state_2.index as u64, self.acc_log() as usize);
            self.writer.write_bits(state_1.index as u64, self.acc_log() as usize);
        } else {
            self.writer.write_bits(state_1.index as u64, self.acc_log() as usize);
            self.writer.write_bits(state_2.index as u64, self.acc_log() as usize);
        }

        self.writer.close_with_terminator();
    }

    fn write_table(&mut self) {
        self.writer.write_bits((self.acc_log() - 5) as u64, 4);
        let mut probability_counter = 0usize;
        let probability_sum = 1usize << self.acc_log();

        let mut prob_idx = 0;
        while probability_counter < probability_sum {
            let max_remaining_value = probability_sum - probability_counter + 1;
            let bits_to_write = highest_bit_set(max_remaining_value as u32) + 1;
            let low_threshold = ((1u32 << bits_to_write) - 1) - (max_remaining_value as u32);
            let mask = (1u32 << (bits_to_write - 1)) - 1;

            let prob = self.table.states[prob_idx].probability;
            prob_idx += 1;
            let value = (prob + 1) as u32;
            if value < low_threshold {
                self.writer.write_bits(value as u64, bits_to_write as usize - 1);
            } else if value > mask {
                self.writer
                    .write_bits((value + low_threshold) as u64, bits_to_write as usize);
            } else {
                self.writer.write_bits(value as u64, bits_to_write as usize);
            }

            if prob == -1 {
                probability_counter += 1;
            } else if prob > 0 {
                probability_counter += prob as usize;
            } else {
                let mut zeros = 0u8;
                while self.table.states[prob_idx].probability == 0 {
                    zeros += 1;
                    prob_idx += 1;
                    if zeros == 3 {
                        self.writer.write_bits(3u64, 2);
                        zeros = 0;
                    }
                }
                self.writer.write_bits(zeros as u64, 2);
            }
        }
        self.writer.align_to_byte();
    }

    pub(super) fn acc_log(&self) -> u8 {
        highest_bit_set(self.table.table_size as u32) as u8 - 1
    }
}

fn highest_bit_set(x: u32) -> u32 {
    assert!(x > 0);
    32 - x.leading_zeros()
}

#[derive(Debug)]
pub struct FSETable {
    /// Indexed by symbol.
    pub(super) states: alloc::boxed::Box<[SymbolStates; 256]>,
    pub(crate) table_size: usize,
}

impl FSETable {
    pub(crate) fn next_state(&self, symbol: u8, idx: usize) -> &State {
        self.states[symbol as usize].get(idx, self.table_size)
    }

    pub(crate) fn start_state(&self, symbol: u8) -> &State {
        &self.states[symbol as usize].states[0]
    }
}

#[derive(Debug)]
pub(super) struct SymbolStates {
    /// Sorted by baseline.
    pub(super) states: Vec<State>,
    pub(super) probability: i32,
}

impl SymbolStates {
    fn get(&self, idx: usize, max_idx: usize) -> &State {
        let start_search_at = (idx * self.states.len()) / max_idx;
        self.states[start_search_at..]
            .iter()
            .find(|state| state.contains(idx))
            .expect("FSE state table does not cover the full state range")
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct State {
    pub(crate) num_bits: u8,
    pub(crate) baseline: usize,
    pub(crate) last_index: usize,
    /// Index of this state in the decoding table.
    pub(crate) index: usize,
}

impl State {
    fn contains(&self, idx: usize) -> bool {
        self.baseline <= idx && self.last_index >= idx
    }
}

pub fn build_table_from_data(data: &[u8], max_log: u8, avoid_0_numbit: bool) -> FSETable {
    let mut counts = [0usize; 256];
    for x in data {
        counts[*x as usize] += 1;
    }
    build_table_from_counts(&counts, max_log, avoid_0_numbit)
}

fn build_table_from_counts(counts: &[usize], max_log: u8, avoid_0_numbit: bool) -> FSETable {
    let mut probs = [0i32; 256];
    let mut min_count = 0;
    for (idx, count) in counts.iter().copied().enumerate() {
        probs[idx] = count as i32;
        if count > 0 && (count < min_count || min_count == 0) {
            min_count = count;
        }
    }

    min_count = min_count.saturating_sub(1);
    for prob in probs.iter_mut() {
        if *prob > 0 {
            *prob -= min_count as i32;
        }
    }

    let sum = probs.iter().sum::<i32>();
    assert!(sum > 0);
    let sum = sum as usize;
    let acc_log = (highest_bit_set(sum as u32) as u8).max(5);
    let acc_log = u8::min(acc_log, max_log);

    if sum < 1 << acc_log {
        let diff = (1 << acc_log) - sum;
        let max = probs.iter_mut().max().unwrap();
        *max += diff as i32;
    } else {
        let mut diff = sum - (1 << max_log);
        while diff > 0 {
            let min = probs.iter_mut().filter(|prob| **prob > 1).min().unwrap();
            let decrease = usize::min(*min as usize - 1, diff);
            diff -= decrease;
            *min -= decrease as i32;
        }
    }
    let max_val = *probs.iter().max().unwrap();
    if avoid_0_numbit && max_val > 1 << (acc_log - 1) {
        let redistribute = max_val - (1 << (acc_log - 1));
        let max = probs.iter_mut().max().unwrap();
        *max -= redistribute;
        let max = *max;

        let second_max = *probs.iter().filter(|x| **x != max).max().unwrap();
        let second_max = probs.iter_mut().find(|x| **x == second_max).unwrap();
        *second_max += redistribute;
        assert!(*second_max <= max);
    }
    build_table_from_probabilities(&probs, acc_log)
}

pub(super) fn build_table_from_probabilities(probs: &[i32], acc_log: u8) -> FSETable {
    let mut states = {
        let v: Vec<SymbolStates> = (0..256)
            .map(|_| SymbolStates {
                states: Vec::new(),
                probability: 0,
            })
            .collect();
        let boxed: alloc::boxed::Box<[SymbolStates]> = v.into_boxed_slice();
        let boxed: alloc::boxed::Box<[SymbolStates; 256]> =
            boxed.try_into().unwrap_or_else(|_| unreachable!());
        boxed
    };

    let mut negative_idx = (1usize << acc_log) - 1;
    for (symbol, _prob) in probs.iter().copied().enumerate().filter(|prob| prob.1 == -1) {
        states[symbol].states.push(State {
            num_bits: acc_log,
            baseline: 0,
            last_index: (1 << acc_log) - 1,
            index: negative_idx,
        });
        states[symbol].probability = -1;
        negative_idx -= 1;
    }

    let mut idx = 0;
    for (symbol, prob) in probs.iter().copied().enumerate() {
        if prob <= 0 {
            continue;
        }
        states[symbol].probability = prob;
        let sym_states = &mut states[symbol].states;
        for _ in 0..prob {
            sym_states.push(State {
                num_bits: 0,
                baseline: 0,
                last_index: 0,
                index: idx,
            });

            idx = next_position(idx, 1 << acc_log);
            while idx > negative_idx {
                idx = next_position(idx, 1 << acc_log);
            }
        }
        assert_eq!(sym_states.len(), prob as usize);
    }

    for (symbol, prob) in probs.iter().copied().enumerate() {
        if prob <= 0 {
            continue;
        }
        let prob = prob as u32;
        let state = &mut states[symbol];
        state.states.sort_by(|l, r| l.index.cmp(&r.index));

        let prob_log = if prob.is_power_of_two() {
            highest_bit_set(prob) - 1
        } else {
            highest_bit_set(prob)
        };
        let rounded_up = 1u32 << prob_log;
        let double_states = rounded_up - prob;
        let single_states = prob - double_states;
        let num_bits = acc_log - prob_log as u8;
        let mut baseline = (single_states as usize * (1 << num_bits)) % (1 << acc_log);
        for (i, state) in state.states.iter_mut().enumerate() {
            if (i as u32) < double_states {
                let num_bits = num_bits + 1;
                state.baseline = baseline;
                state.num_bits = num_bits;
                state.last_index = baseline + ((1 << num_bits) - 1);

                baseline += 1 << num_bits;
                baseline %= 1 << acc_log;
            } else {
                state.baseline = baseline;
                state.num_bits = num_bits;
                state.last_index = baseline + ((1 << num_bits) - 1);
                baseline += 1 << num_bits;
            }
        }
        state.states.sort_by(|l, r| l.baseline.cmp(&r.baseline));
    }

    FSETable {
        table_size: 1 << acc_log,
        states,
    }
}

fn next_position(mut p: usize, table_size: usize) -> usize {
    p += (table_size >> 1) + (table_size >> 3) + 3;
    p &= table_size - 1;
    p
}

const ML_DIST: &[i32] = &[
    1, 4, 3, 2, 2, 2, 2, 2, 2, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1,
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, -1, -1, -1, -1, -1, -1, -1,
];

const LL_DIST: &[i32] = &[
    4, 3, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 1, 1, 1, 2, 2, 2, 2, 2, 2, 2, 2, 2, 3, 2, 1, 1, 1, 1, 1,
    -1, -1, -1, -1,
];

const OF_DIST: &[i32] = &[
    1, 1, 1, 1, 1, 1, 2, 2, 2, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, -1, -1, -1, -1, -1,
];

/// Exposed for cross-checking against [`super::decoder::FSETable`] in tests.
pub(crate) fn ml_dist() -> &'static [i32] {
    ML_DIST
}
pub(crate) fn ll_dist() -> &'static [i32] {
    LL_DIST
}
pub(crate) fn of_dist() -> &'static [i32] {
    OF_DIST
}

pub(crate) fn default_ml_table() -> FSETable {
    build_table_from_probabilities(ML_DIST, 6)
}

pub(crate) fn default_ll_table() -> FSETable {
    build_table_from_probabilities(LL_DIST, 6)
}

pub(crate) fn default_of_table() -> FSETable {
    build_table_from_probabilities(OF_DIST, 5)
}
