//! A bit container that reads backwards from the end of a buffer.
//!
//! Zstandard's FSE and Huffman weight bitstreams are written so the last
//! bit written is the first bit a decoder needs; see [crate::bit] for the
//! high-level contract. This models the stream as a 64-bit shift register
//! fed from the tail of the buffer, refilled in chunks as it drains.

use crate::error::Error;

pub struct BitReaderReversed<'s> {
    /// Bits remaining to be pulled from `source`, counted from the start.
    idx: isize,
    source: &'s [u8],

    bit_container: u64,
    bits_in_container: u8,
}

impl<'s> BitReaderReversed<'s> {
    /// Signed count of bits left to read; negative once the reader has
    /// consumed past the sentinel and is serving emulated zero bits.
    pub fn bits_remaining(&self) -> isize {
        self.idx + self.bits_in_container as isize
    }

    pub fn new(source: &'s [u8]) -> Self {
        BitReaderReversed {
            idx: source.len() as isize * 8,
            source,
            bit_container: 0,
            bits_in_container: 0,
        }
    }

    fn byte_idx(&self) -> usize {
        (self.idx as usize - 1) / 8
    }

    fn refill_container(&mut self) {
        let want_to_read = 64 - self.bits_in_container;
        let can_read = if want_to_read as isize > self.idx {
            self.idx
        } else {
            want_to_read as isize
        };

        match can_read {
            64 => {
                let start = self.byte_idx() - 7;
                let mut buf = [0u8; 8];
                buf.copy_from_slice(&self.source[start..start + 8]);
                self.bit_container = u64::from_le_bytes(buf);
                self.bits_in_container += 64;
                self.idx -= 64;
            }
            48..=63 => {
                let start = self.byte_idx() - 5;
                let mut buf = [0u8; 8];
                buf[..6].copy_from_slice(&self.source[start..start + 6]);
                self.bit_container <<= 48;
                self.bits_in_container += 48;
                self.bit_container |= u64::from_le_bytes(buf);
                self.idx -= 48;
            }
            32..=47 => {
                let start = self.byte_idx() - 3;
                let mut buf = [0u8; 4];
                buf.copy_from_slice(&self.source[start..start + 4]);
                self.bit_container <<= 32;
                self.bits_in_container += 32;
                self.bit_container |= u32::from_le_bytes(buf) as u64;
                self.idx -= 32;
            }
            16..=31 => {
                let start = self.byte_idx() - 1;
                let mut buf = [0u8; 2];
                buf.copy_from_slice(&self.source[start..start + 2]);
                self.bit_container <<= 16;
                self.bits_in_container += 16;
                self.bit_container |= u16::from_le_bytes(buf) as u64;
                self.idx -= 16;
            }
            8..=15 => {
                self.bit_container <<= 8;
                self.bits_in_container += 8;
                self.bit_container |= self.source[self.byte_idx()] as u64;
                self.idx -= 8;
            }
            _ => unreachable!("refill is only called while at least 8 bits remain"),
        }
    }

    /// Read and consume `n` bits (`n <= 64`), MSB-first from the current
    /// container position. Past the sentinel, returns emulated zero bits.
    pub fn get_bits(&mut self, n: usize) -> Result<u64, Error> {
        if n == 0 {
            return Ok(0);
        }
        if n > 64 {
            return Err(Error::Unsupported {
                context: "reverse bit reader is limited to 64 bits per read",
            });
        }

        let n = n as isize;

        if self.bits_remaining() <= 0 {
            self.idx -= n;
            return Ok(0);
        }

        if self.bits_remaining() < n {
            let emulated_read_shift = n - self.bits_remaining();
            let v = self.get_bits(self.bits_remaining() as usize)?;
            let value = v << emulated_read_shift;
            self.idx -= emulated_read_shift;
            return Ok(value);
        }

        if (self.bits_in_container as isize) < n {
            while self.bits_in_container <= 56 && (self.bits_in_container as isize) < n {
                self.refill_container();
            }
            if (self.bits_in_container as isize) < n {
                return Err(Error::Unsupported {
                    context: "reverse bit reader could not refill enough bits",
                });
            }
        }

        let value = self.bit_container >> (self.bits_in_container as isize - n);
        self.bits_in_container -= n as u8;
        let value_masked = if n == 64 { value } else { value & ((1u64 << n) - 1) };

        Ok(value_masked)
    }

    pub fn reset(&mut self, new_source: &'s [u8]) {
        self.idx = new_source.len() as isize * 8;
        self.source = new_source;
        self.bit_container = 0;
        self.bits_in_container = 0;
    }

    /// Skip the implicit `1` sentinel bit plus any padding zero bits that
    /// precede it, as found at the very end (logically: the start) of a
    /// reverse bitstream. Returns an error if more than a byte of padding
    /// is found, which indicates corruption.
    pub fn skip_sentinel(&mut self) -> Result<(), Error> {
        let mut skipped = 0;
        loop {
            let val = self.get_bits(1)?;
            skipped += 1;
            if val == 1 || skipped > 8 {
                break;
            }
        }
        if skipped > 8 {
            return Err(Error::InvalidBackReference {
                context: "reverse bitstream padding was more than a byte long".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_single_byte() {
        // 0b1010_1100, sentinel is the leading 1, data bits below it: 010_1100
        let mut r = BitReaderReversed::new(&[0b1010_1100]);
        assert_eq!(r.get_bits(1).unwrap(), 1);
        assert_eq!(r.get_bits(3).unwrap(), 0b010);
        assert_eq!(r.get_bits(4).unwrap(), 0b1100);
    }

    #[test]
    fn refills_across_bytes() {
        let data = [0xFF, 0x00, 0b1000_0001];
        let mut r = BitReaderReversed::new(&data);
        // highest byte first: 1000_0001
        assert_eq!(r.get_bits(8).unwrap(), 0b1000_0001);
        assert_eq!(r.get_bits(8).unwrap(), 0x00);
        assert_eq!(r.get_bits(8).unwrap(), 0xFF);
    }

    #[test]
    fn emulates_zero_past_sentinel() {
        // sentinel bit only, no data bits below it
        let mut r = BitReaderReversed::new(&[0b1000_0000]);
        assert_eq!(r.get_bits(1).unwrap(), 1);
        // nothing left; further reads are emulated zeros
        assert_eq!(r.get_bits(8).unwrap(), 0);
        assert!(r.bits_remaining() < 0);
    }
}
