//! Bit-aligned byte extraction and bit-pattern search

use super::store::BitBuffer;

/// Bit `pos` of an MSB-first byte slice, 0 past the end
#[inline]
pub(crate) fn bit_at(bytes: &[u8], pos: usize) -> u8 {
    bytes.get(pos / 8).map_or(0, |b| b >> (7 - (pos % 8)) & 1)
}

impl BitBuffer {
    /// Copy `len` bits of `row` starting at bit `pos` into byte-aligned output.
    ///
    /// Returns `ceil(len / 8)` bytes; unused low bits of the last byte are
    /// zero. Reading past the row yields zero bits, so bounds are the caller's
    /// business.
    pub fn extract_bytes(&self, row: usize, pos: usize, len: usize) -> Vec<u8> {
        let bits = self.row_or_empty(row);
        let num_bytes = (len + 7) / 8;
        let mut out = vec![0u8; num_bytes];
        if len == 0 {
            return out;
        }

        if pos % 8 == 0 {
            let src = bits.bytes().get(pos / 8..).unwrap_or(&[]);
            let n = num_bytes.min(src.len());
            out[..n].copy_from_slice(&src[..n]);
        } else {
            let shift = 8 - (pos % 8);
            let mut index = pos / 8;
            let mut word = bits.byte_at(index) as u16;
            for o in out.iter_mut() {
                index += 1;
                word = (word << 8) | bits.byte_at(index) as u16;
                *o = (word >> shift) as u8;
            }
        }

        if len % 8 != 0 {
            out[num_bytes - 1] &= (0xFF00u16 >> (len % 8)) as u8;
        }
        out
    }

    /// Find the first offset `>= start` in `row` where the first
    /// `pattern_bits` bits of `pattern` match.
    ///
    /// Returns the row's bit length when there is no match; use [`find`]
    /// for an `Option`.
    ///
    /// [`find`]: BitBuffer::find
    pub fn search(&self, row: usize, start: usize, pattern: &[u8], pattern_bits: usize) -> usize {
        let bits = self.row_or_empty(row);
        let len = bits.len();
        let mut ipos = start;
        let mut ppos = 0; // cursor on pattern

        while ipos < len && ppos < pattern_bits {
            if bits.bit(ipos) == bit_at(pattern, ppos) {
                ppos += 1;
                ipos += 1;
                if ppos == pattern_bits {
                    return ipos - pattern_bits;
                }
            } else {
                // retry one bit after the start of the failed attempt
                ipos = ipos - ppos + 1;
                ppos = 0;
            }
        }

        len
    }

    /// Like [`search`](BitBuffer::search) but `None` when not found
    pub fn find(&self, row: usize, start: usize, pattern: &[u8], pattern_bits: usize) -> Option<usize> {
        let pos = self.search(row, start, pattern, pattern_bits);
        (pos < self.bits_per_row(row)).then_some(pos)
    }
}
