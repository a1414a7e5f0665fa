//! Line-code transforms over single rows
//!
//! Inversion and the NRZ decoders rewrite a row in place. The Manchester
//! decoders read 2-bit symbols from a row and append the recovered bits to a
//! second buffer, returning the input offset they stopped at so the caller can
//! tell a complete decode from a desync.

use super::store::{mask_tail, BitBuffer, BitRow};

/// Differential NRZ flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NrzMode {
    /// NRZ-S: no level change decodes as 1, a change as 0
    Space,
    /// NRZ-M: a level change decodes as 1, no change as 0
    Mark,
}

/// Decode one byte of a differential NRZ stream.
///
/// `carry` is the last raw bit of the previous byte (0 before the first byte).
#[inline]
pub fn nrz_decode_byte(cur: u8, carry: u8, mode: NrzMode) -> u8 {
    let prev = (carry & 1) << 7 | cur >> 1;
    match mode {
        NrzMode::Space => cur ^ !prev,
        NrzMode::Mark => cur ^ prev,
    }
}

/// Decode the first `bits` bits of `bytes`, returning new bytes with the pad
/// bits of the last byte cleared.
pub fn nrz_decode(bytes: &[u8], bits: usize, mode: NrzMode) -> Vec<u8> {
    let num_bytes = ((bits + 7) / 8).min(bytes.len());
    let mut carry = 0u8;
    let mut out: Vec<u8> = bytes[..num_bytes]
        .iter()
        .map(|&cur| {
            let decoded = nrz_decode_byte(cur, carry, mode);
            carry = cur & 1;
            decoded
        })
        .collect();
    mask_tail(&mut out, bits);
    out
}

fn invert_bits(row: &mut BitRow) {
    if row.len == 0 {
        return;
    }
    let last_col = (row.len - 1) / 8;
    let last_bits = (row.len - 1) % 8 + 1;
    for b in &mut row.bytes[..=last_col] {
        *b = !*b;
    }
    // flip the pad bits back to zero
    row.bytes[last_col] ^= 0xFFu8.checked_shr(last_bits as u32).unwrap_or(0);
}

fn nrz_decode_bits(row: &mut BitRow, mode: NrzMode) {
    if row.len > 0 {
        row.bytes = nrz_decode(&row.bytes, row.len, mode);
    }
}

/// Input bound for the Manchester decoders: at most `2 * max` bits past `start`
fn input_limit(len: usize, start: usize, max: Option<usize>) -> usize {
    match max {
        Some(max) => len.min(start.saturating_add(max.saturating_mul(2))),
        None => len,
    }
}

impl BitBuffer {
    /// Invert every valid bit of every row
    pub fn invert(&mut self) {
        self.rows.iter_mut().for_each(invert_bits);
    }

    /// Invert every valid bit of `row`
    pub fn invert_row(&mut self, row: usize) {
        if let Some(r) = self.rows.get_mut(row) {
            invert_bits(r);
        }
    }

    /// NRZ-S decode every row
    pub fn nrzs_decode(&mut self) {
        for r in &mut self.rows {
            nrz_decode_bits(r, NrzMode::Space);
        }
    }

    /// NRZ-M decode every row
    pub fn nrzm_decode(&mut self) {
        for r in &mut self.rows {
            nrz_decode_bits(r, NrzMode::Mark);
        }
    }

    /// NRZ decode a single row in place
    pub fn nrz_decode_row(&mut self, row: usize, mode: NrzMode) {
        if let Some(r) = self.rows.get_mut(row) {
            nrz_decode_bits(r, mode);
        }
    }

    /// Manchester decode `row` from bit `start` into `out`.
    ///
    /// Each symbol is two bits of opposite value and yields its second bit
    /// (`01` -> 1, `10` -> 0). Stops at the first `00`/`11` symbol, when fewer
    /// than two input bits remain, or after `max` output bits. Returns the
    /// offset of the first symbol not decoded. On an invalid symbol that is
    /// the start of the pair, 2 lower than the offset rtl_433 style decoders
    /// report.
    pub fn manchester_decode(
        &self,
        row: usize,
        start: usize,
        out: &mut BitBuffer,
        max: Option<usize>,
    ) -> usize {
        let bits = self.row_or_empty(row);
        let len = input_limit(bits.len(), start, max);
        let mut ipos = start;

        while len.saturating_sub(ipos) >= 2 {
            let bit1 = bits.bit(ipos);
            let bit2 = bits.bit(ipos + 1);
            if bit1 == bit2 {
                break;
            }
            if out.add_bit(bit2).is_err() {
                break;
            }
            ipos += 2;
        }

        ipos
    }

    /// Differential Manchester decode `row` from bit `start` into `out`.
    ///
    /// Every bit cell starts with a transition; a further mid-cell transition
    /// encodes 0, none encodes 1. The first long pulse sets the clock phase,
    /// skipping short pulses (decoded as 0) until then. Only cells fully inside
    /// the row are decoded. Returns the offset of the first cell not decoded:
    /// the cell lacking its clock transition, the trailing partial cell, or the
    /// end of input.
    pub fn differential_manchester_decode(
        &self,
        row: usize,
        start: usize,
        out: &mut BitBuffer,
        max: Option<usize>,
    ) -> usize {
        let bits = self.row_or_empty(row);
        let len = input_limit(bits.len(), start, max);
        let mut ipos = start;

        // clock recovery
        let mut reference = loop {
            if len.saturating_sub(ipos) < 2 {
                return ipos;
            }
            let bit1 = bits.bit(ipos);
            let bit2 = bits.bit(ipos + 1);
            if bit1 == bit2 {
                break 1 - bit1;
            }

            // a short pulse needs the next bit to tell its phase
            if len - ipos < 3 {
                return ipos;
            }
            let bit3 = bits.bit(ipos + 2);
            if bit2 == bit3 {
                ipos += 1;
                break bit1;
            }
            if out.add_bit(0).is_err() {
                return ipos;
            }
            ipos += 2;
        };

        while len.saturating_sub(ipos) >= 2 {
            let bit1 = bits.bit(ipos);
            if bit1 == reference {
                break; // clock missing
            }
            let bit2 = bits.bit(ipos + 1);
            if out.add_bit(u8::from(bit1 == bit2)).is_err() {
                break;
            }
            reference = bit2;
            ipos += 2;
        }

        ipos
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row_bits(bits: &BitBuffer, row: usize) -> Vec<u8> {
        let r = &bits.rows()[row];
        (0..r.len()).map(|i| r.bit(i)).collect()
    }

    fn from_bits(pattern: &[u8]) -> BitBuffer {
        let mut bits = BitBuffer::new();
        for &b in pattern {
            bits.add_bit(b).unwrap();
        }
        bits
    }

    /// IEEE 802.3 style: 1 -> 01, 0 -> 10
    fn manchester_encode(data: &[u8]) -> Vec<u8> {
        data.iter().flat_map(|&b| [1 - b, b]).collect()
    }

    #[test]
    fn test_invert_masks_padding() {
        let mut bits = BitBuffer::parse("{12}f0f");
        bits.invert();
        assert_eq!(bits.bits_per_row(0), 12);
        assert_eq!(bits.rows()[0].bytes(), &[0x0F, 0x00]);
    }

    #[test]
    fn test_invert_twice_is_identity() {
        let original = BitBuffer::parse("{13}a5c8 {7}fe {0}");
        let mut bits = original.clone();
        bits.invert();
        assert_ne!(bits, original);
        bits.invert();
        assert_eq!(bits, original);
    }

    #[test]
    fn test_invert_row_only_touches_that_row() {
        let mut bits = BitBuffer::parse("{8}00 {8}00");
        bits.invert_row(1);
        assert_eq!(bits.rows()[0].bytes(), &[0x00]);
        assert_eq!(bits.rows()[1].bytes(), &[0xFF]);
        // out of range is a no-op
        bits.invert_row(7);
    }

    #[test]
    fn test_nrz_decode_byte_carry() {
        // previous byte ended high, current starts high: no transition
        assert_eq!(nrz_decode_byte(0x80, 1, NrzMode::Mark) & 0x80, 0x00);
        assert_eq!(nrz_decode_byte(0x80, 1, NrzMode::Space) & 0x80, 0x80);
        // previous byte ended low: transition
        assert_eq!(nrz_decode_byte(0x80, 0, NrzMode::Mark) & 0x80, 0x80);
        assert_eq!(nrz_decode_byte(0x80, 0, NrzMode::Space) & 0x80, 0x00);
    }

    #[test]
    fn test_nrzm_decode() {
        // levels 0 1 1 0 0 0 1 0 | 1 1
        let mut bits = from_bits(&[0, 1, 1, 0, 0, 0, 1, 0, 1, 1]);
        bits.nrzm_decode();
        // transitions from an initial low level
        assert_eq!(row_bits(&bits, 0), vec![0, 1, 0, 1, 0, 0, 1, 1, 1, 0]);
        assert_eq!(bits.rows()[0].bytes()[1] & 0x3F, 0);
    }

    #[test]
    fn test_nrzs_decode() {
        let mut bits = from_bits(&[0, 1, 1, 0, 0, 0, 1, 0, 1, 1]);
        bits.nrzs_decode();
        assert_eq!(row_bits(&bits, 0), vec![1, 0, 1, 0, 1, 1, 0, 0, 0, 1]);
        assert_eq!(bits.rows()[0].bytes()[1] & 0x3F, 0);
    }

    #[test]
    fn test_nrz_decode_pure() {
        let raw = hex::decode("b2c0").unwrap();
        let decoded = nrz_decode(&raw, 10, NrzMode::Mark);
        let mut bits = BitBuffer::parse("{10}b2c0");
        bits.nrz_decode_row(0, NrzMode::Mark);
        assert_eq!(bits.rows()[0].bytes(), decoded.as_slice());
        // the input is left alone
        assert_eq!(raw, vec![0xB2, 0xC0]);
    }

    #[test]
    fn test_manchester_decode() {
        let data = [1, 0, 1, 1, 0, 0, 1];
        let bits = from_bits(&manchester_encode(&data));
        let mut out = BitBuffer::new();
        let end = bits.manchester_decode(0, 0, &mut out, None);
        assert_eq!(end, data.len() * 2);
        assert_eq!(row_bits(&out, 0), data.to_vec());
    }

    #[test]
    fn test_manchester_decode_stops_on_invalid_symbol() {
        let mut symbols = manchester_encode(&[1, 1, 0]);
        symbols.extend_from_slice(&[1, 1]);
        symbols.extend(manchester_encode(&[0, 1]));
        let bits = from_bits(&symbols);
        let mut out = BitBuffer::new();
        let end = bits.manchester_decode(0, 0, &mut out, None);
        assert_eq!(end, 6);
        assert_eq!(row_bits(&out, 0), vec![1, 1, 0]);
    }

    #[test]
    fn test_manchester_decode_stops_on_zero_symbol() {
        let mut symbols = manchester_encode(&[0, 1]);
        symbols.extend_from_slice(&[0, 0]);
        symbols.extend(manchester_encode(&[1]));
        let bits = from_bits(&symbols);
        let mut out = BitBuffer::new();
        let end = bits.manchester_decode(0, 0, &mut out, None);
        assert_eq!(end, 4);
        assert_eq!(row_bits(&out, 0), vec![0, 1]);
    }

    #[test]
    fn test_manchester_decode_start_past_end() {
        let bits = BitBuffer::parse("{8}a5");
        let mut out = BitBuffer::new();
        assert_eq!(bits.manchester_decode(0, usize::MAX - 1, &mut out, None), usize::MAX - 1);
        assert_eq!(
            bits.differential_manchester_decode(0, usize::MAX - 1, &mut out, Some(4)),
            usize::MAX - 1
        );
        assert!(out.is_empty());
    }

    #[test]
    fn test_manchester_decode_with_offset_and_max() {
        let mut symbols = vec![1, 1, 1];
        symbols.extend(manchester_encode(&[0, 1, 1, 0]));
        let bits = from_bits(&symbols);
        let mut out = BitBuffer::new();
        let end = bits.manchester_decode(0, 3, &mut out, Some(2));
        assert_eq!(end, 7);
        assert_eq!(row_bits(&out, 0), vec![0, 1]);
    }

    #[test]
    fn test_manchester_decode_ignores_trailing_half_symbol() {
        let mut symbols = manchester_encode(&[1, 0]);
        symbols.push(0);
        let bits = from_bits(&symbols);
        let mut out = BitBuffer::new();
        assert_eq!(bits.manchester_decode(0, 0, &mut out, None), 4);
        assert_eq!(out.bits_per_row(0), 2);
    }

    #[test]
    fn test_differential_manchester_decode() {
        // 11 00 10 11 carries 1 1 0 1
        let bits = BitBuffer::parse("{8}cb");
        let mut out = BitBuffer::new();
        let end = bits.differential_manchester_decode(0, 0, &mut out, None);
        assert_eq!(end, 8);
        assert_eq!(row_bits(&out, 0), vec![1, 1, 0, 1]);
    }

    #[test]
    fn test_differential_manchester_missing_clock() {
        // 11 11 10 11: second cell lacks its leading transition
        let bits = BitBuffer::parse("{8}fb");
        let mut out = BitBuffer::new();
        let end = bits.differential_manchester_decode(0, 0, &mut out, None);
        assert_eq!(end, 2);
        assert_eq!(row_bits(&out, 0), vec![1]);
    }

    #[test]
    fn test_differential_manchester_missing_clock_on_last_cell() {
        // 11 00 10 11 | 11
        let bits = BitBuffer::parse("{10}cbc0");
        let mut out = BitBuffer::new();
        let end = bits.differential_manchester_decode(0, 0, &mut out, None);
        assert_eq!(end, 8);
        assert_eq!(row_bits(&out, 0), vec![1, 1, 0, 1]);
    }

    #[test]
    fn test_differential_manchester_stays_inside_row() {
        // short pulses only; the final pair has no lookahead bit
        let bits = BitBuffer::parse("{8}aa");
        let mut out = BitBuffer::new();
        let end = bits.differential_manchester_decode(0, 0, &mut out, None);
        assert_eq!(end, 6);
        assert_eq!(row_bits(&out, 0), vec![0, 0, 0]);

        // trailing half cell after a decoded cell
        let bits = BitBuffer::parse("{5}c8");
        let mut out = BitBuffer::new();
        let end = bits.differential_manchester_decode(0, 0, &mut out, None);
        assert_eq!(end, 4);
        assert_eq!(row_bits(&out, 0), vec![1, 1]);
    }

    #[test]
    fn test_differential_manchester_skips_short_pulse() {
        // 1 0 1 0 0 1 1: one short-pulse 0 during sync, then realign by one bit
        let bits = BitBuffer::parse("{7}a6");
        let mut out = BitBuffer::new();
        let end = bits.differential_manchester_decode(0, 0, &mut out, None);
        assert_eq!(end, 7);
        assert_eq!(row_bits(&out, 0), vec![0, 1, 1]);
    }

    #[test]
    fn test_decode_stops_when_output_is_full() {
        let bits = from_bits(&manchester_encode(&[1, 0, 1, 0]));
        let mut out = BitBuffer::with_geometry(1, 1);
        for _ in 0..7 {
            out.add_bit(0).unwrap();
        }
        // room for one more bit only
        let end = bits.manchester_decode(0, 0, &mut out, None);
        assert_eq!(end, 2);
        assert_eq!(out.bits_per_row(0), 8);
    }
}
