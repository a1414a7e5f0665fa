//! Row-oriented bit storage with a shared slot budget
//!
//! A buffer owns a list of logical rows. Each row is a growable byte vector,
//! but capacity is still accounted in fixed-size physical slots of
//! `BITBUF_COLS` bytes: a row longer than one slot consumes the following
//! slots ("row spill"), and all rows together may use at most `BITBUF_ROWS`
//! slots. Running out of slots or hitting the per-row bit ceiling never
//! corrupts the buffer; the request is refused and reported to the caller.

use thiserror::Error;
use tracing::{debug, warn};

/// Bytes per physical slot
pub const BITBUF_COLS: usize = 128;

/// Number of physical slots in a buffer
pub const BITBUF_ROWS: usize = 64;

/// Bit length ceiling of one logical row (row lengths are 16 bit on the wire side)
pub const BITBUF_MAX_ROW_BITS: usize = u16::MAX as usize;

/// Rows up to this many bits get a binary column in debug dumps
pub const BITBUF_MAX_PRINT_BITS: usize = 50;

static EMPTY_ROW: BitRow = BitRow {
    bytes: Vec::new(),
    len: 0,
};

/// Capacity exhaustion reported by the growth operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CapacityError {
    #[error("row length limit ({0} bits) reached")]
    RowFull(usize),
    #[error("row count limit ({0} slots) reached")]
    OutOfSlots(usize),
}

/// One logical row of bits, packed MSB-first.
///
/// `bytes` always holds exactly `ceil(len / 8)` bytes and the pad bits after
/// `len` in the last byte are zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitRow {
    pub(super) bytes: Vec<u8>,
    pub(super) len: usize,
}

impl BitRow {
    /// Number of valid bits
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Backing bytes, `ceil(len / 8)` of them
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Bit at `pos` (0 or 1). Positions past the stored bytes read as 0.
    #[inline]
    pub fn bit(&self, pos: usize) -> u8 {
        self.byte_at(pos / 8) >> (7 - (pos % 8)) & 1
    }

    /// Byte at `index`, or 0 past the end of the row
    #[inline]
    pub(super) fn byte_at(&self, index: usize) -> u8 {
        self.bytes.get(index).copied().unwrap_or(0)
    }

    pub(super) fn push(&mut self, bit: bool) {
        let bit_index = self.len % 8;
        if bit_index == 0 {
            self.bytes.push(0);
        }
        if bit {
            self.bytes[self.len / 8] |= 0x80 >> bit_index;
        }
        self.len += 1;
    }

    /// Truncate or zero-extend to `width` bits
    pub(super) fn resize(&mut self, width: usize) {
        let num_bytes = (width + 7) / 8;
        if width < self.len {
            // whole bytes past the new width go away, then mask the partial one
            self.bytes.truncate(num_bytes);
            mask_tail(&mut self.bytes, width);
        } else {
            self.bytes.resize(num_bytes, 0);
        }
        self.len = width;
    }

    pub(super) fn clear(&mut self) {
        self.bytes.clear();
        self.len = 0;
    }
}

/// Zero the pad bits after `bits` in the last byte of `bytes`.
pub(super) fn mask_tail(bytes: &mut [u8], bits: usize) {
    let used = bits % 8;
    if used == 0 {
        return;
    }
    if let Some(last) = bytes.get_mut((bits - 1) / 8) {
        *last &= 0xFF << (8 - used);
    }
}

/// Two-dimensional bit buffer: a bounded list of bit rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitBuffer {
    pub(super) rows: Vec<BitRow>,
    /// Bytes per physical slot
    cols: usize,
    /// Physical slots available to all rows
    max_slots: usize,
}

impl BitBuffer {
    /// Create an empty buffer with the default geometry
    pub fn new() -> Self {
        Self::with_geometry(BITBUF_ROWS, BITBUF_COLS)
    }

    /// Create an empty buffer with `slots` physical slots of `cols` bytes each
    pub fn with_geometry(slots: usize, cols: usize) -> Self {
        Self {
            rows: Vec::new(),
            cols: cols.max(1),
            max_slots: slots.max(1),
        }
    }

    /// Drop all rows
    pub fn clear(&mut self) {
        self.rows.clear();
    }

    /// Number of logical rows
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[BitRow] {
        &self.rows
    }

    pub fn row(&self, row: usize) -> Option<&BitRow> {
        self.rows.get(row)
    }

    /// Row `row`, or an empty row when out of range
    pub(super) fn row_or_empty(&self, row: usize) -> &BitRow {
        self.rows.get(row).unwrap_or(&EMPTY_ROW)
    }

    /// Bit length of `row` (0 when out of range)
    pub fn bits_per_row(&self, row: usize) -> usize {
        self.row_or_empty(row).len()
    }

    /// Bit capacity of one physical slot
    pub fn slot_bits(&self) -> usize {
        self.cols * 8
    }

    pub fn max_slots(&self) -> usize {
        self.max_slots
    }

    /// Physical slots consumed by all rows, spilled slots included
    pub fn slots_used(&self) -> usize {
        self.rows.iter().map(|r| self.slots_for(r.len())).sum()
    }

    fn slots_for(&self, bits: usize) -> usize {
        if bits == 0 {
            1
        } else {
            (bits - 1) / self.slot_bits() + 1
        }
    }

    /// Open the first row if the buffer has none
    pub(super) fn ensure_row(&mut self) {
        if self.rows.is_empty() {
            self.rows.push(BitRow::default());
        }
    }

    /// Append one bit to the last row.
    ///
    /// A row that reached `BITBUF_MAX_ROW_BITS`, or that needs another slot
    /// when none is left, is left untouched and the error says which limit hit.
    pub fn add_bit(&mut self, bit: u8) -> Result<(), CapacityError> {
        self.ensure_row();
        let last = self.rows.len() - 1;
        let len = self.rows[last].len();

        if len >= BITBUF_MAX_ROW_BITS {
            return Err(CapacityError::RowFull(BITBUF_MAX_ROW_BITS));
        }
        if len == BITBUF_MAX_ROW_BITS - 1 {
            warn!("Row length limit ({} bits) reached", BITBUF_MAX_ROW_BITS);
        }

        // spill into the next slot
        if len > 0 && len % self.slot_bits() == 0 {
            let used = self.slots_used();
            if used >= self.max_slots {
                return Err(CapacityError::OutOfSlots(self.max_slots));
            }
            if used + 1 == self.max_slots {
                warn!("Row count limit ({} slots) reached", self.max_slots);
            }
        }

        self.rows[last].push(bit != 0);
        Ok(())
    }

    /// Close the current row and open a new empty one.
    ///
    /// Without a free slot the current row is emptied instead, so a flood of
    /// short rows degrades to losing the newest data.
    pub fn add_row(&mut self) -> Result<(), CapacityError> {
        self.ensure_row();
        let used = self.slots_used();
        if used < self.max_slots {
            if used + 1 == self.max_slots {
                warn!("Row count limit ({} slots) reached", self.max_slots);
            }
            self.rows.push(BitRow::default());
            Ok(())
        } else {
            debug!("Could not add more rows, clearing row {}", self.rows.len() - 1);
            if let Some(row) = self.rows.last_mut() {
                row.clear();
            }
            Err(CapacityError::OutOfSlots(self.max_slots))
        }
    }

    /// Force the current row to `width` bits, truncating or zero-extending.
    ///
    /// The width is clamped to the bits the remaining slots can hold and to
    /// `BITBUF_MAX_ROW_BITS`. Returns the width actually applied.
    pub fn set_width(&mut self, width: usize) -> usize {
        self.ensure_row();
        let last = self.rows.len() - 1;
        let before: usize = self.rows[..last]
            .iter()
            .map(|r| self.slots_for(r.len()))
            .sum();
        let remaining_bits = self.max_slots.saturating_sub(before) * self.slot_bits();
        let width = width.min(remaining_bits).min(BITBUF_MAX_ROW_BITS);

        self.rows[last].resize(width);
        width
    }
}

impl Default for BitBuffer {
    fn default() -> Self {
        Self::new()
    }
}
