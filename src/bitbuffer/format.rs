//! Text rendering of rows and buffers
//!
//! `Display` produces the compact `{len} xx xx ..` dump that
//! [`BitBuffer::parse`] reads back. The `format_*` helpers add the debug
//! layout with row indices and a binary column.

use std::fmt;

use super::store::{BitBuffer, BitRow, BITBUF_MAX_PRINT_BITS};

impl BitRow {
    /// Valid bytes as lowercase hex without separators
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

impl fmt::Display for BitRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.len)?;
        for b in &self.bytes {
            write!(f, " {:02x}", b)?;
        }
        Ok(())
    }
}

impl fmt::Display for BitBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, row) in self.rows.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", row)?;
        }
        Ok(())
    }
}

fn push_row(out: &mut String, row: &BitRow, indent: usize, always_binary: bool) {
    out.push_str(&format!("{{{:2}}} ", row.len()));
    let mut hex_width = 0;
    for b in row.bytes() {
        out.push_str(&format!("{:02x} ", b));
        hex_width += 3;
    }

    if always_binary || row.len() <= BITBUF_MAX_PRINT_BITS {
        out.push_str(&format!("{:pad$}: ", "", pad = indent.saturating_sub(hex_width)));
        for pos in 0..row.len() {
            out.push(if row.bit(pos) == 1 { '1' } else { '0' });
            if pos % 8 == 7 {
                out.push(' ');
            }
        }
    }
}

/// One row as `{len} xx xx .. : bits`. The binary column is shown for short
/// rows, or always with `always_binary`.
pub fn format_row(row: &BitRow, always_binary: bool) -> String {
    let mut out = String::new();
    push_row(&mut out, row, 0, always_binary);
    out
}

/// Multi-line dump of every row, binary columns aligned
pub fn format_buffer(bits: &BitBuffer, always_binary: bool) -> String {
    let indent = bits
        .rows()
        .iter()
        .map(|r| r.bytes().len() * 3)
        .fold("[dd] {dd} ".len(), usize::max);

    let mut out = format!("bitbuffer:: Number of rows: {}\n", bits.num_rows());
    for (i, row) in bits.rows().iter().enumerate() {
        out.push_str(&format!("[{:02}] ", i));
        push_row(&mut out, row, indent, always_binary);
        out.push('\n');
    }
    if bits.slots_used() >= bits.max_slots() {
        out.push_str("... Maximum number of rows reached. Message is likely truncated.\n");
    }
    out
}
