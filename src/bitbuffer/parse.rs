//! Textual ingestion: build a buffer from `{width}hex/hex...` strings
//!
//! Grammar, left to right, spaces ignored:
//! - `0x` / `0X` prefixes are skipped
//! - `{n}` starts a new row declared `n` bits wide; the width is applied when
//!   the next `{` or `/` is seen, or at end of input
//! - `/` applies any pending width and starts a new row
//! - each hex digit appends 4 bits, MSB first
//!
//! Lenient parsing never fails: unknown characters are skipped and an
//! unterminated `{` at the end is tolerated. Strict parsing reports both.

use std::str::FromStr;
use thiserror::Error;

use super::store::{BitBuffer, CapacityError, BITBUF_MAX_ROW_BITS};

/// Rejections raised by strict parsing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unexpected character {ch:?} at offset {offset}")]
    InvalidCharacter { ch: char, offset: usize },

    #[error("unterminated width specifier at offset {offset}")]
    UnterminatedWidth { offset: usize },

    #[error("row width {width} exceeds the {max} bit limit")]
    WidthTooLarge { width: usize, max: usize },

    #[error(transparent)]
    Capacity(#[from] CapacityError),
}

struct Parser {
    strict: bool,
}

impl Parser {
    /// Capacity errors only count in strict mode
    fn check(&self, result: Result<(), CapacityError>) -> Result<(), ParseError> {
        match result {
            Err(e) if self.strict => Err(e.into()),
            _ => Ok(()),
        }
    }

    fn run(&self, bits: &mut BitBuffer, code: &str) -> Result<(), ParseError> {
        bits.clear();

        let input = code.as_bytes();
        let mut width: Option<usize> = None;
        let mut i = 0;

        while i < input.len() {
            match input[i] {
                b' ' => i += 1,
                b'0' if matches!(input.get(i + 1), Some(b'x' | b'X')) => i += 2,
                b'{' => {
                    let open = i;
                    if let Some(w) = width {
                        bits.set_width(w);
                    }
                    if bits.is_empty() {
                        bits.ensure_row();
                    } else {
                        self.check(bits.add_row())?;
                    }

                    i += 1;
                    while input.get(i) == Some(&b' ') {
                        i += 1;
                    }
                    let mut w: usize = 0;
                    while let Some(d) = input.get(i).filter(|c| c.is_ascii_digit()) {
                        w = w.saturating_mul(10).saturating_add((d - b'0') as usize);
                        i += 1;
                    }
                    if w > BITBUF_MAX_ROW_BITS {
                        if self.strict {
                            return Err(ParseError::WidthTooLarge {
                                width: w,
                                max: BITBUF_MAX_ROW_BITS,
                            });
                        }
                        w = BITBUF_MAX_ROW_BITS;
                    }
                    width = Some(w);

                    match input.get(i) {
                        Some(b'}') => i += 1,
                        Some(_) if !self.strict => {}
                        None if !self.strict => break, // no closing brace and end of string
                        _ => return Err(ParseError::UnterminatedWidth { offset: open }),
                    }
                }
                b'/' => {
                    if let Some(w) = width.take() {
                        bits.set_width(w);
                    }
                    self.check(bits.add_row())?;
                    i += 1;
                }
                c if c.is_ascii_hexdigit() => {
                    let nibble = hex_value(c);
                    for shift in (0..4).rev() {
                        self.check(bits.add_bit(nibble >> shift & 1))?;
                    }
                    i += 1;
                }
                _ if self.strict => {
                    // only ASCII has been consumed so far, so `i` is a char boundary
                    let ch = code[i..].chars().next().unwrap_or('\u{FFFD}');
                    return Err(ParseError::InvalidCharacter { ch, offset: i });
                }
                _ => i += 1,
            }
        }

        if let Some(w) = width {
            bits.set_width(w);
        }
        Ok(())
    }
}

fn hex_value(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => c - b'0',
        b'a'..=b'f' => c - b'a' + 10,
        b'A'..=b'F' => c - b'A' + 10,
        _ => 0,
    }
}

impl BitBuffer {
    /// Parse the textual format, skipping anything not understood
    pub fn parse(code: &str) -> Self {
        let mut bits = Self::new();
        // lenient mode has no error path
        let _ = Parser { strict: false }.run(&mut bits, code);
        bits
    }

    /// Parse the textual format, rejecting malformed input
    pub fn parse_strict(code: &str) -> Result<Self, ParseError> {
        let mut bits = Self::new();
        Parser { strict: true }.run(&mut bits, code)?;
        Ok(bits)
    }

    /// Replace the contents of this buffer with parsed text, keeping its geometry
    pub fn load(&mut self, code: &str, strict: bool) -> Result<(), ParseError> {
        Parser { strict }.run(self, code)
    }
}

impl FromStr for BitBuffer {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_strict(s)
    }
}
