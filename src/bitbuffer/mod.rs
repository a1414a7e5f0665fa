//! Two-dimensional bit buffer and line decoders
//!
//! Raw demodulated bits land here row by row, one row per received
//! transmission. From there:
//! 1. Pick the transmission that repeats ([`BitBuffer::find_repeated_row`])
//! 2. Undo the line code (invert, NRZ-S/NRZ-M, Manchester, differential Manchester)
//! 3. Locate sync words ([`BitBuffer::search`]) and pull out bytes
//!    ([`BitBuffer::extract_bytes`]) for the message layer
//!
//! Buffers can also be built from text (`{36}1f c9 0c 00 22 f1`) for fixtures
//! and offline decoding.

mod extract;
mod format;
mod linecode;
mod parse;
mod repeat;
mod store;

pub use format::{format_buffer, format_row};
pub use linecode::{nrz_decode, nrz_decode_byte, NrzMode};
pub use parse::ParseError;
pub use store::{
    BitBuffer, BitRow, CapacityError, BITBUF_COLS, BITBUF_MAX_PRINT_BITS, BITBUF_MAX_ROW_BITS,
    BITBUF_ROWS,
};
