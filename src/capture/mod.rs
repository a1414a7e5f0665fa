//! Capture source
//!
//! Reads textual captures (one bit buffer per line, e.g.
//! `{36}1f c9 0c 00 22 f1 {36}1f c9 0c 00 22 f1`) from a file or stdin on a
//! dedicated thread and hands them to the decode loop.

mod reader;

pub use reader::{parse_capture_line, Capture, CaptureConfig, CaptureReader, CaptureStats};
