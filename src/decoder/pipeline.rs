//! Capture decode pipeline
//!
//! One radio capture cycle in, at most one frame out:
//! - repeated-row selection rejects captures mangled by noise
//! - Invert / NRZ codes are undone in place on the chosen row
//! - an optional sync word marks where the payload starts
//! - Manchester codes are decoded from there into a fresh buffer
//! - the result is extracted as bytes for the message layer

use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, trace};

use crate::bitbuffer::{BitBuffer, NrzMode, ParseError};

/// Line code applied by the transmitter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LineCode {
    Raw,
    Invert,
    NrzS,
    NrzM,
    Manchester,
    DifferentialManchester,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown line code {0:?}")]
pub struct UnknownLineCode(pub String);

impl FromStr for LineCode {
    type Err = UnknownLineCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "raw" | "none" => Ok(Self::Raw),
            "invert" | "inv" => Ok(Self::Invert),
            "nrzs" | "nrz-s" => Ok(Self::NrzS),
            "nrzm" | "nrz-m" => Ok(Self::NrzM),
            "manchester" | "mc" => Ok(Self::Manchester),
            "dmc" | "differential-manchester" | "differential_manchester" => {
                Ok(Self::DifferentialManchester)
            }
            _ => Err(UnknownLineCode(s.to_string())),
        }
    }
}

impl fmt::Display for LineCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Raw => "raw",
            Self::Invert => "invert",
            Self::NrzS => "nrzs",
            Self::NrzM => "nrzm",
            Self::Manchester => "manchester",
            Self::DifferentialManchester => "dmc",
        };
        f.write_str(name)
    }
}

/// Bit pattern marking the start of the payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPattern {
    bytes: Vec<u8>,
    bits: usize,
}

impl SyncPattern {
    pub fn new(bytes: Vec<u8>, bits: usize) -> Self {
        Self { bytes, bits }
    }

    /// Parse from the textual bit format, e.g. `{16}aaab`. Only the first row counts.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let bits = BitBuffer::parse_strict(text)?;
        let row = bits.row(0).cloned().unwrap_or_default();
        Ok(Self::new(row.bytes().to_vec(), row.len()))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn bits(&self) -> usize {
        self.bits
    }
}

/// Pipeline settings
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub line_code: LineCode,
    /// A row must occur at least this often to be trusted
    pub min_repeats: usize,
    /// Ignore rows shorter than this
    pub min_bits: usize,
    pub sync: Option<SyncPattern>,
    /// Cap on decoded bits (None = whole row)
    pub max_bits: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            line_code: LineCode::Manchester,
            min_repeats: 2,
            min_bits: 16,
            sync: None,
            max_bits: None,
        }
    }
}

/// Decoded payload of one capture
#[derive(Debug, Clone, Serialize)]
pub struct DecodedFrame {
    /// Index of the trusted row in the capture
    pub row: usize,
    /// How often that row occurred
    pub repeats: usize,
    pub line_code: LineCode,
    /// Number of valid bits in `data`
    pub bits: usize,
    #[serde(serialize_with = "serialize_hex")]
    pub data: Vec<u8>,
    /// False when the line decoder stopped before the end of its input
    pub complete: bool,
    pub timestamp_ms: u64,
}

impl DecodedFrame {
    pub fn to_hex(&self) -> String {
        hex::encode(&self.data)
    }
}

fn serialize_hex<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex::encode(data))
}

/// Pipeline counters
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PipelineStats {
    pub captures: u64,
    pub frames_decoded: u64,
    pub no_repeated_row: u64,
    pub sync_missing: u64,
    pub partial_decodes: u64,
}

impl fmt::Display for PipelineStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "captures={} frames={} no_repeat={} no_sync={} partial={}",
            self.captures,
            self.frames_decoded,
            self.no_repeated_row,
            self.sync_missing,
            self.partial_decodes
        )
    }
}

/// Turns captures into frames
pub struct DecodePipeline {
    config: PipelineConfig,
    stats: PipelineStats,
}

impl DecodePipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            stats: PipelineStats::default(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = PipelineStats::default();
    }

    /// Decode one capture. The capture is consumed since in-place line codes rewrite it.
    pub fn process(&mut self, mut capture: BitBuffer) -> Option<DecodedFrame> {
        self.stats.captures += 1;

        let Some(row) = capture.find_repeated_row(self.config.min_repeats, self.config.min_bits)
        else {
            self.stats.no_repeated_row += 1;
            debug!(
                "No row of >= {} bits repeated {} times ({} rows)",
                self.config.min_bits,
                self.config.min_repeats,
                capture.num_rows()
            );
            return None;
        };
        let repeats = capture.count_repeats(row);

        match self.config.line_code {
            LineCode::Invert => capture.invert_row(row),
            LineCode::NrzS => capture.nrz_decode_row(row, NrzMode::Space),
            LineCode::NrzM => capture.nrz_decode_row(row, NrzMode::Mark),
            _ => {}
        }

        let row_bits = capture.bits_per_row(row);
        let start = match &self.config.sync {
            Some(sync) => match capture.find(row, 0, sync.bytes(), sync.bits()) {
                Some(pos) => pos + sync.bits(),
                None => {
                    self.stats.sync_missing += 1;
                    debug!("Sync pattern not found in row {} ({} bits)", row, row_bits);
                    return None;
                }
            },
            None => 0,
        };

        let max_bits = self.config.max_bits;
        let (data, bits, complete) = match self.config.line_code {
            LineCode::Manchester | LineCode::DifferentialManchester => {
                let mut decoded = BitBuffer::new();
                let end = if self.config.line_code == LineCode::Manchester {
                    capture.manchester_decode(row, start, &mut decoded, max_bits)
                } else {
                    capture.differential_manchester_decode(row, start, &mut decoded, max_bits)
                };
                let expected = match max_bits {
                    Some(max) => row_bits.min(start.saturating_add(max.saturating_mul(2))),
                    None => row_bits,
                };
                let bits = decoded.bits_per_row(0);
                // both decoders stop at the start of the first undecoded cell,
                // so only a trailing half cell may remain on a clean decode
                (decoded.extract_bytes(0, 0, bits), bits, end + 1 >= expected)
            }
            _ => {
                let available = row_bits.saturating_sub(start);
                let bits = max_bits.map_or(available, |max| available.min(max));
                (capture.extract_bytes(row, start, bits), bits, true)
            }
        };

        if !complete {
            self.stats.partial_decodes += 1;
        }
        self.stats.frames_decoded += 1;

        let frame = DecodedFrame {
            row,
            repeats,
            line_code: self.config.line_code,
            bits,
            data,
            complete,
            timestamp_ms: chrono::Utc::now().timestamp_millis() as u64,
        };
        trace!(
            "Frame from row {} (x{}): {{{}}} {}",
            frame.row,
            frame.repeats,
            frame.bits,
            frame.to_hex()
        );
        Some(frame)
    }
}
