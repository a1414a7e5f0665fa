//! Configuration loaded from environment variables

use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

use crate::capture::CaptureConfig;
use crate::decoder::{LineCode, PipelineConfig, SyncPattern};

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Capture file to decode, stdin when unset
    pub capture_path: Option<PathBuf>,

    /// Line code applied by the transmitter
    pub line_code: LineCode,

    /// Minimum number of identical rows per capture
    pub min_repeats: usize,

    /// Minimum row length in bits
    pub min_bits: usize,

    /// Sync word in the textual bit format, e.g. `{16}aaab`
    pub sync_pattern: Option<SyncPattern>,

    /// Cap on decoded bits per frame
    pub max_decoded_bits: Option<usize>,

    /// Reject malformed capture lines
    pub strict_parse: bool,

    /// Stats logging interval in seconds
    pub stats_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        let pipeline = PipelineConfig::default();
        Self {
            capture_path: None,
            line_code: pipeline.line_code,
            min_repeats: pipeline.min_repeats,
            min_bits: pipeline.min_bits,
            sync_pattern: pipeline.sync,
            max_decoded_bits: pipeline.max_bits,
            strict_parse: false,
            stats_interval_secs: 10,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key lookup. Unparseable values fall back
    /// to the default with a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Self {
            capture_path: lookup("CAPTURE_PATH")
                .filter(|s| !s.trim().is_empty() && s.trim() != "-")
                .map(PathBuf::from),

            line_code: parse_or("LINE_CODE", lookup("LINE_CODE"), defaults.line_code),

            min_repeats: parse_or("MIN_REPEATS", lookup("MIN_REPEATS"), defaults.min_repeats),

            min_bits: parse_or("MIN_BITS", lookup("MIN_BITS"), defaults.min_bits),

            sync_pattern: lookup("SYNC_PATTERN")
                .filter(|s| !s.trim().is_empty())
                .and_then(|s| match SyncPattern::parse(&s) {
                    Ok(sync) => Some(sync),
                    Err(e) => {
                        warn!("Ignoring SYNC_PATTERN={:?}: {}", s, e);
                        None
                    }
                }),

            max_decoded_bits: lookup("MAX_DECODED_BITS")
                .and_then(|s| parse_value("MAX_DECODED_BITS", &s))
                .filter(|&max: &usize| max > 0),

            strict_parse: lookup("STRICT_PARSE")
                .map(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
                .unwrap_or(defaults.strict_parse),

            stats_interval_secs: parse_or(
                "STATS_INTERVAL_SECS",
                lookup("STATS_INTERVAL_SECS"),
                defaults.stats_interval_secs,
            ),
        }
    }

    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            line_code: self.line_code,
            min_repeats: self.min_repeats,
            min_bits: self.min_bits,
            sync: self.sync_pattern.clone(),
            max_bits: self.max_decoded_bits,
        }
    }

    pub fn capture(&self) -> CaptureConfig {
        CaptureConfig {
            path: self.capture_path.clone(),
            strict: self.strict_parse,
        }
    }
}

fn parse_value<T>(key: &str, value: &str) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value.trim().parse() {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("Ignoring {}={:?}: {}", key, value, e);
            None
        }
    }
}

fn parse_or<T>(key: &str, value: Option<String>, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .and_then(|s| parse_value(key, &s))
        .unwrap_or(default)
}
