//! Capture reader thread

use anyhow::{Context, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, info, warn};

use crate::bitbuffer::{BitBuffer, ParseError};

/// One received capture cycle
#[derive(Debug, Clone)]
pub struct Capture {
    /// 1-based line number in the source
    pub line: u64,
    pub bits: BitBuffer,
}

/// Capture source settings
#[derive(Debug, Clone, Default)]
pub struct CaptureConfig {
    /// Capture file, stdin when unset
    pub path: Option<PathBuf>,
    /// Reject malformed lines instead of skipping unknown characters
    pub strict: bool,
}

/// Statistics for the reader (atomic for thread-safe access)
#[derive(Debug, Default)]
pub struct CaptureStats {
    pub lines_read: AtomicU64,
    pub captures_parsed: AtomicU64,
    pub parse_errors: AtomicU64,
}

impl CaptureStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

/// Parse one line of a capture file.
///
/// Blank lines and `#` comments carry no capture and yield `Ok(None)`.
pub fn parse_capture_line(line: &str, strict: bool) -> Result<Option<BitBuffer>, ParseError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    if strict {
        BitBuffer::parse_strict(line).map(Some)
    } else {
        Ok(Some(BitBuffer::parse(line)))
    }
}

/// Capture reader controller
pub struct CaptureReader {
    config: CaptureConfig,
    running: Arc<AtomicBool>,
    stats: Arc<CaptureStats>,
}

impl CaptureReader {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            stats: CaptureStats::new(),
        }
    }

    /// Start reading and return a receiver for parsed captures
    pub fn start(&self) -> Result<Receiver<Capture>> {
        match &self.config.path {
            Some(path) => info!("  Capture source: {}", path.display()),
            None => info!("  Capture source: stdin"),
        }
        info!("  Strict parsing: {}", self.config.strict);

        let (capture_tx, capture_rx) = bounded::<Capture>(1000);

        let config = self.config.clone();
        let running = self.running.clone();
        let stats = self.stats.clone();

        running.store(true, Ordering::SeqCst);

        thread::Builder::new()
            .name("capture-reader".to_string())
            .spawn(move || {
                if let Err(e) = run_reader(&config, &running, &stats, capture_tx) {
                    error!("Capture reader error: {:#}", e);
                }
                running.store(false, Ordering::SeqCst);
            })
            .context("Failed to spawn capture reader thread")?;

        Ok(capture_rx)
    }

    /// Stop reading
    pub fn stop(&self) {
        info!("Stopping capture reader...");
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> &Arc<CaptureStats> {
        &self.stats
    }
}

/// Reader loop (runs in dedicated thread)
fn run_reader(
    config: &CaptureConfig,
    running: &AtomicBool,
    stats: &CaptureStats,
    capture_tx: Sender<Capture>,
) -> Result<()> {
    let source: Box<dyn BufRead> = match &config.path {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open capture file {}", path.display()))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(io::stdin())),
    };

    read_captures(source, config.strict, running, stats, &capture_tx)
}

fn read_captures<R: BufRead>(
    source: R,
    strict: bool,
    running: &AtomicBool,
    stats: &CaptureStats,
    capture_tx: &Sender<Capture>,
) -> Result<()> {
    let mut line_no = 0u64;

    for line in source.lines() {
        if !running.load(Ordering::SeqCst) {
            break;
        }
        let line = line.with_context(|| format!("Failed to read capture line {}", line_no + 1))?;
        line_no += 1;
        stats.lines_read.fetch_add(1, Ordering::Relaxed);

        match parse_capture_line(&line, strict) {
            Ok(Some(bits)) => {
                stats.captures_parsed.fetch_add(1, Ordering::Relaxed);
                debug!("Line {}: {} rows", line_no, bits.num_rows());
                // blocking send: a file source must not lose captures
                if capture_tx.send(Capture { line: line_no, bits }).is_err() {
                    warn!("Capture channel closed, stopping reader");
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => {
                stats.parse_errors.fetch_add(1, Ordering::Relaxed);
                warn!("Line {}: {}", line_no, e);
            }
        }
    }

    info!(
        "Capture source exhausted after {} lines ({} captures)",
        line_no,
        stats.captures_parsed.load(Ordering::Relaxed)
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_capture_line() {
        let bits = parse_capture_line("  {8}aa {8}aa  ", false).unwrap().unwrap();
        assert_eq!(bits.num_rows(), 2);
        assert_eq!(bits.rows()[1].bytes(), &[0xAA]);
    }

    #[test]
    fn test_parse_capture_line_skips_comments() {
        assert!(parse_capture_line("", false).unwrap().is_none());
        assert!(parse_capture_line("   ", true).unwrap().is_none());
        assert!(parse_capture_line("# remote 1, button 2", true).unwrap().is_none());
    }

    #[test]
    fn test_parse_capture_line_strict() {
        assert!(parse_capture_line("{8}zz", true).is_err());
        let bits = parse_capture_line("{8}zz", false).unwrap().unwrap();
        assert_eq!(bits.bits_per_row(0), 8);
        assert_eq!(bits.rows()[0].bytes(), &[0x00]);
    }

    #[test]
    fn test_read_captures() {
        let input = "# header\n{8}aa {8}aa\n\n{12}xyz\n{4}f\n";
        let running = AtomicBool::new(true);
        let stats = CaptureStats::default();
        let (tx, rx) = bounded(10);

        read_captures(Cursor::new(input), true, &running, &stats, &tx).unwrap();
        drop(tx);

        let captures: Vec<Capture> = rx.iter().collect();
        assert_eq!(captures.len(), 2);
        assert_eq!(captures[0].line, 2);
        assert_eq!(captures[0].bits.num_rows(), 2);
        assert_eq!(captures[1].line, 5);
        assert_eq!(captures[1].bits.bits_per_row(0), 4);

        assert_eq!(stats.lines_read.load(Ordering::Relaxed), 5);
        assert_eq!(stats.captures_parsed.load(Ordering::Relaxed), 2);
        assert_eq!(stats.parse_errors.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_read_captures_stops_when_not_running() {
        let running = AtomicBool::new(false);
        let stats = CaptureStats::default();
        let (tx, rx) = bounded(10);

        read_captures(Cursor::new("{8}aa\n{8}bb\n"), false, &running, &stats, &tx).unwrap();
        assert!(rx.try_recv().is_err());
        assert_eq!(stats.lines_read.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_reader_missing_file() {
        let reader = CaptureReader::new(CaptureConfig {
            path: Some(PathBuf::from("/nonexistent/capture.txt")),
            strict: false,
        });
        let rx = reader.start().unwrap();
        // thread fails to open the file and drops the sender
        assert!(rx.recv().is_err());
    }
}
