//! Main Scanner Module
//!
//! Drives ingestion: raw blocks are read sequentially from a
//! `RawRecordSource`, decoded in parallel on a bounded worker pool, and
//! collected into a `TableBuilder`. Once the reader stops the table is
//! finished and paths are resolved exactly once.

use crate::error::{MftError, Result};
use crate::logging::{self, Diagnostics};
use crate::ntfs::{parse_record, DecodeOptions};
use crate::source::RawRecordSource;
use crate::table::{Displaced, ResolveStats, Table, TableBuilder};
use crossbeam_channel::{bounded, Receiver, Sender};
use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Safeguard against runaway images
pub const DEFAULT_MAX_RECORDS: u64 = 1_000_000;

// ============================================================================
// Scanner Configuration
// ============================================================================

/// Configuration for the scanner
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Decode workers; 1 decodes sequentially with identical results
    pub workers: usize,
    /// Stop reading after this many blocks
    pub max_records: u64,
    /// Blocks buffered between the reader and the workers
    pub channel_capacity: usize,
    /// Show progress during scan
    pub show_progress: bool,
    pub decode: DecodeOptions,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            workers: rayon::current_num_threads().max(1),
            max_records: DEFAULT_MAX_RECORDS,
            channel_capacity: 1024,
            show_progress: true,
            decode: DecodeOptions::default(),
        }
    }
}

impl ScanConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_max_records(mut self, max_records: u64) -> Self {
        self.max_records = max_records;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn with_local_time(mut self, local_time: bool) -> Self {
        self.decode.local_time = local_time;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(MftError::InvalidConfig("workers must be at least 1".to_string()));
        }
        if self.channel_capacity == 0 {
            return Err(MftError::InvalidConfig("channel capacity must be at least 1".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// Scan Outcome
// ============================================================================

/// A block that could not be decoded into a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedBlock {
    pub index: u64,
    pub kind: &'static str,
    pub message: String,
}

/// Why ingestion stopped before the source was exhausted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum HaltReason {
    Cancelled,
    RecordLimit(u64),
    SourceError(String),
}

impl std::fmt::Display for HaltReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HaltReason::Cancelled => write!(f, "cancelled"),
            HaltReason::RecordLimit(n) => write!(f, "record limit of {} reached", n),
            HaltReason::SourceError(e) => write!(f, "source error: {}", e),
        }
    }
}

/// Result of a scan: the resolved table plus everything that went wrong
#[derive(Debug)]
pub struct ScanOutcome {
    pub table: Table,
    pub resolve: ResolveStats,
    pub blocks_read: u64,
    /// Sorted by block index
    pub skipped: Vec<SkippedBlock>,
    /// Sorted by dropped block index
    pub duplicates: Vec<Displaced>,
    pub halted: Option<HaltReason>,
    pub elapsed: Duration,
}

impl ScanOutcome {
    pub fn is_complete(&self) -> bool {
        self.halted.is_none()
    }
}

// ============================================================================
// MFT Scanner
// ============================================================================

/// Shared state of one scan, borrowed by every worker
struct Collector<'a> {
    builder: TableBuilder,
    skipped: Mutex<Vec<SkippedBlock>>,
    duplicates: Mutex<Vec<Displaced>>,
    decoded: AtomicU64,
    options: DecodeOptions,
    log: &'a dyn Diagnostics,
}

impl Collector<'_> {
    fn decode(&self, index: u64, block: &[u8]) {
        match parse_record(block, index, &self.options) {
            Ok(record) => {
                for note in &record.notes {
                    self.log.debug(
                        "DECODE",
                        &format!("Record {} (block {}): {}", record.record_number(), index, note),
                    );
                }
                if let Some(displaced) = self.builder.insert(record) {
                    self.log.warn(
                        "DECODE",
                        &format!(
                            "Duplicate record number {}: kept block {}, dropped block {}",
                            displaced.record_number, displaced.kept_index, displaced.dropped_index
                        ),
                    );
                    self.duplicates.lock().push(displaced);
                }
                self.decoded.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.log.warn("DECODE", &format!("Skipping block {}: {}", index, e));
                self.skipped.lock().push(SkippedBlock {
                    index,
                    kind: e.kind(),
                    message: e.to_string(),
                });
            }
        }
    }

    fn drain(&self, rx: Receiver<(u64, Vec<u8>)>) {
        for (index, block) in rx.iter() {
            self.decode(index, &block);
        }
    }
}

/// Scanner for a single MFT image
pub struct MftScanner {
    config: ScanConfig,
    /// Cancellation flag
    cancelled: Arc<AtomicBool>,
    log: Arc<dyn Diagnostics>,
}

impl MftScanner {
    /// Create a scanner with default configuration and no diagnostics
    pub fn new() -> Self {
        Self {
            config: ScanConfig::default(),
            cancelled: Arc::new(AtomicBool::new(false)),
            log: logging::null(),
        }
    }

    /// Configure the scanner
    pub fn with_config(mut self, config: ScanConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_diagnostics(mut self, log: Arc<dyn Diagnostics>) -> Self {
        self.log = log;
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Get cancellation token
    pub fn cancel_token(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    /// Cancel the scan
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Ingest every block of `source`, then resolve paths.
    ///
    /// Only an invalid configuration fails the scan. Source errors,
    /// cancellation and the record cap end ingestion early and are reported
    /// in `ScanOutcome::halted`; the records read so far are still resolved.
    pub fn scan<S: RawRecordSource + ?Sized>(&self, source: &mut S) -> Result<ScanOutcome> {
        self.config.validate()?;
        let start_time = Instant::now();
        let log = &*self.log;

        log.separator("SCAN START");
        log.info(
            "SCANNER",
            &format!(
                "Config: workers={}, max_records={}, channel={}, local_time={}, input={} bytes",
                self.config.workers,
                self.config.max_records,
                self.config.channel_capacity,
                self.config.decode.local_time,
                source.total_size()
            ),
        );

        let pb = self.progress_bar(source.total_size());

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.workers)
            .thread_name(|i| format!("mft-decode-{}", i))
            .build()
            .map_err(|e| MftError::InvalidConfig(format!("cannot start worker pool: {}", e)))?;

        let collector = Collector {
            builder: TableBuilder::new(),
            skipped: Mutex::new(Vec::new()),
            duplicates: Mutex::new(Vec::new()),
            decoded: AtomicU64::new(0),
            options: self.config.decode,
            log,
        };

        let (tx, rx) = bounded::<(u64, Vec<u8>)>(self.config.channel_capacity);

        // The reader runs on this thread, so a single worker cannot starve it
        let (blocks_read, halted) = pool.in_place_scope(|scope| {
            for _ in 0..self.config.workers {
                let rx = rx.clone();
                let collector = &collector;
                scope.spawn(move |_| collector.drain(rx));
            }
            drop(rx);
            self.feed(source, tx, &pb)
        });

        let Collector {
            builder,
            skipped,
            duplicates,
            decoded,
            ..
        } = collector;

        if let Some(reason) = &halted {
            log.warn("SCANNER", &format!("Ingestion halted after {} blocks: {}", blocks_read, reason));
        }

        let mut skipped = skipped.into_inner();
        skipped.sort_by_key(|s| s.index);
        let mut duplicates = duplicates.into_inner();
        duplicates.sort_by_key(|d| d.dropped_index);

        log.info(
            "SCANNER",
            &format!(
                "Read {} blocks: {} decoded, {} skipped, {} duplicates",
                blocks_read,
                decoded.load(Ordering::Relaxed),
                skipped.len(),
                duplicates.len()
            ),
        );

        log.separator("PATH RESOLUTION");
        pb.set_message("Resolving paths...");
        let mut table = builder.finish();
        let resolve = table.resolve_paths(log);

        let elapsed = start_time.elapsed();
        log.info(
            "SCANNER",
            &format!("Scan complete: {} records in {:.2}s", table.len(), elapsed.as_secs_f64()),
        );
        pb.finish_with_message(format!("Complete: {} records ({:.2}s)", table.len(), elapsed.as_secs_f64()));

        Ok(ScanOutcome {
            table,
            resolve,
            blocks_read,
            skipped,
            duplicates,
            halted,
            elapsed,
        })
    }

    /// Reader loop. Dropping `tx` on return lets the workers finish.
    fn feed<S: RawRecordSource + ?Sized>(
        &self,
        source: &mut S,
        tx: Sender<(u64, Vec<u8>)>,
        pb: &ProgressBar,
    ) -> (u64, Option<HaltReason>) {
        let mut index = 0u64;

        loop {
            if self.is_cancelled() {
                return (index, Some(HaltReason::Cancelled));
            }
            let block = match source.next_block() {
                // The cap only halts a source that still has blocks left
                Ok(Some(_)) if index >= self.config.max_records => {
                    return (index, Some(HaltReason::RecordLimit(self.config.max_records)));
                }
                Ok(Some(block)) => block,
                Ok(None) => return (index, None),
                Err(e) => {
                    self.log.error("SCANNER", &format!("Source failed at block {}: {}", index, e));
                    return (index, Some(HaltReason::SourceError(e.to_string())));
                }
            };

            pb.inc(block.len() as u64);
            if index % 50_000 == 0 {
                pb.set_message(format!("MFT: {} records", index));
            }

            if tx.send((index, block)).is_err() {
                // Every worker is gone; nothing left to decode with
                return (index, Some(HaltReason::SourceError("decode workers stopped".to_string())));
            }
            index += 1;
        }
    }

    fn progress_bar(&self, total: u64) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(total);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta}) {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }
}

impl Default for MftScanner {
    fn default() -> Self {
        Self::new()
    }
}
