//! mftpath - NTFS Master File Table decoder
//!
//! Decodes raw MFT record images into an ordered table of records and
//! resolves a full display path for every record from its $FILE_NAME parent
//! references.
//!
//! # Features
//!
//! - **Record Decoding**: fixed header, resident and non-resident attribute
//!   headers, $STANDARD_INFORMATION, $FILE_NAME and $OBJECT_ID
//! - **Parallel Ingestion**: blocks decoded on a bounded worker pool with
//!   results independent of the worker count
//! - **Path Resolution**: memoized, iterative, tolerant of orphans and cycles
//! - **Anomaly Flags**: zero sub-second $STANDARD_INFORMATION times and
//!   $FILE_NAME/$STANDARD_INFORMATION creation time shifts
//!
//! # Example
//!
//! ```no_run
//! use mftpath::{ImageFile, MftScanner, ScanConfig};
//!
//! fn main() -> mftpath::Result<()> {
//!     let mut source = ImageFile::open_detect("MFT.bin")?;
//!     let scanner = MftScanner::new().with_config(ScanConfig::default().with_workers(4));
//!
//!     let outcome = scanner.scan(&mut source)?;
//!     for record in outcome.table.iter() {
//!         println!("{:>8} {}", record.record_number(), record.path());
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;
pub mod ntfs;
pub mod scanner;
pub mod source;
pub mod table;

// Re-export main types
pub use error::{MftError, Result};
pub use logging::{ConsoleLogger, Diagnostics, FileLogger, LogLevel, MemoryLogger, NullLogger};
pub use ntfs::{parse_record, DecodeOptions, Record, WindowsTimestamp};
pub use scanner::{HaltReason, MftScanner, ScanConfig, ScanOutcome, SkippedBlock};
pub use source::{detect_record_size, ImageFile, MappedImage, MemorySource, RawRecordSource};
pub use table::{PathResolver, ResolveStats, Table, TableBuilder, TableStats};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
