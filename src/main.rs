//! mftpath CLI
//!
//! Command-line interface for the MFT decoder.

use clap::{Args, Parser, Subcommand};
use console::style;
use humansize::{format_size, BINARY};
use indicatif::HumanDuration;
use mftpath::{
    parse_record, ConsoleLogger, Diagnostics, FileLogger, ImageFile, LogLevel, MappedImage, MftError, MftScanner,
    RawRecordSource, ScanConfig, ScanOutcome,
};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// mftpath - NTFS MFT decoder and path resolver
///
/// Reads an extracted $MFT image, decodes every record and rebuilds the full
/// path of each file from its parent references.
#[derive(Parser)]
#[command(name = "mftpath")]
#[command(version)]
#[command(about = "NTFS MFT decoder and path resolver", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan an MFT image and print a summary
    Scan {
        #[command(flatten)]
        input: InputArgs,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Scan an MFT image and write every record as JSON
    Export {
        #[command(flatten)]
        input: InputArgs,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Show one decoded record
    Record {
        #[command(flatten)]
        input: InputArgs,

        /// Record number
        number: u64,

        /// Decode only the block at this index, without resolving its path
        #[arg(long)]
        raw: bool,
    },
}

#[derive(Args)]
struct InputArgs {
    /// Path to the MFT image
    image: PathBuf,

    /// Number of decode workers (default: one per core)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Render timestamps in the local time zone
    #[arg(long)]
    local_time: bool,

    /// Record size in bytes (default: detected from the first record)
    #[arg(long)]
    record_size: Option<u32>,

    /// Stop after this many records
    #[arg(long, default_value_t = mftpath::scanner::DEFAULT_MAX_RECORDS)]
    max_records: u64,

    /// Memory-map the image instead of buffered reads
    #[arg(long)]
    mmap: bool,

    /// Write diagnostics to this file
    #[arg(long)]
    log: Option<PathBuf>,

    /// Show informational diagnostics on the console
    #[arg(short, long)]
    verbose: bool,
}

impl InputArgs {
    fn diagnostics(&self) -> mftpath::Result<Arc<dyn Diagnostics>> {
        Ok(match &self.log {
            Some(path) => Arc::new(FileLogger::create(path, LogLevel::Debug)?),
            None if self.verbose => Arc::new(ConsoleLogger::new(LogLevel::Info)),
            None => Arc::new(ConsoleLogger::new(LogLevel::Warn)),
        })
    }

    fn config(&self, show_progress: bool) -> ScanConfig {
        let mut config = ScanConfig::default()
            .with_max_records(self.max_records)
            .with_local_time(self.local_time)
            .with_progress(show_progress);
        if let Some(workers) = self.workers {
            config = config.with_workers(workers);
        }
        config
    }

    fn open(&self) -> mftpath::Result<Box<dyn RawRecordSource>> {
        Ok(if self.mmap {
            Box::new(MappedImage::open(&self.image, self.record_size)?)
        } else {
            match self.record_size {
                Some(size) => Box::new(ImageFile::open(&self.image, size)?),
                None => Box::new(ImageFile::open_detect(&self.image)?),
            }
        })
    }

    fn scan(&self, show_progress: bool) -> mftpath::Result<ScanOutcome> {
        let log = self.diagnostics()?;
        log.info("MAIN", &format!("mftpath {} starting on {}", mftpath::VERSION, self.image.display()));

        let mut source = self.open()?;
        let scanner = MftScanner::new()
            .with_config(self.config(show_progress))
            .with_diagnostics(log);
        scanner.scan(source.as_mut())
    }
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Scan { input, json } => cmd_scan(&input, json),
        Commands::Export { input, output } => cmd_export(&input, &output),
        Commands::Record { input, number, raw } => cmd_record(&input, number, raw),
    };

    if let Err(e) = result {
        eprintln!("{} {}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }
}

fn announce(verb: &str, image: &Path) {
    println!(
        "{} {} {}",
        style("→").cyan().bold(),
        verb,
        style(image.display()).yellow()
    );
}

/// Scan command implementation
fn cmd_scan(input: &InputArgs, json: bool) -> mftpath::Result<()> {
    if !json {
        announce("Scanning", &input.image);
    }

    let outcome = input.scan(!json)?;
    let stats = outcome.table.stats();
    let input_size = std::fs::metadata(&input.image).map(|m| m.len()).unwrap_or(0);

    if json {
        let summary = serde_json::json!({
            "image": input.image.display().to_string(),
            "input_bytes": input_size,
            "blocks_read": outcome.blocks_read,
            "stats": stats,
            "resolve": outcome.resolve,
            "skipped": outcome.skipped,
            "duplicates": outcome.duplicates.len(),
            "halted": outcome.halted.as_ref().map(|h| h.to_string()),
            "elapsed_seconds": outcome.elapsed.as_secs_f64(),
        });
        let text = serde_json::to_string_pretty(&summary)?;
        println!("{}", text);
        return Ok(());
    }

    println!();
    println!(
        "{} Scan complete in {}",
        style("✓").green().bold(),
        style(HumanDuration(outcome.elapsed)).cyan()
    );
    println!();
    println!(
        "  {} {} ({})",
        style("Input:").bold(),
        outcome.blocks_read,
        style(format_size(input_size, BINARY)).yellow()
    );
    println!("  {} {}", style("Records:").bold(), stats.total_records);
    println!("  {} {}", style("In use:").bold(), stats.in_use);
    println!("  {} {}", style("Directories:").bold(), stats.directories);
    println!("  {} {}", style("Without name:").bold(), stats.no_file_name);
    println!("  {} {} / {}", style("Hidden/System:").bold(), stats.hidden, stats.system);
    if stats.orphaned > 0 {
        println!("  {} {}", style("Orphaned:").bold(), style(stats.orphaned).red());
    }
    if stats.circular > 0 {
        println!("  {} {}", style("Circular:").bold(), style(stats.circular).red());
    }
    println!("  {} {}", style("usec-zero:").bold(), stats.usec_zero);
    println!("  {} {}", style("SI/FN shift:").bold(), stats.si_fn_shift);
    if !outcome.skipped.is_empty() {
        println!("  {} {}", style("Skipped:").bold(), style(outcome.skipped.len()).red());
    }
    if !outcome.duplicates.is_empty() {
        println!("  {} {}", style("Duplicates:").bold(), style(outcome.duplicates.len()).red());
    }
    if let Some(reason) = &outcome.halted {
        println!("  {} {}", style("Halted:").bold(), style(reason).red());
    }
    println!();
    println!(
        "  {} {:.0} records/sec",
        style("Speed:").bold(),
        stats.total_records as f64 / outcome.elapsed.as_secs_f64().max(f64::EPSILON)
    );

    Ok(())
}

/// Export command
fn cmd_export(input: &InputArgs, output: &Path) -> mftpath::Result<()> {
    announce("Exporting", &input.image);

    let outcome = input.scan(true)?;
    let records: Vec<_> = outcome.table.iter().collect();

    let mut writer = BufWriter::new(File::create(output)?);
    serde_json::to_writer_pretty(&mut writer, &records)?;
    writeln!(writer)?;
    writer.flush()?;

    println!(
        "{} Exported {} records to {}",
        style("✓").green().bold(),
        records.len(),
        style(output.display()).yellow()
    );
    if let Some(reason) = &outcome.halted {
        println!("  {} {}", style("Halted:").bold(), style(reason).red());
    }

    Ok(())
}

/// Record command
fn cmd_record(input: &InputArgs, number: u64, raw: bool) -> mftpath::Result<()> {
    let record = if raw {
        let image = MappedImage::open(&input.image, input.record_size)?;
        let block = image
            .block_at(number)
            .ok_or_else(|| MftError::NotFound(format!("block {} (past the end of the image)", number)))?;
        let options = input.config(false).decode;
        parse_record(block, number, &options)?
    } else {
        let outcome = input.scan(false)?;
        outcome
            .table
            .get(number)
            .cloned()
            .ok_or_else(|| MftError::NotFound(format!("record {}", number)))?
    };

    let text = serde_json::to_string_pretty(&record)?;
    println!("{}", text);
    Ok(())
}
