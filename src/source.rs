//! Raw record sources
//!
//! The ingestion pipeline pulls fixed-size record blocks from a
//! `RawRecordSource`. Implementations here read an MFT image from a file,
//! from a memory map, or from blocks already in memory.

use crate::error::{MftError, Result};
use crate::ntfs::structs::{DEFAULT_MFT_RECORD_SIZE, MFT_RECORD_SIGNATURE};
use byteorder::{ByteOrder, LittleEndian};
use memmap2::Mmap;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Supplies raw MFT record blocks in on-disk order
pub trait RawRecordSource {
    /// Total size of the input in bytes, used for progress only
    fn total_size(&self) -> u64;

    /// Next block, `None` at end of input. The last block may be short.
    fn next_block(&mut self) -> Result<Option<Vec<u8>>>;
}

/// Guess the record size from the allocated-size field of the first record.
/// Falls back to 1024 when the block is not a "FILE" record or the value is
/// not a plausible power of two.
pub fn detect_record_size(first_block: &[u8]) -> u32 {
    if first_block.len() < 32 || LittleEndian::read_u32(&first_block[0..4]) != MFT_RECORD_SIGNATURE {
        return DEFAULT_MFT_RECORD_SIZE;
    }
    let allocated = LittleEndian::read_u32(&first_block[28..32]);
    if allocated.is_power_of_two() && (256..=65536).contains(&allocated) {
        allocated
    } else {
        DEFAULT_MFT_RECORD_SIZE
    }
}

/// Read the first 32 bytes of `reader`, however many reads that takes, and
/// detect the record size from them
fn probe_record_size(reader: impl Read) -> Result<u32> {
    let mut probe = Vec::with_capacity(32);
    reader.take(32).read_to_end(&mut probe)?;
    Ok(detect_record_size(&probe))
}

fn check_record_size(record_size: u32) -> Result<usize> {
    if record_size == 0 {
        return Err(MftError::InvalidConfig("record size must be non-zero".to_string()));
    }
    Ok(record_size as usize)
}

// ============================================================================
// Buffered file source
// ============================================================================

/// Reads an MFT image file sequentially
pub struct ImageFile {
    reader: BufReader<File>,
    record_size: usize,
    total_size: u64,
    done: bool,
}

impl ImageFile {
    /// Open with a fixed record size
    pub fn open(path: impl AsRef<Path>, record_size: u32) -> Result<Self> {
        let record_size = check_record_size(record_size)?;
        let file = File::open(path.as_ref())?;
        let total_size = file.metadata()?.len();

        Ok(Self {
            reader: BufReader::with_capacity(record_size * 64, file),
            record_size,
            total_size,
            done: false,
        })
    }

    /// Open, taking the record size from the first record
    pub fn open_detect(path: impl AsRef<Path>) -> Result<Self> {
        let record_size = probe_record_size(File::open(path.as_ref())?)?;
        Self::open(path, record_size)
    }

    pub fn record_size(&self) -> u32 {
        self.record_size as u32
    }
}

impl RawRecordSource for ImageFile {
    fn total_size(&self) -> u64 {
        self.total_size
    }

    fn next_block(&mut self) -> Result<Option<Vec<u8>>> {
        if self.done {
            return Ok(None);
        }

        let mut block = vec![0u8; self.record_size];
        let mut filled = 0;
        while filled < block.len() {
            match self.reader.read(&mut block[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        if filled < block.len() {
            self.done = true;
            if filled == 0 {
                return Ok(None);
            }
            block.truncate(filled);
        }
        Ok(Some(block))
    }
}

// ============================================================================
// Memory-mapped source
// ============================================================================

/// Serves blocks out of a memory-mapped MFT image
pub struct MappedImage {
    mmap: Mmap,
    record_size: usize,
    position: usize,
}

impl MappedImage {
    /// Map the image; `None` detects the record size from the first record
    pub fn open(path: impl AsRef<Path>, record_size: Option<u32>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        // SAFETY: the mapping is read-only; the image must not be truncated
        // by another process while it is being scanned.
        let mmap = unsafe { Mmap::map(&file)? };
        let record_size = check_record_size(record_size.unwrap_or_else(|| detect_record_size(&mmap)))?;

        Ok(Self {
            mmap,
            record_size,
            position: 0,
        })
    }

    pub fn record_size(&self) -> u32 {
        self.record_size as u32
    }

    /// Block at a given index without moving the cursor
    pub fn block_at(&self, index: u64) -> Option<&[u8]> {
        let start = usize::try_from(index).ok()?.checked_mul(self.record_size)?;
        if start >= self.mmap.len() {
            return None;
        }
        let end = (start + self.record_size).min(self.mmap.len());
        Some(&self.mmap[start..end])
    }
}

impl RawRecordSource for MappedImage {
    fn total_size(&self) -> u64 {
        self.mmap.len() as u64
    }

    fn next_block(&mut self) -> Result<Option<Vec<u8>>> {
        if self.position >= self.mmap.len() {
            return Ok(None);
        }
        let end = (self.position + self.record_size).min(self.mmap.len());
        let block = self.mmap[self.position..end].to_vec();
        self.position = end;
        Ok(Some(block))
    }
}

// ============================================================================
// In-memory source
// ============================================================================

/// Blocks held in memory, handed out front to back
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    blocks: VecDeque<Vec<u8>>,
    total_size: u64,
}

impl MemorySource {
    pub fn new(blocks: Vec<Vec<u8>>) -> Self {
        let total_size = blocks.iter().map(|b| b.len() as u64).sum();
        Self {
            blocks: blocks.into(),
            total_size,
        }
    }

    /// Split a contiguous image into blocks of `record_size` bytes
    pub fn from_image(image: &[u8], record_size: u32) -> Result<Self> {
        let record_size = check_record_size(record_size)?;
        Ok(Self::new(image.chunks(record_size).map(|c| c.to_vec()).collect()))
    }
}

impl RawRecordSource for MemorySource {
    fn total_size(&self) -> u64 {
        self.total_size
    }

    fn next_block(&mut self) -> Result<Option<Vec<u8>>> {
        Ok(self.blocks.pop_front())
    }
}
