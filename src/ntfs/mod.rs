//! NTFS MFT decoding
//!
//! This module turns raw MFT record blocks into `Record`s:
//! - Fixed record header decoding
//! - Attribute stream walking with resident/non-resident bodies
//! - $STANDARD_INFORMATION and $FILE_NAME content decoding
//! - FILETIME conversion

pub mod attribute;
pub mod record;
pub mod structs;
pub mod time;

// Re-export commonly used types
pub use attribute::{AttributeContent, AttributeWalker, BirthIds, DecodeOptions, ObjectId, StreamEnd};
pub use record::{parse_record, AttributePresence, Record};
pub use structs::{
    AttributeBody, AttributeHeader, AttributeType, FileNameAttribute, FilenameNamespace, RecordHeader,
    StandardInformation, ROOT_RECORD_NUMBER,
};
pub use time::WindowsTimestamp;
