//! MFT record assembly
//!
//! Combines the decoded header and attribute stream of one raw block into a
//! `Record`. Attribute-level problems become notes on the record; only a
//! truncated header or an impossible attribute offset rejects the block.

use crate::error::{MftError, Result};
use crate::ntfs::attribute::{AttributeContent, AttributeWalker, DecodeOptions, ObjectId};
use crate::ntfs::structs::*;
use serde::Serialize;

/// Presence flags for attributes whose content is not interpreted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AttributePresence {
    pub attribute_list: bool,
    pub security_descriptor: bool,
    pub volume_name: bool,
    pub volume_information: bool,
    pub data: bool,
    pub index_root: bool,
    pub index_allocation: bool,
    pub bitmap: bool,
    pub reparse_point: bool,
    pub ea_information: bool,
    pub ea: bool,
    pub property_set: bool,
    pub logged_utility_stream: bool,
}

impl AttributePresence {
    fn mark(&mut self, kind: AttributeType) {
        let flag = match kind {
            AttributeType::AttributeList => &mut self.attribute_list,
            AttributeType::SecurityDescriptor => &mut self.security_descriptor,
            AttributeType::VolumeName => &mut self.volume_name,
            AttributeType::VolumeInformation => &mut self.volume_information,
            AttributeType::Data => &mut self.data,
            AttributeType::IndexRoot => &mut self.index_root,
            AttributeType::IndexAllocation => &mut self.index_allocation,
            AttributeType::Bitmap => &mut self.bitmap,
            AttributeType::ReparsePoint => &mut self.reparse_point,
            AttributeType::EaInformation => &mut self.ea_information,
            AttributeType::Ea => &mut self.ea,
            AttributeType::PropertySet => &mut self.property_set,
            AttributeType::LoggedUtilityStream => &mut self.logged_utility_stream,
            AttributeType::StandardInformation
            | AttributeType::FileName
            | AttributeType::ObjectId
            | AttributeType::End => return,
        };
        *flag = true;
    }
}

/// Everything decoded from one MFT record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    /// Position of the block in the source, independent of the record number
    pub source_index: u64,
    pub header: RecordHeader,
    /// $FILE_NAME attributes in on-disk order
    pub file_names: Vec<FileNameAttribute>,
    pub standard_information: Option<StandardInformation>,
    pub object_id: Option<ObjectId>,
    pub present: AttributePresence,
    /// Name from the first $FILE_NAME decoded, empty if there is none
    pub filename: String,
    /// Full display path, filled in by the path resolver
    path: String,
    pub notes: Vec<String>,
    /// All four $STANDARD_INFORMATION timestamps lack a sub-second part
    pub usec_zero: bool,
    /// First $FILE_NAME was created after $STANDARD_INFORMATION claims
    pub si_fn_shift: bool,
}

impl Record {
    /// Empty record for a decoded header
    pub fn new(header: RecordHeader, source_index: u64) -> Self {
        Self {
            source_index,
            header,
            file_names: Vec::new(),
            standard_information: None,
            object_id: None,
            present: AttributePresence::default(),
            filename: String::new(),
            path: String::new(),
            notes: Vec::new(),
            usec_zero: false,
            si_fn_shift: false,
        }
    }

    /// Record number as stored in the header
    pub fn record_number(&self) -> u64 {
        self.header.record_number as u64
    }

    pub fn sequence_number(&self) -> u16 {
        self.header.sequence_number
    }

    pub fn flags(&self) -> u16 {
        self.header.flags
    }

    pub fn base_reference(&self) -> u64 {
        self.header.base_record_reference
    }

    /// Number of $FILE_NAME attributes
    pub fn fncnt(&self) -> usize {
        self.file_names.len()
    }

    /// Parent record number, taken from the first $FILE_NAME
    pub fn parent_record_number(&self) -> Option<u64> {
        self.file_names.first().map(|f| f.parent_record_number())
    }

    /// Path component, taken from the last $FILE_NAME
    pub fn display_name(&self) -> Option<&str> {
        self.file_names.last().map(|f| f.name.as_str())
    }

    /// Resolved path, empty until path resolution has run
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_resolved(&self) -> bool {
        !self.path.is_empty()
    }

    /// Paths are written once
    pub(crate) fn set_path(&mut self, path: String) {
        debug_assert!(self.path.is_empty(), "path of record {} set twice", self.record_number());
        if self.path.is_empty() {
            self.path = path;
        }
    }

    fn note(&mut self, message: impl Into<String>) {
        self.notes.push(message.into());
    }

    fn apply(&mut self, content: AttributeContent) {
        match content {
            AttributeContent::StandardInformation(si) => {
                self.standard_information = Some(si);
            }
            AttributeContent::FileName(fn_attr) => {
                if self.file_names.is_empty() {
                    self.filename = fn_attr.name.clone();
                }
                self.file_names.push(fn_attr);
            }
            AttributeContent::ObjectId(oid) => {
                self.object_id = Some(oid);
            }
            AttributeContent::Marker(kind) => self.present.mark(kind),
            AttributeContent::Unknown(_) => {}
        }
    }

    fn derive_flags(&mut self) {
        let Some(si) = &self.standard_information else {
            return;
        };

        self.usec_zero = si.timestamps().iter().all(|t| t.has_zero_subsecond());

        if let Some(first) = self.file_names.first() {
            self.si_fn_shift = !first.creation_time.is_sentinel()
                && !si.creation_time.is_sentinel()
                && first.creation_time.ticks() > si.creation_time.ticks();
        }

        let out_of_range = si.timestamps().iter().filter(|t| t.is_sentinel()).count();
        if out_of_range > 0 {
            let message = MftError::TimestampOutOfRange(
                si.timestamps()
                    .iter()
                    .find(|t| t.is_sentinel())
                    .map(|t| t.ticks())
                    .unwrap_or(0),
            );
            self.note(format!("{} ({} of 4 $STANDARD_INFORMATION times)", message, out_of_range));
        }
    }
}

/// Decode one raw record block.
///
/// Fails only with `TruncatedHeader` or `InvalidAttributeOffset`; every other
/// problem is recorded in `Record::notes`.
pub fn parse_record(block: &[u8], source_index: u64, options: &DecodeOptions) -> Result<Record> {
    let header = RecordHeader::parse(block)?;
    let start = header.attribute_start(block.len())?;

    let mut record = Record::new(header, source_index);

    if record.header.is_bad() {
        record.note("BAAD signature: incomplete multi-sector write");
    } else if !record.header.has_valid_signature() {
        let sig = record.header.signature.to_le_bytes();
        record.note(format!("Unexpected signature {:02X?}", sig));
    }

    let mut walker = AttributeWalker::new(block, start, *options);
    for item in walker.by_ref() {
        match item {
            Ok(attr) => record.apply(attr.content),
            Err(e) => record.note(e.to_string()),
        }
    }

    record.derive_flags();
    Ok(record)
}
