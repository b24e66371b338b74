//! NTFS on-disk structures and constants

use crate::error::{MftError, Result};
use crate::ntfs::time::WindowsTimestamp;
use byteorder::{LittleEndian, ReadBytesExt};
use serde::Serialize;
use std::io::Cursor;

// ============================================================================
// NTFS Constants
// ============================================================================

/// MFT record signature "FILE"
pub const MFT_RECORD_SIGNATURE: u32 = 0x454C4946; // "FILE" in little-endian

/// Bad MFT record signature "BAAD"
pub const MFT_RECORD_BAD_SIGNATURE: u32 = 0x44414142; // "BAAD"

/// End of attributes marker
pub const ATTRIBUTE_END_MARKER: u32 = 0xFFFFFFFF;

/// Standard MFT record size
pub const DEFAULT_MFT_RECORD_SIZE: u32 = 1024;

/// Smallest block that still holds a full record header
pub const RECORD_HEADER_SIZE: usize = 48;

/// Record number of the root directory
pub const ROOT_RECORD_NUMBER: u64 = 5;

/// Attribute header fields shared by both residency forms
pub const GENERIC_HEADER_SIZE: usize = 16;

/// Generic attribute header plus resident body
pub const RESIDENT_HEADER_SIZE: usize = 24;

/// Generic attribute header plus non-resident body
pub const NON_RESIDENT_HEADER_SIZE: usize = 64;

/// Fixed $STANDARD_INFORMATION content size
pub const STANDARD_INFORMATION_SIZE: usize = 72;

/// Fixed part of $FILE_NAME content, before the name
pub const FILE_NAME_FIXED_SIZE: usize = 66;

// MFT Record Flags
pub const MFT_RECORD_IN_USE: u16 = 0x0001;
pub const MFT_RECORD_IS_DIRECTORY: u16 = 0x0002;

/// Lower 48 bits of a file reference hold the record number
const RECORD_NUMBER_MASK: u64 = 0x0000_FFFF_FFFF_FFFF;

// ============================================================================
// Attribute Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u32)]
pub enum AttributeType {
    StandardInformation = 0x10,
    AttributeList = 0x20,
    FileName = 0x30,
    ObjectId = 0x40,
    SecurityDescriptor = 0x50,
    VolumeName = 0x60,
    VolumeInformation = 0x70,
    Data = 0x80,
    IndexRoot = 0x90,
    IndexAllocation = 0xA0,
    Bitmap = 0xB0,
    ReparsePoint = 0xC0,
    EaInformation = 0xD0,
    Ea = 0xE0,
    PropertySet = 0xF0,
    LoggedUtilityStream = 0x100,
    End = 0xFFFFFFFF,
}

impl AttributeType {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0x10 => Some(Self::StandardInformation),
            0x20 => Some(Self::AttributeList),
            0x30 => Some(Self::FileName),
            0x40 => Some(Self::ObjectId),
            0x50 => Some(Self::SecurityDescriptor),
            0x60 => Some(Self::VolumeName),
            0x70 => Some(Self::VolumeInformation),
            0x80 => Some(Self::Data),
            0x90 => Some(Self::IndexRoot),
            0xA0 => Some(Self::IndexAllocation),
            0xB0 => Some(Self::Bitmap),
            0xC0 => Some(Self::ReparsePoint),
            0xD0 => Some(Self::EaInformation),
            0xE0 => Some(Self::Ea),
            0xF0 => Some(Self::PropertySet),
            0x100 => Some(Self::LoggedUtilityStream),
            0xFFFFFFFF => Some(Self::End),
            _ => None,
        }
    }

    /// On-disk `$NAME` of the attribute
    pub fn name(&self) -> &'static str {
        match self {
            Self::StandardInformation => "$STANDARD_INFORMATION",
            Self::AttributeList => "$ATTRIBUTE_LIST",
            Self::FileName => "$FILE_NAME",
            Self::ObjectId => "$OBJECT_ID",
            Self::SecurityDescriptor => "$SECURITY_DESCRIPTOR",
            Self::VolumeName => "$VOLUME_NAME",
            Self::VolumeInformation => "$VOLUME_INFORMATION",
            Self::Data => "$DATA",
            Self::IndexRoot => "$INDEX_ROOT",
            Self::IndexAllocation => "$INDEX_ALLOCATION",
            Self::Bitmap => "$BITMAP",
            Self::ReparsePoint => "$REPARSE_POINT",
            Self::EaInformation => "$EA_INFORMATION",
            Self::Ea => "$EA",
            Self::PropertySet => "$PROPERTY_SET",
            Self::LoggedUtilityStream => "$LOGGED_UTILITY_STREAM",
            Self::End => "END",
        }
    }
}

// ============================================================================
// Filename Namespace
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FilenameNamespace {
    Posix,
    Win32,
    Dos,
    Win32AndDos,
    /// Tag outside 0..=3, kept rather than rejected
    Unknown(u8),
}

impl FilenameNamespace {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Posix,
            1 => Self::Win32,
            2 => Self::Dos,
            3 => Self::Win32AndDos,
            other => Self::Unknown(other),
        }
    }
}

// ============================================================================
// MFT Record Header
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecordHeader {
    pub signature: u32,
    pub update_sequence_offset: u16,
    pub update_sequence_count: u16,
    pub log_sequence_number: u64,
    pub sequence_number: u16,
    pub hard_link_count: u16,
    pub first_attribute_offset: u16,
    pub flags: u16,
    pub used_size: u32,
    pub allocated_size: u32,
    /// Base record number (48 bits), non-zero for extension records
    pub base_record_reference: u64,
    pub base_record_sequence: u16,
    pub next_attribute_id: u16,
    /// Record number as stored on disk
    pub record_number: u32,
}

impl RecordHeader {
    /// Parse MFT record header from raw bytes
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < RECORD_HEADER_SIZE {
            return Err(MftError::TruncatedHeader(data.len()));
        }

        let mut cursor = Cursor::new(data);

        let signature = cursor.read_u32::<LittleEndian>()?;
        let update_sequence_offset = cursor.read_u16::<LittleEndian>()?;
        let update_sequence_count = cursor.read_u16::<LittleEndian>()?;
        let log_sequence_number = cursor.read_u64::<LittleEndian>()?;
        let sequence_number = cursor.read_u16::<LittleEndian>()?;
        let hard_link_count = cursor.read_u16::<LittleEndian>()?;
        let first_attribute_offset = cursor.read_u16::<LittleEndian>()?;
        let flags = cursor.read_u16::<LittleEndian>()?;
        let used_size = cursor.read_u32::<LittleEndian>()?;
        let allocated_size = cursor.read_u32::<LittleEndian>()?;
        let base_record_reference = cursor.read_u48::<LittleEndian>()?;
        let base_record_sequence = cursor.read_u16::<LittleEndian>()?;
        let next_attribute_id = cursor.read_u16::<LittleEndian>()?;
        let _padding = cursor.read_u16::<LittleEndian>()?;
        let record_number = cursor.read_u32::<LittleEndian>()?;

        Ok(Self {
            signature,
            update_sequence_offset,
            update_sequence_count,
            log_sequence_number,
            sequence_number,
            hard_link_count,
            first_attribute_offset,
            flags,
            used_size,
            allocated_size,
            base_record_reference,
            base_record_sequence,
            next_attribute_id,
            record_number,
        })
    }

    /// Offset of the first attribute, validated against the block length
    pub fn attribute_start(&self, block_len: usize) -> Result<usize> {
        let offset = self.first_attribute_offset as usize;
        if offset >= block_len {
            return Err(MftError::InvalidAttributeOffset {
                offset: self.first_attribute_offset,
                len: block_len,
            });
        }
        Ok(offset)
    }

    /// Check for the "FILE" signature
    pub fn has_valid_signature(&self) -> bool {
        self.signature == MFT_RECORD_SIGNATURE
    }

    /// Check for the "BAAD" signature written after a failed multi-sector transfer
    pub fn is_bad(&self) -> bool {
        self.signature == MFT_RECORD_BAD_SIGNATURE
    }

    /// Check if this record is in use
    pub fn is_in_use(&self) -> bool {
        (self.flags & MFT_RECORD_IN_USE) != 0
    }

    /// Check if this record represents a directory
    pub fn is_directory(&self) -> bool {
        (self.flags & MFT_RECORD_IS_DIRECTORY) != 0
    }

    /// Check if this is a base record (not an extension)
    pub fn is_base_record(&self) -> bool {
        self.base_record_reference == 0
    }
}

// ============================================================================
// Attribute Header
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeHeader {
    pub attribute_type: u32,
    /// Total attribute length, the stride to the next attribute
    pub length: u32,
    pub non_resident: bool,
    pub name_length: u8,
    pub name_offset: u16,
    pub flags: u16,
    pub attribute_id: u16,
    pub body: AttributeBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AttributeBody {
    Resident(ResidentBody),
    NonResident(NonResidentBody),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResidentBody {
    pub content_size: u32,
    pub content_offset: u16,
    pub indexed_flag: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NonResidentBody {
    pub starting_vcn: u64,
    pub last_vcn: u64,
    pub data_runs_offset: u16,
    pub compression_unit: u16,
    pub allocated_size: u64,
    pub stream_size: u64,
    pub initialized_size: u64,
}

impl AttributeHeader {
    /// Parse the generic header and the resident or non-resident body.
    /// `data` starts at the attribute and `offset` is its position in the
    /// record, used only for error reporting.
    pub fn parse(data: &[u8], offset: usize) -> Result<Self> {
        let malformed = |needed: usize| MftError::MalformedAttributeStream {
            offset,
            reason: format!("attribute header needs {} bytes, {} left", needed, data.len()),
        };
        if data.len() < GENERIC_HEADER_SIZE {
            return Err(malformed(GENERIC_HEADER_SIZE));
        }

        let mut cursor = Cursor::new(data);

        let attribute_type = cursor.read_u32::<LittleEndian>()?;
        let length = cursor.read_u32::<LittleEndian>()?;
        let non_resident = cursor.read_u8()? != 0;
        let name_length = cursor.read_u8()?;
        let name_offset = cursor.read_u16::<LittleEndian>()?;
        let flags = cursor.read_u16::<LittleEndian>()?;
        let attribute_id = cursor.read_u16::<LittleEndian>()?;

        let body = if non_resident {
            if data.len() < NON_RESIDENT_HEADER_SIZE {
                return Err(MftError::ShortNonResidentBody {
                    offset,
                    got: data.len(),
                });
            }
            let starting_vcn = cursor.read_u64::<LittleEndian>()?;
            let last_vcn = cursor.read_u64::<LittleEndian>()?;
            let data_runs_offset = cursor.read_u16::<LittleEndian>()?;
            let compression_unit = cursor.read_u16::<LittleEndian>()?;
            let _padding = cursor.read_u32::<LittleEndian>()?;
            AttributeBody::NonResident(NonResidentBody {
                starting_vcn,
                last_vcn,
                data_runs_offset,
                compression_unit,
                allocated_size: cursor.read_u64::<LittleEndian>()?,
                stream_size: cursor.read_u64::<LittleEndian>()?,
                initialized_size: cursor.read_u64::<LittleEndian>()?,
            })
        } else {
            if data.len() < RESIDENT_HEADER_SIZE {
                return Err(malformed(RESIDENT_HEADER_SIZE));
            }
            AttributeBody::Resident(ResidentBody {
                content_size: cursor.read_u32::<LittleEndian>()?,
                content_offset: cursor.read_u16::<LittleEndian>()?,
                indexed_flag: cursor.read_u16::<LittleEndian>()?,
            })
        };

        Ok(Self {
            attribute_type,
            length,
            non_resident,
            name_length,
            name_offset,
            flags,
            attribute_id,
            body,
        })
    }

    pub fn kind(&self) -> Option<AttributeType> {
        AttributeType::from_u32(self.attribute_type)
    }

    /// Inline content of a resident attribute, clamped to what `attr_data`
    /// actually holds. Empty for non-resident attributes.
    pub fn resident_content<'a>(&self, attr_data: &'a [u8]) -> &'a [u8] {
        match &self.body {
            AttributeBody::Resident(r) => {
                let content = attr_data.get(r.content_offset as usize..).unwrap_or(&[]);
                &content[..content.len().min(r.content_size as usize)]
            }
            AttributeBody::NonResident(_) => &[],
        }
    }
}

// ============================================================================
// Standard Information Attribute
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StandardInformation {
    pub creation_time: WindowsTimestamp,
    pub modification_time: WindowsTimestamp,
    pub mft_modification_time: WindowsTimestamp,
    pub access_time: WindowsTimestamp,
    pub file_attributes: u32,
    pub max_versions: u32,
    pub version_number: u32,
    pub class_id: u32,
    pub owner_id: u32,
    pub security_id: u32,
    pub quota_charged: u64,
    pub usn: u64,
}

impl StandardInformation {
    /// Parse from resident attribute content
    pub fn parse(content: &[u8], offset: usize, local: bool) -> Result<Self> {
        if content.len() < STANDARD_INFORMATION_SIZE {
            return Err(MftError::ShortContent {
                attribute: AttributeType::StandardInformation.name(),
                offset,
                needed: STANDARD_INFORMATION_SIZE,
                got: content.len(),
            });
        }

        let mut cursor = Cursor::new(content);
        let mut time = || -> Result<WindowsTimestamp> {
            Ok(WindowsTimestamp::from_ticks(cursor.read_u64::<LittleEndian>()?, local))
        };
        let creation_time = time()?;
        let modification_time = time()?;
        let mft_modification_time = time()?;
        let access_time = time()?;

        let mut cursor = Cursor::new(&content[32..]);
        Ok(Self {
            creation_time,
            modification_time,
            mft_modification_time,
            access_time,
            file_attributes: cursor.read_u32::<LittleEndian>()?,
            max_versions: cursor.read_u32::<LittleEndian>()?,
            version_number: cursor.read_u32::<LittleEndian>()?,
            class_id: cursor.read_u32::<LittleEndian>()?,
            owner_id: cursor.read_u32::<LittleEndian>()?,
            security_id: cursor.read_u32::<LittleEndian>()?,
            quota_charged: cursor.read_u64::<LittleEndian>()?,
            usn: cursor.read_u64::<LittleEndian>()?,
        })
    }

    /// The four MACB timestamps in creation, modification, MFT-change, access order
    pub fn timestamps(&self) -> [&WindowsTimestamp; 4] {
        [
            &self.creation_time,
            &self.modification_time,
            &self.mft_modification_time,
            &self.access_time,
        ]
    }

    pub fn is_hidden(&self) -> bool {
        (self.file_attributes & file_attributes::HIDDEN) != 0
    }

    pub fn is_system(&self) -> bool {
        (self.file_attributes & file_attributes::SYSTEM) != 0
    }
}

// ============================================================================
// File Name Attribute
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileNameAttribute {
    /// Raw parent file reference: record number (48 bits) and sequence (16 bits)
    pub parent_reference: u64,
    pub creation_time: WindowsTimestamp,
    pub modification_time: WindowsTimestamp,
    pub mft_modification_time: WindowsTimestamp,
    pub access_time: WindowsTimestamp,
    pub allocated_size: u64,
    pub real_size: u64,
    pub flags: u32,
    /// Name length in UTF-16 code units
    pub name_length: u8,
    pub namespace: FilenameNamespace,
    pub name: String,
}

impl FileNameAttribute {
    /// Parse from resident attribute content
    pub fn parse(content: &[u8], offset: usize, local: bool) -> Result<Self> {
        let short = |needed: usize| MftError::ShortContent {
            attribute: AttributeType::FileName.name(),
            offset,
            needed,
            got: content.len(),
        };

        if content.len() < FILE_NAME_FIXED_SIZE {
            return Err(short(FILE_NAME_FIXED_SIZE));
        }

        let mut cursor = Cursor::new(content);

        let parent_reference = cursor.read_u64::<LittleEndian>()?;
        let creation_time = WindowsTimestamp::from_ticks(cursor.read_u64::<LittleEndian>()?, local);
        let modification_time = WindowsTimestamp::from_ticks(cursor.read_u64::<LittleEndian>()?, local);
        let mft_modification_time = WindowsTimestamp::from_ticks(cursor.read_u64::<LittleEndian>()?, local);
        let access_time = WindowsTimestamp::from_ticks(cursor.read_u64::<LittleEndian>()?, local);
        let allocated_size = cursor.read_u64::<LittleEndian>()?;
        let real_size = cursor.read_u64::<LittleEndian>()?;
        let flags = cursor.read_u32::<LittleEndian>()?;
        let _reparse_value = cursor.read_u32::<LittleEndian>()?;
        let name_length = cursor.read_u8()?;
        let namespace = FilenameNamespace::from_u8(cursor.read_u8()?);

        // Read filename (UTF-16LE)
        let name_end = FILE_NAME_FIXED_SIZE + name_length as usize * 2;
        if content.len() < name_end {
            return Err(short(name_end));
        }
        let name = utf16le_to_string(&content[FILE_NAME_FIXED_SIZE..name_end]);

        Ok(Self {
            parent_reference,
            creation_time,
            modification_time,
            mft_modification_time,
            access_time,
            allocated_size,
            real_size,
            flags,
            name_length,
            namespace,
            name,
        })
    }

    /// Get the parent record number (lower 48 bits)
    pub fn parent_record_number(&self) -> u64 {
        self.parent_reference & RECORD_NUMBER_MASK
    }

    /// Parent sequence number (upper 16 bits). Decoded but never checked
    /// against the parent record's own sequence number.
    pub fn parent_sequence(&self) -> u16 {
        (self.parent_reference >> 48) as u16
    }
}

/// Decode UTF-16LE bytes, replacing unpaired surrogates
pub fn utf16le_to_string(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|chunk| u16::from_le_bytes([chunk[0], chunk[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

// ============================================================================
// File Attributes
// ============================================================================

pub mod file_attributes {
    pub const HIDDEN: u32 = 0x00000002;
    pub const SYSTEM: u32 = 0x00000004;
}
