//! Attribute stream decoding
//!
//! Walks the attribute list of one MFT record. Each step yields either a
//! decoded attribute or the error that made it unusable; the walk ends on the
//! end marker, when fewer than 8 bytes remain, or when the stream stops making
//! sense.

use crate::error::{MftError, Result};
use crate::ntfs::structs::*;
use byteorder::{ByteOrder, LittleEndian};
use serde::Serialize;

/// Options that change how record content is decoded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Render timestamps in the local time zone instead of UTC
    pub local_time: bool,
}

/// Marker for object identifier fields that are not decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BirthIds {
    NotImplemented,
}

/// Presence of an $OBJECT_ID attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectId {
    pub attribute_id: u16,
    /// Size of the inline content, zero if non-resident
    pub content_size: u32,
    /// Birth volume/object/domain identifiers
    pub birth_ids: BirthIds,
}

/// Type-specific result of decoding one attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeContent {
    StandardInformation(StandardInformation),
    FileName(FileNameAttribute),
    ObjectId(ObjectId),
    /// Recognised attribute whose content is not interpreted
    Marker(AttributeType),
    /// Type code we do not know
    Unknown(u32),
}

/// One attribute, with its position in the record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedAttribute {
    pub offset: usize,
    pub header: AttributeHeader,
    pub content: AttributeContent,
}

/// Why an attribute walk stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StreamEnd {
    /// Hit the 0xFFFFFFFF end marker
    Terminator,
    /// Fewer than 8 bytes left in the block
    Exhausted,
    /// Bad length or header, remaining bytes ignored
    Malformed,
}

/// Iterator over the attributes of a record block
pub struct AttributeWalker<'a> {
    data: &'a [u8],
    offset: usize,
    options: DecodeOptions,
    end: Option<StreamEnd>,
}

impl<'a> AttributeWalker<'a> {
    /// Start walking `data` at `offset` (normally the header's first attribute offset)
    pub fn new(data: &'a [u8], offset: usize, options: DecodeOptions) -> Self {
        Self {
            data,
            offset,
            options,
            end: None,
        }
    }

    /// How the walk ended, `None` while attributes remain
    pub fn end(&self) -> Option<StreamEnd> {
        self.end
    }

    fn decode(&self, offset: usize, attr_data: &[u8]) -> Result<DecodedAttribute> {
        let header = AttributeHeader::parse(attr_data, offset)?;
        let local = self.options.local_time;

        let content = match header.kind() {
            Some(AttributeType::StandardInformation) => {
                let content = header.resident_content(attr_data);
                AttributeContent::StandardInformation(StandardInformation::parse(content, offset, local)?)
            }
            Some(AttributeType::FileName) => {
                let content = header.resident_content(attr_data);
                AttributeContent::FileName(FileNameAttribute::parse(content, offset, local)?)
            }
            Some(AttributeType::ObjectId) => {
                let content_size = match &header.body {
                    AttributeBody::Resident(r) => r.content_size,
                    AttributeBody::NonResident(_) => 0,
                };
                AttributeContent::ObjectId(ObjectId {
                    attribute_id: header.attribute_id,
                    content_size,
                    birth_ids: BirthIds::NotImplemented,
                })
            }
            Some(kind) => AttributeContent::Marker(kind),
            None => AttributeContent::Unknown(header.attribute_type),
        };

        Ok(DecodedAttribute {
            offset,
            header,
            content,
        })
    }
}

impl<'a> Iterator for AttributeWalker<'a> {
    type Item = Result<DecodedAttribute>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.end.is_some() {
            return None;
        }

        let start = self.offset;
        if self.data.len().saturating_sub(start) < 8 {
            self.end = Some(StreamEnd::Exhausted);
            return None;
        }

        let rest = &self.data[start..];
        if LittleEndian::read_u32(&rest[0..4]) == ATTRIBUTE_END_MARKER {
            self.end = Some(StreamEnd::Terminator);
            return None;
        }

        let length = LittleEndian::read_u32(&rest[4..8]) as usize;
        let next = match start.checked_add(length) {
            Some(next) if length > 0 => next,
            _ => {
                self.end = Some(StreamEnd::Malformed);
                return Some(Err(MftError::MalformedAttributeStream {
                    offset: start,
                    reason: format!("attribute length {} does not advance", length),
                }));
            }
        };

        // The declared length bounds the attribute; the block bounds everything
        let attr_data = &self.data[start..next.min(self.data.len())];
        self.offset = next;

        let result = self.decode(start, attr_data);
        if let Err(MftError::MalformedAttributeStream { .. }) = result {
            self.end = Some(StreamEnd::Malformed);
        }
        Some(result)
    }
}
