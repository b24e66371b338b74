//! Error types for mftpath
//!
//! Record-level, attribute-level and pipeline-level failures share one enum so
//! every failure can be surfaced either as a record note or a scan diagnostic.

use thiserror::Error;

/// Main error type for mftpath operations
#[derive(Error, Debug)]
pub enum MftError {
    #[error("Truncated record header: need 48 bytes, got {0}")]
    TruncatedHeader(usize),

    #[error("Invalid attribute offset {offset}: record block is {len} bytes")]
    InvalidAttributeOffset { offset: u16, len: usize },

    #[error("Short {attribute} content at offset {offset}: needed {needed}, got {got}")]
    ShortContent {
        attribute: &'static str,
        offset: usize,
        needed: usize,
        got: usize,
    },

    #[error("Short non-resident attribute body at offset {offset}: needed 64, got {got}")]
    ShortNonResidentBody { offset: usize, got: usize },

    #[error("Malformed attribute stream at offset {offset}: {reason}")]
    MalformedAttributeStream { offset: usize, reason: String },

    #[error("Timestamp out of range: {0:#018x} ticks")]
    TimestampOutOfRange(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Record source error: {0}")]
    Source(String),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for mftpath operations
pub type Result<T> = std::result::Result<T, MftError>;

impl MftError {
    /// Check if this error is recoverable (scan can continue)
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            MftError::Io(_)
                | MftError::Source(_)
                | MftError::Json(_)
                | MftError::NotFound(_)
                | MftError::InvalidConfig(_)
        )
    }

    /// Check if this error makes the whole record unusable
    pub fn is_record_fatal(&self) -> bool {
        matches!(
            self,
            MftError::TruncatedHeader(_) | MftError::InvalidAttributeOffset { .. }
        )
    }

    /// Short stable name, used as a key in scan summaries
    pub fn kind(&self) -> &'static str {
        match self {
            MftError::TruncatedHeader(_) => "TruncatedHeader",
            MftError::InvalidAttributeOffset { .. } => "InvalidAttributeOffset",
            MftError::ShortContent { .. } => "ShortContent",
            MftError::ShortNonResidentBody { .. } => "ShortNonResidentBody",
            MftError::MalformedAttributeStream { .. } => "MalformedAttributeStream",
            MftError::TimestampOutOfRange(_) => "TimestampOutOfRange",
            MftError::Io(_) => "Io",
            MftError::Source(_) => "Source",
            MftError::Json(_) => "Json",
            MftError::NotFound(_) => "NotFound",
            MftError::InvalidConfig(_) => "InvalidConfig",
        }
    }
}
