use std::io;

pub type Result<T> = std::result::Result<T, HeaderError>;

/// Failures produced while decoding the header region of an image.
///
/// A failed decode never yields a partially populated [`crate::PeHeaders`].
#[derive(Debug, thiserror::Error)]
pub enum HeaderError {
    /// The source ran dry before a fixed-size record could be read in full.
    #[error("unexpected end of data reading {record} at {offset:#x}: needed {needed} bytes, {available} available")]
    UnexpectedEndOfData {
        record: &'static str,
        offset: u64,
        needed: usize,
        available: usize,
    },

    /// A computed offset points past the end of the source.
    #[error("{what} at {offset:#x} lies outside the {len}-byte source")]
    InvalidOffset {
        what: &'static str,
        offset: u64,
        len: u64,
    },

    #[error("invalid DOS magic {found:#06x}, expected 0x5a4d (\"MZ\")")]
    InvalidDosMagic { found: u16 },

    #[error("invalid NT signature {found:#010x}, expected 0x00004550 (\"PE\\0\\0\")")]
    InvalidSignature { found: u32 },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl HeaderError {
    pub fn is_unexpected_end(&self) -> bool {
        matches!(self, HeaderError::UnexpectedEndOfData { .. })
    }

    pub fn is_invalid_offset(&self) -> bool {
        matches!(self, HeaderError::InvalidOffset { .. })
    }
}
