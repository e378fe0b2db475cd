//! Error types for `LibertyFs`

use std::path::PathBuf;

use thiserror::Error;

/// The error type for `LibertyFs` operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    // ==================== IO Errors ====================
    /// IO error from file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ==================== RPF Archive Errors ====================
    /// The file is not an RPF2 archive (wrong magic).
    #[error("invalid RPF magic: expected RPF2, found {0:#010X}")]
    InvalidRpfMagic(u32),

    /// The TOC declares more entries than it has room for.
    #[error("RPF TOC too small: {entry_count} entries need {required} bytes, TOC has {toc_size}")]
    RpfTocTooSmall {
        /// Entries declared in the header.
        entry_count: u32,
        /// Bytes needed for the entry table.
        required: u64,
        /// TOC size declared in the header.
        toc_size: u32,
    },

    /// Bulk extraction completed but some entries failed.
    #[error("extraction failed for {failed} of {total} files")]
    RpfExtractionPartialFailure {
        /// Number of file entries in the archive.
        total: usize,
        /// Number of failed entries.
        failed: usize,
    },

    /// The archive would exceed the 31-bit offsets the TOC can address.
    #[error("archive too large: {size} bytes")]
    ArchiveTooLarge {
        /// Total archive size in bytes.
        size: u64,
    },

    /// An entry's payload range lies outside the archive file.
    #[error("entry '{path}' reads past end of archive (offset {offset}, length {length})")]
    EntryOutOfBounds {
        /// Full path of the entry.
        path: String,
        /// Byte offset of the payload.
        offset: u64,
        /// Number of bytes requested.
        length: u64,
    },

    // ==================== IMG Archive Errors ====================
    /// The file is not a v3 IMG archive.
    #[error("invalid IMG header: magic {magic:#010X}, version {version}")]
    InvalidImgHeader {
        /// Magic found in the file.
        magic: u32,
        /// Version found in the file.
        version: u32,
    },

    /// The IMG TOC is truncated.
    #[error("IMG table truncated: need {required} bytes, have {available}")]
    ImgTableTruncated {
        /// Bytes needed.
        required: usize,
        /// Bytes available.
        available: usize,
    },

    /// An IMG entry does not fit the v3 field widths.
    #[error("IMG entry '{name}' too large: {size} bytes")]
    ImgEntryTooLarge {
        /// Entry name.
        name: String,
        /// Payload size in bytes.
        size: usize,
    },

    // ==================== Encryption Errors ====================
    /// An AES key was not exactly 32 bytes.
    #[error("invalid AES key length: expected 32 bytes, got {0}")]
    InvalidAesKeyLength(usize),

    // ==================== Texture Errors ====================
    /// Data too short to carry a resource header.
    #[error("resource too small: {0} bytes (need at least 16)")]
    ResourceTooSmall(usize),

    // ==================== GXT Errors ====================
    /// Not a GXT2 text table.
    #[error("invalid GXT header: version {version}, bits {bits}")]
    InvalidGxtHeader {
        /// Version field.
        version: u16,
        /// Character width field.
        bits: u16,
    },

    // ==================== Overlay / VFS Errors ====================
    /// The overlay directory does not exist.
    #[error("overlay directory not found: {0}")]
    OverlayNotFound(PathBuf),

    /// The overlay directory is already registered.
    #[error("overlay already registered: {0}")]
    OverlayAlreadyRegistered(PathBuf),

    // ==================== Config Errors ====================
    /// Could not determine the platform config directory.
    #[error("could not determine config directory")]
    ConfigDirNotFound,

    /// JSON parsing or serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    // ==================== File System Errors ====================
    /// Invalid file path.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Directory traversal error.
    #[error("directory walk error: {0}")]
    WalkDirError(String),

    // ==================== Generic/Fallback Errors ====================
    /// Generic decompression error.
    #[error("decompression failed: {0}")]
    DecompressionError(String),

    /// Generic compression error.
    #[error("compression failed: {0}")]
    CompressionError(String),
}

// Add conversion from walkdir::Error
impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Self {
        Error::WalkDirError(err.to_string())
    }
}

/// A specialized Result type for `LibertyFs` operations.
pub type Result<T> = std::result::Result<T, Error>;
