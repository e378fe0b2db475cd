//! Types for RPF2 archive handling

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::crypto::AesKey;
use crate::utils::PathKey;

/// Fixed 20-byte header at the start of an RPF2 file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RpfHeader {
    /// Magic bytes (`RPF2`)
    pub magic: u32,
    /// Byte size of the table of contents at [`super::TOC_OFFSET`]
    pub toc_size: u32,
    /// Number of 16-byte TOC entries
    pub entry_count: u32,
    /// Unused by the game; preserved for tooling
    pub unknown: u32,
    /// Whether the TOC is AES encrypted
    pub encrypted: bool,
}

/// Location and encoding of a file payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RpfFileInfo {
    /// Absolute byte offset of the payload
    pub offset: u64,
    /// Uncompressed size
    pub size: u32,
    /// Stored size (0 if stored raw)
    pub compressed_size: u32,
    /// Whether the payload is raw deflate
    pub compressed: bool,
    /// Resource type byte for resource-layout entries, 0 otherwise
    pub resource_type: u8,
}

impl RpfFileInfo {
    /// Number of bytes to read from the archive for this entry.
    #[must_use]
    pub fn read_size(&self) -> u32 {
        let stored = if self.compressed { self.compressed_size } else { self.size };
        if stored == 0 { self.size } else { stored }
    }

    /// Whether the stored bytes must be inflated.
    #[must_use]
    pub fn needs_inflate(&self) -> bool {
        self.compressed && self.compressed_size < self.size && self.size > 0
    }

    /// Whether this entry uses the resource layout.
    #[must_use]
    pub fn is_resource(&self) -> bool {
        self.resource_type != 0
    }
}

/// Directory or file payload of a TOC entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpfEntryKind {
    Directory {
        /// TOC index of the first child
        first_child: u32,
        /// Number of consecutive children
        child_count: u32,
    },
    File(RpfFileInfo),
}

/// One TOC entry with its resolved full path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpfEntry {
    /// Name as stored in the name table
    pub name: String,
    /// Full path built from the directory tree (empty if unreachable)
    pub full_path: String,
    pub kind: RpfEntryKind,
}

impl RpfEntry {
    #[must_use]
    pub fn is_directory(&self) -> bool {
        matches!(self.kind, RpfEntryKind::Directory { .. })
    }

    #[must_use]
    pub fn file_info(&self) -> Option<&RpfFileInfo> {
        match &self.kind {
            RpfEntryKind::File(info) => Some(info),
            RpfEntryKind::Directory { .. } => None,
        }
    }
}

/// A parsed archive: header, entries and the normalized path index.
#[derive(Debug, Clone)]
pub struct RpfArchive {
    pub path: PathBuf,
    pub header: RpfHeader,
    pub entries: Vec<RpfEntry>,
    /// Normalized full path -> position in `entries` (files only)
    pub index: HashMap<PathKey, usize>,
    /// Key the TOC was decrypted with
    pub key: Option<AesKey>,
}

impl RpfArchive {
    /// Look up a file entry by any spelling of its path.
    pub fn find(&self, path: &str) -> Option<&RpfEntry> {
        self.index.get(&PathKey::new(path)).map(|&i| &self.entries[i])
    }

    /// File entries in TOC order.
    pub fn files(&self) -> impl Iterator<Item = &RpfEntry> {
        self.entries.iter().filter(|e| !e.is_directory())
    }

    #[must_use]
    pub fn file_count(&self) -> usize {
        self.index.len()
    }
}

/// Result of a single lazy extraction
#[derive(Debug, Clone)]
pub struct ExtractedFile {
    /// Decoded file contents
    pub data: Arc<Vec<u8>>,
    /// Normalized archive path
    pub path: PathKey,
    /// Whether the bytes came from the extraction cache
    pub from_cache: bool,
}

/// Statistics for [`super::ArchiveContainer`]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RpfStats {
    pub rpfs_loaded: u64,
    pub files_extracted: u64,
    pub bytes_extracted: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

/// Progress information during bulk extraction
#[derive(Debug, Clone)]
pub struct ExtractProgress {
    /// Current operation phase
    pub phase: ExtractPhase,
    /// Files completed so far
    pub current: usize,
    /// Total number of file entries
    pub total: usize,
    /// Entry just finished (if applicable)
    pub current_file: Option<String>,
}

impl ExtractProgress {
    #[must_use]
    pub fn new(phase: ExtractPhase, current: usize, total: usize) -> Self {
        Self {
            phase,
            current,
            total,
            current_file: None,
        }
    }

    #[must_use]
    pub fn with_file(
        phase: ExtractPhase,
        current: usize,
        total: usize,
        file: impl Into<String>,
    ) -> Self {
        Self {
            phase,
            current,
            total,
            current_file: Some(file.into()),
        }
    }

    /// Get the progress percentage (0.0 - 1.0)
    #[must_use]
    pub fn percentage(&self) -> f32 {
        if self.total == 0 {
            1.0
        } else {
            self.current as f32 / self.total as f32
        }
    }
}

/// Phase of a bulk extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractPhase {
    ReadingToc,
    ExtractingFiles,
    Complete,
}

impl ExtractPhase {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReadingToc => "Reading table of contents",
            Self::ExtractingFiles => "Extracting files",
            Self::Complete => "Complete",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(size: u32, compressed_size: u32, compressed: bool) -> RpfFileInfo {
        RpfFileInfo {
            offset: 0x800,
            size,
            compressed_size,
            compressed,
            resource_type: 0,
        }
    }

    #[test]
    fn test_read_size() {
        assert_eq!(info(100, 40, true).read_size(), 40);
        assert_eq!(info(100, 0, false).read_size(), 100);
        // Compressed flag with zero stored size falls back to size
        assert_eq!(info(100, 0, true).read_size(), 100);
    }

    #[test]
    fn test_needs_inflate() {
        assert!(info(100, 40, true).needs_inflate());
        assert!(!info(100, 100, true).needs_inflate());
        assert!(!info(100, 40, false).needs_inflate());
        assert!(!info(0, 0, true).needs_inflate());
    }

    #[test]
    fn test_progress_percentage() {
        assert!((ExtractProgress::new(ExtractPhase::ExtractingFiles, 1, 4).percentage() - 0.25).abs() < f32::EPSILON);
        assert!((ExtractProgress::new(ExtractPhase::Complete, 0, 0).percentage() - 1.0).abs() < f32::EPSILON);
    }
}
