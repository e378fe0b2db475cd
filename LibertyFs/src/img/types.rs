//! Types for IMG v3 archive handling

use std::path::PathBuf;

use super::{
    IMG_BLOCK_SIZE, IMG_ENTRY_SIZE, IMG_HEADER_SIZE, IMG_MAGIC, IMG_VERSION, PADDING_MASK,
    RESOURCE_FLAG,
};

/// Unknown header word written by the original tools
pub const HEADER_UNKNOWN: u16 = 0x00E9;

/// 20-byte archive header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImgHeader {
    pub magic: u32,
    pub version: u32,
    pub num_items: u32,
    /// Bytes of entry table plus name table
    pub table_size: u32,
    pub item_size: u16,
    pub unknown: u16,
}

impl ImgHeader {
    /// Decode from the first 20 bytes of `data`.
    #[must_use]
    pub fn parse(data: &[u8]) -> Option<Self> {
        let bytes = data.get(..IMG_HEADER_SIZE)?;
        let word = |i: usize| u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
        Some(Self {
            magic: word(0),
            version: word(4),
            num_items: word(8),
            table_size: word(12),
            item_size: u16::from_le_bytes([bytes[16], bytes[17]]),
            unknown: u16::from_le_bytes([bytes[18], bytes[19]]),
        })
    }

    /// Magic, version and entry size all match v3.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.magic == IMG_MAGIC && self.version == IMG_VERSION && self.item_size as usize == IMG_ENTRY_SIZE
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; IMG_HEADER_SIZE] {
        let mut out = [0u8; IMG_HEADER_SIZE];
        out[0..4].copy_from_slice(&self.magic.to_le_bytes());
        out[4..8].copy_from_slice(&self.version.to_le_bytes());
        out[8..12].copy_from_slice(&self.num_items.to_le_bytes());
        out[12..16].copy_from_slice(&self.table_size.to_le_bytes());
        out[16..18].copy_from_slice(&self.item_size.to_le_bytes());
        out[18..20].copy_from_slice(&self.unknown.to_le_bytes());
        out
    }
}

/// 16-byte table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImgEntry {
    /// Payload size for plain files, RSC flags for resources
    pub size_or_flags: u32,
    pub resource_type: u32,
    pub offset_block: u32,
    pub used_blocks: u16,
    /// Resource marker and padding count
    pub flags: u16,
}

impl ImgEntry {
    #[must_use]
    pub fn parse(bytes: &[u8; IMG_ENTRY_SIZE]) -> Self {
        let word = |i: usize| u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
        Self {
            size_or_flags: word(0),
            resource_type: word(4),
            offset_block: word(8),
            used_blocks: u16::from_le_bytes([bytes[12], bytes[13]]),
            flags: u16::from_le_bytes([bytes[14], bytes[15]]),
        }
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; IMG_ENTRY_SIZE] {
        let mut out = [0u8; IMG_ENTRY_SIZE];
        out[0..4].copy_from_slice(&self.size_or_flags.to_le_bytes());
        out[4..8].copy_from_slice(&self.resource_type.to_le_bytes());
        out[8..12].copy_from_slice(&self.offset_block.to_le_bytes());
        out[12..14].copy_from_slice(&self.used_blocks.to_le_bytes());
        out[14..16].copy_from_slice(&self.flags.to_le_bytes());
        out
    }

    /// Resource entries carry RSC flags in the size word, or the resource
    /// marker in the flag word.
    #[must_use]
    pub fn is_resource(&self) -> bool {
        self.size_or_flags & 0xC000_0000 != 0 || self.flags & RESOURCE_FLAG != 0
    }

    /// Padding bytes after a resource payload in its last block.
    #[must_use]
    pub fn padding(&self) -> u32 {
        u32::from(self.flags & PADDING_MASK)
    }

    /// Payload size in bytes.
    #[must_use]
    pub fn actual_size(&self) -> u64 {
        if self.is_resource() {
            (u64::from(self.used_blocks) * IMG_BLOCK_SIZE as u64).saturating_sub(u64::from(self.padding()))
        } else {
            u64::from(self.size_or_flags)
        }
    }

    /// Absolute byte offset of the payload.
    #[must_use]
    pub fn data_offset(&self) -> u64 {
        u64::from(self.offset_block) * IMG_BLOCK_SIZE as u64
    }
}

/// An entry with its name, as stored in the table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImgTocEntry {
    pub name: String,
    pub entry: ImgEntry,
}

/// Decoded table of contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImgToc {
    pub header: ImgHeader,
    pub entries: Vec<ImgTocEntry>,
    /// Whether the table had to be decrypted
    pub encrypted: bool,
}

/// A named payload extracted from or destined for an archive
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImgFile {
    pub name: String,
    pub data: Vec<u8>,
    /// 0 for plain files
    pub resource_type: u32,
    /// Came from a replacement folder
    pub is_replacement: bool,
}

impl ImgFile {
    #[must_use]
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
            ..Self::default()
        }
    }
}

/// Merged archive served from memory
#[derive(Debug, Clone)]
pub struct VirtualImage {
    /// Archive the merge started from
    pub source: PathBuf,
    /// Originals with replacements substituted, then added files
    pub files: Vec<ImgFile>,
    /// Serialized archive
    pub data: Vec<u8>,
    pub version: u32,
}

impl VirtualImage {
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Case-insensitive lookup by entry name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&ImgFile> {
        self.files.iter().find(|f| f.name.eq_ignore_ascii_case(name))
    }
}

/// Statistics for [`super::ImgMerger`]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImgStats {
    pub imgs_loaded: u64,
    pub imgs_merged: u64,
    pub files_replaced: u64,
    pub files_added: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_entry_size() {
        let entry = ImgEntry {
            size_or_flags: 1234,
            offset_block: 3,
            used_blocks: 1,
            ..ImgEntry::default()
        };
        assert!(!entry.is_resource());
        assert_eq!(entry.actual_size(), 1234);
        assert_eq!(entry.data_offset(), 3 * 2048);
    }

    #[test]
    fn test_resource_entry_size() {
        let entry = ImgEntry {
            size_or_flags: 0x8000_0010,
            resource_type: 0x08,
            offset_block: 1,
            used_blocks: 2,
            flags: 100,
        };
        assert!(entry.is_resource());
        assert_eq!(entry.actual_size(), 4096 - 100);

        let marked = ImgEntry {
            size_or_flags: 0x10,
            used_blocks: 1,
            flags: RESOURCE_FLAG | 48,
            ..ImgEntry::default()
        };
        assert!(marked.is_resource());
        assert_eq!(marked.actual_size(), 2000);
    }

    #[test]
    fn test_header_validation() {
        let header = ImgHeader {
            magic: IMG_MAGIC,
            version: 3,
            num_items: 0,
            table_size: 0,
            item_size: 16,
            unknown: HEADER_UNKNOWN,
        };
        assert!(header.is_valid());
        assert_eq!(ImgHeader::parse(&header.to_bytes()), Some(header));
        assert!(!ImgHeader { version: 2, ..header }.is_valid());
        assert!(!ImgHeader { item_size: 12, ..header }.is_valid());
        assert!(ImgHeader::parse(&[0u8; 10]).is_none());
    }
}
