//! RPF2 archive reader
//!
//! Decodes the header, decrypts and parses the table of contents, and
//! resolves each entry's full path by walking the directory tree from entry
//! 0. Every offset read from the TOC is bounds-checked against the TOC
//! buffer, so a wrong key yields garbage entries rather than a crash.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use super::types::{RpfArchive, RpfEntry, RpfEntryKind, RpfFileInfo, RpfHeader};
use super::{HEADER_SIZE, RPF2_MAGIC, TOC_ENTRY_SIZE, TOC_OFFSET};
use crate::crypto::AesKey;
use crate::error::{Error, Result};
use crate::utils::PathKey;

/// Raw 16-byte TOC entry before interpretation
#[derive(Debug, Clone, Copy)]
struct TocEntryRaw {
    name_offset: i32,
    field1: i32,
    field2: i32,
    field3: u32,
}

/// RPF2 file reader
pub struct RpfReader<R: Read + Seek> {
    reader: BufReader<R>,
    header: Option<RpfHeader>,
    key: Option<AesKey>,
}

impl<R: Read + Seek> RpfReader<R> {
    /// Create a new reader from a Read + Seek source
    pub fn new(reader: R) -> Self {
        Self::with_key(reader, None)
    }

    /// Create a reader that decrypts encrypted tables with `key`
    pub fn with_key(reader: R, key: Option<AesKey>) -> Self {
        Self {
            reader: BufReader::new(reader),
            header: None,
            key,
        }
    }

    /// Read and validate the 20-byte header.
    ///
    /// # Errors
    /// Returns [`Error::InvalidRpfMagic`] if the magic does not match.
    pub fn read_header(&mut self) -> Result<RpfHeader> {
        self.reader.seek(SeekFrom::Start(0))?;

        let mut bytes = [0u8; HEADER_SIZE];
        self.reader.read_exact(&mut bytes)?;
        let header = parse_header(&bytes)?;

        self.header = Some(header);
        Ok(header)
    }

    /// Read, decrypt and parse the table of contents.
    pub fn read_entries(&mut self) -> Result<Vec<RpfEntry>> {
        let header = match self.header {
            Some(h) => h,
            None => self.read_header()?,
        };

        self.reader.seek(SeekFrom::Start(TOC_OFFSET))?;
        let mut toc = Vec::new();
        (&mut self.reader)
            .take(u64::from(header.toc_size))
            .read_to_end(&mut toc)?;
        if toc.len() < header.toc_size as usize {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("TOC truncated: {} of {} bytes", toc.len(), header.toc_size),
            )));
        }

        if header.encrypted {
            match &self.key {
                Some(key) => key.decrypt_in_place(&mut toc),
                None => tracing::warn!("RPF TOC is encrypted but no AES key is set"),
            }
        }

        parse_toc(&toc, header.entry_count)
    }

    /// Read the stored (possibly compressed) bytes of a file entry.
    pub fn read_stored(&mut self, info: &RpfFileInfo) -> Result<Vec<u8>> {
        read_stored(&mut self.reader, info)
    }

    #[must_use]
    pub fn key(&self) -> Option<&AesKey> {
        self.key.as_ref()
    }
}

impl RpfArchive {
    /// Open and index an archive on disk.
    pub fn open(path: impl AsRef<Path>, key: Option<AesKey>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let mut reader = RpfReader::with_key(file, key.clone());
        let header = reader.read_header()?;
        let entries = reader.read_entries()?;
        let index = build_index(&entries);

        tracing::debug!(
            "Indexed {}: {} entries, {} files{}",
            path.display(),
            entries.len(),
            index.len(),
            if header.encrypted { " (encrypted)" } else { "" }
        );

        Ok(Self {
            path: path.to_path_buf(),
            header,
            entries,
            index,
            key,
        })
    }
}

/// Seek to an entry and read its stored bytes.
pub(crate) fn read_stored<S: Read + Seek>(source: &mut S, info: &RpfFileInfo) -> Result<Vec<u8>> {
    source.seek(SeekFrom::Start(info.offset))?;
    let mut stored = vec![0u8; info.read_size() as usize];
    source.read_exact(&mut stored)?;
    Ok(stored)
}

/// Decode the fixed header.
pub fn parse_header(bytes: &[u8; HEADER_SIZE]) -> Result<RpfHeader> {
    let word = |i: usize| u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);

    let magic = word(0);
    if magic != RPF2_MAGIC {
        return Err(Error::InvalidRpfMagic(magic));
    }

    Ok(RpfHeader {
        magic,
        toc_size: word(4),
        entry_count: word(8),
        unknown: word(12),
        encrypted: word(16) != 0,
    })
}

/// Parse a decrypted TOC into entries with full paths.
pub fn parse_toc(toc: &[u8], entry_count: u32) -> Result<Vec<RpfEntry>> {
    let required = u64::from(entry_count) * TOC_ENTRY_SIZE as u64;
    if required > toc.len() as u64 {
        return Err(Error::RpfTocTooSmall {
            entry_count,
            required,
            toc_size: toc.len() as u32,
        });
    }

    let (table, names) = toc.split_at(required as usize);
    let raw: Vec<TocEntryRaw> = table
        .chunks_exact(TOC_ENTRY_SIZE)
        .map(|c| TocEntryRaw {
            name_offset: i32::from_le_bytes([c[0], c[1], c[2], c[3]]),
            field1: i32::from_le_bytes([c[4], c[5], c[6], c[7]]),
            field2: i32::from_le_bytes([c[8], c[9], c[10], c[11]]),
            field3: u32::from_le_bytes([c[12], c[13], c[14], c[15]]),
        })
        .collect();

    let mut entries: Vec<RpfEntry> = raw
        .iter()
        .map(|r| RpfEntry {
            name: read_name(names, r.name_offset),
            full_path: String::new(),
            kind: decode_kind(r),
        })
        .collect();

    build_full_paths(&mut entries);
    Ok(entries)
}

fn read_name(names: &[u8], offset: i32) -> String {
    let Ok(start) = usize::try_from(offset) else {
        return String::new();
    };
    if start >= names.len() {
        return String::new();
    }
    let rest = &names[start..];
    let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
    String::from_utf8_lossy(&rest[..end]).into_owned()
}

fn decode_kind(raw: &TocEntryRaw) -> RpfEntryKind {
    if raw.field2 < 0 {
        return RpfEntryKind::Directory {
            first_child: (raw.field2 as u32) & 0x7FFF_FFFF,
            child_count: raw.field3 & 0x0FFF_FFFF,
        };
    }

    let size = raw.field1 as u32;
    let offset = raw.field2 as u32;

    if raw.field3 & 0xC000_0000 == 0xC000_0000 {
        RpfEntryKind::File(RpfFileInfo {
            offset: u64::from(offset & 0x7FFF_FF00),
            size,
            compressed_size: size,
            compressed: false,
            resource_type: (offset & 0xFF) as u8,
        })
    } else {
        RpfEntryKind::File(RpfFileInfo {
            offset: u64::from(offset),
            size,
            compressed_size: raw.field3 & 0xBFFF_FFFF,
            compressed: raw.field3 & 0x4000_0000 != 0,
            resource_type: 0,
        })
    }
}

/// Walk the directory tree from entry 0, assigning `full_path`.
///
/// A child is only followed when its index is greater than its parent's and
/// each entry is visited at most once, so malformed trees terminate.
fn build_full_paths(entries: &mut [RpfEntry]) {
    if entries.is_empty() {
        return;
    }

    let count = entries.len();
    let mut visited = vec![false; count];
    let mut pending: Vec<(usize, String)> = vec![(0, String::new())];

    while let Some((idx, parent)) = pending.pop() {
        if visited[idx] {
            continue;
        }
        visited[idx] = true;

        let entry = &mut entries[idx];
        entry.full_path = if parent.is_empty() {
            entry.name.clone()
        } else {
            format!("{parent}/{}", entry.name)
        };

        if let RpfEntryKind::Directory { first_child, child_count } = entry.kind {
            let start = first_child as usize;
            let end = (u64::from(first_child) + u64::from(child_count)).min(count as u64) as usize;
            // Reverse so children pop in TOC order
            for child in (start..end).rev() {
                if child > idx && !visited[child] {
                    pending.push((child, entry.full_path.clone()));
                }
            }
        }
    }
}

/// Normalized path -> entry position, files only.
pub fn build_index(entries: &[RpfEntry]) -> HashMap<PathKey, usize> {
    entries
        .iter()
        .enumerate()
        .filter(|(_, e)| !e.is_directory())
        .filter_map(|(i, e)| {
            let key = PathKey::new(&e.full_path);
            (!key.is_empty()).then_some((key, i))
        })
        .collect()
}
