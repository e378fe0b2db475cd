//! RPF2 archive writer
//!
//! Directory entries are laid out breadth-first so every directory's
//! children occupy a contiguous index range after the directory itself.
//! Payloads start on the first 0x800 boundary after the TOC and are padded
//! to 0x800 each.

use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};
use walkdir::WalkDir;

use super::decompression::deflate_raw;
use super::{HEADER_SIZE, PAYLOAD_ALIGNMENT, RPF2_MAGIC, TOC_ENTRY_SIZE, TOC_OFFSET};
use crate::crypto::AesKey;
use crate::error::{Error, Result};
use crate::formats::rsc::ResourceHeader;

/// File queued for writing
struct PendingFile {
    path: String,
    data: Vec<u8>,
    resource_type: Option<u8>,
}

enum Node {
    Dir(BTreeMap<String, Node>),
    File(usize),
}

enum FlatKind {
    Dir { first: u32, count: u32 },
    File(usize),
}

struct FlatEntry {
    name: String,
    kind: FlatKind,
}

/// RPF2 archive writer
#[derive(Default)]
pub struct RpfWriter {
    files: Vec<PendingFile>,
    compress: bool,
    key: Option<AesKey>,
}

impl RpfWriter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue every file under `root`, keeping relative paths.
    ///
    /// Files that start with an RSC header are stored with the resource
    /// layout.
    pub fn from_directory(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let mut writer = Self::new();

        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(root)
                .map_err(|_| Error::InvalidPath(entry.path().display().to_string()))?;
            let data = fs::read(entry.path())?;
            let path = relative.to_string_lossy().replace('\\', "/");

            match ResourceHeader::parse(&data) {
                Some(header) => writer.add_resource(path, data, header.resource_type as u8),
                None => writer.add_file(path, data),
            };
        }

        Ok(writer)
    }

    /// Raw-deflate plain payloads when it makes them smaller
    #[must_use]
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Encrypt the TOC with `key` and set the header's encrypted flag
    #[must_use]
    pub fn with_encryption(mut self, key: AesKey) -> Self {
        self.key = Some(key);
        self
    }

    pub fn add_file(&mut self, path: impl Into<String>, data: Vec<u8>) -> &mut Self {
        self.files.push(PendingFile {
            path: path.into(),
            data,
            resource_type: None,
        });
        self
    }

    /// Queue a payload stored with the resource layout (never compressed).
    pub fn add_resource(&mut self, path: impl Into<String>, data: Vec<u8>, resource_type: u8) -> &mut Self {
        self.files.push(PendingFile {
            path: path.into(),
            data,
            resource_type: Some(resource_type),
        });
        self
    }

    #[must_use]
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Write the archive to disk, creating parent directories.
    pub fn write(&self, output_path: impl AsRef<Path>) -> Result<()> {
        let output_path = output_path.as_ref();
        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(output_path, self.to_bytes()?)?;
        Ok(())
    }

    /// Serialize the archive.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let tree = self.build_tree()?;
        let flat = flatten(&tree);

        // Name table
        let mut names = Vec::new();
        let mut name_offsets = Vec::with_capacity(flat.len());
        for entry in &flat {
            name_offsets.push(names.len() as i32);
            names.extend_from_slice(entry.name.as_bytes());
            names.push(0);
        }

        let toc_size = align(flat.len() * TOC_ENTRY_SIZE + names.len(), 16);
        let data_start = align(TOC_OFFSET as usize + toc_size, PAYLOAD_ALIGNMENT);

        // Stored payloads and their offsets
        let mut stored: Vec<Option<(Vec<u8>, bool)>> = (0..self.files.len()).map(|_| None).collect();
        let mut offsets = vec![0usize; self.files.len()];
        let mut cursor = data_start;
        for entry in &flat {
            if let FlatKind::File(i) = entry.kind {
                let (bytes, compressed) = self.stored_bytes(&self.files[i])?;
                offsets[i] = cursor;
                cursor += align(bytes.len(), PAYLOAD_ALIGNMENT);
                stored[i] = Some((bytes, compressed));
            }
        }
        if cursor > 0x7FFF_FFFF {
            return Err(Error::ArchiveTooLarge { size: cursor as u64 });
        }

        // TOC
        let mut toc = Vec::with_capacity(toc_size);
        for (entry, &name_offset) in flat.iter().zip(&name_offsets) {
            toc.write_i32::<LittleEndian>(name_offset)?;
            match entry.kind {
                FlatKind::Dir { first, count } => {
                    toc.write_i32::<LittleEndian>(count as i32)?;
                    toc.write_i32::<LittleEndian>((0x8000_0000 | first) as i32)?;
                    toc.write_u32::<LittleEndian>(count)?;
                }
                FlatKind::File(i) => {
                    let file = &self.files[i];
                    let (bytes, compressed) = stored[i].as_ref().map_or((&[][..], false), |(b, c)| (b.as_slice(), *c));
                    let size = u32::try_from(file.data.len())
                        .map_err(|_| Error::ArchiveTooLarge { size: file.data.len() as u64 })?;
                    toc.write_i32::<LittleEndian>(size as i32)?;
                    match file.resource_type {
                        Some(kind) => {
                            toc.write_i32::<LittleEndian>((offsets[i] as u32 | u32::from(kind)) as i32)?;
                            toc.write_u32::<LittleEndian>(0xC000_0000)?;
                        }
                        None => {
                            toc.write_i32::<LittleEndian>(offsets[i] as i32)?;
                            let field3 = if compressed { bytes.len() as u32 | 0x4000_0000 } else { 0 };
                            toc.write_u32::<LittleEndian>(field3)?;
                        }
                    }
                }
            }
        }
        toc.extend_from_slice(&names);
        toc.resize(toc_size, 0);

        if let Some(key) = &self.key {
            key.encrypt_in_place(&mut toc);
        }

        // Assemble
        let mut out = Vec::with_capacity(cursor);
        out.write_u32::<LittleEndian>(RPF2_MAGIC)?;
        out.write_u32::<LittleEndian>(toc_size as u32)?;
        out.write_u32::<LittleEndian>(flat.len() as u32)?;
        out.write_u32::<LittleEndian>(0)?;
        out.write_u32::<LittleEndian>(u32::from(self.key.is_some()))?;
        debug_assert_eq!(out.len(), HEADER_SIZE);
        out.resize(TOC_OFFSET as usize, 0);
        out.extend_from_slice(&toc);
        out.resize(data_start, 0);

        for entry in &flat {
            let FlatKind::File(i) = entry.kind else {
                continue;
            };
            if let Some((bytes, _)) = &stored[i] {
                out.resize(offsets[i], 0);
                out.extend_from_slice(bytes);
            }
        }
        out.resize(cursor, 0);

        tracing::debug!("Wrote RPF2 archive: {} entries, {} bytes", flat.len(), out.len());
        Ok(out)
    }

    fn stored_bytes(&self, file: &PendingFile) -> Result<(Vec<u8>, bool)> {
        if self.compress && file.resource_type.is_none() && !file.data.is_empty() {
            let packed = deflate_raw(&file.data)?;
            if packed.len() < file.data.len() {
                return Ok((packed, true));
            }
        }
        Ok((file.data.clone(), false))
    }

    fn build_tree(&self) -> Result<BTreeMap<String, Node>> {
        let mut root = BTreeMap::new();

        for (i, file) in self.files.iter().enumerate() {
            let normalized = file.path.replace('\\', "/");
            let parts: Vec<&str> = normalized.split('/').filter(|p| !p.is_empty()).collect();
            let Some((file_name, dirs)) = parts.split_last() else {
                return Err(Error::InvalidPath(file.path.clone()));
            };

            let mut current = &mut root;
            for dir in dirs {
                let node = current
                    .entry((*dir).to_string())
                    .or_insert_with(|| Node::Dir(BTreeMap::new()));
                current = match node {
                    Node::Dir(children) => children,
                    Node::File(_) => return Err(Error::InvalidPath(file.path.clone())),
                };
            }
            if current.insert((*file_name).to_string(), Node::File(i)).is_some() {
                return Err(Error::InvalidPath(file.path.clone()));
            }
        }

        Ok(root)
    }
}

/// Breadth-first flattening; entry 0 is the unnamed root.
fn flatten(root: &BTreeMap<String, Node>) -> Vec<FlatEntry> {
    let mut flat = vec![FlatEntry {
        name: String::new(),
        kind: FlatKind::Dir { first: 0, count: 0 },
    }];
    let mut queue = VecDeque::from([(0usize, root)]);

    while let Some((idx, children)) = queue.pop_front() {
        let first = flat.len() as u32;
        flat[idx].kind = FlatKind::Dir {
            first,
            count: children.len() as u32,
        };
        for (name, node) in children {
            flat.push(FlatEntry {
                name: name.clone(),
                kind: match node {
                    Node::Dir(_) => FlatKind::Dir { first: 0, count: 0 },
                    Node::File(i) => FlatKind::File(*i),
                },
            });
            if let Node::Dir(grandchildren) = node {
                queue.push_back((flat.len() - 1, grandchildren));
            }
        }
    }

    flat
}

fn align(value: usize, alignment: usize) -> usize {
    value.div_ceil(alignment) * alignment
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpf::{RpfEntryKind, RpfReader};
    use std::io::Cursor;

    #[test]
    fn test_round_trip_tree() {
        let mut writer = RpfWriter::new();
        writer
            .add_file("common/data/default.dat", b"data".to_vec())
            .add_file("common/text/american.gxt", b"text".to_vec())
            .add_file("readme.txt", b"hi".to_vec());

        let bytes = writer.to_bytes().unwrap();
        let mut reader = RpfReader::new(Cursor::new(bytes));
        let header = reader.read_header().unwrap();
        assert!(!header.encrypted);

        let entries = reader.read_entries().unwrap();
        let mut paths: Vec<_> = entries
            .iter()
            .filter(|e| !e.is_directory())
            .map(|e| e.full_path.as_str())
            .collect();
        paths.sort_unstable();
        assert_eq!(paths, ["common/data/default.dat", "common/text/american.gxt", "readme.txt"]);

        // Children always follow their parent
        for (i, entry) in entries.iter().enumerate() {
            if let RpfEntryKind::Directory { first_child, child_count } = entry.kind {
                assert!(child_count == 0 || first_child as usize > i);
            }
        }
    }

    #[test]
    fn test_payloads_aligned() {
        let mut writer = RpfWriter::new();
        writer.add_file("a", vec![1; 10]).add_file("b", vec![2; 3000]);
        let bytes = writer.to_bytes().unwrap();
        let mut reader = RpfReader::new(Cursor::new(bytes.clone()));
        for entry in reader.read_entries().unwrap() {
            if let Some(info) = entry.file_info() {
                assert_eq!(info.offset % PAYLOAD_ALIGNMENT as u64, 0);
            }
        }
        assert_eq!(bytes.len() % PAYLOAD_ALIGNMENT, 0);
    }

    #[test]
    fn test_rejects_file_dir_collision() {
        let mut writer = RpfWriter::new();
        writer.add_file("a", vec![1]).add_file("a/b", vec![2]);
        assert!(matches!(writer.to_bytes(), Err(Error::InvalidPath(_))));
    }

    #[test]
    fn test_from_directory_detects_resources() {
        use crate::formats::rsc::{ByteOrder, resource_type};

        let dir = tempfile::tempdir().unwrap();
        let header = ResourceHeader {
            magic: crate::formats::rsc::RSC_MAGIC,
            resource_type: resource_type::PC_TEXTURE,
            flags: 0,
            compress_codec: 0,
            padding: 0,
            byte_order: ByteOrder::Little,
        };
        let mut texture = header.to_bytes().to_vec();
        texture.extend_from_slice(&[0xAB; 64]);
        std::fs::create_dir_all(dir.path().join("textures")).unwrap();
        std::fs::write(dir.path().join("textures/radar.wtd"), &texture).unwrap();
        std::fs::write(dir.path().join("readme.txt"), b"plain").unwrap();

        let writer = RpfWriter::from_directory(dir.path()).unwrap();
        assert_eq!(writer.file_count(), 2);

        let mut reader = RpfReader::new(Cursor::new(writer.to_bytes().unwrap()));
        reader.read_header().unwrap();
        let entries = reader.read_entries().unwrap();
        let info = |path: &str| {
            entries
                .iter()
                .find(|e| e.full_path == path)
                .and_then(|e| e.file_info())
                .copied()
                .unwrap()
        };
        assert!(info("textures/radar.wtd").is_resource());
        assert_eq!(info("textures/radar.wtd").resource_type, 8);
        assert!(!info("readme.txt").is_resource());
    }
}
