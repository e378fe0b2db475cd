//! IMG v3 archive reader
//!
//! Archives whose first word is not the IMG magic are treated as
//! encrypted: the first 64 KiB are decrypted with the archive key and the
//! table is parsed from the decrypted copy. Payloads are never encrypted.

use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use super::types::{ImgEntry, ImgFile, ImgHeader, ImgToc, ImgTocEntry};
use super::{ENCRYPTED_TABLE_SPAN, IMG_ENTRY_SIZE, IMG_HEADER_SIZE, IMG_MAGIC};
use crate::crypto::AesKey;
use crate::error::{Error, Result};

/// IMG v3 reader
pub struct ImgReader<R: Read + Seek> {
    reader: BufReader<R>,
    key: Option<AesKey>,
}

impl ImgReader<File> {
    /// Open an archive on disk.
    pub fn open(path: impl AsRef<Path>, key: Option<AesKey>) -> Result<Self> {
        Ok(Self::with_key(File::open(path)?, key))
    }
}

impl<R: Read + Seek> ImgReader<R> {
    pub fn new(reader: R) -> Self {
        Self::with_key(reader, None)
    }

    /// Reader that can decrypt encrypted tables with `key`
    pub fn with_key(reader: R, key: Option<AesKey>) -> Self {
        Self {
            reader: BufReader::new(reader),
            key,
        }
    }

    fn stream_len(&mut self) -> Result<u64> {
        Ok(self.reader.seek(SeekFrom::End(0))?)
    }

    fn read_prefix(&mut self, len: usize) -> Result<Vec<u8>> {
        self.reader.seek(SeekFrom::Start(0))?;
        let mut buf = Vec::with_capacity(len);
        (&mut self.reader).take(len as u64).read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Read and decode the header, entry table and name table.
    ///
    /// # Errors
    /// [`Error::InvalidImgHeader`] if the archive is not v3 (after
    /// decryption, when a key is set), [`Error::ImgTableTruncated`] if the
    /// table runs past the end of the data.
    pub fn read_toc(&mut self) -> Result<ImgToc> {
        let file_len = self.stream_len()?;
        let head = self.read_prefix(IMG_HEADER_SIZE)?;
        let header = ImgHeader::parse(&head).ok_or(Error::ImgTableTruncated {
            required: IMG_HEADER_SIZE,
            available: head.len(),
        })?;

        if header.magic == IMG_MAGIC {
            if !header.is_valid() {
                return Err(Error::InvalidImgHeader {
                    magic: header.magic,
                    version: header.version,
                });
            }
            let table_end = IMG_HEADER_SIZE + header.table_size as usize;
            if table_end as u64 > file_len {
                return Err(Error::ImgTableTruncated {
                    required: table_end,
                    available: file_len as usize,
                });
            }
            let buf = self.read_prefix(table_end)?;
            let entries = parse_table(&buf, &header, header.table_size as usize)?;
            return Ok(ImgToc {
                header,
                entries,
                encrypted: false,
            });
        }

        let Some(key) = self.key.clone() else {
            tracing::debug!("IMG magic mismatch ({:#010X}) and no AES key set", header.magic);
            return Err(Error::InvalidImgHeader {
                magic: header.magic,
                version: header.version,
            });
        };

        let span = (file_len as usize).min(ENCRYPTED_TABLE_SPAN);
        let mut buf = self.read_prefix(span)?;
        key.decrypt_in_place(&mut buf);

        let header = ImgHeader::parse(&buf).ok_or(Error::ImgTableTruncated {
            required: IMG_HEADER_SIZE,
            available: buf.len(),
        })?;
        if !header.is_valid() {
            return Err(Error::InvalidImgHeader {
                magic: header.magic,
                version: header.version,
            });
        }

        let table_len = buf.len() - IMG_HEADER_SIZE;
        let entries = parse_table(&buf, &header, table_len)?;
        tracing::debug!("Decrypted IMG table: {} entries", entries.len());
        Ok(ImgToc {
            header,
            entries,
            encrypted: true,
        })
    }

    /// Read one entry's payload.
    pub fn read_file(&mut self, entry: &ImgTocEntry) -> Result<Vec<u8>> {
        let offset = entry.entry.data_offset();
        let length = entry.entry.actual_size();
        if offset.saturating_add(length) > self.stream_len()? {
            return Err(Error::EntryOutOfBounds {
                path: entry.name.clone(),
                offset,
                length,
            });
        }

        self.reader.seek(SeekFrom::Start(offset))?;
        let mut data = vec![0u8; length as usize];
        self.reader.read_exact(&mut data)?;
        Ok(data)
    }

    /// Read every entry. Entries whose payload lies outside the archive are
    /// skipped.
    pub fn read_all(&mut self) -> Result<Vec<ImgFile>> {
        let toc = self.read_toc()?;
        let mut files = Vec::with_capacity(toc.entries.len());

        for entry in &toc.entries {
            match self.read_file(entry) {
                Ok(data) => files.push(ImgFile {
                    name: entry.name.clone(),
                    data,
                    resource_type: entry.entry.resource_type,
                    is_replacement: false,
                }),
                Err(e) => tracing::warn!("Skipping IMG entry {}: {e}", entry.name),
            }
        }

        Ok(files)
    }
}

/// Parse entries and names from a buffer that starts at the header.
///
/// `table_len` bounds the table region following the header.
fn parse_table(buf: &[u8], header: &ImgHeader, table_len: usize) -> Result<Vec<ImgTocEntry>> {
    let count = header.num_items as usize;
    let entries_end = count
        .checked_mul(IMG_ENTRY_SIZE)
        .and_then(|n| n.checked_add(IMG_HEADER_SIZE))
        .unwrap_or(usize::MAX);
    let table_end = (IMG_HEADER_SIZE + table_len).min(buf.len());
    if entries_end > table_end {
        return Err(Error::ImgTableTruncated {
            required: entries_end,
            available: table_end,
        });
    }

    let names = read_names(&buf[entries_end..table_end], count);
    let entries = buf[IMG_HEADER_SIZE..entries_end]
        .chunks_exact(IMG_ENTRY_SIZE)
        .zip(names)
        .map(|(raw, name)| {
            let mut bytes = [0u8; IMG_ENTRY_SIZE];
            bytes.copy_from_slice(raw);
            ImgTocEntry {
                name,
                entry: ImgEntry::parse(&bytes),
            }
        })
        .collect();

    Ok(entries)
}

/// Up to `count` NUL-terminated names; stops early if the table runs out.
fn read_names(table: &[u8], count: usize) -> Vec<String> {
    let mut names = Vec::with_capacity(count);
    let mut offset = 0;
    while names.len() < count && offset < table.len() {
        let rest = &table[offset..];
        let len = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
        names.push(String::from_utf8_lossy(&rest[..len]).into_owned());
        offset += len + 1;
    }
    names
}

/// Decode an archive held in memory.
pub fn parse_img(data: &[u8]) -> Result<Vec<ImgFile>> {
    ImgReader::new(Cursor::new(data)).read_all()
}

/// Whether the file exists and does not start with the IMG magic.
pub fn is_encrypted(path: impl AsRef<Path>) -> bool {
    let Ok(mut file) = File::open(path) else {
        return false;
    };
    let mut magic = [0u8; 4];
    file.read_exact(&mut magic).is_ok() && u32::from_le_bytes(magic) != IMG_MAGIC
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::img::create_img;

    fn sample() -> Vec<ImgFile> {
        vec![
            ImgFile::new("Model.wdr", vec![1u8; 3000]),
            ImgFile::new("empty.dat", Vec::new()),
            ImgFile::new("tiny.txt", b"tiny".to_vec()),
        ]
    }

    #[test]
    fn test_reads_created_image() {
        let image = create_img(&sample()).unwrap();
        let files = parse_img(&image).unwrap();
        let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["Model.wdr", "empty.dat", "tiny.txt"]);
        assert_eq!(files[0].data, vec![1u8; 3000]);
        assert!(files[1].data.is_empty());
        assert_eq!(files[2].data, b"tiny");
    }

    #[test]
    fn test_read_all_skips_truncated_payload() {
        let mut image = create_img(&sample()).unwrap();
        let payload = image.windows(4).rposition(|w| w == b"tiny").unwrap();
        image.truncate(payload + 2);

        let files = ImgReader::new(Cursor::new(image)).read_all().unwrap();
        let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["Model.wdr", "empty.dat"]);
    }

    #[test]
    fn test_rejects_bad_magic_without_key() {
        let mut image = create_img(&sample()).unwrap();
        image[0] ^= 0xFF;
        assert!(matches!(parse_img(&image), Err(Error::InvalidImgHeader { .. })));
    }

    #[test]
    fn test_truncated_table() {
        let image = create_img(&sample()).unwrap();
        assert!(matches!(
            parse_img(&image[..30]),
            Err(Error::ImgTableTruncated { .. })
        ));
    }

    #[test]
    fn test_encrypted_table() {
        let key = AesKey::from_bytes(&[0x42; 32]).unwrap();
        let mut image = create_img(&sample()).unwrap();
        let span = image.len().min(ENCRYPTED_TABLE_SPAN);
        let data_start = 2048;
        let payload = image[data_start..].to_vec();
        key.encrypt_in_place(&mut image[..span]);
        // Payloads stay plain on disk
        image[data_start..].copy_from_slice(&payload);

        let mut reader = ImgReader::with_key(Cursor::new(image.clone()), Some(key));
        let toc = reader.read_toc().unwrap();
        assert!(toc.encrypted);
        assert_eq!(toc.entries.len(), 3);

        let files = reader.read_all().unwrap();
        assert_eq!(files[2].data, b"tiny");

        assert!(ImgReader::new(Cursor::new(image)).read_toc().is_err());
    }

    #[test]
    fn test_is_encrypted() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("plain.img");
        std::fs::write(&plain, create_img(&sample()).unwrap()).unwrap();
        let other = dir.path().join("other.img");
        std::fs::write(&other, [0u8; 32]).unwrap();

        assert!(!is_encrypted(&plain));
        assert!(is_encrypted(&other));
        assert!(!is_encrypted(dir.path().join("missing.img")));
    }
}
