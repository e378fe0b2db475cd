//! IMG v3 archive writer

use super::types::{HEADER_UNKNOWN, ImgEntry, ImgFile, ImgHeader};
use super::{IMG_BLOCK_SIZE, IMG_ENTRY_SIZE, IMG_HEADER_SIZE, IMG_MAGIC, IMG_VERSION, PADDING_MASK, RESOURCE_FLAG};
use crate::error::{Error, Result};
use crate::formats::rsc::ResourceHeader;

/// Slack the original tools leave between the name table and the first block
const TOC_SLACK: usize = 32;

fn align_to_blocks(size: usize) -> usize {
    size.div_ceil(IMG_BLOCK_SIZE) * IMG_BLOCK_SIZE
}

/// Serialize `files` into a v3 archive, in order.
///
/// Entries whose payload starts with an RSC header are written as
/// resources, taking their flags and type from that header.
///
/// # Errors
/// [`Error::ImgEntryTooLarge`] if a payload needs more than `0xFFFF` blocks.
pub fn create_img(files: &[ImgFile]) -> Result<Vec<u8>> {
    let names_size: usize = files.iter().map(|f| f.name.len() + 1).sum();
    let table_size = files.len() * IMG_ENTRY_SIZE + names_size;
    let toc_size = align_to_blocks(IMG_HEADER_SIZE + table_size + TOC_SLACK);

    let mut entries = Vec::with_capacity(files.len());
    let mut position = toc_size / IMG_BLOCK_SIZE;
    for file in files {
        let aligned = align_to_blocks(file.data.len());
        let used_blocks = u16::try_from(aligned / IMG_BLOCK_SIZE).map_err(|_| Error::ImgEntryTooLarge {
            name: file.name.clone(),
            size: file.data.len(),
        })?;
        let offset_block = u32::try_from(position).map_err(|_| Error::ImgEntryTooLarge {
            name: file.name.clone(),
            size: file.data.len(),
        })?;

        let entry = match ResourceHeader::parse(&file.data) {
            Some(rsc) => {
                let padding = (aligned - file.data.len()) as u16;
                ImgEntry {
                    size_or_flags: rsc.flags,
                    resource_type: rsc.resource_type,
                    offset_block,
                    used_blocks,
                    flags: (padding & PADDING_MASK) | RESOURCE_FLAG,
                }
            }
            None => ImgEntry {
                size_or_flags: file.data.len() as u32,
                resource_type: 0,
                offset_block,
                used_blocks,
                flags: 0,
            },
        };
        entries.push(entry);
        position += aligned / IMG_BLOCK_SIZE;
    }

    let total = position * IMG_BLOCK_SIZE;
    let mut out = Vec::with_capacity(total);

    let header = ImgHeader {
        magic: IMG_MAGIC,
        version: IMG_VERSION,
        num_items: files.len() as u32,
        table_size: table_size as u32,
        item_size: IMG_ENTRY_SIZE as u16,
        unknown: HEADER_UNKNOWN,
    };
    out.extend_from_slice(&header.to_bytes());
    for entry in &entries {
        out.extend_from_slice(&entry.to_bytes());
    }
    for file in files {
        out.extend_from_slice(file.name.as_bytes());
        out.push(0);
    }

    for (file, entry) in files.iter().zip(&entries) {
        out.resize(entry.offset_block as usize * IMG_BLOCK_SIZE, 0);
        out.extend_from_slice(&file.data);
    }
    out.resize(total, 0);

    tracing::debug!("Created IMG: {} entries, {} bytes", files.len(), out.len());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::rsc::{RSC_MAGIC, resource_type};
    use crate::img::ImgReader;
    use std::io::Cursor;

    fn resource(len: usize) -> Vec<u8> {
        let mut data = vec![0xABu8; len];
        data[0..4].copy_from_slice(&RSC_MAGIC.to_le_bytes());
        data[4..8].copy_from_slice(&resource_type::TEXTURE_ARCHIVE.to_le_bytes());
        data[8..12].copy_from_slice(&0x8000_0123u32.to_le_bytes());
        data[12..16].fill(0);
        data
    }

    #[test]
    fn test_layout() {
        let files = vec![ImgFile::new("a.dat", vec![1u8; 10]), ImgFile::new("b.dat", vec![2u8; 2049])];
        let image = create_img(&files).unwrap();

        let header = ImgHeader::parse(&image).unwrap();
        assert_eq!(header.num_items, 2);
        assert_eq!(header.table_size, 2 * 16 + 6 + 6);
        assert_eq!(header.unknown, 0x00E9);
        // TOC padded to one block, a.dat one block, b.dat two blocks
        assert_eq!(image.len(), 4 * IMG_BLOCK_SIZE);
        assert_eq!(&image[IMG_BLOCK_SIZE..IMG_BLOCK_SIZE + 10], &[1u8; 10]);
        assert_eq!(image[2 * IMG_BLOCK_SIZE], 2);
    }

    #[test]
    fn test_resource_entry_encoding() {
        let data = resource(3000);
        let image = create_img(&[ImgFile::new("car.wtd", data.clone())]).unwrap();

        let mut reader = ImgReader::new(Cursor::new(image));
        let toc = reader.read_toc().unwrap();
        let entry = toc.entries[0].entry;
        assert_eq!(entry.size_or_flags, 0x8000_0123);
        assert_eq!(entry.resource_type, resource_type::TEXTURE_ARCHIVE);
        assert_eq!(entry.used_blocks, 2);
        assert_eq!(entry.flags, (4096 - 3000) as u16 | RESOURCE_FLAG);
        assert_eq!(reader.read_file(&toc.entries[0]).unwrap(), data);
    }

    #[test]
    fn test_empty_list() {
        let image = create_img(&[]).unwrap();
        assert_eq!(image.len(), IMG_BLOCK_SIZE);
        assert!(crate::img::parse_img(&image).unwrap().is_empty());
    }
}
