//! IMG v3 archive support
//!
//! Block-indexed containers holding models, textures and collision data.
//! Replacement folders named after an archive (`vehicles.img/`) are merged
//! over the original and served as an in-memory [`VirtualImage`].

mod merger;
mod reader;
mod types;
mod writer;

pub use merger::{ImgMerger, find_update_folder, get_replacement_files};
pub use reader::{ImgReader, is_encrypted, parse_img};
pub use types::*;
pub use writer::create_img;

/// Payload alignment and unit of `offset_block` / `used_blocks`
pub const IMG_BLOCK_SIZE: usize = 2048;

/// Header magic
pub const IMG_MAGIC: u32 = 0xA94E_2A52;

/// Only supported version
pub const IMG_VERSION: u32 = 3;

/// Size of [`ImgHeader`] on disk
pub const IMG_HEADER_SIZE: usize = 20;

/// Size of one [`ImgEntry`] on disk
pub const IMG_ENTRY_SIZE: usize = 16;

/// Largest payload an entry can describe (`u16` block count)
pub const MAX_FILE_SIZE: usize = 0xFFFF * IMG_BLOCK_SIZE;

/// Bytes decrypted from the start of an encrypted archive
pub const ENCRYPTED_TABLE_SPAN: usize = 0x10000;

/// Flag-word bit marking a resource entry
pub const RESOURCE_FLAG: u16 = 0x2000;

/// Low flag-word bits holding the resource padding count
pub const PADDING_MASK: u16 = 0x7FF;
