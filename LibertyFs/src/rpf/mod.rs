//! RPF2 archive support
//!
//! The container format shipped on the console disc: a 20-byte header, an
//! (optionally AES encrypted) table of contents at 0x800, then payloads that
//! are stored raw, raw-deflated, or wrapped in an RSC resource header.

mod budget;
mod container;
pub mod decompression;
mod extractor;
mod reader;
mod types;
mod writer;

pub use budget::{BudgetToken, MemoryBudget};
pub use container::ArchiveContainer;
pub use extractor::{
    BulkExtractor, BulkOptions, ExtractionResult, has_encrypted_files, is_rpf_file, read_header,
};
pub use reader::{RpfReader, build_index, parse_header, parse_toc};
pub use types::*;
pub use writer::RpfWriter;

/// `RPF2` read as a little-endian u32
pub const RPF2_MAGIC: u32 = 0x3246_5052;

/// Byte offset of the table of contents
pub const TOC_OFFSET: u64 = 0x800;

/// Size of the fixed header
pub const HEADER_SIZE: usize = 20;

/// Size of one TOC entry
pub const TOC_ENTRY_SIZE: usize = 16;

/// Alignment of payloads written by [`RpfWriter`]
pub const PAYLOAD_ALIGNMENT: usize = 0x800;

/// Progress callback type for bulk extraction
pub type ProgressCallback<'a> = &'a (dyn Fn(&ExtractProgress) + Sync + Send);
