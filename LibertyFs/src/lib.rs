//! # LibertyFs
//!
//! Layered virtual filesystem and archive engine for running the Xbox 360
//! build of GTA IV on a PC host.
//!
//! ## Supported Formats
//!
//! - **RPF2** - TOC-based archives with AES-encrypted tables and raw deflate
//! - **IMG v3** - block-indexed archives, merged with replacement folders
//! - **RSC textures** - PC / Xbox 360 header conversion and Morton swizzling
//! - **GXT2** - custom text tables shipped by mods
//!
//! ## Quick Start
//!
//! ### Resolving guest paths
//!
//! ```no_run
//! use libertyfs::prelude::*;
//!
//! let config = LibertyConfig::load();
//! let fs = GameFileSystem::new(config);
//! fs.initialize();
//!
//! if let Some(data) = fs.read("game:\\common\\data\\handling.dat") {
//!     println!("{} bytes", data.len());
//! }
//! ```
//!
//! ### Extracting an archive
//!
//! ```no_run
//! use libertyfs::rpf::{BulkExtractor, BulkOptions};
//!
//! let extractor = BulkExtractor::new(BulkOptions::default());
//! let result = extractor.extract("common.rpf", "extracted/common", None);
//! println!("{} files, {} errors", result.files_extracted, result.errors);
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` - Enables the `libertyfs` command-line binary

pub mod config;
pub mod crypto;
pub mod error;
pub mod formats;
pub mod img;
pub mod overlay;
pub mod resolver;
pub mod rpf;
pub mod texture;
pub mod utils;
pub mod vfs;

// Re-exports for convenience
pub use error::{Error, Result};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::config::{BulkConfig, LibertyConfig, OverlayConfig};
    pub use crate::crypto::AesKey;
    pub use crate::error::{Error, Result};
    pub use crate::formats::{GxtOverrides, ResourceHeader};
    pub use crate::img::{ImgFile, ImgMerger, VirtualImage, create_img, parse_img};
    pub use crate::overlay::{ModOverlay, OverlayEntry, map_fusionfix_path};
    pub use crate::resolver::{GameFileSystem, ResolvedFile};
    pub use crate::rpf::{ArchiveContainer, BulkExtractor, BulkOptions, ExtractionResult, RpfWriter};
    pub use crate::texture::{Platform, convert_to, detect_platform, morton_decode, morton_encode};
    pub use crate::utils::{PathKey, normalize};
    pub use crate::vfs::VirtualFileSystem;
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// CLI module (feature-gated)
#[cfg(feature = "cli")]
pub mod cli;
