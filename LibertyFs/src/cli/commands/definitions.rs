//! Subcommand definitions

use std::path::PathBuf;

use clap::{Subcommand, ValueEnum};

use crate::texture::Platform;

/// Target platform for texture conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PlatformArg {
    Pc,
    #[value(alias = "xbox", alias = "x360")]
    Xbox360,
}

impl From<PlatformArg> for Platform {
    fn from(arg: PlatformArg) -> Self {
        match arg {
            PlatformArg::Pc => Platform::Pc,
            PlatformArg::Xbox360 => Platform::Xbox360,
        }
    }
}

#[derive(Subcommand)]
pub enum RpfCommands {
    /// List files in an RPF archive
    List {
        /// RPF archive
        source: PathBuf,

        /// Show sizes and compression
        #[arg(short, long)]
        detailed: bool,

        /// Only list files matching glob pattern (e.g., "*.xtd")
        #[arg(short = 'f', long)]
        filter: Option<String>,

        /// Only show count of matching files
        #[arg(short, long)]
        count: bool,

        /// 32-byte AES key file for encrypted archives
        #[arg(short, long)]
        key: Option<PathBuf>,
    },

    /// Extract a whole archive in parallel
    Extract {
        /// RPF archive
        source: PathBuf,

        /// Output directory
        destination: PathBuf,

        /// Worker threads (0 = all cores)
        #[arg(short = 'j', long, default_value_t = 0)]
        threads: usize,

        /// Memory budget in MiB (0 = unbounded)
        #[arg(short = 'm', long, default_value_t = 512)]
        memory_mb: u64,

        /// 32-byte AES key file for encrypted archives
        #[arg(short, long)]
        key: Option<PathBuf>,

        /// Also decrypt payloads of encrypted archives
        #[arg(long)]
        decrypt_payloads: bool,

        /// Suppress progress bar
        #[arg(short, long)]
        quiet: bool,
    },

    /// Print or save a single file from an archive
    Cat {
        /// RPF archive
        source: PathBuf,

        /// Path inside the archive
        path: String,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 32-byte AES key file for encrypted archives
        #[arg(short, long)]
        key: Option<PathBuf>,
    },

    /// Build an archive from a directory
    Pack {
        /// Source directory
        source: PathBuf,

        /// Output RPF file
        destination: PathBuf,

        /// Raw-deflate payloads that shrink
        #[arg(short, long)]
        compress: bool,

        /// Encrypt the TOC with this 32-byte AES key file
        #[arg(short, long)]
        key: Option<PathBuf>,
    },

    /// Show header and aggregate information
    Info {
        /// RPF archive
        source: PathBuf,

        /// 32-byte AES key file for encrypted archives
        #[arg(short, long)]
        key: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum ImgCommands {
    /// List entries in an IMG archive
    List {
        /// IMG archive
        source: PathBuf,

        /// 32-byte AES key file for encrypted tables
        #[arg(short, long)]
        key: Option<PathBuf>,
    },

    /// Merge an archive with a replacement folder
    Merge {
        /// IMG archive
        source: PathBuf,

        /// Folder of replacement files
        folder: PathBuf,

        /// Output IMG file
        destination: PathBuf,

        /// 32-byte AES key file for encrypted tables
        #[arg(short, long)]
        key: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum TextureCommands {
    /// Report the platform of a texture resource
    Detect {
        /// Texture file(s)
        #[arg(required = true)]
        source: Vec<PathBuf>,
    },

    /// Convert a texture resource between platforms
    Convert {
        /// Source texture
        source: PathBuf,

        /// Output file (defaults to the counterpart extension)
        destination: Option<PathBuf>,

        /// Target platform
        #[arg(short, long, value_enum, default_value = "xbox360")]
        target: PlatformArg,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the active configuration
    Show {
        /// Config file (defaults to the user config location)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Write a new configuration file
    Init {
        /// Game install directory
        game_root: PathBuf,

        /// Extracted asset directory (defaults to <game_root>/extracted)
        #[arg(short, long)]
        extracted_root: Option<PathBuf>,

        /// Config file (defaults to the user config location)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
