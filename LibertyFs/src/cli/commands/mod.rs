use clap::Subcommand;
use std::path::PathBuf;

pub mod config;
pub mod definitions;
mod execute;
pub mod img;
pub mod resolve;
pub mod rpf;
pub mod texture;

pub use definitions::{ConfigCommands, ImgCommands, PlatformArg, RpfCommands, TextureCommands};

#[derive(Subcommand)]
pub enum Commands {
    /// RPF2 archive operations
    Rpf {
        #[command(subcommand)]
        command: RpfCommands,
    },

    /// IMG v3 archive operations
    Img {
        #[command(subcommand)]
        command: ImgCommands,
    },

    /// Texture resource operations
    Texture {
        #[command(subcommand)]
        command: TextureCommands,
    },

    /// Resolve a guest path through overlays, extracted files and archives
    Resolve {
        /// Guest path (e.g., "game:\common\data\handling.dat")
        path: String,

        /// Config file (defaults to the user config location)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the configured game root
        #[arg(short, long)]
        game_root: Option<PathBuf>,

        /// Write the resolved contents to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List discovered mod overlays and their files
    Overlays {
        /// Game install directory
        game_root: PathBuf,

        /// Also list every override file
        #[arg(short, long)]
        files: bool,
    },

    /// Configuration file management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}
