//! Command execution implementations

use super::Commands;
use super::definitions::{ConfigCommands, ImgCommands, RpfCommands, TextureCommands};
use super::{config, img, resolve, rpf, texture};

impl Commands {
    /// Execute the selected command.
    ///
    /// # Errors
    /// Returns an error if the underlying command fails.
    pub fn execute(&self) -> anyhow::Result<()> {
        match self {
            Commands::Rpf { command } => command.execute(),
            Commands::Img { command } => command.execute(),
            Commands::Texture { command } => command.execute(),
            Commands::Resolve {
                path,
                config,
                game_root,
                output,
            } => resolve::resolve(path, config.as_deref(), game_root.as_deref(), output.as_deref()),
            Commands::Overlays { game_root, files } => resolve::overlays(game_root, *files),
            Commands::Config { command } => command.execute(),
        }
    }
}

impl RpfCommands {
    /// Execute the selected RPF command.
    ///
    /// # Errors
    /// Returns an error if the archive cannot be read or written.
    pub fn execute(&self) -> anyhow::Result<()> {
        match self {
            RpfCommands::List {
                source,
                detailed,
                filter,
                count,
                key,
            } => rpf::list(source, *detailed, filter.as_deref(), *count, key.as_deref()),
            RpfCommands::Extract {
                source,
                destination,
                threads,
                memory_mb,
                key,
                decrypt_payloads,
                quiet,
            } => rpf::extract(
                source,
                destination,
                &rpf::ExtractArgs {
                    threads: *threads,
                    memory_mb: *memory_mb,
                    key: key.clone(),
                    decrypt_payloads: *decrypt_payloads,
                    quiet: *quiet,
                },
            ),
            RpfCommands::Cat {
                source,
                path,
                output,
                key,
            } => rpf::cat(source, path, output.as_deref(), key.as_deref()),
            RpfCommands::Pack {
                source,
                destination,
                compress,
                key,
            } => rpf::pack(source, destination, *compress, key.as_deref()),
            RpfCommands::Info { source, key } => rpf::info(source, key.as_deref()),
        }
    }
}

impl ImgCommands {
    /// Execute the selected IMG command.
    ///
    /// # Errors
    /// Returns an error if the archive cannot be read or written.
    pub fn execute(&self) -> anyhow::Result<()> {
        match self {
            ImgCommands::List { source, key } => img::list(source, key.as_deref()),
            ImgCommands::Merge {
                source,
                folder,
                destination,
                key,
            } => img::merge(source, folder, destination, key.as_deref()),
        }
    }
}

impl TextureCommands {
    /// Execute the selected texture command.
    ///
    /// # Errors
    /// Returns an error if a texture cannot be read or converted.
    pub fn execute(&self) -> anyhow::Result<()> {
        match self {
            TextureCommands::Detect { source } => texture::detect(source),
            TextureCommands::Convert {
                source,
                destination,
                target,
            } => texture::convert(source, destination.as_deref(), (*target).into()),
        }
    }
}

impl ConfigCommands {
    /// Execute the selected config command.
    ///
    /// # Errors
    /// Returns an error if the config file cannot be read or written.
    pub fn execute(&self) -> anyhow::Result<()> {
        match self {
            ConfigCommands::Show { config } => config::show(config.as_deref()),
            ConfigCommands::Init {
                game_root,
                extracted_root,
                config,
                force,
            } => config::init(game_root, extracted_root.as_deref(), config.as_deref(), *force),
        }
    }
}
