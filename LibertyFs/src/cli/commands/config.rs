//! Configuration file commands

use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::config::LibertyConfig;
use crate::crypto::AesKey;

fn target_path(config: Option<&Path>) -> anyhow::Result<PathBuf> {
    match config {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(LibertyConfig::config_path()?),
    }
}

pub fn show(config: Option<&Path>) -> anyhow::Result<()> {
    let path = target_path(config)?;
    let loaded = if path.exists() {
        LibertyConfig::load_from(&path).with_context(|| format!("Failed to load {}", path.display()))?
    } else {
        println!("# {} does not exist, showing defaults", path.display());
        LibertyConfig::default()
    };

    println!("# {}", path.display());
    println!("{}", serde_json::to_string_pretty(&loaded)?);
    if let Some(extracted) = loaded.extracted_root() {
        println!("# effective extracted root: {}", extracted.display());
    }
    Ok(())
}

pub fn init(
    game_root: &Path,
    extracted_root: Option<&Path>,
    config: Option<&Path>,
    force: bool,
) -> anyhow::Result<()> {
    let path = target_path(config)?;
    if path.exists() && !force {
        anyhow::bail!("{} already exists; pass --force to overwrite", path.display());
    }
    if !game_root.is_dir() {
        anyhow::bail!("{} is not a directory", game_root.display());
    }

    let aes_key_path = AesKey::find(game_root).map(|(_, key_path)| key_path);
    let new_config = LibertyConfig {
        game_root: Some(game_root.to_path_buf()),
        extracted_root: extracted_root.map(Path::to_path_buf),
        aes_key_path,
        ..LibertyConfig::default()
    };
    new_config.save_to(&path)?;

    println!("Wrote {}", path.display());
    match &new_config.aes_key_path {
        Some(key) => println!("Found AES key at {}", key.display()),
        None => println!("No AES key found; encrypted archives will not decode"),
    }
    Ok(())
}
