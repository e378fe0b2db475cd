//! Guest path resolution commands

use std::path::Path;

use anyhow::Context;

use super::rpf::format_size;
use crate::cli::progress::{ARCHIVE, DOCUMENT, LINK};
use crate::config::LibertyConfig;
use crate::overlay::ModOverlay;
use crate::resolver::{GameFileSystem, ResolvedFile};
use crate::utils::write_atomic;

fn load_config(config: Option<&Path>, game_root: Option<&Path>) -> anyhow::Result<LibertyConfig> {
    let mut loaded = match config {
        Some(path) => LibertyConfig::load_from(path).with_context(|| format!("Failed to load {}", path.display()))?,
        None => LibertyConfig::load(),
    };
    if let Some(root) = game_root {
        loaded.game_root = Some(root.to_path_buf());
    }
    if loaded.game_root.is_none() && loaded.extracted_root.is_none() {
        anyhow::bail!("No game root configured; pass --game-root or run `libertyfs config init`");
    }
    Ok(loaded)
}

pub fn resolve(
    path: &str,
    config: Option<&Path>,
    game_root: Option<&Path>,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let gfs = GameFileSystem::new(load_config(config, game_root)?);
    gfs.initialize();

    let resolved = gfs.resolve(path).with_context(|| format!("{path} does not resolve"))?;
    match &resolved {
        ResolvedFile::Host(host) => println!("{DOCUMENT}{path} -> {}", host.display()),
        ResolvedFile::Archive { key, container } => {
            println!("{ARCHIVE}{path} -> {} in {}", key.as_str(), container.display());
        }
        ResolvedFile::Image(image) => println!(
            "{LINK}{path} -> {} merged ({} files)",
            image.source.display(),
            image.files.len()
        ),
    }

    if let Some(size) = gfs.file_size(path) {
        println!("Size: {}", format_size(size));
    }

    if let Some(out) = output {
        let data = gfs.read(path).with_context(|| format!("Failed to read {path}"))?;
        write_atomic(out, &data)?;
        println!("Wrote {} bytes to {}", data.len(), out.display());
    }

    gfs.dump_status();
    Ok(())
}

pub fn overlays(game_root: &Path, files: bool) -> anyhow::Result<()> {
    if !game_root.is_dir() {
        anyhow::bail!("{} is not a directory", game_root.display());
    }

    let overlay = ModOverlay::new();
    overlay.initialize(game_root);

    let entries = overlay.overlays();
    if entries.is_empty() {
        println!("No overlays found under {}", game_root.display());
        return Ok(());
    }

    println!("{:>8}  {:>7}  NAME", "PRIORITY", "ENABLED");
    for entry in &entries {
        println!(
            "{:>8}  {:>7}  {} ({})",
            entry.priority,
            if entry.enabled { "yes" } else { "no" },
            entry.name,
            entry.path.display()
        );
    }

    let stats = overlay.stats();
    println!();
    println!("{} override files", stats.total_override_files);

    let folders = overlay.all_img_folders();
    if !folders.is_empty() {
        println!("{} IMG replacement folders", folders.len());
        for (img, folder) in &folders {
            println!("  {} <- {}", img.as_str(), folder.display());
        }
    }

    if files {
        let mut overrides = overlay.all_overrides();
        overrides.sort_by(|a, b| a.key.as_str().cmp(b.key.as_str()));
        for file in &overrides {
            println!("  [{}] {} -> {}", file.priority, file.key.as_str(), file.host_path.display());
        }
    }
    Ok(())
}
