//! IMG archive commands

use std::path::Path;
use std::time::Instant;

use anyhow::Context;

use super::rpf::{format_size, load_key};
use crate::cli::progress::{ARCHIVE, DISK, LOOKING_GLASS, print_done, print_step};
use crate::img::{ImgMerger, ImgReader};
use crate::utils::write_atomic;

pub fn list(source: &Path, key: Option<&Path>) -> anyhow::Result<()> {
    let mut reader = ImgReader::open(source, load_key(key)?)
        .with_context(|| format!("Failed to open {}", source.display()))?;
    let toc = reader.read_toc()?;

    println!("{:>8}  {:>10}  {:>6}  NAME", "BLOCK", "SIZE", "TYPE");
    let mut total = 0u64;
    for item in &toc.entries {
        let kind = if item.entry.is_resource() {
            format!("r{}", item.entry.resource_type)
        } else {
            "-".to_string()
        };
        total += item.entry.actual_size();
        println!(
            "{:>8}  {:>10}  {:>6}  {}",
            item.entry.offset_block,
            format_size(item.entry.actual_size()),
            kind,
            item.name
        );
    }

    println!();
    println!(
        "{} entries, {} total{}",
        toc.entries.len(),
        format_size(total),
        if toc.encrypted { " (encrypted table)" } else { "" }
    );
    Ok(())
}

pub fn merge(source: &Path, folder: &Path, destination: &Path, key: Option<&Path>) -> anyhow::Result<()> {
    let start = Instant::now();
    let merger = ImgMerger::new();
    merger.initialize();
    if let Some(key) = load_key(key)? {
        merger.set_aes_key(key);
    }

    print_step(1, 3, LOOKING_GLASS, &format!("Reading {}...", source.display()));
    print_step(2, 3, ARCHIVE, &format!("Merging {}...", folder.display()));
    let image = merger
        .merge_img_with_folder(source, folder)
        .with_context(|| format!("Nothing to merge from {} into {}", folder.display(), source.display()))?;

    let stats = merger.stats();
    print_step(3, 3, DISK, &format!("Writing {}...", destination.display()));
    write_atomic(destination, &image.data)?;

    println!(
        "{} files ({} replaced, {} added), {}",
        image.files.len(),
        stats.files_replaced,
        stats.files_added,
        format_size(image.len() as u64)
    );
    print_done(start.elapsed());
    Ok(())
}
