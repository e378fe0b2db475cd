//! RPF archive commands

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use anyhow::Context;

use crate::cli::progress::{ARCHIVE, DISK, LOOKING_GLASS, print_done, print_step, simple_bar};
use crate::crypto::AesKey;
use crate::rpf::{ArchiveContainer, BulkExtractor, BulkOptions, ExtractPhase, ExtractProgress, RpfArchive, RpfWriter};

/// Options for a whole-archive extraction
pub struct ExtractArgs {
    pub threads: usize,
    pub memory_mb: u64,
    pub key: Option<PathBuf>,
    pub decrypt_payloads: bool,
    pub quiet: bool,
}

/// Case-insensitive glob with `*` and `?`.
pub(super) fn matches_glob(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    glob_at(&pattern, &text)
}

fn glob_at(pattern: &[char], text: &[char]) -> bool {
    match pattern.split_first() {
        None => text.is_empty(),
        Some(('*', rest)) => (0..=text.len()).any(|skip| glob_at(rest, &text[skip..])),
        Some(('?', rest)) => !text.is_empty() && glob_at(rest, &text[1..]),
        Some((c, rest)) => text
            .split_first()
            .is_some_and(|(t, tail)| t.eq_ignore_ascii_case(c) && glob_at(rest, tail)),
    }
}

/// Match against either the file name or the whole path.
fn matches_entry(pattern: &str, path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path);
    matches_glob(pattern, name) || matches_glob(pattern, path)
}

pub(super) fn format_size(bytes: u64) -> String {
    if bytes >= 1_048_576 {
        format!("{:.1}M", bytes as f64 / 1_048_576.0)
    } else if bytes >= 1024 {
        format!("{:.1}K", bytes as f64 / 1024.0)
    } else {
        format!("{bytes}")
    }
}

pub(super) fn load_key(path: Option<&Path>) -> anyhow::Result<Option<AesKey>> {
    path.map(|p| AesKey::from_file(p).with_context(|| format!("Failed to load key {}", p.display())))
        .transpose()
}

fn open_archive(source: &Path, key: Option<&Path>) -> anyhow::Result<RpfArchive> {
    let key = load_key(key)?;
    RpfArchive::open(source, key).with_context(|| format!("Failed to open {}", source.display()))
}

pub fn list(
    source: &Path,
    detailed: bool,
    filter: Option<&str>,
    count: bool,
    key: Option<&Path>,
) -> anyhow::Result<()> {
    let archive = open_archive(source, key)?;

    let entries: Vec<_> = archive
        .files()
        .filter(|e| !e.full_path.is_empty())
        .filter(|e| filter.is_none_or(|p| matches_entry(p, &e.full_path)))
        .collect();

    if count {
        println!("{}", entries.len());
        return Ok(());
    }

    if !detailed {
        for entry in &entries {
            println!("{}", entry.full_path);
        }
        return Ok(());
    }

    println!("{:>10}  {:>10}  {:>4}  PATH", "SIZE", "STORED", "TYPE");

    let mut total_size = 0u64;
    let mut total_stored = 0u64;
    for entry in &entries {
        let Some(info) = entry.file_info() else {
            continue;
        };
        let kind = if info.is_resource() {
            format!("r{}", info.resource_type)
        } else if info.compressed {
            "z".to_string()
        } else {
            "-".to_string()
        };
        total_size += u64::from(info.size);
        total_stored += u64::from(info.read_size());
        println!(
            "{:>10}  {:>10}  {:>4}  {}",
            format_size(u64::from(info.size)),
            format_size(u64::from(info.read_size())),
            kind,
            entry.full_path
        );
    }

    println!();
    println!(
        "{} files, {} total ({} stored)",
        entries.len(),
        format_size(total_size),
        format_size(total_stored)
    );
    Ok(())
}

pub fn extract(source: &Path, destination: &Path, args: &ExtractArgs) -> anyhow::Result<()> {
    let start = Instant::now();
    let options = BulkOptions {
        num_threads: args.threads,
        memory_budget_mb: args.memory_mb,
        key: load_key(args.key.as_deref())?,
        decrypt_payloads: args.decrypt_payloads,
    };
    let extractor = BulkExtractor::new(options);

    print_step(1, 2, LOOKING_GLASS, &format!("Reading {}...", source.display()));
    let total = open_archive(source, args.key.as_deref())?.file_count();

    print_step(2, 2, ARCHIVE, &format!("Extracting {total} files..."));
    let result = if args.quiet {
        extractor.extract_all(source, destination, None)?
    } else {
        let pb = simple_bar(total as u64, "Extracting");
        let count = AtomicUsize::new(0);
        let result = extractor.extract_all(
            source,
            destination,
            Some(&|progress: &ExtractProgress| {
                if progress.phase != ExtractPhase::ExtractingFiles {
                    return;
                }
                let n = count.fetch_add(1, Ordering::SeqCst) + 1;
                pb.set_position(n as u64);
                if let Some(name) = &progress.current_file {
                    let short_name = name.rsplit('/').next().unwrap_or(name);
                    pb.set_message(short_name.to_string());
                }
            }),
        );
        pb.finish_and_clear();
        result?
    };

    println!(
        "Extracted {} files ({}) to {}",
        result.files_extracted,
        format_size(result.bytes_extracted),
        result.extracted_path.display()
    );
    print_done(start.elapsed());
    Ok(())
}

pub fn cat(source: &Path, path: &str, output: Option<&Path>, key: Option<&Path>) -> anyhow::Result<()> {
    let container = ArchiveContainer::new();
    container.initialize();
    if let Some(key) = load_key(key)? {
        container.set_aes_key(key);
    }
    if !container.load_rpf(source) {
        anyhow::bail!("Failed to load {}", source.display());
    }

    let file = container
        .extract_file(path)
        .with_context(|| format!("{path} not found in {}", source.display()))?;

    match output {
        Some(out) => {
            std::fs::write(out, file.data.as_slice())
                .with_context(|| format!("Failed to write {}", out.display()))?;
            println!("Wrote {} bytes to {}", file.data.len(), out.display());
        }
        None => std::io::stdout().lock().write_all(&file.data)?,
    }
    Ok(())
}

pub fn pack(source: &Path, destination: &Path, compress: bool, key: Option<&Path>) -> anyhow::Result<()> {
    let start = Instant::now();
    print_step(1, 2, LOOKING_GLASS, &format!("Scanning {}...", source.display()));
    let mut writer = RpfWriter::from_directory(source)?.with_compression(compress);
    if let Some(key) = load_key(key)? {
        writer = writer.with_encryption(key);
    }

    print_step(
        2,
        2,
        DISK,
        &format!("Writing {} files to {}...", writer.file_count(), destination.display()),
    );
    writer.write(destination)?;
    print_done(start.elapsed());
    Ok(())
}

pub fn info(source: &Path, key: Option<&Path>) -> anyhow::Result<()> {
    let archive = open_archive(source, key)?;
    let header = &archive.header;

    let files: Vec<_> = archive.files().filter_map(|e| e.file_info()).collect();
    let compressed = files.iter().filter(|f| f.needs_inflate()).count();
    let resources = files.iter().filter(|f| f.is_resource()).count();
    let size: u64 = files.iter().map(|f| u64::from(f.size)).sum();
    let stored: u64 = files.iter().map(|f| u64::from(f.read_size())).sum();
    let unreachable = archive
        .files()
        .filter(|e| e.full_path.is_empty())
        .count();

    println!("Archive:     {}", source.display());
    println!("TOC size:    {} bytes", header.toc_size);
    println!("Entries:     {}", header.entry_count);
    println!("Encrypted:   {}", if header.encrypted { "yes" } else { "no" });
    println!("Files:       {}", archive.file_count());
    println!("Compressed:  {compressed}");
    println!("Resources:   {resources}");
    println!("Total size:  {}", format_size(size));
    println!("Stored size: {}", format_size(stored));
    if unreachable > 0 {
        println!("Unreachable: {unreachable}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_glob() {
        assert!(matches_glob("*.xtd", "Vehicles.XTD"));
        assert!(matches_glob("pl?yer*", "player_model.wdr"));
        assert!(!matches_glob("*.wtd", "vehicles.xtd"));
        assert!(matches_entry("*.dat", "common/data/handling.dat"));
        assert!(matches_entry("common/*", "common/data/handling.dat"));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512");
        assert_eq!(format_size(2048), "2.0K");
        assert_eq!(format_size(3 * 1_048_576), "3.0M");
    }
}
