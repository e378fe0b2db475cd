//! Parallel whole-archive extraction
//!
//! Used once at install time to unpack an RPF2 archive to disk. Entries are
//! processed on a dedicated rayon pool; each task reserves memory from a
//! shared [`MemoryBudget`] before touching the archive, reads its bytes
//! through the shared handle under a mutex, and decodes and writes with no
//! lock held. A failing entry is counted and never stops its siblings.

use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;
use rayon::prelude::*;

use super::budget::MemoryBudget;
use super::decompression::open_payload;
use super::reader::{parse_header, read_stored};
use super::types::{ExtractPhase, ExtractProgress, RpfArchive, RpfEntry, RpfFileInfo, RpfHeader};
use super::{HEADER_SIZE, ProgressCallback};
use crate::crypto::AesKey;
use crate::error::{Error, Result};

/// Tuning for [`BulkExtractor`]
#[derive(Debug, Clone, Default)]
pub struct BulkOptions {
    /// Worker threads (0 = hardware concurrency)
    pub num_threads: usize,
    /// Memory budget in MiB (0 = unbounded)
    pub memory_budget_mb: u64,
    /// Key for encrypted tables of contents
    pub key: Option<AesKey>,
    /// Also decrypt payloads of encrypted archives
    pub decrypt_payloads: bool,
}

impl BulkOptions {
    /// Resolved worker count.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        if self.num_threads > 0 {
            self.num_threads
        } else {
            std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(4)
        }
    }
}

/// Aggregate outcome of a bulk extraction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionResult {
    /// True when every entry was written
    pub success: bool,
    pub extracted_path: PathBuf,
    pub files_extracted: usize,
    pub bytes_extracted: u64,
    pub errors: usize,
    /// Empty on success
    pub error_message: String,
}

impl ExtractionResult {
    fn failed(extracted_path: &Path, message: impl Into<String>) -> Self {
        Self {
            success: false,
            extracted_path: extracted_path.to_path_buf(),
            error_message: message.into(),
            ..Self::default()
        }
    }
}

/// Extracts whole archives in parallel
#[derive(Debug, Clone, Default)]
pub struct BulkExtractor {
    options: BulkOptions,
}

impl BulkExtractor {
    #[must_use]
    pub fn new(options: BulkOptions) -> Self {
        Self { options }
    }

    #[must_use]
    pub fn options(&self) -> &BulkOptions {
        &self.options
    }

    /// Extract every file entry of `rpf_path` under `output_dir`.
    ///
    /// `progress` may be called from any worker thread and out of entry
    /// order. The last call always reports completion.
    pub fn extract(
        &self,
        rpf_path: impl AsRef<Path>,
        output_dir: impl AsRef<Path>,
        progress: Option<ProgressCallback>,
    ) -> ExtractionResult {
        let rpf_path = rpf_path.as_ref();
        let output_dir = output_dir.as_ref();
        let report = |p: &ExtractProgress| {
            if let Some(cb) = progress {
                cb(p);
            }
        };

        report(&ExtractProgress::new(ExtractPhase::ReadingToc, 0, 1));

        let archive = match RpfArchive::open(rpf_path, self.options.key.clone()) {
            Ok(archive) => archive,
            Err(e) => return ExtractionResult::failed(output_dir, e.to_string()),
        };
        let (file, file_len) = match File::open(rpf_path).and_then(|f| f.metadata().map(|m| (f, m.len()))) {
            Ok(pair) => pair,
            Err(e) => return ExtractionResult::failed(output_dir, e.to_string()),
        };
        if let Err(e) = fs::create_dir_all(output_dir) {
            return ExtractionResult::failed(output_dir, e.to_string());
        }

        let entries: Vec<&RpfEntry> = archive.files().collect();
        let total = entries.len();
        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.worker_count())
            .build()
        {
            Ok(pool) => pool,
            Err(e) => return ExtractionResult::failed(output_dir, e.to_string()),
        };

        let payload_key = if self.options.decrypt_payloads && archive.header.encrypted {
            if self.options.key.is_none() {
                tracing::warn!("{}: payloads are encrypted but no key is set", rpf_path.display());
            }
            self.options.key.as_ref()
        } else {
            None
        };

        let job = EntryJob {
            file: Mutex::new(file),
            file_len,
            budget: MemoryBudget::from_mb(self.options.memory_budget_mb),
            output_dir,
            key: payload_key,
        };
        let completed = AtomicUsize::new(0);
        let bytes = AtomicU64::new(0);

        tracing::info!(
            "Extracting {} files from {} with {} workers",
            total,
            rpf_path.display(),
            pool.current_num_threads()
        );

        let errors: Vec<(String, Error)> = pool.install(|| {
            entries
                .par_iter()
                .filter_map(|entry| {
                    let outcome = job.run(entry);
                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    report(&ExtractProgress::with_file(
                        ExtractPhase::ExtractingFiles,
                        done,
                        total,
                        entry.full_path.as_str(),
                    ));
                    match outcome {
                        Ok(written) => {
                            bytes.fetch_add(written, Ordering::Relaxed);
                            None
                        }
                        Err(e) => {
                            tracing::warn!("Failed to extract {}: {e}", entry.full_path);
                            Some((entry.full_path.clone(), e))
                        }
                    }
                })
                .collect()
        });

        report(&ExtractProgress::new(ExtractPhase::Complete, total, total));

        let error_count = errors.len();
        let result = ExtractionResult {
            success: error_count == 0,
            extracted_path: output_dir.to_path_buf(),
            files_extracted: total - error_count,
            bytes_extracted: bytes.into_inner(),
            errors: error_count,
            error_message: if error_count > 0 {
                format!("Failed to extract {error_count} files")
            } else {
                String::new()
            },
        };

        tracing::info!(
            "Extracted {} files ({} bytes) from {}, {} errors",
            result.files_extracted,
            result.bytes_extracted,
            rpf_path.display(),
            result.errors
        );
        result
    }

    /// [`extract`](Self::extract) with failures surfaced as an error.
    ///
    /// # Errors
    /// Returns [`Error::RpfExtractionPartialFailure`] if any entry failed.
    pub fn extract_all(
        &self,
        rpf_path: impl AsRef<Path>,
        output_dir: impl AsRef<Path>,
        progress: Option<ProgressCallback>,
    ) -> Result<ExtractionResult> {
        let rpf_path = rpf_path.as_ref();
        // Surface the reason an archive is rejected
        RpfArchive::open(rpf_path, self.options.key.clone())?;

        let result = self.extract(rpf_path, output_dir, progress);
        if result.errors > 0 {
            return Err(Error::RpfExtractionPartialFailure {
                total: result.files_extracted + result.errors,
                failed: result.errors,
            });
        }
        Ok(result)
    }
}

/// Shared state for one extraction run
struct EntryJob<'a> {
    file: Mutex<File>,
    file_len: u64,
    budget: MemoryBudget,
    output_dir: &'a Path,
    key: Option<&'a AesKey>,
}

impl EntryJob<'_> {
    fn run(&self, entry: &RpfEntry) -> Result<u64> {
        let Some(info) = entry.file_info() else {
            return Ok(0);
        };
        let output_path = self.output_path(&entry.full_path)?;
        check_bounds(entry, info, self.file_len)?;

        let reservation = u64::from(info.size.max(info.compressed_size)) * 2;
        let _token = self.budget.acquire(reservation);

        let stored = {
            let mut file = self.file.lock();
            read_stored(&mut *file, info)?
        };
        let data = open_payload(stored, info, self.key, &entry.full_path);

        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&output_path, &data)?;
        Ok(data.len() as u64)
    }

    /// Join an archive path onto the output directory, refusing anything
    /// that would escape it.
    fn output_path(&self, full_path: &str) -> Result<PathBuf> {
        let relative = Path::new(full_path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if full_path.is_empty() || escapes {
            return Err(Error::InvalidPath(full_path.to_string()));
        }
        Ok(self.output_dir.join(relative))
    }
}

fn check_bounds(entry: &RpfEntry, info: &RpfFileInfo, file_len: u64) -> Result<()> {
    let length = u64::from(info.read_size());
    if info.offset.saturating_add(length) > file_len {
        return Err(Error::EntryOutOfBounds {
            path: entry.full_path.clone(),
            offset: info.offset,
            length,
        });
    }
    Ok(())
}

/// `.rpf` extension and a valid RPF2 magic.
pub fn is_rpf_file(path: impl AsRef<Path>) -> bool {
    let path = path.as_ref();
    path.extension().is_some_and(|e| e.eq_ignore_ascii_case("rpf")) && read_header(path).is_some()
}

/// Read just the header. `None` if the file is missing or not RPF2.
pub fn read_header(path: impl AsRef<Path>) -> Option<RpfHeader> {
    let mut file = File::open(path).ok()?;
    file.seek(SeekFrom::Start(0)).ok()?;
    let mut bytes = [0u8; HEADER_SIZE];
    file.read_exact(&mut bytes).ok()?;
    parse_header(&bytes).ok()
}

/// Whether the archive's table of contents is encrypted.
pub fn has_encrypted_files(path: impl AsRef<Path>) -> bool {
    read_header(path).is_some_and(|h| h.encrypted)
}
