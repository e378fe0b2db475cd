//! Lazy access to files inside RPF2 archives
//!
//! [`ArchiveContainer`] indexes every archive it is pointed at, maps each
//! normalized file path to the archive that holds it, and extracts single
//! files on demand into an in-memory cache.
//!
//! One mutex guards the registry, path map, cache and stats. Each archive
//! has its own file handle lock that is held only for the seek and read.
//! Decryption and inflation run with no lock held.

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use walkdir::WalkDir;

use super::decompression::open_payload;
use super::reader::read_stored;
use super::types::{ExtractedFile, RpfArchive, RpfStats};
use crate::crypto::AesKey;
use crate::utils::{PathKey, default_cache_dir, hash_path, write_atomic};

/// An indexed archive and the handle its payloads are read through.
struct LoadedRpf {
    archive: RpfArchive,
    file: Mutex<File>,
}

#[derive(Default)]
struct ContainerState {
    initialized: bool,
    /// Load order
    order: Vec<PathBuf>,
    archives: HashMap<PathBuf, Arc<LoadedRpf>>,
    /// Normalized file path -> owning archive (first loaded wins)
    file_map: HashMap<PathKey, PathBuf>,
    cache: HashMap<PathKey, Arc<Vec<u8>>>,
    key: Option<AesKey>,
    decrypt_payloads: bool,
    stats: RpfStats,
}

/// Lazy, cached access to files across all loaded RPF2 archives.
pub struct ArchiveContainer {
    state: Mutex<ContainerState>,
    temp_dir: PathBuf,
}

impl Default for ArchiveContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveContainer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ContainerState::default()),
            temp_dir: default_cache_dir("rpf_cache"),
        }
    }

    /// Use `dir` for [`extract_to_temp`](Self::extract_to_temp) output.
    #[must_use]
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    pub fn initialize(&self) {
        let mut state = self.state.lock();
        if !state.initialized {
            state.initialized = true;
            tracing::info!("Archive container initialized");
        }
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.state.lock().initialized
    }

    /// Drop every archive, mapping and cached file. The key is kept.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        let key = state.key.take();
        *state = ContainerState {
            key,
            ..ContainerState::default()
        };
        tracing::info!("Archive container shut down");
    }

    /// Key used for archives loaded from now on.
    pub fn set_aes_key(&self, key: AesKey) {
        self.state.lock().key = Some(key);
    }

    #[must_use]
    pub fn has_aes_key(&self) -> bool {
        self.state.lock().key.is_some()
    }

    /// Probe the conventional key locations under `root`.
    pub fn load_aes_key(&self, root: impl AsRef<Path>) -> bool {
        match AesKey::find(root) {
            Some((key, _)) => {
                self.set_aes_key(key);
                true
            }
            None => {
                tracing::warn!("No AES key found; encrypted archives will not decode");
                false
            }
        }
    }

    /// Decrypt payloads of encrypted archives before inflating them.
    ///
    /// Off by default: encrypted archives only encrypt their TOC.
    pub fn set_decrypt_payloads(&self, enabled: bool) {
        self.state.lock().decrypt_payloads = enabled;
    }

    /// Index one archive. Returns `false` if it is already loaded or is not a
    /// readable RPF2 file.
    pub fn load_rpf(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref().to_path_buf();

        let key = {
            let state = self.state.lock();
            if state.archives.contains_key(&path) {
                return false;
            }
            state.key.clone()
        };

        let archive = match RpfArchive::open(&path, key) {
            Ok(archive) => archive,
            Err(e) => {
                tracing::warn!("Skipping {}: {e}", path.display());
                return false;
            }
        };
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!("Skipping {}: {e}", path.display());
                return false;
            }
        };

        let mut state = self.state.lock();
        if state.archives.contains_key(&path) {
            return false;
        }
        for key in archive.index.keys() {
            if !state.file_map.contains_key(key) {
                state.file_map.insert(key.clone(), path.clone());
            }
        }
        tracing::info!("Loaded {} ({} files)", path.display(), archive.file_count());
        state.archives.insert(
            path.clone(),
            Arc::new(LoadedRpf {
                archive,
                file: Mutex::new(file),
            }),
        );
        state.order.push(path);
        state.stats.rpfs_loaded += 1;
        true
    }

    /// Recursively load every `*.rpf` under `dir`. Returns how many were
    /// newly loaded.
    pub fn scan_for_rpf_files(&self, dir: impl AsRef<Path>) -> usize {
        let dir = dir.as_ref();
        let mut loaded = 0;

        for entry in WalkDir::new(dir).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let is_rpf = entry
                .path()
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("rpf"));
            if is_rpf && self.load_rpf(entry.path()) {
                loaded += 1;
            }
        }

        tracing::info!("Scanned {}: {loaded} new archives", dir.display());
        loaded
    }

    /// Extract one file by any spelling of its archive path.
    ///
    /// The first call reads and decodes the entry; later calls return the
    /// cached bytes with `from_cache` set.
    pub fn extract_file(&self, path: &str) -> Option<ExtractedFile> {
        let key = PathKey::new(path);

        let (loaded, info, payload_key) = {
            let mut state = self.state.lock();
            if let Some(data) = state.cache.get(&key).cloned() {
                state.stats.cache_hits += 1;
                tracing::debug!("Cache hit: {key}");
                return Some(ExtractedFile {
                    data,
                    path: key,
                    from_cache: true,
                });
            }
            state.stats.cache_misses += 1;

            let rpf_path = state.file_map.get(&key)?;
            let loaded = Arc::clone(state.archives.get(rpf_path)?);
            let info = *loaded.archive.find(key.as_str())?.file_info()?;
            let payload_key = if state.decrypt_payloads && loaded.archive.header.encrypted {
                state.key.clone()
            } else {
                None
            };
            (loaded, info, payload_key)
        };

        let stored = {
            let mut file = loaded.file.lock();
            match read_stored(&mut *file, &info) {
                Ok(stored) => stored,
                Err(e) => {
                    tracing::warn!("Failed to read {key} from {}: {e}", loaded.archive.path.display());
                    return None;
                }
            }
        };

        let data = Arc::new(open_payload(stored, &info, payload_key.as_ref(), key.as_str()));

        let mut state = self.state.lock();
        state.stats.files_extracted += 1;
        state.stats.bytes_extracted += data.len() as u64;
        let data = Arc::clone(state.cache.entry(key.clone()).or_insert(data));
        tracing::debug!("Extracted {key} ({} bytes)", data.len());

        Some(ExtractedFile {
            data,
            path: key,
            from_cache: false,
        })
    }

    /// Extract a file and materialize it on disk.
    ///
    /// Output is `<temp dir>/<hash><ext>`; an existing file is reused.
    pub fn extract_to_temp(&self, path: &str) -> Option<PathBuf> {
        let key = PathKey::new(path);
        if !self.has_file(key.as_str()) {
            return None;
        }

        let target = self
            .temp_dir
            .join(format!("{}{}", hash_path(key.as_str()), key.extension().unwrap_or("")));
        if target.is_file() {
            return Some(target);
        }

        let extracted = self.extract_file(key.as_str())?;
        match write_atomic(&target, &extracted.data) {
            Ok(()) => Some(target),
            Err(e) => {
                tracing::warn!("Failed to write {}: {e}", target.display());
                None
            }
        }
    }

    #[must_use]
    pub fn has_file(&self, path: &str) -> bool {
        self.state.lock().file_map.contains_key(&PathKey::new(path))
    }

    /// Archive that serves `path`, if any.
    #[must_use]
    pub fn containing_rpf(&self, path: &str) -> Option<PathBuf> {
        self.state.lock().file_map.get(&PathKey::new(path)).cloned()
    }

    /// Full paths of every file in a loaded archive (empty if unknown).
    #[must_use]
    pub fn list_files(&self, rpf: impl AsRef<Path>) -> Vec<String> {
        let state = self.state.lock();
        state
            .archives
            .get(rpf.as_ref())
            .map(|loaded| {
                loaded
                    .archive
                    .files()
                    .filter(|e| !e.full_path.is_empty())
                    .map(|e| e.full_path.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Loaded archives in load order.
    #[must_use]
    pub fn loaded_rpfs(&self) -> Vec<PathBuf> {
        self.state.lock().order.clone()
    }

    pub fn clear_cache(&self) {
        let mut state = self.state.lock();
        let count = state.cache.len();
        state.cache.clear();
        tracing::debug!("Cleared {count} cached files");
    }

    #[must_use]
    pub fn stats(&self) -> RpfStats {
        self.state.lock().stats.clone()
    }

    pub fn dump_status(&self) {
        let state = self.state.lock();
        let s = &state.stats;
        tracing::info!(
            "RPF: {} archives, {} indexed files, {} cached, {} extracted ({} bytes), {} hits / {} misses, key {}",
            s.rpfs_loaded,
            state.file_map.len(),
            state.cache.len(),
            s.files_extracted,
            s.bytes_extracted,
            s.cache_hits,
            s.cache_misses,
            if state.key.is_some() { "loaded" } else { "missing" }
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpf::RpfWriter;

    fn build_rpf(dir: &Path, name: &str, files: &[(&str, &[u8])]) -> PathBuf {
        let mut writer = RpfWriter::new().with_compression(true);
        for (path, data) in files {
            writer.add_file(*path, data.to_vec());
        }
        let path = dir.join(name);
        writer.write(&path).unwrap();
        path
    }

    #[test]
    fn test_extract_caches() {
        let dir = tempfile::tempdir().unwrap();
        let data = b"vehicle handling ".repeat(64);
        build_rpf(dir.path(), "common.rpf", &[("data/handling.dat", &data)]);

        let container = ArchiveContainer::new();
        assert_eq!(container.scan_for_rpf_files(dir.path()), 1);

        let first = container.extract_file("Data\\Handling.DAT").unwrap();
        assert!(!first.from_cache);
        assert_eq!(first.data.as_slice(), data.as_slice());

        let second = container.extract_file("data/handling.dat").unwrap();
        assert!(second.from_cache);
        assert_eq!(second.data, first.data);

        let stats = container.stats();
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.cache_misses, 1);
        assert_eq!(stats.files_extracted, 1);
    }

    #[test]
    fn test_missing_file_counts_miss() {
        let container = ArchiveContainer::new();
        assert!(container.extract_file("nope.dat").is_none());
        assert_eq!(container.stats().cache_misses, 1);
    }

    #[test]
    fn test_first_archive_wins() {
        let dir = tempfile::tempdir().unwrap();
        let a = build_rpf(dir.path(), "a.rpf", &[("x.txt", b"from a")]);
        build_rpf(dir.path(), "b.rpf", &[("x.txt", b"from b"), ("y.txt", b"y")]);

        let container = ArchiveContainer::new();
        container.scan_for_rpf_files(dir.path());
        assert_eq!(container.containing_rpf("x.txt"), Some(a));
        assert_eq!(container.extract_file("x.txt").unwrap().data.as_slice(), b"from a");
        assert!(container.has_file("y.txt"));
        assert_eq!(container.loaded_rpfs().len(), 2);
    }

    #[test]
    fn test_load_twice_and_non_rpf() {
        let dir = tempfile::tempdir().unwrap();
        let rpf = build_rpf(dir.path(), "a.rpf", &[("x", b"1")]);
        let junk = dir.path().join("junk.rpf");
        std::fs::write(&junk, b"not an archive").unwrap();

        let container = ArchiveContainer::new();
        assert!(container.load_rpf(&rpf));
        assert!(!container.load_rpf(&rpf));
        assert!(!container.load_rpf(&junk));
        assert_eq!(container.stats().rpfs_loaded, 1);
        assert_eq!(container.list_files(&rpf), vec!["x".to_string()]);
        assert!(container.list_files(&junk).is_empty());
    }

    #[test]
    fn test_extract_to_temp_reuses_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        build_rpf(dir.path(), "a.rpf", &[("textures/car.xtd", b"tex")]);

        let container = ArchiveContainer::new().with_temp_dir(cache.path());
        container.scan_for_rpf_files(dir.path());

        let out = container.extract_to_temp("textures/car.xtd").unwrap();
        assert_eq!(out.extension().unwrap(), "xtd");
        assert_eq!(std::fs::read(&out).unwrap(), b"tex");

        let again = container.extract_to_temp("textures/car.xtd").unwrap();
        assert_eq!(out, again);
        assert_eq!(container.stats().files_extracted, 1);
    }

    #[test]
    fn test_shutdown_keeps_key() {
        let container = ArchiveContainer::new();
        container.initialize();
        container.set_aes_key(AesKey::from_bytes(&[1u8; 32]).unwrap());
        container.shutdown();
        assert!(!container.is_initialized());
        assert!(container.has_aes_key());
    }
}
