//! Replacement-folder merging for IMG archives
//!
//! A folder named after an archive (`update/pc/models/cdimages/vehicles.img/`)
//! supplies replacement and additional entries. The merged archive is
//! rebuilt in memory and cached per source path.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use walkdir::WalkDir;

use super::reader::ImgReader;
use super::types::{ImgFile, ImgStats, VirtualImage};
use super::writer::create_img;
use super::{IMG_VERSION, MAX_FILE_SIZE};
use crate::crypto::AesKey;

/// Relative roots searched by [`find_update_folder`], in order.
pub const UPDATE_FOLDER_ROOTS: [&str; 2] = ["update", "mods/update"];

#[derive(Default)]
struct MergerState {
    initialized: bool,
    cache: HashMap<PathBuf, Arc<VirtualImage>>,
    key: Option<AesKey>,
    stats: ImgStats,
}

/// Builds and caches merged IMG archives
#[derive(Default)]
pub struct ImgMerger {
    state: Mutex<MergerState>,
}

impl ImgMerger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset cache and stats. Idempotent.
    pub fn initialize(&self) {
        let mut state = self.state.lock();
        if state.initialized {
            return;
        }
        state.initialized = true;
        state.cache.clear();
        state.stats = ImgStats::default();
        tracing::info!("IMG merger initialized");
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.state.lock().initialized
    }

    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        state.initialized = false;
        state.cache.clear();
    }

    /// Key for encrypted archive tables.
    pub fn set_aes_key(&self, key: AesKey) {
        self.state.lock().key = Some(key);
    }

    /// Read every entry of an archive. `None` if it is missing or not v3.
    pub fn extract_img(&self, img_path: impl AsRef<Path>) -> Option<Vec<ImgFile>> {
        let img_path = img_path.as_ref();
        let key = self.state.lock().key.clone();

        let files = ImgReader::open(img_path, key).and_then(|mut r| r.read_all());
        match files {
            Ok(files) => {
                self.state.lock().stats.imgs_loaded += 1;
                tracing::debug!("Read {} entries from {}", files.len(), img_path.display());
                Some(files)
            }
            Err(e) => {
                tracing::warn!("Failed to read IMG {}: {e}", img_path.display());
                None
            }
        }
    }

    /// Overlay `replacements` onto `original` by case-insensitive name.
    ///
    /// A replacement takes the original's slot and name casing. Unmatched
    /// replacements are appended in their own order.
    pub fn merge_files(&self, original: &[ImgFile], replacements: &[ImgFile]) -> Vec<ImgFile> {
        let by_name: HashMap<String, &ImgFile> = replacements
            .iter()
            .map(|f| (f.name.to_ascii_lowercase(), f))
            .collect();

        let mut merged = Vec::with_capacity(original.len() + replacements.len());
        let mut consumed = HashSet::new();
        let mut replaced = 0u64;

        for file in original {
            let lower = file.name.to_ascii_lowercase();
            match by_name.get(&lower) {
                Some(replacement) => {
                    merged.push(ImgFile {
                        name: file.name.clone(),
                        ..(*replacement).clone()
                    });
                    consumed.insert(lower);
                    replaced += 1;
                }
                None => merged.push(file.clone()),
            }
        }

        let mut added = 0u64;
        for replacement in replacements {
            let lower = replacement.name.to_ascii_lowercase();
            if consumed.insert(lower) {
                merged.push(replacement.clone());
                added += 1;
            }
        }

        let mut state = self.state.lock();
        state.stats.files_replaced += replaced;
        state.stats.files_added += added;
        merged
    }

    /// Merge an archive with a replacement folder.
    ///
    /// `None` if the archive cannot be read or the folder holds no files.
    pub fn merge_img_with_folder(
        &self,
        img_path: impl AsRef<Path>,
        folder: impl AsRef<Path>,
    ) -> Option<Arc<VirtualImage>> {
        let img_path = img_path.as_ref();
        let original = self.extract_img(img_path)?;

        let replacements = get_replacement_files(folder);
        if replacements.is_empty() {
            return None;
        }

        let files = self.merge_files(&original, &replacements);
        let data = match create_img(&files) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!("Failed to rebuild {}: {e}", img_path.display());
                return None;
            }
        };

        self.state.lock().stats.imgs_merged += 1;
        tracing::info!(
            "Merged {} with {} replacements ({} files total)",
            img_path.display(),
            replacements.len(),
            files.len()
        );

        Some(Arc::new(VirtualImage {
            source: img_path.to_path_buf(),
            files,
            data,
            version: IMG_VERSION,
        }))
    }

    /// Merged image for `img_path`, built once and then served from cache.
    pub fn virtual_img(&self, img_path: impl AsRef<Path>, folder: impl AsRef<Path>) -> Option<Arc<VirtualImage>> {
        let img_path = img_path.as_ref();
        {
            let mut state = self.state.lock();
            if let Some(image) = state.cache.get(img_path).cloned() {
                state.stats.cache_hits += 1;
                return Some(image);
            }
            state.stats.cache_misses += 1;
        }

        let image = self.merge_img_with_folder(img_path, folder)?;
        let mut state = self.state.lock();
        Some(Arc::clone(
            state.cache.entry(img_path.to_path_buf()).or_insert(image),
        ))
    }

    pub fn clear_cache(&self) {
        self.state.lock().cache.clear();
    }

    #[must_use]
    pub fn stats(&self) -> ImgStats {
        self.state.lock().stats.clone()
    }

    pub fn dump_status(&self) {
        let state = self.state.lock();
        let s = &state.stats;
        tracing::info!(
            "IMG: loaded={} merged={} replaced={} added={} hits={} misses={} cached={}",
            s.imgs_loaded,
            s.imgs_merged,
            s.files_replaced,
            s.files_added,
            s.cache_hits,
            s.cache_misses,
            state.cache.len()
        );
    }
}

/// Every regular file under `folder` (recursively), named by file name.
///
/// Files too large for an entry are skipped.
pub fn get_replacement_files(folder: impl AsRef<Path>) -> Vec<ImgFile> {
    let folder = folder.as_ref();
    if !folder.is_dir() {
        return Vec::new();
    }

    WalkDir::new(folder)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|entry| {
            let size = entry.metadata().ok()?.len();
            if size > MAX_FILE_SIZE as u64 {
                tracing::warn!("Skipping oversized replacement {}", entry.path().display());
                return None;
            }
            let data = fs::read(entry.path()).ok()?;
            Some(ImgFile {
                name: entry.file_name().to_string_lossy().into_owned(),
                data,
                resource_type: 0,
                is_replacement: true,
            })
        })
        .collect()
}

/// `<root>/update/<img>` or `<root>/mods/update/<img>`, whichever is a
/// directory first.
pub fn find_update_folder(root: impl AsRef<Path>, img_path: &str) -> Option<PathBuf> {
    let root = root.as_ref();
    UPDATE_FOLDER_ROOTS
        .iter()
        .map(|base| root.join(base).join(img_path))
        .find(|candidate| candidate.is_dir())
}
