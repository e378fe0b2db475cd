//! Mod overlay index
//!
//! Overlays are host directories layered over the game's assets. Each
//! enabled overlay is walked once per [`ModOverlay::rebuild_index`] and every
//! file is keyed by its overlay-relative path after the FusionFix remap.
//! Higher priority overlays are walked first and keep their keys.
//!
//! Registering or removing an overlay does not touch the index; call
//! `rebuild_index` afterwards.

mod remap;

pub use remap::{FUSIONFIX_MARKERS, PROBE_PATHS, map_fusionfix_path};

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::texture::{Platform, XBOX_EXTENSIONS, convert_to, counterpart_extension};
use crate::utils::{PathKey, default_cache_dir, hash_path, write_atomic};

/// A registered overlay directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayEntry {
    pub path: PathBuf,
    /// Higher resolves first
    pub priority: i32,
    pub enabled: bool,
    pub name: String,
}

/// The host file that serves a normalized game path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOverride {
    pub host_path: PathBuf,
    pub key: PathKey,
    /// Priority of the overlay the file came from
    pub priority: i32,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OverlayStats {
    pub total_overlays: usize,
    pub enabled_overlays: usize,
    pub total_override_files: usize,
    pub override_hits: u64,
    pub override_misses: u64,
}

#[derive(Default)]
struct OverlayState {
    initialized: bool,
    game_root: PathBuf,
    /// Sorted by descending priority, registration order within a priority
    overlays: Vec<OverlayEntry>,
    index: HashMap<PathKey, FileOverride>,
    img_folders: HashMap<PathKey, PathBuf>,
    /// `(source file, target extension)` -> converted file on disk
    converted: HashMap<(PathBuf, &'static str), PathBuf>,
    stats: OverlayStats,
}

impl OverlayState {
    fn push_overlay(&mut self, entry: OverlayEntry) {
        self.overlays.push(entry);
        // Stable, so equal priorities keep registration order
        self.overlays.sort_by(|a, b| b.priority.cmp(&a.priority));
        self.refresh_counts();
    }

    fn refresh_counts(&mut self) {
        self.stats.total_overlays = self.overlays.len();
        self.stats.enabled_overlays = self.overlays.iter().filter(|o| o.enabled).count();
    }

    fn position(&self, path: &Path) -> Option<usize> {
        self.overlays.iter().position(|o| same_dir(&o.path, path))
    }

    fn lookup(&self, key: &PathKey) -> Option<&FileOverride> {
        if let Some(hit) = self.index.get(key) {
            return Some(hit);
        }
        let mapped = map_fusionfix_path(key.as_str());
        if mapped == key.as_str() {
            return None;
        }
        self.index.get(mapped.as_str())
    }
}

/// Priority-ordered overlay directories and the file index built over them.
pub struct ModOverlay {
    state: Mutex<OverlayState>,
    texture_cache_dir: PathBuf,
}

impl Default for ModOverlay {
    fn default() -> Self {
        Self::new()
    }
}

impl ModOverlay {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(OverlayState::default()),
            texture_cache_dir: default_cache_dir("texture_cache"),
        }
    }

    /// Write converted textures under `dir`.
    #[must_use]
    pub fn with_texture_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.texture_cache_dir = dir.into();
        self
    }

    #[must_use]
    pub fn texture_cache_dir(&self) -> &Path {
        &self.texture_cache_dir
    }

    /// Reset, register every conventional overlay found under `game_root`,
    /// then build the index.
    pub fn initialize(&self, game_root: impl AsRef<Path>) {
        let game_root = game_root.as_ref();
        {
            let mut state = self.state.lock();
            *state = OverlayState {
                initialized: true,
                game_root: game_root.to_path_buf(),
                ..OverlayState::default()
            };

            for (rel, priority) in PROBE_PATHS {
                let path = game_root.join(rel);
                if !path.is_dir() {
                    continue;
                }
                let name = probe_display_name(&path);
                tracing::info!("Found overlay {} (priority {priority})", path.display());
                state.push_overlay(OverlayEntry {
                    path,
                    priority,
                    enabled: true,
                    name,
                });
            }
        }

        tracing::info!("Mod overlay initialized at {}", game_root.display());
        self.rebuild_index();
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.state.lock().initialized
    }

    pub fn shutdown(&self) {
        *self.state.lock() = OverlayState::default();
        tracing::info!("Mod overlay shut down");
    }

    /// Register a directory. `name` defaults to its file name.
    ///
    /// # Errors
    /// [`Error::OverlayNotFound`] if `path` is not a directory,
    /// [`Error::OverlayAlreadyRegistered`] if it is already registered.
    pub fn add_overlay(&self, path: impl AsRef<Path>, priority: i32, name: Option<&str>) -> Result<()> {
        let path = path.as_ref();
        if !path.is_dir() {
            return Err(Error::OverlayNotFound(path.to_path_buf()));
        }

        let mut state = self.state.lock();
        if state.position(path).is_some() {
            return Err(Error::OverlayAlreadyRegistered(path.to_path_buf()));
        }

        let name = match name {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };
        tracing::info!("Added overlay {name} ({}, priority {priority})", path.display());
        state.push_overlay(OverlayEntry {
            path: path.to_path_buf(),
            priority,
            enabled: true,
            name,
        });
        Ok(())
    }

    /// Unregister a directory. Returns whether it was registered.
    pub fn remove_overlay(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        let mut state = self.state.lock();
        let Some(i) = state.position(path) else {
            return false;
        };
        state.overlays.remove(i);
        state.refresh_counts();
        tracing::info!("Removed overlay {}", path.display());
        true
    }

    /// Drop every overlay, the index and the stats.
    pub fn clear_overlays(&self) {
        let mut state = self.state.lock();
        state.overlays.clear();
        state.index.clear();
        state.img_folders.clear();
        state.stats = OverlayStats::default();
    }

    #[must_use]
    pub fn overlays(&self) -> Vec<OverlayEntry> {
        self.state.lock().overlays.clone()
    }

    /// Returns whether the overlay exists.
    pub fn set_overlay_enabled(&self, path: impl AsRef<Path>, enabled: bool) -> bool {
        let mut state = self.state.lock();
        let Some(i) = state.position(path.as_ref()) else {
            return false;
        };
        if state.overlays[i].enabled != enabled {
            state.overlays[i].enabled = enabled;
            state.refresh_counts();
            tracing::info!(
                "Overlay {} {}",
                state.overlays[i].name,
                if enabled { "enabled" } else { "disabled" }
            );
        }
        true
    }

    /// Rebuild the file index and the IMG folder table from the enabled
    /// overlays.
    pub fn rebuild_index(&self) {
        let overlays: Vec<OverlayEntry> = {
            let state = self.state.lock();
            state.overlays.iter().filter(|o| o.enabled).cloned().collect()
        };

        let mut index: HashMap<PathKey, FileOverride> = HashMap::new();
        let mut img_folders: HashMap<PathKey, PathBuf> = HashMap::new();

        for overlay in &overlays {
            if !overlay.path.is_dir() {
                continue;
            }
            for entry in WalkDir::new(&overlay.path)
                .min_depth(1)
                .follow_links(true)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let Some(rel) = PathKey::relative_to(entry.path(), &overlay.path) else {
                    continue;
                };
                let key = PathKey::new(map_fusionfix_path(rel.as_str()));

                if entry.file_type().is_dir() {
                    if is_img_folder(entry.path()) && !img_folders.contains_key(&key) {
                        tracing::debug!("IMG folder {key} -> {}", entry.path().display());
                        img_folders.insert(key, entry.path().to_path_buf());
                    }
                    continue;
                }
                if !entry.file_type().is_file() {
                    continue;
                }

                index.entry(key.clone()).or_insert_with(|| FileOverride {
                    host_path: entry.path().to_path_buf(),
                    key,
                    priority: overlay.priority,
                });
            }
        }

        let mut state = self.state.lock();
        state.stats.total_override_files = index.len();
        state.index = index;
        state.img_folders = img_folders;
        tracing::info!(
            "Overlay index rebuilt: {} files, {} IMG folders from {} overlays",
            state.index.len(),
            state.img_folders.len(),
            overlays.len()
        );
    }

    /// Host file overriding `path`, if any.
    ///
    /// Tries the key as given, then remapped. An Xbox resource with no
    /// override of its own is served from a PC counterpart, converted and
    /// cached on disk.
    pub fn resolve(&self, path: &str) -> Option<PathBuf> {
        let key = PathKey::new(path);

        let pc_source = {
            let mut state = self.state.lock();
            if !state.initialized {
                return None;
            }
            if let Some(hit) = state.lookup(&key).map(|o| o.host_path.clone()) {
                state.stats.override_hits += 1;
                return Some(hit);
            }
            pc_counterpart(&key).and_then(|(pc_key, ext)| {
                state.lookup(&pc_key).map(|o| (o.host_path.clone(), ext))
            })
        };

        let converted = pc_source.and_then(|(source, ext)| self.convert_and_cache(&source, ext));

        let mut state = self.state.lock();
        if converted.is_some() {
            state.stats.override_hits += 1;
        } else {
            state.stats.override_misses += 1;
        }
        converted
    }

    #[must_use]
    pub fn has_override(&self, path: &str) -> bool {
        self.resolve(path).is_some()
    }

    /// Every indexed override, in no particular order.
    #[must_use]
    pub fn all_overrides(&self) -> Vec<FileOverride> {
        self.state.lock().index.values().cloned().collect()
    }

    /// Replacement folder for an IMG archive path such as
    /// `pc/models/cdimages/vehicles.img`.
    #[must_use]
    pub fn img_replacement_folder(&self, img_path: &str) -> Option<PathBuf> {
        let key = PathKey::new(img_path);
        let state = self.state.lock();
        state
            .img_folders
            .get(&key)
            .or_else(|| state.img_folders.get(map_fusionfix_path(key.as_str()).as_str()))
            .cloned()
    }

    #[must_use]
    pub fn all_img_folders(&self) -> Vec<(PathKey, PathBuf)> {
        let state = self.state.lock();
        let mut folders: Vec<_> = state
            .img_folders
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        folders.sort();
        folders
    }

    /// Forget converted textures and delete the cache directory.
    pub fn clear_texture_cache(&self) {
        self.state.lock().converted.clear();
        if !self.texture_cache_dir.exists() {
            return;
        }
        if let Err(e) = fs::remove_dir_all(&self.texture_cache_dir) {
            tracing::warn!("Failed to clear {}: {e}", self.texture_cache_dir.display());
        }
    }

    #[must_use]
    pub fn stats(&self) -> OverlayStats {
        self.state.lock().stats.clone()
    }

    pub fn dump_status(&self) {
        let state = self.state.lock();
        let s = &state.stats;
        tracing::info!(
            "Mod overlay: root={} initialized={} overlays={} ({} enabled) files={} hits={} misses={}",
            state.game_root.display(),
            state.initialized,
            s.total_overlays,
            s.enabled_overlays,
            s.total_override_files,
            s.override_hits,
            s.override_misses
        );
        for overlay in &state.overlays {
            tracing::info!(
                "  [{}] {} (priority {}, {})",
                if overlay.enabled { "ON" } else { "OFF" },
                overlay.name,
                overlay.priority,
                overlay.path.display()
            );
        }
        if state.index.len() <= 50 {
            for (key, file) in &state.index {
                tracing::info!("  {key} -> {}", file.host_path.display());
            }
        }
    }

    /// Convert a PC resource for the Xbox and store it as
    /// `<cache dir>/<hash><ext>`. Unconvertible data is cached as is.
    fn convert_and_cache(&self, source: &Path, ext: &'static str) -> Option<PathBuf> {
        let cache_key = (source.to_path_buf(), ext);
        let cached = self.state.lock().converted.get(&cache_key).cloned();
        if let Some(cached) = cached.filter(|p| p.is_file()) {
            return Some(cached);
        }

        let target = self
            .texture_cache_dir
            .join(format!("{}{ext}", hash_path(&source.to_string_lossy())));

        if !target.is_file() {
            let data = match fs::read(source) {
                Ok(data) => data,
                Err(e) => {
                    tracing::warn!("Failed to read {}: {e}", source.display());
                    return None;
                }
            };
            let converted = convert_to(&data, Platform::Xbox360).unwrap_or_else(|e| {
                tracing::warn!("Using {} unconverted: {e}", source.display());
                data
            });
            if let Err(e) = write_atomic(&target, &converted) {
                tracing::warn!("Failed to write {}: {e}", target.display());
                return None;
            }
            tracing::info!("Converted {} -> {}", source.display(), target.display());
        }

        self.state.lock().converted.insert(cache_key, target.clone());
        Some(target)
    }
}

/// PC key and the requested Xbox extension, for Xbox resource keys.
fn pc_counterpart(key: &PathKey) -> Option<(PathKey, &'static str)> {
    let ext = key.extension()?;
    let xbox = XBOX_EXTENSIONS.iter().copied().find(|e| *e == ext)?;
    let pc = counterpart_extension(xbox)?;
    Some((key.with_extension(pc), xbox))
}

fn is_img_folder(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().to_ascii_lowercase())
        .is_some_and(|n| n.len() > 4 && n.ends_with(".img"))
}

fn probe_display_name(path: &Path) -> String {
    let file_name = |p: &Path| {
        p.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    };

    let mut name = file_name(path);
    if path.parent().is_some_and(|p| file_name(p) == "mods") {
        name = format!("mods/{name}");
    }
    if FUSIONFIX_MARKERS.iter().any(|m| path.join(m).exists()) {
        name.push_str(" (FusionFix)");
    }
    name
}

/// Same directory, comparing canonical paths when both resolve.
fn same_dir(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
