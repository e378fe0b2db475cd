//! Virtual filesystem over the extracted game tree
//!
//! Guest paths are resolved against an "extracted root" (the loose files
//! produced at install time) through a list of prefix mappings, then
//! directly, then through an index built by one recursive scan.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use walkdir::WalkDir;

use crate::utils::{PathKey, strip_drive_prefix, unify_separators};

/// Resource extensions tried when a candidate path does not exist as given
pub const GAME_EXTENSIONS: [&str; 24] = [
    ".xtd", ".wtd", ".xbd", ".wbd", ".xdr", ".wdr", ".xft", ".wft", ".xad", ".wad", ".xmd", ".wmd",
    ".xcd", ".wcd", ".xpd", ".wpd", ".xnd", ".wnd", ".xvd", ".wvd", ".xdd", ".wdd", ".xld", ".wld",
];

/// Default guest prefix -> host subpath table, in match order
pub const DEFAULT_MAPPINGS: [(&str, &str); 13] = [
    ("fxl_final", "common/shaders/fxl_final"),
    ("shaders/fxl_final", "common/shaders/fxl_final"),
    ("common.rpf", "common"),
    ("xbox360.rpf", "xbox360"),
    ("audio.rpf", "audio"),
    ("common/", "common/"),
    ("data/", "common/data/"),
    ("text/", "common/text/"),
    ("platform:", "xbox360"),
    ("platform:/", "xbox360/"),
    ("textures", "xbox360/textures"),
    ("models", "xbox360/models"),
    ("anim", "xbox360/anim"),
];

/// A guest prefix served from a subpath of the extracted root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMapping {
    pub guest_prefix: String,
    pub host_prefix: String,
}

impl PathMapping {
    pub fn new(guest_prefix: impl Into<String>, host_prefix: impl Into<String>) -> Self {
        Self {
            guest_prefix: guest_prefix.into(),
            host_prefix: host_prefix.into(),
        }
    }

    /// Path below the prefix, if the mapping applies.
    ///
    /// `stripped` is the drive-less path, `unified` the lowercased path with
    /// its drive. A prefix of `stripped` wins; otherwise the prefix may
    /// appear anywhere in `unified` (drive aliases such as `platform:`).
    fn remainder<'a>(&self, stripped: &'a str, unified: &'a str) -> Option<&'a str> {
        let prefix = unify_separators(&self.guest_prefix);
        if prefix.is_empty() {
            return None;
        }
        let rest = match stripped.strip_prefix(prefix.as_str()) {
            Some(rest) => rest,
            None => {
                let at = unified.find(prefix.as_str())?;
                &unified[at + prefix.len()..]
            }
        };
        Some(rest.trim_start_matches('/'))
    }
}

fn has_parent_segment(path: &str) -> bool {
    path.split('/').any(|segment| segment == "..")
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct VfsStats {
    pub total_files: u64,
    pub total_directories: u64,
    pub total_bytes: u64,
    pub resolve_hits: u64,
    pub resolve_misses: u64,
}

#[derive(Default)]
struct VfsState {
    initialized: bool,
    root: PathBuf,
    mappings: Vec<PathMapping>,
    index: HashMap<PathKey, PathBuf>,
    stats: VfsStats,
}

/// Resolves guest paths to files under the extracted root.
#[derive(Default)]
pub struct VirtualFileSystem {
    state: Mutex<VfsState>,
}

impl VirtualFileSystem {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the default mappings and index `extracted_root`.
    pub fn initialize(&self, extracted_root: impl AsRef<Path>) {
        let root = extracted_root.as_ref().to_path_buf();
        {
            let mut state = self.state.lock();
            state.initialized = true;
            state.root.clone_from(&root);
            state.mappings = default_mappings();
        }
        self.rebuild_index();

        let stats = self.stats();
        tracing::info!(
            "VFS initialized at {}: {} files, {} directories, {} bytes",
            root.display(),
            stats.total_files,
            stats.total_directories,
            stats.total_bytes
        );
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.state.lock().initialized
    }

    #[must_use]
    pub fn extracted_root(&self) -> PathBuf {
        self.state.lock().root.clone()
    }

    pub fn shutdown(&self) {
        *self.state.lock() = VfsState::default();
        tracing::info!("VFS shut down");
    }

    /// Rescan the extracted root. Resets all statistics.
    pub fn rebuild_index(&self) {
        let root = {
            let state = self.state.lock();
            if !state.initialized || state.root.as_os_str().is_empty() {
                return;
            }
            state.root.clone()
        };

        let mut index = HashMap::new();
        let mut stats = VfsStats::default();

        if root.is_dir() {
            for entry in WalkDir::new(&root)
                .min_depth(1)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let file_type = entry.file_type();
                if file_type.is_dir() {
                    stats.total_directories += 1;
                } else if file_type.is_file() {
                    stats.total_files += 1;
                    stats.total_bytes += entry.metadata().map_or(0, |m| m.len());
                }
                if let Some(key) = PathKey::relative_to(entry.path(), &root) {
                    index.insert(key, entry.into_path());
                }
            }
        } else {
            tracing::warn!("Extracted root does not exist: {}", root.display());
        }

        let mut state = self.state.lock();
        state.index = index;
        state.stats = stats;
    }

    /// Host path for a guest path.
    ///
    /// Mappings are tried in order, and a mapped path is only accepted if
    /// it (or it plus a game extension) exists on disk. Then the path
    /// directly under the root, then the index; extensionless paths finally
    /// try each game extension.
    pub fn resolve(&self, guest_path: &str) -> Option<PathBuf> {
        let (root, mappings) = {
            let state = self.state.lock();
            if !state.initialized {
                return None;
            }
            (state.root.clone(), state.mappings.clone())
        };

        let unified = unify_separators(guest_path);
        let stripped = strip_drive_prefix(&unified);

        let found = self.find(&root, &mappings, stripped, &unified);

        let mut state = self.state.lock();
        match &found {
            Some(path) => {
                state.stats.resolve_hits += 1;
                tracing::trace!("VFS {guest_path} -> {}", path.display());
            }
            None => {
                state.stats.resolve_misses += 1;
                tracing::debug!("VFS miss: {guest_path}");
            }
        }
        found
    }

    fn find(&self, root: &Path, mappings: &[PathMapping], stripped: &str, unified: &str) -> Option<PathBuf> {
        // Lookups never leave the extracted root
        if has_parent_segment(stripped) {
            tracing::warn!("Rejecting guest path with parent segment: {unified}");
            return None;
        }

        for mapping in mappings {
            let Some(rest) = mapping.remainder(stripped, unified) else {
                continue;
            };
            if has_parent_segment(rest) {
                continue;
            }
            let mut candidate = root.join(&mapping.host_prefix);
            if !rest.is_empty() {
                candidate.push(rest);
            }
            if let Some(hit) = existing_with_extensions(&candidate) {
                return Some(hit);
            }
        }

        if stripped.is_empty() {
            return None;
        }
        let direct = root.join(stripped);
        if direct.exists() {
            return Some(direct);
        }

        let key = PathKey::new(stripped);
        if let Some(hit) = self.state.lock().index.get(&key) {
            return Some(hit.clone());
        }

        if key.extension().is_none() {
            for ext in GAME_EXTENSIONS {
                let with_ext = root.join(format!("{stripped}{ext}"));
                if with_ext.exists() {
                    return Some(with_ext);
                }
                if let Some(hit) = self.state.lock().index.get(format!("{key}{ext}").as_str()) {
                    return Some(hit.clone());
                }
            }
        }
        None
    }

    #[must_use]
    pub fn exists(&self, guest_path: &str) -> bool {
        self.resolve(guest_path).is_some_and(|p| p.exists())
    }

    #[must_use]
    pub fn is_directory(&self, guest_path: &str) -> bool {
        self.resolve(guest_path).is_some_and(|p| p.is_dir())
    }

    /// Size of a resolved regular file, 0 otherwise.
    #[must_use]
    pub fn file_size(&self, guest_path: &str) -> u64 {
        self.resolve(guest_path)
            .and_then(|p| fs::metadata(p).ok())
            .filter(fs::Metadata::is_file)
            .map_or(0, |m| m.len())
    }

    /// Append a mapping; it is tried after the existing ones.
    pub fn add_path_mapping(&self, guest_prefix: &str, host_prefix: &str) {
        self.state
            .lock()
            .mappings
            .push(PathMapping::new(guest_prefix, host_prefix));
    }

    /// Restore the default mapping table.
    pub fn reset_path_mappings(&self) {
        self.state.lock().mappings = default_mappings();
    }

    #[must_use]
    pub fn mappings(&self) -> Vec<PathMapping> {
        self.state.lock().mappings.clone()
    }

    #[must_use]
    pub fn stats(&self) -> VfsStats {
        self.state.lock().stats.clone()
    }

    pub fn dump_status(&self) {
        let state = self.state.lock();
        let s = &state.stats;
        tracing::info!(
            "VFS: root={} files={} dirs={} bytes={} hits={} misses={} mappings={}",
            state.root.display(),
            s.total_files,
            s.total_directories,
            s.total_bytes,
            s.resolve_hits,
            s.resolve_misses,
            state.mappings.len()
        );
    }
}

fn default_mappings() -> Vec<PathMapping> {
    DEFAULT_MAPPINGS
        .iter()
        .map(|(guest, host)| PathMapping::new(*guest, *host))
        .collect()
}

/// `path` if it exists, else the first `path + ext` that does.
fn existing_with_extensions(path: &Path) -> Option<PathBuf> {
    if path.exists() {
        return Some(path.to_path_buf());
    }
    GAME_EXTENSIONS.iter().find_map(|ext| {
        let mut candidate = path.as_os_str().to_owned();
        candidate.push(ext);
        let candidate = PathBuf::from(candidate);
        candidate.exists().then_some(candidate)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path, data: &[u8]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, data).unwrap();
    }

    fn sample_tree() -> (tempfile::TempDir, VirtualFileSystem) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("common/data/default.dat"), b"default");
        touch(&root.join("common/shaders/fxl_final/gta_default.fxc"), b"fx");
        touch(&root.join("xbox360/textures/fonts.xtd"), b"fonts");
        touch(&root.join("Misc/ReadMe.TXT"), b"readme");

        let vfs = VirtualFileSystem::new();
        vfs.initialize(root);
        (dir, vfs)
    }

    #[test]
    fn test_index_stats() {
        let (_dir, vfs) = sample_tree();
        let stats = vfs.stats();
        assert_eq!(stats.total_files, 4);
        // common, common/data, common/shaders, common/shaders/fxl_final,
        // xbox360, xbox360/textures, misc
        assert_eq!(stats.total_directories, 7);
        assert_eq!(stats.total_bytes, 7 + 2 + 5 + 6);
    }

    #[test]
    fn test_mapped_paths() {
        let (dir, vfs) = sample_tree();
        let root = dir.path();

        assert_eq!(
            vfs.resolve("game:\\fxl_final\\gta_default.fxc"),
            Some(root.join("common/shaders/fxl_final/gta_default.fxc"))
        );
        assert_eq!(
            vfs.resolve("game:\\Data\\Default.dat"),
            Some(root.join("common/data/default.dat"))
        );
        assert_eq!(
            vfs.resolve("platform:/textures/fonts.xtd"),
            Some(root.join("xbox360/textures/fonts.xtd"))
        );
        // Extension probing on a mapped path
        assert_eq!(
            vfs.resolve("platform:/textures/fonts"),
            Some(root.join("xbox360/textures/fonts.xtd"))
        );
    }

    #[test]
    fn test_missing_mapping_target_falls_through() {
        let (dir, vfs) = sample_tree();
        let root = dir.path();
        touch(&root.join("anim/clip.dat"), b"loose");
        vfs.rebuild_index();

        // `anim` maps to xbox360/anim, which does not exist
        assert_eq!(vfs.resolve("anim/clip.dat"), Some(root.join("anim/clip.dat")));

        vfs.add_path_mapping("misc", "nowhere");
        assert!(vfs.resolve("misc/readme.txt").is_some());
    }

    #[test]
    fn test_index_is_case_insensitive() {
        let (dir, vfs) = sample_tree();
        let hit = vfs.resolve("GAME:\\misc\\readme.txt").unwrap();
        // On case-sensitive filesystems only the index can find this
        assert_eq!(fs::read(&hit).unwrap(), b"readme");
        assert!(hit.starts_with(dir.path()));
    }

    #[test]
    fn test_queries_and_stats() {
        let (_dir, vfs) = sample_tree();
        assert!(vfs.exists("game:/common/data/default.dat"));
        assert!(vfs.is_directory("game:/common/data"));
        assert_eq!(vfs.file_size("game:/common/data/default.dat"), 7);
        assert_eq!(vfs.file_size("game:/common/data"), 0);
        assert!(!vfs.exists("game:/nope.bin"));
        assert!(vfs.resolve("").is_none());

        let stats = vfs.stats();
        assert_eq!(stats.resolve_hits, 4);
        assert_eq!(stats.resolve_misses, 2);
    }

    #[test]
    fn test_mapping_table() {
        let vfs = VirtualFileSystem::new();
        vfs.initialize("/nonexistent/root");
        assert_eq!(vfs.mappings().len(), DEFAULT_MAPPINGS.len());
        vfs.add_path_mapping("dlc:", "dlc");
        assert_eq!(vfs.mappings().len(), DEFAULT_MAPPINGS.len() + 1);
        vfs.reset_path_mappings();
        assert_eq!(vfs.mappings()[0], PathMapping::new("fxl_final", "common/shaders/fxl_final"));
        assert_eq!(vfs.stats().total_files, 0);
    }

    #[test]
    fn test_uninitialized() {
        let vfs = VirtualFileSystem::new();
        assert!(vfs.resolve("common/data/default.dat").is_none());
        assert_eq!(vfs.stats(), VfsStats::default());
    }

    #[test]
    fn test_parent_segments_stay_inside_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("extracted");
        touch(&root.join("common/data/default.dat"), b"default");
        touch(&dir.path().join("secret.txt"), b"outside");
        touch(&dir.path().join("common/data/escape.dat"), b"outside");

        let vfs = VirtualFileSystem::new();
        vfs.initialize(&root);

        assert!(vfs.resolve("game:/../secret.txt").is_none());
        assert!(vfs.resolve("..\\secret.txt").is_none());
        assert!(vfs.resolve("game:\\data\\..\\..\\..\\common\\data\\escape.dat").is_none());
        assert!(vfs.resolve("game:/common/data/default.dat").is_some());
    }
}
