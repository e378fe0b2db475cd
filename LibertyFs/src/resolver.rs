//! The full resolution chain for a single guest read
//!
//! Mod overlay first, then replacement-folder IMG merges, then the
//! extracted tree, then the archives themselves.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::LibertyConfig;
use crate::crypto::AesKey;
use crate::formats::GxtOverrides;
use crate::img::{ImgMerger, VirtualImage};
use crate::overlay::ModOverlay;
use crate::rpf::ArchiveContainer;
use crate::utils::PathKey;
use crate::vfs::VirtualFileSystem;

/// Where a guest path is served from
#[derive(Debug, Clone)]
pub enum ResolvedFile {
    /// A file on the host filesystem
    Host(PathBuf),
    /// An entry inside a loaded RPF archive
    Archive { key: PathKey, container: PathBuf },
    /// An IMG archive merged with its replacement folder
    Image(Arc<VirtualImage>),
}

/// Owns every service and answers guest file queries.
pub struct GameFileSystem {
    config: LibertyConfig,
    overlay: ModOverlay,
    vfs: VirtualFileSystem,
    archives: ArchiveContainer,
    images: ImgMerger,
    text: Mutex<GxtOverrides>,
}

impl GameFileSystem {
    /// Build the services. Nothing touches the disk until
    /// [`initialize`](Self::initialize).
    #[must_use]
    pub fn new(config: LibertyConfig) -> Self {
        let mut overlay = ModOverlay::new();
        if let Some(dir) = &config.texture_cache_dir {
            overlay = overlay.with_texture_cache_dir(dir);
        }
        Self {
            config,
            overlay,
            vfs: VirtualFileSystem::new(),
            archives: ArchiveContainer::new(),
            images: ImgMerger::new(),
            text: Mutex::new(GxtOverrides::new()),
        }
    }

    #[must_use]
    pub fn config(&self) -> &LibertyConfig {
        &self.config
    }

    /// Discover overlays, index the extracted tree, load the key and scan
    /// for archives.
    pub fn initialize(&self) {
        self.archives.initialize();
        self.images.initialize();

        if let Some(key) = self.load_key() {
            self.archives.set_aes_key(key.clone());
            self.images.set_aes_key(key);
        }

        if let Some(root) = &self.config.game_root {
            self.overlay.initialize(root);

            let mut added = false;
            for extra in &self.config.extra_overlays {
                let path = if extra.path.is_relative() {
                    root.join(&extra.path)
                } else {
                    extra.path.clone()
                };
                match self.overlay.add_overlay(&path, extra.priority, extra.name.as_deref()) {
                    Ok(()) => added = true,
                    Err(e) => tracing::warn!("Skipping overlay {}: {e}", path.display()),
                }
            }
            if added {
                self.overlay.rebuild_index();
            }

            let loaded = self.archives.scan_for_rpf_files(root);
            tracing::info!("Loaded {loaded} archives from {}", root.display());

            let mut text = self.text.lock();
            for overlay in self.overlay.overlays().iter().filter(|o| o.enabled) {
                text.scan_overlay(&overlay.path);
            }
        } else {
            tracing::warn!("No game root configured; overlays and archives disabled");
        }

        if let Some(extracted) = self.config.extracted_root() {
            self.vfs.initialize(extracted);
        }
    }

    /// Explicit key file first, then the conventional locations.
    fn load_key(&self) -> Option<AesKey> {
        if let Some(path) = &self.config.aes_key_path {
            match AesKey::from_file(path) {
                Ok(key) => return Some(key),
                Err(e) => tracing::warn!("Ignoring key file {}: {e}", path.display()),
            }
        }
        let root = self.config.game_root.as_ref()?;
        match AesKey::find(root) {
            Some((key, path)) => {
                tracing::info!("Using AES key {}", path.display());
                Some(key)
            }
            None => {
                tracing::warn!("No AES key found; encrypted archives will not decode");
                None
            }
        }
    }

    pub fn shutdown(&self) {
        self.overlay.shutdown();
        self.vfs.shutdown();
        self.archives.shutdown();
        self.images.shutdown();
        self.text.lock().clear();
    }

    /// Locate `guest_path`.
    pub fn resolve(&self, guest_path: &str) -> Option<ResolvedFile> {
        let key = PathKey::new(guest_path);
        if key.is_empty() {
            return None;
        }

        if let Some(host) = self.overlay.resolve(key.as_str()) {
            return Some(ResolvedFile::Host(host));
        }

        if key.extension() == Some(".img") {
            if let Some(image) = self.merged_image(guest_path, &key) {
                return Some(ResolvedFile::Image(image));
            }
        }

        if let Some(host) = self.vfs.resolve(guest_path) {
            return Some(ResolvedFile::Host(host));
        }

        self.archives
            .containing_rpf(key.as_str())
            .map(|container| ResolvedFile::Archive { key, container })
    }

    /// IMG archive merged with its overlay replacement folder, if it has one.
    fn merged_image(&self, guest_path: &str, key: &PathKey) -> Option<Arc<VirtualImage>> {
        let folder = self.overlay.img_replacement_folder(key.as_str())?;
        let source = self
            .vfs
            .resolve(guest_path)
            .filter(|p| p.is_file())
            .or_else(|| self.archives.extract_to_temp(key.as_str()))?;
        self.images.virtual_img(source, folder)
    }

    /// Full contents of `guest_path`.
    pub fn read(&self, guest_path: &str) -> Option<Vec<u8>> {
        match self.resolve(guest_path)? {
            ResolvedFile::Host(path) => match fs::read(&path) {
                Ok(data) => Some(data),
                Err(e) => {
                    tracing::debug!("Failed to read {}: {e}", path.display());
                    None
                }
            },
            ResolvedFile::Archive { key, .. } => {
                self.archives.extract_file(key.as_str()).map(|f| f.data.to_vec())
            }
            ResolvedFile::Image(image) => Some(image.data.clone()),
        }
    }

    /// Size in bytes, `None` when the path does not resolve to a file.
    pub fn file_size(&self, guest_path: &str) -> Option<u64> {
        match self.resolve(guest_path)? {
            ResolvedFile::Host(path) => fs::metadata(path)
                .ok()
                .filter(fs::Metadata::is_file)
                .map(|m| m.len()),
            ResolvedFile::Archive { key, .. } => self
                .archives
                .extract_file(key.as_str())
                .map(|f| f.data.len() as u64),
            ResolvedFile::Image(image) => Some(image.len() as u64),
        }
    }

    #[must_use]
    pub fn exists(&self, guest_path: &str) -> bool {
        self.resolve(guest_path).is_some()
    }

    /// Custom text from overlay GXT tables.
    pub fn text(&self, hash: u32) -> Option<String> {
        self.text.lock().text(hash).map(str::to_string)
    }

    #[must_use]
    pub fn overlay(&self) -> &ModOverlay {
        &self.overlay
    }

    #[must_use]
    pub fn vfs(&self) -> &VirtualFileSystem {
        &self.vfs
    }

    #[must_use]
    pub fn archives(&self) -> &ArchiveContainer {
        &self.archives
    }

    #[must_use]
    pub fn images(&self) -> &ImgMerger {
        &self.images
    }

    pub fn dump_status(&self) {
        self.overlay.dump_status();
        self.vfs.dump_status();
        self.archives.dump_status();
        self.images.dump_status();
        let text = self.text.lock();
        let stats = text.stats();
        tracing::info!(
            "GXT: files={} entries={} lookups={} hits={}",
            stats.files_loaded,
            stats.entries_loaded,
            stats.lookups,
            stats.hits
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::img::{ImgFile, create_img, parse_img};
    use crate::rpf::RpfWriter;
    use std::path::Path;

    fn touch(path: &Path, data: &[u8]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, data).unwrap();
    }

    fn game(dir: &Path) -> GameFileSystem {
        let root = dir.join("game");
        touch(&root.join("update/common/data/handling.dat"), b"modded");
        touch(&root.join("extracted/common/data/handling.dat"), b"stock");
        touch(&root.join("extracted/common/data/gta.dat"), b"gta");

        let mut writer = RpfWriter::new();
        writer.add_file("common/data/archived.dat", b"from archive".to_vec());
        writer.write(root.join("common.rpf")).unwrap();

        let gfs = GameFileSystem::new(LibertyConfig {
            game_root: Some(root),
            texture_cache_dir: Some(dir.join("cache")),
            ..LibertyConfig::default()
        });
        gfs.initialize();
        gfs
    }

    #[test]
    fn test_resolution_order() {
        let dir = tempfile::tempdir().unwrap();
        let gfs = game(dir.path());

        assert_eq!(gfs.read("game:\\common\\data\\handling.dat").unwrap(), b"modded");
        assert_eq!(gfs.read("game:/common/data/gta.dat").unwrap(), b"gta");
        assert_eq!(gfs.read("common/data/archived.dat").unwrap(), b"from archive");
        assert!(matches!(
            gfs.resolve("common/data/archived.dat"),
            Some(ResolvedFile::Archive { .. })
        ));
        assert_eq!(gfs.file_size("common/data/archived.dat"), Some(12));
        assert!(!gfs.exists("common/data/missing.dat"));
        assert!(gfs.read("").is_none());
    }

    #[test]
    fn test_img_replacement_folder() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("game");
        let image = create_img(&[ImgFile::new("Banshee.wft", b"stock".to_vec())]).unwrap();
        touch(&root.join("extracted/pc/models/cdimages/vehicles.img"), &image);
        touch(&root.join("update/pc/models/cdimages/vehicles.img/banshee.wft"), b"tuned");

        let gfs = game(dir.path());
        let Some(ResolvedFile::Image(merged)) = gfs.resolve("pc/models/cdimages/vehicles.img") else {
            panic!("expected merged image");
        };
        let files = parse_img(&merged.data).unwrap();
        assert_eq!(files[0].name, "Banshee.wft");
        assert_eq!(files[0].data, b"tuned");
        assert_eq!(gfs.file_size("pc/models/cdimages/vehicles.img"), Some(merged.len() as u64));
    }

    #[test]
    fn test_shutdown_clears_services() {
        let dir = tempfile::tempdir().unwrap();
        let gfs = game(dir.path());
        gfs.shutdown();
        assert!(!gfs.overlay().is_initialized());
        assert!(!gfs.vfs().is_initialized());
        assert!(gfs.archives().loaded_rpfs().is_empty());
        assert!(!gfs.exists("common/data/gta.dat"));
    }
}
