//! Filesystem helpers for the on-disk caches

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::Result;

/// Write `data` to `path` through a temporary file in the same directory,
/// so concurrent readers never see a partial file.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// `<temp>/LibertyFs/<name>`
#[must_use]
pub fn default_cache_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join("LibertyFs").join(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_atomic_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a/b/c.bin");
        write_atomic(&target, b"abc").unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"abc");

        write_atomic(&target, b"xyz").unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"xyz");
    }
}
