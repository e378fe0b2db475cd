//! Path utilities
//!
//! Guest paths arrive in console conventions (`game:\Common\Data\default.dat`)
//! while host paths use whatever the OS gives us. Every lookup table in the
//! crate is keyed by a [`PathKey`], the canonical form of either.

use std::borrow::Borrow;
use std::fmt;
use std::path::Path;

/// Canonical lookup key for a guest or archive path.
///
/// Lowercase, `/`-separated, no drive prefix, no leading or trailing
/// separators. Construction is the only way to obtain one, so every key in a
/// map is already normalized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathKey(String);

impl PathKey {
    /// Normalize `path` into a key.
    pub fn new(path: impl AsRef<str>) -> Self {
        Self(normalize(path.as_ref()))
    }

    /// Build a key from a host path relative to `base`.
    pub fn relative_to<P: AsRef<Path>, B: AsRef<Path>>(path: P, base: B) -> Option<Self> {
        path.as_ref()
            .strip_prefix(base.as_ref())
            .ok()
            .map(|rel| Self::new(rel.to_string_lossy()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Extension including the leading dot, e.g. `.wtd`.
    ///
    /// Only the last path component is considered.
    #[must_use]
    pub fn extension(&self) -> Option<&str> {
        let name = self.file_name();
        name.rfind('.').filter(|&i| i > 0).map(|i| &name[i..])
    }

    /// Last path component.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Replace the extension (given with its leading dot).
    #[must_use]
    pub fn with_extension(&self, ext: &str) -> Self {
        match self.extension() {
            Some(old) => Self(format!("{}{ext}", &self.0[..self.0.len() - old.len()])),
            None => Self(format!("{}{ext}", self.0)),
        }
    }

    /// Whether the key starts with the given normalized directory prefix.
    #[must_use]
    pub fn starts_with(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PathKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for PathKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PathKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for PathKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Full normalization: lowercase, `/` separators, leading `word:` drive
/// prefixes removed, leading and trailing `/` trimmed.
pub fn normalize(path: &str) -> String {
    let unified = unify_separators(path);
    let mut rest = unified.as_str();
    while let Some(n) = drive_prefix_len(rest) {
        rest = &rest[n..];
    }
    rest.trim_matches('/').to_string()
}

/// Lowercase and convert `\` to `/`, trimming trailing separators.
///
/// Unlike [`normalize`] this keeps any drive prefix, which the VFS mapping
/// table matches against (`platform:` aliases).
pub fn unify_separators(path: &str) -> String {
    let mut out: String = path
        .chars()
        .map(|c| if c == '\\' { '/' } else { c.to_ascii_lowercase() })
        .collect();
    while out.ends_with('/') {
        out.pop();
    }
    out
}

/// Drop everything up to and including the first `:`, then leading `/`.
///
/// Paths without a colon are returned with leading separators trimmed.
pub fn strip_drive_prefix(path: &str) -> &str {
    let rest = path.find(':').map_or(path, |i| &path[i + 1..]);
    rest.trim_start_matches('/')
}

/// Length of a leading `word:` prefix, if any.
fn drive_prefix_len(path: &str) -> Option<usize> {
    let colon = path.find(':')?;
    let word = &path[..colon];
    if !word.is_empty() && word.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Some(colon + 1)
    } else {
        None
    }
}
