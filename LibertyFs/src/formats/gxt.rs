//! GXT2 text tables and custom text overrides
//!
//! Layout: `u16 version (4)`, `u16 bits (16)`, followed by a sequence of
//! `{name: [u8; 4], size: u32, data}` tables. `TKEY` holds
//! `{offset: u32, hash: u32}` pairs, `TDAT` holds NUL-terminated UTF-16LE
//! strings addressed by those offsets. `TABL` and unknown tables are skipped.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::utils::jenkins_one_at_a_time;

pub const GXT2_VERSION: u16 = 4;
pub const GXT2_BITS: u16 = 16;

/// Suffixes that mark a text table as a mod override (`american_FF.gxt`).
pub const OVERRIDE_SUFFIXES: [&str; 12] = [
    "FF", "RR", "CV", "1", "2", "3", "4", "5", "6", "7", "8", "9",
];

/// One key/string pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GxtEntry {
    pub hash: u32,
    pub text: String,
}

/// Parse a GXT2 table.
///
/// Keys whose offset falls outside `TDAT` are dropped.
pub fn parse_gxt(data: &[u8]) -> Result<Vec<GxtEntry>> {
    if data.len() < 4 {
        return Err(Error::InvalidGxtHeader { version: 0, bits: 0 });
    }
    let version = u16::from_le_bytes([data[0], data[1]]);
    let bits = u16::from_le_bytes([data[2], data[3]]);
    if version != GXT2_VERSION || bits != GXT2_BITS {
        return Err(Error::InvalidGxtHeader { version, bits });
    }

    let mut keys: Vec<(u32, u32)> = Vec::new();
    let mut text: &[u8] = &[];
    let mut offset = 4;

    while offset + 8 <= data.len() {
        let name = &data[offset..offset + 4];
        let size = u32::from_le_bytes([
            data[offset + 4],
            data[offset + 5],
            data[offset + 6],
            data[offset + 7],
        ]) as usize;
        offset += 8;
        let Some(body) = data.get(offset..offset.saturating_add(size)) else {
            break;
        };

        match name {
            b"TKEY" => {
                keys = body
                    .chunks_exact(8)
                    .map(|c| {
                        (
                            u32::from_le_bytes([c[0], c[1], c[2], c[3]]),
                            u32::from_le_bytes([c[4], c[5], c[6], c[7]]),
                        )
                    })
                    .collect();
            }
            b"TDAT" => text = body,
            _ => {}
        }
        offset += size;
    }

    Ok(keys
        .into_iter()
        .filter(|&(off, _)| (off as usize) < text.len())
        .map(|(off, hash)| {
            let units: Vec<u16> = text[off as usize..]
                .chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]]))
                .take_while(|&u| u != 0)
                .collect();
            GxtEntry {
                hash,
                text: String::from_utf16_lossy(&units),
            }
        })
        .collect())
}

/// Encode entries as a GXT2 table (used for fixtures and tooling).
pub fn write_gxt(entries: &[(u32, &str)]) -> Vec<u8> {
    let mut tdat = Vec::new();
    let mut tkey = Vec::with_capacity(entries.len() * 8);
    for (hash, text) in entries {
        tkey.extend_from_slice(&(tdat.len() as u32).to_le_bytes());
        tkey.extend_from_slice(&hash.to_le_bytes());
        for unit in text.encode_utf16() {
            tdat.extend_from_slice(&unit.to_le_bytes());
        }
        tdat.extend_from_slice(&[0, 0]);
    }

    let mut out = Vec::with_capacity(4 + 16 + tkey.len() + tdat.len());
    out.extend_from_slice(&GXT2_VERSION.to_le_bytes());
    out.extend_from_slice(&GXT2_BITS.to_le_bytes());
    for (name, body) in [(b"TKEY", &tkey), (b"TDAT", &tdat)] {
        out.extend_from_slice(name);
        out.extend_from_slice(&(body.len() as u32).to_le_bytes());
        out.extend_from_slice(body);
    }
    out
}

/// Statistics for [`GxtOverrides`]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GxtStats {
    pub files_loaded: u64,
    pub entries_loaded: u64,
    pub lookups: u64,
    pub hits: u64,
}

/// Custom text entries layered over the game's own tables.
#[derive(Debug, Default)]
pub struct GxtOverrides {
    entries: HashMap<u32, String>,
    stats: GxtStats,
}

impl GxtOverrides {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load one file; later loads overwrite earlier entries with the same hash.
    ///
    /// Returns the number of entries read, or 0 if the file is unreadable or
    /// not GXT2.
    pub fn load_file(&mut self, path: &Path) -> usize {
        let parsed = fs::read(path)
            .map_err(Error::from)
            .and_then(|data| parse_gxt(&data));
        let entries = match parsed {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Failed to parse GXT file {}: {e}", path.display());
                return 0;
            }
        };

        let count = entries.len();
        for entry in entries {
            self.entries.insert(entry.hash, entry.text);
        }
        self.stats.files_loaded += 1;
        self.stats.entries_loaded += count as u64;
        tracing::info!("Loaded {count} GXT entries from {}", path.display());
        count
    }

    /// Load every override table under `<root>/common/text`.
    pub fn scan_overlay(&mut self, root: &Path) -> usize {
        let text_dir = root.join("common").join("text");
        let Ok(read_dir) = fs::read_dir(&text_dir) else {
            return 0;
        };

        let mut paths: Vec<_> = read_dir
            .filter_map(std::result::Result::ok)
            .map(|e| e.path())
            .filter(|p| p.is_file() && is_override_table(p))
            .collect();
        paths.sort();

        paths.iter().map(|p| self.load_file(p)).sum()
    }

    pub fn text(&mut self, hash: u32) -> Option<&str> {
        self.stats.lookups += 1;
        let found = self.entries.get(&hash);
        if found.is_some() {
            self.stats.hits += 1;
        }
        found.map(String::as_str)
    }

    pub fn text_by_key(&mut self, key: &str) -> Option<&str> {
        self.text(jenkins_one_at_a_time(key))
    }

    pub fn entries(&self) -> &HashMap<u32, String> {
        &self.entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> &GxtStats {
        &self.stats
    }
}

fn is_override_table(path: &Path) -> bool {
    let is_gxt = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("gxt"));
    if !is_gxt {
        return false;
    }
    let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
        return false;
    };
    OVERRIDE_SUFFIXES.iter().any(|suffix| {
        stem.len() > suffix.len() + 1
            && stem.ends_with(suffix)
            && stem[..stem.len() - suffix.len()].ends_with('_')
    })
}
