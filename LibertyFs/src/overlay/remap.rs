//! FusionFix folder conventions
//!
//! Mods are authored against these directory names, so both the probe list
//! and the remap table are fixed.

/// Overlay roots probed under the game directory, highest priority first.
pub const PROBE_PATHS: [(&str, i32); 5] = [
    ("mods/update", 100),
    ("update", 50),
    ("GTAIV.EFLC.FusionFix/update", 40),
    ("plugins/update", 30),
    ("mods", 20),
];

/// Child directories that mark an overlay as a FusionFix update folder.
pub const FUSIONFIX_MARKERS: [&str; 5] = ["common", "pc", "TLAD", "TBoGT", "GTAIV.EFLC.FusionFix"];

const FUSIONFIX_DIR: &str = "gtaiv.eflc.fusionfix/";

/// Map an overlay-relative key onto the game path it replaces.
///
/// Episode folders move under `dlc/`, FusionFix's own data folders move to
/// the game's shader and asset roots, and one redundant `update/` is
/// dropped. Input is expected to be normalized already.
#[must_use]
pub fn map_fusionfix_path(key: &str) -> String {
    let mut result = if key.starts_with("tlad/") || key.starts_with("tbogt/") {
        format!("dlc/{key}")
    } else {
        key.to_string()
    };

    if let Some(sub) = result.strip_prefix(FUSIONFIX_DIR) {
        if sub.starts_with("shaders/") {
            result = format!("common/{sub}");
        } else if sub.starts_with("textures/") || sub.starts_with("models/") {
            result = format!("xbox360/{sub}");
        }
    }

    match result.strip_prefix("update/") {
        Some(rest) => rest.to_string(),
        None => result,
    }
}
