//! Texture resource commands

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::cli::progress::PICTURE;
use crate::formats::ResourceHeader;
use crate::texture::{Platform, convert_to, counterpart_extension, detect_platform, detect_platform_from_header};

pub fn detect(sources: &[PathBuf]) -> anyhow::Result<()> {
    for source in sources {
        let data = fs::read(source).with_context(|| format!("Failed to read {}", source.display()))?;
        let by_header = detect_platform_from_header(&data);
        let by_name = detect_platform(source);

        let mut line = format!("{}: {}", source.display(), by_header.as_str());
        if by_name != by_header {
            line.push_str(&format!(" (extension says {})", by_name.as_str()));
        }
        if let Some(header) = ResourceHeader::parse_any_order(&data) {
            line.push_str(&format!(
                ", type {}, cpu {} gpu {}",
                header.resource_type,
                header.cpu_size(),
                header.gpu_size()
            ));
        }
        println!("{line}");
    }
    Ok(())
}

/// Output path with the extension swapped for the target platform.
fn default_destination(source: &Path) -> Option<PathBuf> {
    let ext = source.extension()?.to_string_lossy();
    let counterpart = counterpart_extension(&format!(".{ext}"))?;
    Some(source.with_extension(counterpart.trim_start_matches('.')))
}

pub fn convert(source: &Path, destination: Option<&Path>, target: Platform) -> anyhow::Result<()> {
    let data = fs::read(source).with_context(|| format!("Failed to read {}", source.display()))?;
    let from = detect_platform_from_header(&data);

    let destination = match destination {
        Some(d) => d.to_path_buf(),
        None => default_destination(source)
            .with_context(|| format!("No counterpart extension for {}; pass a destination", source.display()))?,
    };

    let converted = convert_to(&data, target)?;
    fs::write(&destination, &converted).with_context(|| format!("Failed to write {}", destination.display()))?;

    println!(
        "{}{} -> {} ({} to {})",
        PICTURE,
        source.display(),
        destination.display(),
        from.as_str(),
        target.as_str()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_destination() {
        assert_eq!(
            default_destination(Path::new("mods/vehicles.wtd")),
            Some(PathBuf::from("mods/vehicles.xtd"))
        );
        assert_eq!(
            default_destination(Path::new("cache/player.XTD")),
            Some(PathBuf::from("cache/player.wtd"))
        );
        assert_eq!(default_destination(Path::new("readme.txt")), None);
    }
}
