//! CLI progress display utilities
//!
//! Step indicators with emojis and a single progress bar for extraction.

use std::time::Duration;

use console::{Emoji, style};
use indicatif::{HumanDuration, ProgressBar, ProgressStyle};

/// Magnifying glass - reading headers and tables
pub static LOOKING_GLASS: Emoji<'_, '_> = Emoji("🔍 ", "");
/// Package - archive extraction and merging
pub static ARCHIVE: Emoji<'_, '_> = Emoji("📦 ", "");
/// Floppy disk - writing output
pub static DISK: Emoji<'_, '_> = Emoji("💾 ", "");
/// Sparkles - completion
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "");
/// Link - merged images
pub static LINK: Emoji<'_, '_> = Emoji("🔗 ", "");
/// Document - loose host files
pub static DOCUMENT: Emoji<'_, '_> = Emoji("📄 ", "");
/// Picture - texture conversion
pub static PICTURE: Emoji<'_, '_> = Emoji("🖼️  ", "");

/// Print a step indicator: `[1/2] 📦 Extracting 1200 files...`
pub fn print_step(current: usize, total: usize, emoji: Emoji, msg: &str) {
    println!(
        "{} {}{}",
        style(format!("[{current}/{total}]")).bold().dim(),
        emoji,
        msg
    );
}

/// Print completion message: `✨ Done in 2s`
pub fn print_done(elapsed: Duration) {
    println!("{} Done in {}", SPARKLE, HumanDuration(elapsed));
}

/// Format: `Extracting [████████░░░░░░░░] 50% (50/100) handling.dat`
///
/// # Panics
/// Panics if the template string is invalid (this is a compile-time constant).
#[must_use]
pub fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{prefix} [{bar:40.cyan/blue}] {percent}% ({pos}/{len}) {wide_msg}")
        .expect("valid template")
}

/// Progress bar drawn to stderr
#[must_use]
pub fn simple_bar(total: u64, prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(bar_style());
    pb.set_prefix(prefix.to_string());
    pb
}
