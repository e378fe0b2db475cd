//! Payload formats found inside the containers
//!
//! - [`rsc`] - the resource header wrapping textures, models and bounds
//! - [`gxt`] - GXT2 text tables (custom text overrides from mods)

pub mod gxt;
pub mod rsc;

pub use gxt::{GxtEntry, GxtOverrides, GxtStats, parse_gxt};
pub use rsc::{RSC_HEADER_SIZE, RSC_MAGIC, ResourceHeader, resource_type};
