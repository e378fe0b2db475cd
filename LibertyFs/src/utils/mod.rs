//! Utility functions

pub mod fs;
pub mod hash;
pub mod path;

pub use fs::{default_cache_dir, write_atomic};
pub use hash::{hash_path, jenkins_one_at_a_time};
pub use path::{PathKey, normalize, strip_drive_prefix, unify_separators};
