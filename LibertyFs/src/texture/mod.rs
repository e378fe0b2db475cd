//! Texture container conversion between the PC and Xbox 360 builds

mod convert;
pub mod morton;

pub use convert::*;
pub use morton::{morton_decode, morton_encode};
