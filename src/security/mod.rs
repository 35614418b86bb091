//! Security utilities for PlugScout
//!
//! Keeps every file access made through a plugin view inside the plugin's
//! own directory.

pub mod path;

pub use path::{resolve_in_dir, SafePath};
