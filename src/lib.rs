//! PlugScout - plugin bundle discovery

pub mod config;
pub mod error;
pub mod plugins;
pub mod security;

pub use config::ScoutConfig;
pub use error::{Result, ScoutError};
