//! Command implementations for the `plugscout` binary.

pub(crate) mod files;
pub(crate) mod scan;

pub(crate) use files::cmd_files;
pub(crate) use scan::{cmd_scan, ScanOptions};
