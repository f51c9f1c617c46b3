//! I/O adapters behind the access manager's ports.

pub mod atomic;
pub mod config;
pub mod init;
pub mod picker;
pub mod prefs;
pub mod registry;
