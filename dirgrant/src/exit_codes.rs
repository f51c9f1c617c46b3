//! Stable exit codes for dirgrant CLI commands.

/// Command succeeded and a usable directory is available (or nothing was asked).
pub const OK: i32 = 0;
/// Command failed due to invalid config/state or other errors.
pub const INVALID: i32 = 1;
/// No directory is saved, or the prompt was dismissed.
pub const NO_DIRECTORY: i32 = 2;
/// The saved directory lost read or write access: reported by `check`, and by
/// `show` when the re-prompt is dismissed.
pub const LAPSED: i32 = 3;
