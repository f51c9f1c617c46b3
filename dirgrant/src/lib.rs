//! Persisted directory-access lifecycle.
//!
//! A user picks a directory once; the resulting opaque handle is made durable
//! with a permission registry and saved in a key-value preference store. Before
//! each use the saved handle is re-validated, and the user is prompted again
//! when access has lapsed. The crate is split the usual way:
//!
//! - **[`core`]**: Pure, deterministic logic (domain types, lifecycle state
//!   machine). No I/O.
//! - **[`io`]**: Side-effecting adapters (preference files, grant table,
//!   interactive picker, configuration) behind the traits the manager consumes.
//!
//! [`manager`] coordinates core logic with the injected ports and is what the
//! `dirgrant` CLI drives.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod manager;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
