//! Deterministic, pure logic for the directory-access lifecycle.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! values and return deterministic outputs suitable for tests.

pub mod lifecycle;
pub mod types;
