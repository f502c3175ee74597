//! Shared utilities for pkgwalk.
//!
//! Cross-cutting concerns used by the other pkgwalk crates: the unified
//! error type, filesystem helpers and terminal status output.

pub mod errors;
pub mod fs;
pub mod progress;
