//! Core data types for pkgwalk.
//!
//! This crate defines the values the resolver works with: package versions
//! and version ranges, package identities and dependency edges, target
//! platforms and their compatibility rules, asset groups, install requests,
//! resolved packages, the `Packages.toml` request manifest, and the global
//! configuration.
//!
//! Nothing here is async or touches the network.

pub mod asset;
pub mod config;
pub mod dependency;
pub mod env;
pub mod identity;
pub mod manifest;
pub mod package;
pub mod platform;
pub mod source;
pub mod version;
