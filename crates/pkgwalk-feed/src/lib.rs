//! Package feeds: the [`source::PackageSource`] trait the resolver queries,
//! local folder and HTTP flat-container implementations, nuspec parsing,
//! and package archive extraction.

pub mod archive;
pub mod download;
pub mod http;
pub mod local;
pub mod nuspec;
pub mod provider;
pub mod source;
