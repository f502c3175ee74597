use miette::Diagnostic;
use thiserror::Error;

/// Unified error type for all pkgwalk operations.
#[derive(Debug, Error, Diagnostic)]
pub enum PkgError {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A version or version range string could not be interpreted.
    #[error("Malformed version range '{range}': {reason}")]
    #[diagnostic(help("Use a bare version (1.2.0), an exact range ([1.2.0]) or an interval ([1.0, 2.0))"))]
    MalformedVersionRange { range: String, reason: String },

    /// The root package is absent from every configured source.
    #[error("Package {package} not found in any of the provided sources: {sources}")]
    #[diagnostic(help("Check the package id, the version and the source list"))]
    PackageNotFound { package: String, sources: String },

    /// A transitive dependency is absent from every configured source
    /// (resolution), or from the installed set (consistency check).
    #[error("{message}")]
    DependencyNotFound { message: String },

    /// No asset group of the package is compatible with the requested platform.
    #[error("Target framework not found: {message}")]
    TargetFrameworkNotFound { message: String },

    /// A root package was served by a different source than the one requested for it.
    #[error("Possible dependency confusion: {package} was found in {found} instead of the required source {requested}")]
    #[diagnostic(help("Update the package source if this is intended"))]
    DependencyConfusion {
        package: String,
        requested: String,
        found: String,
    },

    /// The same package id is present in more than one version.
    #[error("{message}\n\nAffected packages:\n{}", .affected.join("\n"))]
    MultiplePackagesFound {
        message: String,
        affected: Vec<String>,
    },

    /// A dependency edge matches more than one installed package.
    #[error("{message}\n\nAffected packages:\n{}", .affected.join("\n"))]
    MultipleDependenciesFound {
        message: String,
        affected: Vec<String>,
    },

    /// The installed dependency does not satisfy the declared range.
    #[error("{message}\n\nAffected packages:\n{}", .affected.join("\n"))]
    InvalidDependencyFound {
        message: String,
        affected: Vec<String>,
    },

    /// Strict mode: the installed dependency is not the declared minimum version.
    #[error("{message}\n\nAffected packages:\n{}", .affected.join("\n"))]
    InvalidMinVersionDependencyFound {
        message: String,
        affected: Vec<String>,
    },

    /// The content path of a materialized package does not exist.
    #[error("Invalid assembly path for {package}: '{path}'")]
    InvalidAssemblyPath { package: String, path: String },

    /// Installing a root package (or one of its dependencies) failed.
    #[error("Unable to install package {package} or one of its dependencies")]
    PackageInstallationFailed {
        package: String,
        #[source]
        cause: Box<PkgError>,
    },

    /// A package source failed in a way that must abort resolution.
    #[error("Fatal error while fetching {package} from {source_uri}: {message}")]
    #[diagnostic(help("Please check your internet/VPN connection"))]
    SourceFatal {
        package: String,
        source_uri: String,
        message: String,
    },

    /// A package source could not answer; resolution moves on to the next source.
    #[error("Unable to fetch {package} from {source_uri}: {message}")]
    SourceUnavailable {
        package: String,
        source_uri: String,
        message: String,
    },

    /// A source string is not a valid URL or path.
    #[error("Invalid source '{source_uri}': {message}")]
    InvalidSource { source_uri: String, message: String },

    /// Reading or extracting a package archive failed.
    #[error("Archive error: {message}")]
    Archive { message: String },

    /// Network request or download failed.
    #[error("Network error: {message}")]
    Network { message: String },

    /// Invalid or malformed request manifest (e.g. Packages.toml).
    #[error("Manifest error: {message}")]
    #[diagnostic(help("Check your Packages.toml for syntax errors"))]
    Manifest { message: String },

    /// Invalid global configuration.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// The task installing a root package ended abnormally (panic or abort).
    #[error("Installation worker failed: {message}")]
    WorkerFailed { message: String },

    /// The resolution session was cancelled.
    #[error("Operation cancelled")]
    Cancelled,
}

impl PkgError {
    /// The innermost cause, looking through `PackageInstallationFailed` wrappers.
    pub fn root_cause(&self) -> &PkgError {
        match self {
            PkgError::PackageInstallationFailed { cause, .. } => cause.root_cause(),
            other => other,
        }
    }
}

/// Convenience alias for results carrying a [`PkgError`].
pub type PkgResult<T> = std::result::Result<T, PkgError>;
