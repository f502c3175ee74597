use std::path::Path;

use pkgwalk_util::errors::{PkgError, PkgResult};
use url::Url;

/// Interpret a source string as a URL.
///
/// Environment references are expanded first. Absolute or relative
/// filesystem paths become `file://` directory URLs (relative ones are
/// resolved against `base`).
pub fn parse_source(source: &str, base: &Path) -> PkgResult<Url> {
    let expanded = crate::env::expand(source);
    let s = expanded.trim();
    if s.is_empty() {
        return Err(PkgError::InvalidSource {
            source_uri: source.to_string(),
            message: "a package source is mandatory".to_string(),
        });
    }

    if s.contains("://") {
        return Url::parse(s).map_err(|e| PkgError::InvalidSource {
            source_uri: s.to_string(),
            message: e.to_string(),
        });
    }

    let path = Path::new(s);
    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };
    Url::from_directory_path(&path).map_err(|()| PkgError::InvalidSource {
        source_uri: s.to_string(),
        message: format!("'{}' is not a valid directory path", path.display()),
    })
}

/// Same URL ignoring a trailing slash and letter case.
pub fn same_source(a: &Url, b: &Url) -> bool {
    a.as_str().trim_end_matches('/').eq_ignore_ascii_case(b.as_str().trim_end_matches('/'))
}
