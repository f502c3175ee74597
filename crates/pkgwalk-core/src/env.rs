//! Environment handling: expansion of `$VAR` references in request text, and
//! the keys of the per-package environment output map.

/// Expand `$VAR` and `${VAR}` references from the process environment.
///
/// Unknown variables are left as written.
pub fn expand(input: &str) -> String {
    shellexpand::env_with_context_no_errors(input, |name| std::env::var(name).ok()).into_owned()
}

/// Base key for a package id: dots become underscores (`A.B` → `A_B`).
pub fn package_key(id: &str) -> String {
    id.replace('.', "_")
}

pub fn version_key(id: &str) -> String {
    format!("{}_version", package_key(id))
}

pub fn framework_key(id: &str) -> String {
    format!("{}_framework", package_key(id))
}
