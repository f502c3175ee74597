//! Operation: verify the consistency of an installed package set.

use pkgwalk_core::package::ResolvedPackage;
use pkgwalk_resolver::consistency::{check_consistency, CheckOptions};
use pkgwalk_util::progress::{status_line, StatusKind};

/// Check `packages` and report the outcome as a status line.
pub fn check(packages: &[ResolvedPackage], options: CheckOptions) -> miette::Result<()> {
    check_consistency(packages, options)?;
    let mode = if options.strict { " (strict)" } else { "" };
    status_line(
        StatusKind::Info,
        "Checked",
        &format!("{} packages are consistent{mode}", packages.len()),
    );
    Ok(())
}
