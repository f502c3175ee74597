//! Graph-wide checks over a finished installation.

use pkgwalk_core::dependency::Dependency;
use pkgwalk_core::package::ResolvedPackage;
use pkgwalk_util::errors::{PkgError, PkgResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckOptions {
    /// Dependencies flagged `force_min_version` must be satisfied by
    /// their declared minimum, not merely by a newer version.
    pub strict: bool,
    /// Only look for duplicate ids.
    pub ignore_dependencies: bool,
}

/// Verify that `packages` form a consistent set.
///
/// Packages are checked in order and the first violation is returned.
pub fn check_consistency(packages: &[ResolvedPackage], options: CheckOptions) -> PkgResult<()> {
    for package in packages {
        let conflicting: Vec<&ResolvedPackage> = packages
            .iter()
            .filter(|other| {
                other.identity.has_id(package.id())
                    && other.identity.min_version() != package.identity.min_version()
            })
            .collect();
        if !conflicting.is_empty() {
            return Err(PkgError::MultiplePackagesFound {
                message: format!(
                    "The package with id {} is present in multiple versions.",
                    package.id()
                ),
                affected: affected(package, &conflicting),
            });
        }

        if options.ignore_dependencies {
            continue;
        }
        for dependency in &package.dependencies {
            check_dependency(package, dependency, packages, options)?;
        }
    }
    tracing::debug!("{} packages are consistent", packages.len());
    Ok(())
}

fn check_dependency(
    package: &ResolvedPackage,
    dependency: &Dependency,
    packages: &[ResolvedPackage],
    options: CheckOptions,
) -> PkgResult<()> {
    let matches: Vec<&ResolvedPackage> = packages
        .iter()
        .filter(|p| p.identity.has_id(&dependency.target.id))
        .collect();

    let candidate = match matches.as_slice() {
        [] => {
            return Err(PkgError::DependencyNotFound {
                message: format!(
                    "The dependency {dependency} of the package {} is not present.",
                    package.identity
                ),
            })
        }
        [single] => *single,
        _ => {
            return Err(PkgError::MultipleDependenciesFound {
                message: format!(
                    "The dependency {dependency} of the package {} is present multiple times.",
                    package.identity
                ),
                affected: affected(package, &matches),
            })
        }
    };

    let range = &dependency.target.range;
    if !range.satisfies(candidate.identity.min_version()) {
        return Err(PkgError::InvalidDependencyFound {
            message: format!(
                "The dependency {dependency} of the package {} is not present in a supported version: {} vs {}",
                package.identity,
                range.pretty_print(),
                candidate.identity
            ),
            affected: affected(package, &[candidate]),
        });
    }

    if options.strict && dependency.force_min_version {
        let required = range.min_version().to_string();
        let found = candidate.identity.min_version().to_string();
        if !same_minimum(&required, &found) {
            return Err(PkgError::InvalidMinVersionDependencyFound {
                message: format!(
                    "The dependency {dependency} of the package {} would satisfy the needs, but strict mode requires its minimum version: {} vs {}",
                    package.identity,
                    range.pretty_print(),
                    candidate.identity
                ),
                affected: affected(package, &[candidate]),
            });
        }
    }
    Ok(())
}

/// Whether two minimum versions differ only by zeros: removing one from the
/// other must leave nothing but dots and zeros on at least one side.
fn same_minimum(required: &str, found: &str) -> bool {
    let only_zeros = |rest: String| rest.chars().filter(|c| *c != '.').all(|c| c == '0');
    only_zeros(required.replace(found, "")) || only_zeros(found.replace(required, ""))
}

fn affected(package: &ResolvedPackage, others: &[&ResolvedPackage]) -> Vec<String> {
    std::iter::once(package)
        .chain(others.iter().copied())
        .map(|p| p.identity.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_minimums() {
        assert!(same_minimum("1.3.0", "1.3.0"));
        assert!(same_minimum("1.3.0", "1.3"));
    }

    #[test]
    fn different_minimums() {
        assert!(!same_minimum("0.0.2", "1.0.0"));
        assert!(!same_minimum("1.0.0", "1.0.0.1"));
        assert!(!same_minimum("1.0.0", "11.0.0"));
    }

    #[test]
    fn prefix_with_zero_remainder_is_accepted() {
        // "2.0.0" removed from "2.0.0.0" leaves ".0"
        assert!(same_minimum("2.0.0", "2.0.0.0"));
    }
}
