//! Package version parsing, comparison, and range matching.
//!
//! Versions have up to four numeric components plus an optional prerelease
//! label and build metadata: `1.2.3.4-beta.2+sha.5114f85`.
//! - Missing numeric components are zero, so `1.3` and `1.3.0` are equal
//! - A release sorts after every prerelease of the same numbers
//! - Prerelease identifiers compare numerically when both are numbers,
//!   otherwise case-insensitively; numbers sort before text
//! - Build metadata never takes part in comparisons

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use pkgwalk_util::errors::{PkgError, PkgResult};

/// A parsed package version.
#[derive(Debug, Clone)]
pub struct PackageVersion {
    original: String,
    numbers: [u64; 4],
    release: Vec<String>,
    metadata: Option<String>,
}

impl PackageVersion {
    /// Build a release version from its first three components.
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            original: format!("{major}.{minor}.{patch}"),
            numbers: [major, minor, patch, 0],
            release: Vec::new(),
            metadata: None,
        }
    }

    /// `0.0.0`, the implicit minimum of ranges without a lower bound.
    pub fn zero() -> Self {
        Self::new(0, 0, 0)
    }

    pub fn parse(version: &str) -> PkgResult<Self> {
        let malformed = |reason: &str| PkgError::MalformedVersionRange {
            range: version.to_string(),
            reason: reason.to_string(),
        };

        let s = version.trim();
        if s.is_empty() {
            return Err(malformed("empty version"));
        }

        let (rest, metadata) = match s.split_once('+') {
            Some((r, m)) if !m.is_empty() => (r, Some(m.to_string())),
            Some(_) => return Err(malformed("empty build metadata")),
            None => (s, None),
        };

        let (numeric, release) = match rest.split_once('-') {
            Some((n, r)) => (n, Some(r)),
            None => (rest, None),
        };

        let parts: Vec<&str> = numeric.split('.').collect();
        if parts.len() > 4 {
            return Err(malformed("more than four numeric components"));
        }
        let mut numbers = [0u64; 4];
        for (i, part) in parts.iter().enumerate() {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(malformed("numeric components must be non-negative integers"));
            }
            numbers[i] = part
                .parse()
                .map_err(|_| malformed("numeric component out of range"))?;
        }

        let release = match release {
            Some(label) => {
                let idents: Vec<String> = label.split('.').map(str::to_string).collect();
                let valid = idents.iter().all(|id| {
                    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
                });
                if !valid {
                    return Err(malformed("invalid prerelease label"));
                }
                idents
            }
            None => Vec::new(),
        };

        Ok(Self {
            original: s.to_string(),
            numbers,
            release,
            metadata,
        })
    }

    pub fn major(&self) -> u64 {
        self.numbers[0]
    }

    pub fn minor(&self) -> u64 {
        self.numbers[1]
    }

    pub fn patch(&self) -> u64 {
        self.numbers[2]
    }

    pub fn revision(&self) -> u64 {
        self.numbers[3]
    }

    /// The text this version was parsed from.
    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn is_prerelease(&self) -> bool {
        !self.release.is_empty()
    }

    pub fn metadata(&self) -> Option<&str> {
        self.metadata.as_deref()
    }

    /// Canonical text: `major.minor.patch`, `.revision` only when non-zero,
    /// then the prerelease label. Metadata is dropped.
    pub fn normalized(&self) -> String {
        let [major, minor, patch, revision] = self.numbers;
        let mut out = format!("{major}.{minor}.{patch}");
        if revision > 0 {
            out.push_str(&format!(".{revision}"));
        }
        if !self.release.is_empty() {
            out.push('-');
            out.push_str(&self.release.join("."));
        }
        out
    }
}

impl FromStr for PackageVersion {
    type Err = PkgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.normalized())
    }
}

impl PartialEq for PackageVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PackageVersion {}

impl Hash for PackageVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.numbers.hash(state);
        for id in &self.release {
            id.to_lowercase().hash(state);
        }
    }
}

impl Ord for PackageVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.numbers
            .cmp(&other.numbers)
            .then_with(|| compare_release(&self.release, &other.release))
    }
}

impl PartialOrd for PackageVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn compare_release(a: &[String], b: &[String]) -> Ordering {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        (false, false) => {}
    }
    for (x, y) in a.iter().zip(b) {
        let ord = compare_identifiers(x, y);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

fn compare_identifiers(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.to_lowercase().cmp(&b.to_lowercase()),
    }
}

/// A version range expression.
///
/// Supports: `1.0` (minimum, inclusive), `[1.0]` (exact), `[1.0,2.0)`,
/// `(1.0,)`, `(,2.0]`.
#[derive(Debug, Clone)]
pub struct VersionRange {
    original: String,
    pub lower: Option<Bound>,
    pub upper: Option<Bound>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bound {
    pub version: PackageVersion,
    pub inclusive: bool,
}

impl VersionRange {
    /// Parse a range string. Floating ranges (`1.*`) are not supported.
    pub fn parse(spec: &str) -> PkgResult<Self> {
        let malformed = |reason: &str| PkgError::MalformedVersionRange {
            range: spec.to_string(),
            reason: reason.to_string(),
        };
        let bound = |text: &str, inclusive: bool| -> PkgResult<Bound> {
            Ok(Bound {
                version: PackageVersion::parse(text).map_err(|_| {
                    malformed(&format!("'{text}' is not a valid version"))
                })?,
                inclusive,
            })
        };

        let s = spec.trim();
        if s.is_empty() {
            return Err(malformed("empty version range"));
        }
        if s.contains('*') {
            return Err(malformed("floating versions are not supported"));
        }

        if !s.starts_with('[') && !s.starts_with('(') {
            if s.ends_with(']') || s.ends_with(')') {
                return Err(malformed("missing opening bracket"));
            }
            return Ok(Self {
                original: spec.to_string(),
                lower: Some(bound(s, true)?),
                upper: None,
            });
        }

        if s.len() < 2 || !(s.ends_with(']') || s.ends_with(')')) {
            return Err(malformed("missing closing bracket"));
        }
        let open_inclusive = s.starts_with('[');
        let close_inclusive = s.ends_with(']');
        let inner = &s[1..s.len() - 1];

        let range = if let Some((lower, upper)) = inner.split_once(',') {
            let lower = lower.trim();
            let upper = upper.trim();
            if lower.is_empty() && upper.is_empty() {
                return Err(malformed("a range needs at least one bound"));
            }
            if upper.contains(',') {
                return Err(malformed("too many commas"));
            }
            Self {
                original: spec.to_string(),
                lower: if lower.is_empty() {
                    None
                } else {
                    Some(bound(lower, open_inclusive)?)
                },
                upper: if upper.is_empty() {
                    None
                } else {
                    Some(bound(upper, close_inclusive)?)
                },
            }
        } else {
            if !open_inclusive || !close_inclusive {
                return Err(malformed("an exact version must use [ and ]"));
            }
            let exact = bound(inner.trim(), true)?;
            Self {
                original: spec.to_string(),
                lower: Some(exact.clone()),
                upper: Some(exact),
            }
        };

        if let (Some(lower), Some(upper)) = (&range.lower, &range.upper) {
            match lower.version.cmp(&upper.version) {
                Ordering::Greater => return Err(malformed("lower bound above upper bound")),
                Ordering::Equal if !(lower.inclusive && upper.inclusive) => {
                    return Err(malformed("empty range"));
                }
                _ => {}
            }
        }

        Ok(range)
    }

    /// `>= version`, with no upper bound.
    pub fn at_least(version: PackageVersion) -> Self {
        Self {
            original: version.original().to_string(),
            lower: Some(Bound {
                version,
                inclusive: true,
            }),
            upper: None,
        }
    }

    /// The text this range was parsed from.
    pub fn original(&self) -> &str {
        &self.original
    }

    /// The lower bound version, or `0.0.0` when the range has none.
    pub fn min_version(&self) -> PackageVersion {
        self.lower
            .as_ref()
            .map(|b| b.version.clone())
            .unwrap_or_else(PackageVersion::zero)
    }

    /// Check if a version satisfies this range.
    pub fn satisfies(&self, version: &PackageVersion) -> bool {
        if let Some(ref lower) = self.lower {
            let cmp = version.cmp(&lower.version);
            if lower.inclusive {
                if cmp == Ordering::Less {
                    return false;
                }
            } else if cmp != Ordering::Greater {
                return false;
            }
        }
        if let Some(ref upper) = self.upper {
            let cmp = version.cmp(&upper.version);
            if upper.inclusive {
                if cmp == Ordering::Greater {
                    return false;
                }
            } else if cmp != Ordering::Less {
                return false;
            }
        }
        true
    }

    /// Human readable form used in diagnostics: `(>= 1.0.0 && < 2.0.0)`.
    pub fn pretty_print(&self) -> String {
        let op = |b: &Bound, incl: &'static str, excl: &'static str| {
            format!("{} {}", if b.inclusive { incl } else { excl }, b.version)
        };
        match (&self.lower, &self.upper) {
            (Some(l), Some(u)) if l.version == u.version => format!("(= {})", l.version),
            (Some(l), Some(u)) => format!("({} && {})", op(l, ">=", ">"), op(u, "<=", "<")),
            (Some(l), None) => format!("({})", op(l, ">=", ">")),
            (None, Some(u)) => format!("({})", op(u, "<=", "<")),
            (None, None) => "(all)".to_string(),
        }
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.lower, &self.upper) {
            (Some(l), Some(u)) if l.version == u.version => write!(f, "[{}]", l.version),
            _ => {
                let open = match &self.lower {
                    Some(l) if l.inclusive => "[",
                    _ => "(",
                };
                let close = match &self.upper {
                    Some(u) if u.inclusive => "]",
                    _ => ")",
                };
                let lower = self.lower.as_ref().map(|b| b.version.to_string());
                let upper = self.upper.as_ref().map(|b| b.version.to_string());
                write!(
                    f,
                    "{open}{}, {}{close}",
                    lower.unwrap_or_default(),
                    upper.unwrap_or_default()
                )
            }
        }
    }
}
