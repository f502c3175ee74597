//! Target platforms: parsing of folder tokens (`net472`, `netstandard2.0`,
//! `portable-net45+win8`), compatibility between a target and a candidate
//! asset platform, and selection of the nearest compatible candidate.

use std::fmt;

/// A platform version such as `4.7.2` or `2.0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlatformVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl PlatformVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Dotted (`4.5.1`) or compact (`451`, one digit per component) notation.
    fn parse(s: &str) -> Option<Self> {
        if s.is_empty() {
            return None;
        }
        let parts: Vec<u32> = if s.contains('.') {
            s.split('.')
                .map(|p| p.parse().ok())
                .collect::<Option<Vec<_>>>()?
        } else if s.bytes().all(|b| b.is_ascii_digit()) {
            s.bytes().map(|b| u32::from(b - b'0')).collect()
        } else {
            return None;
        };
        if parts.is_empty() || parts.len() > 3 {
            return None;
        }
        Some(Self::new(
            parts[0],
            parts.get(1).copied().unwrap_or(0),
            parts.get(2).copied().unwrap_or(0),
        ))
    }

    fn dotted(&self) -> String {
        if self.patch > 0 {
            format!("{}.{}.{}", self.major, self.minor, self.patch)
        } else {
            format!("{}.{}", self.major, self.minor)
        }
    }

    /// `4.7.2` → `472`, `8.0` → `8`, `8.1` → `81`.
    fn compact(&self, keep_minor: bool) -> String {
        let mut out = self.major.to_string();
        if keep_minor || self.minor > 0 || self.patch > 0 {
            out.push_str(&self.minor.to_string());
        }
        if self.patch > 0 {
            out.push_str(&self.patch.to_string());
        }
        out
    }
}

impl fmt::Display for PlatformVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dotted())
    }
}

/// A target platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Platform {
    /// Universal: assets usable on every platform.
    Any,
    NetFramework(PlatformVersion),
    NetStandard(PlatformVersion),
    NetCoreApp {
        version: PlatformVersion,
        os: Option<String>,
    },
    /// Portable class library profile, frameworks sorted and deduplicated.
    Portable(Vec<Platform>),
    Other {
        name: String,
        version: PlatformVersion,
    },
}

/// Known portable profile numbers and the frameworks they stand for.
const PORTABLE_PROFILES: &[(u32, &[&str])] = &[
    (7, &["net45", "win8"]),
    (78, &["net45", "win8", "wp8"]),
    (111, &["net45", "win8", "wpa81"]),
    (259, &["net45", "win8", "wp8", "wpa81"]),
    (328, &["net40", "sl5", "win8", "wp8", "wpa81"]),
    (344, &["net45", "sl5", "win8", "wp8", "wpa81"]),
];

/// Aliases normalized inside portable profiles.
const PORTABLE_ALIASES: &[(&str, &str)] = &[
    ("net4", "net40"),
    ("netcore45", "win8"),
    ("netcore451", "win81"),
];

impl Platform {
    /// Parse a short folder token. Unknown tokens become [`Platform::Other`].
    pub fn parse(token: &str) -> Self {
        let t = normalize_long_name(&token.trim().to_lowercase());

        if t == "any" || t.is_empty() {
            return Platform::Any;
        }
        if let Some(rest) = t.strip_prefix("portable-") {
            return Self::parse_portable(rest);
        }
        if let Some(rest) = t.strip_prefix("netstandard") {
            if let Some(version) = PlatformVersion::parse(rest) {
                return Platform::NetStandard(version);
            }
        }
        if let Some(rest) = t.strip_prefix("netcoreapp") {
            if let Some(version) = PlatformVersion::parse(rest) {
                return Platform::NetCoreApp { version, os: None };
            }
        }
        if let Some(rest) = t.strip_prefix("net") {
            let (ver, os) = match rest.split_once('-') {
                Some((v, os)) if !os.is_empty() => (v, Some(os.to_string())),
                _ => (rest, None),
            };
            if let Some(version) = PlatformVersion::parse(ver) {
                if version.major >= 5 {
                    return Platform::NetCoreApp { version, os };
                }
                if os.is_none() {
                    return Platform::NetFramework(version);
                }
            }
        }

        Self::parse_other(&t)
    }

    fn parse_portable(rest: &str) -> Self {
        if let Some(number) = rest.strip_prefix("profile") {
            if let Some((_, frameworks)) = number
                .parse::<u32>()
                .ok()
                .and_then(|n| PORTABLE_PROFILES.iter().find(|(p, _)| *p == n))
            {
                return Self::portable(frameworks.iter().map(|f| Platform::parse(f)).collect());
            }
            return Platform::Other {
                name: format!("portable-{rest}"),
                version: PlatformVersion::default(),
            };
        }

        let members = rest
            .split('+')
            .filter(|p| !p.is_empty())
            .map(|p| {
                let normalized = PORTABLE_ALIASES
                    .iter()
                    .find(|(alias, _)| *alias == p)
                    .map(|(_, name)| *name)
                    .unwrap_or(p);
                Platform::parse(normalized)
            })
            .collect();
        Self::portable(members)
    }

    fn portable(mut members: Vec<Platform>) -> Self {
        members.sort_by_key(|p| p.folder_name());
        members.dedup();
        Platform::Portable(members)
    }

    fn parse_other(token: &str) -> Self {
        let split = token
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(token.len());
        let (name, ver) = token.split_at(split);
        match PlatformVersion::parse(ver) {
            Some(version) if !name.is_empty() => Platform::Other {
                name: name.to_string(),
                version,
            },
            _ => Platform::Other {
                name: token.to_string(),
                version: PlatformVersion::default(),
            },
        }
    }

    /// Short folder token: `netstandard2.0`, `net472`, `net6.0-windows`,
    /// `portable-net45+win8`, `any`.
    pub fn folder_name(&self) -> String {
        match self {
            Platform::Any => "any".to_string(),
            Platform::NetFramework(v) => format!("net{}", v.compact(true)),
            Platform::NetStandard(v) => format!("netstandard{}", v.dotted()),
            Platform::NetCoreApp { version, os } => {
                let base = if version.major >= 5 {
                    format!("net{}", version.dotted())
                } else {
                    format!("netcoreapp{}", version.dotted())
                };
                match os {
                    Some(os) => format!("{base}-{os}"),
                    None => base,
                }
            }
            Platform::Portable(members) => {
                let names: Vec<String> = members.iter().map(Platform::folder_name).collect();
                format!("portable-{}", names.join("+"))
            }
            Platform::Other { name, version } if *version == PlatformVersion::default() => {
                name.clone()
            }
            Platform::Other { name, version } if version.major >= 10 => {
                format!("{name}{}", version.dotted())
            }
            Platform::Other { name, version } => format!("{name}{}", version.compact(false)),
        }
    }

    /// Long canonical name: `.NETStandard,Version=v2.0`, `Any,Version=v0.0`,
    /// `.NETPortable,Version=v0.0,Profile=Profile328`.
    pub fn framework_name(&self) -> String {
        match self {
            Platform::Any => "Any,Version=v0.0".to_string(),
            Platform::NetFramework(v) => format!(".NETFramework,Version=v{v}"),
            Platform::NetStandard(v) => format!(".NETStandard,Version=v{v}"),
            Platform::NetCoreApp { version, .. } => format!(".NETCoreApp,Version=v{version}"),
            Platform::Portable(members) => {
                let profile = PORTABLE_PROFILES
                    .iter()
                    .find(|(_, frameworks)| {
                        Self::portable(frameworks.iter().map(|f| Platform::parse(f)).collect())
                            == Platform::Portable(members.clone())
                    })
                    .map(|(n, _)| format!("Profile{n}"))
                    .unwrap_or_else(|| {
                        let names: Vec<String> =
                            members.iter().map(Platform::folder_name).collect();
                        names.join("+")
                    });
                format!(".NETPortable,Version=v0.0,Profile={profile}")
            }
            Platform::Other { name, version } => format!("{name},Version=v{version}"),
        }
    }

    /// The highest netstandard version this platform can consume.
    fn netstandard_support(&self) -> Option<PlatformVersion> {
        match self {
            Platform::NetCoreApp { version, .. } => Some(match version.major {
                0 | 1 => PlatformVersion::new(1, 6, 0),
                2 => PlatformVersion::new(2, 0, 0),
                _ => PlatformVersion::new(2, 1, 0),
            }),
            Platform::NetFramework(v) => {
                let supported = if *v >= PlatformVersion::new(4, 6, 1) {
                    PlatformVersion::new(2, 0, 0)
                } else if *v >= PlatformVersion::new(4, 6, 0) {
                    PlatformVersion::new(1, 3, 0)
                } else if *v >= PlatformVersion::new(4, 5, 1) {
                    PlatformVersion::new(1, 2, 0)
                } else if *v >= PlatformVersion::new(4, 5, 0) {
                    PlatformVersion::new(1, 1, 0)
                } else {
                    return None;
                };
                Some(supported)
            }
            _ => None,
        }
    }

    /// Whether assets built for `candidate` can be used on `self`.
    pub fn is_compatible(&self, candidate: &Platform) -> bool {
        match (self, candidate) {
            (_, Platform::Any) => true,
            (Platform::Portable(targets), _) => match candidate {
                Platform::Portable(members) => targets
                    .iter()
                    .all(|t| members.iter().any(|m| t.is_compatible(m))),
                _ => false,
            },
            (_, Platform::Portable(members)) => members.iter().any(|m| self.is_compatible(m)),
            (Platform::NetFramework(t), Platform::NetFramework(c)) => c <= t,
            (Platform::NetStandard(t), Platform::NetStandard(c)) => c <= t,
            (
                Platform::NetCoreApp { version: t, os: tos },
                Platform::NetCoreApp { version: c, os: cos },
            ) => c <= t && (cos.is_none() || cos == tos),
            (Platform::Other { name: tn, version: t }, Platform::Other { name: cn, version: c }) => {
                tn == cn && c <= t
            }
            (_, Platform::NetStandard(c)) => self.netstandard_support().is_some_and(|s| *c <= s),
            _ => false,
        }
    }

    fn same_family(&self, other: &Platform) -> bool {
        match (self, other) {
            (Platform::Other { name: a, .. }, Platform::Other { name: b, .. }) => a == b,
            _ => std::mem::discriminant(self) == std::mem::discriminant(other),
        }
    }

    fn version(&self) -> PlatformVersion {
        match self {
            Platform::NetFramework(v) | Platform::NetStandard(v) => *v,
            Platform::NetCoreApp { version, .. } | Platform::Other { version, .. } => *version,
            Platform::Any | Platform::Portable(_) => PlatformVersion::default(),
        }
    }

    /// Ranking key for a compatible candidate; higher is nearer.
    fn rank(&self, candidate: &Platform) -> (u8, PlatformVersion, bool, usize) {
        let portable_width = |p: &Platform| match p {
            Platform::Portable(members) => usize::MAX - members.len(),
            _ => 0,
        };
        if self == candidate {
            (5, PlatformVersion::default(), false, 0)
        } else if self.same_family(candidate) {
            let os_specific = matches!(candidate, Platform::NetCoreApp { os: Some(_), .. });
            (4, candidate.version(), os_specific, portable_width(candidate))
        } else if matches!(candidate, Platform::NetStandard(_)) {
            (3, candidate.version(), false, 0)
        } else if matches!(candidate, Platform::Portable(_)) {
            (2, PlatformVersion::default(), false, portable_width(candidate))
        } else {
            (1, PlatformVersion::default(), false, 0)
        }
    }

    /// The nearest compatible candidate, or `None` when nothing is compatible.
    /// Ties go to the earliest candidate.
    pub fn nearest<'a, I>(&self, candidates: I) -> Option<&'a Platform>
    where
        I: IntoIterator<Item = &'a Platform>,
    {
        let mut best: Option<(&'a Platform, (u8, PlatformVersion, bool, usize))> = None;
        for candidate in candidates {
            if !self.is_compatible(candidate) {
                continue;
            }
            let rank = self.rank(candidate);
            if best.as_ref().map_or(true, |(_, r)| rank > *r) {
                best = Some((candidate, rank));
            }
        }
        best.map(|(p, _)| p)
    }
}

/// Rewrite long names found in nuspec files (`.NETFramework4.5`,
/// `.NETStandard,Version=v2.0`) into folder tokens.
fn normalize_long_name(t: &str) -> String {
    let (name, version) = match t.split_once(",version=v") {
        Some((name, rest)) => (name, rest.split(',').next().unwrap_or_default()),
        None => (t, ""),
    };
    if name == "any" {
        return name.to_string();
    }
    if name == ".netportable" {
        if let Some((_, profile)) = t.split_once(",profile=") {
            return format!("portable-{profile}");
        }
    }
    let short = match name.strip_prefix('.') {
        Some(rest) => rest.strip_prefix("netframework").map_or_else(
            || rest.to_string(),
            |v| format!("net{v}"),
        ),
        None => name.to_string(),
    };
    format!("{short}{version}")
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.folder_name())
    }
}
