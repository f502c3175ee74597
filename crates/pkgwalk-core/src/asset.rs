use std::collections::BTreeMap;
use std::fmt;

use crate::platform::Platform;

/// The kind of content a package contributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AssetKind {
    /// Runtime assemblies under `lib/`.
    ImplementationAssembly,
    /// Reference assemblies under `ref/`.
    CompileTimeAssembly,
    /// Untyped content; no platform resolution.
    Opaque,
}

impl AssetKind {
    /// Kinds with platform-specific folders, in selection order.
    pub const TYPED: [AssetKind; 2] = [AssetKind::ImplementationAssembly, AssetKind::CompileTimeAssembly];

    /// Top-level archive folder of this kind, if it has one.
    pub fn folder(&self) -> Option<&'static str> {
        match self {
            AssetKind::ImplementationAssembly => Some("lib"),
            AssetKind::CompileTimeAssembly => Some("ref"),
            AssetKind::Opaque => None,
        }
    }

    fn from_folder(folder: &str) -> Option<Self> {
        Self::TYPED
            .into_iter()
            .find(|k| k.folder().is_some_and(|f| f.eq_ignore_ascii_case(folder)))
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetKind::ImplementationAssembly => f.write_str("implementation"),
            AssetKind::CompileTimeAssembly => f.write_str("compile-time"),
            AssetKind::Opaque => f.write_str("opaque"),
        }
    }
}

/// Items of one kind built for one platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetGroup {
    pub platform: Platform,
    pub items: Vec<String>,
}

/// A package's asset groups by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetGroups {
    groups: BTreeMap<AssetKind, Vec<AssetGroup>>,
}

impl AssetGroups {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build groups from archive entry paths (`lib/net45/Foo.dll`).
    ///
    /// Files directly under `lib/` or `ref/` form an `any` group. Entries
    /// outside the typed folders are ignored. Groups keep first-seen order.
    pub fn from_entries<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut out = Self::new();
        for entry in entries {
            let entry = entry.replace('\\', "/");
            if entry.ends_with('/') {
                continue;
            }
            let parts: Vec<&str> = entry.split('/').collect();
            let Some(kind) = parts.first().and_then(|f| AssetKind::from_folder(f)) else {
                continue;
            };
            let platform = match parts.len() {
                2 => Platform::Any,
                n if n > 2 => Platform::parse(parts[1]),
                _ => continue,
            };
            out.push(kind, platform, entry.clone());
        }
        out
    }

    /// Add one item, creating its group when missing.
    pub fn push(&mut self, kind: AssetKind, platform: Platform, item: String) {
        let groups = self.groups.entry(kind).or_default();
        match groups.iter_mut().find(|g| g.platform == platform) {
            Some(group) => group.items.push(item),
            None => groups.push(AssetGroup {
                platform,
                items: vec![item],
            }),
        }
    }

    /// Groups of one kind; empty when the package has none.
    pub fn get(&self, kind: AssetKind) -> &[AssetGroup] {
        self.groups.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// True when no kind has any group (a collector package).
    pub fn is_empty(&self) -> bool {
        self.groups.values().all(Vec::is_empty)
    }
}
