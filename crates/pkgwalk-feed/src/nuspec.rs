//! Nuspec parsing: package id, version and dependency groups.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use pkgwalk_core::dependency::PackageDependency;
use pkgwalk_core::platform::Platform;
use pkgwalk_core::version::{PackageVersion, VersionRange};
use pkgwalk_util::errors::{PkgError, PkgResult};

/// A parsed `.nuspec` manifest.
#[derive(Debug, Clone)]
pub struct Nuspec {
    pub id: String,
    pub version: PackageVersion,
    pub dependency_groups: Vec<DependencyGroup>,
}

/// Dependencies declared for one target platform.
#[derive(Debug, Clone)]
pub struct DependencyGroup {
    pub platform: Platform,
    pub dependencies: Vec<PackageDependency>,
}

impl Nuspec {
    /// Dependencies of the group nearest to `platform`; empty when no group
    /// is compatible.
    pub fn dependencies_for(&self, platform: &Platform) -> Vec<PackageDependency> {
        let Some(nearest) = platform.nearest(self.dependency_groups.iter().map(|g| &g.platform))
        else {
            return Vec::new();
        };
        self.dependency_groups
            .iter()
            .find(|g| &g.platform == nearest)
            .map(|g| g.dependencies.clone())
            .unwrap_or_default()
    }
}

/// Parse nuspec XML.
pub fn parse_nuspec(xml: &str) -> PkgResult<Nuspec> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut path: Vec<String> = Vec::new();
    let mut text_buf = String::new();
    let mut id = None;
    let mut version = None;
    let mut groups: Vec<DependencyGroup> = Vec::new();
    let mut current_group: Option<DependencyGroup> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let tag = local_name(e);
                path.push(tag);
                text_buf.clear();
                if path_context(&path) == "package>metadata>dependencies>group" {
                    current_group = Some(open_group(e)?);
                }
            }
            Ok(Event::Empty(ref e)) => {
                path.push(local_name(e));
                match path_context(&path).as_str() {
                    "package>metadata>dependencies>group" => groups.push(open_group(e)?),
                    "package>metadata>dependencies>group>dependency" => {
                        if let Some(group) = current_group.as_mut() {
                            group.dependencies.push(parse_dependency(e)?);
                        }
                    }
                    "package>metadata>dependencies>dependency" => {
                        let dependency = parse_dependency(e)?;
                        match groups.iter_mut().find(|g| g.platform == Platform::Any) {
                            Some(group) => group.dependencies.push(dependency),
                            None => groups.push(DependencyGroup {
                                platform: Platform::Any,
                                dependencies: vec![dependency],
                            }),
                        }
                    }
                    _ => {}
                }
                path.pop();
            }
            Ok(Event::Text(ref e)) => {
                text_buf = e.unescape().unwrap_or_default().to_string();
            }
            Ok(Event::End(_)) => {
                match path_context(&path).as_str() {
                    "package>metadata>id" => id = Some(text_buf.trim().to_string()),
                    "package>metadata>version" => {
                        version = Some(PackageVersion::parse(text_buf.trim())?);
                    }
                    "package>metadata>dependencies>group" => {
                        if let Some(group) = current_group.take() {
                            groups.push(group);
                        }
                    }
                    _ => {}
                }
                text_buf.clear();
                path.pop();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(PkgError::Manifest {
                    message: format!(
                        "Invalid nuspec XML at position {}: {e}",
                        reader.error_position()
                    ),
                });
            }
            _ => {}
        }
    }

    let missing = |field: &str| PkgError::Manifest {
        message: format!("Nuspec is missing metadata/{field}"),
    };
    Ok(Nuspec {
        id: id.filter(|s| !s.is_empty()).ok_or_else(|| missing("id"))?,
        version: version.ok_or_else(|| missing("version"))?,
        dependency_groups: groups,
    })
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).to_string()
}

fn attribute(e: &BytesStart<'_>, name: &str) -> PkgResult<Option<String>> {
    for attr in e.attributes() {
        let attr = attr.map_err(|err| PkgError::Manifest {
            message: format!("Invalid nuspec attribute: {err}"),
        })?;
        if attr.key.local_name().as_ref() == name.as_bytes() {
            let value = attr.unescape_value().map_err(|err| PkgError::Manifest {
                message: format!("Invalid nuspec attribute value: {err}"),
            })?;
            return Ok(Some(value.trim().to_string()));
        }
    }
    Ok(None)
}

fn open_group(e: &BytesStart<'_>) -> PkgResult<DependencyGroup> {
    let platform = attribute(e, "targetFramework")?
        .filter(|s| !s.is_empty())
        .map(|s| Platform::parse(&s))
        .unwrap_or(Platform::Any);
    Ok(DependencyGroup {
        platform,
        dependencies: Vec::new(),
    })
}

fn parse_dependency(e: &BytesStart<'_>) -> PkgResult<PackageDependency> {
    let id = attribute(e, "id")?
        .filter(|s| !s.is_empty())
        .ok_or_else(|| PkgError::Manifest {
            message: "Nuspec dependency without an id".to_string(),
        })?;
    let range = match attribute(e, "version")?.filter(|s| !s.is_empty()) {
        Some(text) => VersionRange::parse(&text)?,
        None => VersionRange::at_least(PackageVersion::zero()),
    };
    Ok(PackageDependency::new(&id, range))
}

/// Build a context string from the current XML path for matching.
fn path_context(path: &[String]) -> String {
    path.join(">")
}
