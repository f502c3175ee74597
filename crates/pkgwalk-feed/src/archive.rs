//! Package archives (`.nupkg`): reading the embedded nuspec and entry list,
//! and extraction into a package directory.

use std::fs;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

use pkgwalk_core::asset::AssetGroups;
use pkgwalk_util::errors::{PkgError, PkgResult};

use crate::nuspec::{parse_nuspec, Nuspec};

/// Manifest and content listing of a package archive.
#[derive(Debug, Clone)]
pub struct PackageArchive {
    pub path: PathBuf,
    pub nuspec: Nuspec,
    /// Decoded entry names, packaging metadata excluded.
    pub entries: Vec<String>,
}

impl PackageArchive {
    pub fn asset_groups(&self) -> AssetGroups {
        AssetGroups::from_entries(self.entries.iter().map(String::as_str))
    }
}

/// Entry names are stored percent-encoded (`portable-net45%2Bwin8`).
fn decode_entry_name(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

/// Packaging bookkeeping that is neither content nor manifest.
fn is_packaging_metadata(name: &str) -> bool {
    name.starts_with("_rels/") || name.starts_with("package/") || name == "[Content_Types].xml"
}

fn is_root_nuspec(name: &str) -> bool {
    !name.contains('/') && name.to_lowercase().ends_with(".nuspec")
}

fn open(path: &Path) -> PkgResult<zip::ZipArchive<fs::File>> {
    let file = fs::File::open(path)?;
    zip::ZipArchive::new(file).map_err(|e| PkgError::Archive {
        message: format!("Failed to open {}: {e}", path.display()),
    })
}

/// Read the nuspec and the content entry names of an archive.
pub fn read_package(path: &Path) -> PkgResult<PackageArchive> {
    let mut archive = open(path)?;

    let mut entries = Vec::new();
    let mut nuspec_xml = None;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| PkgError::Archive {
            message: format!("Zip entry error in {}: {e}", path.display()),
        })?;
        let name = decode_entry_name(entry.name());
        if is_packaging_metadata(&name) {
            continue;
        }
        if is_root_nuspec(&name) {
            let mut xml = String::new();
            entry
                .read_to_string(&mut xml)
                .map_err(|e| PkgError::Archive {
                    message: format!("Failed to read {name}: {e}"),
                })?;
            nuspec_xml = Some(xml);
            continue;
        }
        if !entry.is_dir() {
            entries.push(name);
        }
    }

    let xml = nuspec_xml.ok_or_else(|| PkgError::Archive {
        message: format!("{} does not contain a nuspec manifest", path.display()),
    })?;

    Ok(PackageArchive {
        path: path.to_path_buf(),
        nuspec: parse_nuspec(&xml)?,
        entries,
    })
}

/// Relative path of a decoded entry name, or `None` if it would leave the
/// extraction directory.
fn entry_path(name: &str) -> Option<PathBuf> {
    let path = Path::new(name);
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        .then(|| path.to_path_buf())
}

/// Extract a package archive to `dest`, skipping packaging metadata.
///
/// Entries are written to a sibling `.part` directory that is renamed to
/// `dest` once every entry is out, so `dest` is either complete or absent.
/// An entry whose decoded name escapes `dest` fails the whole extraction.
pub fn extract_package(archive_path: &Path, dest: &Path) -> PkgResult<()> {
    let staging = staging_dir(dest);
    if staging.exists() {
        fs::remove_dir_all(&staging)?;
    }
    let result = extract_entries(archive_path, &staging).and_then(|()| {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(&staging, dest)?;
        Ok(())
    });
    if result.is_err() && staging.exists() {
        if let Err(e) = fs::remove_dir_all(&staging) {
            tracing::warn!("Failed to clean up {}: {e}", staging.display());
        }
    }
    result
}

fn staging_dir(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

fn extract_entries(archive_path: &Path, dest: &Path) -> PkgResult<()> {
    let mut archive = open(archive_path)?;
    fs::create_dir_all(dest)?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| PkgError::Archive {
            message: format!("Zip entry error: {e}"),
        })?;

        let name = decode_entry_name(entry.name());
        if is_packaging_metadata(&name) {
            continue;
        }
        let relative = entry_path(&name).ok_or_else(|| PkgError::Archive {
            message: format!(
                "{} contains an entry outside the package: '{name}'",
                archive_path.display()
            ),
        })?;
        let out_path = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
        } else {
            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut buf = Vec::new();
            entry.read_to_end(&mut buf).map_err(|e| PkgError::Archive {
                message: format!("Failed to read zip entry: {e}"),
            })?;
            fs::write(&out_path, &buf)?;
        }
    }
    Ok(())
}
