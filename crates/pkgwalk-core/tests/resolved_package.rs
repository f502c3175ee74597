use std::path::Path;

use pkgwalk_core::asset::AssetKind;
use pkgwalk_core::identity::PackageIdentity;
use pkgwalk_core::package::{InstallRecord, ResolvedPackage};
use pkgwalk_core::platform::Platform;
use pkgwalk_util::errors::PkgError;
use tempfile::TempDir;
use url::Url;

fn record(root: &Path, kind: AssetKind, platform: &str) -> InstallRecord {
    InstallRecord {
        identity: PackageIdentity::new("Test.Lib", "1.2").unwrap(),
        asset_kind: kind,
        platform: Platform::parse(platform),
        source: Url::parse("file:///srv/feed/").unwrap(),
        dependency_sources: Vec::new(),
        dependencies: Vec::new(),
        package_root: root.to_path_buf(),
        custom_content_path: None,
        env_key: None,
    }
}

#[test]
fn test_typed_package_lists_content_files() {
    let tmp = TempDir::new().unwrap();
    let content = tmp.path().join("lib/netstandard2.0");
    std::fs::create_dir_all(content.join("nested")).unwrap();
    std::fs::write(content.join("b.dll"), "").unwrap();
    std::fs::write(content.join("a.dll"), "").unwrap();

    let package = ResolvedPackage::materialize(record(
        tmp.path(),
        AssetKind::ImplementationAssembly,
        "netstandard2.0",
    ))
    .unwrap();

    assert_eq!(package.content_path, content);
    assert_eq!(package.files, vec![content.join("a.dll"), content.join("b.dll")]);
}

#[test]
fn test_environment_map() {
    let tmp = TempDir::new().unwrap();
    std::fs::create_dir_all(tmp.path().join("ref/net45")).unwrap();
    let mut rec = record(tmp.path(), AssetKind::CompileTimeAssembly, "net45");
    rec.env_key = Some("TEST_LIB_HOME".to_string());

    let package = ResolvedPackage::materialize(rec).unwrap();
    let path = tmp.path().join("ref/net45").display().to_string();
    assert_eq!(package.environment["Test_Lib"], path);
    assert_eq!(package.environment["Test_Lib_version"], "1.2.0");
    assert_eq!(package.environment["Test_Lib_framework"], "net45");
    assert_eq!(package.environment["TEST_LIB_HOME"], path);
    assert_eq!(package.environment.len(), 4);
}

#[test]
fn test_missing_typed_folder_is_invalid_assembly_path() {
    let tmp = TempDir::new().unwrap();
    let err = ResolvedPackage::materialize(record(
        tmp.path(),
        AssetKind::ImplementationAssembly,
        "net472",
    ))
    .unwrap_err();
    assert!(matches!(err, PkgError::InvalidAssemblyPath { .. }));
}

#[test]
fn test_opaque_package_with_missing_folder_is_empty() {
    let tmp = TempDir::new().unwrap();
    let mut rec = record(tmp.path(), AssetKind::Opaque, "any");
    rec.custom_content_path = Some("tools".to_string());

    let package = ResolvedPackage::materialize(rec).unwrap();
    assert_eq!(package.content_path, tmp.path().join("tools"));
    assert!(package.files.is_empty());
}

#[test]
fn test_opaque_package_defaults_to_root() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("readme.txt"), "hi").unwrap();
    let package = ResolvedPackage::materialize(record(tmp.path(), AssetKind::Opaque, "any")).unwrap();
    assert_eq!(package.content_path, tmp.path());
    assert_eq!(package.files.len(), 1);
}
