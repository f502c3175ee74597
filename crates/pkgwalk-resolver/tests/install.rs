use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use pkgwalk_core::asset::AssetKind;
use pkgwalk_core::identity::PackageIdentity;
use pkgwalk_core::package::{PackageRequest, PackageType};
use pkgwalk_core::platform::Platform;
use pkgwalk_feed::download::HttpSettings;
use pkgwalk_feed::provider::FeedFactory;
use pkgwalk_feed::source::{DependencyInfo, PackageSource, SourceProvider};
use pkgwalk_resolver::consistency::{check_consistency, CheckOptions};
use pkgwalk_resolver::install::{download_package, InstallOptions, ResolutionSession};
use pkgwalk_resolver::walker::{AvailableSet, GraphWalker, WalkDepth};
use pkgwalk_util::errors::{PkgError, PkgResult};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Delegates to a real feed and counts dependency-info queries.
struct Counting {
    inner: Arc<dyn PackageSource>,
    queries: Arc<AtomicUsize>,
}

#[async_trait]
impl PackageSource for Counting {
    fn uri(&self) -> &Url {
        self.inner.uri()
    }

    async fn find_dependency_info(
        &self,
        identity: &PackageIdentity,
        platform: &Platform,
    ) -> PkgResult<Option<DependencyInfo>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.inner.find_dependency_info(identity, platform).await
    }

    async fn fetch_artifact(&self, identity: &PackageIdentity) -> PkgResult<Option<PathBuf>> {
        self.inner.fetch_artifact(identity).await
    }

    fn extract(&self, archive: &Path, dest: &Path) -> PkgResult<PathBuf> {
        self.inner.extract(archive, dest)
    }
}

/// A source that fails every query.
struct Broken {
    uri: Url,
    fatal: bool,
}

#[async_trait]
impl PackageSource for Broken {
    fn uri(&self) -> &Url {
        &self.uri
    }

    async fn find_dependency_info(
        &self,
        identity: &PackageIdentity,
        _platform: &Platform,
    ) -> PkgResult<Option<DependencyInfo>> {
        let package = identity.to_string();
        let source_uri = self.uri.to_string();
        let message = "boom".to_string();
        Err(if self.fatal {
            PkgError::SourceFatal { package, source_uri, message }
        } else {
            PkgError::SourceUnavailable { package, source_uri, message }
        })
    }

    async fn fetch_artifact(&self, _identity: &PackageIdentity) -> PkgResult<Option<PathBuf>> {
        Ok(None)
    }
}

/// A source whose queries panic inside the worker.
struct Panicking {
    uri: Url,
}

#[async_trait]
impl PackageSource for Panicking {
    fn uri(&self) -> &Url {
        &self.uri
    }

    async fn find_dependency_info(
        &self,
        identity: &PackageIdentity,
        _platform: &Platform,
    ) -> PkgResult<Option<DependencyInfo>> {
        panic!("feed handler crashed while resolving {identity}")
    }

    async fn fetch_artifact(&self, _identity: &PackageIdentity) -> PkgResult<Option<PathBuf>> {
        Ok(None)
    }
}

struct TestProvider {
    factory: FeedFactory,
    queries: Arc<AtomicUsize>,
    broken: HashMap<Url, Arc<dyn PackageSource>>,
}

impl SourceProvider for TestProvider {
    fn open(&self, url: &Url) -> PkgResult<Arc<dyn PackageSource>> {
        if let Some(source) = self.broken.get(url) {
            return Ok(Arc::clone(source));
        }
        Ok(Arc::new(Counting {
            inner: self.factory.open(url)?,
            queries: Arc::clone(&self.queries),
        }))
    }
}

struct Workspace {
    tmp: TempDir,
    queries: Arc<AtomicUsize>,
    broken: HashMap<Url, Arc<dyn PackageSource>>,
}

impl Workspace {
    fn new() -> Self {
        Self {
            tmp: TempDir::new().unwrap(),
            queries: Arc::new(AtomicUsize::new(0)),
            broken: HashMap::new(),
        }
    }

    fn feed_url(&self, feed: &str) -> Url {
        let dir = self.tmp.path().join("feeds").join(feed);
        std::fs::create_dir_all(&dir).unwrap();
        Url::from_directory_path(dir).unwrap()
    }

    fn broken_url(&mut self, name: &str, fatal: bool) -> Url {
        let uri = Url::parse(&format!("https://{name}.invalid/v3/index.json")).unwrap();
        self.broken
            .insert(uri.clone(), Arc::new(Broken { uri: uri.clone(), fatal }));
        uri
    }

    fn panicking_url(&mut self, name: &str) -> Url {
        let uri = Url::parse(&format!("https://{name}.invalid/v3/index.json")).unwrap();
        self.broken
            .insert(uri.clone(), Arc::new(Panicking { uri: uri.clone() }));
        uri
    }

    /// Write `{id}.{version}.nupkg` into `feed` with flat dependencies.
    fn publish(&self, feed: &str, id: &str, version: &str, deps: &[(&str, &str)], files: &[&str]) {
        let dir = self.tmp.path().join("feeds").join(feed);
        std::fs::create_dir_all(&dir).unwrap();
        let deps: String = deps
            .iter()
            .map(|(dep, range)| format!(r#"<dependency id="{dep}" version="{range}"/>"#))
            .collect();
        let nuspec = format!(
            "<package><metadata><id>{id}</id><version>{version}</version>\
             <dependencies>{deps}</dependencies></metadata></package>"
        );

        let file = std::fs::File::create(dir.join(format!("{id}.{version}.nupkg"))).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        zip.start_file(format!("{id}.nuspec"), options).unwrap();
        zip.write_all(nuspec.as_bytes()).unwrap();
        for entry in files {
            zip.start_file(*entry, options).unwrap();
            zip.write_all(b"content").unwrap();
        }
        zip.finish().unwrap();
    }

    fn publish_lib(&self, feed: &str, id: &str, version: &str, deps: &[(&str, &str)]) {
        let dll = format!("lib/netstandard2.0/{id}.dll");
        self.publish(feed, id, version, deps, &[dll.as_str()]);
    }

    fn cache(&self) -> PathBuf {
        self.tmp.path().join("packages")
    }

    fn request(&self, id: &str, version: &str, feed: &str) -> PackageRequest {
        PackageRequest::new(
            PackageIdentity::new(id, version).unwrap(),
            self.feed_url(feed),
            self.cache(),
        )
    }

    fn provider(&self) -> Arc<TestProvider> {
        Arc::new(TestProvider {
            factory: FeedFactory::new(self.tmp.path().join("downloads"), HttpSettings::default()),
            queries: Arc::clone(&self.queries),
            broken: self.broken.clone(),
        })
    }

    fn session(&self, options: InstallOptions) -> ResolutionSession {
        ResolutionSession::new(Platform::parse("netstandard2.0"), self.provider(), options)
    }

    fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

fn ids(session: &ResolutionSession) -> Vec<String> {
    session.installed().iter().map(|p| p.id().to_string()).collect()
}

async fn install_one(session: &mut ResolutionSession, request: PackageRequest) -> PkgResult<Vec<String>> {
    let mut messages = Vec::new();
    session
        .install(&[request], |m| messages.push(m.to_string()))
        .await?;
    Ok(messages)
}

#[tokio::test]
async fn test_chain_installs_every_package_once() {
    let ws = Workspace::new();
    ws.publish_lib("main", "A", "1.0.0", &[("B", "1.0.0")]);
    ws.publish_lib("main", "B", "1.0.0", &[("C", "1.0.0")]);
    ws.publish_lib("main", "C", "1.0.0", &[]);

    let mut session = ws.session(InstallOptions::default());
    let messages = install_one(&mut session, ws.request("A", "1.0.0", "main"))
        .await
        .unwrap();

    assert_eq!(messages, vec!["Installed: A V1.0.0 and its dependencies"]);
    assert_eq!(ids(&session), vec!["A", "B", "C"]);

    let a = &session.installed()[0];
    assert_eq!(a.asset_kind, AssetKind::ImplementationAssembly);
    assert_eq!(a.platform, Platform::parse("netstandard2.0"));
    assert!(a.content_path.ends_with("lib/netstandard2.0"));
    assert_eq!(a.files.len(), 1);
    assert_eq!(a.environment["A_version"], "1.0.0");
    assert_eq!(a.environment["A_framework"], "netstandard2.0");
    assert!(ws.cache().join("B.1.0.0/lib/netstandard2.0/B.dll").is_file());

    check_consistency(
        session.installed(),
        CheckOptions {
            strict: true,
            ignore_dependencies: false,
        },
    )
    .unwrap();
}

#[tokio::test]
async fn test_diamond_is_walked_depth_first() {
    let ws = Workspace::new();
    ws.publish_lib("main", "A", "1.0.0", &[("B", "1.0.0"), ("C", "1.0.0")]);
    ws.publish_lib("main", "B", "1.0.0", &[("D", "1.0.0")]);
    ws.publish_lib("main", "C", "1.0.0", &[("D", "1.0.0")]);
    ws.publish_lib("main", "D", "1.0.0", &[]);

    let mut session = ws.session(InstallOptions::default());
    install_one(&mut session, ws.request("A", "1.0.0", "main"))
        .await
        .unwrap();

    assert_eq!(ids(&session), vec!["A", "B", "D", "C"]);
    assert_eq!(ws.queries(), 4);
}

#[tokio::test]
async fn test_without_dependencies_only_the_root_is_installed() {
    let ws = Workspace::new();
    ws.publish_lib("main", "A", "1.0.0", &[("B", "1.0.0")]);

    let mut session = ws.session(InstallOptions {
        resolve_dependencies: false,
        cancel: None,
    });
    let messages = install_one(&mut session, ws.request("A", "1.0.0", "main"))
        .await
        .unwrap();

    assert_eq!(messages, vec!["Installed: A V1.0.0"]);
    assert_eq!(ids(&session), vec!["A"]);
}

#[tokio::test]
async fn test_collector_package_uses_package_root() {
    let ws = Workspace::new();
    ws.publish("main", "Bundle", "2.0.0", &[("B", "1.0.0")], &[]);
    ws.publish_lib("main", "B", "1.0.0", &[]);

    let mut session = ws.session(InstallOptions::default());
    install_one(&mut session, ws.request("Bundle", "2.0", "main"))
        .await
        .unwrap();

    let bundle = &session.installed()[0];
    assert_eq!(bundle.asset_kind, AssetKind::ImplementationAssembly);
    assert_eq!(bundle.platform, Platform::Any);
    assert_eq!(bundle.content_path, bundle.package_root);
    assert_eq!(bundle.package_root, ws.cache().join("Bundle.2.0.0"));
}

#[tokio::test]
async fn test_custom_root_is_opaque() {
    let ws = Workspace::new();
    ws.publish("tools", "Build.Tools", "3.1.0", &[], &["tools/run.sh", "tools/readme.txt"]);

    let request = ws
        .request("Build.Tools", "[3.1]", "tools")
        .with_package_type(PackageType::Custom)
        .with_content_path(Some("tools".to_string()))
        .with_env_key(Some("TOOLS_PATH".to_string()));
    let mut session = ws.session(InstallOptions::default());
    install_one(&mut session, request).await.unwrap();

    let tools = &session.installed()[0];
    assert_eq!(tools.asset_kind, AssetKind::Opaque);
    assert_eq!(tools.platform, Platform::Any);
    assert!(tools.content_path.ends_with("tools"));
    assert_eq!(tools.files.len(), 2);
    assert_eq!(
        tools.environment["TOOLS_PATH"],
        tools.content_path.display().to_string()
    );
    assert_eq!(tools.environment["Build_Tools"], tools.environment["TOOLS_PATH"]);
}

#[tokio::test]
async fn test_force_min_version_is_inherited_from_the_request() {
    let ws = Workspace::new();
    ws.publish_lib("main", "A", "1.0.0", &[("B", "1.0.0")]);
    ws.publish_lib("main", "B", "1.0.0", &[("C", "1.0.0")]);
    ws.publish_lib("main", "C", "1.0.0", &[]);

    let mut session = ws.session(InstallOptions::default());
    install_one(
        &mut session,
        ws.request("A", "1.0.0", "main").with_force_min_version(false),
    )
    .await
    .unwrap();

    for package in session.installed() {
        assert!(package.dependencies.iter().all(|d| !d.force_min_version));
    }
    assert_eq!(session.installed()[1].identity, PackageIdentity::new("B", "1.0").unwrap());
}

#[tokio::test]
async fn test_root_from_another_source_is_dependency_confusion() {
    let ws = Workspace::new();
    ws.feed_url("private");
    ws.publish_lib("public", "A", "1.0.0", &[]);

    let request = ws
        .request("A", "1.0.0", "private")
        .with_dependency_sources(vec![ws.feed_url("public")]);
    let mut session = ws.session(InstallOptions::default());
    let err = install_one(&mut session, request).await.unwrap_err();

    assert!(matches!(err, PkgError::PackageInstallationFailed { .. }));
    assert!(matches!(err.root_cause(), PkgError::DependencyConfusion { .. }));
    assert!(session.installed().is_empty());
    // Nothing from the public feed was extracted.
    assert!(!ws.cache().join("A.1.0.0").exists());
}

#[tokio::test]
async fn test_dependencies_may_come_from_dependency_sources() {
    let ws = Workspace::new();
    ws.publish_lib("private", "A", "1.0.0", &[("B", "1.0.0")]);
    ws.publish_lib("public", "B", "1.0.0", &[]);

    let request = ws
        .request("A", "1.0.0", "private")
        .with_dependency_sources(vec![ws.feed_url("public")]);
    let mut session = ws.session(InstallOptions::default());
    install_one(&mut session, request).await.unwrap();

    assert_eq!(ids(&session), vec!["A", "B"]);
    assert_eq!(session.installed()[1].source, ws.feed_url("public"));
}

#[tokio::test]
async fn test_resolving_a_root_again_does_not_query_sources() {
    let ws = Workspace::new();
    ws.publish_lib("main", "A", "1.0.0", &[("B", "1.0.0")]);
    ws.publish_lib("main", "B", "1.0.0", &[]);

    let mut session = ws.session(InstallOptions::default());
    let requests = vec![ws.request("A", "1.0.0", "main"), ws.request("A", "1.0", "main")];
    let mut messages = Vec::new();
    session
        .install(&requests, |m| messages.push(m.to_string()))
        .await
        .unwrap();

    assert_eq!(ws.queries(), 2);
    assert_eq!(messages.len(), 2);
    assert_eq!(ids(&session), vec!["A", "B"]);
}

#[tokio::test]
async fn test_installed_package_satisfies_later_dependencies() {
    let ws = Workspace::new();
    ws.publish_lib("main", "CoreLib", "2.0.0", &[]);
    ws.publish_lib("main", "TestLib", "1.0.0", &[("CoreLib", "1.0.0")]);

    let mut session = ws.session(InstallOptions::default());
    let requests = vec![
        ws.request("CoreLib", "2.0.0", "main"),
        ws.request("TestLib", "1.0.0", "main"),
    ];
    session.install(&requests, |_| {}).await.unwrap();

    assert_eq!(ids(&session), vec!["CoreLib", "TestLib"]);
    assert_eq!(session.installed()[0].identity.min_version().to_string(), "2.0.0");
}

#[tokio::test]
async fn test_missing_root_and_missing_dependency() {
    let ws = Workspace::new();
    ws.publish_lib("main", "A", "1.0.0", &[("Missing", "1.0.0")]);

    let mut session = ws.session(InstallOptions::default());
    let err = install_one(&mut session, ws.request("Nope", "1.0.0", "main"))
        .await
        .unwrap_err();
    assert!(matches!(err.root_cause(), PkgError::PackageNotFound { .. }));

    let err = install_one(&mut session, ws.request("A", "1.0.0", "main"))
        .await
        .unwrap_err();
    match err.root_cause() {
        PkgError::DependencyNotFound { message } => {
            assert!(message.contains("Missing V1.0.0"));
            assert!(message.contains("A V1.0.0"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(session.available().is_empty());
}

#[tokio::test]
async fn test_failed_root_can_be_retried_in_the_same_session() {
    let ws = Workspace::new();
    ws.publish_lib("main", "A", "1.0.0", &[("B", "1.0.0")]);

    let mut session = ws.session(InstallOptions::default());
    assert!(install_one(&mut session, ws.request("A", "1.0.0", "main"))
        .await
        .is_err());

    ws.publish_lib("main", "B", "1.0.0", &[]);
    install_one(&mut session, ws.request("A", "1.0.0", "main"))
        .await
        .unwrap();
    assert_eq!(ids(&session), vec!["A", "B"]);
}

#[tokio::test]
async fn test_unavailable_source_is_skipped() {
    let mut ws = Workspace::new();
    let flaky = ws.broken_url("flaky", false);
    ws.publish_lib("main", "A", "1.0.0", &[("B", "1.0.0")]);
    ws.publish_lib("mirror", "B", "1.0.0", &[]);

    let request = ws
        .request("A", "1.0.0", "main")
        .with_dependency_sources(vec![flaky, ws.feed_url("mirror")]);
    let mut session = ws.session(InstallOptions::default());
    install_one(&mut session, request).await.unwrap();

    assert_eq!(ids(&session), vec!["A", "B"]);
    assert_eq!(session.installed()[1].source, ws.feed_url("mirror"));
}

#[tokio::test]
async fn test_fatal_source_aborts_the_walk() {
    let mut ws = Workspace::new();
    let down = ws.broken_url("down", true);
    ws.publish_lib("main", "A", "1.0.0", &[("B", "1.0.0")]);
    ws.publish_lib("mirror", "B", "1.0.0", &[]);

    let request = ws
        .request("A", "1.0.0", "main")
        .with_dependency_sources(vec![down, ws.feed_url("mirror")]);
    let mut session = ws.session(InstallOptions::default());
    let err = install_one(&mut session, request).await.unwrap_err();

    assert!(matches!(err.root_cause(), PkgError::SourceFatal { .. }));
    // A in main, then B in main; the mirror is never asked.
    assert_eq!(ws.queries(), 2);
    assert!(session.installed().is_empty());
}

#[tokio::test]
async fn test_cancelled_session_fails() {
    let ws = Workspace::new();
    ws.publish_lib("main", "A", "1.0.0", &[]);

    let token = CancellationToken::new();
    token.cancel();
    let mut session = ws.session(InstallOptions {
        resolve_dependencies: true,
        cancel: Some(token),
    });
    let err = install_one(&mut session, ws.request("A", "1.0.0", "main"))
        .await
        .unwrap_err();

    assert!(matches!(err.root_cause(), PkgError::Cancelled));
    assert!(session.installed().is_empty());
}

#[tokio::test]
async fn test_incompatible_assets_fail() {
    let ws = Workspace::new();
    ws.publish("main", "Legacy", "1.0.0", &[], &["lib/net472/Legacy.dll"]);

    let mut session = ws.session(InstallOptions::default());
    let err = install_one(&mut session, ws.request("Legacy", "1.0.0", "main"))
        .await
        .unwrap_err();
    assert!(matches!(err.root_cause(), PkgError::TargetFrameworkNotFound { .. }));
}

#[tokio::test]
async fn test_download_copies_the_root_archive() {
    let ws = Workspace::new();
    ws.publish_lib("main", "A", "1.0.0", &[("B", "1.0.0")]);

    let dest = ws.tmp.path().join("out");
    let path = download_package(
        ws.provider(),
        &ws.request("A", "1.0", "main"),
        &Platform::parse("netstandard2.0"),
        &dest,
    )
    .await
    .unwrap();

    assert_eq!(path, dest.join("A.1.0.0.nupkg"));
    assert!(path.is_file());
}

#[tokio::test]
async fn test_walk_descends_the_given_number_of_levels() {
    let ws = Workspace::new();
    ws.publish_lib("main", "A", "1.0.0", &[("B", "1.0.0")]);
    ws.publish_lib("main", "B", "1.0.0", &[("C", "1.0.0")]);
    ws.publish_lib("main", "C", "1.0.0", &[]);

    let sources = vec![ws.provider().open(&ws.feed_url("main")).unwrap()];
    let platform = Platform::parse("netstandard2.0");
    let mut available = AvailableSet::new();
    GraphWalker::new(&platform, &sources, &[])
        .walk(
            &PackageIdentity::new("A", "1.0.0").unwrap(),
            WalkDepth::Levels(1),
            &mut available,
        )
        .await
        .unwrap();

    let found: Vec<&str> = available.iter().map(|info| info.identity.id()).collect();
    assert_eq!(found, vec!["A", "B"]);
}

#[tokio::test]
async fn test_failed_extraction_leaves_no_package_dir() {
    let ws = Workspace::new();
    ws.publish(
        "main",
        "Evil",
        "1.0.0",
        &[],
        &["lib/netstandard2.0/Evil.dll", "lib/%2E%2E/%2E%2E/escaped.txt"],
    );

    let mut session = ws.session(InstallOptions::default());
    let err = install_one(&mut session, ws.request("Evil", "1.0.0", "main"))
        .await
        .unwrap_err();

    assert!(matches!(err.root_cause(), PkgError::Archive { .. }));
    assert!(!ws.cache().join("Evil.1.0.0").exists());
    assert!(!ws.cache().join("Evil.1.0.0.part").exists());
    assert!(!ws.tmp.path().join("escaped.txt").exists());
    assert!(session.installed().is_empty());
}

#[tokio::test]
async fn test_panicking_worker_keeps_earlier_roots() {
    let mut ws = Workspace::new();
    let crashing = ws.panicking_url("crashing");
    ws.publish_lib("main", "A", "1.0.0", &[("B", "1.0.0")]);
    ws.publish_lib("main", "B", "1.0.0", &[]);

    let requests = vec![
        ws.request("A", "1.0.0", "main"),
        PackageRequest::new(PackageIdentity::new("C", "1.0.0").unwrap(), crashing, ws.cache()),
    ];
    let mut session = ws.session(InstallOptions::default());
    let err = session.install(&requests, |_| {}).await.unwrap_err();

    assert!(matches!(err.root_cause(), PkgError::WorkerFailed { .. }));
    assert_eq!(ids(&session), vec!["A", "B"]);
    assert_eq!(session.available().len(), 2);
}
