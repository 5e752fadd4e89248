use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::Utc;
use filetime::{set_file_mtime, FileTime};
use spar_core::{CdnConfig, DeployConfig, ObjectKey, PublicationHeaders};
use spar_sync::{
    CdnInvalidator, DeployOptions, Deployment, DirectoryStore, InvalidationOutcome, JournalCdn,
    MemoryCdn, MemoryStore, ObjectStore, SkipReason,
};
use tempfile::TempDir;

fn write(root: &Path, rel: &str, body: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    fs::write(path, body).expect("write");
}

fn config_for(workspace: &TempDir) -> DeployConfig {
    let mut config = DeployConfig::new("site");
    config.public_root = workspace.path().join("public");
    config.store.root = workspace.path().join("buckets");
    config.cdn = CdnConfig::Journal {
        root: workspace.path().join("cdn"),
    };
    config
}

fn age_object(store: &DirectoryStore, key: &str, age: Duration) {
    let path = store.object_path(&ObjectKey::from(key)).expect("path");
    let mtime = FileTime::from_system_time(SystemTime::now() - age);
    set_file_mtime(path, mtime).expect("set mtime");
}

fn headers() -> PublicationHeaders {
    PublicationHeaders {
        content_type: "application/javascript".into(),
        cache_control: "public, max-age=31536000".into(),
        content_encoding: None,
        acl: Default::default(),
        expires: None,
    }
}

#[tokio::test]
async fn first_deploy_publishes_everything_and_aliases_favicon() {
    let workspace = TempDir::new().expect("workspace");
    let public = workspace.path().join("public");
    write(&public, "index.html", "<html>");
    write(&public, "assets/index.html", "<html>");
    write(&public, "assets/manifest.yml", "app: app-abc123.js");
    write(&public, "assets/app-abc123.js", "console.log(1)");
    write(&public, "assets/favicon-def456.ico", "ico");

    let config = config_for(&workspace);
    let deployment = Deployment::from_config(config.clone()).expect("deployment");
    let outcome = deployment
        .deploy(DeployOptions::default())
        .await
        .expect("deploy");
    assert!(outcome.report.is_success(), "{:?}", outcome.report);

    let bucket = workspace.path().join("buckets/site");
    assert!(bucket.join("assets/app-abc123.js").is_file());
    assert!(bucket.join("assets/index.html").is_file());
    assert!(bucket.join("index.html").is_file());
    assert_eq!(fs::read(bucket.join("favicon.ico")).expect("alias"), b"ico");
    assert!(bucket.join("TIMESTAMP.txt").is_file());
    assert!(!bucket.join("assets/manifest.yml").exists());

    let cdn = JournalCdn::new(&workspace.path().join("cdn"), "site");
    let entries = cdn.entries().await.expect("journal");
    assert_eq!(entries.len(), 1);
    let paths: Vec<&str> = entries[0].paths.iter().map(ObjectKey::as_str).collect();
    assert_eq!(
        paths,
        vec![
            "assets/app-abc123.js",
            "assets/favicon-def456.ico",
            "favicon.ico",
            "index.html",
            "assets/index.html",
            "TIMESTAMP.txt",
        ]
    );
}

#[tokio::test]
async fn second_deploy_only_rewrites_special_files() {
    let workspace = TempDir::new().expect("workspace");
    let public = workspace.path().join("public");
    write(&public, "index.html", "<html>");
    write(&public, "assets/app-abc123.js", "1");
    write(&public, "assets/favicon-def456.ico", "ico");

    let deployment = Deployment::from_config(config_for(&workspace)).expect("deployment");
    deployment
        .deploy(DeployOptions::default())
        .await
        .expect("first deploy");

    let plan = deployment.plan(Utc::now()).await.expect("plan");
    let uploads: Vec<&str> = plan.to_upload.iter().map(ObjectKey::as_str).collect();
    assert_eq!(uploads, vec!["assets/favicon-def456.ico", "index.html"]);
    assert!(plan.to_delete.is_empty());
    assert!(plan.favicon_alias.is_some());
}

#[tokio::test]
async fn orphan_survives_grace_period_then_is_deleted() {
    let workspace = TempDir::new().expect("workspace");
    let public = workspace.path().join("public");
    write(&public, "assets/app-new.js", "2");

    let config = config_for(&workspace);
    let store = DirectoryStore::new(&config.store.root, "site");
    store
        .put(&ObjectKey::from("assets/old-999.js"), b"1", &headers())
        .await
        .expect("seed");
    age_object(&store, "assets/old-999.js", Duration::from_secs(120));

    let deployment = Deployment::from_config(config.clone()).expect("deployment");
    let outcome = deployment
        .deploy(DeployOptions::default())
        .await
        .expect("deploy");
    assert!(outcome.plan.to_delete.is_empty());
    assert_eq!(outcome.plan.deferred.len(), 1);
    assert!(store
        .head(&ObjectKey::from("assets/old-999.js"))
        .await
        .expect("head")
        .is_some());

    age_object(&store, "assets/old-999.js", Duration::from_secs(2 * 3600));
    let outcome = deployment
        .deploy(DeployOptions::default())
        .await
        .expect("deploy");
    assert_eq!(outcome.report.deleted, vec![ObjectKey::from("assets/old-999.js")]);
    assert!(store
        .head(&ObjectKey::from("assets/old-999.js"))
        .await
        .expect("head")
        .is_none());

    // Deleted keys never reach the CDN.
    match &outcome.report.invalidation {
        InvalidationOutcome::Submitted { paths, .. } => {
            assert!(!paths.contains(&ObjectKey::from("assets/old-999.js")));
            assert_eq!(paths.last().map(ObjectKey::as_str), Some("TIMESTAMP.txt"));
        }
        other => panic!("expected submitted invalidation, got {other:?}"),
    }
}

#[tokio::test]
async fn gzip_assets_carry_encoding_in_sidecar() {
    let workspace = TempDir::new().expect("workspace");
    let public = workspace.path().join("public");
    write(&public, "assets/app-1.css.gz", "gz");
    write(&public, "assets/logo-2.svgz", "gz");

    let config = config_for(&workspace);
    Deployment::from_config(config.clone())
        .expect("deployment")
        .deploy(DeployOptions::default())
        .await
        .expect("deploy");

    let store = DirectoryStore::new(&config.store.root, "site");
    let css = store
        .metadata(&ObjectKey::from("assets/app-1.css.gz"))
        .await
        .expect("meta")
        .expect("present");
    assert_eq!(css.headers.content_type, "text/css");
    assert_eq!(css.headers.content_encoding.map(|e| e.as_str()), Some("gzip"));

    let svg = store
        .metadata(&ObjectKey::from("assets/logo-2.svgz"))
        .await
        .expect("meta")
        .expect("present");
    assert_eq!(svg.headers.content_type, "image/svg+xml");
}

#[tokio::test]
async fn dry_run_leaves_bucket_untouched() {
    let workspace = TempDir::new().expect("workspace");
    write(&workspace.path().join("public"), "assets/app-1.js", "1");

    let outcome = Deployment::from_config(config_for(&workspace))
        .expect("deployment")
        .deploy(DeployOptions {
            dry_run: true,
            ..DeployOptions::default()
        })
        .await
        .expect("deploy");
    assert!(outcome.report.dry_run);
    assert_eq!(outcome.report.uploaded, vec![ObjectKey::from("assets/app-1.js")]);
    assert!(!workspace.path().join("buckets/site").exists());
    assert!(!workspace.path().join("cdn").exists());
}

#[tokio::test(start_paused = true)]
async fn failed_upload_keeps_orphans_and_fails_the_run() {
    let workspace = TempDir::new().expect("workspace");
    write(&workspace.path().join("public"), "assets/app-1.js", "1");
    write(&workspace.path().join("public"), "assets/app-2.js", "2");

    let store = MemoryStore::new("site");
    store.insert(
        "assets/app-0.js",
        b"0",
        Utc::now() - chrono::Duration::days(1),
    );
    store.fail_put("assets/app-2.js", u32::MAX);
    let cdn = MemoryCdn::new();

    let mut config = config_for(&workspace);
    config.cdn = CdnConfig::Disabled;
    let deployment = Deployment::new(
        config,
        Arc::new(store.clone()) as Arc<dyn ObjectStore>,
        Some(Arc::new(cdn.clone()) as Arc<dyn CdnInvalidator>),
    )
    .expect("deployment");

    let outcome = deployment
        .deploy(DeployOptions::default())
        .await
        .expect("deploy");
    assert!(!outcome.report.is_success());
    assert_eq!(
        outcome.report.skipped_deletes[0].reason,
        SkipReason::UploadsFailed
    );
    assert!(store.get("assets/app-0.js").is_some());
    assert!(store.get("assets/app-1.js").is_some());
}
