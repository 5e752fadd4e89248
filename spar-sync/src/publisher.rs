//! Publisher: executes a [`ReconciliationPlan`] against the backends.
//!
//! Phases, each happening-after the previous one:
//!
//! 1. Asset uploads, bounded concurrency, retried on transient failure.
//! 2. Favicon alias copy, if its source upload succeeded.
//! 3. Index documents, sequentially in plan order.
//! 4. Deletes. Skipped entirely if anything above failed. Each orphan is
//!    re-checked with `head` first and deleted at most once.
//! 5. Timestamp marker, always the last write.
//! 6. One CDN invalidation batch with the keys that were actually written.
//!
//! Per-key failures are collected in the [`PublishReport`]; nothing in this
//! module returns early on a backend error.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use spar_classifier::Classifier;
use spar_core::{ObjectKey, ReconciliationPlan};

use crate::backend::{CdnInvalidator, InvalidationId, ObjectStore};
use crate::error::{io_err, BackendError, DeleteError, InvalidationError, UploadError};
use crate::retry::RetryPolicy;

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Why an orphan planned for deletion was left in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// At least one upload failed this run.
    UploadsFailed,
    Cancelled,
    /// The object disappeared before the delete.
    Gone,
    /// The object was rewritten since the listing.
    WithinGracePeriod,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::UploadsFailed => "uploads failed",
            SkipReason::Cancelled => "cancelled",
            SkipReason::Gone => "already gone",
            SkipReason::WithinGracePeriod => "modified within grace period",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedDelete {
    pub key: ObjectKey,
    pub reason: SkipReason,
}

#[derive(Debug)]
pub enum InvalidationOutcome {
    Submitted {
        id: InvalidationId,
        paths: Vec<ObjectKey>,
    },
    Failed(InvalidationError),
    /// No CDN configured, nothing written, dry run, or cancelled.
    Skipped,
}

/// What a publish run did.
#[derive(Debug)]
pub struct PublishReport {
    pub dry_run: bool,
    pub cancelled: bool,
    pub deployed_at: DateTime<Utc>,
    /// Keys written from disk, asset uploads first (key order), then index
    /// documents in upload order. In dry-run mode: keys that would be written.
    pub uploaded: Vec<ObjectKey>,
    pub upload_failures: Vec<UploadError>,
    pub alias_copied: Option<ObjectKey>,
    pub deleted: Vec<ObjectKey>,
    pub delete_failures: Vec<DeleteError>,
    pub skipped_deletes: Vec<SkippedDelete>,
    pub timestamp_written: bool,
    pub timestamp_error: Option<UploadError>,
    pub invalidation: InvalidationOutcome,
}

impl PublishReport {
    fn new(dry_run: bool, deployed_at: DateTime<Utc>) -> Self {
        Self {
            dry_run,
            cancelled: false,
            deployed_at,
            uploaded: Vec::new(),
            upload_failures: Vec::new(),
            alias_copied: None,
            deleted: Vec::new(),
            delete_failures: Vec::new(),
            skipped_deletes: Vec::new(),
            timestamp_written: false,
            timestamp_error: None,
            invalidation: InvalidationOutcome::Skipped,
        }
    }

    /// Every upload landed, the timestamp marker was written (or this was a
    /// dry run), and the run was not cancelled. Delete and invalidation
    /// problems are warnings only.
    pub fn is_success(&self) -> bool {
        self.upload_failures.is_empty()
            && (self.timestamp_written || self.dry_run)
            && !self.cancelled
    }
}

// ---------------------------------------------------------------------------
// Publisher
// ---------------------------------------------------------------------------

enum UploadOutcome {
    Written,
    Failed(BackendError),
    NotStarted,
}

pub struct Publisher {
    store: Arc<dyn ObjectStore>,
    cdn: Option<Arc<dyn CdnInvalidator>>,
    classifier: Classifier,
    public_root: PathBuf,
    retry: RetryPolicy,
    concurrency: usize,
    grace_period: Duration,
    dry_run: bool,
    cancel: CancellationToken,
}

impl Publisher {
    pub fn new(store: Arc<dyn ObjectStore>, classifier: Classifier, public_root: &Path) -> Self {
        Self {
            store,
            cdn: None,
            classifier,
            public_root: public_root.to_path_buf(),
            retry: RetryPolicy::default(),
            concurrency: 16,
            grace_period: Duration::from_secs(3600),
            dry_run: false,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cdn(mut self, cdn: Option<Arc<dyn CdnInvalidator>>) -> Self {
        self.cdn = cdn;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Clamped to at least one worker.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub async fn publish(&self, plan: &ReconciliationPlan) -> PublishReport {
        let now = Utc::now();
        if self.dry_run {
            return self.dry_run_report(plan, now);
        }

        let mut report = PublishReport::new(false, now);
        let mut written: HashSet<ObjectKey> = HashSet::new();

        // Phase 1: content-addressed assets and favicons.
        let mut results: Vec<(ObjectKey, UploadOutcome)> =
            stream::iter(plan.asset_uploads().cloned())
                .map(|key| async move {
                    let outcome = self.upload_file(&key, now).await;
                    (key, outcome)
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;
        results.sort_by(|a, b| a.0.cmp(&b.0));
        for (key, outcome) in results {
            self.record_upload(&mut report, &mut written, key, outcome);
        }

        // Phase 2: alias copy.
        if let Some(alias) = &plan.favicon_alias {
            if written.contains(&alias.source) && !self.cancel.is_cancelled() {
                let headers = self.classifier.classify(&alias.target, now);
                let result = self
                    .retry
                    .retrying("copy", alias.target.as_str(), || {
                        self.store.copy(&alias.source, &alias.target, &headers)
                    })
                    .await;
                match result {
                    Ok(()) => {
                        info!(source = %alias.source, target = %alias.target, "favicon alias copied");
                        written.insert(alias.target.clone());
                        report.alias_copied = Some(alias.target.clone());
                    }
                    Err(source) => {
                        warn!(target = %alias.target, error = %source, "favicon alias copy failed");
                        report.upload_failures.push(UploadError {
                            key: alias.target.clone(),
                            source,
                        });
                    }
                }
            }
        }

        // Phase 3: index documents, in order.
        for key in &plan.index_documents {
            let outcome = self.upload_file(key, now).await;
            self.record_upload(&mut report, &mut written, key.clone(), outcome);
        }

        report.cancelled = self.cancel.is_cancelled();

        // Phase 4: deletes, behind the upload barrier.
        self.delete_orphans(plan, &mut report).await;

        if report.cancelled {
            info!("publish cancelled; timestamp and invalidation skipped");
            return report;
        }

        // Phase 5: timestamp marker.
        let timestamp_key = &plan.timestamp_key;
        let body = format!("{}\n", now.to_rfc3339());
        let headers = self.classifier.classify(timestamp_key, now);
        match self
            .retry
            .retrying("put", timestamp_key.as_str(), || {
                self.store.put(timestamp_key, body.as_bytes(), &headers)
            })
            .await
        {
            Ok(()) => {
                written.insert(timestamp_key.clone());
                report.timestamp_written = true;
            }
            Err(source) => {
                error!(key = %timestamp_key, error = %source, "timestamp marker write failed");
                report.timestamp_error = Some(UploadError {
                    key: timestamp_key.clone(),
                    source,
                });
            }
        }

        // Phase 6: one invalidation batch.
        let paths: Vec<ObjectKey> = plan
            .to_invalidate
            .iter()
            .filter(|key| written.contains(*key))
            .cloned()
            .collect();
        report.invalidation = self.invalidate(paths).await;

        info!(
            bucket = self.store.bucket(),
            uploaded = report.uploaded.len(),
            failed = report.upload_failures.len(),
            deleted = report.deleted.len(),
            "publish finished"
        );
        report
    }

    fn dry_run_report(&self, plan: &ReconciliationPlan, now: DateTime<Utc>) -> PublishReport {
        let mut report = PublishReport::new(true, now);
        report.uploaded = plan
            .asset_uploads()
            .chain(plan.index_documents.iter())
            .cloned()
            .collect();
        report.alias_copied = plan.favicon_alias.as_ref().map(|a| a.target.clone());
        report.deleted = plan.to_delete.iter().cloned().collect();
        for key in &report.uploaded {
            info!(%key, "[dry-run] would upload");
        }
        for key in &report.deleted {
            info!(%key, "[dry-run] would delete");
        }
        report
    }

    async fn upload_file(&self, key: &ObjectKey, now: DateTime<Utc>) -> UploadOutcome {
        if self.cancel.is_cancelled() {
            return UploadOutcome::NotStarted;
        }
        let path = self.public_root.join(key.as_str());
        let body = match tokio::fs::read(&path).await {
            Ok(body) => body,
            Err(e) => return UploadOutcome::Failed(io_err(path, e)),
        };
        let headers = self.classifier.classify(key, now);
        let result = self
            .retry
            .retrying("put", key.as_str(), || self.store.put(key, &body, &headers))
            .await;
        match result {
            Ok(()) => {
                debug!(%key, content_type = %headers.content_type, "uploaded");
                UploadOutcome::Written
            }
            Err(e) => UploadOutcome::Failed(e),
        }
    }

    fn record_upload(
        &self,
        report: &mut PublishReport,
        written: &mut HashSet<ObjectKey>,
        key: ObjectKey,
        outcome: UploadOutcome,
    ) {
        match outcome {
            UploadOutcome::Written => {
                written.insert(key.clone());
                report.uploaded.push(key);
            }
            UploadOutcome::Failed(source) => {
                warn!(%key, error = %source, "upload failed");
                report.upload_failures.push(UploadError { key, source });
            }
            UploadOutcome::NotStarted => {}
        }
    }

    async fn delete_orphans(&self, plan: &ReconciliationPlan, report: &mut PublishReport) {
        let barrier = if report.cancelled {
            Some(SkipReason::Cancelled)
        } else if !report.upload_failures.is_empty() {
            Some(SkipReason::UploadsFailed)
        } else {
            None
        };
        if let Some(reason) = barrier {
            if !plan.to_delete.is_empty() {
                warn!(
                    orphans = plan.to_delete.len(),
                    reason = reason.as_str(),
                    "skipping deletes"
                );
            }
            report
                .skipped_deletes
                .extend(plan.to_delete.iter().map(|key| SkippedDelete {
                    key: key.clone(),
                    reason,
                }));
            return;
        }

        for key in &plan.to_delete {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                report.skipped_deletes.push(SkippedDelete {
                    key: key.clone(),
                    reason: SkipReason::Cancelled,
                });
                continue;
            }

            let head = self
                .retry
                .retrying("head", key.as_str(), || self.store.head(key))
                .await;
            let skip = match head {
                Ok(None) => Some(SkipReason::Gone),
                Ok(Some(last_modified)) => {
                    let age = Utc::now()
                        .signed_duration_since(last_modified)
                        .to_std()
                        .unwrap_or_default();
                    (age <= self.grace_period).then_some(SkipReason::WithinGracePeriod)
                }
                Err(source) => {
                    warn!(%key, error = %source, "head before delete failed");
                    report.delete_failures.push(DeleteError {
                        key: key.clone(),
                        source,
                    });
                    continue;
                }
            };
            if let Some(reason) = skip {
                debug!(%key, reason = reason.as_str(), "delete skipped");
                report.skipped_deletes.push(SkippedDelete {
                    key: key.clone(),
                    reason,
                });
                continue;
            }

            match self.retry.once("delete", || self.store.delete(key)).await {
                Ok(()) => {
                    info!(%key, "deleted orphan");
                    report.deleted.push(key.clone());
                }
                Err(source) => {
                    warn!(%key, error = %source, "delete failed");
                    report.delete_failures.push(DeleteError {
                        key: key.clone(),
                        source,
                    });
                }
            }
        }
    }

    async fn invalidate(&self, paths: Vec<ObjectKey>) -> InvalidationOutcome {
        let Some(cdn) = &self.cdn else {
            return InvalidationOutcome::Skipped;
        };
        if paths.is_empty() {
            return InvalidationOutcome::Skipped;
        }
        match self.retry.once("invalidate", || cdn.invalidate(&paths)).await {
            Ok(id) => {
                info!(%id, paths = paths.len(), "invalidation submitted");
                InvalidationOutcome::Submitted { id, paths }
            }
            Err(source) => {
                warn!(paths = paths.len(), error = %source, "invalidation failed");
                InvalidationOutcome::Failed(InvalidationError {
                    paths: paths.len(),
                    source,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryCdn, MemoryStore, StoreOp};
    use spar_classifier::MimeRegistry;
    use spar_core::{FaviconAlias, SiteLayout};
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn classifier() -> Classifier {
        Classifier::new(Arc::new(MimeRegistry::builtin()), SiteLayout::default())
    }

    fn site(files: &[&str]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for file in files {
            let path = dir.path().join(file);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, file.as_bytes()).unwrap();
        }
        dir
    }

    fn plan(uploads: &[&str], deletes: &[&str], alias: Option<&str>) -> ReconciliationPlan {
        let to_upload: BTreeSet<ObjectKey> = uploads.iter().map(|k| ObjectKey::from(*k)).collect();
        let index_documents: Vec<ObjectKey> = to_upload
            .iter()
            .filter(|k| k.file_name() == "index.html")
            .cloned()
            .collect();
        let favicon_alias = alias.map(|source| FaviconAlias {
            source: ObjectKey::from(source),
            target: ObjectKey::from("favicon.ico"),
        });
        let mut to_invalidate: Vec<ObjectKey> = to_upload
            .iter()
            .filter(|k| !index_documents.contains(*k))
            .cloned()
            .collect();
        if let Some(a) = &favicon_alias {
            to_invalidate.push(a.target.clone());
        }
        to_invalidate.extend(index_documents.iter().cloned());
        to_invalidate.push(ObjectKey::from("TIMESTAMP.txt"));
        ReconciliationPlan {
            generated_at: Utc::now(),
            to_upload,
            to_delete: deletes.iter().map(|k| ObjectKey::from(*k)).collect(),
            to_invalidate,
            favicon_alias,
            index_documents,
            deferred: vec![],
            unmanaged: vec![],
            timestamp_key: ObjectKey::from("TIMESTAMP.txt"),
        }
    }

    fn publisher(store: &MemoryStore, cdn: &MemoryCdn, root: &Path) -> Publisher {
        Publisher::new(Arc::new(store.clone()), classifier(), root)
            .with_cdn(Some(Arc::new(cdn.clone())))
    }

    #[tokio::test]
    async fn writes_in_phase_order() {
        let dir = site(&["assets/app-1.js", "assets/favicon-2.ico", "index.html"]);
        let store = MemoryStore::new("site");
        store.insert("assets/old.js", b"x", Utc::now() - chrono::Duration::days(2));
        let cdn = MemoryCdn::new();

        let report = publisher(&store, &cdn, dir.path())
            .publish(&plan(
                &["assets/app-1.js", "assets/favicon-2.ico", "index.html"],
                &["assets/old.js"],
                Some("assets/favicon-2.ico"),
            ))
            .await;

        assert!(report.is_success(), "{report:?}");
        let ops = store.ops();
        let copy_pos = ops
            .iter()
            .position(|op| matches!(op, StoreOp::Copy { .. }))
            .unwrap();
        let favicon_pos = ops
            .iter()
            .position(|op| *op == StoreOp::Put(ObjectKey::from("assets/favicon-2.ico")))
            .unwrap();
        let index_pos = ops
            .iter()
            .position(|op| *op == StoreOp::Put(ObjectKey::from("index.html")))
            .unwrap();
        let delete_pos = ops
            .iter()
            .position(|op| matches!(op, StoreOp::Delete(_)))
            .unwrap();
        assert!(favicon_pos < copy_pos);
        assert!(copy_pos < index_pos);
        assert!(index_pos < delete_pos);
        assert_eq!(
            ops.last(),
            Some(&StoreOp::Put(ObjectKey::from("TIMESTAMP.txt")))
        );

        let batches = cdn.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].last().unwrap().as_str(), "TIMESTAMP.txt");
        assert!(!batches[0].contains(&ObjectKey::from("assets/old.js")));
        assert_eq!(report.deleted, vec![ObjectKey::from("assets/old.js")]);
        assert_eq!(report.alias_copied, Some(ObjectKey::from("favicon.ico")));
    }

    #[tokio::test]
    async fn headers_follow_the_classifier() {
        let dir = site(&["assets/app-1.css.gz", "index.html"]);
        let store = MemoryStore::new("site");
        let cdn = MemoryCdn::new();
        publisher(&store, &cdn, dir.path())
            .publish(&plan(&["assets/app-1.css.gz", "index.html"], &[], None))
            .await;

        let css = store.get("assets/app-1.css.gz").unwrap().headers.unwrap();
        assert_eq!(css.content_type, "text/css");
        assert_eq!(css.cache_control, "public, max-age=31536000");
        assert!(css.expires.is_some());
        let index = store.get("index.html").unwrap().headers.unwrap();
        assert_eq!(index.content_type, "text/html; charset=utf-8");
        assert_eq!(index.cache_control, "public, max-age=60");

        let stamp = store.get("TIMESTAMP.txt").unwrap();
        let body = String::from_utf8(stamp.body).unwrap();
        assert!(body.ends_with('\n'));
        assert!(DateTime::parse_from_rfc3339(body.trim_end()).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_upload_blocks_all_deletes() {
        let dir = site(&["assets/app-1.js", "assets/app-2.js"]);
        let store = MemoryStore::new("site");
        store.insert("assets/old.js", b"x", Utc::now() - chrono::Duration::days(2));
        store.fail_put("assets/app-2.js", 10);
        let cdn = MemoryCdn::new();

        let report = publisher(&store, &cdn, dir.path())
            .publish(&plan(&["assets/app-1.js", "assets/app-2.js"], &["assets/old.js"], None))
            .await;

        assert!(!report.is_success());
        assert_eq!(report.upload_failures.len(), 1);
        assert_eq!(report.upload_failures[0].key.as_str(), "assets/app-2.js");
        assert!(report.deleted.is_empty());
        assert_eq!(report.skipped_deletes[0].reason, SkipReason::UploadsFailed);
        assert!(store.get("assets/old.js").is_some());
        // The run still finishes: timestamp and invalidation of what landed.
        assert!(report.timestamp_written);
        let batch = &cdn.batches()[0];
        assert!(batch.contains(&ObjectKey::from("assets/app-1.js")));
        assert!(!batch.contains(&ObjectKey::from("assets/app-2.js")));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_upload_failures_are_retried() {
        let dir = site(&["assets/app-1.js"]);
        let store = MemoryStore::new("site");
        store.fail_put("assets/app-1.js", 2);
        let cdn = MemoryCdn::new();
        let report = publisher(&store, &cdn, dir.path())
            .publish(&plan(&["assets/app-1.js"], &[], None))
            .await;
        assert!(report.is_success());
        assert_eq!(report.uploaded, vec![ObjectKey::from("assets/app-1.js")]);
    }

    #[tokio::test]
    async fn recently_rewritten_orphan_is_kept() {
        let dir = site(&[]);
        let store = MemoryStore::new("site");
        store.insert("assets/old.js", b"x", Utc::now());
        let cdn = MemoryCdn::new();
        let report = publisher(&store, &cdn, dir.path())
            .publish(&plan(&[], &["assets/old.js", "assets/gone.js"], None))
            .await;
        assert!(report.deleted.is_empty());
        let reasons: Vec<_> = report.skipped_deletes.iter().map(|s| s.reason).collect();
        assert_eq!(
            reasons,
            vec![SkipReason::Gone, SkipReason::WithinGracePeriod]
        );
    }

    #[tokio::test]
    async fn delete_failure_is_a_warning() {
        let dir = site(&[]);
        let store = MemoryStore::new("site");
        store.insert("assets/old.js", b"x", Utc::now() - chrono::Duration::days(2));
        store.fail_delete("assets/old.js");
        let cdn = MemoryCdn::new();
        let report = publisher(&store, &cdn, dir.path())
            .publish(&plan(&[], &["assets/old.js"], None))
            .await;
        assert!(report.is_success());
        assert_eq!(report.delete_failures.len(), 1);
    }

    #[tokio::test]
    async fn invalidation_failure_is_a_warning() {
        let dir = site(&["index.html"]);
        let store = MemoryStore::new("site");
        let cdn = MemoryCdn::new();
        cdn.fail_next("throttled");
        let report = publisher(&store, &cdn, dir.path())
            .publish(&plan(&["index.html"], &[], None))
            .await;
        assert!(report.is_success());
        assert!(matches!(report.invalidation, InvalidationOutcome::Failed(_)));
    }

    #[tokio::test]
    async fn dry_run_touches_nothing() {
        let dir = site(&["assets/app-1.js"]);
        let store = MemoryStore::new("site");
        store.insert("assets/old.js", b"x", Utc::now() - chrono::Duration::days(2));
        let cdn = MemoryCdn::new();
        let report = publisher(&store, &cdn, dir.path())
            .dry_run(true)
            .publish(&plan(&["assets/app-1.js"], &["assets/old.js"], None))
            .await;
        assert!(report.is_success());
        assert!(report.dry_run);
        assert_eq!(report.uploaded, vec![ObjectKey::from("assets/app-1.js")]);
        assert_eq!(report.deleted, vec![ObjectKey::from("assets/old.js")]);
        assert!(store.ops().is_empty());
        assert!(cdn.batches().is_empty());
    }

    #[tokio::test]
    async fn cancelled_run_writes_nothing() {
        let dir = site(&["assets/app-1.js"]);
        let store = MemoryStore::new("site");
        store.insert("assets/old.js", b"x", Utc::now() - chrono::Duration::days(2));
        let cdn = MemoryCdn::new();
        let token = CancellationToken::new();
        token.cancel();
        let report = publisher(&store, &cdn, dir.path())
            .with_cancellation(token)
            .publish(&plan(&["assets/app-1.js"], &["assets/old.js"], None))
            .await;
        assert!(report.cancelled);
        assert!(!report.is_success());
        assert!(store.ops().is_empty());
        assert!(cdn.batches().is_empty());
        assert_eq!(report.skipped_deletes[0].reason, SkipReason::Cancelled);
    }

    #[tokio::test]
    async fn missing_local_file_is_an_upload_failure() {
        let dir = site(&[]);
        let store = MemoryStore::new("site");
        let cdn = MemoryCdn::new();
        let report = publisher(&store, &cdn, dir.path())
            .with_retry(RetryPolicy {
                max_retries: 0,
                ..RetryPolicy::default()
            })
            .publish(&plan(&["assets/app-1.js"], &[], None))
            .await;
        assert_eq!(report.upload_failures.len(), 1);
        assert!(matches!(
            report.upload_failures[0].source,
            BackendError::Io { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_timestamp_write_fails_the_run() {
        let dir = site(&["assets/app-1.js", "index.html"]);
        let store = MemoryStore::new("site");
        store.fail_put("TIMESTAMP.txt", u32::MAX);
        let cdn = MemoryCdn::new();
        let report = publisher(&store, &cdn, dir.path())
            .publish(&plan(&["assets/app-1.js", "index.html"], &[], None))
            .await;

        assert!(!report.is_success());
        assert!(!report.timestamp_written);
        let failure = report.timestamp_error.as_ref().unwrap();
        assert_eq!(failure.key.as_str(), "TIMESTAMP.txt");
        assert!(store.get("TIMESTAMP.txt").is_none());

        // What did land is still invalidated, without the marker.
        let batch = &cdn.batches()[0];
        assert!(batch.contains(&ObjectKey::from("index.html")));
        assert!(!batch.contains(&ObjectKey::from("TIMESTAMP.txt")));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_favicon_upload_skips_the_alias_copy() {
        let dir = site(&["assets/favicon-2.ico", "index.html"]);
        let store = MemoryStore::new("site");
        store.fail_put("assets/favicon-2.ico", u32::MAX);
        let cdn = MemoryCdn::new();
        let report = publisher(&store, &cdn, dir.path())
            .publish(&plan(
                &["assets/favicon-2.ico", "index.html"],
                &[],
                Some("assets/favicon-2.ico"),
            ))
            .await;

        assert!(!report.is_success());
        assert_eq!(report.alias_copied, None);
        assert!(!store
            .ops()
            .iter()
            .any(|op| matches!(op, StoreOp::Copy { .. })));
        assert!(store.get("favicon.ico").is_none());
        assert!(!cdn.batches()[0].contains(&ObjectKey::from("favicon.ico")));
    }
}
