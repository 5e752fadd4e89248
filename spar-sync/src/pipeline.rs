//! End-to-end deploy run: scan → list → reconcile → publish.
//!
//! [`Deployment`] owns the wiring between a [`DeployConfig`] and the backend
//! collaborators. Fatal errors (scan, listing) are returned before any
//! mutation; everything after that is reported in the [`PublishReport`].

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use spar_classifier::{Classifier, MimeRegistry};
use spar_core::{CdnConfig, DeployConfig, LocalAsset, ReconciliationPlan};

use crate::backend::{CdnInvalidator, DirectoryStore, JournalCdn, ObjectStore};
use crate::error::SyncError;
use crate::lister::list_remote;
use crate::publisher::{PublishReport, Publisher};
use crate::reconcile::{reconcile, ReconcileInput};
use crate::retry::RetryPolicy;
use crate::scanner::scan_tree;

/// Per-run switches that do not belong in the config file.
#[derive(Debug, Clone, Default)]
pub struct DeployOptions {
    pub dry_run: bool,
    pub cancel: CancellationToken,
}

#[derive(Debug)]
pub struct DeployOutcome {
    pub plan: ReconciliationPlan,
    pub report: PublishReport,
}

/// Remote view used by `spar status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteStatus {
    pub bucket: String,
    pub prefix: String,
    /// Last-modified of the timestamp marker, i.e. the last completed deploy.
    pub last_deploy: Option<DateTime<Utc>>,
    pub object_count: usize,
}

pub struct Deployment {
    config: DeployConfig,
    store: Arc<dyn ObjectStore>,
    cdn: Option<Arc<dyn CdnInvalidator>>,
    classifier: Classifier,
    retry: RetryPolicy,
}

impl Deployment {
    /// Wire the bundled backends described by `config`.
    pub fn from_config(config: DeployConfig) -> Result<Self, SyncError> {
        let store: Arc<dyn ObjectStore> =
            Arc::new(DirectoryStore::new(&config.store.root, config.bucket.clone()));
        let cdn: Option<Arc<dyn CdnInvalidator>> = match &config.cdn {
            CdnConfig::Journal { root } => Some(Arc::new(JournalCdn::new(
                root,
                config.distribution_id().to_string(),
            ))),
            CdnConfig::Disabled => None,
        };
        Self::new(config, store, cdn)
    }

    /// Use caller-supplied backends, e.g. a provider adapter or test doubles.
    pub fn new(
        config: DeployConfig,
        store: Arc<dyn ObjectStore>,
        cdn: Option<Arc<dyn CdnInvalidator>>,
    ) -> Result<Self, SyncError> {
        let registry = MimeRegistry::with_overrides(&config.mime_types)?;
        let classifier = Classifier::new(Arc::new(registry), config.site_layout());
        let retry = RetryPolicy::from_config(&config);
        Ok(Self {
            config,
            store,
            cdn,
            classifier,
            retry,
        })
    }

    pub fn config(&self) -> &DeployConfig {
        &self.config
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Scan, list and reconcile. No mutation.
    pub async fn plan(&self, now: DateTime<Utc>) -> Result<ReconciliationPlan, SyncError> {
        let local = self.scan().await?;
        let remote = list_remote(self.store.as_ref(), &self.config.prefix, &self.retry).await?;
        let layout = self.classifier.layout();

        let plan = reconcile(&ReconcileInput {
            local: &local,
            remote: &remote,
            now,
            grace_period: self.config.grace_period(),
            layout,
        });
        tracing::info!(
            bucket = %self.config.bucket,
            local = local.len(),
            remote = remote.len(),
            uploads = plan.to_upload.len(),
            deletes = plan.to_delete.len(),
            deferred = plan.deferred.len(),
            "plan ready"
        );
        Ok(plan)
    }

    pub async fn deploy(&self, options: DeployOptions) -> Result<DeployOutcome, SyncError> {
        let plan = self.plan(Utc::now()).await?;
        let publisher = Publisher::new(
            Arc::clone(&self.store),
            self.classifier.clone(),
            &self.config.public_root,
        )
        .with_cdn(self.cdn.clone())
        .with_retry(self.retry.clone())
        .with_concurrency(self.config.concurrency)
        .with_grace_period(self.config.grace_period())
        .dry_run(options.dry_run)
        .with_cancellation(options.cancel);

        let report = publisher.publish(&plan).await;
        Ok(DeployOutcome { plan, report })
    }

    pub async fn status(&self) -> Result<RemoteStatus, SyncError> {
        let timestamp_key = &self.classifier.layout().timestamp_key;
        let last_deploy = self
            .retry
            .retrying("head", timestamp_key.as_str(), || {
                self.store.head(timestamp_key)
            })
            .await?;
        let objects = list_remote(self.store.as_ref(), &self.config.prefix, &self.retry).await?;
        Ok(RemoteStatus {
            bucket: self.config.bucket.clone(),
            prefix: self.config.prefix.clone(),
            last_deploy,
            object_count: objects.len(),
        })
    }

    async fn scan(&self) -> Result<Vec<LocalAsset>, SyncError> {
        let root: PathBuf = self.config.public_root.clone();
        let task_root = root.clone();
        tokio::task::spawn_blocking(move || scan_tree(&task_root))
            .await
            .map_err(|e| SyncError::Scan {
                path: root,
                source: std::io::Error::other(e),
            })?
    }
}
