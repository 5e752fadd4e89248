//! Reconciler: local scan + remote listing → [`ReconciliationPlan`].
//!
//! Pure and deterministic. Given the same inputs (including `now`) it always
//! produces the same plan, and it never touches disk or network.
//!
//! Rules:
//! 1. Content-addressed files are uploaded only when their key is absent
//!    remotely.
//! 2. Special files (favicons, index documents) are uploaded on every run.
//! 3. Remote keys with no local counterpart are orphans, except the timestamp
//!    marker and the favicon alias. Orphans strictly older than the grace
//!    period are deleted, the rest are deferred.
//! 4. The invalidation list holds every key written this run in write order,
//!    with the timestamp marker last. Deleted keys never appear in it.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, Utc};

use spar_core::{
    AssetCategory, DeferredDeletion, FaviconAlias, LocalAsset, ObjectKey, ReconciliationPlan,
    RemoteObject, SiteLayout,
};

use crate::scanner::publishable;

/// Everything the reconciler looks at.
#[derive(Debug, Clone)]
pub struct ReconcileInput<'a> {
    pub local: &'a [LocalAsset],
    pub remote: &'a [RemoteObject],
    pub now: DateTime<Utc>,
    pub grace_period: Duration,
    pub layout: &'a SiteLayout,
}

pub fn reconcile(input: &ReconcileInput<'_>) -> ReconciliationPlan {
    let layout = input.layout;
    let local_files = publishable(input.local);
    let remote_keys: BTreeSet<&ObjectKey> = input.remote.iter().map(|o| &o.key).collect();

    let mut to_upload = BTreeSet::new();
    let mut favicons = BTreeSet::new();
    let mut index_documents = Vec::new();
    let mut unmanaged = Vec::new();

    for key in &local_files {
        match layout.categorize(key) {
            AssetCategory::ContentAddressed => {
                if !remote_keys.contains(key) {
                    to_upload.insert(key.clone());
                }
            }
            AssetCategory::Favicon => {
                favicons.insert(key.clone());
                to_upload.insert(key.clone());
            }
            AssetCategory::IndexDocument => {
                index_documents.push(key.clone());
                to_upload.insert(key.clone());
            }
            // Written by the publisher, never from disk.
            AssetCategory::TimestampMarker | AssetCategory::FaviconAlias => {
                tracing::debug!(%key, "local file shadows a publisher-owned key; ignored");
                unmanaged.push(key.clone());
            }
            AssetCategory::Unmanaged => unmanaged.push(key.clone()),
            AssetCategory::Reserved => {}
        }
    }

    index_documents.sort_by(|a, b| {
        a.as_str()
            .len()
            .cmp(&b.as_str().len())
            .then_with(|| a.cmp(b))
    });

    let favicon_alias = favicons.iter().next().map(|source| FaviconAlias {
        source: source.clone(),
        target: layout.favicon_alias.clone(),
    });

    let mut to_delete = BTreeSet::new();
    let mut deferred = Vec::new();
    for object in input.remote {
        if local_files.contains(&object.key) || object.key.is_pseudo_directory() {
            continue;
        }
        // Rewritten by the publisher every run.
        if matches!(
            layout.categorize(&object.key),
            AssetCategory::TimestampMarker | AssetCategory::FaviconAlias
        ) {
            continue;
        }
        let age = object.age(input.now);
        if age > input.grace_period {
            to_delete.insert(object.key.clone());
        } else {
            deferred.push(DeferredDeletion {
                key: object.key.clone(),
                last_modified: object.last_modified,
                age_secs: age.as_secs(),
            });
        }
    }
    deferred.sort_by(|a, b| a.key.cmp(&b.key));

    let mut to_invalidate: Vec<ObjectKey> = to_upload
        .iter()
        .filter(|key| !index_documents.contains(*key))
        .cloned()
        .collect();
    if let Some(alias) = &favicon_alias {
        to_invalidate.push(alias.target.clone());
    }
    to_invalidate.extend(index_documents.iter().cloned());
    to_invalidate.push(layout.timestamp_key.clone());

    ReconciliationPlan {
        generated_at: input.now,
        to_upload,
        to_delete,
        to_invalidate,
        favicon_alias,
        index_documents,
        deferred,
        unmanaged,
        timestamp_key: layout.timestamp_key.clone(),
    }
}
