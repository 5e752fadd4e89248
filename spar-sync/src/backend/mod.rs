//! Storage and CDN collaborator interfaces.
//!
//! The deploy core only talks to these traits. Implementations shipped here:
//! - [`MemoryStore`] / [`MemoryCdn`]: in-process, with failure injection
//! - [`DirectoryStore`]: bucket backed by a local directory
//! - [`JournalCdn`]: invalidation batches appended to a JSONL journal
//!
//! Provider SDK adapters implement the same traits out of tree.

mod directory;
mod journal;
mod memory;

pub use directory::{DirectoryStore, ObjectMeta};
pub use journal::{JournalCdn, JournalEntry};
pub use memory::{MemoryCdn, MemoryStore, StoreOp, StoredObject};

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use spar_core::{ObjectKey, PublicationHeaders, RemoteObject};

use crate::error::BackendError;

/// One page of a prefix listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub objects: Vec<RemoteObject>,
    /// Continuation token for the next page; `None` on the last page.
    pub next: Option<String>,
}

/// Key/value object store with per-object metadata.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Bucket name, for logs and reports.
    fn bucket(&self) -> &str;

    /// One page of objects whose key starts with `prefix`, in key order.
    async fn list_page(
        &self,
        prefix: &str,
        continuation: Option<&str>,
    ) -> Result<ListPage, BackendError>;

    async fn put(
        &self,
        key: &ObjectKey,
        body: &[u8],
        headers: &PublicationHeaders,
    ) -> Result<(), BackendError>;

    /// Server-side copy; `headers` replace the source's metadata.
    async fn copy(
        &self,
        source: &ObjectKey,
        target: &ObjectKey,
        headers: &PublicationHeaders,
    ) -> Result<(), BackendError>;

    /// Deleting a missing key succeeds.
    async fn delete(&self, key: &ObjectKey) -> Result<(), BackendError>;

    /// Last-modified of `key`, or `None` if it does not exist.
    async fn head(&self, key: &ObjectKey) -> Result<Option<DateTime<Utc>>, BackendError>;
}

/// Identifier returned by the CDN for a submitted batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvalidationId(pub String);

impl fmt::Display for InvalidationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Schedules cache purges. Returns as soon as the batch is accepted.
#[async_trait]
pub trait CdnInvalidator: Send + Sync {
    async fn invalidate(&self, paths: &[ObjectKey]) -> Result<InvalidationId, BackendError>;
}
