//! # spar-sync
//!
//! Scan the local build output, list the bucket, reconcile the two and
//! publish the difference: uploads, favicon alias, index documents, orphan
//! deletes, the timestamp marker and one CDN invalidation batch.
//!
//! Storage and CDN are reached only through the [`ObjectStore`] and
//! [`CdnInvalidator`] traits; bundled implementations live in [`backend`].

pub mod backend;
pub mod error;
pub mod format;
pub mod lister;
pub mod pipeline;
pub mod publisher;
pub mod reconcile;
pub mod retry;
pub mod scanner;

pub use backend::{
    CdnInvalidator, DirectoryStore, InvalidationId, JournalCdn, JournalEntry, ListPage,
    MemoryCdn, MemoryStore, ObjectStore,
};
pub use error::{BackendError, DeleteError, InvalidationError, SyncError, UploadError};
pub use lister::list_remote;
pub use pipeline::{DeployOptions, DeployOutcome, Deployment, RemoteStatus};
pub use publisher::{InvalidationOutcome, PublishReport, Publisher, SkipReason, SkippedDelete};
pub use reconcile::{reconcile, ReconcileInput};
pub use retry::RetryPolicy;
pub use scanner::{publishable, scan_tree};

// Re-export so callers can build a token without depending on tokio-util.
pub use tokio_util::sync::CancellationToken;
