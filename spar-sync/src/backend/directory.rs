//! Bucket emulation on the local filesystem.
//!
//! Layout under `<root>/<bucket>/`:
//!
//! ```text
//! assets/app-3f2a.js              object bytes
//! .spar-meta/assets/app-3f2a.js.json   headers + sha256 of the bytes
//! ```
//!
//! Last-modified is the file's mtime. Writes go to `<path>.spar.tmp` and are
//! renamed into place, so a reader never observes a half-written object.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use spar_core::{ObjectKey, PublicationHeaders, RemoteObject};

use super::{ListPage, ObjectStore};
use crate::error::{io_err, BackendError};

const META_DIR: &str = ".spar-meta";
const TMP_SUFFIX: &str = ".spar.tmp";
const PAGE_SIZE: usize = 1000;

/// Sidecar stored next to each object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub headers: PublicationHeaders,
    pub sha256: String,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct DirectoryStore {
    bucket: String,
    bucket_root: PathBuf,
    page_size: usize,
}

impl DirectoryStore {
    /// Store for `bucket` rooted at `<root>/<bucket>`. Nothing is created
    /// until the first write.
    pub fn new(root: &Path, bucket: impl Into<String>) -> Self {
        let bucket = bucket.into();
        Self {
            bucket_root: root.join(&bucket),
            bucket,
            page_size: PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn bucket_root(&self) -> &Path {
        &self.bucket_root
    }

    /// Filesystem path holding the bytes of `key`.
    pub fn object_path(&self, key: &ObjectKey) -> Result<PathBuf, BackendError> {
        validate_key(key)?;
        Ok(self.bucket_root.join(key.as_str()))
    }

    fn meta_path(&self, key: &ObjectKey) -> Result<PathBuf, BackendError> {
        validate_key(key)?;
        Ok(self
            .bucket_root
            .join(META_DIR)
            .join(format!("{}.json", key.as_str())))
    }

    /// Stored headers for `key`, if the object was written through this store.
    pub async fn metadata(&self, key: &ObjectKey) -> Result<Option<ObjectMeta>, BackendError> {
        let path = self.meta_path(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_err(path, e)),
        }
    }

    async fn write_object(
        &self,
        key: &ObjectKey,
        body: &[u8],
        headers: &PublicationHeaders,
    ) -> Result<(), BackendError> {
        let digest = {
            let mut h = Sha256::new();
            h.update(body);
            hex::encode(h.finalize())
        };
        let meta = ObjectMeta {
            headers: headers.clone(),
            sha256: digest,
            size: body.len() as u64,
        };
        let meta_json = serde_json::to_vec_pretty(&meta)?;

        // Sidecar first: an object is never visible without its headers.
        atomic_write(&self.meta_path(key)?, &meta_json).await?;
        atomic_write(&self.object_path(key)?, body).await?;
        tracing::debug!(bucket = %self.bucket, %key, "stored object");
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for DirectoryStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn list_page(
        &self,
        prefix: &str,
        continuation: Option<&str>,
    ) -> Result<ListPage, BackendError> {
        let root = self.bucket_root.clone();
        let prefix = prefix.to_string();
        let after = continuation.map(str::to_string);
        let page_size = self.page_size;

        tokio::task::spawn_blocking(move || {
            let mut objects = Vec::new();
            if root.is_dir() {
                walk(&root, &root, &prefix, &mut objects)?;
            }
            objects.sort_by(|a: &RemoteObject, b| a.key.cmp(&b.key));

            let mut rest = objects
                .into_iter()
                .filter(|o| after.as_deref().map_or(true, |a| o.key.as_str() > a));
            let page: Vec<RemoteObject> = rest.by_ref().take(page_size).collect();
            let next = if rest.next().is_some() {
                page.last().map(|o| o.key.0.clone())
            } else {
                None
            };
            Ok(ListPage {
                objects: page,
                next,
            })
        })
        .await
        .map_err(|e| BackendError::Transport(format!("listing task failed: {e}")))?
    }

    async fn put(
        &self,
        key: &ObjectKey,
        body: &[u8],
        headers: &PublicationHeaders,
    ) -> Result<(), BackendError> {
        self.write_object(key, body, headers).await
    }

    async fn copy(
        &self,
        source: &ObjectKey,
        target: &ObjectKey,
        headers: &PublicationHeaders,
    ) -> Result<(), BackendError> {
        let source_path = self.object_path(source)?;
        let body = match tokio::fs::read(&source_path).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(BackendError::NotFound {
                    key: source.clone(),
                })
            }
            Err(e) => return Err(io_err(source_path, e)),
        };
        self.write_object(target, &body, headers).await
    }

    async fn delete(&self, key: &ObjectKey) -> Result<(), BackendError> {
        for path in [self.object_path(key)?, self.meta_path(key)?] {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(io_err(path, e)),
            }
        }
        tracing::debug!(bucket = %self.bucket, %key, "deleted object");
        Ok(())
    }

    async fn head(&self, key: &ObjectKey) -> Result<Option<DateTime<Utc>>, BackendError> {
        let path = self.object_path(key)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {
                let mtime = meta.modified().map_err(|e| io_err(&path, e))?;
                Ok(Some(DateTime::<Utc>::from(mtime)))
            }
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_err(path, e)),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn validate_key(key: &ObjectKey) -> Result<(), BackendError> {
    let invalid = |reason| BackendError::InvalidKey {
        key: key.0.clone(),
        reason,
    };
    let s = key.as_str();
    if s.is_empty() {
        return Err(invalid("empty key"));
    }
    if s.starts_with('/') || s.contains('\\') {
        return Err(invalid("must be a relative '/'-separated path"));
    }
    if s.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..") {
        return Err(invalid("empty, '.' or '..' path segment"));
    }
    if s == META_DIR || s.starts_with(&format!("{META_DIR}/")) {
        return Err(invalid("reserved for object metadata"));
    }
    if s.ends_with(TMP_SUFFIX) {
        return Err(invalid("reserved for in-flight writes"));
    }
    Ok(())
}

async fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), BackendError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| io_err(parent, e))?;
    }
    let tmp = PathBuf::from(format!("{}{TMP_SUFFIX}", path.display()));
    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(io_err(path, e));
    }
    Ok(())
}

fn walk(
    root: &Path,
    dir: &Path,
    prefix: &str,
    out: &mut Vec<RemoteObject>,
) -> Result<(), BackendError> {
    let entries = std::fs::read_dir(dir).map_err(|e| io_err(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| io_err(&path, e))?;
        let name = entry.file_name();
        let name = name.to_string_lossy();

        if file_type.is_dir() {
            if dir == root && name == META_DIR {
                continue;
            }
            walk(root, &path, prefix, out)?;
        } else if file_type.is_file() {
            if name.ends_with(TMP_SUFFIX) {
                continue;
            }
            let rel = path
                .strip_prefix(root)
                .map_err(|e| io_err(&path, std::io::Error::other(e)))?;
            let key = rel.to_string_lossy().replace('\\', "/");
            if !key.starts_with(prefix) {
                continue;
            }
            let mtime = entry
                .metadata()
                .and_then(|m| m.modified())
                .map_err(|e| io_err(&path, e))?;
            out.push(RemoteObject::new(key, DateTime::<Utc>::from(mtime)));
        }
    }
    Ok(())
}
