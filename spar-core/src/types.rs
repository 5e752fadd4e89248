//! Domain types for spar.
//!
//! Keys are always `/`-separated and relative to the bucket root, for local
//! and remote objects alike. Everything here is transient: a deploy run
//! recomputes all of it from the local tree and the bucket listing.

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed object key (`assets/app-3f2a.js`, `index.html`, ...).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectKey(pub String);

impl ObjectKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Final path segment of the key.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Keys ending in `/` are folder placeholders, never real objects.
    pub fn is_pseudo_directory(&self) -> bool {
        self.0.ends_with('/')
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ObjectKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ObjectKey {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl AsRef<str> for ObjectKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Local and remote entries
// ---------------------------------------------------------------------------

/// One entry of the local build output.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocalAsset {
    /// Path relative to the public root, `/`-separated.
    pub relative_path: String,
    pub is_directory: bool,
}

impl LocalAsset {
    pub fn file(relative_path: impl Into<String>) -> Self {
        Self {
            relative_path: relative_path.into(),
            is_directory: false,
        }
    }

    pub fn directory(relative_path: impl Into<String>) -> Self {
        Self {
            relative_path: relative_path.into(),
            is_directory: true,
        }
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::from(self.relative_path.as_str())
    }
}

/// One object currently stored in the bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteObject {
    pub key: ObjectKey,
    pub last_modified: DateTime<Utc>,
}

impl RemoteObject {
    pub fn new(key: impl Into<ObjectKey>, last_modified: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            last_modified,
        }
    }

    /// Age at `now`. Timestamps in the future count as zero age.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.last_modified)
            .to_std()
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Site layout and categories
// ---------------------------------------------------------------------------

/// File-name stem that marks a favicon inside the asset tree.
pub const FAVICON_STEM: &str = "favicon";

/// Where things live in the bucket and which names are special.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteLayout {
    /// Key prefix of the content-addressed tree, always ending in `/`.
    pub asset_prefix: String,
    pub index_document: String,
    pub manifest: String,
    pub timestamp_key: ObjectKey,
    pub favicon_alias: ObjectKey,
}

impl Default for SiteLayout {
    fn default() -> Self {
        Self {
            asset_prefix: "assets/".to_string(),
            index_document: "index.html".to_string(),
            manifest: "manifest.yml".to_string(),
            timestamp_key: ObjectKey::from("TIMESTAMP.txt"),
            favicon_alias: ObjectKey::from("favicon.ico"),
        }
    }
}

impl SiteLayout {
    /// The two names at the asset-tree root that never take part in diffing.
    pub fn reserved_keys(&self) -> [ObjectKey; 2] {
        [
            ObjectKey::from(format!("{}{}", self.asset_prefix, self.index_document)),
            ObjectKey::from(format!("{}{}", self.asset_prefix, self.manifest)),
        ]
    }

    pub fn is_reserved(&self, key: &ObjectKey) -> bool {
        self.reserved_keys().contains(key)
    }

    pub fn in_asset_tree(&self, key: &ObjectKey) -> bool {
        key.as_str().starts_with(&self.asset_prefix)
    }

    /// Classify a key by name alone.
    pub fn categorize(&self, key: &ObjectKey) -> AssetCategory {
        if *key == self.timestamp_key {
            return AssetCategory::TimestampMarker;
        }
        if *key == self.favicon_alias {
            return AssetCategory::FaviconAlias;
        }
        if key.file_name() == self.index_document {
            return AssetCategory::IndexDocument;
        }
        if !self.in_asset_tree(key) {
            return AssetCategory::Unmanaged;
        }
        if self.is_reserved(key) {
            return AssetCategory::Reserved;
        }
        if key.file_name().starts_with(FAVICON_STEM) {
            return AssetCategory::Favicon;
        }
        AssetCategory::ContentAddressed
    }
}

/// Publication category of a key, derived from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetCategory {
    /// Name embeds a content hash; immutable once published.
    ContentAddressed,
    /// A `favicon*` file in the asset tree; always republished.
    Favicon,
    /// The canonical `favicon.ico` at the bucket root.
    FaviconAlias,
    /// Any `index.html`, at any depth.
    IndexDocument,
    /// The last-deploy watermark object.
    TimestampMarker,
    /// Manifest at the asset-tree root; never published.
    Reserved,
    /// Outside the asset tree and not special; left alone.
    Unmanaged,
}

// ---------------------------------------------------------------------------
// Publication headers
// ---------------------------------------------------------------------------

/// Canned object ACL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Acl {
    #[default]
    PublicRead,
    Private,
}

impl Acl {
    pub fn as_str(self) -> &'static str {
        match self {
            Acl::PublicRead => "public-read",
            Acl::Private => "private",
        }
    }
}

impl fmt::Display for Acl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentEncoding {
    Gzip,
}

impl ContentEncoding {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentEncoding::Gzip => "gzip",
        }
    }
}

impl fmt::Display for ContentEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Object metadata attached on upload. Derived from the key only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationHeaders {
    pub content_type: String,
    pub cache_control: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_encoding: Option<ContentEncoding>,
    #[serde(default)]
    pub acl: Acl,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,
}

impl PublicationHeaders {
    /// `Expires` rendered as an HTTP-date (`Sun, 06 Nov 1994 08:49:37 GMT`).
    pub fn expires_http_date(&self) -> Option<String> {
        self.expires
            .map(|t| t.format("%a, %d %b %Y %H:%M:%S GMT").to_string())
    }
}

// ---------------------------------------------------------------------------
// Reconciliation plan
// ---------------------------------------------------------------------------

/// The favicon file promoted to the canonical alias key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaviconAlias {
    pub source: ObjectKey,
    pub target: ObjectKey,
}

/// An orphaned remote object kept because it is still inside the grace period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeferredDeletion {
    pub key: ObjectKey,
    pub last_modified: DateTime<Utc>,
    pub age_secs: u64,
}

/// Side-effect-free description of one deploy run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationPlan {
    pub generated_at: DateTime<Utc>,
    /// Every key written from disk this run, index documents included.
    pub to_upload: BTreeSet<ObjectKey>,
    pub to_delete: BTreeSet<ObjectKey>,
    /// Paths for the CDN batch, in write order; the timestamp key is last.
    pub to_invalidate: Vec<ObjectKey>,
    pub favicon_alias: Option<FaviconAlias>,
    /// Index documents in upload order (shortest key first).
    pub index_documents: Vec<ObjectKey>,
    pub deferred: Vec<DeferredDeletion>,
    /// Local files outside the asset tree that are not published.
    pub unmanaged: Vec<ObjectKey>,
    pub timestamp_key: ObjectKey,
}

impl ReconciliationPlan {
    /// Uploads that go through the concurrent asset phase (everything but
    /// index documents), in key order.
    pub fn asset_uploads(&self) -> impl Iterator<Item = &ObjectKey> {
        self.to_upload
            .iter()
            .filter(move |key| !self.index_documents.contains(*key))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
