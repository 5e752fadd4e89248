//! Key → [`PublicationHeaders`].
//!
//! Rules, in priority order:
//! 1. `.gz` → type of the name without `.gz`, `Content-Encoding: gzip`;
//!    `.svgz` → registry type, `Content-Encoding: gzip`.
//! 2. Otherwise the registry type for the extension.
//! 3. Cache policy from the key's [`AssetCategory`].

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use spar_core::{
    Acl, AssetCategory, ContentEncoding, ObjectKey, PublicationHeaders, SiteLayout,
};

use crate::mime::MimeRegistry;

pub const IMMUTABLE_MAX_AGE_SECS: u32 = 31_536_000;
pub const INDEX_MAX_AGE_SECS: u32 = 60;
pub const ALIAS_MAX_AGE_SECS: u32 = 86_400;

const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";
const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// How long clients and the CDN may keep a copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Content-addressed: one year, plus an `Expires` one year out.
    Immutable,
    /// Revalidated every minute.
    ShortLived,
    /// Stable name whose bytes may change between deploys.
    Daily,
    NoCache,
}

impl CachePolicy {
    pub fn for_category(category: AssetCategory) -> Self {
        match category {
            AssetCategory::ContentAddressed | AssetCategory::Favicon => CachePolicy::Immutable,
            AssetCategory::FaviconAlias => CachePolicy::Daily,
            AssetCategory::TimestampMarker => CachePolicy::NoCache,
            AssetCategory::IndexDocument
            | AssetCategory::Reserved
            | AssetCategory::Unmanaged => CachePolicy::ShortLived,
        }
    }

    pub fn cache_control(self) -> String {
        match self {
            CachePolicy::Immutable => format!("public, max-age={IMMUTABLE_MAX_AGE_SECS}"),
            CachePolicy::ShortLived => format!("public, max-age={INDEX_MAX_AGE_SECS}"),
            CachePolicy::Daily => format!("public, max-age={ALIAS_MAX_AGE_SECS}"),
            CachePolicy::NoCache => "no-cache".to_string(),
        }
    }

    pub fn expires(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            CachePolicy::Immutable => Some(now + Duration::days(365)),
            _ => None,
        }
    }
}

/// Pure header derivation for one site layout.
#[derive(Debug, Clone)]
pub struct Classifier {
    registry: Arc<MimeRegistry>,
    layout: SiteLayout,
}

impl Classifier {
    pub fn new(registry: Arc<MimeRegistry>, layout: SiteLayout) -> Self {
        Self { registry, layout }
    }

    pub fn layout(&self) -> &SiteLayout {
        &self.layout
    }

    pub fn category(&self, key: &ObjectKey) -> AssetCategory {
        self.layout.categorize(key)
    }

    /// Headers for `key`. `now` anchors the `Expires` header.
    pub fn classify(&self, key: &ObjectKey, now: DateTime<Utc>) -> PublicationHeaders {
        let category = self.category(key);
        let policy = CachePolicy::for_category(category);
        let (content_type, content_encoding) = match category {
            AssetCategory::IndexDocument => (HTML_CONTENT_TYPE.to_string(), None),
            AssetCategory::TimestampMarker => (TEXT_CONTENT_TYPE.to_string(), None),
            _ => self.content_type(key.file_name()),
        };

        PublicationHeaders {
            content_type,
            cache_control: policy.cache_control(),
            content_encoding,
            acl: Acl::PublicRead,
            expires: policy.expires(now),
        }
    }

    fn content_type(&self, name: &str) -> (String, Option<ContentEncoding>) {
        let lower = name.to_ascii_lowercase();
        if let Some(stripped) = lower.strip_suffix(".gz") {
            let mime = self.registry.for_file_name(stripped);
            return (mime.to_string(), Some(ContentEncoding::Gzip));
        }
        let mime = self.registry.for_file_name(&lower).to_string();
        if lower.ends_with(".svgz") {
            return (mime, Some(ContentEncoding::Gzip));
        }
        (mime, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn classifier() -> Classifier {
        Classifier::new(Arc::new(MimeRegistry::builtin()), SiteLayout::default())
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn content_addressed_is_immutable_for_a_year() {
        let h = classifier().classify(&ObjectKey::from("assets/app-abc123.js"), now());
        assert_eq!(h.content_type, "application/javascript");
        assert_eq!(h.cache_control, "public, max-age=31536000");
        assert_eq!(h.expires, Some(now() + Duration::days(365)));
        assert_eq!(h.acl, Acl::PublicRead);
        assert!(h.content_encoding.is_none());
    }

    #[test]
    fn index_document_is_short_lived_html() {
        let h = classifier().classify(&ObjectKey::from("docs/index.html"), now());
        assert_eq!(h.content_type, "text/html; charset=utf-8");
        assert_eq!(h.cache_control, "public, max-age=60");
        assert!(h.expires.is_none());
    }

    #[test]
    fn favicon_alias_is_not_immutable() {
        let h = classifier().classify(&ObjectKey::from("favicon.ico"), now());
        assert_eq!(h.cache_control, "public, max-age=86400");
        assert!(h.expires.is_none());

        let hashed = classifier().classify(&ObjectKey::from("assets/favicon-9f8e.ico"), now());
        assert_eq!(hashed.cache_control, "public, max-age=31536000");
    }

    #[test]
    fn timestamp_marker_is_uncached_text() {
        let h = classifier().classify(&ObjectKey::from("TIMESTAMP.txt"), now());
        assert_eq!(h.content_type, "text/plain; charset=utf-8");
        assert_eq!(h.cache_control, "no-cache");
    }

    #[test]
    fn gzip_type_comes_from_stripped_name() {
        let h = classifier().classify(&ObjectKey::from("assets/app-abc.css.gz"), now());
        assert_eq!(h.content_type, "text/css");
        assert_eq!(h.content_encoding, Some(ContentEncoding::Gzip));
    }

    #[test]
    fn svgz_is_gzipped_svg() {
        let h = classifier().classify(&ObjectKey::from("assets/logo-1a2b.svgz"), now());
        assert_eq!(h.content_type, "image/svg+xml");
        assert_eq!(h.content_encoding, Some(ContentEncoding::Gzip));
    }
}
