//! Deploy configuration (`spar.yaml`).
//!
//! # API pattern
//!
//! - [`DeployConfig::load_at`]: parse, resolve relative paths against the
//!   config file's directory, validate.
//! - [`write_template_at`]: `spar init`; refuses to overwrite unless forced.
//!
//! Nothing here changes the process working directory; every relative path
//! is joined onto an explicit base.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};
use crate::types::{ObjectKey, SiteLayout};

/// Default file name looked up when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "spar.yaml";

// ---------------------------------------------------------------------------
// 1. Types
// ---------------------------------------------------------------------------

/// Everything the deploy core needs to know about one site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Build output directory.
    #[serde(default = "default_public_root")]
    pub public_root: PathBuf,
    pub bucket: String,
    /// Key prefix of the content-addressed asset tree.
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// CDN distribution id; falls back to the bucket name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution: Option<String>,
    #[serde(default = "default_grace_period_secs")]
    pub grace_period_secs: u64,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub cdn: CdnConfig,
    /// Extra `extension: mime/type` entries layered over the built-in registry.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub mime_types: BTreeMap<String, String>,
    #[serde(default)]
    pub layout: ReservedNames,
}

/// Bucket storage. Buckets live at `<root>/<bucket>/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_root")]
    pub root: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: default_store_root(),
        }
    }
}

/// CDN invalidation target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CdnConfig {
    /// Append batches to `<root>/<distribution>.invalidations.jsonl`.
    Journal {
        #[serde(default = "default_cdn_root")]
        root: PathBuf,
    },
    /// No CDN in front of the bucket.
    Disabled,
}

impl Default for CdnConfig {
    fn default() -> Self {
        CdnConfig::Journal {
            root: default_cdn_root(),
        }
    }
}

/// Names with special meaning in the published site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservedNames {
    #[serde(default = "default_index_document")]
    pub index_document: String,
    #[serde(default = "default_manifest")]
    pub manifest: String,
    #[serde(default = "default_timestamp_key")]
    pub timestamp_key: String,
    #[serde(default = "default_favicon_alias")]
    pub favicon_alias: String,
}

impl Default for ReservedNames {
    fn default() -> Self {
        Self {
            index_document: default_index_document(),
            manifest: default_manifest(),
            timestamp_key: default_timestamp_key(),
            favicon_alias: default_favicon_alias(),
        }
    }
}

fn default_public_root() -> PathBuf {
    PathBuf::from("public")
}

fn default_prefix() -> String {
    "assets/".to_string()
}

fn default_grace_period_secs() -> u64 {
    60 * 60
}

fn default_concurrency() -> usize {
    16
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_store_root() -> PathBuf {
    PathBuf::from(".spar/buckets")
}

fn default_cdn_root() -> PathBuf {
    PathBuf::from(".spar/cdn")
}

fn default_index_document() -> String {
    "index.html".to_string()
}

fn default_manifest() -> String {
    "manifest.yml".to_string()
}

fn default_timestamp_key() -> String {
    "TIMESTAMP.txt".to_string()
}

fn default_favicon_alias() -> String {
    "favicon.ico".to_string()
}

// ---------------------------------------------------------------------------
// 2. Construction and accessors
// ---------------------------------------------------------------------------

impl DeployConfig {
    /// A config with every default filled in.
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            public_root: default_public_root(),
            bucket: bucket.into(),
            prefix: default_prefix(),
            distribution: None,
            grace_period_secs: default_grace_period_secs(),
            concurrency: default_concurrency(),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
            store: StoreConfig::default(),
            cdn: CdnConfig::default(),
            mime_types: BTreeMap::new(),
            layout: ReservedNames::default(),
        }
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn distribution_id(&self) -> &str {
        self.distribution.as_deref().unwrap_or(&self.bucket)
    }

    pub fn site_layout(&self) -> SiteLayout {
        SiteLayout {
            asset_prefix: self.prefix.clone(),
            index_document: self.layout.index_document.clone(),
            manifest: self.layout.manifest.clone(),
            timestamp_key: ObjectKey::from(self.layout.timestamp_key.as_str()),
            favicon_alias: ObjectKey::from(self.layout.favicon_alias.as_str()),
        }
    }

    // -----------------------------------------------------------------------
    // 3. Load
    // -----------------------------------------------------------------------

    /// Load, resolve and validate the config at `path`.
    ///
    /// Returns `ConfigError::NotFound` if absent and `ConfigError::Parse`
    /// (with path + line context) if malformed YAML.
    pub fn load_at(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        let mut config: DeployConfig =
            serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                source: e,
            })?;

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        config.resolve_relative_to(base);
        config.validate()?;
        Ok(config)
    }

    /// Join every relative path onto `base`.
    pub fn resolve_relative_to(&mut self, base: &Path) {
        self.public_root = resolve(base, &self.public_root);
        self.store.root = resolve(base, &self.store.root);
        if let CdnConfig::Journal { root } = &mut self.cdn {
            *root = resolve(base, root);
        }
    }

    /// Normalise and check field values. A prefix without a trailing `/` gets one.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.bucket.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "bucket",
                reason: "must not be empty".to_string(),
            });
        }
        if self.bucket == "." || self.bucket == ".." {
            return Err(ConfigError::Invalid {
                field: "bucket",
                reason: format!("'{}' is not a bucket name", self.bucket),
            });
        }
        if self.bucket.contains('/') || self.bucket.contains('\\') {
            return Err(ConfigError::Invalid {
                field: "bucket",
                reason: format!("'{}' must not contain path separators", self.bucket),
            });
        }

        let prefix = self.prefix.trim_start_matches('/');
        if prefix.is_empty() {
            return Err(ConfigError::Invalid {
                field: "prefix",
                reason: "must name a directory such as `assets/`".to_string(),
            });
        }
        self.prefix = if prefix.ends_with('/') {
            prefix.to_string()
        } else {
            format!("{prefix}/")
        };

        if self.concurrency == 0 {
            return Err(ConfigError::Invalid {
                field: "concurrency",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "request_timeout_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        for (ext, mime) in &self.mime_types {
            if ext.is_empty() || ext.contains('/') {
                return Err(ConfigError::Invalid {
                    field: "mime_types",
                    reason: format!("'{ext}' is not a file extension"),
                });
            }
            if !mime.contains('/') {
                return Err(ConfigError::Invalid {
                    field: "mime_types",
                    reason: format!("'{mime}' for '.{ext}' is not a type/subtype pair"),
                });
            }
        }
        Ok(())
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

// ---------------------------------------------------------------------------
// 4. Template
// ---------------------------------------------------------------------------

/// Starter config written by `spar init`.
pub fn template(bucket: &str) -> String {
    // Double-quoted so names like `123` or `yes` stay strings.
    let bucket = format!("\"{}\"", bucket.replace('\\', "\\\\").replace('"', "\\\""));
    format!(
        "\
# spar deploy configuration
bucket: {bucket}

# Build output directory and the content-addressed tree inside it.
public_root: public
prefix: assets/

# Orphaned objects younger than this are kept for clients still holding old HTML.
grace_period_secs: 3600

concurrency: 16
request_timeout_secs: 30
max_retries: 3

store:
  root: .spar/buckets

cdn:
  kind: journal
  root: .spar/cdn

# Extra MIME mappings, extension without the dot.
# mime_types:
#   webmanifest: application/manifest+json
"
    )
}

/// Write [`template`] to `path` atomically (`<path>.tmp` then rename).
pub fn write_template_at(path: &Path, bucket: &str, force: bool) -> Result<(), ConfigError> {
    if path.exists() && !force {
        return Err(ConfigError::AlreadyExists {
            path: path.to_path_buf(),
        });
    }
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
    }

    let tmp = path.with_extension("yaml.tmp");
    std::fs::write(&tmp, template(bucket)).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
