//! spar core library: domain types, site layout, deploy configuration and errors.
//!
//! Public API surface:
//! - [`types`]: keys, assets, remote objects, headers and the reconciliation plan
//! - [`config`]: `spar.yaml` load / validate / template
//! - [`error`]: [`ConfigError`]

pub mod config;
pub mod error;
pub mod types;

pub use config::{CdnConfig, DeployConfig, ReservedNames, StoreConfig};
pub use error::ConfigError;
pub use types::{
    Acl, AssetCategory, ContentEncoding, DeferredDeletion, FaviconAlias, LocalAsset, ObjectKey,
    PublicationHeaders, ReconciliationPlan, RemoteObject, SiteLayout,
};
