//! # spar-classifier
//!
//! Derives publication headers (content type, cache policy, encoding) from
//! an object key. No disk or network access.
//!
//! Build a [`MimeRegistry`] once, wrap it in an `Arc`, and hand it to
//! [`Classifier::new`].

pub mod error;
pub mod headers;
pub mod mime;

pub use error::ClassifierError;
pub use headers::{CachePolicy, Classifier};
pub use mime::MimeRegistry;
