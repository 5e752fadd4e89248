//! Immutable extension → MIME type registry.
//!
//! Built once at startup from the built-in web table, the entries common
//! registries get wrong (`.svgz`, `.eot`), and operator overrides. Never
//! mutated afterwards; share it behind an `Arc`.

use std::collections::HashMap;

use crate::error::ClassifierError;

/// Fallback for unknown extensions.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

const BUILTIN: &[(&str, &str)] = &[
    ("html", "text/html"),
    ("htm", "text/html"),
    ("css", "text/css"),
    ("js", "application/javascript"),
    ("mjs", "application/javascript"),
    ("json", "application/json"),
    ("map", "application/json"),
    ("xml", "application/xml"),
    ("txt", "text/plain"),
    ("csv", "text/csv"),
    ("md", "text/markdown"),
    ("yml", "text/yaml"),
    ("yaml", "text/yaml"),
    ("webmanifest", "application/manifest+json"),
    ("wasm", "application/wasm"),
    ("pdf", "application/pdf"),
    ("zip", "application/zip"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("avif", "image/avif"),
    ("bmp", "image/bmp"),
    ("ico", "image/vnd.microsoft.icon"),
    ("svg", "image/svg+xml"),
    ("woff", "font/woff"),
    ("woff2", "font/woff2"),
    ("ttf", "font/ttf"),
    ("otf", "font/otf"),
    ("mp3", "audio/mpeg"),
    ("ogg", "audio/ogg"),
    ("wav", "audio/wav"),
    ("mp4", "video/mp4"),
    ("webm", "video/webm"),
];

/// Entries default registries lack; applied after [`BUILTIN`].
const PATCHES: &[(&str, &str)] = &[
    ("svgz", "image/svg+xml"),
    ("eot", "application/vnd.ms-fontobject"),
];

/// Read-only lookup table keyed by lowercase extension (no leading dot).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimeRegistry {
    by_extension: HashMap<String, String>,
}

impl Default for MimeRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl MimeRegistry {
    /// Built-in table plus the mandatory patches.
    pub fn builtin() -> Self {
        let by_extension = BUILTIN
            .iter()
            .chain(PATCHES)
            .map(|(ext, mime)| (ext.to_string(), mime.to_string()))
            .collect();
        Self { by_extension }
    }

    /// Built-in registry with `overrides` layered on top. Overrides win.
    pub fn with_overrides<'a, I>(overrides: I) -> Result<Self, ClassifierError>
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        let mut registry = Self::builtin();
        for (ext, mime) in overrides {
            let ext = ext.trim_start_matches('.').to_ascii_lowercase();
            if ext.is_empty() || ext.contains('/') {
                return Err(ClassifierError::InvalidExtension(ext));
            }
            if !is_type_subtype(mime) {
                return Err(ClassifierError::InvalidMimeType {
                    extension: ext,
                    mime: mime.clone(),
                });
            }
            registry.by_extension.insert(ext, mime.clone());
        }
        Ok(registry)
    }

    /// Exact lookup by extension, case-insensitive.
    pub fn lookup(&self, extension: &str) -> Option<&str> {
        self.by_extension
            .get(&extension.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// MIME type for a file name, falling back to [`DEFAULT_MIME_TYPE`].
    pub fn for_file_name(&self, name: &str) -> &str {
        name.rsplit_once('.')
            .and_then(|(_, ext)| self.lookup(ext))
            .unwrap_or(DEFAULT_MIME_TYPE)
    }

    pub fn len(&self) -> usize {
        self.by_extension.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_extension.is_empty()
    }
}

fn is_type_subtype(mime: &str) -> bool {
    match mime.split_once('/') {
        Some((ty, sub)) => !ty.trim().is_empty() && !sub.trim().is_empty(),
        None => false,
    }
}
