use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use rstest::rstest;
use spar_classifier::{Classifier, MimeRegistry};
use spar_core::{ContentEncoding, ObjectKey, SiteLayout};

fn classifier() -> Classifier {
    Classifier::new(Arc::new(MimeRegistry::builtin()), SiteLayout::default())
}

#[rstest]
#[case("assets/app-abc123.js", "application/javascript", None)]
#[case("assets/app-abc123.js.gz", "application/javascript", Some(ContentEncoding::Gzip))]
#[case("assets/site-77aa.css.GZ", "text/css", Some(ContentEncoding::Gzip))]
#[case("assets/icons-55ff.svgz", "image/svg+xml", Some(ContentEncoding::Gzip))]
#[case("assets/font-0c0c.eot", "application/vnd.ms-fontobject", None)]
#[case("assets/font-0c0c.woff2", "font/woff2", None)]
#[case("assets/blob-0000", "application/octet-stream", None)]
#[case("assets/data-1234.json.gz", "application/json", Some(ContentEncoding::Gzip))]
fn content_type_and_encoding(
    #[case] key: &str,
    #[case] content_type: &str,
    #[case] encoding: Option<ContentEncoding>,
) {
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let headers = classifier().classify(&ObjectKey::from(key), now);
    assert_eq!(headers.content_type, content_type, "key {key}");
    assert_eq!(headers.content_encoding, encoding, "key {key}");
}

#[test]
fn classification_is_deterministic() {
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let key = ObjectKey::from("assets/app-abc123.js.gz");
    assert_eq!(classifier().classify(&key, now), classifier().classify(&key, now));
}

#[test]
fn operator_override_reaches_classification() {
    let mut extra = BTreeMap::new();
    extra.insert("glb".to_string(), "model/gltf-binary".to_string());
    let registry = MimeRegistry::with_overrides(&extra).expect("registry");
    let classifier = Classifier::new(Arc::new(registry), SiteLayout::default());

    let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let headers = classifier.classify(&ObjectKey::from("assets/ship-9a9a.glb"), now);
    assert_eq!(headers.content_type, "model/gltf-binary");
}
