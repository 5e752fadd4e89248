//! Complete, paginated listing of the remote asset tree.

use std::collections::HashSet;

use spar_core::RemoteObject;

use crate::backend::ObjectStore;
use crate::error::{BackendError, SyncError};
use crate::retry::RetryPolicy;

/// Every object under `prefix`, across all pages, with pseudo-directory
/// placeholders dropped.
///
/// Each page is retried on its own. If any page still fails the whole listing
/// fails: a partial listing must never feed deletion decisions.
pub async fn list_remote(
    store: &dyn ObjectStore,
    prefix: &str,
    retry: &RetryPolicy,
) -> Result<Vec<RemoteObject>, SyncError> {
    let listing_err = |source| SyncError::Listing {
        prefix: prefix.to_string(),
        source,
    };

    let mut objects = Vec::new();
    let mut seen_tokens = HashSet::new();
    let mut continuation: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let token = continuation.as_deref();
        let page = retry
            .retrying("list", prefix, || store.list_page(prefix, token))
            .await
            .map_err(listing_err)?;
        pages += 1;

        objects.extend(
            page.objects
                .into_iter()
                .filter(|o| !o.key.is_pseudo_directory()),
        );

        match page.next {
            None => break,
            Some(next) => {
                if !seen_tokens.insert(next.clone()) {
                    return Err(listing_err(BackendError::PaginationLoop {
                        prefix: prefix.to_string(),
                        token: next,
                    }));
                }
                continuation = Some(next);
            }
        }
    }

    tracing::debug!(
        bucket = store.bucket(),
        prefix,
        pages,
        objects = objects.len(),
        "listed remote objects"
    );
    Ok(objects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryStore;
    use chrono::Utc;

    fn store_with(keys: &[&str]) -> MemoryStore {
        let store = MemoryStore::new("site").with_page_size(2);
        for key in keys {
            store.insert(*key, b"x", Utc::now());
        }
        store
    }

    #[tokio::test]
    async fn collects_all_pages_and_drops_pseudo_dirs() {
        let store = store_with(&[
            "assets/",
            "assets/a.js",
            "assets/b.js",
            "assets/img/",
            "assets/img/c.png",
            "index.html",
        ]);
        let objects = list_remote(&store, "assets/", &RetryPolicy::default())
            .await
            .unwrap();
        let keys: Vec<&str> = objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["assets/a.js", "assets/b.js", "assets/img/c.png"]);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_page_fails_the_listing() {
        let store = store_with(&["assets/a", "assets/b", "assets/c", "assets/d"]);
        store.fail_list_page(1);
        let err = list_remote(&store, "assets/", &RetryPolicy::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Listing { .. }));
    }

    #[tokio::test]
    async fn repeated_token_is_detected() {
        let store = store_with(&["assets/a", "assets/b", "assets/c"]);
        store.repeat_continuation_token();
        let err = list_remote(&store, "assets/", &RetryPolicy::default())
            .await
            .unwrap_err();
        match err {
            SyncError::Listing { source, .. } => {
                assert!(matches!(source, BackendError::PaginationLoop { .. }))
            }
            other => panic!("expected listing error, got {other:?}"),
        }
    }
}
