//! In-memory store and CDN for tests and dry experiments.
//!
//! Both types are cheap `Clone` handles over shared state, so a test can
//! keep one handle for assertions while the publisher owns another.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use spar_core::{ObjectKey, PublicationHeaders, RemoteObject};

use super::{CdnInvalidator, InvalidationId, ListPage, ObjectStore};
use crate::error::BackendError;

/// Default listing page size; small so pagination is always exercised.
const DEFAULT_PAGE_SIZE: usize = 100;

/// One stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub headers: Option<PublicationHeaders>,
    pub last_modified: DateTime<Utc>,
}

/// A mutation observed by the store, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    Put(ObjectKey),
    Copy { source: ObjectKey, target: ObjectKey },
    Delete(ObjectKey),
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MemoryStore {
    bucket: String,
    inner: Arc<Mutex<StoreState>>,
}

#[derive(Debug)]
struct StoreState {
    objects: BTreeMap<ObjectKey, StoredObject>,
    page_size: usize,
    ops: Vec<StoreOp>,
    /// Remaining forced failures per key for put.
    failing_puts: HashMap<ObjectKey, u32>,
    failing_deletes: HashSet<ObjectKey>,
    /// Fail the listing page with this index (0-based).
    failing_list_page: Option<usize>,
    list_calls: usize,
    repeat_token: bool,
}

impl Default for StoreState {
    fn default() -> Self {
        Self {
            objects: BTreeMap::new(),
            page_size: DEFAULT_PAGE_SIZE,
            ops: Vec::new(),
            failing_puts: HashMap::new(),
            failing_deletes: HashSet::new(),
            failing_list_page: None,
            list_calls: 0,
            repeat_token: false,
        }
    }
}

impl MemoryStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            inner: Arc::new(Mutex::new(StoreState::default())),
        }
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with_page_size(self, page_size: usize) -> Self {
        self.state().page_size = page_size.max(1);
        self
    }

    /// Seed an object without recording an op.
    pub fn insert(&self, key: impl Into<ObjectKey>, body: &[u8], last_modified: DateTime<Utc>) {
        self.state().objects.insert(
            key.into(),
            StoredObject {
                body: body.to_vec(),
                headers: None,
                last_modified,
            },
        );
    }

    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.state().objects.get(&ObjectKey::from(key)).cloned()
    }

    pub fn keys(&self) -> Vec<ObjectKey> {
        self.state().objects.keys().cloned().collect()
    }

    pub fn ops(&self) -> Vec<StoreOp> {
        self.state().ops.clone()
    }

    pub fn list_calls(&self) -> usize {
        self.state().list_calls
    }

    /// The next `times` puts of `key` fail with a transport error.
    pub fn fail_put(&self, key: impl Into<ObjectKey>, times: u32) {
        self.state().failing_puts.insert(key.into(), times);
    }

    /// Every delete of `key` fails with a transport error.
    pub fn fail_delete(&self, key: impl Into<ObjectKey>) {
        self.state().failing_deletes.insert(key.into());
    }

    /// Listing page `page` (0-based) fails with a transport error, every time.
    pub fn fail_list_page(&self, page: usize) {
        self.state().failing_list_page = Some(page);
    }

    /// Every page returns the first page's continuation token.
    pub fn repeat_continuation_token(&self) {
        self.state().repeat_token = true;
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn list_page(
        &self,
        prefix: &str,
        continuation: Option<&str>,
    ) -> Result<ListPage, BackendError> {
        let mut state = self.state();
        let page_index = match continuation {
            None => 0,
            Some(after) => {
                let seen = state
                    .objects
                    .keys()
                    .filter(|k| k.as_str().starts_with(prefix) && k.as_str() <= after)
                    .count();
                seen / state.page_size
            }
        };
        state.list_calls += 1;
        if state.failing_list_page == Some(page_index) {
            return Err(BackendError::Transport(format!(
                "list page {page_index} unavailable"
            )));
        }

        let mut matching = state
            .objects
            .iter()
            .filter(|(key, _)| key.as_str().starts_with(prefix))
            .filter(|(key, _)| continuation.map_or(true, |after| key.as_str() > after));

        let objects: Vec<RemoteObject> = matching
            .by_ref()
            .take(state.page_size)
            .map(|(key, obj)| RemoteObject::new(key.clone(), obj.last_modified))
            .collect();
        let more = matching.next().is_some();

        let next = if state.repeat_token {
            Some("page-token".to_string())
        } else if more {
            objects.last().map(|o| o.key.0.clone())
        } else {
            None
        };
        Ok(ListPage { objects, next })
    }

    async fn put(
        &self,
        key: &ObjectKey,
        body: &[u8],
        headers: &PublicationHeaders,
    ) -> Result<(), BackendError> {
        let mut state = self.state();
        if let Some(remaining) = state.failing_puts.get_mut(key) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(BackendError::Transport(format!("put {key} rejected")));
            }
        }
        let last_modified = Utc::now();
        state.objects.insert(
            key.clone(),
            StoredObject {
                body: body.to_vec(),
                headers: Some(headers.clone()),
                last_modified,
            },
        );
        state.ops.push(StoreOp::Put(key.clone()));
        Ok(())
    }

    async fn copy(
        &self,
        source: &ObjectKey,
        target: &ObjectKey,
        headers: &PublicationHeaders,
    ) -> Result<(), BackendError> {
        let mut state = self.state();
        let body = state
            .objects
            .get(source)
            .map(|obj| obj.body.clone())
            .ok_or_else(|| BackendError::NotFound {
                key: source.clone(),
            })?;
        let last_modified = Utc::now();
        state.objects.insert(
            target.clone(),
            StoredObject {
                body,
                headers: Some(headers.clone()),
                last_modified,
            },
        );
        state.ops.push(StoreOp::Copy {
            source: source.clone(),
            target: target.clone(),
        });
        Ok(())
    }

    async fn delete(&self, key: &ObjectKey) -> Result<(), BackendError> {
        let mut state = self.state();
        if state.failing_deletes.contains(key) {
            return Err(BackendError::Transport(format!("delete {key} rejected")));
        }
        state.objects.remove(key);
        state.ops.push(StoreOp::Delete(key.clone()));
        Ok(())
    }

    async fn head(&self, key: &ObjectKey) -> Result<Option<DateTime<Utc>>, BackendError> {
        Ok(self.state().objects.get(key).map(|obj| obj.last_modified))
    }
}

// ---------------------------------------------------------------------------
// MemoryCdn
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct MemoryCdn {
    inner: Arc<Mutex<CdnState>>,
}

#[derive(Debug, Default)]
struct CdnState {
    batches: Vec<Vec<ObjectKey>>,
    fail_next: Option<String>,
}

impl MemoryCdn {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, CdnState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every accepted batch, in submission order.
    pub fn batches(&self) -> Vec<Vec<ObjectKey>> {
        self.state().batches.clone()
    }

    /// Reject the next batch with `reason`.
    pub fn fail_next(&self, reason: &str) {
        self.state().fail_next = Some(reason.to_string());
    }
}

#[async_trait]
impl CdnInvalidator for MemoryCdn {
    async fn invalidate(&self, paths: &[ObjectKey]) -> Result<InvalidationId, BackendError> {
        let mut state = self.state();
        if let Some(reason) = state.fail_next.take() {
            return Err(BackendError::Transport(reason));
        }
        state.batches.push(paths.to_vec());
        Ok(InvalidationId(format!("mem-{}", state.batches.len())))
    }
}
