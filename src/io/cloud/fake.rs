//! In-memory object store for tests.

use crate::io::cloud::traits::{CloudIOError, CloudResult, ErrorKind, ObjectIO};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

// Type aliases for complex nested types
type BucketStorage = Arc<Mutex<HashMap<String, BTreeMap<String, Vec<u8>>>>>;

// ============================================================================
// FakeObjectIO
// ============================================================================

/// Object store held in memory. Clones share the same buckets.
///
/// [`FakeObjectIO::fail_puts_after`] makes every upload past the first `n`
/// fail, which is how partial-write behavior is exercised.
#[derive(Clone, Default)]
pub struct FakeObjectIO {
    storage: BucketStorage,
    put_budget: Arc<Mutex<Option<usize>>>,
    reads: Arc<Mutex<usize>>,
}

impl FakeObjectIO {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow `n` more successful uploads; later ones fail with `ServiceUnavailable`.
    pub fn fail_puts_after(&self, n: usize) {
        *self.put_budget.lock() = Some(n);
    }

    /// Number of `get_object` calls served so far.
    #[must_use]
    pub fn read_count(&self) -> usize {
        *self.reads.lock()
    }

    /// Keys stored in `bucket`, sorted.
    #[must_use]
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.storage
            .lock()
            .get(bucket)
            .map(|b| b.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl ObjectIO for FakeObjectIO {
    fn put_object(&self, bucket: &str, key: &str, data: &[u8]) -> CloudResult<()> {
        if let Some(budget) = self.put_budget.lock().as_mut() {
            if *budget == 0 {
                return Err(CloudIOError::new(
                    ErrorKind::ServiceUnavailable,
                    format!("put {bucket}/{key} rejected"),
                ));
            }
            *budget -= 1;
        }
        self.storage
            .lock()
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), data.to_vec());
        Ok(())
    }

    fn get_object(&self, bucket: &str, key: &str) -> CloudResult<Vec<u8>> {
        *self.reads.lock() += 1;
        let storage = self.storage.lock();
        storage
            .get(bucket)
            .and_then(|b| b.get(key))
            .cloned()
            .ok_or_else(|| {
                CloudIOError::new(
                    ErrorKind::NotFound,
                    format!("Object {bucket}/{key} not found"),
                )
            })
    }

    fn list_objects(&self, bucket: &str, prefix: Option<&str>) -> CloudResult<Vec<String>> {
        let storage = self.storage.lock();
        let Some(bucket_map) = storage.get(bucket) else {
            return Ok(Vec::new());
        };

        Ok(bucket_map
            .keys()
            .filter(|key| prefix.is_none_or(|p| key.starts_with(p)))
            .cloned()
            .collect())
    }

    fn object_exists(&self, bucket: &str, key: &str) -> CloudResult<bool> {
        let storage = self.storage.lock();
        Ok(storage.get(bucket).is_some_and(|b| b.contains_key(key)))
    }
}
