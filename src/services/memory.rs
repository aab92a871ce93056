//! In-memory [`ObjectStore`] used by tests. Records every call so tests can
//! assert on what reached the store.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::s3::ObjectStore;
use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Put { bucket: String, key: String },
    Delete { bucket: String, key: String },
    Presign { bucket: String, key: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: String,
}

#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<(String, String), StoredObject>>,
    calls: Mutex<Vec<StoreCall>>,
    signatures: AtomicU64,
    fail_deletes: AtomicBool,
}

impl MemoryStore {
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn fail_deletes(&self) {
        self.fail_deletes.store(true, Ordering::SeqCst);
    }

    fn record(&self, call: StoreCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), AppError> {
        self.record(StoreCall::Put {
            bucket: bucket.to_string(),
            key: key.to_string(),
        });
        self.objects.lock().unwrap().insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), AppError> {
        self.record(StoreCall::Delete {
            bucket: bucket.to_string(),
            key: key.to_string(),
        });
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(AppError::InternalServerError(
                "Failed to delete file from S3".to_string(),
            ));
        }
        self.objects
            .lock()
            .unwrap()
            .remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }

    async fn presign_get_url(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, AppError> {
        self.record(StoreCall::Presign {
            bucket: bucket.to_string(),
            key: key.to_string(),
        });
        let signature = self.signatures.fetch_add(1, Ordering::SeqCst);
        Ok(format!(
            "https://s3.test/{}/{}?X-Amz-Expires={}&X-Amz-Signature={:016x}",
            bucket,
            key,
            expires_in.as_secs(),
            signature
        ))
    }
}
