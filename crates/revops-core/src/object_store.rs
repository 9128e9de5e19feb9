//! `ObjectStore` port (spec §6 "External Interfaces").
//!
//! Modeled on `BSteffaniak-crime-map/packages/r2`'s `aws-sdk-s3` +
//! `aws-config` client wiring — the pack's only real S3-client precedent.
//! `revops-gateway` provides the concrete `aws-sdk-s3`-backed
//! implementation; an in-memory double lives alongside this trait for
//! tests and local runs.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Errors raised by an [`ObjectStore`] implementation.
#[derive(Debug, Error)]
pub enum ObjectStoreError {
    /// The write deadline (30s, spec §5) elapsed.
    #[error("object store write timed out")]
    Timeout,
    /// The backing store rejected or failed the write.
    #[error("object store write failed: {0}")]
    WriteFailed(String),
    /// The requested object does not exist.
    #[error("object not found: {0}")]
    NotFound(String),
}

/// Metadata recorded alongside each exported object (spec §4.6
/// "Export").
#[derive(Debug, Clone)]
pub struct ObjectMetadata {
    /// The conversation this object belongs to.
    pub conversation_id: String,
    /// When the object was exported.
    pub exported_at: chrono::DateTime<chrono::Utc>,
    /// Which export format this is (`conversation.json`, ...).
    pub format: String,
    /// The origin channel description.
    pub channel: String,
    /// The origin business system, if webhook-originated.
    pub source_system: Option<String>,
    /// Size of the object body in bytes.
    pub size_bytes: usize,
}

/// A durable object store, written to once per export format (spec §4.6,
/// §6 "Object-store layout"). Writes are idempotent by key: a second
/// write with the same key overwrites.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write `body` to `key`, recording `metadata` alongside it.
    ///
    /// # Errors
    /// Returns [`ObjectStoreError`] on timeout or backend failure.
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        metadata: ObjectMetadata,
    ) -> Result<(), ObjectStoreError>;

    /// Fetch the metadata most recently written for `key`.
    ///
    /// # Errors
    /// Returns [`ObjectStoreError::NotFound`] if no object exists at
    /// `key`.
    async fn object_metadata(&self, key: &str) -> Result<ObjectMetadata, ObjectStoreError>;
}

/// An in-process object store for tests and local runs.
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    objects: Mutex<HashMap<String, (Bytes, ObjectMetadata)>>,
}

impl InMemoryObjectStore {
    /// Construct an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the keys currently written, for test assertions.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let objects = self.objects.lock().expect("object store mutex poisoned");
        objects.keys().cloned().collect()
    }

    /// Fetch the raw body written at `key`, if any.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Bytes> {
        let objects = self.objects.lock().expect("object store mutex poisoned");
        objects.get(key).map(|(body, _)| body.clone())
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        metadata: ObjectMetadata,
    ) -> Result<(), ObjectStoreError> {
        let mut objects = self.objects.lock().expect("object store mutex poisoned");
        objects.insert(key.to_owned(), (body, metadata));
        Ok(())
    }

    async fn object_metadata(&self, key: &str) -> Result<ObjectMetadata, ObjectStoreError> {
        let objects = self.objects.lock().expect("object store mutex poisoned");
        objects
            .get(key)
            .map(|(_, metadata)| metadata.clone())
            .ok_or_else(|| ObjectStoreError::NotFound(key.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn metadata() -> ObjectMetadata {
        ObjectMetadata {
            conversation_id: "c1".into(),
            exported_at: chrono::Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            format: "conversation.json".into(),
            channel: "C1".into(),
            source_system: None,
            size_bytes: 4,
        }
    }

    #[tokio::test]
    async fn put_then_metadata_round_trips() {
        let store = InMemoryObjectStore::new();
        store
            .put_object("key/conversation.json", Bytes::from_static(b"{}"), metadata())
            .await
            .unwrap();
        let meta = store.object_metadata("key/conversation.json").await.unwrap();
        assert_eq!(meta.conversation_id, "c1");
    }

    #[tokio::test]
    async fn second_write_overwrites_same_key() {
        let store = InMemoryObjectStore::new();
        store
            .put_object("key", Bytes::from_static(b"one"), metadata())
            .await
            .unwrap();
        store
            .put_object("key", Bytes::from_static(b"two"), metadata())
            .await
            .unwrap();
        assert_eq!(store.get("key").unwrap(), Bytes::from_static(b"two"));
    }

    #[tokio::test]
    async fn missing_key_is_not_found() {
        let store = InMemoryObjectStore::new();
        let err = store.object_metadata("missing").await.unwrap_err();
        assert!(matches!(err, ObjectStoreError::NotFound(_)));
    }
}
