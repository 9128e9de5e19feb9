//! `aws-sdk-s3`-backed [`ObjectStore`] implementation.
//!
//! Grounded in `BSteffaniak-crime-map/packages/r2`'s `aws-config` +
//! `aws-sdk-s3` client construction pattern (spec §9 Design Notes). Every
//! export write carries the conversation's metadata as S3 object
//! user-metadata so `object_metadata` can be served from a `head_object`
//! call without a side index.
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use revops_core::object_store::{ObjectMetadata, ObjectStore, ObjectStoreError};

const META_CONVERSATION_ID: &str = "conversation-id";
const META_EXPORTED_AT: &str = "exported-at";
const META_FORMAT: &str = "format";
const META_CHANNEL: &str = "channel";
const META_SOURCE_SYSTEM: &str = "source-system";

/// An S3 bucket, optionally scoped under a key prefix (spec §6
/// `object_store_bucket`, `object_store_prefix`).
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    /// Construct a store bound to `bucket`, sharing `client` across
    /// every store the gateway holds.
    #[must_use]
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        metadata: ObjectMetadata,
    ) -> Result<(), ObjectStoreError> {
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .metadata(META_CONVERSATION_ID, &metadata.conversation_id)
            .metadata(META_EXPORTED_AT, metadata.exported_at.to_rfc3339())
            .metadata(META_FORMAT, &metadata.format)
            .metadata(META_CHANNEL, &metadata.channel);
        if let Some(source_system) = &metadata.source_system {
            request = request.metadata(META_SOURCE_SYSTEM, source_system);
        }
        request
            .send()
            .await
            .map_err(|err| ObjectStoreError::WriteFailed(err.to_string()))?;
        Ok(())
    }

    async fn object_metadata(&self, key: &str) -> Result<ObjectMetadata, ObjectStoreError> {
        let response = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|_| ObjectStoreError::NotFound(key.to_owned()))?;

        let metadata = response.metadata().cloned().unwrap_or_default();
        let exported_at = metadata
            .get(META_EXPORTED_AT)
            .and_then(|value| DateTime::parse_from_rfc3339(value).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        Ok(ObjectMetadata {
            conversation_id: metadata.get(META_CONVERSATION_ID).cloned().unwrap_or_default(),
            exported_at,
            format: metadata.get(META_FORMAT).cloned().unwrap_or_default(),
            channel: metadata.get(META_CHANNEL).cloned().unwrap_or_default(),
            source_system: metadata.get(META_SOURCE_SYSTEM).cloned(),
            size_bytes: usize::try_from(response.content_length().unwrap_or(0)).unwrap_or(0),
        })
    }
}
