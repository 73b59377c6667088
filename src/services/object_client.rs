//! The object-storage capabilities the document store is built on.
//!
//! `DocumentStore` holds an `Arc<dyn ObjectClient>` rather than extending a
//! concrete SDK client, so the S3 adapter and the in-memory implementation
//! are interchangeable.

use crate::errors::StoreResult;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Delimiter used to emulate folders in the flat key namespace.
pub const DELIMITER: &str = "/";

/// A leaf object as returned by a provider listing (full key, not stripped).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: String,
    pub last_modified: Option<DateTime<Utc>>,
    pub size: Option<u64>,
}

/// A single page of ListObjectsV2-style output.
///
/// Missing sections in a provider response are represented as empty vectors.
#[derive(Clone, Debug, Default)]
pub struct ListObjectsOutput {
    pub objects: Vec<ObjectSummary>,
    /// Full common prefixes, each ending in the delimiter (e.g. `notes/u1/`).
    pub common_prefixes: Vec<String>,
    /// True when the provider had more results than fit in this page.
    pub is_truncated: bool,
}

/// Minimal object-storage surface: buckets, single-page listing, whole-object
/// reads and writes, batched deletes and presigned reads.
#[async_trait]
pub trait ObjectClient: Send + Sync {
    /// Names of every bucket visible to the credentials.
    async fn list_buckets(&self) -> StoreResult<Vec<String>>;

    async fn create_bucket(&self, bucket: &str) -> StoreResult<()>;

    /// List keys under `prefix`, grouping on `delimiter` when one is given.
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        delimiter: Option<&str>,
    ) -> StoreResult<ListObjectsOutput>;

    /// Read a whole object. Absent keys yield `StoreError::ObjectNotFound`.
    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<Bytes>;

    /// Create or overwrite `key`.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: Option<&str>,
    ) -> StoreResult<()>;

    /// Delete `keys` in one batched call. Missing keys are not an error.
    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> StoreResult<()>;

    /// Time-limited URL granting GET access to `key`.
    async fn presign_get(&self, bucket: &str, key: &str, expires_in: Duration)
    -> StoreResult<String>;
}
