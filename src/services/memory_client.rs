//! src/services/memory_client.rs
//!
//! MemoryClient — an `ObjectClient` that keeps every bucket in process memory.
//! Listing follows S3 ListObjectsV2 rules (lexicographic order, delimiter
//! grouping, single page of at most `MAX_KEYS` entries) so code exercised
//! against it behaves the same against a real provider.

use crate::errors::{StoreError, StoreResult};
use crate::services::object_client::{ListObjectsOutput, ObjectClient, ObjectSummary};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
    time::Duration,
};
use tokio::sync::RwLock;
use tracing::debug;

const MAX_KEYS: usize = 1000;
const MAX_OBJECT_KEY_LEN: usize = 1024;
const BUCKET_NAME_MAX_LEN: usize = 63;

#[derive(Clone, Debug)]
struct StoredObject {
    body: Bytes,
    content_type: Option<String>,
    etag: String,
    last_modified: DateTime<Utc>,
}

/// Metadata of a stored object, for inspection in tests and diagnostics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectInfo {
    pub content_type: Option<String>,
    pub etag: String,
    pub size: u64,
}

type Buckets = BTreeMap<String, BTreeMap<String, StoredObject>>;

/// Thread-safe in-memory object storage. Clones share the same contents.
#[derive(Clone, Debug, Default)]
pub struct MemoryClient {
    buckets: Arc<RwLock<Buckets>>,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every key currently stored in `bucket`, in lexicographic order.
    pub async fn keys(&self, bucket: &str) -> Vec<String> {
        let buckets = self.buckets.read().await;
        buckets
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn object_info(&self, bucket: &str, key: &str) -> Option<ObjectInfo> {
        let buckets = self.buckets.read().await;
        buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .map(|obj| ObjectInfo {
                content_type: obj.content_type.clone(),
                etag: obj.etag.clone(),
                size: obj.body.len() as u64,
            })
    }

    /// Basic key validation to avoid trivial path traversal vectors.
    fn ensure_key_safe(key: &str) -> StoreResult<()> {
        let reason = if key.is_empty() {
            Some("must not be empty")
        } else if key.len() > MAX_OBJECT_KEY_LEN {
            Some("must be at most 1024 bytes")
        } else if key.starts_with('/') {
            Some("must not start with `/`")
        } else if key.bytes().any(|b| b.is_ascii_control() || b == b'\\') {
            Some("must not contain control characters or backslashes")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(StoreError::InvalidKey {
                kind: "object key",
                value: key.to_string(),
                reason,
            }),
            None => Ok(()),
        }
    }

    /// Validate bucket name format.
    ///
    /// Enforces S3-like naming rules:
    /// - 1–63 characters (S3 itself also demands at least 3)
    /// - lowercase letters, digits, dots, hyphens only
    /// - cannot start/end with dot or hyphen
    /// - cannot contain consecutive dots or dot-hyphen patterns
    /// - cannot look like an IPv4 address
    fn ensure_bucket_name_safe(name: &str) -> StoreResult<()> {
        let invalid = |reason: &'static str| StoreError::InvalidKey {
            kind: "bucket name",
            value: name.to_string(),
            reason,
        };

        if name.is_empty() || name.len() > BUCKET_NAME_MAX_LEN {
            return Err(invalid("must be between 1 and 63 characters"));
        }
        if !name
            .chars()
            .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '.' | '-'))
        {
            return Err(invalid(
                "allowed characters are lowercase letters, digits, dots, and hyphens",
            ));
        }
        if name.starts_with('.')
            || name.ends_with('.')
            || name.starts_with('-')
            || name.ends_with('-')
        {
            return Err(invalid("must start and end with a lowercase letter or digit"));
        }
        if name.contains("..") || name.contains("-.") || name.contains(".-") {
            return Err(invalid(
                "cannot contain consecutive dots or dot-hyphen combinations",
            ));
        }
        if is_ipv4_like(name) {
            return Err(invalid("must not be formatted like an IP address"));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectClient for MemoryClient {
    async fn list_buckets(&self) -> StoreResult<Vec<String>> {
        Ok(self.buckets.read().await.keys().cloned().collect())
    }

    async fn create_bucket(&self, bucket: &str) -> StoreResult<()> {
        Self::ensure_bucket_name_safe(bucket)?;
        let mut buckets = self.buckets.write().await;
        if buckets.contains_key(bucket) {
            return Err(StoreError::storage(
                "create_bucket",
                format!("bucket `{}` already exists", bucket),
            ));
        }
        buckets.insert(bucket.to_string(), BTreeMap::new());
        debug!("created in-memory bucket {}", bucket);
        Ok(())
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        delimiter: Option<&str>,
    ) -> StoreResult<ListObjectsOutput> {
        let buckets = self.buckets.read().await;
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| StoreError::BucketNotFound(bucket.to_string()))?;

        let mut output = ListObjectsOutput::default();
        let mut common_prefixes = BTreeSet::new();
        let start = prefix.unwrap_or("").to_string();
        for (key, obj) in objects.range(start..) {
            if let Some(p) = prefix {
                if !key.starts_with(p) {
                    break;
                }
            }
            let grouped = delimiter.and_then(|delim| compute_common_prefix(key, prefix, delim));
            if grouped
                .as_ref()
                .is_some_and(|common| common_prefixes.contains(common))
            {
                continue;
            }
            if output.objects.len() + common_prefixes.len() >= MAX_KEYS {
                output.is_truncated = true;
                break;
            }
            match grouped {
                Some(common) => {
                    common_prefixes.insert(common);
                }
                None => output.objects.push(ObjectSummary {
                    key: key.clone(),
                    last_modified: Some(obj.last_modified),
                    size: Some(obj.body.len() as u64),
                }),
            }
        }
        output.common_prefixes = common_prefixes.into_iter().collect();
        Ok(output)
    }

    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<Bytes> {
        let buckets = self.buckets.read().await;
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| StoreError::BucketNotFound(bucket.to_string()))?;
        objects
            .get(key)
            .map(|obj| obj.body.clone())
            .ok_or_else(|| StoreError::ObjectNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: Option<&str>,
    ) -> StoreResult<()> {
        Self::ensure_key_safe(key)?;
        let mut buckets = self.buckets.write().await;
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| StoreError::BucketNotFound(bucket.to_string()))?;
        let etag = format!("{:x}", md5::compute(&body));
        debug!("put {}/{} ({} bytes)", bucket, key, body.len());
        objects.insert(
            key.to_string(),
            StoredObject {
                body,
                content_type: content_type.map(str::to_string),
                etag,
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> StoreResult<()> {
        let mut buckets = self.buckets.write().await;
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| StoreError::BucketNotFound(bucket.to_string()))?;
        for key in keys {
            if objects.remove(key).is_none() {
                debug!("object {}/{} already missing", bucket, key);
            }
        }
        Ok(())
    }

    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> StoreResult<String> {
        let expires_at = Utc::now().timestamp() + expires_in.as_secs() as i64;
        let signature = md5::compute(format!("{}/{}:{}", bucket, key, expires_at));
        Ok(format!(
            "memory://{}/{}?X-Amz-Expires={}&X-Amz-Signature={:x}",
            bucket,
            key,
            expires_in.as_secs(),
            signature
        ))
    }
}

/// Compute a synthetic "common prefix" for S3 list semantics.
///
/// Returns Some(prefix) if the key belongs to a grouped prefix, otherwise None.
fn compute_common_prefix(
    key: &str,
    requested_prefix: Option<&str>,
    delimiter: &str,
) -> Option<String> {
    let after_prefix = match requested_prefix {
        Some(prefix) => key.strip_prefix(prefix)?,
        None => key,
    };

    after_prefix.find(delimiter).map(|pos| {
        let mut combined = String::new();
        if let Some(prefix) = requested_prefix {
            combined.push_str(prefix);
        }
        combined.push_str(&after_prefix[..pos + delimiter.len()]);
        combined
    })
}

/// Check if a string matches IPv4-like dotted decimal form.
fn is_ipv4_like(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() == 4
        && parts.iter().all(|segment| {
            !segment.is_empty()
                && segment.len() <= 3
                && segment.chars().all(|c| c.is_ascii_digit())
                && segment.parse::<u8>().is_ok()
        })
}
