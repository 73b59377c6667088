//! src/services/document_store.rs
//!
//! DocumentStore — documents and their media mapped onto object keys:
//!
//! ```text
//! {bucket}/
//!   {collection}/              zero-length placeholder
//!     {id}/
//!       data.json              the document body, including "id"
//!       {media name}           attachments
//! ```
//!
//! Writes are last-writer-wins and nothing is transactional: multi-step
//! operations leave earlier steps in place when a later one fails.

use crate::errors::{StoreError, StoreResult};
use crate::models::{
    document::Document,
    media::MediaFile,
    object::{Listing, ObjectEntry},
};
use crate::services::object_client::{DELIMITER, ObjectClient};
use bytes::Bytes;
use futures::future::join_all;
use serde::de::DeserializeOwned;
use std::{collections::BTreeSet, sync::Arc, time::Duration};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Object name holding a document's JSON body.
pub const DATA_FILE: &str = "data.json";

const JSON_CONTENT_TYPE: &str = "application/json";
const DEFAULT_URL_EXPIRY: Duration = Duration::from_secs(900);

/// What [`DocumentStore::initialize`] does when the bucket or the collection
/// placeholder is missing. One policy applies to both.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InitPolicy {
    /// Fail with `BucketNotFound` / `CollectionNotFound`.
    #[default]
    Strict,
    /// Create the bucket and write the `{collection}/` placeholder.
    AutoCreate,
}

/// A handle bound to one bucket and one collection.
///
/// Only [`DocumentStore::initialize`] produces one, after the bucket and
/// collection have been verified, so every method can assume both exist.
#[derive(Clone)]
pub struct DocumentStore {
    client: Arc<dyn ObjectClient>,
    bucket: String,
    collection: String,
    url_expiry: Duration,
}

impl std::fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore")
            .field("bucket", &self.bucket)
            .field("collection", &self.collection)
            .field("url_expiry", &self.url_expiry)
            .finish_non_exhaustive()
    }
}

impl DocumentStore {
    /// Verify (or, under [`InitPolicy::AutoCreate`], create) the bucket and
    /// the collection placeholder, then return a bound handle.
    pub async fn initialize(
        client: Arc<dyn ObjectClient>,
        bucket: &str,
        collection: &str,
        policy: InitPolicy,
    ) -> StoreResult<Self> {
        if bucket.trim().is_empty() {
            return Err(StoreError::Precondition("bucket name is empty".into()));
        }
        if collection.trim().is_empty() {
            return Err(StoreError::Precondition("collection name is empty".into()));
        }
        ensure_segment_safe("collection name", collection)?;

        let buckets = client.list_buckets().await?;
        if !buckets.iter().any(|name| name == bucket) {
            match policy {
                InitPolicy::Strict => return Err(StoreError::BucketNotFound(bucket.to_string())),
                InitPolicy::AutoCreate => {
                    client.create_bucket(bucket).await?;
                    info!("created bucket {}", bucket);
                }
            }
        }

        let mut store = Self {
            client,
            bucket: bucket.to_string(),
            collection: String::new(),
            url_expiry: DEFAULT_URL_EXPIRY,
        };

        let root = store.list_entries(None).await?;
        if !root.folders.contains(collection) {
            match policy {
                InitPolicy::Strict => {
                    return Err(StoreError::CollectionNotFound {
                        bucket: bucket.to_string(),
                        collection: collection.to_string(),
                    });
                }
                InitPolicy::AutoCreate => {
                    let placeholder = format!("{}{}", collection, DELIMITER);
                    store
                        .client
                        .put_object(bucket, &placeholder, Bytes::new(), None)
                        .await?;
                    info!("created collection {} in bucket {}", collection, bucket);
                }
            }
        }

        store.collection = collection.to_string();
        debug!("document store bound to {}/{}", bucket, collection);
        Ok(store)
    }

    /// Lifetime of URLs returned by [`DocumentStore::get_document_url`].
    pub fn with_url_expiry(mut self, url_expiry: Duration) -> Self {
        self.url_expiry = url_expiry;
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Immediate child folders and leaf objects under `prefix` (the bucket
    /// root when `None`). Names are relative to `prefix`; nothing recurses.
    pub async fn list_entries(&self, prefix: Option<&str>) -> StoreResult<Listing> {
        let output = self
            .client
            .list_objects(&self.bucket, prefix, Some(DELIMITER))
            .await?;
        if output.is_truncated {
            warn!(
                "listing of {}/{} truncated to a single page",
                self.bucket,
                prefix.unwrap_or("")
            );
        }

        let strip = |key: &str| -> String {
            let relative = match prefix {
                Some(p) => key.strip_prefix(p).unwrap_or(key),
                None => key,
            };
            relative.trim_end_matches(DELIMITER).to_string()
        };

        let folders: BTreeSet<String> = output
            .common_prefixes
            .iter()
            .map(|p| strip(p))
            .filter(|name| !name.is_empty())
            .collect();

        // The prefix's own placeholder strips to "" and is not a leaf.
        let objects = output
            .objects
            .into_iter()
            .filter_map(|obj| {
                let name = strip(&obj.key);
                (!name.is_empty()).then_some(ObjectEntry {
                    name,
                    last_modified: obj.last_modified,
                })
            })
            .collect();

        Ok(Listing { folders, objects })
    }

    /// Ids of every document with at least one object under its prefix.
    pub async fn list_document_ids(&self) -> StoreResult<Vec<String>> {
        let listing = self.list_entries(Some(&self.collection_prefix())).await?;
        Ok(listing.folders.into_iter().collect())
    }

    /// Read and parse `{collection}/{id}/data.json`.
    pub async fn get_document(&self, id: &str) -> StoreResult<Document> {
        self.get_document_as(id).await
    }

    /// Like [`DocumentStore::get_document`], deserializing into any type.
    pub async fn get_document_as<T: DeserializeOwned>(&self, id: &str) -> StoreResult<T> {
        ensure_segment_safe("document id", id)?;
        let key = self.document_key(id);
        let body = match self.client.get_object(&self.bucket, &key).await {
            Err(StoreError::ObjectNotFound { .. }) => {
                return Err(StoreError::DocumentNotFound {
                    collection: self.collection.clone(),
                    id: id.to_string(),
                });
            }
            result => result?,
        };
        serde_json::from_slice(&body).map_err(|source| StoreError::Parse { key, source })
    }

    /// Every attachment of document `id` (anything but `data.json`).
    pub async fn get_document_media(&self, id: &str) -> StoreResult<Vec<ObjectEntry>> {
        ensure_segment_safe("document id", id)?;
        let listing = self.list_entries(Some(&self.document_prefix(id))).await?;
        Ok(listing
            .objects
            .into_iter()
            .filter(|entry| entry.name != DATA_FILE)
            .collect())
    }

    /// Raw bytes of one attachment.
    pub async fn get_document_media_file(&self, id: &str, name: &str) -> StoreResult<Bytes> {
        let key = self.media_key(id, name)?;
        self.client.get_object(&self.bucket, &key).await
    }

    /// Time-limited URL for reading the document body directly from storage.
    pub async fn get_document_url(&self, id: &str) -> StoreResult<String> {
        ensure_segment_safe("document id", id)?;
        self.client
            .presign_get(&self.bucket, &self.document_key(id), self.url_expiry)
            .await
    }

    /// Write `doc` to `{collection}/{id}/data.json` and return its id.
    ///
    /// A missing or empty id is replaced by a fresh UUID. An existing id is
    /// reused as-is: the previous body is overwritten, not merged.
    pub async fn upload_document(&self, doc: Document) -> StoreResult<String> {
        let id = match doc.id() {
            Some(id) => {
                ensure_segment_safe("document id", id)?;
                id.to_string()
            }
            None => Uuid::new_v4().to_string(),
        };
        let doc = doc.with_id(id.clone());
        let key = self.document_key(&id);
        let body = serde_json::to_vec(&doc).map_err(|source| StoreError::Parse {
            key: key.clone(),
            source,
        })?;

        self.client
            .put_object(&self.bucket, &key, Bytes::from(body), Some(JSON_CONTENT_TYPE))
            .await?;
        debug!("stored document {}/{}", self.bucket, key);
        Ok(id)
    }

    /// Write every file to `{collection}/{id}/{name}` concurrently.
    ///
    /// Each issued write runs to completion; when some fail, the others stay
    /// written and the first failure is returned.
    pub async fn upload_document_media(&self, id: &str, files: Vec<MediaFile>) -> StoreResult<()> {
        ensure_segment_safe("document id", id)?;
        let mut uploads = Vec::with_capacity(files.len());
        for file in files {
            let key = self.media_key(id, &file.name)?;
            let content_type = file.content_type();
            uploads.push(async move {
                self.client
                    .put_object(&self.bucket, &key, file.data, Some(&content_type))
                    .await
            });
        }

        let total = uploads.len();
        let failures: Vec<StoreError> = join_all(uploads)
            .await
            .into_iter()
            .filter_map(Result::err)
            .collect();
        match failures.into_iter().next() {
            None => {
                debug!("stored {} media files for document {}", total, id);
                Ok(())
            }
            Some(first) => {
                warn!("media upload for document {} partially failed: {}", id, first);
                Err(first)
            }
        }
    }

    /// Upload the document, then its media. A media failure leaves the
    /// document written; an invalid media name fails before anything is.
    pub async fn upload_document_with_media(
        &self,
        doc: Document,
        files: Vec<MediaFile>,
    ) -> StoreResult<String> {
        for file in &files {
            ensure_media_name(&file.name)?;
        }
        let id = self.upload_document(doc).await?;
        self.upload_document_media(&id, files).await?;
        Ok(id)
    }

    /// Delete the document body and every attachment.
    ///
    /// Fails with `DocumentNotFound` when nothing is stored under the id.
    pub async fn delete_document(&self, id: &str) -> StoreResult<()> {
        ensure_segment_safe("document id", id)?;
        let prefix = self.document_prefix(id);
        let mut deleted = 0;
        // Listings stop at one page; deleting a page exposes the next one.
        loop {
            let output = self
                .client
                .list_objects(&self.bucket, Some(&prefix), None)
                .await?;
            let keys: Vec<String> = output.objects.into_iter().map(|obj| obj.key).collect();
            if keys.is_empty() {
                break;
            }
            self.client.delete_objects(&self.bucket, &keys).await?;
            deleted += keys.len();
            if !output.is_truncated {
                break;
            }
            debug!("listing of {} truncated, deleting the next page", prefix);
        }

        if deleted == 0 {
            return Err(StoreError::DocumentNotFound {
                collection: self.collection.clone(),
                id: id.to_string(),
            });
        }
        debug!("deleted document {} ({} objects)", id, deleted);
        Ok(())
    }

    /// Delete the named attachments. Names that do not exist are ignored.
    pub async fn delete_document_media(&self, id: &str, names: &[String]) -> StoreResult<()> {
        ensure_segment_safe("document id", id)?;
        let keys = names
            .iter()
            .map(|name| self.media_key(id, name))
            .collect::<StoreResult<Vec<_>>>()?;
        if keys.is_empty() {
            return Ok(());
        }
        self.client.delete_objects(&self.bucket, &keys).await?;
        debug!("deleted {} media files of document {}", keys.len(), id);
        Ok(())
    }

    fn collection_prefix(&self) -> String {
        format!("{}{}", self.collection, DELIMITER)
    }

    fn document_prefix(&self, id: &str) -> String {
        format!("{}{}{}", self.collection, DELIMITER, id) + DELIMITER
    }

    fn document_key(&self, id: &str) -> String {
        self.document_prefix(id) + DATA_FILE
    }

    fn media_key(&self, id: &str, name: &str) -> StoreResult<String> {
        ensure_segment_safe("document id", id)?;
        ensure_media_name(name)?;
        Ok(self.document_prefix(id) + name)
    }
}

fn ensure_media_name(name: &str) -> StoreResult<()> {
    ensure_segment_safe("media name", name)?;
    if name == DATA_FILE {
        return Err(StoreError::InvalidKey {
            kind: "media name",
            value: name.to_string(),
            reason: "is reserved for the document body",
        });
    }
    Ok(())
}

/// A single path segment: non-empty, no delimiter, no `.`/`..`, printable.
fn ensure_segment_safe(kind: &'static str, value: &str) -> StoreResult<()> {
    let reason = if value.is_empty() {
        Some("must not be empty")
    } else if value.contains(DELIMITER) {
        Some("must not contain `/`")
    } else if value == "." || value == ".." {
        Some("must not be `.` or `..`")
    } else if value.chars().any(char::is_control) {
        Some("must not contain control characters")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(StoreError::InvalidKey {
            kind,
            value: value.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}
