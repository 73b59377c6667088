//! `ObjectClient` backed by the AWS SDK, for Amazon S3 and S3-compatible
//! services (MinIO, R2, ...). Provider errors are wrapped, never retried;
//! retries and timeouts stay with the SDK's own configuration.

use crate::config::StorageSettings;
use crate::errors::{StoreError, StoreResult};
use crate::services::object_client::{ListObjectsOutput, ObjectClient, ObjectSummary};
use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    config::{BehaviorVersion, Credentials, Region},
    error::DisplayErrorContext,
    presigning::PresigningConfig,
    primitives::{ByteStream, DateTime as SmithyDateTime},
    types::{BucketLocationConstraint, CreateBucketConfiguration, Delete, ObjectIdentifier},
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::debug;

/// DeleteObjects accepts at most this many keys per request.
const DELETE_BATCH_LIMIT: usize = 1000;

/// Region in which S3 rejects an explicit location constraint.
const DEFAULT_REGION: &str = "us-east-1";

#[derive(Clone, Debug)]
pub struct S3Client {
    client: Client,
    region: String,
}

impl S3Client {
    /// Build an SDK client from resolved settings. No request is sent here.
    pub fn from_settings(settings: &StorageSettings) -> Self {
        let credentials = Credentials::new(
            settings.access_key_id.clone(),
            settings.secret_access_key.clone(),
            None,
            None,
            "doc-store",
        );
        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(settings.force_path_style);
        if let Some(endpoint) = &settings.endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        let config = builder.build();

        Self {
            client: Client::from_conf(config),
            region: settings.region.clone(),
        }
    }
}

/// Wrap an SDK failure, keeping the full error chain in the message.
fn provider_error<E>(operation: &'static str, err: E) -> StoreError
where
    E: std::error::Error,
{
    StoreError::storage(operation, DisplayErrorContext(err).to_string())
}

fn to_chrono(ts: &SmithyDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts.secs(), ts.subsec_nanos())
}

#[async_trait]
impl ObjectClient for S3Client {
    async fn list_buckets(&self) -> StoreResult<Vec<String>> {
        let output = self
            .client
            .list_buckets()
            .send()
            .await
            .map_err(|err| provider_error("list_buckets", err))?;

        Ok(output
            .buckets()
            .iter()
            .filter_map(|bucket| bucket.name().map(str::to_string))
            .collect())
    }

    async fn create_bucket(&self, bucket: &str) -> StoreResult<()> {
        let mut request = self.client.create_bucket().bucket(bucket);
        if self.region != DEFAULT_REGION {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }
        request
            .send()
            .await
            .map_err(|err| provider_error("create_bucket", err))?;
        debug!("created bucket {} in {}", bucket, self.region);
        Ok(())
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        delimiter: Option<&str>,
    ) -> StoreResult<ListObjectsOutput> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .set_prefix(prefix.map(str::to_string))
            .set_delimiter(delimiter.map(str::to_string))
            .send()
            .await
            .map_err(|err| provider_error("list_objects", err))?;

        // Absent Contents / CommonPrefixes come back as empty slices.
        let objects = output
            .contents()
            .iter()
            .filter_map(|obj| {
                obj.key().map(|key| ObjectSummary {
                    key: key.to_string(),
                    last_modified: obj.last_modified().and_then(to_chrono),
                    size: obj.size().and_then(|s| u64::try_from(s).ok()),
                })
            })
            .collect();
        let common_prefixes = output
            .common_prefixes()
            .iter()
            .filter_map(|p| p.prefix().map(str::to_string))
            .collect();

        Ok(ListObjectsOutput {
            objects,
            common_prefixes,
            is_truncated: output.is_truncated().unwrap_or(false),
        })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<Bytes> {
        let output = match self.client.get_object().bucket(bucket).key(key).send().await {
            Ok(output) => output,
            Err(err) if err.as_service_error().is_some_and(|e| e.is_no_such_key()) => {
                return Err(StoreError::ObjectNotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                });
            }
            Err(err) => return Err(provider_error("get_object", err)),
        };

        let body = output
            .body
            .collect()
            .await
            .map_err(|err| provider_error("get_object", err))?;
        Ok(body.into_bytes())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: Option<&str>,
    ) -> StoreResult<()> {
        let len = body.len();
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .set_content_type(content_type.map(str::to_string))
            .send()
            .await
            .map_err(|err| provider_error("put_object", err))?;
        debug!("put s3://{}/{} ({} bytes)", bucket, key, len);
        Ok(())
    }

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> StoreResult<()> {
        for chunk in keys.chunks(DELETE_BATCH_LIMIT) {
            let identifiers = chunk
                .iter()
                .map(|key| ObjectIdentifier::builder().key(key).build())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| StoreError::storage("delete_objects", err))?;
            let delete = Delete::builder()
                .set_objects(Some(identifiers))
                .quiet(true)
                .build()
                .map_err(|err| StoreError::storage("delete_objects", err))?;

            let output = self
                .client
                .delete_objects()
                .bucket(bucket)
                .delete(delete)
                .send()
                .await
                .map_err(|err| provider_error("delete_objects", err))?;

            // Quiet mode only reports the keys that failed.
            if let Some(failed) = output.errors().first() {
                return Err(StoreError::storage(
                    "delete_objects",
                    format!(
                        "{} of {} keys failed, first `{}`: {}",
                        output.errors().len(),
                        chunk.len(),
                        failed.key().unwrap_or("<unknown>"),
                        failed.message().unwrap_or("no message"),
                    ),
                ));
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
        let presigning = PresigningConfig::expires_in(expires_in)
            .map_err(|err| StoreError::storage("presign_get", err))?;
        let request = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|err| provider_error("presign_get", err))?;
        Ok(request.uri().to_string())
    }
}
