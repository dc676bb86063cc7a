//! S3-compatible client
//!
//! Wraps aws-sdk-s3 pointed at the GCS XML interoperability endpoint and
//! implements both `TransferBackend` and `ListingSource` from gb-core.

use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use bytes::Bytes;

use gb_core::config::{DEFAULT_INTEROP_ENDPOINT, DEFAULT_INTEROP_REGION};
use gb_core::{
    BackendKind, Capabilities, Chunk, Error, HmacCredentials, ListingSource, LocalTarget,
    PageResponse, PartTag, Result, TransferBackend, TransferJob, TransferMode, UploadId,
};

use crate::transfer_config::TransferConfig;

/// Connection settings for the interoperability endpoint
#[derive(Debug, Clone)]
pub struct InteropOptions {
    pub endpoint: String,
    pub region: String,
    /// HMAC keys; requests are unsigned when absent
    pub credentials: Option<HmacCredentials>,
}

impl Default for InteropOptions {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_INTEROP_ENDPOINT.to_string(),
            region: DEFAULT_INTEROP_REGION.to_string(),
            credentials: None,
        }
    }
}

/// S3 client wrapper
pub struct S3Client {
    inner: aws_sdk_s3::Client,
    bucket: String,
    transfer: TransferConfig,
}

impl S3Client {
    /// Create a new S3 client for `bucket`
    pub async fn new(bucket: impl Into<String>, options: InteropOptions) -> Result<Self> {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(options.region.clone()))
            .endpoint_url(&options.endpoint);

        loader = match &options.credentials {
            Some(creds) => loader.credentials_provider(aws_credential_types::Credentials::new(
                creds.access_key.clone(),
                creds.secret_key.clone(),
                None, // session token
                None, // expiry
                "gcs-bench-hmac",
            )),
            None => loader.no_credentials(),
        };

        let config = loader.load().await;

        // GCS only understands path-style requests on the interoperability endpoint
        let s3_config = aws_sdk_s3::config::Builder::from(&config)
            .force_path_style(true)
            .build();

        Ok(Self {
            inner: aws_sdk_s3::Client::from_conf(s3_config),
            bucket: bucket.into(),
            transfer: TransferConfig::default(),
        })
    }

    pub fn with_transfer_config(mut self, transfer: TransferConfig) -> Self {
        self.transfer = transfer;
        self
    }

    pub fn transfer_config(&self) -> &TransferConfig {
        &self.transfer
    }
}

fn network<E: std::fmt::Display>(e: E) -> Error {
    Error::Backend(e.to_string())
}

#[async_trait]
impl TransferBackend for S3Client {
    fn kind(&self) -> BackendKind {
        BackendKind::Aws
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::full()
    }

    fn transfer_mode(&self, job: &TransferJob) -> TransferMode {
        if job.serial || !self.transfer.uses_multipart(job.size_bytes) {
            TransferMode::Serial
        } else {
            TransferMode::Chunked
        }
    }

    async fn object_size(&self, key: &str) -> Result<u64> {
        let response = self
            .inner
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let err_str = e.to_string();
                if err_str.contains("NotFound") || err_str.contains("NoSuchKey") {
                    Error::Backend(format!("object not found: {}/{key}", self.bucket))
                } else {
                    Error::Backend(err_str)
                }
            })?;

        Ok(response.content_length().unwrap_or(0).max(0) as u64)
    }

    async fn upload_whole(&self, key: &str, source: &Path) -> Result<u64> {
        let size = tokio::fs::metadata(source).await?.len();
        let body = ByteStream::from_path(source).await.map_err(network)?;

        self.inner
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(network)?;

        Ok(size)
    }

    async fn download_whole(&self, key: &str, target: &LocalTarget) -> Result<u64> {
        let response = self
            .inner
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(network)?;

        let mut body = response.body.into_async_read();
        let copied = match target {
            LocalTarget::File(path) => {
                let mut file = tokio::fs::File::create(path).await?;
                tokio::io::copy(&mut body, &mut file).await?
            }
            LocalTarget::Null => tokio::io::copy(&mut body, &mut tokio::io::sink()).await?,
        };

        Ok(copied)
    }

    async fn begin_chunked_upload(&self, key: &str) -> Result<UploadId> {
        let response = self
            .inner
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(network)?;

        let upload_id = response
            .upload_id()
            .ok_or_else(|| Error::Backend("multipart upload returned no upload id".into()))?;
        tracing::debug!(upload_id, "multipart upload created");
        Ok(UploadId(upload_id.to_string()))
    }

    async fn upload_chunk(
        &self,
        key: &str,
        upload: &UploadId,
        chunk: &Chunk,
        data: Bytes,
    ) -> Result<PartTag> {
        let response = self
            .inner
            .upload_part()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(&upload.0)
            .part_number(chunk.part_number())
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(network)?;

        let etag = response.e_tag().ok_or_else(|| {
            Error::Backend(format!("part {} returned no ETag", chunk.part_number()))
        })?;

        Ok(PartTag {
            index: chunk.index,
            etag: etag.to_string(),
        })
    }

    async fn complete_chunked_upload(
        &self,
        key: &str,
        upload: &UploadId,
        parts: Vec<PartTag>,
    ) -> Result<()> {
        let parts = parts
            .into_iter()
            .map(|p| {
                CompletedPart::builder()
                    .part_number(p.index as i32 + 1)
                    .e_tag(p.etag)
                    .build()
            })
            .collect();

        self.inner
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(&upload.0)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await
            .map_err(network)?;

        Ok(())
    }

    async fn abort_chunked_upload(&self, key: &str, upload: &UploadId) -> Result<()> {
        self.inner
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(&upload.0)
            .send()
            .await
            .map_err(network)?;

        Ok(())
    }

    async fn download_chunk(&self, key: &str, chunk: &Chunk) -> Result<Bytes> {
        let response = self
            .inner
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .range(chunk.http_range())
            .send()
            .await
            .map_err(network)?;

        let data = response
            .body
            .collect()
            .await
            .map_err(network)?
            .into_bytes();

        Ok(data)
    }
}

#[async_trait]
impl ListingSource for S3Client {
    async fn list_page(
        &self,
        bucket: &str,
        max_keys: i32,
        continuation_token: Option<String>,
    ) -> Result<PageResponse> {
        let response = self
            .inner
            .list_objects_v2()
            .bucket(bucket)
            .max_keys(max_keys)
            .set_continuation_token(continuation_token)
            .send()
            .await
            .map_err(network)?;

        Ok(PageResponse {
            item_count: response.contents().len(),
            next_token: response.next_continuation_token().map(str::to_string),
        })
    }

    async fn bucket_location(&self, bucket: &str) -> Result<Option<String>> {
        let response = self
            .inner
            .get_bucket_location()
            .bucket(bucket)
            .send()
            .await
            .map_err(network)?;

        Ok(response
            .location_constraint()
            .map(|c| c.as_str().to_string())
            .filter(|c| !c.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use gb_core::{Direction, MIB};

    use super::*;

    async fn client() -> S3Client {
        S3Client::new("bench-bucket", InteropOptions::default())
            .await
            .unwrap()
    }

    fn job(size: u64) -> TransferJob {
        TransferJob::new(
            Direction::Download,
            "big.bin",
            LocalTarget::File(PathBuf::from("/tmp/big.bin")),
            size,
        )
    }

    #[test]
    fn test_default_options() {
        let options = InteropOptions::default();
        assert_eq!(options.endpoint, "https://storage.googleapis.com");
        assert_eq!(options.region, "europe-west4");
        assert!(options.credentials.is_none());
    }

    #[tokio::test]
    async fn test_mode_follows_threshold() {
        let s3 = client()
            .await
            .with_transfer_config(TransferConfig::for_chunks(25 * MIB, 8));

        assert_eq!(s3.kind(), BackendKind::Aws);
        assert_eq!(s3.transfer_mode(&job(100 * MIB)), TransferMode::Chunked);
        assert_eq!(s3.transfer_mode(&job(10 * MIB)), TransferMode::Serial);
        assert_eq!(s3.transfer_mode(&job(0)), TransferMode::Serial);
        assert_eq!(
            s3.transfer_mode(&job(100 * MIB).serial(true)),
            TransferMode::Serial
        );
    }

    #[tokio::test]
    async fn test_full_capabilities() {
        let s3 = client().await;
        assert_eq!(s3.capabilities(), Capabilities::full());
        assert_eq!(s3.transfer_config(), &TransferConfig::default());
    }
}
