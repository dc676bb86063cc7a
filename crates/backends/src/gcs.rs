//! Native GCS client
//!
//! Talks to GCS through object_store with application default credentials.
//! Chunked uploads use the store's multipart primitives and chunked
//! downloads use ranged reads. Serial uploads stream the file through one
//! multipart writer with a single part in flight, so memory stays bounded
//! by the part size.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use object_store::multipart::{MultipartStore, PartId};
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload, WriteMultipart};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

use gb_core::{
    BackendKind, Capabilities, Chunk, Error, LocalTarget, MIB, PartTag, Result, TransferBackend,
    UploadId,
};
use gb_core::plan::MAX_PARTS;

/// Smallest part a serial upload sends
const SERIAL_PART_SIZE: usize = 8 * MIB as usize;

const READ_BUFFER: usize = MIB as usize;

/// Object store that also exposes explicit multipart uploads
pub trait GcsStore: ObjectStore + MultipartStore {}

impl<T: ObjectStore + MultipartStore> GcsStore for T {}

/// GCS client wrapper
pub struct GcsClient {
    store: Arc<dyn GcsStore>,
}

fn store_error(e: object_store::Error) -> Error {
    match e {
        object_store::Error::NotFound { path, .. } => {
            Error::Backend(format!("object not found: {path}"))
        }
        other => Error::Backend(other.to_string()),
    }
}

impl GcsClient {
    /// Create a client for `bucket` using application default credentials
    pub fn new(bucket: impl Into<String>) -> Result<Self> {
        let bucket = bucket.into();
        let store = object_store::gcp::GoogleCloudStorageBuilder::from_env()
            .with_bucket_name(&bucket)
            .build()
            .map_err(store_error)?;
        Ok(Self::with_store(Arc::new(store)))
    }

    /// Create a client over an existing store
    pub fn with_store(store: Arc<dyn GcsStore>) -> Self {
        Self { store }
    }
}

/// Part size for a serial upload of `size` bytes, grown to stay within the
/// part limit
fn serial_part_size(size: u64) -> usize {
    let needed = size.div_ceil(MAX_PARTS as u64);
    usize::try_from(needed)
        .unwrap_or(usize::MAX)
        .max(SERIAL_PART_SIZE)
}

/// Copy `reader` into `writer`, waiting for the previous part before
/// buffering more than one part ahead
async fn stream_parts<R>(reader: &mut R, writer: &mut WriteMultipart) -> Result<u64>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_BUFFER];
    let mut sent = 0u64;
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(sent);
        }
        writer.wait_for_capacity(1).await.map_err(store_error)?;
        writer.write(&buf[..n]);
        sent += n as u64;
    }
}

#[async_trait]
impl TransferBackend for GcsClient {
    fn kind(&self) -> BackendKind {
        BackendKind::Sdk
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::full()
    }

    async fn object_size(&self, key: &str) -> Result<u64> {
        let meta = self
            .store
            .head(&ObjectPath::from(key))
            .await
            .map_err(store_error)?;
        Ok(meta.size as u64)
    }

    async fn upload_whole(&self, key: &str, source: &Path) -> Result<u64> {
        let path = ObjectPath::from(key);
        let mut file = tokio::fs::File::open(source).await?;
        let size = file.metadata().await?.len();
        if size == 0 {
            self.store
                .put(&path, PutPayload::default())
                .await
                .map_err(store_error)?;
            return Ok(0);
        }

        let upload = self.store.put_multipart(&path).await.map_err(store_error)?;
        let mut writer = WriteMultipart::new_with_chunk_size(upload, serial_part_size(size));
        match stream_parts(&mut file, &mut writer).await {
            Ok(sent) => {
                writer.finish().await.map_err(store_error)?;
                Ok(sent)
            }
            Err(e) => {
                if let Err(abort_err) = writer.abort().await {
                    tracing::warn!("Failed to abort upload of {key}: {abort_err}");
                }
                Err(e)
            }
        }
    }

    async fn download_whole(&self, key: &str, target: &LocalTarget) -> Result<u64> {
        let result = self
            .store
            .get(&ObjectPath::from(key))
            .await
            .map_err(store_error)?;

        let mut file = match target {
            LocalTarget::File(path) => Some(tokio::fs::File::create(path).await?),
            LocalTarget::Null => None,
        };

        let mut received = 0u64;
        let mut stream = result.into_stream();
        while let Some(piece) = stream.next().await {
            let piece = piece.map_err(store_error)?;
            received += piece.len() as u64;
            if let Some(file) = file.as_mut() {
                file.write_all(&piece).await?;
            }
        }
        if let Some(mut file) = file {
            file.flush().await?;
        }

        Ok(received)
    }

    async fn begin_chunked_upload(&self, key: &str) -> Result<UploadId> {
        let id = self
            .store
            .create_multipart(&ObjectPath::from(key))
            .await
            .map_err(store_error)?;
        tracing::debug!(upload_id = %id, "multipart upload created");
        Ok(UploadId(id))
    }

    async fn upload_chunk(
        &self,
        key: &str,
        upload: &UploadId,
        chunk: &Chunk,
        data: Bytes,
    ) -> Result<PartTag> {
        let part = self
            .store
            .put_part(
                &ObjectPath::from(key),
                &upload.0,
                chunk.index,
                PutPayload::from(data),
            )
            .await
            .map_err(store_error)?;

        Ok(PartTag {
            index: chunk.index,
            etag: part.content_id,
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
            .map(|p| PartId {
                content_id: p.etag,
            })
            .collect();

        self.store
            .complete_multipart(&ObjectPath::from(key), &upload.0, parts)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn abort_chunked_upload(&self, key: &str, upload: &UploadId) -> Result<()> {
        self.store
            .abort_multipart(&ObjectPath::from(key), &upload.0)
            .await
            .map_err(store_error)
    }

    async fn download_chunk(&self, key: &str, chunk: &Chunk) -> Result<Bytes> {
        let range = chunk.offset as usize..chunk.end() as usize;
        self.store
            .get_range(&ObjectPath::from(key), range)
            .await
            .map_err(store_error)
    }
}
