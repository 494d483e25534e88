//! Operations on individual keys.

use std::io::SeekFrom;
use std::path::Path;
use std::sync::Arc;

use bucketsync_auth::canonical::encode_key;
use bucketsync_client::checksums::{MULTIPART_CUTOFF, MULTIPART_PART_SIZE, part_count};
use bucketsync_client::{ClientError, S3Client, S3Request};
use bytes::Bytes;
use http::HeaderMap;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, info, warn};

use crate::error::{CoreError, Result};
use crate::executor::Executor;
use crate::keyconfig::{KeyAttributes, KeyFactory};

/// Performs upload, sync, redirect and delete on keys of one bucket.
///
/// Every write carries the headers the [`KeyFactory`] resolves for the key.
#[derive(Debug, Clone)]
pub struct KeyOperations {
    client: S3Client,
    executor: Executor,
    factory: Arc<KeyFactory>,
}

impl KeyOperations {
    /// Create key operations sharing `executor` for multipart parts.
    #[must_use]
    pub fn new(client: S3Client, executor: Executor, factory: Arc<KeyFactory>) -> Self {
        Self {
            client,
            executor,
            factory,
        }
    }

    /// Attributes configured for `name`.
    #[must_use]
    pub fn attributes(&self, name: &str) -> KeyAttributes {
        self.factory.make_key(name)
    }

    /// Upload the file at `path` to `name`.
    ///
    /// Files above the multipart cutoff are sent in parts through a nested
    /// join on the shared executor. A failed part aborts the upload and its
    /// error is returned.
    pub async fn upload(&self, name: &str, path: &Path) -> Result<()> {
        let attributes = self.attributes(name);
        let headers = attributes.headers(name)?;
        let size = tokio::fs::metadata(path)
            .await
            .map_err(|e| CoreError::io(path, e))?
            .len();
        info!(bucket = %self.client.bucket(), key = %name, path = %path.display(), size, "upload");

        if size > MULTIPART_CUTOFF {
            self.upload_multipart(name, path, size, headers).await?;
        } else {
            let body = tokio::fs::read(path)
                .await
                .map_err(|e| CoreError::io(path, e))?;
            let request = S3Request::put().key(name).headers(headers).body(body);
            self.client.execute(request).await?;
        }
        self.apply_acl(name, &attributes).await
    }

    async fn upload_multipart(
        &self,
        name: &str,
        path: &Path,
        size: u64,
        headers: HeaderMap,
    ) -> Result<()> {
        let upload_id = self.client.initiate_multipart(name, headers).await?;
        let parts = part_count(size, MULTIPART_PART_SIZE);
        debug!(key = %name, upload_id = %upload_id, parts, "multipart upload started");

        let tasks = (0..parts).map(|index| {
            let client = self.client.clone();
            let key = name.to_owned();
            let upload_id = upload_id.clone();
            let path = path.to_path_buf();
            async move {
                let offset = index * MULTIPART_PART_SIZE;
                let len = MULTIPART_PART_SIZE.min(size - offset);
                let body = read_chunk(&path, offset, len).await?;
                let number = u32::try_from(index + 1).map_err(|_| {
                    ClientError::InvalidRequest(format!("part number {} out of range", index + 1))
                })?;
                Ok::<_, CoreError>(client.upload_part(&key, &upload_id, number, body).await?)
            }
        });

        match self.executor.join(tasks).await {
            Ok(completed) => {
                self.client
                    .complete_multipart(name, &upload_id, completed)
                    .await?;
                Ok(())
            }
            Err(err) => {
                warn!(key = %name, upload_id = %upload_id, error = %err, "aborting multipart upload");
                if let Err(abort) = self.client.abort_multipart(name, &upload_id).await {
                    warn!(key = %name, upload_id = %upload_id, error = %abort, "abort failed");
                }
                Err(err)
            }
        }
    }

    /// Re-apply the configured headers to `name` in place.
    pub async fn sync(&self, name: &str) -> Result<()> {
        let attributes = self.attributes(name);
        info!(bucket = %self.client.bucket(), key = %name, "sync");
        let copy_source = format!("/{}/{}", self.client.bucket(), encode_key(name));
        let request = S3Request::put()
            .key(name)
            .headers(attributes.headers(name)?)
            .try_header("x-amz-copy-source", &copy_source)?
            .try_header("x-amz-metadata-directive", "REPLACE")?;
        self.client.execute(request).await?;
        self.apply_acl(name, &attributes).await
    }

    /// Write a zero-byte object at `name` redirecting to `url`.
    pub async fn redirect(&self, name: &str, url: &str) -> Result<()> {
        let attributes = self.attributes(name);
        info!(bucket = %self.client.bucket(), key = %name, url = %url, "redirect");
        let request = S3Request::put()
            .key(name)
            .headers(attributes.headers(name)?)
            .try_header("x-amz-website-redirect-location", url)?;
        self.client.execute(request).await?;
        self.apply_acl(name, &attributes).await
    }

    /// Delete one key.
    pub async fn delete(&self, name: &str) -> Result<()> {
        info!(bucket = %self.client.bucket(), key = %name, "delete");
        self.client.execute(S3Request::delete().key(name)).await?;
        Ok(())
    }

    /// Delete many keys with bulk requests.
    pub async fn delete_many(&self, names: &[String]) -> Result<()> {
        for name in names {
            info!(bucket = %self.client.bucket(), key = %name, "delete");
        }
        self.client.delete_keys(names).await?;
        Ok(())
    }

    async fn apply_acl(&self, name: &str, attributes: &KeyAttributes) -> Result<()> {
        if let Some(Some(policy)) = &attributes.acl {
            debug!(key = %name, "applying key acl");
            let request = S3Request::put()
                .key(name)
                .sub_resource("acl")
                .body(policy.clone());
            self.client.execute(request).await?;
        }
        Ok(())
    }
}

async fn read_chunk(path: &Path, offset: u64, len: u64) -> Result<Bytes> {
    let io = |e| CoreError::io(path, e);
    let mut file = tokio::fs::File::open(path).await.map_err(io)?;
    file.seek(SeekFrom::Start(offset)).await.map_err(io)?;
    let mut buf = Vec::with_capacity(usize::try_from(len).unwrap_or_default());
    file.take(len).read_to_end(&mut buf).await.map_err(io)?;
    if buf.len() as u64 != len {
        return Err(io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "file shrank during upload",
        )));
    }
    Ok(Bytes::from(buf))
}
