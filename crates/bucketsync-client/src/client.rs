//! The signed request client.
//!
//! [`S3Client`] is bound to one bucket. Every request goes through
//! [`S3Client::execute`], which:
//!
//! 1. injects `Host`, `Content-MD5` (when a body is present) and `x-amz-date`,
//! 2. signs the request with SigV2 over the canonical resource,
//! 3. records the call in the injected [`MetricsSink`],
//! 4. sends it through the [`HttpTransport`],
//! 5. maps any non-2xx response to a [`RemoteError`].
//!
//! The higher-level helpers (listing, bulk delete, multipart) are thin
//! wrappers around `execute`.

use std::fmt;
use std::sync::Arc;

use bucketsync_auth::{Credentials, Query, canonical_resource, content_md5, sign_request};
use bucketsync_model::{
    CompleteMultipartUpload, CompletedPart, Delete, InitiateMultipartUploadResult, KeyRecord,
    ListBucketResult,
};
use bucketsync_xml::{from_xml, to_xml};
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use http::header::{ETAG, HOST, HeaderMap, HeaderValue};
use tracing::{debug, warn};

use crate::checksums::md5_hex;
use crate::config::ClientConfig;
use crate::error::{ClientError, RemoteError};
use crate::metrics::{MetricsSink, NoopMetrics};
use crate::request::S3Request;
use crate::transport::{HttpTransport, ReqwestTransport};

/// Maximum number of keys in one bulk delete request.
pub const MAX_DELETE_KEYS: usize = 1000;

/// Error code returned when a multipart upload id is unknown.
pub const NO_SUCH_UPLOAD: &str = "NoSuchUpload";

/// Error code returned when the bucket does not exist.
pub const NO_SUCH_BUCKET: &str = "NoSuchBucket";

struct Inner {
    bucket: String,
    credentials: Credentials,
    config: ClientConfig,
    transport: Arc<dyn HttpTransport>,
    metrics: Arc<dyn MetricsSink>,
}

/// A cheaply cloneable client for one bucket.
#[derive(Clone)]
pub struct S3Client {
    inner: Arc<Inner>,
}

impl fmt::Debug for S3Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Client")
            .field("bucket", &self.inner.bucket)
            .field("config", &self.inner.config)
            .field("credentials", &self.inner.credentials)
            .finish_non_exhaustive()
    }
}

impl S3Client {
    /// Create a client using the reqwest transport and no metrics.
    pub fn new(bucket: impl Into<String>, credentials: Credentials, config: ClientConfig) -> Self {
        Self::with_parts(
            bucket,
            credentials,
            config,
            Arc::new(ReqwestTransport::new()),
            Arc::new(NoopMetrics),
        )
    }

    /// Create a client from explicit transport and metrics sink.
    pub fn with_parts(
        bucket: impl Into<String>,
        credentials: Credentials,
        config: ClientConfig,
        transport: Arc<dyn HttpTransport>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                bucket: bucket.into(),
                credentials,
                config,
                transport,
                metrics,
            }),
        }
    }

    /// The bucket this client addresses.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.inner.bucket
    }

    /// Sign and send a request, failing on any non-2xx status.
    pub async fn execute(&self, request: S3Request) -> Result<http::Response<Bytes>, ClientError> {
        let S3Request {
            method,
            key,
            query,
            mut headers,
            body,
        } = request;
        let bucket = self.bucket();
        let config = &self.inner.config;

        let url = config.url(bucket, key.as_deref(), &query);
        let resource = canonical_resource(bucket, key.as_deref(), &query);

        headers.insert(HOST, header_value("host", &config.host(bucket))?);
        if !body.is_empty() {
            headers.insert("content-md5", header_value("content-md5", &content_md5(&body))?);
        }

        let mut http_request = http::Request::builder()
            .method(method.clone())
            .uri(&url)
            .body(body)
            .map_err(|e| ClientError::InvalidRequest(e.to_string()))?;
        *http_request.headers_mut() = headers;
        sign_request(&mut http_request, &resource, &self.inner.credentials)?;

        debug!(method = %method, url = %url, "sending request");
        self.inner.metrics.record_call(&method);
        let response = self.inner.transport.send(http_request).await?;

        let status = response.status();
        debug!(method = %method, url = %url, status = %status, "received response");
        if !status.is_success() {
            return Err(RemoteError::from_response(status, &resource, response.body()).into());
        }
        Ok(response)
    }

    /// Fetch one listing page.
    pub async fn list_page(
        &self,
        prefix: Option<&str>,
        marker: Option<&str>,
    ) -> Result<ListBucketResult, ClientError> {
        let query = Query::params([("prefix", prefix), ("marker", marker)]);
        let response = self.execute(S3Request::get().query(query)).await?;
        Ok(from_xml(response.body())?)
    }

    /// Lazily list every key under `prefix`.
    ///
    /// Pages are fetched sequentially, each request carrying the marker from
    /// the previous page, until a page is not truncated. Calling this again
    /// starts a fresh listing.
    pub fn list_keys(&self, prefix: Option<&str>) -> BoxStream<'static, Result<KeyRecord, ClientError>> {
        let client = self.clone();
        let prefix = prefix.map(str::to_owned);

        // State is `Some(marker)` while pages remain.
        stream::try_unfold(Some(None::<String>), move |state| {
            let client = client.clone();
            let prefix = prefix.clone();
            async move {
                let Some(marker) = state else {
                    return Ok::<_, ClientError>(None);
                };
                let page = client.list_page(prefix.as_deref(), marker.as_deref()).await?;
                let next = if page.is_truncated {
                    let marker = page.continuation_marker().ok_or_else(|| {
                        ClientError::InvalidResponse(
                            "truncated listing without a continuation marker".to_owned(),
                        )
                    })?;
                    Some(Some(marker.to_owned()))
                } else {
                    None
                };
                let keys = stream::iter(page.contents.into_iter().map(Ok::<_, ClientError>));
                Ok::<_, ClientError>(Some((keys, next)))
            }
        })
        .try_flatten()
        .boxed()
    }

    /// Materialize a full listing under `prefix`.
    pub async fn list_all(&self, prefix: Option<&str>) -> Result<Vec<KeyRecord>, ClientError> {
        self.list_keys(prefix).try_collect().await
    }

    /// Delete `keys` with bulk delete requests of at most 1000 keys each.
    pub async fn delete_keys(&self, keys: &[String]) -> Result<(), ClientError> {
        for batch in keys.chunks(MAX_DELETE_KEYS) {
            let body = to_xml("Delete", &Delete::quiet(batch.iter().cloned()))?;
            debug!(bucket = %self.bucket(), count = batch.len(), "bulk delete");
            self.execute(S3Request::post().sub_resource("delete").body(body))
                .await?;
        }
        Ok(())
    }

    /// Start a multipart upload and return its upload id.
    pub async fn initiate_multipart(
        &self,
        key: &str,
        headers: HeaderMap,
    ) -> Result<String, ClientError> {
        let request = S3Request::post()
            .key(key)
            .sub_resource("uploads")
            .headers(headers);
        let response = self.execute(request).await?;
        let result: InitiateMultipartUploadResult = from_xml(response.body())?;
        Ok(result.upload_id)
    }

    /// Upload one part. The returned part carries the MD5 of `body`.
    pub async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: u32,
        body: Bytes,
    ) -> Result<CompletedPart, ClientError> {
        let etag = md5_hex(&body);
        let part = part_number.to_string();
        let query = Query::params([("partNumber", Some(part.as_str())), ("uploadId", Some(upload_id))]);
        self.execute(S3Request::put().key(key).query(query).body(body))
            .await?;
        Ok(CompletedPart { part_number, etag })
    }

    /// Finish a multipart upload. Parts are sent in ascending order.
    pub async fn complete_multipart(
        &self,
        key: &str,
        upload_id: &str,
        mut parts: Vec<CompletedPart>,
    ) -> Result<(), ClientError> {
        parts.sort_by_key(|p| p.part_number);
        let body = to_xml("CompleteMultipartUpload", &CompleteMultipartUpload { parts })?;
        let query = Query::params([("uploadId", Some(upload_id))]);
        self.execute(S3Request::post().key(key).query(query).body(body))
            .await?;
        Ok(())
    }

    /// Abort a multipart upload. An unknown upload id is not an error.
    pub async fn abort_multipart(&self, key: &str, upload_id: &str) -> Result<(), ClientError> {
        let query = Query::params([("uploadId", Some(upload_id))]);
        match self.execute(S3Request::delete().key(key).query(query)).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_code(NO_SUCH_UPLOAD) => {
                warn!(bucket = %self.bucket(), key = %key, upload_id = %upload_id, "multipart upload already gone");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

/// Entity tag of a response, unquoted.
#[must_use]
pub fn response_etag(response: &http::Response<Bytes>) -> Option<String> {
    response
        .headers()
        .get(ETAG)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim_matches('"').to_owned())
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, ClientError> {
    HeaderValue::from_str(value).map_err(|_| ClientError::InvalidHeader(name.to_owned()))
}
