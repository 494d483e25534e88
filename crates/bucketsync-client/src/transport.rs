//! Pluggable HTTP transport.
//!
//! [`S3Client`](crate::client::S3Client) builds and signs requests itself and
//! hands the finished `http::Request` to an [`HttpTransport`]. The default
//! transport is [`ReqwestTransport`]; tests substitute an in-memory store.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;

use crate::error::ClientError;

/// Future returned by [`HttpTransport::send`].
pub type TransportFuture<'a> =
    Pin<Box<dyn Future<Output = Result<http::Response<Bytes>, ClientError>> + Send + 'a>>;

/// Sends a signed request and returns the full response.
///
/// # Object Safety
///
/// The future is boxed so the transport can be held as
/// `Arc<dyn HttpTransport>`.
pub trait HttpTransport: Send + Sync + std::fmt::Debug + 'static {
    /// Send `request`. Non-2xx responses are returned as `Ok`; only delivery
    /// failures are errors.
    fn send(&self, request: http::Request<Bytes>) -> TransportFuture<'_>;
}

/// Transport backed by a shared `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport with a default `reqwest::Client`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport around an existing client.
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl HttpTransport for ReqwestTransport {
    fn send(&self, request: http::Request<Bytes>) -> TransportFuture<'_> {
        Box::pin(async move {
            let request = reqwest::Request::try_from(request).map_err(ClientError::transport)?;
            let response = self
                .client
                .execute(request)
                .await
                .map_err(ClientError::transport)?;

            let status = response.status();
            let headers = response.headers().clone();
            let body = response.bytes().await.map_err(ClientError::transport)?;

            let mut out = http::Response::new(body);
            *out.status_mut() = status;
            *out.headers_mut() = headers;
            Ok(out)
        })
    }
}
