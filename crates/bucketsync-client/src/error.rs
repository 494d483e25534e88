//! Client error types.

use std::fmt;

use bucketsync_auth::AuthError;
use bucketsync_model::ErrorBody;
use bucketsync_xml::{XmlError, from_xml};
use http::StatusCode;

/// Boxed error produced by an [`HttpTransport`](crate::transport::HttpTransport).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A non-2xx response from the object store.
///
/// Remote errors are never retried; they carry enough context for the caller
/// to report what failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError {
    /// Provider error code, e.g. `NoSuchUpload` or `AccessDenied`.
    pub code: String,
    /// Human-readable message from the provider.
    pub message: String,
    /// HTTP status of the response.
    pub status: StatusCode,
    /// Canonical resource of the failed request.
    pub resource: String,
}

impl RemoteError {
    /// Build a remote error from a failed response.
    ///
    /// The body is parsed as the provider's `<Error>` document. Bodies that
    /// are empty or not valid XML (e.g. responses to `HEAD`) fall back to the
    /// status reason phrase.
    #[must_use]
    pub fn from_response(status: StatusCode, resource: &str, body: &[u8]) -> Self {
        match from_xml::<ErrorBody>(body) {
            Ok(error) => Self {
                code: error.code,
                message: error.message,
                status,
                resource: resource.to_owned(),
            },
            Err(_) => Self {
                code: status
                    .canonical_reason()
                    .unwrap_or("Unknown")
                    .replace(' ', ""),
                message: String::from_utf8_lossy(body).trim().to_owned(),
                status,
                resource: resource.to_owned(),
            },
        }
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) on {}: {}",
            self.code,
            self.status.as_u16(),
            self.resource,
            self.message
        )
    }
}

impl std::error::Error for RemoteError {}

/// Errors returned by [`S3Client`](crate::client::S3Client).
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The object store answered with a non-2xx status.
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// The request could not be delivered or the response not received.
    #[error("transport error")]
    Transport(#[source] BoxError),

    /// A request or response body was not valid XML for its payload type.
    #[error("XML error")]
    Xml(#[from] XmlError),

    /// The request could not be signed.
    #[error("signing failed")]
    Auth(#[from] AuthError),

    /// A header name or value could not be encoded.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// The request could not be assembled.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A 2xx response was missing something the protocol requires.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Reading a local file failed.
    #[error("I/O error")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Wrap any transport failure.
    pub fn transport(err: impl Into<BoxError>) -> Self {
        Self::Transport(err.into())
    }

    /// The provider error code when this is a remote error.
    #[must_use]
    pub fn remote_code(&self) -> Option<&str> {
        match self {
            Self::Remote(e) => Some(&e.code),
            _ => None,
        }
    }

    /// Whether this is a remote error with the given provider code.
    #[must_use]
    pub fn is_code(&self, code: &str) -> bool {
        self.remote_code() == Some(code)
    }
}
