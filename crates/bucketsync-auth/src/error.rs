//! Error types for credential resolution and request signing.

/// Errors raised before a request is sent because it cannot be signed.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No access key id was configured or found in `AWS_ACCESS_KEY_ID`.
    #[error("access key id not found (set access_key_id or AWS_ACCESS_KEY_ID)")]
    AccessKeyIdNotFound,

    /// No secret access key was configured or found in `AWS_SECRET_ACCESS_KEY`.
    #[error("secret access key not found (set secret_access_key or AWS_SECRET_ACCESS_KEY)")]
    SecretAccessKeyNotFound,

    /// A credential was present but empty.
    #[error("empty credential: {0}")]
    EmptyCredential(&'static str),

    /// A computed header value could not be encoded as an HTTP header.
    #[error("invalid header value for {0}")]
    InvalidHeaderValue(&'static str),
}
