//! Access key pair used to sign requests.
//!
//! Credentials come from the declarative configuration when present and fall
//! back to the `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` environment
//! variables. Missing credentials are an error raised before any request is
//! attempted.

use std::fmt;

use crate::error::AuthError;

/// Environment variable holding the access key id.
pub const ACCESS_KEY_ID_ENV: &str = "AWS_ACCESS_KEY_ID";

/// Environment variable holding the secret access key.
pub const SECRET_ACCESS_KEY_ENV: &str = "AWS_SECRET_ACCESS_KEY";

/// An access key id and its secret.
///
/// The `Debug` implementation never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    access_key_id: String,
    secret_access_key: String,
}

impl Credentials {
    /// Create credentials from an explicit key pair.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::EmptyCredential`] if either value is empty.
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Result<Self, AuthError> {
        let access_key_id = access_key_id.into();
        let secret_access_key = secret_access_key.into();
        if access_key_id.is_empty() {
            return Err(AuthError::EmptyCredential("access_key_id"));
        }
        if secret_access_key.is_empty() {
            return Err(AuthError::EmptyCredential("secret_access_key"));
        }
        Ok(Self {
            access_key_id,
            secret_access_key,
        })
    }

    /// Resolve credentials from explicit values, falling back to the process
    /// environment for whichever value is missing.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::AccessKeyIdNotFound`] or
    /// [`AuthError::SecretAccessKeyNotFound`] when a value is neither given
    /// nor present in the environment.
    pub fn resolve(
        access_key_id: Option<String>,
        secret_access_key: Option<String>,
    ) -> Result<Self, AuthError> {
        Self::resolve_with(access_key_id, secret_access_key, |name| {
            std::env::var(name).ok()
        })
    }

    /// Like [`Credentials::resolve`] but reads fallbacks through `lookup`
    /// instead of the process environment.
    pub fn resolve_with<F>(
        access_key_id: Option<String>,
        secret_access_key: Option<String>,
        lookup: F,
    ) -> Result<Self, AuthError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let access_key_id = access_key_id
            .or_else(|| lookup(ACCESS_KEY_ID_ENV))
            .ok_or(AuthError::AccessKeyIdNotFound)?;
        let secret_access_key = secret_access_key
            .or_else(|| lookup(SECRET_ACCESS_KEY_ENV))
            .ok_or(AuthError::SecretAccessKeyNotFound)?;
        Self::new(access_key_id, secret_access_key)
    }

    /// The public access key id.
    #[must_use]
    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    /// The secret used as the HMAC key.
    #[must_use]
    pub fn secret_access_key(&self) -> &str {
        &self.secret_access_key
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}
