//! Request description consumed by [`S3Client::execute`](crate::client::S3Client::execute).

use bucketsync_auth::Query;
use bytes::Bytes;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::Method;

use crate::error::ClientError;

/// A request against the client's bucket, before signing.
#[derive(Debug, Clone)]
pub struct S3Request {
    /// HTTP method.
    pub method: Method,
    /// Key name, or `None` for a bucket-level request.
    pub key: Option<String>,
    /// Query string / sub-resource.
    pub query: Query,
    /// Caller-supplied headers.
    pub headers: HeaderMap,
    /// Request body; empty means no body.
    pub body: Bytes,
}

impl S3Request {
    /// A bucket-level request with no query, headers or body.
    #[must_use]
    pub fn new(method: Method) -> Self {
        Self {
            method,
            key: None,
            query: Query::None,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Shorthand for `S3Request::new(Method::GET)`.
    #[must_use]
    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    /// Shorthand for `S3Request::new(Method::PUT)`.
    #[must_use]
    pub fn put() -> Self {
        Self::new(Method::PUT)
    }

    /// Shorthand for `S3Request::new(Method::POST)`.
    #[must_use]
    pub fn post() -> Self {
        Self::new(Method::POST)
    }

    /// Shorthand for `S3Request::new(Method::DELETE)`.
    #[must_use]
    pub fn delete() -> Self {
        Self::new(Method::DELETE)
    }

    /// Target a key.
    #[must_use]
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Set the query.
    #[must_use]
    pub fn query(mut self, query: Query) -> Self {
        self.query = query;
        self
    }

    /// Target a bare sub-resource such as `?cors`.
    #[must_use]
    pub fn sub_resource(self, name: &str) -> Self {
        self.query(Query::sub_resource(name))
    }

    /// Add a header with a static value.
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Add a header from strings.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidHeader`] if the name or value is not a
    /// valid HTTP header.
    pub fn try_header(self, name: &str, value: &str) -> Result<Self, ClientError> {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ClientError::InvalidHeader(name.to_owned()))?;
        let header_value =
            HeaderValue::from_str(value).map_err(|_| ClientError::InvalidHeader(name.to_owned()))?;
        Ok(self.header(header_name, header_value))
    }

    /// Merge a header map into the request, replacing existing values.
    #[must_use]
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Set the body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }
}
