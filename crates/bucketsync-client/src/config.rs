//! Client endpoint configuration.

use bucketsync_auth::Query;
use bucketsync_auth::canonical::encode_key;
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// Default object store endpoint.
pub const DEFAULT_HOSTNAME: &str = "s3.amazonaws.com";

/// Where and how requests are addressed.
///
/// # Examples
///
/// ```
/// use bucketsync_client::config::ClientConfig;
///
/// let config = ClientConfig::default();
/// assert_eq!(config.hostname, "s3.amazonaws.com");
/// assert_eq!(config.host("photos"), "photos.s3.amazonaws.com");
///
/// let local = ClientConfig::builder()
///     .hostname("localhost:4566")
///     .secure(false)
///     .path_style(true)
///     .build();
/// assert_eq!(local.host("photos"), "localhost:4566");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
pub struct ClientConfig {
    /// Endpoint host name, optionally with a port.
    #[builder(default = String::from(DEFAULT_HOSTNAME), setter(into))]
    pub hostname: String,

    /// Use `https` rather than `http`.
    #[builder(default = true)]
    pub secure: bool,

    /// Address buckets as `host/bucket/key` instead of `bucket.host/key`.
    #[builder(default = false)]
    pub path_style: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            hostname: String::from(DEFAULT_HOSTNAME),
            secure: true,
            path_style: false,
        }
    }
}

impl ClientConfig {
    /// Value of the `Host` header for requests on `bucket`.
    #[must_use]
    pub fn host(&self, bucket: &str) -> String {
        if self.path_style {
            self.hostname.clone()
        } else {
            format!("{bucket}.{}", self.hostname)
        }
    }

    /// Full request URL for a bucket, optional key and query.
    #[must_use]
    pub fn url(&self, bucket: &str, key: Option<&str>, query: &Query) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        let host = self.host(bucket);
        let key = key.map(encode_key).unwrap_or_default();
        let mut url = if self.path_style {
            format!("{scheme}://{host}/{bucket}/{key}")
        } else {
            format!("{scheme}://{host}/{key}")
        };
        if let Some(query) = query.to_query_string() {
            url.push('?');
            url.push_str(&query);
        }
        url
    }
}
