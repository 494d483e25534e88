//! Canonical resource construction for AWS Signature Version 2.
//!
//! The canonical resource is the part of the string to sign that identifies
//! what the request acts on:
//!
//! ```text
//! "/" + bucket + "/" + encoded-key + [ "?" + sub-resources ]
//! ```
//!
//! Only sub-resource query parameters (`acl`, `uploadId`, `partNumber`, ...)
//! take part in the signature. Listing parameters such as `marker` and
//! `prefix` appear in the URL but not in the canonical resource.

use std::collections::BTreeMap;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

/// Characters percent-encoded in key names.
///
/// Everything except unreserved characters (A-Z, a-z, 0-9, `-`, `_`, `.`,
/// `~`) and the `/` separator.
const KEY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

/// Query parameters that are sub-resources and therefore signed.
const SUB_RESOURCES: &[&str] = &[
    "acl",
    "cors",
    "delete",
    "lifecycle",
    "location",
    "logging",
    "notification",
    "partNumber",
    "policy",
    "requestPayment",
    "restore",
    "tagging",
    "torrent",
    "uploadId",
    "uploads",
    "versionId",
    "versioning",
    "versions",
    "website",
];

/// The query part of a request.
///
/// A bare sub-resource such as `?acl` is carried literally; parameter maps
/// are sorted by name and form-encoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Query {
    /// No query string.
    #[default]
    None,
    /// A literal query string, e.g. `acl` or `delete`.
    SubResource(String),
    /// Named parameters.
    Params(BTreeMap<String, String>),
}

impl Query {
    /// A bare sub-resource query such as `?cors`.
    pub fn sub_resource(name: impl Into<String>) -> Self {
        Self::SubResource(name.into())
    }

    /// A parameter query. Pairs whose value is `None` are dropped.
    pub fn params<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Option<V>)>,
        K: Into<String>,
        V: Into<String>,
    {
        let params: BTreeMap<String, String> = pairs
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| (k.into(), v.into())))
            .collect();
        if params.is_empty() {
            Self::None
        } else {
            Self::Params(params)
        }
    }

    /// The query string as it appears in the request URL, without the `?`.
    #[must_use]
    pub fn to_query_string(&self) -> Option<String> {
        match self {
            Self::None => None,
            Self::SubResource(s) => Some(s.clone()),
            Self::Params(params) => {
                let mut serializer = form_urlencoded::Serializer::new(String::new());
                for (k, v) in params {
                    serializer.append_pair(k, v);
                }
                Some(serializer.finish())
            }
        }
    }

    /// The signed portion of the query, including the leading `?`, or an
    /// empty string when nothing is signed.
    #[must_use]
    pub fn canonical_suffix(&self) -> String {
        match self {
            Self::None => String::new(),
            Self::SubResource(s) => format!("?{s}"),
            Self::Params(params) => {
                let signed: Vec<String> = params
                    .iter()
                    .filter(|(k, _)| SUB_RESOURCES.contains(&k.as_str()))
                    .map(|(k, v)| {
                        if v.is_empty() {
                            k.clone()
                        } else {
                            format!("{k}={v}")
                        }
                    })
                    .collect();
                if signed.is_empty() {
                    String::new()
                } else {
                    format!("?{}", signed.join("&"))
                }
            }
        }
    }
}

/// Percent-encode a key name for use in a URL path, preserving `/`.
///
/// # Examples
///
/// ```
/// use bucketsync_auth::canonical::encode_key;
///
/// assert_eq!(encode_key("docs/hello world.txt"), "docs/hello%20world.txt");
/// ```
#[must_use]
pub fn encode_key(key: &str) -> String {
    utf8_percent_encode(key, KEY_ENCODE_SET).to_string()
}

/// Build the SigV2 canonical resource for a bucket, optional key and query.
///
/// # Examples
///
/// ```
/// use bucketsync_auth::canonical::{Query, canonical_resource};
///
/// assert_eq!(canonical_resource("b", None, &Query::None), "/b/");
/// assert_eq!(canonical_resource("b", Some("k"), &Query::sub_resource("acl")), "/b/k?acl");
/// ```
#[must_use]
pub fn canonical_resource(bucket: &str, key: Option<&str>, query: &Query) -> String {
    let mut resource = format!("/{bucket}/");
    if let Some(key) = key {
        resource.push_str(&encode_key(key));
    }
    resource.push_str(&query.canonical_suffix());
    resource
}
