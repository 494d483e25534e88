//! Per-key attribute resolution.
//!
//! A [`KeyFactory`] holds an ordered list of [`KeyConfigurator`]s. Resolving
//! a key starts from [`KeyAttributes::default`] and applies every
//! configurator whose matcher accepts the key name, in list order. Scalar
//! attributes are overwritten by later configurators; metadata entries are
//! merged one by one.

use std::collections::BTreeMap;
use std::path::Path;

use bucketsync_client::ClientError;
use http::header::{HeaderMap, HeaderName, HeaderValue};

use crate::matcher::Matcher;

/// Attribute values one configurator sets. `None` leaves the attribute as
/// earlier configurators (or the defaults) set it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyOverrides {
    /// XML access control policy; `Some(None)` reverts to private.
    pub acl: Option<Option<String>>,
    /// Canned ACL sent as `x-amz-acl`.
    pub canned_acl: Option<String>,
    /// `Cache-Control`.
    pub cache_control: Option<String>,
    /// `Content-Disposition`.
    pub content_disposition: Option<String>,
    /// `Content-Encoding`.
    pub content_encoding: Option<String>,
    /// `Content-Type`.
    pub content_type: Option<String>,
    /// `Content-Language`.
    pub content_language: Option<String>,
    /// `Expires`.
    pub expires: Option<String>,
    /// Server-side encryption.
    pub encrypted: Option<bool>,
    /// Reduced redundancy storage.
    pub reduced_redundancy: Option<bool>,
    /// User metadata, merged key by key.
    pub metadata: BTreeMap<String, String>,
}

/// Fully resolved attributes of one key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyAttributes {
    /// XML access control policy. `None`: not configured. `Some(None)`:
    /// revert to private. `Some(Some(xml))`: apply the policy.
    pub acl: Option<Option<String>>,
    /// Canned ACL.
    pub canned_acl: Option<String>,
    /// `Cache-Control`.
    pub cache_control: Option<String>,
    /// `Content-Disposition`.
    pub content_disposition: Option<String>,
    /// `Content-Encoding`.
    pub content_encoding: Option<String>,
    /// `Content-Type`; guessed from the extension when unset.
    pub content_type: Option<String>,
    /// `Content-Language`.
    pub content_language: Option<String>,
    /// `Expires`.
    pub expires: Option<String>,
    /// Server-side encryption.
    pub encrypted: bool,
    /// Reduced redundancy storage.
    pub reduced_redundancy: bool,
    /// User metadata.
    pub metadata: BTreeMap<String, String>,
}

impl KeyAttributes {
    /// Apply one configurator's overrides on top of these attributes.
    pub fn apply(&mut self, overrides: &KeyOverrides) {
        fn merge<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
            if value.is_some() {
                slot.clone_from(value);
            }
        }

        if let Some(acl) = &overrides.acl {
            self.acl = Some(acl.clone());
        }
        merge(&mut self.canned_acl, &overrides.canned_acl);
        merge(&mut self.cache_control, &overrides.cache_control);
        merge(&mut self.content_disposition, &overrides.content_disposition);
        merge(&mut self.content_encoding, &overrides.content_encoding);
        merge(&mut self.content_type, &overrides.content_type);
        merge(&mut self.content_language, &overrides.content_language);
        merge(&mut self.expires, &overrides.expires);
        if let Some(encrypted) = overrides.encrypted {
            self.encrypted = encrypted;
        }
        if let Some(reduced_redundancy) = overrides.reduced_redundancy {
            self.reduced_redundancy = reduced_redundancy;
        }
        self.metadata.extend(
            overrides
                .metadata
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
    }

    /// Request headers carrying these attributes for the key `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidHeader`] if a configured value (for
    /// example a metadata entry) cannot be sent as an HTTP header.
    pub fn headers(&self, name: &str) -> Result<HeaderMap, ClientError> {
        let mut headers = HeaderMap::new();

        if let Some(canned) = &self.canned_acl {
            insert(&mut headers, "x-amz-acl", canned)?;
        }
        if self.acl == Some(None) {
            insert(&mut headers, "x-amz-acl", "private")?;
        }
        if self.reduced_redundancy {
            insert(&mut headers, "x-amz-storage-class", "REDUCED_REDUNDANCY")?;
        }
        if self.encrypted {
            insert(&mut headers, "x-amz-server-side-encryption", "AES256")?;
        }
        for (k, v) in &self.metadata {
            insert(&mut headers, &format!("x-amz-meta-{k}"), v)?;
        }

        let standard = [
            ("cache-control", &self.cache_control),
            ("content-disposition", &self.content_disposition),
            ("content-encoding", &self.content_encoding),
            ("content-type", &self.content_type),
            ("content-language", &self.content_language),
            ("expires", &self.expires),
        ];
        for (header, value) in standard {
            if let Some(value) = value {
                insert(&mut headers, header, value)?;
            }
        }

        if !headers.contains_key(http::header::CONTENT_TYPE) {
            if let Some(guess) = guess_content_type(name) {
                insert(&mut headers, "content-type", guess.as_ref())?;
            }
        }
        Ok(headers)
    }
}

fn insert(headers: &mut HeaderMap, name: &str, value: &str) -> Result<(), ClientError> {
    let header_name = HeaderName::from_bytes(name.to_ascii_lowercase().as_bytes())
        .map_err(|_| ClientError::InvalidHeader(name.to_owned()))?;
    let header_value =
        HeaderValue::from_str(value).map_err(|_| ClientError::InvalidHeader(name.to_owned()))?;
    headers.insert(header_name, header_value);
    Ok(())
}

/// Guess a MIME type from the extension of a key name.
#[must_use]
pub fn guess_content_type(name: &str) -> Option<mime::Mime> {
    let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
    let guess = match ext.as_str() {
        "html" | "htm" => mime::TEXT_HTML,
        "css" => mime::TEXT_CSS,
        "js" | "mjs" => mime::APPLICATION_JAVASCRIPT,
        "json" => mime::APPLICATION_JSON,
        "txt" | "text" | "md" => mime::TEXT_PLAIN,
        "csv" => mime::TEXT_CSV,
        "xml" => mime::TEXT_XML,
        "png" => mime::IMAGE_PNG,
        "jpg" | "jpeg" => mime::IMAGE_JPEG,
        "gif" => mime::IMAGE_GIF,
        "bmp" => mime::IMAGE_BMP,
        "svg" => mime::IMAGE_SVG,
        "pdf" => mime::APPLICATION_PDF,
        "woff" => mime::FONT_WOFF,
        "woff2" => mime::FONT_WOFF2,
        "ico" => "image/x-icon".parse().ok()?,
        "webp" => "image/webp".parse().ok()?,
        "mp3" => "audio/mpeg".parse().ok()?,
        "mp4" => "video/mp4".parse().ok()?,
        "zip" => "application/zip".parse().ok()?,
        "gz" | "tgz" => "application/gzip".parse().ok()?,
        "wasm" => "application/wasm".parse().ok()?,
        _ => return None,
    };
    Some(guess)
}

/// One ordered rule: a matcher and the attributes it sets.
#[derive(Debug, Clone, Default)]
pub struct KeyConfigurator {
    /// Which keys the rule applies to.
    pub matcher: Matcher,
    /// What it sets.
    pub overrides: KeyOverrides,
}

impl KeyConfigurator {
    /// Create a configurator.
    #[must_use]
    pub fn new(matcher: Matcher, overrides: KeyOverrides) -> Self {
        Self { matcher, overrides }
    }

    /// Whether this rule applies to `name`.
    #[must_use]
    pub fn affects(&self, name: &str) -> bool {
        self.matcher.matches(name)
    }
}

/// Ordered list of configurators.
#[derive(Debug, Clone, Default)]
pub struct KeyFactory {
    configurators: Vec<KeyConfigurator>,
}

impl KeyFactory {
    /// Create a factory. Order is significant: later rules win.
    #[must_use]
    pub fn new(configurators: Vec<KeyConfigurator>) -> Self {
        Self { configurators }
    }

    /// Resolve the attributes of `name`.
    #[must_use]
    pub fn make_key(&self, name: &str) -> KeyAttributes {
        let mut attributes = KeyAttributes::default();
        for configurator in self.configurators.iter().filter(|c| c.affects(name)) {
            attributes.apply(&configurator.overrides);
        }
        attributes
    }

    /// Number of configurators.
    #[must_use]
    pub fn len(&self) -> usize {
        self.configurators.len()
    }

    /// Whether there are no configurators.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.configurators.is_empty()
    }
}
