//! Snapshot and payload types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One key as seen in a bucket listing or computed from a local file.
///
/// `etag` is stored without surrounding quotes. For objects uploaded in a
/// single request it is the hex MD5 of the content; for multipart objects it
/// is the composite `<hex>-<parts>` form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    /// Key name, unique within the bucket.
    pub name: String,
    /// Content hash (entity tag), unquoted.
    pub etag: String,
    /// Content length in bytes.
    pub size: u64,
    /// Last modification time.
    pub last_modified: DateTime<Utc>,
}

impl KeyRecord {
    /// Create a record.
    pub fn new(
        name: impl Into<String>,
        etag: impl Into<String>,
        size: u64,
        last_modified: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            etag: etag.into(),
            size,
            last_modified,
        }
    }

    /// Whether the entity tag uses the multipart `<hex>-<parts>` form.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.multipart_part_count().is_some()
    }

    /// Number of parts encoded in a multipart entity tag, if any.
    #[must_use]
    pub fn multipart_part_count(&self) -> Option<usize> {
        let (_, count) = self.etag.rsplit_once('-')?;
        count.parse().ok()
    }

    /// Whether two records describe the same content (same hash and size).
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        self.etag == other.etag && self.size == other.size
    }
}

/// One page of a `GET /` bucket listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListBucketResult {
    /// Bucket name echoed by the provider.
    pub name: Option<String>,
    /// Prefix echoed by the provider.
    pub prefix: Option<String>,
    /// Marker echoed by the provider.
    pub marker: Option<String>,
    /// Marker to use for the next page, when the provider sends it.
    pub next_marker: Option<String>,
    /// Whether more pages follow.
    pub is_truncated: bool,
    /// Keys on this page.
    pub contents: Vec<KeyRecord>,
}

impl ListBucketResult {
    /// Marker for the request following this page.
    ///
    /// Prefers the provider's `NextMarker`, falling back to the last key on
    /// the page. Returns `None` when neither is available.
    #[must_use]
    pub fn continuation_marker(&self) -> Option<&str> {
        self.next_marker
            .as_deref()
            .or_else(|| self.contents.last().map(|k| k.name.as_str()))
    }
}

/// Response of `POST ?uploads`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitiateMultipartUploadResult {
    /// Bucket the upload belongs to.
    pub bucket: Option<String>,
    /// Key being uploaded.
    pub key: Option<String>,
    /// Identifier passed to every subsequent part/complete/abort request.
    pub upload_id: String,
}

/// A part that has been uploaded and must be listed on completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPart {
    /// 1-based part number.
    pub part_number: u32,
    /// Hex MD5 of the part, unquoted.
    pub etag: String,
}

/// Body of the multipart completion request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompleteMultipartUpload {
    /// Parts in ascending part-number order.
    pub parts: Vec<CompletedPart>,
}

/// A key named in a bulk delete request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectIdentifier {
    /// Key name.
    pub key: String,
}

/// Body of `POST ?delete`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delete {
    /// Only report errors, not successfully deleted keys.
    pub quiet: bool,
    /// Keys to delete; the protocol allows at most 1000.
    pub objects: Vec<ObjectIdentifier>,
}

impl Delete {
    /// Build a quiet delete request for the given keys.
    pub fn quiet<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            quiet: true,
            objects: keys
                .into_iter()
                .map(|k| ObjectIdentifier { key: k.into() })
                .collect(),
        }
    }
}

/// Body of the bucket creation request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateBucketConfiguration {
    /// Region the bucket is created in.
    pub location_constraint: String,
}

/// Versioning state of a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketVersioningStatus {
    /// Versioning is on.
    Enabled,
    /// Versioning is off for new objects.
    Suspended,
}

impl BucketVersioningStatus {
    /// Wire representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enabled => "Enabled",
            Self::Suspended => "Suspended",
        }
    }
}

impl From<bool> for BucketVersioningStatus {
    fn from(enabled: bool) -> Self {
        if enabled {
            Self::Enabled
        } else {
            Self::Suspended
        }
    }
}

impl fmt::Display for BucketVersioningStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of `PUT ?versioning`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersioningConfiguration {
    /// Requested state.
    pub status: BucketVersioningStatus,
}

/// Empty logging status, which turns bucket logging off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BucketLoggingStatus;

/// Empty notification configuration, which removes every notification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotificationConfiguration;
