//! Data types shared by every bucketsync layer.
//!
//! Nothing in this crate performs I/O. The types fall into two groups:
//!
//! - Snapshot values produced by listing a bucket or hashing a local file
//!   ([`KeyRecord`], [`ListBucketResult`]).
//! - Request and response payloads of the object store REST protocol
//!   ([`Delete`], [`CompleteMultipartUpload`], [`ErrorBody`], ...), which
//!   `bucketsync-xml` converts to and from XML.

pub mod error;
pub mod types;

pub use error::ErrorBody;
pub use types::{
    BucketLoggingStatus, BucketVersioningStatus, CompleteMultipartUpload, CompletedPart,
    CreateBucketConfiguration, Delete, InitiateMultipartUploadResult, KeyRecord, ListBucketResult,
    NotificationConfiguration, ObjectIdentifier, VersioningConfiguration,
};
