//! XML layer of the object store REST protocol for bucketsync.
//!
//! Converts between `bucketsync-model` types and the XML documents the
//! object store sends and expects.
//!
//! # Key components
//!
//! - [`S3Serialize`] trait and [`to_xml`] for request bodies (bulk delete,
//!   multipart completion, bucket creation, versioning, empty logging and
//!   notification configurations)
//! - [`S3Deserialize`] trait and [`from_xml`] for response bodies (bucket
//!   listings, multipart initiation, error documents)
//!
//! # Conventions
//!
//! - Namespace: `http://s3.amazonaws.com/doc/2006-03-01/`
//! - Booleans: lowercase `true`/`false`
//! - Timestamps: ISO 8601 format (`2006-02-03T16:45:09.000Z`)
//! - Entity tags arrive quoted and are stored unquoted

pub mod deserialize;
pub mod error;
pub mod serialize;

pub use deserialize::{S3Deserialize, from_xml};
pub use error::XmlError;
pub use serialize::{LOGGING_NAMESPACE, S3_NAMESPACE, S3Serialize, to_xml, to_xml_with_namespace};
