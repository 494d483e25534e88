//! Signed request client for the object store REST protocol.
//!
//! # Overview
//!
//! [`S3Client`] signs every request with AWS Signature Version 2 and sends
//! it through a pluggable [`HttpTransport`]. On top of the single
//! [`S3Client::execute`] primitive it provides:
//!
//! - marker-based listing as a lazy stream ([`S3Client::list_keys`]),
//! - bulk deletes paged into requests of at most 1000 keys,
//! - the multipart upload sub-protocol (initiate, part, complete, abort).
//!
//! Every request is reported to an injected [`MetricsSink`]; [`CallStats`]
//! keeps per-method totals.
//!
//! # Modules
//!
//! - [`checksums`] - MD5 and multipart entity tags
//! - [`client`] - The bucket-scoped client
//! - [`config`] - Endpoint configuration
//! - [`error`] - `ClientError` and `RemoteError`
//! - [`metrics`] - Request accounting
//! - [`request`] - Request description
//! - [`transport`] - HTTP transport trait and the reqwest implementation

pub mod checksums;
pub mod client;
pub mod config;
pub mod error;
pub mod metrics;
pub mod request;
pub mod transport;

pub use client::S3Client;
pub use config::ClientConfig;
pub use error::{ClientError, RemoteError};
pub use metrics::{CallStats, MetricsSink, NoopMetrics};
pub use request::S3Request;
pub use transport::{HttpTransport, ReqwestTransport, TransportFuture};
