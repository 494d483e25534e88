//! Credentials and AWS Signature Version 2 request signing for bucketsync.
//!
//! # Overview
//!
//! Every request the client sends is signed with SigV2: an HMAC-SHA1 over a
//! fixed-format string built from the method, `Content-MD5`, `Content-Type`,
//! the `x-amz-*` headers and the canonical resource. The signature is sent as
//!
//! ```text
//! Authorization: AWS <AccessKeyId>:<Base64(HMAC-SHA1(secret, StringToSign))>
//! ```
//!
//! # Usage
//!
//! ```rust
//! use bucketsync_auth::canonical::{Query, canonical_resource};
//! use bucketsync_auth::credentials::Credentials;
//! use bucketsync_auth::sigv2::sign_request;
//!
//! let credentials = Credentials::new("AKIDEXAMPLE", "secret").unwrap();
//! let mut request = http::Request::builder()
//!     .method("GET")
//!     .uri("https://my-bucket.s3.amazonaws.com/?acl")
//!     .body(Vec::<u8>::new())
//!     .unwrap();
//! let resource = canonical_resource("my-bucket", None, &Query::sub_resource("acl"));
//! sign_request(&mut request, &resource, &credentials).unwrap();
//! assert!(request.headers().contains_key(http::header::AUTHORIZATION));
//! ```
//!
//! # Modules
//!
//! - [`canonical`] - Canonical resource and query-string construction
//! - [`credentials`] - Access key pair and environment resolution
//! - [`error`] - Credential and signing error types
//! - [`sigv2`] - String-to-sign construction and HMAC-SHA1 signing

pub mod canonical;
pub mod credentials;
pub mod error;
pub mod sigv2;

pub use canonical::{Query, canonical_resource};
pub use credentials::Credentials;
pub use error::AuthError;
pub use sigv2::{content_md5, sign_request};
