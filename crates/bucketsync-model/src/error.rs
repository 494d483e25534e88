//! The error document returned by the object store on non-2xx responses.

use serde::{Deserialize, Serialize};

/// Parsed `<Error>` body of a failed request.
///
/// Only `code` and `message` are required by the protocol; `resource` and
/// `request_id` are carried when the provider sends them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error code, e.g. `NoSuchUpload`.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Resource the error refers to.
    pub resource: Option<String>,
    /// Provider request id, useful when reporting issues upstream.
    pub request_id: Option<String>,
}
