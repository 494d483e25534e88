//! Failures while encoding request bodies or decoding response bodies.

use std::io;

/// Why a document could not be written or read.
#[derive(Debug, thiserror::Error)]
pub enum XmlError {
    /// Writing a request body failed.
    #[error("cannot write XML: {0}")]
    Write(#[from] io::Error),

    /// The response body is not well-formed XML.
    #[error("malformed XML: {0}")]
    Malformed(#[from] quick_xml::Error),

    /// A response lacks an element the caller depends on.
    #[error("missing XML element: {0}")]
    Missing(String),

    /// The document ended inside an element.
    #[error("truncated XML: {0}")]
    Unexpected(String),

    /// Element text could not be decoded or converted.
    #[error("invalid element text: {0}")]
    InvalidText(String),
}
