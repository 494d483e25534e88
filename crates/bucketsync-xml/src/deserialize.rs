//! XML deserialization: parsing provider responses into model types.
//!
//! This module provides the [`S3Deserialize`] trait and implementations for
//! every response body the client reads: bucket listings, multipart
//! initiation results and error documents.

use bucketsync_model::{ErrorBody, InitiateMultipartUploadResult, KeyRecord, ListBucketResult};
use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::XmlError;

/// Trait for deserializing types from XML.
///
/// The root element has already been consumed by the caller; the
/// implementation reads child elements until the matching end tag.
pub trait S3Deserialize: Sized {
    /// Deserialize an instance from the given XML reader.
    ///
    /// The reader is positioned just after the opening tag of this element.
    ///
    /// # Errors
    ///
    /// Returns `XmlError` if the XML is malformed or required fields are missing.
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError>;
}

/// Deserialize an XML document into a typed value.
///
/// Finds the root element and delegates to the type's `S3Deserialize` implementation.
///
/// # Errors
///
/// Returns `XmlError` if the XML is malformed or deserialization fails.
pub fn from_xml<T: S3Deserialize>(xml: &[u8]) -> Result<T, XmlError> {
    // Text is not trimmed: key names may legitimately start or end with
    // whitespace. Whitespace between elements is ignored by the parsers.
    let mut reader = Reader::from_reader(xml);

    // Skip the XML declaration and find the root element.
    loop {
        match reader.read_event()? {
            Event::Start(_) => {
                return T::deserialize_xml(&mut reader);
            }
            Event::Eof => {
                return Err(XmlError::Missing("root element".to_string()));
            }
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Helper functions for reading common XML patterns
// ---------------------------------------------------------------------------

/// Read the text content of the current element and consume its end tag.
fn read_text_content(reader: &mut Reader<&[u8]>) -> Result<String, XmlError> {
    let mut text = String::new();
    loop {
        match reader.read_event()? {
            Event::Text(e) => {
                let decoded = e
                    .decode()
                    .map_err(|err| XmlError::InvalidText(err.to_string()))?;
                let unescaped = quick_xml::escape::unescape(&decoded)
                    .map_err(|err| XmlError::InvalidText(err.to_string()))?;
                text.push_str(&unescaped);
            }
            Event::GeneralRef(r) => {
                let name = r
                    .decode()
                    .map_err(|err| XmlError::InvalidText(err.to_string()))?;
                text.push_str(&resolve_reference(&name)?);
            }
            Event::CData(e) => {
                text.push_str(&String::from_utf8_lossy(&e));
            }
            Event::End(_) => {
                return Ok(text);
            }
            Event::Eof => {
                return Err(XmlError::Unexpected(
                    "end of input while reading text content".to_string(),
                ));
            }
            _ => {}
        }
    }
}

/// Resolve `&name;` to its text, for predefined and numeric character references.
fn resolve_reference(name: &str) -> Result<String, XmlError> {
    if let Some(resolved) = quick_xml::escape::resolve_predefined_entity(name) {
        return Ok(resolved.to_owned());
    }
    let code = if let Some(hex) = name.strip_prefix("#x") {
        u32::from_str_radix(hex, 16).ok()
    } else if let Some(dec) = name.strip_prefix('#') {
        dec.parse::<u32>().ok()
    } else {
        None
    };
    code.and_then(char::from_u32)
        .map(String::from)
        .ok_or_else(|| XmlError::InvalidText(format!("unknown entity reference &{name};")))
}

/// Skip over an element and all its children.
fn skip_element(reader: &mut Reader<&[u8]>) -> Result<(), XmlError> {
    let mut depth: u32 = 1;
    loop {
        match reader.read_event()? {
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
            Event::Eof => {
                return Err(XmlError::Unexpected(
                    "end of input while skipping element".to_string(),
                ));
            }
            _ => {}
        }
    }
}

/// Parse a boolean from XML text ("true"/"false").
fn parse_bool(s: &str) -> Result<bool, XmlError> {
    match s.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(XmlError::InvalidText(format!("invalid boolean: {s}"))),
    }
}

/// Parse a u64 from XML text.
fn parse_u64(s: &str) -> Result<u64, XmlError> {
    s.trim()
        .parse::<u64>()
        .map_err(|e| XmlError::InvalidText(format!("invalid u64 '{s}': {e}")))
}

/// Parse an ISO 8601 timestamp from XML text.
fn parse_timestamp(s: &str) -> Result<chrono::DateTime<chrono::Utc>, XmlError> {
    let s = s.trim();
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.fZ")
                .map(|ndt| ndt.and_utc())
        })
        .map_err(|e| XmlError::InvalidText(format!("invalid timestamp '{s}': {e}")))
}

/// Name of a start tag.
fn tag_name(e: &quick_xml::events::BytesStart<'_>) -> Result<String, XmlError> {
    let name = e.name();
    std::str::from_utf8(name.as_ref())
        .map(ToOwned::to_owned)
        .map_err(|e| XmlError::InvalidText(e.to_string()))
}

/// Strip the double quotes providers put around entity tags.
fn unquote_etag(s: &str) -> String {
    s.trim().trim_matches('"').to_owned()
}

// ---------------------------------------------------------------------------
// S3Deserialize implementations
// ---------------------------------------------------------------------------

impl S3Deserialize for KeyRecord {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut name = None;
        let mut etag = None;
        let mut size = None;
        let mut last_modified = None;

        loop {
            match reader.read_event()? {
                Event::Start(e) => match tag_name(&e)?.as_str() {
                    "Key" => name = Some(read_text_content(reader)?),
                    "ETag" => etag = Some(unquote_etag(&read_text_content(reader)?)),
                    "Size" => size = Some(parse_u64(&read_text_content(reader)?)?),
                    "LastModified" => {
                        last_modified = Some(parse_timestamp(&read_text_content(reader)?)?);
                    }
                    _ => skip_element(reader)?,
                },
                Event::End(_) => break,
                Event::Eof => {
                    return Err(XmlError::Unexpected(
                        "end of input in Contents".to_string(),
                    ));
                }
                _ => {}
            }
        }

        Ok(KeyRecord {
            name: name.ok_or_else(|| XmlError::Missing("Key".to_string()))?,
            etag: etag.ok_or_else(|| XmlError::Missing("ETag".to_string()))?,
            size: size.ok_or_else(|| XmlError::Missing("Size".to_string()))?,
            last_modified: last_modified
                .ok_or_else(|| XmlError::Missing("LastModified".to_string()))?,
        })
    }
}

impl S3Deserialize for ListBucketResult {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut result = ListBucketResult::default();
        let mut is_truncated = None;

        loop {
            match reader.read_event()? {
                Event::Start(e) => match tag_name(&e)?.as_str() {
                    "Name" => result.name = Some(read_text_content(reader)?),
                    "Prefix" => result.prefix = Some(read_text_content(reader)?),
                    "Marker" => result.marker = Some(read_text_content(reader)?),
                    "NextMarker" => result.next_marker = Some(read_text_content(reader)?),
                    "IsTruncated" => {
                        is_truncated = Some(parse_bool(&read_text_content(reader)?)?);
                    }
                    "Contents" => result.contents.push(KeyRecord::deserialize_xml(reader)?),
                    _ => skip_element(reader)?,
                },
                Event::End(_) => break,
                Event::Eof => {
                    return Err(XmlError::Unexpected(
                        "end of input in ListBucketResult".to_string(),
                    ));
                }
                _ => {}
            }
        }

        result.is_truncated = is_truncated
            .ok_or_else(|| XmlError::Missing("IsTruncated".to_string()))?;
        Ok(result)
    }
}

impl S3Deserialize for InitiateMultipartUploadResult {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut bucket = None;
        let mut key = None;
        let mut upload_id = None;

        loop {
            match reader.read_event()? {
                Event::Start(e) => match tag_name(&e)?.as_str() {
                    "Bucket" => bucket = Some(read_text_content(reader)?),
                    "Key" => key = Some(read_text_content(reader)?),
                    "UploadId" => upload_id = Some(read_text_content(reader)?),
                    _ => skip_element(reader)?,
                },
                Event::End(_) => break,
                Event::Eof => {
                    return Err(XmlError::Unexpected(
                        "end of input in InitiateMultipartUploadResult".to_string(),
                    ));
                }
                _ => {}
            }
        }

        Ok(InitiateMultipartUploadResult {
            bucket,
            key,
            upload_id: upload_id.ok_or_else(|| XmlError::Missing("UploadId".to_string()))?,
        })
    }
}

impl S3Deserialize for ErrorBody {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut body = ErrorBody::default();
        let mut code = None;

        loop {
            match reader.read_event()? {
                Event::Start(e) => match tag_name(&e)?.as_str() {
                    "Code" => code = Some(read_text_content(reader)?),
                    "Message" => body.message = read_text_content(reader)?,
                    "Resource" => body.resource = Some(read_text_content(reader)?),
                    "RequestId" => body.request_id = Some(read_text_content(reader)?),
                    _ => skip_element(reader)?,
                },
                Event::End(_) => break,
                Event::Eof => {
                    return Err(XmlError::Unexpected(
                        "end of input in Error".to_string(),
                    ));
                }
                _ => {}
            }
        }

        body.code = code.ok_or_else(|| XmlError::Missing("Code".to_string()))?;
        Ok(body)
    }
}
