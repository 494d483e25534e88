//! XML serialization: converting request payloads to XML bodies.
//!
//! This module provides the [`S3Serialize`] trait and implementations for
//! every request body the client sends:
//!
//! - `<Delete>` for bulk deletes
//! - `<CompleteMultipartUpload>` for finishing multipart uploads
//! - `<CreateBucketConfiguration>` for bucket creation outside the default region
//! - `<VersioningConfiguration>` for enabling or suspending versioning
//! - empty `<BucketLoggingStatus>` / `<NotificationConfiguration>` documents that
//!   reset those bucket attributes

use std::io::{self, Write};

use bucketsync_model::{
    BucketLoggingStatus, CompleteMultipartUpload, CompletedPart, CreateBucketConfiguration,
    Delete, NotificationConfiguration, ObjectIdentifier, VersioningConfiguration,
};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesText, Event};

use crate::error::XmlError;

/// The S3 XML namespace.
pub const S3_NAMESPACE: &str = "http://s3.amazonaws.com/doc/2006-03-01/";

/// Namespace the provider expects on `<BucketLoggingStatus>`.
pub const LOGGING_NAMESPACE: &str = "http://doc.s3.amazonaws.com/2006-03-01";

/// Trait for serializing types to XML.
///
/// Implementors write their content as child elements inside the current XML
/// context. The root element name and namespace are handled by [`to_xml`].
///
/// Uses `io::Result` because `quick_xml::Writer` closures require `io::Result<()>`.
pub trait S3Serialize {
    /// Serialize this value as XML child elements into the given writer.
    ///
    /// # Errors
    ///
    /// Returns `io::Error` if writing to the underlying writer fails.
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()>;
}

/// Serialize a value as a complete XML document in the S3 namespace.
///
/// # Errors
///
/// Returns `XmlError` if serialization fails.
pub fn to_xml<T: S3Serialize>(root_element: &str, value: &T) -> Result<Vec<u8>, XmlError> {
    to_xml_with_namespace(root_element, Some(S3_NAMESPACE), value)
}

/// Serialize a value as a complete XML document with an explicit namespace.
///
/// Passing `None` omits the `xmlns` attribute.
///
/// # Errors
///
/// Returns `XmlError` if serialization fails.
pub fn to_xml_with_namespace<T: S3Serialize>(
    root_element: &str,
    namespace: Option<&str>,
    value: &T,
) -> Result<Vec<u8>, XmlError> {
    let mut buf = Vec::with_capacity(512);
    let mut writer = Writer::new(&mut buf);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut element = writer.create_element(root_element);
    if let Some(ns) = namespace {
        element = element.with_attribute(("xmlns", ns));
    }
    element.write_inner_content(|w| value.serialize_xml(w))?;

    Ok(buf)
}

/// Write a simple `<tag>text</tag>` element.
fn write_text_element<W: Write>(writer: &mut Writer<W>, tag: &str, text: &str) -> io::Result<()> {
    writer
        .create_element(tag)
        .write_text_content(BytesText::new(text))?;
    Ok(())
}

impl S3Serialize for ObjectIdentifier {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        writer
            .create_element("Object")
            .write_inner_content(|w| write_text_element(w, "Key", &self.key))?;
        Ok(())
    }
}

impl S3Serialize for Delete {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text_element(writer, "Quiet", if self.quiet { "true" } else { "false" })?;
        for object in &self.objects {
            object.serialize_xml(writer)?;
        }
        Ok(())
    }
}

impl S3Serialize for CompletedPart {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        writer.create_element("Part").write_inner_content(|w| {
            write_text_element(w, "PartNumber", &self.part_number.to_string())?;
            write_text_element(w, "ETag", &format!("\"{}\"", self.etag))?;
            Ok(())
        })?;
        Ok(())
    }
}

impl S3Serialize for CompleteMultipartUpload {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        for part in &self.parts {
            part.serialize_xml(writer)?;
        }
        Ok(())
    }
}

impl S3Serialize for CreateBucketConfiguration {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text_element(writer, "LocationConstraint", &self.location_constraint)
    }
}

impl S3Serialize for VersioningConfiguration {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text_element(writer, "Status", self.status.as_str())
    }
}

impl S3Serialize for BucketLoggingStatus {
    fn serialize_xml<W: Write>(&self, _writer: &mut Writer<W>) -> io::Result<()> {
        Ok(())
    }
}

impl S3Serialize for NotificationConfiguration {
    fn serialize_xml<W: Write>(&self, _writer: &mut Writer<W>) -> io::Result<()> {
        Ok(())
    }
}
