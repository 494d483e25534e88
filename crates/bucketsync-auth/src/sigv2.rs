//! AWS Signature Version 2 request signing.
//!
//! ```text
//! StringToSign = HTTP-Verb + "\n" +
//!                Content-MD5 + "\n" +
//!                Content-Type + "\n" +
//!                Date + "\n" +
//!                CanonicalizedAmzHeaders +
//!                CanonicalizedResource
//! ```
//!
//! Requests always carry `x-amz-date`, so the `Date` line is left empty and
//! the timestamp is signed through the canonicalized amz headers instead.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use digest::Digest;
use hmac::{Hmac, KeyInit, Mac};
use http::HeaderValue;
use http::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap};
use sha1::Sha1;
use tracing::trace;

use crate::credentials::Credentials;
use crate::error::AuthError;

type HmacSha1 = Hmac<Sha1>;

/// Header carrying the request timestamp.
pub const X_AMZ_DATE: &str = "x-amz-date";

/// RFC 1123 date format used in `x-amz-date`.
const AMZ_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Base64 of the raw MD5 digest of `body`, as sent in `Content-MD5`.
#[must_use]
pub fn content_md5(body: &[u8]) -> String {
    BASE64.encode(md5::Md5::digest(body))
}

/// Format a timestamp for the `x-amz-date` header.
#[must_use]
pub fn format_amz_date(now: DateTime<Utc>) -> String {
    now.format(AMZ_DATE_FORMAT).to_string()
}

/// Sign `request` in place using the current time.
///
/// Adds `x-amz-date` if the request has none and sets `Authorization`.
///
/// # Errors
///
/// Returns [`AuthError::InvalidHeaderValue`] if a computed header cannot be
/// represented as an HTTP header value.
pub fn sign_request<B>(
    request: &mut http::Request<B>,
    resource: &str,
    credentials: &Credentials,
) -> Result<(), AuthError> {
    sign_request_at(request, resource, credentials, Utc::now())
}

/// Sign `request` in place, stamping it with `now` when it has no date.
///
/// # Errors
///
/// Returns [`AuthError::InvalidHeaderValue`] if a computed header cannot be
/// represented as an HTTP header value.
pub fn sign_request_at<B>(
    request: &mut http::Request<B>,
    resource: &str,
    credentials: &Credentials,
    now: DateTime<Utc>,
) -> Result<(), AuthError> {
    let headers = request.headers_mut();
    if !headers.contains_key(X_AMZ_DATE) {
        let date = HeaderValue::from_str(&format_amz_date(now))
            .map_err(|_| AuthError::InvalidHeaderValue(X_AMZ_DATE))?;
        headers.insert(X_AMZ_DATE, date);
    }

    let string_to_sign = build_string_to_sign(request.method(), request.headers(), resource);
    trace!(string_to_sign = ?string_to_sign, "built SigV2 string to sign");

    let signature = compute_signature(credentials.secret_access_key(), &string_to_sign);
    let authorization = format!("AWS {}:{signature}", credentials.access_key_id());
    let value = HeaderValue::from_str(&authorization)
        .map_err(|_| AuthError::InvalidHeaderValue("authorization"))?;
    request.headers_mut().insert(AUTHORIZATION, value);
    Ok(())
}

/// Build the SigV2 string to sign.
#[must_use]
pub fn build_string_to_sign(method: &http::Method, headers: &HeaderMap, resource: &str) -> String {
    let content_md5 = header_value(headers, "content-md5");
    let content_type = header_value(headers, CONTENT_TYPE.as_str());
    let date = if headers.contains_key(X_AMZ_DATE) {
        ""
    } else {
        header_value(headers, "date")
    };
    let amz_headers = canonicalized_amz_headers(headers);

    format!("{method}\n{content_md5}\n{content_type}\n{date}\n{amz_headers}{resource}")
}

/// All `x-amz-*` headers, lower-cased and sorted, as `name:value\n` lines.
fn canonicalized_amz_headers(headers: &HeaderMap) -> String {
    let mut amz_headers: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (name, value) in headers {
        let name = name.as_str();
        if name.starts_with("x-amz-") {
            amz_headers
                .entry(name)
                .or_default()
                .push(value.to_str().unwrap_or("").trim());
        }
    }

    let mut result = String::new();
    for (name, values) in &amz_headers {
        result.push_str(name);
        result.push(':');
        result.push_str(&values.join(","));
        result.push('\n');
    }
    result
}

/// `Base64(HMAC-SHA1(secret, string_to_sign))`.
#[must_use]
pub fn compute_signature(secret_access_key: &str, string_to_sign: &str) -> String {
    let mut mac = HmacSha1::new_from_slice(secret_access_key.as_bytes())
        .expect("HMAC can accept any key length");
    mac.update(string_to_sign.as_bytes());
    BASE64.encode(mac.finalize().into_bytes())
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}
