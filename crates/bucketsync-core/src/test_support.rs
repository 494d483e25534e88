//! Recording transport shared by the unit tests of this crate.

use std::sync::Arc;

use bucketsync_auth::Credentials;
use bucketsync_client::{CallStats, ClientConfig, HttpTransport, S3Client, TransportFuture};
use bucketsync_model::KeyRecord;
use bytes::Bytes;
use http::{Method, StatusCode};
use parking_lot::Mutex;

pub(crate) const BUCKET: &str = "bucket";

/// A request as the transport saw it.
#[derive(Debug, Clone)]
pub(crate) struct Recorded {
    pub method: Method,
    pub path: String,
    pub query: String,
    pub headers: http::HeaderMap,
    pub body: Bytes,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Answers 200 to everything, lists a fixed snapshot, and fails requests
/// whose query contains a configured fragment.
#[derive(Debug, Default)]
pub(crate) struct RecordingTransport {
    requests: Mutex<Vec<Recorded>>,
    listing: Mutex<Vec<KeyRecord>>,
    fail_on: Mutex<Option<String>>,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_listing(keys: Vec<KeyRecord>) -> Arc<Self> {
        let transport = Self::default();
        *transport.listing.lock() = keys;
        Arc::new(transport)
    }

    pub fn fail_when(&self, fragment: &str) {
        *self.fail_on.lock() = Some(fragment.to_owned());
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().clone()
    }

    /// Requests other than listings.
    pub fn writes(&self) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.method != Method::GET)
            .collect()
    }

    fn respond(&self, request: &Recorded) -> (StatusCode, String) {
        if let Some(fragment) = self.fail_on.lock().as_deref() {
            if request.query.contains(fragment) {
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "<Error><Code>InternalError</Code><Message>injected</Message></Error>"
                        .to_owned(),
                );
            }
        }
        if request.method == Method::POST && request.query == "uploads" {
            return (
                StatusCode::OK,
                "<InitiateMultipartUploadResult><UploadId>upload-1</UploadId></InitiateMultipartUploadResult>"
                    .to_owned(),
            );
        }
        if request.method == Method::GET && request.path == format!("/{BUCKET}/") {
            let mut body = String::from("<ListBucketResult><IsTruncated>false</IsTruncated>");
            for key in self.listing.lock().iter() {
                body.push_str(&format!(
                    "<Contents><Key>{}</Key><ETag>\"{}\"</ETag><Size>{}</Size>\
                     <LastModified>2024-01-01T00:00:00.000Z</LastModified></Contents>",
                    key.name, key.etag, key.size
                ));
            }
            body.push_str("</ListBucketResult>");
            return (StatusCode::OK, body);
        }
        (StatusCode::OK, String::new())
    }
}

impl HttpTransport for RecordingTransport {
    fn send(&self, request: http::Request<Bytes>) -> TransportFuture<'_> {
        Box::pin(async move {
            let (parts, body) = request.into_parts();
            let recorded = Recorded {
                method: parts.method,
                path: parts.uri.path().to_owned(),
                query: parts.uri.query().unwrap_or_default().to_owned(),
                headers: parts.headers,
                body,
            };
            let (status, body) = self.respond(&recorded);
            self.requests.lock().push(recorded);
            let mut response = http::Response::new(Bytes::from(body));
            *response.status_mut() = status;
            Ok(response)
        })
    }
}

pub(crate) fn client_for(transport: &Arc<RecordingTransport>) -> S3Client {
    let config = ClientConfig::builder()
        .hostname("store.test")
        .secure(false)
        .path_style(true)
        .build();
    S3Client::with_parts(
        BUCKET,
        Credentials::new("AKID", "secret").unwrap(),
        config,
        Arc::clone(transport) as Arc<dyn HttpTransport>,
        Arc::new(CallStats::new()),
    )
}
