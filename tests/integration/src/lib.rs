//! End-to-end tests for bucketsync.
//!
//! The tests run the real orchestrator against [`FakeStore`], an in-memory
//! implementation of the parts of the object store REST protocol bucketsync
//! uses. The store records every request so tests can assert on the exact
//! calls made.
//!
//! ```text
//! cargo test -p bucketsync-integration
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Once};

use bucketsync_client::checksums::{md5_hex, multipart_etag};
use bucketsync_client::{CallStats, ClientConfig, HttpTransport, TransportFuture};
use bucketsync_core::{Bucket, BucketConfig, Connector, parse_config};
use bytes::Bytes;
use http::header::HeaderMap;
use http::{Method, StatusCode};
use parking_lot::Mutex;
use percent_encoding::percent_decode_str;

static INIT: Once = Once::new();

/// Initialize tracing (once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// Host name the fake store answers on.
pub const FAKE_HOST: &str = "fake.local";

/// An object held by the fake store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Content.
    pub body: Bytes,
    /// Unquoted entity tag.
    pub etag: String,
    /// Headers the object was last written with.
    pub headers: BTreeMap<String, String>,
}

/// A request the fake store received.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// HTTP method.
    pub method: Method,
    /// Decoded key, if any.
    pub key: Option<String>,
    /// Decoded query parameters in URL order.
    pub query: Vec<(String, String)>,
    /// Request headers.
    pub headers: HeaderMap,
    /// Request body.
    pub body: Bytes,
}

impl RecordedRequest {
    /// Whether the query carries parameter `name`.
    #[must_use]
    pub fn has_query(&self, name: &str) -> bool {
        self.query.iter().any(|(k, _)| k == name)
    }

    /// Header value as a string.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

#[derive(Debug, Default)]
struct PendingUpload {
    key: String,
    headers: BTreeMap<String, String>,
    parts: BTreeMap<u32, Bytes>,
}

#[derive(Debug, Default)]
struct StoreState {
    created: bool,
    objects: BTreeMap<String, StoredObject>,
    attributes: BTreeMap<String, Option<Bytes>>,
    uploads: BTreeMap<String, PendingUpload>,
    next_upload: u64,
    requests: Vec<RecordedRequest>,
}

type Reply = (StatusCode, String);

/// In-memory object store for a single bucket, addressed path-style.
#[derive(Debug)]
pub struct FakeStore {
    page_size: usize,
    state: Mutex<StoreState>,
}

impl FakeStore {
    /// A store that returns listings in pages of 1000 keys.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Self::with_page_size(1000)
    }

    /// A store that returns listings in pages of `page_size` keys.
    #[must_use]
    pub fn with_page_size(page_size: usize) -> Arc<Self> {
        Arc::new(Self {
            page_size: page_size.max(1),
            state: Mutex::new(StoreState::default()),
        })
    }

    /// Seed an object without recording a request.
    pub fn put_object(&self, key: &str, body: &[u8]) {
        let mut state = self.state.lock();
        state.created = true;
        state.objects.insert(
            key.to_owned(),
            StoredObject {
                body: Bytes::copy_from_slice(body),
                etag: md5_hex(body),
                headers: BTreeMap::new(),
            },
        );
    }

    /// The object at `key`.
    #[must_use]
    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.state.lock().objects.get(key).cloned()
    }

    /// Every stored key, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.state.lock().objects.keys().cloned().collect()
    }

    /// Every stored object.
    #[must_use]
    pub fn objects(&self) -> BTreeMap<String, StoredObject> {
        self.state.lock().objects.clone()
    }

    /// Bucket attribute document: `None` when never touched, `Some(None)`
    /// after a DELETE.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<Option<Bytes>> {
        self.state.lock().attributes.get(name).cloned()
    }

    /// Whether the bucket was created.
    #[must_use]
    pub fn is_created(&self) -> bool {
        self.state.lock().created
    }

    /// Number of multipart uploads neither completed nor aborted.
    #[must_use]
    pub fn pending_uploads(&self) -> usize {
        self.state.lock().uploads.len()
    }

    /// Every request received.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().requests.clone()
    }

    /// Every request other than a GET.
    #[must_use]
    pub fn writes(&self) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method != Method::GET)
            .collect()
    }

    /// Forget the recorded requests.
    pub fn clear_requests(&self) {
        self.state.lock().requests.clear();
    }

    fn handle(&self, request: &RecordedRequest) -> Reply {
        if request.header("authorization").is_none() {
            return error(StatusCode::FORBIDDEN, "AccessDenied");
        }
        let mut state = self.state.lock();
        let param = |name: &str| {
            request
                .query
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        };

        match (&request.method, request.key.as_deref()) {
            (&Method::PUT, None) if request.query.is_empty() => {
                state.created = true;
                ok()
            }
            (&Method::GET, None) => {
                if !state.created {
                    return error(StatusCode::NOT_FOUND, "NoSuchBucket");
                }
                self.list(
                    &state,
                    param("prefix").as_deref().unwrap_or_default(),
                    param("marker").as_deref(),
                )
            }
            (&Method::POST, None) if request.has_query("delete") => {
                for key in xml_values(&request.body, "Key") {
                    state.objects.remove(&key);
                }
                ok()
            }
            (&Method::PUT, None) => {
                let Some((name, _)) = request.query.first() else {
                    return error(StatusCode::BAD_REQUEST, "InvalidRequest");
                };
                state
                    .attributes
                    .insert(name.clone(), Some(request.body.clone()));
                ok()
            }
            (&Method::DELETE, None) => {
                let Some((name, _)) = request.query.first() else {
                    return error(StatusCode::BAD_REQUEST, "InvalidRequest");
                };
                state.attributes.insert(name.clone(), None);
                ok()
            }
            (&Method::POST, Some(key)) if request.has_query("uploads") => {
                state.next_upload += 1;
                let upload_id = format!("upload-{}", state.next_upload);
                state.uploads.insert(
                    upload_id.clone(),
                    PendingUpload {
                        key: key.to_owned(),
                        headers: object_headers(&request.headers),
                        parts: BTreeMap::new(),
                    },
                );
                (
                    StatusCode::OK,
                    format!(
                        "<InitiateMultipartUploadResult><Key>{}</Key><UploadId>{upload_id}</UploadId></InitiateMultipartUploadResult>",
                        escape(key)
                    ),
                )
            }
            (&Method::PUT, Some(_)) if request.has_query("partNumber") => {
                let (Some(number), Some(upload_id)) = (param("partNumber"), param("uploadId")) else {
                    return error(StatusCode::BAD_REQUEST, "InvalidRequest");
                };
                let Ok(number) = number.parse::<u32>() else {
                    return error(StatusCode::BAD_REQUEST, "InvalidArgument");
                };
                let Some(upload) = state.uploads.get_mut(&upload_id) else {
                    return error(StatusCode::NOT_FOUND, "NoSuchUpload");
                };
                upload.parts.insert(number, request.body.clone());
                ok()
            }
            (&Method::POST, Some(key)) if request.has_query("uploadId") => {
                let upload_id = param("uploadId").unwrap_or_default();
                let Some(upload) = state.uploads.remove(&upload_id) else {
                    return error(StatusCode::NOT_FOUND, "NoSuchUpload");
                };
                let listed: Vec<u32> = xml_values(&request.body, "PartNumber")
                    .iter()
                    .filter_map(|n| n.parse().ok())
                    .collect();
                if listed != upload.parts.keys().copied().collect::<Vec<_>>() || upload.key != key {
                    return error(StatusCode::BAD_REQUEST, "InvalidPart");
                }
                let first_len = upload.parts.values().next().map_or(1, Bytes::len);
                let body: Vec<u8> = upload.parts.values().flat_map(|p| p.iter().copied()).collect();
                let etag = multipart_etag(&body, first_len);
                state.objects.insert(
                    key.to_owned(),
                    StoredObject {
                        body: Bytes::from(body),
                        etag,
                        headers: upload.headers,
                    },
                );
                ok()
            }
            (&Method::DELETE, Some(_)) if request.has_query("uploadId") => {
                let upload_id = param("uploadId").unwrap_or_default();
                if state.uploads.remove(&upload_id).is_none() {
                    return error(StatusCode::NOT_FOUND, "NoSuchUpload");
                }
                ok()
            }
            (&Method::PUT, Some(key)) if request.has_query("acl") => {
                let Some(object) = state.objects.get_mut(key) else {
                    return error(StatusCode::NOT_FOUND, "NoSuchKey");
                };
                let acl = String::from_utf8_lossy(&request.body).into_owned();
                object.headers.insert("acl".to_owned(), acl);
                ok()
            }
            (&Method::PUT, Some(key)) => {
                let headers = object_headers(&request.headers);
                if let Some(source) = request.header("x-amz-copy-source") {
                    let source = percent_decode_str(source).decode_utf8_lossy().into_owned();
                    let Some(source_key) = source.splitn(3, '/').nth(2) else {
                        return error(StatusCode::BAD_REQUEST, "InvalidArgument");
                    };
                    let Some(existing) = state.objects.get(source_key).cloned() else {
                        return error(StatusCode::NOT_FOUND, "NoSuchKey");
                    };
                    state.objects.insert(
                        key.to_owned(),
                        StoredObject {
                            headers,
                            ..existing
                        },
                    );
                } else {
                    state.objects.insert(
                        key.to_owned(),
                        StoredObject {
                            etag: md5_hex(&request.body),
                            body: request.body.clone(),
                            headers,
                        },
                    );
                }
                ok()
            }
            (&Method::DELETE, Some(key)) => {
                state.objects.remove(key);
                (StatusCode::NO_CONTENT, String::new())
            }
            _ => error(StatusCode::METHOD_NOT_ALLOWED, "MethodNotAllowed"),
        }
    }

    fn list(&self, state: &StoreState, prefix: &str, marker: Option<&str>) -> Reply {
        let mut matching = state
            .objects
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .filter(|(k, _)| marker.is_none_or(|m| k.as_str() > m));
        let page: Vec<_> = matching.by_ref().take(self.page_size).collect();
        let truncated = matching.next().is_some();

        let mut body = format!("<ListBucketResult><IsTruncated>{truncated}</IsTruncated>");
        for (key, object) in page {
            body.push_str(&format!(
                "<Contents><Key>{}</Key><ETag>\"{}\"</ETag><Size>{}</Size>\
                 <LastModified>2024-01-01T00:00:00.000Z</LastModified></Contents>",
                escape(key),
                object.etag,
                object.body.len()
            ));
        }
        body.push_str("</ListBucketResult>");
        (StatusCode::OK, body)
    }
}

impl HttpTransport for FakeStore {
    fn send(&self, request: http::Request<Bytes>) -> TransportFuture<'_> {
        Box::pin(async move {
            let (parts, body) = request.into_parts();
            let path = parts.uri.path();
            // Path style: "/<bucket>/<key>".
            let key = path
                .trim_start_matches('/')
                .split_once('/')
                .map(|(_, key)| percent_decode_str(key).decode_utf8_lossy().into_owned())
                .filter(|key| !key.is_empty());
            let query = parts
                .uri
                .query()
                .map(|q| {
                    form_urlencoded::parse(q.as_bytes())
                        .map(|(k, v)| (k.into_owned(), v.into_owned()))
                        .collect()
                })
                .unwrap_or_default();
            let recorded = RecordedRequest {
                method: parts.method,
                key,
                query,
                headers: parts.headers,
                body,
            };

            let (status, body) = self.handle(&recorded);
            self.state.lock().requests.push(recorded);

            let mut response = http::Response::new(Bytes::from(body));
            *response.status_mut() = status;
            Ok(response)
        })
    }
}

fn ok() -> Reply {
    (StatusCode::OK, String::new())
}

fn error(status: StatusCode, code: &str) -> Reply {
    (
        status,
        format!("<Error><Code>{code}</Code><Message>{code}</Message></Error>"),
    )
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Text of every `<tag>` element in `body`.
fn xml_values(body: &[u8], tag: &str) -> Vec<String> {
    let text = String::from_utf8_lossy(body);
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    text.split(open.as_str())
        .skip(1)
        .filter_map(|chunk| chunk.split_once(close.as_str()).map(|(value, _)| unescape(value)))
        .collect()
}

fn object_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    const STORED: &[&str] = &[
        "cache-control",
        "content-disposition",
        "content-encoding",
        "content-language",
        "content-type",
        "expires",
        "x-amz-acl",
        "x-amz-server-side-encryption",
        "x-amz-storage-class",
        "x-amz-website-redirect-location",
    ];
    headers
        .iter()
        .filter(|(name, _)| {
            STORED.contains(&name.as_str()) || name.as_str().starts_with("x-amz-meta-")
        })
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_owned(), v.to_owned()))
        })
        .collect()
}

/// A connector that sends every request to `store`.
#[must_use]
pub fn connector(store: &Arc<FakeStore>, stats: &Arc<CallStats>) -> Connector {
    init_tracing();
    let config = ClientConfig::builder()
        .hostname(FAKE_HOST)
        .secure(false)
        .path_style(true)
        .build();
    Connector::new()
        .with_credentials(Some("test".to_owned()), Some("test".to_owned()))
        .with_client_config(config)
        .with_transport(Arc::clone(store) as Arc<dyn HttpTransport>)
        .with_metrics(Arc::clone(stats) as _)
}

/// Parse a one-bucket YAML document.
#[must_use]
pub fn bucket_config(document: &str) -> BucketConfig {
    let mut buckets = parse_config(document).expect("valid configuration");
    assert_eq!(buckets.len(), 1, "expected exactly one bucket");
    buckets.remove(0)
}

/// Build the bucket described by `document` against `store`.
#[must_use]
pub fn bucket(store: &Arc<FakeStore>, document: &str) -> Bucket {
    connector(store, &Arc::new(CallStats::new()))
        .connect(&bucket_config(document))
        .expect("bucket should connect")
}

/// Write `content` to `relative` under `dir`, creating parent directories.
pub fn write_file(dir: &Path, relative: &str, content: &[u8]) {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create parent directories");
    }
    std::fs::write(path, content).expect("write fixture file");
}

/// YAML for a quoted path.
#[must_use]
pub fn yaml_path(path: &Path) -> String {
    format!("'{}'", path.display())
}

mod test_concurrency;
mod test_modes;
mod test_multipart;
mod test_scenarios;
