//! Full reconciliation runs against the in-memory store.

#[cfg(test)]
mod tests {
    use bucketsync_core::{CoreError, SyncOptions, SyncState};
    use http::Method;
    use tempfile::TempDir;

    use crate::{FakeStore, bucket, write_file, yaml_path};

    fn local_site() -> TempDir {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "a.txt", b"brand new");
        write_file(dir.path(), "b.txt", b"new");
        dir
    }

    fn remote_site() -> std::sync::Arc<FakeStore> {
        let store = FakeStore::new();
        store.put_object("b.txt", b"old");
        store.put_object("c.txt", b"gone locally");
        store
    }

    #[tokio::test]
    async fn test_should_upload_changes_and_sync_the_rest_without_delete() {
        let dir = local_site();
        let store = remote_site();
        let document = format!("bucket: site\nrsync:\n  src: {}\n", yaml_path(dir.path()));

        let report = bucket(&store, &document)
            .sync(&SyncOptions::default())
            .await
            .unwrap();

        assert_eq!(report.state, SyncState::Done);
        assert_eq!((report.uploads, report.syncs, report.deletes), (2, 1, 0));
        assert_eq!(store.keys(), ["a.txt", "b.txt", "c.txt"]);
        assert_eq!(&store.object("a.txt").unwrap().body[..], b"brand new");
        assert_eq!(&store.object("b.txt").unwrap().body[..], b"new");
        assert_eq!(&store.object("c.txt").unwrap().body[..], b"gone locally");

        let copy = store
            .writes()
            .into_iter()
            .find(|r| r.key.as_deref() == Some("c.txt"))
            .expect("c.txt should be synced");
        assert_eq!(copy.method, Method::PUT);
        assert_eq!(copy.header("x-amz-copy-source"), Some("/site/c.txt"));
        assert_eq!(copy.header("x-amz-metadata-directive"), Some("REPLACE"));
        assert!(copy.body.is_empty());
    }

    #[tokio::test]
    async fn test_should_delete_missing_files_with_delete() {
        let dir = local_site();
        let store = remote_site();
        let document = format!(
            "bucket: site\nrsync:\n  src: {}\n  delete: true\n",
            yaml_path(dir.path())
        );

        let report = bucket(&store, &document)
            .sync(&SyncOptions::default())
            .await
            .unwrap();

        assert_eq!((report.uploads, report.syncs, report.deletes), (2, 0, 1));
        assert_eq!(store.keys(), ["a.txt", "b.txt"]);

        let deletes: Vec<_> = store
            .writes()
            .into_iter()
            .filter(|r| r.method == Method::POST && r.has_query("delete"))
            .collect();
        assert_eq!(deletes.len(), 1, "deletes are sent as one bulk request");
        assert!(String::from_utf8_lossy(&deletes[0].body).contains("<Key>c.txt</Key>"));
    }

    #[tokio::test]
    async fn test_should_delete_cors_configured_as_null() {
        let store = FakeStore::new();
        let report = bucket(&store, "bucket: site\ncors: null\n")
            .sync(&SyncOptions::default())
            .await
            .unwrap();

        assert_eq!(report.state, SyncState::Done);
        assert_eq!(store.attribute("cors"), Some(None));
        assert!(
            store
                .writes()
                .iter()
                .any(|r| r.method == Method::DELETE && r.has_query("cors"))
        );
        assert_eq!(store.attribute("website"), None, "unconfigured attributes are left alone");
    }

    #[tokio::test]
    async fn test_should_put_configured_cors_document() {
        let cors = "<CORSConfiguration><CORSRule><AllowedOrigin>*</AllowedOrigin>\
                    <AllowedMethod>GET</AllowedMethod></CORSRule></CORSConfiguration>";
        let store = FakeStore::new();
        let document = format!("bucket: site\ncors: '{cors}'\n");

        bucket(&store, &document)
            .sync(&SyncOptions::default())
            .await
            .unwrap();

        let stored = store.attribute("cors").flatten().expect("cors stored");
        assert_eq!(&stored[..], cors.as_bytes());
        let put = store
            .writes()
            .into_iter()
            .find(|r| r.has_query("cors"))
            .unwrap();
        assert_eq!(put.method, Method::PUT);
        assert!(put.header("content-md5").is_some());
    }

    #[tokio::test]
    async fn test_should_fail_on_conflict_before_any_write() {
        let first = TempDir::new().unwrap();
        write_file(first.path(), "assets/logo.png", b"first logo");
        let second = TempDir::new().unwrap();
        write_file(second.path(), "logo.png", b"second logo");

        let store = FakeStore::new();
        let document = format!(
            "bucket: site\ncors: null\nrsync:\n  - src: {}\n  - src: {}\n    dest: assets\n",
            yaml_path(first.path()),
            yaml_path(second.path())
        );

        let err = bucket(&store, &document)
            .sync(&SyncOptions::default())
            .await
            .unwrap_err();

        match err {
            CoreError::Conflict(conflict) => assert_eq!(conflict.key, "assets/logo.png"),
            other => panic!("expected a conflict, got {other:?}"),
        }
        assert!(store.writes().is_empty(), "no write may precede the conflict");
        assert!(!store.is_created());
    }

    #[tokio::test]
    async fn test_should_apply_key_config_and_redirects() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "index.html", b"<html></html>");
        write_file(dir.path(), "notes.txt", b"plain");

        let store = FakeStore::new();
        let document = format!(
            "\
bucket: site
key_config:
  - cache_control: max-age=60
  - patterns: ['*.html']
    cache_control: no-cache
    metadata: {{team: web}}
rsync: {}
redirects:
  - [old.html, /index.html]
",
            yaml_path(dir.path())
        );

        let report = bucket(&store, &document)
            .sync(&SyncOptions::default())
            .await
            .unwrap();
        assert_eq!((report.uploads, report.redirects), (2, 1));

        let index = store.object("index.html").unwrap();
        assert_eq!(index.headers["cache-control"], "no-cache");
        assert_eq!(index.headers["content-type"], "text/html");
        assert_eq!(index.headers["x-amz-meta-team"], "web");
        let notes = store.object("notes.txt").unwrap();
        assert_eq!(notes.headers["cache-control"], "max-age=60");
        assert_eq!(notes.headers["content-type"], "text/plain");

        let redirect = store.object("old.html").unwrap();
        assert!(redirect.body.is_empty());
        assert_eq!(redirect.headers["x-amz-website-redirect-location"], "/index.html");

        // Redirects go out after every upload.
        let writes = store.writes();
        let last = writes.last().unwrap();
        assert_eq!(last.key.as_deref(), Some("old.html"));
    }

    #[tokio::test]
    async fn test_should_converge_on_second_run() {
        let dir = local_site();
        let store = remote_site();
        let document = format!(
            "bucket: site\nrsync:\n  src: {}\n  delete: true\n",
            yaml_path(dir.path())
        );
        let bucket = bucket(&store, &document);

        bucket.sync(&SyncOptions::default()).await.unwrap();
        let after_first = store.objects();
        store.clear_requests();

        let report = bucket.sync(&SyncOptions::default()).await.unwrap();
        assert_eq!((report.uploads, report.syncs, report.deletes), (0, 2, 0));
        assert_eq!(store.objects().keys().collect::<Vec<_>>(), after_first.keys().collect::<Vec<_>>());
        assert!(
            store
                .writes()
                .iter()
                .filter(|r| r.key.is_some())
                .all(|r| r.header("x-amz-copy-source").is_some()),
            "unchanged files are only synced in place"
        );
    }

    #[tokio::test]
    async fn test_should_rewrite_redirects_on_every_run() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "index.html", b"<html></html>");
        write_file(dir.path(), "notes.txt", b"plain");

        let store = FakeStore::new();
        let document = format!(
            "\
bucket: site
key_config:
  - patterns: ['*.html']
    cache_control: no-cache
rsync: {}
redirects:
  - [old.html, /index.html]
",
            yaml_path(dir.path())
        );
        let bucket = bucket(&store, &document);

        bucket.sync(&SyncOptions::default()).await.unwrap();
        store.clear_requests();

        let report = bucket.sync(&SyncOptions::default()).await.unwrap();
        assert_eq!(report.state, SyncState::Done);
        assert_eq!(
            (report.uploads, report.syncs, report.redirects, report.deletes),
            (0, 2, 1, 0)
        );

        let redirect_writes: Vec<_> = store
            .writes()
            .into_iter()
            .filter(|r| r.key.as_deref() == Some("old.html"))
            .collect();
        assert_eq!(redirect_writes.len(), 1);
        assert_eq!(redirect_writes[0].method, Method::PUT);
        assert!(
            redirect_writes[0].header("x-amz-copy-source").is_none(),
            "the redirect key is written again, not copied in place"
        );
        assert_eq!(
            redirect_writes[0].header("x-amz-website-redirect-location"),
            Some("/index.html")
        );
        assert_eq!(
            store.object("old.html").unwrap().headers["x-amz-website-redirect-location"],
            "/index.html"
        );
        assert_eq!(store.object("index.html").unwrap().headers["cache-control"], "no-cache");
    }
}
