//! Dry runs, rsync-only runs, listing pagination and request accounting.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bucketsync_client::CallStats;
    use bucketsync_core::{CoreError, SyncOptions, SyncState};
    use http::Method;
    use tempfile::TempDir;

    use crate::{FakeStore, bucket, bucket_config, connector, write_file, yaml_path};

    fn site_document(dir: &TempDir) -> String {
        format!(
            "\
bucket: site
cors: null
versioning: true
rsync:
  src: {}
  delete: true
redirects:
  - [old.html, /index.html]
",
            yaml_path(dir.path())
        )
    }

    fn site_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "index.html", b"<html></html>");
        dir
    }

    #[tokio::test]
    async fn test_should_only_list_in_dry_run() {
        let dir = site_dir();
        let store = FakeStore::new();
        store.put_object("obsolete.txt", b"bye");
        store.put_object("kept.txt", b"kept");

        let options = SyncOptions {
            dry_run: true,
            ..SyncOptions::default()
        };
        let report = bucket(&store, &site_document(&dir))
            .sync(&options)
            .await
            .unwrap();

        assert!(report.dry_run);
        assert_eq!(report.state, SyncState::Done);
        assert_eq!(
            (report.uploads, report.deletes, report.redirects),
            (1, 2, 1)
        );
        assert!(store.writes().is_empty());
        assert!(store.requests().iter().all(|r| r.method == Method::GET));
        assert_eq!(store.keys(), ["kept.txt", "obsolete.txt"]);
    }

    #[tokio::test]
    async fn test_should_plan_against_missing_bucket_in_dry_run() {
        let dir = site_dir();
        let store = FakeStore::new();
        let options = SyncOptions {
            dry_run: true,
            ..SyncOptions::default()
        };

        let report = bucket(&store, &site_document(&dir))
            .sync(&options)
            .await
            .unwrap();
        assert_eq!(report.uploads, 1);
        assert!(!store.is_created());
    }

    #[tokio::test]
    async fn test_should_skip_attributes_and_redirects_when_rsync_only() {
        let dir = site_dir();
        let store = FakeStore::new();
        store.put_object("unmanaged/readme.txt", b"left alone");
        let document = format!(
            "bucket: site\ncors: null\nrsync:\n  src: {}\n  dest: www\nredirects:\n  - [old.html, /index.html]\n",
            yaml_path(dir.path())
        );
        let options = SyncOptions {
            rsync_only: true,
            ..SyncOptions::default()
        };

        let report = bucket(&store, &document).sync(&options).await.unwrap();

        assert_eq!((report.uploads, report.syncs, report.redirects), (1, 0, 0));
        assert_eq!(store.attribute("cors"), None);
        assert_eq!(store.keys(), ["unmanaged/readme.txt", "www/index.html"]);
        assert!(
            store
                .writes()
                .iter()
                .all(|r| r.key.as_deref() != Some("unmanaged/readme.txt"))
        );
    }

    #[tokio::test]
    async fn test_should_follow_listing_pages() {
        let store = FakeStore::with_page_size(3);
        for i in 0..8 {
            store.put_object(&format!("key-{i}"), b"x");
        }
        store.put_object("a & b <c>.txt", b"escaped");

        let report = bucket(&store, "bucket: site\n")
            .sync(&SyncOptions::default())
            .await
            .unwrap();
        assert_eq!(report.syncs, 9);

        let listings: Vec<_> = store
            .requests()
            .into_iter()
            .filter(|r| r.method == Method::GET)
            .collect();
        assert_eq!(listings.len(), 3);
        assert!(!listings[0].has_query("marker"));
        assert!(listings[1].has_query("marker"));

        let copy = store
            .writes()
            .into_iter()
            .find(|r| r.key.as_deref() == Some("a & b <c>.txt"))
            .expect("escaped key synced");
        assert!(copy.header("x-amz-copy-source").is_some());
    }

    #[tokio::test]
    async fn test_should_count_requests_per_method() {
        let dir = site_dir();
        let store = FakeStore::new();
        store.put_object("obsolete.txt", b"bye");
        let stats = Arc::new(CallStats::new());

        connector(&store, &stats)
            .connect(&bucket_config(&site_document(&dir)))
            .unwrap()
            .sync(&SyncOptions::default())
            .await
            .unwrap();

        // create, versioning, index.html, redirect
        assert_eq!(stats.get("PUT"), 4);
        assert_eq!(stats.get("DELETE"), 1);
        assert_eq!(stats.get("POST"), 1);
        assert_eq!(stats.get("GET"), 1);
        assert_eq!(stats.total(), store.requests().len() as u64);
    }

    #[tokio::test]
    async fn test_should_recheck_remote_before_syncing() {
        let store = FakeStore::new();
        store.put_object("a.txt", b"a");
        store.put_object("b.txt", b"b");

        let options = SyncOptions {
            recheck_remote: true,
            ..SyncOptions::default()
        };
        let report = bucket(&store, "bucket: site\n")
            .sync(&options)
            .await
            .unwrap();

        assert_eq!(report.syncs, 2);
        let listings = store
            .requests()
            .iter()
            .filter(|r| r.method == Method::GET)
            .count();
        assert_eq!(listings, 2, "the bucket is listed again before syncing");
    }

    #[tokio::test]
    async fn test_should_fail_on_missing_source_before_any_write() {
        let store = FakeStore::new();
        let dir = TempDir::new().unwrap();
        let document = format!(
            "bucket: site\nrsync:\n  src: {}\n",
            yaml_path(&dir.path().join("missing"))
        );

        let err = bucket(&store, &document)
            .sync(&SyncOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Io { .. }), "got {err:?}");
        assert!(store.writes().is_empty());
    }
}
