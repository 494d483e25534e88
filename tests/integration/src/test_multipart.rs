//! Large files go through the multipart sub-protocol.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bucketsync_client::checksums::{MULTIPART_CUTOFF, MULTIPART_PART_SIZE, multipart_etag};
    use bucketsync_core::SyncOptions;
    use http::Method;
    use tempfile::TempDir;

    use crate::{FakeStore, bucket, write_file, yaml_path};

    fn pattern(len: usize, seed: u8) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8 ^ seed).collect()
    }

    #[tokio::test]
    async fn test_should_upload_large_files_in_parts_with_a_small_pool() {
        let size = usize::try_from(2 * MULTIPART_PART_SIZE + 1024).unwrap();
        let dir = TempDir::new().unwrap();
        let files: Vec<(String, Vec<u8>)> = (0..3)
            .map(|i| (format!("media/video-{i}.bin"), pattern(size, i)))
            .collect();
        for (name, content) in &files {
            write_file(dir.path(), name, content);
        }
        write_file(dir.path(), "small.txt", b"tiny");

        let store = FakeStore::new();
        let document = format!("bucket: media\nrsync: {}\n", yaml_path(dir.path()));
        let options = SyncOptions {
            concurrency: 2,
            ..SyncOptions::default()
        };
        let bucket = bucket(&store, &document);

        // Part uploads nest inside file uploads; a pool that did not lend
        // the caller's slot would deadlock here.
        let report = tokio::time::timeout(Duration::from_secs(60), bucket.sync(&options))
            .await
            .expect("multipart sync should not deadlock")
            .unwrap();
        assert_eq!(report.uploads, 4);

        let part_size = usize::try_from(MULTIPART_PART_SIZE).unwrap();
        for (name, content) in &files {
            let object = store.object(name).unwrap();
            assert_eq!(object.body.len(), content.len());
            assert_eq!(&object.body[..], &content[..]);
            assert_eq!(object.etag, multipart_etag(content, part_size));
            assert!(object.etag.ends_with("-3"));
        }
        assert_eq!(store.pending_uploads(), 0);

        let initiated = store
            .writes()
            .iter()
            .filter(|r| r.method == Method::POST && r.has_query("uploads"))
            .count();
        assert_eq!(initiated, 3, "small files use a single PUT");

        // The composite entity tag matches the local files, so nothing is
        // uploaded again.
        store.clear_requests();
        let report = bucket.sync(&options).await.unwrap();
        assert_eq!((report.uploads, report.syncs), (0, 4));
        assert!(
            store
                .writes()
                .iter()
                .all(|r| !r.has_query("uploads") && !r.has_query("partNumber"))
        );
    }

    #[tokio::test]
    async fn test_should_upload_file_at_cutoff_in_one_request() {
        let size = usize::try_from(MULTIPART_CUTOFF).unwrap();
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "edge.bin", &pattern(size, 7));

        let store = FakeStore::new();
        let document = format!("bucket: media\nrsync: {}\n", yaml_path(dir.path()));
        bucket(&store, &document)
            .sync(&SyncOptions::default())
            .await
            .unwrap();

        let object = store.object("edge.bin").unwrap();
        assert!(!object.etag.contains('-'));
        assert!(store.writes().iter().all(|r| !r.has_query("uploads")));
    }
}
