//! Results must not depend on the concurrency setting.

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;
    use std::time::Duration;

    use bucketsync_core::{CoreError, Executor, SyncOptions};
    use tempfile::TempDir;

    use crate::{FakeStore, bucket, write_file, yaml_path};

    async fn run_noop_batch(concurrency: i64, count: usize) -> Vec<usize> {
        let executor = Executor::new(concurrency);
        let tasks = (0..count).map(|i| async move {
            tokio::task::yield_now().await;
            Ok::<_, CoreError>(i * 3)
        });
        executor.join(tasks).await.unwrap()
    }

    #[tokio::test]
    async fn test_should_produce_same_results_for_any_concurrency() {
        let sequential = run_noop_batch(1, 64).await;
        let concurrent = run_noop_batch(8, 64).await;

        let sequential: BTreeSet<_> = sequential.into_iter().collect();
        let concurrent: BTreeSet<_> = concurrent.into_iter().collect();
        assert_eq!(sequential, concurrent);
        assert_eq!(sequential.len(), 64);
    }

    fn populated_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        for i in 0..24 {
            write_file(dir.path(), &format!("docs/page-{i:02}.html"), format!("page {i}").as_bytes());
        }
        write_file(dir.path(), "style.css", b"body {}");
        dir
    }

    async fn sync_with(concurrency: i64, dir: &TempDir) -> Arc<FakeStore> {
        let store = FakeStore::with_page_size(7);
        for i in 0..10 {
            store.put_object(&format!("stale/{i}.txt"), b"stale");
        }
        store.put_object("docs/page-00.html", b"outdated");
        let document = format!(
            "bucket: site\nrsync:\n  src: {}\n  delete: true\n",
            yaml_path(dir.path())
        );
        let options = SyncOptions {
            concurrency,
            ..SyncOptions::default()
        };
        bucket(&store, &document).sync(&options).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_should_reach_same_store_state_for_any_concurrency() {
        let dir = populated_dir();
        let sequential = sync_with(1, &dir).await;
        let concurrent = sync_with(8, &dir).await;

        assert_eq!(sequential.objects(), concurrent.objects());
        assert_eq!(concurrent.keys().len(), 25);
        assert!(concurrent.keys().iter().all(|k| !k.starts_with("stale/")));
    }

    #[tokio::test]
    async fn test_should_run_sequentially_without_a_pool() {
        let dir = populated_dir();
        let store = tokio::time::timeout(Duration::from_secs(30), sync_with(0, &dir))
            .await
            .expect("sequential sync should finish");
        assert_eq!(store.keys().len(), 25);
    }
}
