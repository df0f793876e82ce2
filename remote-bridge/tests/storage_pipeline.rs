mod support;

use remote_bridge::quota::{self, dump_stats, load_stats, Item, Stats};
use remote_bridge::{
    DeliveryError, Event, EventKind, EventMessage, Qos, StorageClient, UploadEvent,
};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use support::{
    entries_in, next_outcome, storage_config, CompletionRecorder, RecordingStorage,
};
use tokio::sync::{Barrier, Semaphore};

fn upload_message(id: u64, local_path: &str, remote_path: &str, zip: bool) -> EventMessage {
    EventMessage {
        id,
        qos: Qos::AtLeastOnce,
        topic: "t/upload".to_string(),
        event: Event::new(EventKind::Upload(UploadEvent {
            local_path: local_path.to_string(),
            remote_path: remote_path.to_string(),
            zip,
            meta: HashMap::new(),
        })),
    }
}

fn write_file(work_dir: &Path, relative: &str, len: usize) {
    let path = work_dir.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("mkdir");
    }
    fs::write(path, vec![b'x'; len]).expect("write");
}

struct Fixture {
    dir: tempfile::TempDir,
    storage: Arc<RecordingStorage>,
}

impl Fixture {
    fn new(storage: RecordingStorage) -> Self {
        support::init_logging();
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("work")).expect("mkdir");
        Self {
            dir,
            storage: Arc::new(storage),
        }
    }

    fn work_dir(&self) -> std::path::PathBuf {
        self.dir.path().join("work")
    }

    fn temp_dir(&self) -> std::path::PathBuf {
        self.dir.path().join("tmp")
    }

    fn client(&self, config: &remote_bridge::config::SinkConfig) -> StorageClient {
        StorageClient::with_work_dir(config, self.storage.clone(), self.work_dir())
            .expect("storage client should build")
    }
}

#[tokio::test]
async fn parent_traversal_is_rejected_without_touching_storage() {
    let fixture = Fixture::new(RecordingStorage::new());
    let client = fixture.client(&storage_config(fixture.dir.path(), 4));
    let (recorder, mut outcomes) = CompletionRecorder::channel();

    client
        .call_async(upload_message(1, "../secret", "r/secret", false), recorder)
        .await;

    let (message, result) = next_outcome(&mut outcomes).await;
    assert_eq!(message.id, 1);
    assert!(matches!(result, Err(DeliveryError::PathTraversal(path)) if path == "../secret"));
    assert_eq!(fixture.storage.exists_calls(), 0);
    assert!(fixture.storage.puts().is_empty());
    assert_eq!(client.file_stats().not_found, 0);
    assert_eq!(entries_in(&fixture.temp_dir()), 0);
    client.close().await;
}

#[tokio::test]
async fn missing_path_counts_as_not_found() {
    let fixture = Fixture::new(RecordingStorage::new());
    let client = fixture.client(&storage_config(fixture.dir.path(), 4));
    let (recorder, mut outcomes) = CompletionRecorder::channel();

    client
        .call_async(upload_message(2, "absent.log", "r/absent.log", false), recorder)
        .await;

    let (_, result) = next_outcome(&mut outcomes).await;
    assert!(matches!(result, Err(DeliveryError::PathNotFound { .. })));
    assert_eq!(client.file_stats().not_found, 1);
    assert!(fixture.storage.puts().is_empty());
    client.close().await;
}

#[tokio::test]
async fn regular_file_is_uploaded_in_place() {
    let fixture = Fixture::new(RecordingStorage::new());
    write_file(&fixture.work_dir(), "logs/a.log", 10);
    let client = fixture.client(&storage_config(fixture.dir.path(), 4));
    let (recorder, mut outcomes) = CompletionRecorder::channel();

    // A leading slash still resolves inside the working directory.
    client
        .call_async(upload_message(3, "/logs/a.log", "r/a.log", false), recorder)
        .await;

    let (_, result) = next_outcome(&mut outcomes).await;
    assert!(result.is_ok(), "{result:?}");
    let puts = fixture.storage.puts();
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].bucket, "bucket");
    assert_eq!(puts[0].remote_path, "r/a.log");
    assert_eq!(
        puts[0].local_path,
        fixture
            .work_dir()
            .join("logs/a.log")
            .canonicalize()
            .expect("canonical")
    );
    assert!(fixture.work_dir().join("logs/a.log").exists());
    assert_eq!(client.file_stats().success, 1);
    client.close().await;
}

#[tokio::test]
async fn directory_is_tarred_and_artifact_removed_after_upload() {
    let fixture = Fixture::new(RecordingStorage::new());
    write_file(&fixture.work_dir(), "logs/a.log", 10);
    write_file(&fixture.work_dir(), "logs/inner/b.log", 20);
    let client = fixture.client(&storage_config(fixture.dir.path(), 4));
    let (recorder, mut outcomes) = CompletionRecorder::channel();

    client
        .call_async(upload_message(4, "logs", "r/logs.tar", false), recorder)
        .await;

    let (_, result) = next_outcome(&mut outcomes).await;
    assert!(result.is_ok(), "{result:?}");
    let puts = fixture.storage.puts();
    assert_eq!(puts.len(), 1);
    assert!(puts[0].local_existed, "artifact must exist during the put");
    assert!(puts[0].local_path.starts_with(fixture.temp_dir()));
    assert!(!puts[0].local_path.exists());
    assert_eq!(entries_in(&fixture.temp_dir()), 0);
    assert!(fixture.work_dir().join("logs/inner/b.log").exists());
    client.close().await;
}

#[tokio::test]
async fn artifact_is_removed_when_upload_fails() {
    let storage = RecordingStorage::new();
    storage.set_fail_puts(true);
    let fixture = Fixture::new(storage);
    write_file(&fixture.work_dir(), "logs/a.log", 10);
    let client = fixture.client(&storage_config(fixture.dir.path(), 4));
    let (recorder, mut outcomes) = CompletionRecorder::channel();

    client
        .call_async(upload_message(5, "logs/a.log", "r/a.zip", true), recorder)
        .await;

    let (_, result) = next_outcome(&mut outcomes).await;
    assert!(matches!(result, Err(DeliveryError::Transport(_))));
    assert_eq!(fixture.storage.puts().len(), 1);
    assert_eq!(entries_in(&fixture.temp_dir()), 0);
    assert_eq!(client.file_stats().fail, 1);
    client.close().await;
}

#[tokio::test]
async fn matching_checksum_skips_the_put() {
    let storage = RecordingStorage::new();
    storage.set_already_saved(true);
    let fixture = Fixture::new(storage);
    write_file(&fixture.work_dir(), "a.log", 10);
    let client = fixture.client(&storage_config(fixture.dir.path(), 4));
    let (recorder, mut outcomes) = CompletionRecorder::channel();

    client
        .call_async(upload_message(6, "a.log", "r/a.log", false), recorder)
        .await;

    let (_, result) = next_outcome(&mut outcomes).await;
    assert!(result.is_ok(), "{result:?}");
    assert_eq!(fixture.storage.exists_calls(), 1);
    assert!(fixture.storage.puts().is_empty());
    assert_eq!(client.file_stats().success, 0);
    client.close().await;
}

#[tokio::test]
async fn quota_exceeded_rejects_before_the_put() {
    let fixture = Fixture::new(RecordingStorage::new());
    write_file(&fixture.work_dir(), "big.log", 200);
    let mut config = storage_config(fixture.dir.path(), 4);
    config.limit.enable = true;
    config.limit.data = remote_bridge::config::ByteSize(100);
    let client = fixture.client(&config);
    let (recorder, mut outcomes) = CompletionRecorder::channel();

    client
        .call_async(upload_message(7, "big.log", "r/big.log", false), recorder)
        .await;

    let (_, result) = next_outcome(&mut outcomes).await;
    let err = result.expect_err("upload over the limit must fail");
    assert!(err.is_quota_exceeded(), "{err}");
    assert!(fixture.storage.puts().is_empty());
    assert_eq!(client.file_stats().quota_rejected, 1);
    assert_eq!(
        client.month_usage(&quota::current_month()),
        Some(Item::default())
    );
    client.close().await;
}

#[tokio::test]
async fn disabled_quota_ignores_persisted_usage() {
    let fixture = Fixture::new(RecordingStorage::new());
    write_file(&fixture.work_dir(), "a.log", 50);
    let mut config = storage_config(fixture.dir.path(), 4);
    config.limit.data = remote_bridge::config::ByteSize(10);
    let mut exhausted = Stats::default();
    exhausted
        .months
        .insert(quota::current_month(), Item { bytes: 1 << 40, count: 9 });
    fs::create_dir_all(fixture.dir.path().join("data")).expect("mkdir");
    dump_stats(&config.limit.path, &exhausted).expect("seed stats");
    let client = fixture.client(&config);
    let (recorder, mut outcomes) = CompletionRecorder::channel();

    client
        .call_async(upload_message(8, "a.log", "r/a.log", false), recorder)
        .await;

    let (_, result) = next_outcome(&mut outcomes).await;
    assert!(result.is_ok(), "{result:?}");
    assert_eq!(fixture.storage.puts().len(), 1);
    assert_eq!(client.month_usage(&quota::current_month()), None);
    assert_eq!(load_stats(&config.limit.path).expect("reload"), exhausted);
    client.close().await;
}

#[tokio::test]
async fn successful_upload_is_persisted_in_stats() {
    let fixture = Fixture::new(RecordingStorage::new());
    write_file(&fixture.work_dir(), "a.log", 42);
    let mut config = storage_config(fixture.dir.path(), 4);
    config.limit.enable = true;
    let client = fixture.client(&config);
    let (recorder, mut outcomes) = CompletionRecorder::channel();

    client
        .call_async(upload_message(9, "a.log", "r/a.log", false), recorder)
        .await;

    let (_, result) = next_outcome(&mut outcomes).await;
    assert!(result.is_ok(), "{result:?}");
    let on_disk = load_stats(&config.limit.path).expect("reload");
    assert_eq!(on_disk.total, Item { bytes: 42, count: 1 });
    assert_eq!(
        on_disk.months.get(&quota::current_month()),
        Some(&Item { bytes: 42, count: 1 })
    );
    client.close().await;
}

#[tokio::test]
async fn concurrent_uploads_may_overshoot_the_limit() {
    let barrier = Arc::new(Barrier::new(2));
    let fixture = Fixture::new(RecordingStorage::with_barrier(barrier));
    write_file(&fixture.work_dir(), "a.bin", 600);
    write_file(&fixture.work_dir(), "b.bin", 600);
    let mut config = storage_config(fixture.dir.path(), 2);
    config.limit.enable = true;
    config.limit.data = remote_bridge::config::ByteSize(1000);
    let client = fixture.client(&config);
    let (recorder, mut outcomes) = CompletionRecorder::channel();

    client
        .call_async(upload_message(10, "a.bin", "r/a.bin", false), recorder.clone())
        .await;
    client
        .call_async(upload_message(11, "b.bin", "r/b.bin", false), recorder)
        .await;

    let (_, first) = next_outcome(&mut outcomes).await;
    let (_, second) = next_outcome(&mut outcomes).await;
    assert!(first.is_ok(), "{first:?}");
    assert!(second.is_ok(), "{second:?}");
    assert_eq!(
        client.month_usage(&quota::current_month()),
        Some(Item { bytes: 1200, count: 2 })
    );
    client.close().await;
}

#[tokio::test]
async fn saturated_pool_rejects_before_returning() {
    let gate = Arc::new(Semaphore::new(0));
    let fixture = Fixture::new(RecordingStorage::gated(gate.clone()));
    write_file(&fixture.work_dir(), "a.log", 10);
    let client = fixture.client(&storage_config(fixture.dir.path(), 1));
    let (recorder, mut outcomes) = CompletionRecorder::channel();

    client
        .call_async(upload_message(12, "a.log", "r/a.log", false), recorder.clone())
        .await;
    client
        .call_async(upload_message(13, "a.log", "r/a.log", false), recorder)
        .await;

    let (rejected, result) = outcomes
        .try_recv()
        .expect("rejection must be reported synchronously");
    assert_eq!(rejected.id, 13);
    assert!(matches!(result, Err(DeliveryError::PoolSaturated(1))));

    gate.add_permits(1);
    let (accepted, result) = next_outcome(&mut outcomes).await;
    assert_eq!(accepted.id, 12);
    assert!(result.is_ok(), "{result:?}");
    client.close().await;
}

#[tokio::test]
async fn panicking_backend_completes_with_error_and_frees_the_worker() {
    let storage = RecordingStorage::new();
    storage.set_panic_on_put(true);
    let fixture = Fixture::new(storage);
    write_file(&fixture.work_dir(), "a.log", 10);
    let client = fixture.client(&storage_config(fixture.dir.path(), 1));
    let (recorder, mut outcomes) = CompletionRecorder::channel();

    client
        .call_async(upload_message(14, "a.log", "r/a.log", false), recorder.clone())
        .await;
    let (_, result) = next_outcome(&mut outcomes).await;
    assert!(matches!(result, Err(DeliveryError::TaskPanicked(reason)) if reason.contains("exploded")));

    fixture.storage.set_panic_on_put(false);
    let mut accepted = false;
    for id in 15..115 {
        client
            .call_async(upload_message(id, "a.log", "r/a.log", false), recorder.clone())
            .await;
        match next_outcome(&mut outcomes).await.1 {
            Ok(()) => {
                accepted = true;
                break;
            }
            Err(DeliveryError::PoolSaturated(_)) => {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            Err(other) => panic!("unexpected failure after panic: {other}"),
        }
    }
    assert!(accepted, "the panicked task must release its worker");
    client.close().await;
}

#[tokio::test]
async fn hanging_put_times_out() {
    let gate = Arc::new(Semaphore::new(0));
    let fixture = Fixture::new(RecordingStorage::gated(gate));
    write_file(&fixture.work_dir(), "a.log", 10);
    let mut config = storage_config(fixture.dir.path(), 1);
    config.timeout = Duration::from_millis(50);
    let client = fixture.client(&config);
    let (recorder, mut outcomes) = CompletionRecorder::channel();

    client
        .call_async(upload_message(16, "a.log", "r/a.log", false), recorder)
        .await;

    let (_, result) = next_outcome(&mut outcomes).await;
    assert!(matches!(result, Err(DeliveryError::Timeout(_))));
    assert_eq!(client.file_stats().fail, 1);
    client.close().await;
}

#[tokio::test]
async fn closed_client_reports_client_closed() {
    let fixture = Fixture::new(RecordingStorage::new());
    write_file(&fixture.work_dir(), "a.log", 10);
    let client = fixture.client(&storage_config(fixture.dir.path(), 2));
    let (recorder, mut outcomes) = CompletionRecorder::channel();

    client.close().await;
    client.close().await;
    client
        .call_async(upload_message(17, "a.log", "r/a.log", false), recorder)
        .await;

    let (_, result) = outcomes.try_recv().expect("closed rejection is synchronous");
    assert!(matches!(result, Err(DeliveryError::ClientClosed(name)) if name == "local-store"));
    assert!(fixture.storage.puts().is_empty());
}

#[tokio::test]
async fn close_waits_for_running_uploads() {
    let gate = Arc::new(Semaphore::new(0));
    let fixture = Fixture::new(RecordingStorage::gated(gate.clone()));
    write_file(&fixture.work_dir(), "a.log", 10);
    let client = Arc::new(fixture.client(&storage_config(fixture.dir.path(), 2)));
    let (recorder, mut outcomes) = CompletionRecorder::channel();

    client
        .call_async(upload_message(18, "a.log", "r/a.log", false), recorder)
        .await;
    support::wait_until("put started", || {
        let storage = fixture.storage.clone();
        async move { storage.puts().len() == 1 }
    })
    .await;

    let closing = {
        let client = client.clone();
        tokio::spawn(async move { client.close().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!closing.is_finished());

    gate.add_permits(1);
    tokio::time::timeout(support::WAIT, closing)
        .await
        .expect("close should finish after the upload")
        .expect("close task");
    let (_, result) = outcomes.try_recv().expect("upload completed before close returned");
    assert!(result.is_ok(), "{result:?}");
}
