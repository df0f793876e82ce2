#![allow(dead_code)]

use async_trait::async_trait;
use remote_bridge::config::{SinkConfig, SinkKind};
use remote_bridge::transport::{
    Delivery, ObjectStorage, QueueProducer, SourceConnector, SourceListener, SourceTransport,
    TransportError,
};
use remote_bridge::{CompletionHandler, DeliveryError, EventMessage, Qos};
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::{Barrier, Semaphore};

pub(crate) const WAIT: Duration = Duration::from_secs(5);

/// Routes pipeline logs to the test harness. Safe to call from every test.
pub(crate) fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub(crate) async fn wait_until<F, Fut>(what: &str, mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    tokio::time::timeout(WAIT, async {
        while !condition().await {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {what}"));
}

pub(crate) fn storage_config(dir: &Path, workers: u32) -> SinkConfig {
    let mut config = SinkConfig::new("local-store", SinkKind::Local);
    config.bucket = "bucket".to_string();
    config.temppath = dir.join("tmp");
    config.pool.worker = workers;
    config.limit.path = dir.join("data/stats.yml");
    config
}

pub(crate) fn queue_config(workers: u32) -> SinkConfig {
    let mut config = SinkConfig::new("kafka", SinkKind::Kafka);
    config.topic = "remote".to_string();
    config.address = vec!["127.0.0.1:9092".to_string()];
    config.pool.worker = workers;
    config
}

pub(crate) fn upload_payload(local_path: &str, remote_path: &str, zip: bool) -> Vec<u8> {
    serde_json::json!({
        "type": "UPLOAD",
        "content": {
            "localPath": local_path,
            "remotePath": remote_path,
            "zip": zip,
            "meta": {"source": "test"},
        }
    })
    .to_string()
    .into_bytes()
}

pub(crate) fn delivery(id: u64, qos: Qos, payload: Vec<u8>) -> Delivery {
    Delivery {
        id,
        qos,
        topic: "t/upload".to_string(),
        payload,
    }
}

pub(crate) fn entries_in(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

/// Collects completion outcomes in arrival order.
pub(crate) struct CompletionRecorder {
    tx: UnboundedSender<(EventMessage, Result<(), DeliveryError>)>,
}

pub(crate) type Outcomes = UnboundedReceiver<(EventMessage, Result<(), DeliveryError>)>;

impl CompletionRecorder {
    pub(crate) fn channel() -> (Arc<CompletionRecorder>, Outcomes) {
        let (tx, rx) = unbounded_channel();
        (Arc::new(CompletionRecorder { tx }), rx)
    }
}

#[async_trait]
impl CompletionHandler for CompletionRecorder {
    async fn on_complete(&self, message: EventMessage, result: Result<(), DeliveryError>) {
        let _ = self.tx.send((message, result));
    }
}

pub(crate) async fn next_outcome(rx: &mut Outcomes) -> (EventMessage, Result<(), DeliveryError>) {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for completion")
        .expect("recorder dropped")
}

#[derive(Clone, Debug)]
pub(crate) struct PutRecord {
    pub(crate) bucket: String,
    pub(crate) remote_path: String,
    pub(crate) local_path: PathBuf,
    pub(crate) local_existed: bool,
    pub(crate) meta: HashMap<String, String>,
}

/// Object storage double that records every call.
#[derive(Default)]
pub(crate) struct RecordingStorage {
    puts: Mutex<Vec<PutRecord>>,
    exists_calls: AtomicUsize,
    already_saved: AtomicBool,
    fail_puts: AtomicBool,
    panic_on_put: AtomicBool,
    put_gate: Option<Arc<Semaphore>>,
    put_barrier: Option<Arc<Barrier>>,
}

impl RecordingStorage {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Every put waits for one permit of `gate`.
    pub(crate) fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            put_gate: Some(gate),
            ..Self::default()
        }
    }

    /// Every put waits until `barrier` is full.
    pub(crate) fn with_barrier(barrier: Arc<Barrier>) -> Self {
        Self {
            put_barrier: Some(barrier),
            ..Self::default()
        }
    }

    pub(crate) fn set_already_saved(&self, saved: bool) {
        self.already_saved.store(saved, Ordering::SeqCst);
    }

    pub(crate) fn set_fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn set_panic_on_put(&self, panic: bool) {
        self.panic_on_put.store(panic, Ordering::SeqCst);
    }

    pub(crate) fn puts(&self) -> Vec<PutRecord> {
        self.puts.lock().expect("puts lock").clone()
    }

    pub(crate) fn exists_calls(&self) -> usize {
        self.exists_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStorage for RecordingStorage {
    async fn put_object_from_file(
        &self,
        bucket: &str,
        remote_path: &str,
        local_path: &Path,
        meta: &HashMap<String, String>,
    ) -> Result<(), TransportError> {
        self.puts.lock().expect("puts lock").push(PutRecord {
            bucket: bucket.to_string(),
            remote_path: remote_path.to_string(),
            local_path: local_path.to_path_buf(),
            local_existed: local_path.exists(),
            meta: meta.clone(),
        });
        if let Some(barrier) = &self.put_barrier {
            barrier.wait().await;
        }
        if let Some(gate) = &self.put_gate {
            gate.acquire().await.expect("gate open").forget();
        }
        if self.panic_on_put.load(Ordering::SeqCst) {
            panic!("storage backend exploded");
        }
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(TransportError::new("put rejected by backend"));
        }
        Ok(())
    }

    async fn object_exists(
        &self,
        _bucket: &str,
        _remote_path: &str,
        _content_md5: &str,
    ) -> Result<bool, TransportError> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.already_saved.load(Ordering::SeqCst))
    }
}

/// Queue producer double that records `(key, value)` pairs.
#[derive(Default)]
pub(crate) struct RecordingProducer {
    sent: Mutex<Vec<(Vec<u8>, Vec<u8>)>>,
}

impl RecordingProducer {
    pub(crate) fn sent(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.sent.lock().expect("sent lock").clone()
    }
}

#[async_trait]
impl QueueProducer for RecordingProducer {
    async fn send(&self, key: &[u8], value: &[u8]) -> Result<(), TransportError> {
        self.sent
            .lock()
            .expect("sent lock")
            .push((key.to_vec(), value.to_vec()));
        Ok(())
    }
}

/// Source double driven by the test.
#[derive(Default)]
pub(crate) struct MockSource {
    listener: Mutex<Option<Arc<dyn SourceListener>>>,
    subscriptions: Mutex<Vec<(String, Qos)>>,
    acks: Mutex<Vec<u64>>,
    unsubscribes: AtomicUsize,
    fail_subscribe: AtomicBool,
}

impl MockSource {
    pub(crate) fn set_fail_subscribe(&self, fail: bool) {
        self.fail_subscribe.store(fail, Ordering::SeqCst);
    }

    pub(crate) async fn deliver(&self, delivery: Delivery) {
        let listener = self
            .listener
            .lock()
            .expect("listener lock")
            .clone()
            .expect("a listener must be subscribed");
        listener.on_receive(delivery).await;
    }

    pub(crate) fn acks(&self) -> Vec<u64> {
        self.acks.lock().expect("acks lock").clone()
    }

    pub(crate) fn subscriptions(&self) -> Vec<(String, Qos)> {
        self.subscriptions.lock().expect("subscriptions lock").clone()
    }

    pub(crate) fn unsubscribes(&self) -> usize {
        self.unsubscribes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceTransport for MockSource {
    async fn subscribe(
        &self,
        topic: &str,
        qos: Qos,
        listener: Arc<dyn SourceListener>,
    ) -> Result<(), TransportError> {
        self.subscriptions
            .lock()
            .expect("subscriptions lock")
            .push((topic.to_string(), qos));
        *self.listener.lock().expect("listener lock") = Some(listener);
        if self.fail_subscribe.load(Ordering::SeqCst) {
            return Err(TransportError::new("broker refused subscription"));
        }
        Ok(())
    }

    async fn acknowledge(&self, id: u64) -> Result<(), TransportError> {
        self.acks.lock().expect("acks lock").push(id);
        Ok(())
    }

    async fn unsubscribe(&self) -> Result<(), TransportError> {
        self.unsubscribes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out one shared [`MockSource`] and remembers the requested client ids.
#[derive(Default)]
pub(crate) struct MockConnector {
    pub(crate) source: Arc<MockSource>,
    client_ids: Mutex<Vec<String>>,
}

impl MockConnector {
    pub(crate) fn client_ids(&self) -> Vec<String> {
        self.client_ids.lock().expect("client ids lock").clone()
    }
}

impl SourceConnector for MockConnector {
    fn connect(&self, client_id: &str) -> Result<Arc<dyn SourceTransport>, TransportError> {
        self.client_ids
            .lock()
            .expect("client ids lock")
            .push(client_id.to_string());
        Ok(self.source.clone())
    }
}
