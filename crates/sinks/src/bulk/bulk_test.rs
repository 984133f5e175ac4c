//! Bulk sink tests

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use stave_entry::Value;
use stave_operator::BoundaryClients;

use super::*;

/// Scriptable bulk endpoint
struct FakeBulkApi {
    batches: Mutex<Vec<Vec<Entry>>>,
    fail_first: AtomicU64,
}

impl FakeBulkApi {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            batches: Mutex::new(Vec::new()),
            fail_first: AtomicU64::new(0),
        })
    }

    fn total_entries(&self) -> usize {
        self.batches.lock().iter().map(Vec::len).sum()
    }
}

#[async_trait]
impl BulkApi for FakeBulkApi {
    async fn send(&self, entries: &[Entry]) -> std::result::Result<(), BoundaryError> {
        let remaining = self.fail_first.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_first.store(remaining - 1, Ordering::SeqCst);
            return Err(BoundaryError::transient("endpoint unavailable"));
        }
        self.batches.lock().push(entries.to_vec());
        Ok(())
    }
}

fn context_with(api: Arc<FakeBulkApi>) -> BuildContext {
    let mut boundary = BoundaryClients::new();
    boundary.insert(BULK_API_CLIENT, api as Arc<dyn BulkApi>);
    BuildContext::in_memory().with_boundary(boundary)
}

fn fast_config() -> BulkOutputConfig {
    let mut config = BulkOutputConfig::new("bulk1");
    config.buffer.max_chunk_size = 2;
    config.buffer.max_chunk_delay = Duration::from_millis(20);
    config.flush_timeout = Duration::from_secs(1);
    config
}

async fn wait_for<F: Fn() -> bool>(condition: F) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

#[test]
fn build_fails_without_boundary_client() {
    let err = BulkOutputConfig::new("bulk1")
        .build(&BuildContext::in_memory())
        .unwrap_err();
    assert!(err.to_string().contains("bulk_api"));
}

#[test]
fn build_rejects_invalid_buffer() {
    let api = FakeBulkApi::new();
    let mut config = BulkOutputConfig::new("bulk1");
    config.buffer.max_chunk_size = 0;
    assert!(config.build(&context_with(api)).is_err());
}

#[tokio::test]
async fn batches_reach_the_endpoint() {
    let api = FakeBulkApi::new();
    let ops = fast_config().build(&context_with(api.clone())).unwrap();
    let sink = &ops[0];

    sink.start().await.unwrap();
    for i in 0..4 {
        sink.process(Entry::from_record(Value::Int(i))).await.unwrap();
    }

    wait_for(|| api.total_entries() == 4).await;
    // max_chunk_size 2 means at least two batches.
    assert!(api.batches.lock().len() >= 2);
    sink.stop().await.unwrap();
}

#[tokio::test]
async fn transient_failures_are_retried() {
    let api = FakeBulkApi::new();
    api.fail_first.store(2, Ordering::SeqCst);
    let ops = fast_config().build(&context_with(api.clone())).unwrap();
    let sink = &ops[0];

    sink.start().await.unwrap();
    sink.process(Entry::basic("persistent")).await.unwrap();

    wait_for(|| api.total_entries() == 1).await;
    sink.stop().await.unwrap();
}

#[tokio::test]
async fn stop_flushes_pending_entries() {
    let api = FakeBulkApi::new();
    let mut config = fast_config();
    // Large chunk and long delay so nothing flushes until stop.
    config.buffer.max_chunk_size = 100;
    config.buffer.max_chunk_delay = Duration::from_secs(60);
    let ops = config.build(&context_with(api.clone())).unwrap();
    let sink = &ops[0];

    sink.start().await.unwrap();
    for i in 0..3 {
        sink.process(Entry::from_record(Value::Int(i))).await.unwrap();
    }
    sink.stop().await.unwrap();

    assert_eq!(api.total_entries(), 3);
}

#[test]
fn deserializes_buffer_block() {
    let config: BulkOutputConfig = serde_yaml::from_str(
        "type: bulk_output\nbuffer:\n  type: memory\n  max_chunk_size: 50\n  max_chunk_delay: 2s\n",
    )
    .unwrap();
    assert_eq!(config.buffer.max_chunk_size, 50);
    assert_eq!(config.buffer.max_chunk_delay, Duration::from_secs(2));
}
