//! Event-stream source tests

use std::sync::Arc;

use async_trait::async_trait;
use stave_operator::helper::OutputIds;
use stave_operator::BoundaryClients;

use super::*;

/// Scripted bus with fixed partitions and per-partition events
struct FakeStream {
    partitions: Vec<String>,
    events: Mutex<std::collections::HashMap<String, Vec<StreamEvent>>>,
    subscriptions: Mutex<Vec<(String, StreamPosition)>>,
    closed: Mutex<bool>,
}

impl FakeStream {
    fn new(partitions: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            partitions: partitions.iter().map(|p| p.to_string()).collect(),
            events: Mutex::new(std::collections::HashMap::new()),
            subscriptions: Mutex::new(Vec::new()),
            closed: Mutex::new(false),
        })
    }

    fn add_event(&self, partition: &str, event: StreamEvent) {
        self.events
            .lock()
            .entry(partition.to_owned())
            .or_default()
            .push(event);
    }
}

#[async_trait]
impl EventStream for FakeStream {
    async fn partitions(&self) -> std::result::Result<Vec<String>, BoundaryError> {
        Ok(self.partitions.clone())
    }

    async fn receive(
        &self,
        partition: &str,
        from: StreamPosition,
    ) -> std::result::Result<mpsc::Receiver<StreamEvent>, BoundaryError> {
        self.subscriptions
            .lock()
            .push((partition.to_owned(), from));
        let (tx, rx) = mpsc::channel(16);
        let events = self
            .events
            .lock()
            .get(partition)
            .cloned()
            .unwrap_or_default();
        tokio::spawn(async move {
            for event in events {
                if tx.send(event).await.is_err() {
                    return;
                }
            }
            // Keep the channel open like a live subscription would.
            std::future::pending::<()>().await;
        });
        Ok(rx)
    }

    async fn close(&self) -> std::result::Result<(), BoundaryError> {
        *self.closed.lock() = true;
        Ok(())
    }
}

struct Recorder {
    received: Arc<Mutex<Vec<Entry>>>,
}

impl Recorder {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            received: Arc::new(Mutex::new(Vec::new())),
        })
    }
}

#[async_trait]
impl Operator for Recorder {
    fn id(&self) -> String {
        "sink".to_owned()
    }

    fn operator_type(&self) -> &str {
        "recorder"
    }

    fn can_process(&self) -> bool {
        true
    }

    fn can_output(&self) -> bool {
        false
    }

    async fn start(&self) -> Result<()> {
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        Ok(())
    }

    fn outputs(&self) -> Vec<Arc<dyn Operator>> {
        Vec::new()
    }

    fn set_outputs(&self, _candidates: &[Arc<dyn Operator>]) -> Result<()> {
        Err(OperatorError::OutputUnsupported(self.id()))
    }

    async fn process(&self, entry: Entry) -> Result<()> {
        self.received.lock().push(entry);
        Ok(())
    }
}

fn event(partition: &str, offset: &str, body: &str) -> StreamEvent {
    StreamEvent {
        body: body.as_bytes().to_vec(),
        offset: offset.to_owned(),
        sequence: 1,
        enqueued_ms: 1_600_000_000_000,
        partition: partition.to_owned(),
        properties: BTreeMap::new(),
    }
}

fn context_with(stream: Arc<FakeStream>) -> BuildContext {
    let mut boundary = BoundaryClients::new();
    boundary.insert(EVENT_STREAM_CLIENT, stream as Arc<dyn EventStream>);
    BuildContext::in_memory().with_boundary(boundary)
}

fn base_config() -> EventStreamConfig {
    let mut config = EventStreamConfig::new("stream1", "ns", "hub", "cg");
    config.connection = "endpoint://bus".to_owned();
    config.input.writer.output = OutputIds(vec!["sink".to_owned()]);
    config
}

fn build_on(
    context: &BuildContext,
    config: EventStreamConfig,
) -> (Arc<dyn Operator>, Arc<Recorder>) {
    let ops = config.build(context).unwrap();
    let sink = Recorder::new();
    ops[0]
        .set_outputs(&[sink.clone() as Arc<dyn Operator>])
        .unwrap();
    (ops[0].clone(), sink)
}

async fn wait_for<F: Fn() -> bool>(condition: F) {
    for _ in 0..300 {
        if condition() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

// ============================================================================
// Build validation
// ============================================================================

#[test]
fn build_requires_all_coordinates() {
    let context = context_with(FakeStream::new(&["0"]));
    for missing in ["namespace", "name", "group", "connection"] {
        let mut config = base_config();
        match missing {
            "namespace" => config.namespace = String::new(),
            "name" => config.name = String::new(),
            "group" => config.group = String::new(),
            _ => config.connection = String::new(),
        }
        let err = config.build(&context).unwrap_err();
        assert!(err.to_string().contains(missing), "{missing}: {err}");
    }
}

#[test]
fn build_rejects_zero_prefetch() {
    let context = context_with(FakeStream::new(&["0"]));
    let mut config = base_config();
    config.prefetch_count = 0;
    assert!(config.build(&context).is_err());
}

#[test]
fn build_fails_without_boundary_client() {
    assert!(base_config().build(&BuildContext::in_memory()).is_err());
}

// ============================================================================
// Consumption
// ============================================================================

#[tokio::test]
async fn consumes_every_partition() {
    let stream = FakeStream::new(&["0", "1"]);
    stream.add_event("0", event("0", "o-1", "from p0"));
    stream.add_event("1", event("1", "o-2", "from p1"));

    let context = context_with(stream.clone());
    let (source, sink) = build_on(&context, base_config());

    source.start().await.unwrap();
    wait_for(|| sink.received.lock().len() == 2).await;
    source.stop().await.unwrap();

    assert!(*stream.closed.lock());
    let received = sink.received.lock();
    for entry in received.iter() {
        assert_eq!(entry.resource.get("namespace").unwrap(), "ns");
        assert_eq!(entry.resource.get("name").unwrap(), "hub");
        assert_eq!(entry.resource.get("group").unwrap(), "cg");
    }
}

#[tokio::test]
async fn start_at_end_without_offset_subscribes_latest() {
    let stream = FakeStream::new(&["0"]);
    let context = context_with(stream.clone());
    let (source, _sink) = build_on(&context, base_config());

    source.start().await.unwrap();
    wait_for(|| !stream.subscriptions.lock().is_empty()).await;
    source.stop().await.unwrap();

    assert_eq!(
        stream.subscriptions.lock()[0],
        ("0".to_owned(), StreamPosition::Latest)
    );
}

#[tokio::test]
async fn start_at_beginning_subscribes_earliest() {
    let stream = FakeStream::new(&["0"]);
    let context = context_with(stream.clone());
    let mut config = base_config();
    config.start_at = StartAt::Beginning;
    let (source, _sink) = build_on(&context, config);

    source.start().await.unwrap();
    wait_for(|| !stream.subscriptions.lock().is_empty()).await;
    source.stop().await.unwrap();

    assert_eq!(
        stream.subscriptions.lock()[0],
        ("0".to_owned(), StreamPosition::Earliest)
    );
}

#[tokio::test]
async fn restart_resumes_from_stored_offset() {
    let database_context = BuildContext::in_memory();

    // First run consumes one event, checkpointing its offset.
    {
        let stream = FakeStream::new(&["0"]);
        stream.add_event("0", event("0", "offset-41", "payload"));
        let mut boundary = BoundaryClients::new();
        boundary.insert(EVENT_STREAM_CLIENT, stream.clone() as Arc<dyn EventStream>);
        let context = database_context.clone().with_boundary(boundary);

        let (source, sink) = build_on(&context, base_config());
        source.start().await.unwrap();
        wait_for(|| !sink.received.lock().is_empty()).await;
        source.stop().await.unwrap();
    }

    // Second run subscribes from the stored offset.
    {
        let stream = FakeStream::new(&["0"]);
        let mut boundary = BoundaryClients::new();
        boundary.insert(EVENT_STREAM_CLIENT, stream.clone() as Arc<dyn EventStream>);
        let context = database_context.clone().with_boundary(boundary);

        let (source, _sink) = build_on(&context, base_config());
        source.start().await.unwrap();
        wait_for(|| !stream.subscriptions.lock().is_empty()).await;
        source.stop().await.unwrap();

        assert_eq!(
            stream.subscriptions.lock()[0],
            (
                "0".to_owned(),
                StreamPosition::Offset("offset-41".to_owned())
            )
        );
    }
}

#[tokio::test]
async fn entry_carries_stream_fields() {
    let stream = FakeStream::new(&["3"]);
    let mut e = event("3", "off-7", "hello bus");
    e.properties.insert("source".to_owned(), "sensor".to_owned());
    stream.add_event("3", e);

    let context = context_with(stream);
    let (source, sink) = build_on(&context, base_config());

    source.start().await.unwrap();
    wait_for(|| !sink.received.lock().is_empty()).await;
    source.stop().await.unwrap();

    let received = sink.received.lock();
    let record = received[0].record.as_map().unwrap();
    assert_eq!(record.get("message"), Some(&Value::from("hello bus")));
    assert_eq!(record.get("offset"), Some(&Value::from("off-7")));
    assert_eq!(record.get("partition"), Some(&Value::from("3")));
    let properties = record.get("properties").unwrap().as_map().unwrap();
    assert_eq!(properties.get("source"), Some(&Value::from("sensor")));
}

#[test]
fn deserializes_from_yaml() {
    let yaml = "type: event_stream_input\nnamespace: ns\nname: hub\ngroup: cg\n
  connection: 'endpoint://bus'\nstart_at: beginning\n";
    let config: EventStreamConfig = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(config.namespace, "ns");
    assert_eq!(config.start_at, StartAt::Beginning);
    assert_eq!(config.prefetch_count, 1000);
}
