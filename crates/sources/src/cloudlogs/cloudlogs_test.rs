//! Cloud-logs source tests

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use stave_operator::helper::OutputIds;
use stave_operator::BoundaryClients;

use super::*;

/// Scripted API: each sweep pops the next list of pages
struct FakeLogsApi {
    sweeps: Mutex<VecDeque<Vec<LogPage>>>,
    requests: Mutex<Vec<FetchLogs>>,
}

impl FakeLogsApi {
    fn new(sweeps: Vec<Vec<LogPage>>) -> Arc<Self> {
        Arc::new(Self {
            sweeps: Mutex::new(sweeps.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl LogsApi for FakeLogsApi {
    async fn fetch(&self, request: FetchLogs) -> std::result::Result<LogPage, BoundaryError> {
        self.requests.lock().push(request.clone());
        let mut sweeps = self.sweeps.lock();
        let page = match sweeps.front_mut() {
            Some(pages) if !pages.is_empty() => pages.remove(0),
            _ => LogPage::default(),
        };
        if sweeps
            .front()
            .map(|pages| pages.is_empty())
            .unwrap_or(false)
        {
            sweeps.pop_front();
        }
        Ok(page)
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

fn event(message: &str, timestamp_ms: i64, ingestion_ms: i64) -> LogEvent {
    LogEvent {
        message: message.to_owned(),
        timestamp_ms,
        ingestion_time_ms: ingestion_ms,
        stream: "stream-1".to_owned(),
        event_id: format!("id-{ingestion_ms}"),
    }
}

fn context_with(api: Arc<FakeLogsApi>) -> BuildContext {
    let mut boundary = BoundaryClients::new();
    boundary.insert(LOGS_API_CLIENT, api as Arc<dyn LogsApi>);
    BuildContext::in_memory().with_boundary(boundary)
}

fn base_config() -> CloudLogsConfig {
    let mut config = CloudLogsConfig::new("cloud1", "my-group", "us-east-1");
    config.input.writer.output = OutputIds(vec!["sink".to_owned()]);
    config.poll_interval = Duration::from_secs(3600);
    config
}

fn build_on(context: &BuildContext, config: CloudLogsConfig) -> (Arc<dyn Operator>, Arc<Recorder>) {
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
fn build_requires_group_and_region() {
    let api = FakeLogsApi::new(vec![]);
    let context = context_with(api);

    let mut config = base_config();
    config.log_group = String::new();
    assert!(config.build(&context).is_err());

    let mut config = base_config();
    config.region = String::new();
    assert!(config.build(&context).is_err());
}

#[test]
fn build_rejects_conflicting_filters() {
    let context = context_with(FakeLogsApi::new(vec![]));
    let mut config = base_config();
    config.stream_names = vec!["a".to_owned()];
    config.stream_prefix = Some("pre".to_owned());
    assert!(config.build(&context).is_err());
}

#[test]
fn build_validates_event_limit_range() {
    let context = context_with(FakeLogsApi::new(vec![]));
    for bad in [0, -5, 10_001] {
        let mut config = base_config();
        config.event_limit = bad;
        assert!(config.build(&context).is_err(), "limit {bad} accepted");
    }
    let mut config = base_config();
    config.event_limit = 10_000;
    assert!(config.build(&context).is_ok());
}

#[test]
fn build_enforces_minimum_poll_interval() {
    let context = context_with(FakeLogsApi::new(vec![]));
    let mut config = base_config();
    config.poll_interval = Duration::from_millis(500);
    assert!(config.build(&context).is_err());
}

#[test]
fn build_fails_without_boundary_client() {
    assert!(base_config().build(&BuildContext::in_memory()).is_err());
}

// ============================================================================
// Poll loop
// ============================================================================

#[tokio::test]
async fn emits_events_with_resource_keys() {
    let api = FakeLogsApi::new(vec![vec![LogPage {
        events: vec![event("hello", 1_000, 2_000)],
        next_token: None,
    }]]);
    let context = context_with(api);
    let mut config = base_config();
    config.start_at = StartAt::Beginning;
    let (source, sink) = build_on(&context, config);

    source.start().await.unwrap();
    wait_for(|| !sink.received.lock().is_empty()).await;
    source.stop().await.unwrap();

    let received = sink.received.lock();
    let record = received[0].record.as_map().unwrap();
    assert_eq!(record.get("message"), Some(&Value::from("hello")));
    assert_eq!(record.get("ingestion_time"), Some(&Value::Int(2_000)));
    assert_eq!(received[0].resource.get("log_group").unwrap(), "my-group");
    assert_eq!(received[0].resource.get("region").unwrap(), "us-east-1");
    assert_eq!(received[0].resource.get("log_stream").unwrap(), "stream-1");
    assert_eq!(received[0].timestamp.timestamp_millis(), 1_000);
}

#[tokio::test]
async fn paginates_until_token_exhausted() {
    let api = FakeLogsApi::new(vec![vec![
        LogPage {
            events: vec![event("page1", 1, 10)],
            next_token: Some("t1".to_owned()),
        },
        LogPage {
            events: vec![event("page2", 2, 20)],
            next_token: None,
        },
    ]]);
    let context = context_with(api.clone());
    let mut config = base_config();
    config.start_at = StartAt::Beginning;
    let (source, sink) = build_on(&context, config);

    source.start().await.unwrap();
    wait_for(|| sink.received.lock().len() == 2).await;
    source.stop().await.unwrap();

    let requests = api.requests.lock();
    assert_eq!(requests[0].next_token, None);
    assert_eq!(requests[1].next_token, Some("t1".to_owned()));
}

#[tokio::test]
async fn start_at_end_with_empty_store_uses_now() {
    let api = FakeLogsApi::new(vec![vec![LogPage::default()]]);
    let context = context_with(api.clone());
    let (source, _sink) = build_on(&context, base_config());

    let before = chrono::Utc::now().timestamp_millis();
    source.start().await.unwrap();
    wait_for(|| !api.requests.lock().is_empty()).await;
    source.stop().await.unwrap();
    let after = chrono::Utc::now().timestamp_millis();

    let start_time = api.requests.lock()[0].start_time_ms;
    assert!(start_time >= before && start_time <= after);
}

#[tokio::test]
async fn restart_resumes_from_ingestion_watermark() {
    let context_db = BuildContext::in_memory();

    // First run ingests an event with ingestion time 5000.
    {
        let api = FakeLogsApi::new(vec![vec![LogPage {
            events: vec![event("first", 4_000, 5_000)],
            next_token: None,
        }]]);
        let mut boundary = BoundaryClients::new();
        boundary.insert(LOGS_API_CLIENT, api.clone() as Arc<dyn LogsApi>);
        let context = context_db.clone().with_boundary(boundary);

        let (source, sink) = build_on(&context, base_config());
        source.start().await.unwrap();
        wait_for(|| !sink.received.lock().is_empty()).await;
        source.stop().await.unwrap();
    }

    // Second run must start from the persisted watermark, not from now.
    {
        let api = FakeLogsApi::new(vec![vec![LogPage::default()]]);
        let mut boundary = BoundaryClients::new();
        boundary.insert(LOGS_API_CLIENT, api.clone() as Arc<dyn LogsApi>);
        let context = context_db.clone().with_boundary(boundary);

        let (source, _sink) = build_on(&context, base_config());
        source.start().await.unwrap();
        wait_for(|| !api.requests.lock().is_empty()).await;
        source.stop().await.unwrap();

        assert_eq!(api.requests.lock()[0].start_time_ms, 5_000);
    }
}

#[tokio::test]
async fn watermark_only_advances() {
    // Ingestion times arrive out of order; the watermark keeps the max.
    let api = FakeLogsApi::new(vec![vec![LogPage {
        events: vec![
            event("a", 1, 100),
            event("b", 2, 50),
            event("c", 3, 200),
        ],
        next_token: None,
    }]]);
    let context = context_with(api.clone());
    let mut config = base_config();
    config.start_at = StartAt::Beginning;
    let (source, sink) = build_on(&context, config.clone());

    source.start().await.unwrap();
    wait_for(|| sink.received.lock().len() == 3).await;
    source.stop().await.unwrap();

    // Restart: the stored watermark is 200.
    let api2 = FakeLogsApi::new(vec![vec![LogPage::default()]]);
    let mut boundary = BoundaryClients::new();
    boundary.insert(LOGS_API_CLIENT, api2.clone() as Arc<dyn LogsApi>);
    let context2 = BuildContext {
        database: context.database.clone(),
        boundary,
    };
    let (source, _sink) = build_on(&context2, config);
    source.start().await.unwrap();
    wait_for(|| !api2.requests.lock().is_empty()).await;
    source.stop().await.unwrap();

    assert_eq!(api2.requests.lock()[0].start_time_ms, 200);
}

#[test]
fn deserializes_from_yaml() {
    let yaml = "type: cloud_logs_input\nlog_group: g\nregion: r\n
  event_limit: 500\npoll_interval: 2m\nstart_at: beginning\n";
    let config: CloudLogsConfig = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(config.log_group, "g");
    assert_eq!(config.event_limit, 500);
    assert_eq!(config.poll_interval, Duration::from_secs(120));
    assert_eq!(config.start_at, StartAt::Beginning);
}
