//! Transformer mixin tests

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use stave_entry::{Entry, Field, Value};

use super::*;
use crate::error::{OperatorError, Result};
use crate::helper::writer::OutputIds;
use crate::Operator;

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

fn transformer(on_error: OnError) -> (TransformerOperator, Arc<Recorder>) {
    let mut config = TransformerConfig::new("t1", "test_transformer");
    config.writer.output = OutputIds(vec!["sink".to_owned()]);
    config.on_error = on_error;
    let built = config.build().unwrap();

    let sink = Recorder::new();
    built
        .writer
        .set_outputs(&[sink.clone() as Arc<dyn Operator>])
        .unwrap();
    (built, sink)
}

fn test_entry() -> Entry {
    Entry::from_record(
        [("k".to_owned(), Value::from("v"))]
            .into_iter()
            .collect::<Value>(),
    )
}

#[test]
fn on_error_deserializes() {
    assert_eq!(
        serde_yaml::from_str::<OnError>("send").unwrap(),
        OnError::Send
    );
    assert_eq!(
        serde_yaml::from_str::<OnError>("drop").unwrap(),
        OnError::Drop
    );
    assert!(serde_yaml::from_str::<OnError>("ignore").is_err());
}

#[tokio::test]
async fn successful_transform_forwards_modified_entry() {
    let (op, sink) = transformer(OnError::Send);
    op.process_with(test_entry(), |e| {
        Field::record(["k"]).set(e, Value::from("modified"));
        Ok(())
    })
    .await
    .unwrap();

    let received = sink.received.lock();
    assert_eq!(received.len(), 1);
    assert_eq!(
        Field::record(["k"]).get(&received[0]),
        Some(Value::from("modified"))
    );
}

#[tokio::test]
async fn send_policy_forwards_original_on_error() {
    let (op, sink) = transformer(OnError::Send);
    op.process_with(test_entry(), |e| {
        // Mutate before failing; the mutation must not leak downstream.
        Field::record(["k"]).set(e, Value::from("partial"));
        Err(OperatorError::transform("boom"))
    })
    .await
    .unwrap();

    let received = sink.received.lock();
    assert_eq!(received.len(), 1);
    assert_eq!(
        Field::record(["k"]).get(&received[0]),
        Some(Value::from("v"))
    );
}

#[tokio::test]
async fn drop_policy_discards_on_error() {
    let (op, sink) = transformer(OnError::Drop);
    op.process_with(test_entry(), |_| Err(OperatorError::transform("boom")))
        .await
        .unwrap();

    assert!(sink.received.lock().is_empty());
}

#[tokio::test]
async fn drop_policy_forwards_on_success() {
    let (op, sink) = transformer(OnError::Drop);
    op.process_with(test_entry(), |_| Ok(())).await.unwrap();
    assert_eq!(sink.received.lock().len(), 1);
}
