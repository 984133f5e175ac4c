//! Noop transformer tests

use std::sync::Arc;

use stave_entry::{Entry, Value};
use stave_operator::helper::OutputIds;
use stave_operator::{BuildContext, Operator, OperatorBuilder};

use super::*;
use crate::testutil::Recorder;

#[tokio::test]
async fn forwards_entries_unchanged() {
    let mut config = NoopConfig::new("noop1");
    config.transformer.writer.output = OutputIds(vec!["sink".to_owned()]);

    let ops = config.build(&BuildContext::in_memory()).unwrap();
    let noop = &ops[0];

    let sink = Recorder::new();
    noop.set_outputs(&[sink.clone() as Arc<dyn Operator>])
        .unwrap();

    let entry = Entry::basic("untouched");
    noop.process(entry.clone()).await.unwrap();

    let received = sink.received.lock();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].record, entry.record);
}

#[test]
fn deserializes_from_yaml() {
    let config: NoopConfig =
        serde_yaml::from_str("type: noop\nid: my_noop\noutput: sink1\n").unwrap();
    assert_eq!(config.id(), "my_noop");
    assert_eq!(config.operator_type(), "noop");
    assert_eq!(
        config.transformer.writer.output,
        OutputIds(vec!["sink1".to_owned()])
    );
}

#[test]
fn capabilities() {
    let config = NoopConfig::new("noop1");
    let ops = config.build(&BuildContext::in_memory()).unwrap();
    assert!(ops[0].can_process());
    assert!(ops[0].can_output());
}

#[tokio::test]
async fn fan_out_copy_isolates_downstreams() {
    // The scenario from the writer contract, exercised through a real
    // operator: two downstreams, the first mutates, the last must not
    // observe the mutation.
    let mut config = NoopConfig::new("noop1");
    config.transformer.writer.output = OutputIds(vec!["a".to_owned(), "b".to_owned()]);
    let ops = config.build(&BuildContext::in_memory()).unwrap();

    let a = Recorder::new();
    let b = Recorder::new();
    // Recorders report a fixed id; wire by constructing operators whose
    // ids match the configured outputs.
    struct Named(Arc<Recorder>, &'static str);
    use async_trait::async_trait;
    use stave_operator::{OperatorError, Result};
    #[async_trait]
    impl Operator for Named {
        fn id(&self) -> String {
            self.1.to_owned()
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
        fn set_outputs(&self, _c: &[Arc<dyn Operator>]) -> Result<()> {
            Err(OperatorError::OutputUnsupported(self.id()))
        }
        async fn process(&self, entry: Entry) -> Result<()> {
            self.0.received.lock().push(entry);
            Ok(())
        }
    }

    let named_a: Arc<dyn Operator> = Arc::new(Named(a.clone(), "a"));
    let named_b: Arc<dyn Operator> = Arc::new(Named(b.clone(), "b"));
    ops[0].set_outputs(&[named_a, named_b]).unwrap();

    let entry = Entry::from_record(
        [("k".to_owned(), Value::from("v"))]
            .into_iter()
            .collect::<Value>(),
    );
    ops[0].process(entry).await.unwrap();

    {
        let mut received = a.received.lock();
        received[0]
            .record
            .as_map_mut()
            .unwrap()
            .insert("k".to_owned(), Value::from("w"));
    }
    assert_eq!(
        b.received.lock()[0].record.as_map().unwrap().get("k"),
        Some(&Value::from("v"))
    );
}
