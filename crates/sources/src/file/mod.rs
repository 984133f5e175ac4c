//! File tail source
//!
//! Tails a single file, splitting appended bytes into log entries with
//! one of the line splitters. The consumed byte offset is persisted so
//! a restart resumes where the last run left off; truncation resets to
//! the start of the file.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use stave_entry::{Entry, Value};
use stave_operator::helper::{BasicConfig, InputConfig, InputOperator, WriterConfig};
use stave_operator::{
    BuildContext, ByteSize, Duration, Operator, OperatorBuilder, OperatorError, Result,
};
use stave_persist::ScopedPersister;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::splitter::{
    line_end_split_func, line_start_split_func, newline_split_func, Encoding, LineScanner,
    SplitFunc,
};
use crate::StartAt;

#[cfg(test)]
#[path = "file_test.rs"]
mod tests;

fn default_poll_interval() -> Duration {
    Duration::from_millis(200)
}

fn default_max_log_size() -> ByteSize {
    ByteSize(1024 * 1024)
}

/// Configuration for the file tail source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInputConfig {
    #[serde(flatten)]
    pub input: InputConfig,

    /// File to tail
    #[serde(default)]
    pub path: String,

    /// How often to check for appended data
    #[serde(default = "default_poll_interval")]
    pub poll_interval: Duration,

    /// Multiline: a token begins at each match of this pattern
    #[serde(default)]
    pub line_start_pattern: String,

    /// Multiline: a token ends at each match of this pattern
    #[serde(default)]
    pub line_end_pattern: String,

    /// Text encoding of the file (utf8, utf16le, utf16be)
    #[serde(default)]
    pub encoding: String,

    /// Where to start when no offset is stored
    #[serde(default)]
    pub start_at: StartAt,

    /// Cap on a single log entry
    #[serde(default = "default_max_log_size")]
    pub max_log_size: ByteSize,
}

impl FileInputConfig {
    /// Create a config with the given id and path
    pub fn new(id: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            input: InputConfig::new(id, "file_input"),
            path: path.into(),
            poll_interval: default_poll_interval(),
            line_start_pattern: String::new(),
            line_end_pattern: String::new(),
            encoding: String::new(),
            start_at: StartAt::default(),
            max_log_size: default_max_log_size(),
        }
    }

    fn make_split_func(&self, encoding: Encoding) -> Result<SplitFunc> {
        match (
            self.line_start_pattern.is_empty(),
            self.line_end_pattern.is_empty(),
        ) {
            (true, true) => Ok(newline_split_func(encoding)),
            (false, true) => line_start_split_func(&self.line_start_pattern),
            (true, false) => line_end_split_func(&self.line_end_pattern),
            (false, false) => Err(OperatorError::config(
                "'line_start_pattern' and 'line_end_pattern' cannot both be set",
            )),
        }
    }
}

impl Default for FileInputConfig {
    fn default() -> Self {
        Self::new("", "")
    }
}

impl OperatorBuilder for FileInputConfig {
    fn basic(&self) -> &BasicConfig {
        &self.input.writer.basic
    }

    fn basic_mut(&mut self) -> &mut BasicConfig {
        &mut self.input.writer.basic
    }

    fn writer(&self) -> Option<&WriterConfig> {
        Some(&self.input.writer)
    }

    fn writer_mut(&mut self) -> Option<&mut WriterConfig> {
        Some(&mut self.input.writer)
    }

    fn can_process(&self) -> bool {
        false
    }

    fn build(&self, context: &BuildContext) -> Result<Vec<Arc<dyn Operator>>> {
        if self.path.is_empty() {
            return Err(OperatorError::config("missing required field 'path'"));
        }
        if self.max_log_size.as_u64() == 0 {
            return Err(OperatorError::config("'max_log_size' must be greater than 0"));
        }
        let encoding = Encoding::from_name(&self.encoding)?;
        // Validate the patterns now so a bad regex fails the build, not
        // the background task.
        self.make_split_func(encoding)?;

        let input = self.input.build()?;
        let persister = context.scoped_persister(&input.writer.id());

        Ok(vec![Arc::new(FileInput {
            inner: Arc::new(FileInner {
                input,
                config: self.clone(),
                encoding,
                persister,
            }),
            cancel: Mutex::new(None),
            task: Mutex::new(None),
        })])
    }
}

struct FileInner {
    input: InputOperator,
    config: FileInputConfig,
    encoding: Encoding,
    persister: ScopedPersister,
}

/// Operator that tails a file
pub struct FileInput {
    inner: Arc<FileInner>,
    cancel: Mutex<Option<CancellationToken>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl FileInner {
    fn offset_key(&self) -> Vec<u8> {
        self.config.path.as_bytes().to_vec()
    }

    fn stored_offset(&self) -> Option<u64> {
        let bytes = self.persister.get(&self.offset_key())?;
        let arr: [u8; 8] = bytes.try_into().ok()?;
        Some(u64::from_be_bytes(arr))
    }

    fn store_offset(&self, offset: u64) {
        self.persister
            .set(&self.offset_key(), offset.to_be_bytes().to_vec());
    }
}

#[async_trait]
impl Operator for FileInput {
    fn id(&self) -> String {
        self.inner.input.writer.id()
    }

    fn operator_type(&self) -> &str {
        self.inner.input.writer.operator_type()
    }

    fn can_process(&self) -> bool {
        false
    }

    fn can_output(&self) -> bool {
        true
    }

    async fn start(&self) -> Result<()> {
        self.inner.persister.load()?;

        let initial_offset = match self.inner.stored_offset() {
            Some(offset) => offset,
            None => match self.inner.config.start_at {
                StartAt::End => tokio::fs::metadata(&self.inner.config.path)
                    .await
                    .map(|m| m.len())
                    .unwrap_or(0),
                StartAt::Beginning => 0,
            },
        };

        let token = CancellationToken::new();
        *self.cancel.lock() = Some(token.clone());

        let inner = Arc::clone(&self.inner);
        *self.task.lock() = Some(tokio::spawn(tail_file(inner, initial_offset, token)));

        tracing::info!(
            operator_id = %self.id(),
            path = %self.inner.config.path,
            offset = initial_offset,
            "file source started"
        );
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        if let Some(token) = self.cancel.lock().take() {
            token.cancel();
        }
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!(operator_id = %self.id(), error = %e, "tail task panicked");
            }
        }
        self.inner.persister.sync()?;
        tracing::info!(operator_id = %self.id(), "file source stopped");
        Ok(())
    }

    fn outputs(&self) -> Vec<Arc<dyn Operator>> {
        self.inner.input.writer.outputs()
    }

    fn set_outputs(&self, candidates: &[Arc<dyn Operator>]) -> Result<()> {
        self.inner.input.writer.set_outputs(candidates)
    }

    async fn process(&self, _entry: Entry) -> Result<()> {
        Err(OperatorError::ProcessingUnsupported(self.id()))
    }
}

/// Read bytes appended past `offset`; returns the data and file length
async fn read_appended(path: &PathBuf, offset: u64) -> std::io::Result<(Vec<u8>, u64)> {
    let mut file = tokio::fs::File::open(path).await?;
    let len = file.metadata().await?.len();
    if len <= offset {
        return Ok((Vec::new(), len));
    }
    file.seek(std::io::SeekFrom::Start(offset)).await?;
    let mut data = Vec::with_capacity((len - offset) as usize);
    file.take(len - offset).read_to_end(&mut data).await?;
    Ok((data, len))
}

async fn tail_file(inner: Arc<FileInner>, initial_offset: u64, cancel: CancellationToken) {
    let path = PathBuf::from(&inner.config.path);
    let max_token = inner.config.max_log_size.as_u64() as usize;

    // The build validated the split configuration already.
    let split = match inner.config.make_split_func(inner.encoding) {
        Ok(split) => split,
        Err(e) => {
            tracing::error!(error = %e, "failed to build splitter");
            return;
        }
    };
    let mut scanner = LineScanner::new(split, max_token);
    let mut offset = initial_offset;

    loop {
        if cancel.is_cancelled() {
            return;
        }

        match read_appended(&path, offset).await {
            Ok((data, len)) => {
                if len < offset {
                    tracing::warn!(
                        path = %inner.config.path,
                        size = len,
                        offset,
                        "file truncated, restarting from the beginning"
                    );
                    offset = 0;
                    scanner.reset();
                    continue;
                }

                if !data.is_empty() {
                    scanner.extend(&data);
                    offset += data.len() as u64;

                    while let Some(token) = scanner.next_token() {
                        if cancel.is_cancelled() {
                            return;
                        }
                        let message = inner.encoding.decode(&token);
                        let record: Value = [("message".to_owned(), Value::from(message))]
                            .into_iter()
                            .collect();
                        let entry = inner.input.new_entry(record);
                        inner.input.write(entry).await;
                    }

                    // Persist only what left the scanner; buffered
                    // partial lines are re-read after a restart.
                    let consumed = offset - scanner.pending() as u64;
                    inner.store_offset(consumed);
                    if let Err(e) = inner.persister.sync() {
                        tracing::warn!(error = %e, "failed to sync file offset");
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Wait for the file to appear.
            }
            Err(e) => {
                tracing::warn!(path = %inner.config.path, error = %e, "failed to read file");
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(inner.config.poll_interval.raw()) => {}
            _ = cancel.cancelled() => return,
        }
    }
}
