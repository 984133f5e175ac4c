//! Stave - Sources
//!
//! Operators that bring entries into the pipeline from the outside
//! world.
//!
//! # Source contract
//!
//! Every source is output-only. `start` loads its persisted resume
//! point, acquires external resources, launches a cancellable
//! background task, and returns; `stop` cancels the task, waits for it,
//! releases resources, and syncs the persister. Emission goes through
//! the input mixin, which stamps configured labels and resource keys.
//!
//! # Modules
//!
//! - `splitter` - pure byte segmentation functions and the scanner that
//!   drives them
//! - `file` - tail a file, splitting it into log entries
//! - `cloudlogs` - poll a cloud log API on an interval, resuming from a
//!   persisted ingestion-time watermark
//! - `stream` - consume a partitioned event bus with per-partition
//!   offsets

pub mod cloudlogs;
pub mod file;
pub mod splitter;
pub mod stream;

use serde::{Deserialize, Serialize};

pub use cloudlogs::{
    CloudLogsConfig, CloudLogsInput, FetchLogs, LogEvent, LogPage, LogsApi, LOGS_API_CLIENT,
};
pub use file::{FileInput, FileInputConfig};
pub use splitter::{
    line_end_split_func, line_start_split_func, newline_split_func, Encoding, LineScanner,
    SplitFunc, SplitResult,
};
pub use stream::{
    EventStream, EventStreamConfig, EventStreamInput, StreamEvent, StreamPosition,
    EVENT_STREAM_CLIENT,
};

/// Where a source begins when it has no persisted resume point
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartAt {
    /// Read everything the origin still has
    Beginning,
    /// Only new data from now on
    #[default]
    End,
}
