//! Stave - Sinks
//!
//! Terminal operators that deliver entries out of the pipeline.
//!
//! # Modules
//!
//! - `stdout` - one JSON line per entry to a locked writer
//! - `null` - accepts and discards (registered as `drop_output`)
//! - `bulk` - buffered batch delivery through an injected [`bulk::BulkApi`]
//!   client, with retry, backpressure, and shutdown flush

pub mod bulk;
pub mod null;
pub mod stdout;

pub use bulk::{BulkApi, BulkOutput, BulkOutputConfig, BULK_API_CLIENT};
pub use null::{DropOutput, DropOutputConfig};
pub use stdout::{StdoutConfig, StdoutSink};
