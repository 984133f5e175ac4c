//! Stave - Operator
//!
//! The uniform operator contract and the shared behavior every operator
//! is composed from.
//!
//! # Architecture
//!
//! ```text
//! [Source]──write──>[Transformer]──write──>[Parser]──write──>[Sink]
//!    │                   │                    │                 │
//!  InputOperator    TransformerOperator  ParserOperator    OutputOperator
//!  WriterOperator   WriterOperator       WriterOperator    (+ Buffer)
//!  BasicOperator    BasicOperator        BasicOperator     BasicOperator
//! ```
//!
//! # Key Design
//!
//! - **One contract**: every node implements [`Operator`]; capability
//!   flags (`can_process`, `can_output`) distinguish sources, pipeline
//!   stages, and sinks.
//! - **Composition over inheritance**: shared concerns are small structs
//!   ([`helper::WriterOperator`], [`helper::TransformerOperator`], ...)
//!   embedded by concrete operators, which delegate trait methods to
//!   them.
//! - **Copy on fan-out**: a writer with N downstreams clones the entry
//!   for the first N-1 and moves it into the last, so a single-downstream
//!   pipeline never copies and fan-out never shares mutable state.
//! - **Config-driven**: an [`OperatorRegistry`] maps type names to
//!   deserializable [`OperatorBuilder`] configs; builders validate and
//!   produce wired-ready operators against a [`BuildContext`].

mod buffer;
mod bytesize;
mod context;
mod duration;
mod error;
pub mod helper;
mod registry;

use std::sync::Arc;

use async_trait::async_trait;
use stave_entry::Entry;

pub use buffer::{Buffer, BufferConfig, BufferHandler, BufferType, OnFull};
pub use bytesize::ByteSize;
pub use context::{BoundaryClients, BuildContext};
pub use duration::Duration;
pub use error::{BoundaryError, OperatorError, Result};
pub use registry::{OperatorBuilder, OperatorRegistry};

/// A node in the pipeline graph
///
/// Operators are shared behind `Arc` once built; interior mutability
/// (wired outputs, background task handles) lives inside the
/// implementations. `start` is called exactly once by the pipeline, in
/// reverse topological order; `stop` must drain and release resources.
#[async_trait]
pub trait Operator: Send + Sync {
    /// The operator's unique (namespaced) id
    fn id(&self) -> String;

    /// The operator's registered type name
    fn operator_type(&self) -> &str;

    /// Whether this operator accepts entries via `process`
    fn can_process(&self) -> bool;

    /// Whether this operator can be wired to downstream operators
    fn can_output(&self) -> bool;

    /// Begin operation; sources launch their background tasks here
    async fn start(&self) -> Result<()>;

    /// Drain, cancel background work, and release resources
    async fn stop(&self) -> Result<()>;

    /// The wired downstream operators
    fn outputs(&self) -> Vec<Arc<dyn Operator>>;

    /// Resolve this operator's output ids against the built set
    ///
    /// Fails if an id is unknown, a target cannot process, or this
    /// operator cannot output.
    fn set_outputs(&self, candidates: &[Arc<dyn Operator>]) -> Result<()>;

    /// Accept an entry from an upstream operator
    ///
    /// May block on downstream `process` calls. Once it returns, the
    /// entry has been forwarded, buffered, or dropped and the caller may
    /// reuse or discard its copy.
    async fn process(&self, entry: Entry) -> Result<()>;
}

impl std::fmt::Debug for dyn Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operator")
            .field("id", &self.id())
            .field("operator_type", &self.operator_type())
            .finish()
    }
}
