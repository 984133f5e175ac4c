//! Stave - Persist
//!
//! The durable offset store behind source resume points.
//!
//! # Architecture
//!
//! ```text
//! [Source operator] ──> ScopedPersister ──> Database (sled | stub)
//!                        in-memory cache      single file on disk
//!                        dirty-key sync
//! ```
//!
//! # Key Design
//!
//! - **One database, many scopes**: every operator gets a
//!   [`ScopedPersister`] whose keys are transparently prefixed with the
//!   operator's namespaced id, so operators cannot collide.
//! - **Reads never hit disk**: `load()` pulls the scope into memory once;
//!   `get`/`set` work on the cache and `sync()` writes dirty keys in a
//!   single batch.
//! - **No path, no persistence**: [`open_database`] returns an in-memory
//!   stub when no path is configured, and sources behave as if the store
//!   were empty on every start.

mod database;
mod error;
mod scoped;

pub use database::{open_database, Database, SledDatabase, StubDatabase};
pub use error::{PersistError, Result};
pub use scoped::ScopedPersister;
