//! Build context
//!
//! Everything a builder needs that is not part of its own configuration:
//! the offset database and the injected boundary clients.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use stave_persist::{Database, ScopedPersister, StubDatabase};

/// Context passed to every [`crate::OperatorBuilder::build`] call
#[derive(Clone)]
pub struct BuildContext {
    /// The shared offset database
    pub database: Arc<dyn Database>,

    /// Wire clients injected by the host process
    pub boundary: BoundaryClients,
}

impl BuildContext {
    /// Create a context over the given database
    pub fn new(database: Arc<dyn Database>) -> Self {
        Self {
            database,
            boundary: BoundaryClients::default(),
        }
    }

    /// A context with no persistence and no clients, for tests and
    /// programmatic pipelines
    pub fn in_memory() -> Self {
        Self::new(Arc::new(StubDatabase::new()))
    }

    /// Attach boundary clients
    pub fn with_boundary(mut self, boundary: BoundaryClients) -> Self {
        self.boundary = boundary;
        self
    }

    /// Create a persister scoped to the given namespaced operator id
    pub fn scoped_persister(&self, operator_id: &str) -> ScopedPersister {
        ScopedPersister::new(self.database.clone(), operator_id)
    }
}

/// Typed registry of wire clients supplied by the host process
///
/// Concrete clouds, buses, and bulk endpoints live outside the pipeline
/// core; operators that talk to one declare a trait and look the client
/// up here by name, failing their build with a configuration error when
/// it is absent.
#[derive(Clone, Default)]
pub struct BoundaryClients {
    clients: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl BoundaryClients {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client under a well-known name
    ///
    /// Store trait objects as `Arc<dyn Trait>` so `get` can retrieve
    /// them by that exact type.
    pub fn insert<T: Send + Sync + 'static>(&mut self, name: impl Into<String>, client: T) {
        self.clients.insert(name.into(), Arc::new(client));
    }

    /// Look up a client by name and type
    pub fn get<T: 'static>(&self, name: &str) -> Option<&T> {
        self.clients.get(name).and_then(|c| c.downcast_ref::<T>())
    }

    /// Whether a client is registered under the name
    pub fn contains(&self, name: &str) -> bool {
        self.clients.contains_key(name)
    }
}
