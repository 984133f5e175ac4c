//! Stave - Agent
//!
//! The top-level facade: open the offset database, load plugin
//! templates, resolve the configured pipeline, and run it as a unit.
//!
//! # Example
//!
//! ```ignore
//! let config = Config::from_file(Path::new("stave.yaml"))?;
//! let agent = AgentBuilder::new(config)
//!     .with_database_path("offsets.db")
//!     .with_plugin_dir("plugins/")
//!     .build()?;
//!
//! agent.start().await?;
//! // ... until shutdown ...
//! agent.stop().await;
//! ```

mod registry;

use std::path::PathBuf;
use std::sync::Arc;

use stave_config::{resolve_pipeline, Config, PluginRegistry};
use stave_operator::{BoundaryClients, BuildContext};
use stave_persist::{open_database, Database};
use stave_pipeline::Pipeline;
use thiserror::Error;

pub use registry::default_registry;

#[cfg(test)]
#[path = "agent_test.rs"]
mod tests;

/// Errors from agent construction and lifecycle
#[derive(Debug, Error)]
pub enum AgentError {
    /// The configuration could not be resolved
    #[error(transparent)]
    Config(#[from] stave_config::ConfigError),

    /// The offset database could not be opened
    #[error(transparent)]
    Persist(#[from] stave_persist::PersistError),

    /// The pipeline failed to start
    #[error(transparent)]
    Pipeline(#[from] stave_pipeline::PipelineError),
}

/// Builder for [`Agent`]
pub struct AgentBuilder {
    config: Config,
    plugin_dir: Option<PathBuf>,
    database_path: Option<PathBuf>,
    boundary: BoundaryClients,
}

impl AgentBuilder {
    /// Start building an agent from a parsed configuration
    pub fn new(config: Config) -> Self {
        Self {
            config,
            plugin_dir: None,
            database_path: None,
            boundary: BoundaryClients::new(),
        }
    }

    /// Directory of plugin template files
    #[must_use]
    pub fn with_plugin_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.plugin_dir = Some(dir.into());
        self
    }

    /// Path of the offset database; omit for an in-memory stub
    #[must_use]
    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Wire clients for boundary-backed operators
    #[must_use]
    pub fn with_boundary(mut self, boundary: BoundaryClients) -> Self {
        self.boundary = boundary;
        self
    }

    /// Resolve the configuration into a ready-to-start agent
    ///
    /// Any configuration, wiring, or graph error is fatal here; the
    /// agent never starts on a partially valid pipeline.
    pub fn build(self) -> Result<Agent, AgentError> {
        let database = open_database(self.database_path.as_deref())?;

        let registry = default_registry();
        let mut plugins = PluginRegistry::new();
        if let Some(dir) = &self.plugin_dir {
            plugins.load_all(dir, &registry)?;
        }

        let context = BuildContext::new(database.clone()).with_boundary(self.boundary);
        let operators = resolve_pipeline(&self.config.pipeline, &registry, &plugins, &context)?;

        Ok(Agent {
            pipeline: Pipeline::new(operators),
            database,
        })
    }
}

/// A resolved log agent owning its pipeline and offset database
pub struct Agent {
    pipeline: Pipeline,
    database: Arc<dyn Database>,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent").finish_non_exhaustive()
    }
}

impl Agent {
    /// Start the pipeline; idempotent
    pub async fn start(&self) -> Result<(), AgentError> {
        self.pipeline.start().await?;
        tracing::info!("agent started");
        Ok(())
    }

    /// Stop the pipeline and close the database; idempotent
    pub async fn stop(&self) {
        self.pipeline.stop().await;
        if let Err(e) = self.database.close() {
            tracing::warn!(error = %e, "failed to close offset database");
        }
        tracing::info!("agent stopped");
    }

    /// The underlying pipeline
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }
}
