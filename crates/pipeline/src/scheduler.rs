//! Pipeline lifecycle scheduler

use std::sync::Arc;

use parking_lot::Mutex;
use stave_operator::Operator;

use crate::error::{PipelineError, Result};

#[cfg(test)]
#[path = "scheduler_test.rs"]
mod tests;

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    Created,
    Running,
    Stopped,
}

/// A wired pipeline owning its operators in topological order
///
/// The order has sources first; `start` walks it backwards so every
/// downstream is accepting entries before its upstream runs, and `stop`
/// walks it forwards so sources quiesce before their consumers.
pub struct Pipeline {
    operators: Vec<Arc<dyn Operator>>,
    state: Mutex<State>,
}

impl Pipeline {
    /// Create a pipeline over operators already wired and sorted
    /// topologically (sources first)
    pub fn new(operators: Vec<Arc<dyn Operator>>) -> Self {
        Self {
            operators,
            state: Mutex::new(State::Created),
        }
    }

    /// The operators in topological order
    pub fn operators(&self) -> &[Arc<dyn Operator>] {
        &self.operators
    }

    /// Whether the pipeline is currently running
    pub fn is_running(&self) -> bool {
        *self.state.lock() == State::Running
    }

    /// Start every operator, sinks first
    ///
    /// On the first failure, operators that already started are stopped
    /// again in forward order and the error is returned. Calling
    /// `start` on a running or stopped pipeline is a no-op.
    pub async fn start(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            if *state != State::Created {
                return Ok(());
            }
            *state = State::Running;
        }

        tracing::info!(operators = self.operators.len(), "starting pipeline");

        for (position, operator) in self.operators.iter().enumerate().rev() {
            if let Err(e) = operator.start().await {
                tracing::error!(
                    operator_id = %operator.id(),
                    error = %e,
                    "operator failed to start, rolling back"
                );
                // Everything after `position` already started; stop it
                // in forward order.
                for started in &self.operators[position + 1..] {
                    if let Err(stop_err) = started.stop().await {
                        tracing::warn!(
                            operator_id = %started.id(),
                            error = %stop_err,
                            "operator failed to stop during rollback"
                        );
                    }
                }
                *self.state.lock() = State::Stopped;
                return Err(PipelineError::StartFailed {
                    id: operator.id(),
                    source: e,
                });
            }
            tracing::debug!(operator_id = %operator.id(), "operator started");
        }

        tracing::info!("pipeline started");
        Ok(())
    }

    /// Stop every operator, sources first
    ///
    /// Stop errors are logged; shutdown always reaches the end. Calling
    /// `stop` again is a no-op.
    pub async fn stop(&self) {
        {
            let mut state = self.state.lock();
            if *state != State::Running {
                return;
            }
            *state = State::Stopped;
        }

        tracing::info!("stopping pipeline");
        for operator in &self.operators {
            if let Err(e) = operator.stop().await {
                tracing::warn!(
                    operator_id = %operator.id(),
                    error = %e,
                    "operator failed to stop"
                );
            } else {
                tracing::debug!(operator_id = %operator.id(), "operator stopped");
            }
        }
        tracing::info!("pipeline stopped");
    }
}
