//! Error types for the reactive runtime.

use thiserror::Error;

use crate::graph::NodeId;

/// Boxed error returned by a failing unit of work.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T> = std::result::Result<T, ReactiveError>;

#[derive(Debug, Error)]
pub enum ReactiveError {
    /// A computation was asked to run while it was already running on this
    /// thread, or the tracking stack grew past the configured depth.
    #[error("cyclic dependency detected at {node} (tracking depth {depth})")]
    CyclicDependency { node: NodeId, depth: usize },

    #[error("computation {node} failed: {source}")]
    ComputationFailed {
        node: NodeId,
        #[source]
        source: BoxError,
    },

    #[error("{} computations failed during propagation", failures.len())]
    Propagation { failures: Vec<ReactiveError> },

    #[error("computation {node} has been disposed")]
    Disposed { node: NodeId },

    #[error("invalid runtime configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl ReactiveError {
    /// Returns true if this error, or any failure nested inside it, is a
    /// cyclic dependency.
    pub fn is_cyclic(&self) -> bool {
        match self {
            Self::CyclicDependency { .. } => true,
            Self::Propagation { failures } => failures.iter().any(Self::is_cyclic),
            Self::ComputationFailed { source, .. } => source
                .downcast_ref::<ReactiveError>()
                .is_some_and(Self::is_cyclic),
            _ => false,
        }
    }

    /// Number of individual failures represented by this error.
    pub fn failure_count(&self) -> usize {
        match self {
            Self::Propagation { failures } => failures.iter().map(Self::failure_count).sum(),
            _ => 1,
        }
    }

    /// Wrap an error returned by the work of computation `node`.
    ///
    /// Reactive errors bubbling out of nested writes keep their identity when
    /// they describe a cycle, so the outermost caller can still match on
    /// [`ReactiveError::CyclicDependency`].
    pub(crate) fn from_work(node: NodeId, source: BoxError) -> Self {
        match source.downcast::<ReactiveError>() {
            Ok(inner) if inner.is_cyclic() => *inner,
            Ok(inner) => Self::ComputationFailed { node, source: inner },
            Err(source) => Self::ComputationFailed { node, source },
        }
    }

    /// Fold the failures collected during one propagation pass.
    pub(crate) fn collect(mut failures: Vec<ReactiveError>) -> Result<()> {
        match failures.len() {
            0 => Ok(()),
            1 => Err(failures.remove(0)),
            _ => Err(Self::Propagation { failures }),
        }
    }
}
