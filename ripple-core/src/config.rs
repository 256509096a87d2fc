//! Runtime Configuration
//!
//! Tuning knobs for propagation. Configuration is installed per thread,
//! matching the thread-local tracking context: a propagation pass always
//! runs on the thread that performed the write, so it always sees the
//! configuration of that thread.

use std::cell::RefCell;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default maximum depth of the tracking stack.
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// What a propagation pass does when one of its subscribers fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Run every snapshotted subscriber, then report all failures together.
    #[default]
    Isolate,

    /// Stop the pass at the first failing subscriber.
    Abort,
}

/// Configuration for the reactive runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Maximum number of nested computation runs on one thread before the
    /// runtime reports a cyclic dependency.
    pub max_depth: usize,

    /// How failing subscribers affect the rest of a propagation pass.
    pub failure_policy: FailurePolicy,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl RuntimeConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }
}

thread_local! {
    static CONFIG: RefCell<RuntimeConfig> = RefCell::new(RuntimeConfig::default());
}

/// Install `config` for the current thread.
pub(crate) fn install(config: RuntimeConfig) {
    CONFIG.with(|slot| *slot.borrow_mut() = config);
}

/// The configuration active on the current thread.
pub(crate) fn current() -> RuntimeConfig {
    CONFIG.with(|slot| slot.borrow().clone())
}
