//! # Convergent Runtime
//!
//! Runtime for the Convergent reactive graph.
//!
//! The [`Runtime`] owns a [`Graph`] together with the renderer and storage
//! adapters, and turns every external stimulus into one atomic step:
//!
//! 1. Snapshot the graph (O(1), every structure is persistent)
//! 2. Run the stimulus; watchers propagate synchronously until convergence
//! 3. On success, drain the outbox and flush commands to renderer/storage
//! 4. On a contract violation, restore the snapshot and discard the outbox
//!
//! The outside world therefore only ever observes converged states.
//!
//! ## Example
//!
//! ```ignore
//! use convergent_runtime::Runtime;
//!
//! let mut runtime = Runtime::new(renderer, storage);
//! runtime.dispatch("toggle", |graph| {
//!     graph.emit(&item, &"toggle", None)
//! })?;
//! ```

use convergent_core::attribute::EntityId;
use convergent_core::effect::{Outbound, OutboundSlot};
use convergent_core::environment::{Renderer, Storage};
use convergent_core::error::ConvergenceError;
use convergent_core::graph::Graph;
use convergent_core::value::Value;
use std::collections::HashSet;
use std::fmt;
use std::time::Instant;

pub mod config;
pub mod metrics;

pub use config::RuntimeConfig;
pub use error::RuntimeError;

use crate::metrics::{OutboundMetrics, StimulusMetrics};

/// Error types for the runtime
pub mod error {
    use convergent_core::error::{ConvergenceError, StorageError};
    use thiserror::Error;

    /// Errors that can occur while dispatching stimuli
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum RuntimeError {
        /// A stimulus violated a graph contract and was rolled back
        ///
        /// The graph is back in the state it had before the stimulus and
        /// none of its outbound commands were flushed.
        #[error("stimulus '{stimulus}' aborted: {source}")]
        Aborted {
            /// Name of the stimulus
            stimulus: &'static str,
            /// Violation that aborted it
            #[source]
            source: ConvergenceError,
        },

        /// The storage adapter failed while loading
        #[error(transparent)]
        Storage(#[from] StorageError),
    }

    impl RuntimeError {
        /// The contract violation behind an aborted stimulus
        #[must_use]
        pub const fn violation(&self) -> Option<&ConvergenceError> {
            match self {
                Self::Aborted { source, .. } => Some(source),
                Self::Storage(_) => None,
            }
        }
    }
}

/// Health check status levels
///
/// Indicates the current health state of a component or system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HealthStatus {
    /// Component is fully operational
    Healthy,

    /// Component is operational but the last stimulus failed or storage is failing
    Degraded,
}

impl HealthStatus {
    /// Check if status is healthy
    #[must_use]
    pub const fn is_healthy(self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// Check if status is degraded
    #[must_use]
    pub const fn is_degraded(self) -> bool {
        matches!(self, Self::Degraded)
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
        }
    }
}

/// Health check result for a component
#[derive(Debug, Clone)]
pub struct HealthCheck {
    /// Name of the component being checked
    pub component: String,

    /// Current health status
    pub status: HealthStatus,

    /// Optional message providing details
    pub message: Option<String>,

    /// Optional metadata (e.g., counters)
    pub metadata: Vec<(String, String)>,
}

impl HealthCheck {
    /// Create a healthy check result
    #[must_use]
    pub fn healthy(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            status: HealthStatus::Healthy,
            message: None,
            metadata: Vec::new(),
        }
    }

    /// Create a degraded check result
    #[must_use]
    pub fn degraded(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            status: HealthStatus::Degraded,
            message: Some(message.into()),
            metadata: Vec::new(),
        }
    }

    /// Add metadata to the health check
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push((key.into(), value.into()));
        self
    }
}

/// Counters kept by the runtime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeStats {
    /// Stimuli that converged
    pub stimuli: u64,
    /// Stimuli rolled back
    pub rollbacks: u64,
    /// Outbound commands flushed
    pub flushed: u64,
    /// Storage writes that failed
    pub storage_failures: u64,
}

/// Owner of the graph and its adapters
pub struct Runtime {
    graph: Graph,
    renderer: Box<dyn Renderer>,
    storage: Box<dyn Storage>,
    config: RuntimeConfig,
    stats: RuntimeStats,
    last_failure: Option<String>,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("graph", &self.graph)
            .field("config", &self.config)
            .field("stats", &self.stats)
            .field("last_failure", &self.last_failure)
            .finish_non_exhaustive()
    }
}

impl Runtime {
    /// Create a runtime with default configuration
    ///
    /// # Arguments
    ///
    /// - `renderer`: Receives view commands after each converged stimulus
    /// - `storage`: Receives persisted model attributes
    #[must_use]
    pub fn new(renderer: impl Renderer + 'static, storage: impl Storage + 'static) -> Self {
        Self::with_config(renderer, storage, RuntimeConfig::default())
    }

    /// Create a runtime with custom configuration
    #[must_use]
    pub fn with_config(
        renderer: impl Renderer + 'static,
        storage: impl Storage + 'static,
        config: RuntimeConfig,
    ) -> Self {
        Self {
            graph: Graph::with_limits(config.graph_limits()),
            renderer: Box::new(renderer),
            storage: Box::new(storage),
            config,
            stats: RuntimeStats::default(),
            last_failure: None,
        }
    }

    /// Read-only view of the graph
    #[must_use]
    pub const fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Active configuration
    #[must_use]
    pub const fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Counters since creation
    #[must_use]
    pub const fn stats(&self) -> RuntimeStats {
        self.stats
    }

    /// Run one stimulus to convergence
    ///
    /// `stimulus` mutates the graph; its watchers run synchronously. If it
    /// returns `Ok`, deferred outbound commands are flushed. If it returns an
    /// error the graph is restored to its state before the call and nothing
    /// is flushed.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Aborted`] wrapping the contract violation.
    #[tracing::instrument(skip(self, stimulus), name = "dispatch")]
    pub fn dispatch<T, F>(&mut self, name: &'static str, stimulus: F) -> Result<T, RuntimeError>
    where
        F: FnOnce(&mut Graph) -> Result<T, ConvergenceError>,
    {
        let started = Instant::now();
        let snapshot = self.graph.clone();
        let firings_before = self.graph.stats().firings;

        match stimulus(&mut self.graph) {
            Ok(value) => {
                let firings = self.graph.stats().firings - firings_before;
                let commands = self.graph.take_outbox();
                let commands = if self.config.coalesce_outbound {
                    coalesce(commands)
                } else {
                    commands
                };
                tracing::debug!(
                    stimulus = name,
                    firings,
                    commands = commands.len(),
                    "Stimulus converged"
                );
                self.last_failure = None;
                self.flush(commands);

                self.stats.stimuli += 1;
                StimulusMetrics::record_dispatch(name, started.elapsed(), firings);
                Ok(value)
            },
            Err(source) => {
                let discarded = self.graph.pending_outbound();
                self.graph = snapshot;

                tracing::error!(
                    stimulus = name,
                    error = %source,
                    discarded,
                    "Stimulus aborted, graph rolled back"
                );
                self.stats.rollbacks += 1;
                self.last_failure = Some(format!("stimulus '{name}' rolled back: {source}"));
                StimulusMetrics::record_rollback(name);
                Err(RuntimeError::Aborted {
                    stimulus: name,
                    source,
                })
            },
        }
    }

    /// Load a persisted attribute from storage
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Storage`] if the adapter cannot read.
    pub fn load(&self, entity: &EntityId, name: &str) -> Result<Option<Value>, RuntimeError> {
        let value = self.storage.load(entity, name)?;
        tracing::debug!(
            entity = %entity,
            name,
            found = value.is_some(),
            "Loaded persisted attribute"
        );
        Ok(value)
    }

    fn flush(&mut self, commands: Vec<Outbound>) {
        for command in commands {
            OutboundMetrics::record_command(command.kind());
            self.stats.flushed += 1;
            match command {
                Outbound::Persist {
                    entity,
                    name,
                    value,
                } => {
                    // Saves are fire-and-forget: the graph already converged.
                    if let Err(error) = self.storage.save(&entity, name, &value) {
                        tracing::warn!(
                            entity = %entity,
                            name,
                            %error,
                            "Failed to persist attribute"
                        );
                        self.stats.storage_failures += 1;
                        self.last_failure = Some(error.to_string());
                        OutboundMetrics::record_storage_failure();
                    }
                },
                other => {
                    tracing::trace!(kind = other.kind(), "Flushing outbound command");
                    self.renderer.apply(other);
                },
            }
        }
    }

    /// Report runtime health
    ///
    /// Degraded while the most recent stimulus was rolled back or a storage
    /// write of the most recent stimulus failed; healthy again after the next
    /// clean stimulus.
    #[must_use]
    pub fn health(&self) -> HealthCheck {
        let check = match &self.last_failure {
            Some(message) => HealthCheck::degraded("runtime", message.clone()),
            None => HealthCheck::healthy("runtime"),
        };

        check
            .with_metadata("stimuli", self.stats.stimuli.to_string())
            .with_metadata("rollbacks", self.stats.rollbacks.to_string())
            .with_metadata("storage_failures", self.stats.storage_failures.to_string())
            .with_metadata("bindings", self.graph.binding_count().to_string())
    }
}

/// Drops commands superseded by a later command for the same slot
///
/// The surviving command keeps the position of the last write, so the
/// relative order of everything that is flushed is unchanged.
#[must_use]
pub fn coalesce(commands: Vec<Outbound>) -> Vec<Outbound> {
    let total = commands.len();
    let mut seen: HashSet<OutboundSlot> = HashSet::new();
    let mut kept: Vec<Outbound> = commands
        .into_iter()
        .rev()
        .filter(|command| command.slot().is_none_or(|slot| seen.insert(slot)))
        .collect();
    kept.reverse();

    let dropped = total - kept.len();
    if dropped > 0 {
        OutboundMetrics::record_coalesced(dropped);
    }
    kept
}
