//! Runtime configuration.
//!
//! Loads configuration from environment variables with sensible defaults.

use convergent_core::graph::{DEFAULT_MAX_DEPTH, GraphLimits};
use serde::{Deserialize, Serialize};
use std::env;

/// Runtime configuration
///
/// # Example
///
/// ```
/// use convergent_runtime::config::RuntimeConfig;
///
/// let config = RuntimeConfig::default()
///     .with_max_chain_depth(16)
///     .with_coalescing(false);
/// assert_eq!(config.graph_limits().max_depth, 16);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Maximum nesting of watcher chains before a stimulus is aborted
    pub max_chain_depth: usize,
    /// Merge last-value-wins outbound commands before flushing
    pub coalesce_outbound: bool,
}

impl RuntimeConfig {
    /// Create a configuration with custom values
    #[must_use]
    pub const fn new(max_chain_depth: usize, coalesce_outbound: bool) -> Self {
        Self {
            max_chain_depth,
            coalesce_outbound,
        }
    }

    /// Set the maximum chain depth
    #[must_use]
    pub const fn with_max_chain_depth(mut self, depth: usize) -> Self {
        self.max_chain_depth = depth;
        self
    }

    /// Enable or disable outbound coalescing
    #[must_use]
    pub const fn with_coalescing(mut self, enabled: bool) -> Self {
        self.coalesce_outbound = enabled;
        self
    }

    /// Limits handed to the graph
    #[must_use]
    pub const fn graph_limits(&self) -> GraphLimits {
        GraphLimits {
            max_depth: self.max_chain_depth,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// - `CONVERGENT_MAX_CHAIN_DEPTH` (default 64)
    /// - `CONVERGENT_COALESCE` (default `true`)
    ///
    /// Unparseable values fall back to the default.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            max_chain_depth: lookup("CONVERGENT_MAX_CHAIN_DEPTH")
                .and_then(|s| s.parse().ok())
                .filter(|depth| *depth > 0)
                .unwrap_or(defaults.max_chain_depth),
            coalesce_outbound: lookup("CONVERGENT_COALESCE")
                .and_then(|s| parse_flag(&s))
                .unwrap_or(defaults.coalesce_outbound),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_chain_depth: DEFAULT_MAX_DEPTH,
            coalesce_outbound: true,
        }
    }
}

/// Parses `true/false/1/0/yes/no/on/off`, case-insensitively
#[must_use]
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
