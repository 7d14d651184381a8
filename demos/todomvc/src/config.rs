//! Application configuration.
//!
//! Loads configuration from environment variables with sensible defaults.

use convergent_runtime::config::parse_flag;
use serde::{Deserialize, Serialize};
use std::env;

/// Default window title prefix
pub const DEFAULT_TITLE_PREFIX: &str = "TODOMVC-";

/// Seed used for reproducible ids during development
pub const DEVELOPMENT_SEED: u64 = 7_823_949_678_145_108;

/// Application configuration
///
/// # Example
///
/// ```
/// use todomvc::config::AppConfig;
///
/// let config = AppConfig::default().with_id_seed(42).with_persistence(false);
/// assert_eq!(config.id_seed, Some(42));
/// assert!(!config.persist);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Save the collection and toggle-all state to storage
    pub persist: bool,
    /// Seed for reproducible todo ids; random ids when unset
    pub id_seed: Option<u64>,
    /// Path prefix of the filter routes
    pub route_prefix: String,
    /// Prefix of the window title, followed by the filter label
    pub title_prefix: String,
}

impl AppConfig {
    /// Enable or disable persistence
    #[must_use]
    pub const fn with_persistence(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    /// Use reproducible ids
    #[must_use]
    pub const fn with_id_seed(mut self, seed: u64) -> Self {
        self.id_seed = Some(seed);
        self
    }

    /// Set the route prefix
    #[must_use]
    pub fn with_route_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.route_prefix = prefix.into();
        self
    }

    /// Set the window title prefix
    #[must_use]
    pub fn with_title_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.title_prefix = prefix.into();
        self
    }

    /// Load configuration from environment variables.
    ///
    /// - `TODOMVC_PERSIST` (default `true`)
    /// - `TODOMVC_ID_SEED` (unset: random ids; `dev`: the development seed)
    /// - `TODOMVC_ROUTE_PREFIX` (default `/`)
    /// - `TODOMVC_TITLE_PREFIX` (default `TODOMVC-`)
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
            persist: lookup("TODOMVC_PERSIST")
                .and_then(|s| parse_flag(&s))
                .unwrap_or(defaults.persist),
            id_seed: lookup("TODOMVC_ID_SEED").and_then(|s| match s.trim() {
                "dev" => Some(DEVELOPMENT_SEED),
                seed => seed.parse().ok(),
            }),
            route_prefix: lookup("TODOMVC_ROUTE_PREFIX")
                .filter(|s| s.starts_with('/'))
                .unwrap_or(defaults.route_prefix),
            title_prefix: lookup("TODOMVC_TITLE_PREFIX").unwrap_or(defaults.title_prefix),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            persist: true,
            id_seed: None,
            route_prefix: "/".to_string(),
            title_prefix: DEFAULT_TITLE_PREFIX.to_string(),
        }
    }
}
