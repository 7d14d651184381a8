//! Dependencies of the application.

use crate::config::AppConfig;
use crate::filter::Routes;
use convergent_core::environment::{IdGenerator, RandomIds, SeededIds};
use std::rc::Rc;

/// Environment dependencies for the TodoMVC application
///
/// Cloning is cheap; watchers keep a clone so they can mint ids while the
/// graph propagates.
#[derive(Clone)]
pub struct TodoEnvironment {
    /// Source of todo ids
    pub ids: Rc<dyn IdGenerator>,
    /// Application configuration
    pub config: AppConfig,
    /// Filter routes derived from the configuration
    pub routes: Routes,
}

impl TodoEnvironment {
    /// Creates an environment with an explicit id source
    #[must_use]
    pub fn new(ids: Rc<dyn IdGenerator>, config: AppConfig) -> Self {
        let routes = Routes::new(&config.route_prefix);
        Self { ids, config, routes }
    }

    /// Creates an environment whose id source follows `config.id_seed`
    #[must_use]
    pub fn from_config(config: AppConfig) -> Self {
        let ids: Rc<dyn IdGenerator> = match config.id_seed {
            Some(seed) => Rc::new(SeededIds::new(seed)),
            None => Rc::new(RandomIds),
        };
        Self::new(ids, config)
    }
}

impl std::fmt::Debug for TodoEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TodoEnvironment")
            .field("config", &self.config)
            .field("routes", &self.routes)
            .finish_non_exhaustive()
    }
}
