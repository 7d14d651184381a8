//! Filters, routes and view activation.

use crate::types::{Todo, TodoSignal, attr};
use convergent_core::attribute::{AttributeKey, EntityId};
use convergent_core::effect::Outbound;
use convergent_core::error::ConvergenceError;
use convergent_core::graph::{Graph, WatchOptions};
use convergent_core::value::Value;
use serde::{Deserialize, Serialize};

/// Which todos the list shows
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Filter {
    /// Every todo
    #[default]
    All,
    /// Todos not yet done
    Active,
    /// Done todos
    Completed,
}

impl Filter {
    /// Every filter, in the order the links are shown
    pub const ALL: [Self; 3] = [Self::All, Self::Active, Self::Completed];

    /// Label used in links, titles and the filter attribute
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }

    /// Parses a label; unknown labels yield `None`
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|filter| filter.label() == label)
    }

    /// Reads the filter attribute
    ///
    /// Anything but a known label, including an unset or non-text value,
    /// means [`Filter::All`].
    #[must_use]
    pub fn from_value(value: Option<&Value>) -> Self {
        value
            .and_then(|value| value.as_text().ok())
            .and_then(Self::from_label)
            .unwrap_or_default()
    }

    /// Whether `todo` is shown under this filter
    #[must_use]
    pub const fn displays(self, todo: &Todo) -> bool {
        match self {
            Self::All => true,
            Self::Active => !todo.is_completed(),
            Self::Completed => todo.is_completed(),
        }
    }
}

impl std::fmt::Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Maps paths to filters
///
/// A path is the route prefix followed by a filter label. The bare root and
/// the bare prefix redirect to `all`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Routes {
    prefix: String,
}

impl Routes {
    /// Routes under `prefix`, normalised to end with `/`
    #[must_use]
    pub fn new(prefix: &str) -> Self {
        let mut prefix = prefix.trim().to_string();
        if !prefix.ends_with('/') {
            prefix.push('/');
        }
        Self { prefix }
    }

    /// Link to a filter view
    #[must_use]
    pub fn link(&self, filter: Filter) -> String {
        format!("{}{}", self.prefix, filter.label())
    }

    /// Filter selected by `path`; `None` for paths outside the routes
    #[must_use]
    pub fn resolve(&self, path: &str) -> Option<Filter> {
        if path.is_empty() || path == "/" {
            return Some(Filter::All);
        }
        let label = path.strip_prefix(&self.prefix).or_else(|| {
            path.strip_prefix(self.prefix.trim_end_matches('/'))
                .filter(|rest| rest.is_empty())
        })?;
        if label.is_empty() {
            return Some(Filter::All);
        }
        Filter::from_label(label.trim_end_matches('/'))
    }

    /// `{names, urls}` object describing the filter links
    #[must_use]
    pub fn links_value(&self) -> Value {
        Value::object([
            ("names", Value::texts(Filter::ALL.map(Filter::label))),
            ("urls", Value::texts(Filter::ALL.map(|filter| self.link(filter)))),
        ])
    }
}

impl Default for Routes {
    fn default() -> Self {
        Self::new("/")
    }
}

/// Binds the filter attribute of `list` to a re-render
///
/// # Errors
///
/// Returns [`ConvergenceError::UnknownEntity`] if `list` does not exist.
pub fn mount(graph: &mut Graph, list: &EntityId) -> Result<(), ConvergenceError> {
    graph.watch(
        list,
        AttributeKey::presentation(list.clone(), attr::FILTER),
        WatchOptions::default(),
        |graph, mutation| graph.emit(&mutation.origin, &TodoSignal::RenderList, None),
    )?;
    Ok(())
}

/// Publishes the filter links on `list`
///
/// # Errors
///
/// Any error raised while propagating the write.
pub fn publish_links(
    graph: &mut Graph,
    list: &EntityId,
    routes: &Routes,
) -> Result<(), ConvergenceError> {
    graph.publish(list, attr::FILTERS_LIST, routes.links_value())?;
    Ok(())
}

/// Switches the list to `filter` and retitles the window
///
/// Re-activating the current filter re-renders nothing; the title command is
/// still issued.
///
/// # Errors
///
/// Any error raised while propagating the write.
#[tracing::instrument(skip_all, fields(list = %list, filter = %filter))]
pub fn activate(
    graph: &mut Graph,
    list: &EntityId,
    filter: Filter,
    title_prefix: &str,
) -> Result<(), ConvergenceError> {
    graph.set(
        AttributeKey::presentation(list.clone(), attr::FILTER),
        Value::from(filter.label()),
    )?;
    graph.defer(Outbound::SetTitle(format!("{title_prefix}{}", filter.label())));
    tracing::debug!("View activated");
    Ok(())
}
