//! Recomputes the visible children of the todo list.
//!
//! A render pass reads the active filter and the collection, keeps the records
//! the filter displays, and replaces the list's children with their item
//! handles in collection order. Every record must have a live handle by the
//! time a pass runs; a missing one is a contract violation and aborts the
//! stimulus.

use crate::collection::TodoCollection;
use crate::filter::Filter;
use crate::types::{TodoSignal, attr};
use convergent_core::attribute::{AttributeKey, EntityId};
use convergent_core::effect::Outbound;
use convergent_core::error::ConvergenceError;
use convergent_core::graph::{Graph, WatchOptions};
use convergent_core::value::Value;

/// Binds `renderlist` on `list` to a render pass
///
/// # Errors
///
/// Returns [`ConvergenceError::UnknownEntity`] if `list` does not exist.
pub fn mount(graph: &mut Graph, list: &EntityId) -> Result<(), ConvergenceError> {
    graph.watch_signal(
        list,
        list,
        &TodoSignal::RenderList,
        WatchOptions::default(),
        |graph, mutation| render_list(graph, &mutation.origin).map(drop),
    )?;
    Ok(())
}

/// Reads the collection held by `list`; unset means empty
///
/// # Errors
///
/// Returns a decoding error if the attribute is not a list of records.
pub fn collection_of(graph: &Graph, list: &EntityId) -> Result<TodoCollection, ConvergenceError> {
    graph
        .model(list, attr::TODOS_LIST)
        .map_or_else(|| Ok(TodoCollection::new()), TodoCollection::from_value)
}

/// Runs one render pass and returns the visible handles
///
/// # Errors
///
/// Returns [`ConvergenceError::MissingHandle`] if a displayed record has no
/// live handle, or a decoding error for a malformed collection.
#[tracing::instrument(skip_all, fields(list = %list))]
pub fn render_list(graph: &mut Graph, list: &EntityId) -> Result<Vec<EntityId>, ConvergenceError> {
    let filter = Filter::from_value(graph.presentation(list, attr::FILTER));
    let todos = collection_of(graph, list)?;

    let mut children = Vec::with_capacity(todos.len());
    for (_, todo) in todos.range().filter(|(_, todo)| filter.displays(todo)) {
        let handle = todo.id().entity();
        if !graph.contains(&handle) {
            tracing::error!(todo = %todo.id(), "Displayed todo has no handle");
            return Err(ConvergenceError::MissingHandle {
                id: todo.id().to_string(),
            });
        }
        children.push(handle);
    }

    graph.set(
        AttributeKey::presentation(list.clone(), attr::CHILDREN),
        Value::texts(children.iter().map(EntityId::as_str)),
    )?;
    graph.defer(Outbound::SetChildren {
        container: list.clone(),
        children: children.clone(),
    });
    tracing::debug!(%filter, visible = children.len(), total = todos.len(), "List rendered");
    Ok(children)
}
