//! List controller: owns the collection and keeps one handle per record.
//!
//! The collection lives in the `todoslist` attribute of the list entity.
//! Whenever it changes, every record is pushed into its handle (creating the
//! handle on first sight) and a render pass is requested. Handles feed
//! changes back through two watchers: a record change replaces the record in
//! the collection, and a `delete` signal removes it and destroys the handle.

use crate::collection::TodoCollection;
use crate::item;
use crate::render::collection_of;
use crate::types::{Todo, TodoId, TodoSignal, attr};
use convergent_core::attribute::{AttributeKey, EntityId};
use convergent_core::effect::Effect;
use convergent_core::error::ConvergenceError;
use convergent_core::graph::{Graph, WatchOptions};
use convergent_core::reducer::Reducer;
use convergent_core::{SmallVec, smallvec};

/// State of the list controller
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListState {
    /// List entity
    pub list: EntityId,
    /// Current collection
    pub todos: TodoCollection,
}

impl ListState {
    /// Reads the collection held by `list`
    ///
    /// # Errors
    ///
    /// Returns a decoding error if the attribute is malformed.
    pub fn load(graph: &Graph, list: &EntityId) -> Result<Self, ConvergenceError> {
        Ok(Self {
            list: list.clone(),
            todos: collection_of(graph, list)?,
        })
    }
}

/// Collection changes
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListAction {
    /// Add a record at the end
    Append(Todo),
    /// Replace the record with the same id
    Replace(Todo),
    /// Remove a record and destroy its handle
    Remove(TodoId),
    /// Set every record's completion status
    ToggleAll(bool),
    /// Remove every completed record and destroy their handles
    ClearCompleted,
}

/// Reducer for the list controller
///
/// Every action that changes the collection yields exactly one `Publish` of
/// the new collection, after any `Destroy` of removed handles. Actions that
/// leave the collection as it was yield nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct ListReducer;

impl ListReducer {
    /// Creates a new `ListReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn publish(state: &ListState) -> Effect {
        Effect::Publish {
            entity: state.list.clone(),
            name: attr::TODOS_LIST,
            value: state.todos.to_value(),
        }
    }
}

impl Reducer for ListReducer {
    type State = ListState;
    type Action = ListAction;
    type Environment = ();

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        _env: &Self::Environment,
    ) -> SmallVec<[Effect; 4]> {
        match action {
            ListAction::Append(todo) => {
                state.todos = state.todos.append(todo);
                smallvec![Self::publish(state)]
            },

            ListAction::Replace(todo) => match state.todos.replace(todo) {
                Some(next) if next != state.todos => {
                    state.todos = next;
                    smallvec![Self::publish(state)]
                },
                _ => SmallVec::new(),
            },

            ListAction::Remove(id) => {
                if state.todos.position(&id).is_none() {
                    return SmallVec::new();
                }
                state.todos = state.todos.remove_where(|todo| *todo.id() == id);
                smallvec![Effect::Destroy(id.entity()), Self::publish(state)]
            },

            ListAction::ToggleAll(completed) => {
                let mut draft = state.todos.edit();
                draft.update_all(|todo| todo.with_completed(completed));
                let next = draft.commit();
                if next == state.todos {
                    return SmallVec::new();
                }
                state.todos = next;
                smallvec![Self::publish(state)]
            },

            ListAction::ClearCompleted => {
                let mut effects: SmallVec<[Effect; 4]> = state
                    .todos
                    .iter()
                    .filter(|todo| todo.is_completed())
                    .map(|todo| Effect::Destroy(todo.id().entity()))
                    .collect();
                if effects.is_empty() {
                    return effects;
                }
                state.todos = state.todos.remove_where(Todo::is_completed);
                effects.push(Self::publish(state));
                effects
            },
        }
    }
}

/// Loads the collection of `list`, reduces `action` and applies the effects
///
/// # Errors
///
/// Any error raised while loading the collection or propagating the effects.
pub fn run(graph: &mut Graph, list: &EntityId, action: ListAction) -> Result<(), ConvergenceError> {
    let mut state = ListState::load(graph, list)?;
    tracing::trace!(list = %list, ?action, "List action");
    let effects = ListReducer.reduce(&mut state, action, &());
    graph.apply(effects)
}

/// Binds the create-or-update pass to the collection of `list`
///
/// # Errors
///
/// Returns [`ConvergenceError::UnknownEntity`] if `list` does not exist.
pub fn mount(graph: &mut Graph, list: &EntityId) -> Result<(), ConvergenceError> {
    graph.watch(
        list,
        AttributeKey::presentation(list.clone(), attr::TODOS_LIST),
        WatchOptions::default(),
        |graph, mutation| {
            let list = &mutation.origin;
            let todos = mutation
                .value()
                .map_or_else(|| Ok(TodoCollection::new()), TodoCollection::from_value)?;
            sync_handles(graph, list, &todos)?;
            graph.emit(list, &TodoSignal::RenderList, None)
        },
    )?;
    Ok(())
}

/// Pushes every record into its handle, creating missing handles
fn sync_handles(
    graph: &mut Graph,
    list: &EntityId,
    todos: &TodoCollection,
) -> Result<(), ConvergenceError> {
    let mut created = 0_usize;
    for todo in todos.iter() {
        let handle = todo.id().entity();
        if graph.contains(&handle) {
            graph.publish(&handle, attr::TODO, todo.to_value())?;
        } else {
            let handle = item::materialize(graph, todo)?;
            adopt(graph, list, &handle)?;
            created += 1;
        }
    }
    if created > 0 {
        tracing::debug!(list = %list, created, total = todos.len(), "Handles created");
    }
    Ok(())
}

/// Binds a freshly created handle back to the collection
fn adopt(graph: &mut Graph, list: &EntityId, handle: &EntityId) -> Result<(), ConvergenceError> {
    let owner = list.clone();
    graph.watch(
        handle,
        AttributeKey::presentation(handle.clone(), attr::TODO),
        WatchOptions::default(),
        move |graph, mutation| {
            let Some(value) = mutation.value() else {
                return Ok(());
            };
            run(graph, &owner, ListAction::Replace(Todo::from_value(value)?))
        },
    )?;

    let owner = list.clone();
    graph.watch_signal(
        list,
        handle,
        &TodoSignal::Delete,
        WatchOptions::default(),
        move |graph, mutation| {
            let id = TodoId::new(mutation.origin.as_str());
            run(graph, &owner, ListAction::Remove(id))
        },
    )?;
    Ok(())
}
