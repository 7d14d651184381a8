//! Item controller: one handle per todo record.
//!
//! A handle is an item entity (id = todo id) with an editor child. It shows
//! its record, toggles completion, and runs a small edit state machine:
//!
//! ```text
//!            BeginEdit                 Commit / Cancel
//! Viewing ─────────────▶ Editing ─────────────────────▶ Viewing
//!                        │    ▲
//!                        └────┘ Draft(text)
//! ```
//!
//! `Draft`, `Commit` and `Cancel` while viewing are ignored, as is
//! `BeginEdit` while editing. A commit publishes a new record only when the
//! trimmed draft differs from the title; committing a blank title deletes the
//! todo.
//!
//! The reducer is pure. [`run`] loads the state from the graph, reduces, and
//! applies the effects, which is how every handle watcher drives it.

use crate::types::{Todo, TodoSignal, attr, editor_of, kind};
use convergent_core::attribute::{AttributeKey, EntityId};
use convergent_core::effect::{Effect, Outbound};
use convergent_core::error::ConvergenceError;
use convergent_core::graph::{Graph, Mutation, WatchOptions};
use convergent_core::reducer::Reducer;
use convergent_core::signal::Signal;
use convergent_core::value::Value;
use convergent_core::{SmallVec, smallvec};

/// State of one item handle
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemState {
    /// Item entity
    pub handle: EntityId,
    /// Editor child of the item
    pub editor: EntityId,
    /// Record the item shows
    pub todo: Todo,
    /// Whether the editor is open
    pub editing: bool,
    /// Editor text while editing
    pub draft: String,
}

impl ItemState {
    /// A closed item showing `todo`
    #[must_use]
    pub fn viewing(todo: Todo) -> Self {
        let handle = todo.id().entity();
        Self {
            editor: editor_of(&handle),
            handle,
            todo,
            editing: false,
            draft: String::new(),
        }
    }

    /// Reads the state of `handle` from the graph
    ///
    /// # Errors
    ///
    /// Returns [`ConvergenceError::UnknownEntity`] if the handle does not
    /// exist and a decoding error if its attributes are malformed.
    pub fn load(graph: &Graph, handle: &EntityId) -> Result<Self, ConvergenceError> {
        if !graph.contains(handle) {
            return Err(ConvergenceError::UnknownEntity(handle.clone()));
        }
        let editor = editor_of(handle);
        let todo = graph
            .model(handle, attr::TODO)
            .ok_or(ConvergenceError::MissingField { field: attr::TODO })
            .and_then(Todo::from_value)?;
        let editing = graph
            .presentation(handle, attr::EDIT_MODE)
            .map(Value::as_bool)
            .transpose()?
            .unwrap_or(false);
        let draft = graph
            .presentation(&editor, attr::VALUE)
            .map(Value::as_text)
            .transpose()?
            .unwrap_or_default()
            .to_string();
        Ok(Self {
            handle: handle.clone(),
            editor,
            todo,
            editing,
            draft,
        })
    }
}

/// Actions on one item handle
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ItemAction {
    /// Open the editor
    BeginEdit,
    /// Editor text changed
    Draft(String),
    /// Accept the draft
    Commit,
    /// Discard the draft
    Cancel,
    /// Flip completion
    Toggle,
    /// Remove the todo
    Delete,
}

/// Reducer for one item handle
#[derive(Clone, Copy, Debug, Default)]
pub struct ItemReducer;

impl ItemReducer {
    /// Creates a new `ItemReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn set_edit_mode(state: &ItemState, editing: bool) -> Effect {
        Effect::Write {
            key: AttributeKey::presentation(state.handle.clone(), attr::EDIT_MODE),
            value: Value::from(editing),
        }
    }

    fn close_editor(state: &ItemState) -> [Effect; 3] {
        [
            Self::set_edit_mode(state, false),
            Effect::Outbound(Outbound::Blur(state.editor.clone())),
            Effect::Outbound(Outbound::Detach {
                parent: state.handle.clone(),
                child: state.editor.clone(),
            }),
        ]
    }

    fn publish_todo(state: &ItemState) -> Effect {
        Effect::Publish {
            entity: state.handle.clone(),
            name: attr::TODO,
            value: state.todo.to_value(),
        }
    }
}

impl Reducer for ItemReducer {
    type State = ItemState;
    type Action = ItemAction;
    type Environment = ();

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        _env: &Self::Environment,
    ) -> SmallVec<[Effect; 4]> {
        match action {
            ItemAction::BeginEdit => {
                if state.editing {
                    return SmallVec::new();
                }
                state.editing = true;
                state.draft = state.todo.title().to_string();
                smallvec![
                    Effect::Publish {
                        entity: state.editor.clone(),
                        name: attr::VALUE,
                        value: Value::from(state.draft.as_str()),
                    },
                    Self::set_edit_mode(state, true),
                    Effect::Outbound(Outbound::Attach {
                        parent: state.handle.clone(),
                        child: state.editor.clone(),
                    }),
                    Effect::Outbound(Outbound::Focus(state.editor.clone())),
                ]
            },

            ItemAction::Draft(text) => {
                if !state.editing {
                    return SmallVec::new();
                }
                state.draft = text;
                smallvec![Effect::Write {
                    key: AttributeKey::presentation(state.editor.clone(), attr::VALUE),
                    value: Value::from(state.draft.as_str()),
                }]
            },

            ItemAction::Commit => {
                if !state.editing {
                    return SmallVec::new();
                }
                state.editing = false;
                let title = state.draft.trim().to_string();
                state.draft = title.clone();

                let mut effects: SmallVec<[Effect; 4]> =
                    Self::close_editor(state).into_iter().collect();
                effects.push(Effect::Publish {
                    entity: state.editor.clone(),
                    name: attr::VALUE,
                    value: Value::from(title.as_str()),
                });
                // The record goes last: a blank title destroys the handle.
                if title != state.todo.title() {
                    state.todo = state.todo.with_title(title);
                    effects.push(Self::publish_todo(state));
                }
                effects
            },

            ItemAction::Cancel => {
                if !state.editing {
                    return SmallVec::new();
                }
                state.editing = false;
                state.draft = state.todo.title().to_string();

                let mut effects: SmallVec<[Effect; 4]> = smallvec![Effect::Write {
                    key: AttributeKey::presentation(state.editor.clone(), attr::VALUE),
                    value: Value::from(state.draft.as_str()),
                }];
                effects.extend(Self::close_editor(state));
                effects
            },

            ItemAction::Toggle => {
                state.todo = state.todo.with_completed(!state.todo.is_completed());
                smallvec![Self::publish_todo(state)]
            },

            ItemAction::Delete => {
                smallvec![Effect::Emit(Signal::new(state.handle.clone(), &TodoSignal::Delete))]
            },
        }
    }
}

/// Loads `handle`, reduces `action` and applies the effects
///
/// # Errors
///
/// Any error raised while loading the state or propagating the effects.
pub fn run(
    graph: &mut Graph,
    handle: &EntityId,
    action: ItemAction,
) -> Result<(), ConvergenceError> {
    let mut state = ItemState::load(graph, handle)?;
    tracing::trace!(item = %handle, ?action, "Item action");
    let effects = ItemReducer.reduce(&mut state, action, &());
    graph.apply(effects)
}

/// Creates the handle for `todo` and binds its watchers
///
/// The handle shows its record before returning. Watchers owned by the
/// handle disappear with it.
///
/// # Errors
///
/// Returns [`ConvergenceError::DuplicateEntity`] if a handle with this id
/// already exists, or any error raised while publishing the record.
#[tracing::instrument(skip_all, fields(todo = %todo.id()))]
pub fn materialize(graph: &mut Graph, todo: &Todo) -> Result<EntityId, ConvergenceError> {
    let handle = graph.create_entity(todo.id().entity(), kind::ITEM)?;
    let editor = graph.create_child(&handle, editor_of(&handle), kind::EDITOR)?;

    graph.watch(
        &handle,
        AttributeKey::presentation(handle.clone(), attr::TODO),
        WatchOptions::default(),
        display,
    )?;

    bind(graph, &handle, &handle, TodoSignal::Toggle, |_| Ok(ItemAction::Toggle))?;
    bind(graph, &handle, &handle, TodoSignal::Edit, |_| Ok(ItemAction::BeginEdit))?;
    bind(graph, &handle, &editor, TodoSignal::CancelEdit, |_| Ok(ItemAction::Cancel))?;
    bind(graph, &handle, &editor, TodoSignal::CommitEdit, |_| Ok(ItemAction::Commit))?;
    bind(graph, &handle, &editor, TodoSignal::Draft, |mutation| {
        let text = mutation
            .value()
            .ok_or_else(|| ConvergenceError::InvalidPayload {
                signal: mutation.name(),
                reason: "missing draft text".into(),
            })?
            .as_text()?;
        Ok(ItemAction::Draft(text.to_string()))
    })?;

    graph.publish(&handle, attr::TODO, todo.to_value())?;
    tracing::debug!("Item materialized");
    Ok(handle)
}

/// Binds a signal on `origin` to an item action
fn bind<F>(
    graph: &mut Graph,
    handle: &EntityId,
    origin: &EntityId,
    signal: TodoSignal,
    action: F,
) -> Result<(), ConvergenceError>
where
    F: Fn(&Mutation) -> Result<ItemAction, ConvergenceError> + 'static,
{
    let target = handle.clone();
    graph.watch_signal(handle, origin, &signal, WatchOptions::default(), move |graph, mutation| {
        let action = action(mutation)?;
        run(graph, &target, action)
    })?;
    Ok(())
}

/// Projects the record onto the handle
///
/// A record renamed to a blank title deletes the todo. A record that arrives
/// blank when the handle is created is shown as is.
fn display(graph: &mut Graph, mutation: &Mutation) -> Result<(), ConvergenceError> {
    let Some(value) = mutation.value() else {
        return Ok(());
    };
    let todo = Todo::from_value(value)?;
    let handle = &mutation.origin;

    if todo.title().is_empty() && mutation.old_value.is_some() {
        tracing::debug!(todo = %todo.id(), "Blank title, deleting");
        return run(graph, handle, ItemAction::Delete);
    }

    graph.set(
        AttributeKey::presentation(handle.clone(), attr::LABEL),
        Value::from(todo.title()),
    )?;
    graph.set(
        AttributeKey::presentation(handle.clone(), attr::COMPLETED),
        Value::from(todo.is_completed()),
    )?;

    let editing = graph
        .presentation(handle, attr::EDIT_MODE)
        .map(Value::as_bool)
        .transpose()?
        .unwrap_or(false);
    if !editing {
        graph.publish(&editor_of(handle), attr::VALUE, Value::from(todo.title()))?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::TodoId;
    use convergent_testing::{ReducerTest, assertions};

    fn milk() -> Todo {
        Todo::new(TodoId::from("milk"), "Buy milk")
    }

    fn editing(draft: &str) -> ItemState {
        ItemState {
            editing: true,
            draft: draft.to_string(),
            ..ItemState::viewing(milk())
        }
    }

    #[test]
    fn begin_edit_opens_and_focuses_editor() {
        ReducerTest::new(ItemReducer::new())
            .with_env(())
            .given_state(ItemState::viewing(milk()))
            .when_action(ItemAction::BeginEdit)
            .then_state(|state| {
                assert!(state.editing);
                assert_eq!(state.draft, "Buy milk");
            })
            .then_effects(|effects| {
                assertions::assert_has_outbound(effects, |c| matches!(c, Outbound::Attach { .. }));
                assertions::assert_has_outbound(effects, |c| matches!(c, Outbound::Focus(_)));
                assertions::assert_publishes(effects, attr::VALUE, &Value::from("Buy milk"));
            })
            .run();
    }

    #[test]
    fn begin_edit_twice_is_ignored() {
        ReducerTest::new(ItemReducer::new())
            .with_env(())
            .given_state(editing("half typed"))
            .when_action(ItemAction::BeginEdit)
            .then_state(|state| assert_eq!(state.draft, "half typed"))
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn viewing_ignores_editor_actions() {
        for action in [ItemAction::Draft("x".into()), ItemAction::Commit, ItemAction::Cancel] {
            ReducerTest::new(ItemReducer::new())
                .with_env(())
                .given_state(ItemState::viewing(milk()))
                .when_action(action)
                .then_state(|state| assert_eq!(*state, ItemState::viewing(milk())))
                .then_effects(assertions::assert_no_effects)
                .run();
        }
    }

    #[test]
    fn commit_trims_and_publishes_changed_title() {
        ReducerTest::new(ItemReducer::new())
            .with_env(())
            .given_state(editing("  Buy oat milk "))
            .when_action(ItemAction::Commit)
            .then_state(|state| {
                assert!(!state.editing);
                assert_eq!(state.todo.title(), "Buy oat milk");
            })
            .then_effects(|effects| {
                let record = milk().with_title("Buy oat milk").to_value();
                assertions::assert_publishes(effects, attr::TODO, &record);
                assert!(matches!(
                    effects.last(),
                    Some(Effect::Publish { name, .. }) if *name == attr::TODO
                ));
                assertions::assert_has_outbound(effects, |c| matches!(c, Outbound::Detach { .. }));
            })
            .run();
    }

    #[test]
    fn commit_unchanged_title_publishes_no_record() {
        ReducerTest::new(ItemReducer::new())
            .with_env(())
            .given_state(editing(" Buy milk"))
            .when_action(ItemAction::Commit)
            .then_state(|state| assert_eq!(state.todo, milk()))
            .then_effects(|effects| {
                assert!(!effects.iter().any(
                    |e| matches!(e, Effect::Publish { name, .. } if *name == attr::TODO)
                ));
                assertions::assert_has_outbound(effects, |c| matches!(c, Outbound::Blur(_)));
            })
            .run();
    }

    #[test]
    fn cancel_reverts_without_touching_the_record() {
        ReducerTest::new(ItemReducer::new())
            .with_env(())
            .given_state(editing("something else"))
            .when_action(ItemAction::Cancel)
            .then_state(|state| {
                assert!(!state.editing);
                assert_eq!(state.draft, "Buy milk");
                assert_eq!(state.todo, milk());
            })
            .then_effects(|effects| {
                assertions::assert_publish_count(effects, 0);
                assertions::assert_has_outbound(effects, |c| matches!(c, Outbound::Detach { .. }));
            })
            .run();
    }

    #[test]
    fn toggle_publishes_flipped_record() {
        ReducerTest::new(ItemReducer::new())
            .with_env(())
            .given_state(ItemState::viewing(milk()))
            .when_action(ItemAction::Toggle)
            .when_action(ItemAction::Toggle)
            .then_state(|state| assert!(!state.todo.is_completed()))
            .then_effects(|effects| {
                assertions::assert_publishes(effects, attr::TODO, &milk().to_value());
            })
            .run();
    }

    #[test]
    fn delete_emits_on_the_handle() {
        ReducerTest::new(ItemReducer::new())
            .with_env(())
            .given_state(ItemState::viewing(milk()))
            .when_action(ItemAction::Delete)
            .then_effects(|effects| assertions::assert_emits(effects, "delete"))
            .run();
    }

    #[test]
    fn materialize_shows_the_record() {
        let mut graph = Graph::new();
        let todo = milk().with_completed(true);

        let handle = materialize(&mut graph, &todo).unwrap();

        assert_eq!(graph.presentation(&handle, attr::LABEL), Some(&Value::from("Buy milk")));
        assert_eq!(graph.presentation(&handle, attr::COMPLETED), Some(&Value::from(true)));
        assert_eq!(
            graph.model(&editor_of(&handle), attr::VALUE),
            Some(&Value::from("Buy milk"))
        );
        assert_eq!(
            materialize(&mut graph, &todo),
            Err(ConvergenceError::DuplicateEntity(handle))
        );
    }

    #[test]
    fn blank_record_at_creation_is_kept() {
        let mut graph = Graph::new();
        let handle = materialize(&mut graph, &milk().with_title("")).unwrap();
        assert!(graph.contains(&handle));
        assert_eq!(graph.presentation(&handle, attr::LABEL), Some(&Value::from("")));
    }

    #[test]
    fn edit_cycle_through_signals() {
        let mut graph = Graph::new();
        let handle = materialize(&mut graph, &milk()).unwrap();
        let editor = editor_of(&handle);

        graph.emit(&handle, &TodoSignal::Edit, None).unwrap();
        graph
            .emit(&editor, &TodoSignal::Draft, Some(Value::from("Buy bread ")))
            .unwrap();
        assert_eq!(ItemState::load(&graph, &handle).unwrap().draft, "Buy bread ");

        graph.emit(&editor, &TodoSignal::CommitEdit, None).unwrap();

        let state = ItemState::load(&graph, &handle).unwrap();
        assert!(!state.editing);
        assert_eq!(state.todo.title(), "Buy bread");
        assert_eq!(graph.presentation(&handle, attr::LABEL), Some(&Value::from("Buy bread")));
    }

    #[test]
    fn draft_without_text_is_rejected() {
        let mut graph = Graph::new();
        let handle = materialize(&mut graph, &milk()).unwrap();
        graph.emit(&handle, &TodoSignal::Edit, None).unwrap();

        let result = graph.emit(&editor_of(&handle), &TodoSignal::Draft, None);

        assert!(matches!(result, Err(ConvergenceError::InvalidPayload { signal: "draft", .. })));
    }

    #[test]
    fn renaming_to_blank_emits_delete() {
        let mut graph = Graph::new();
        let handle = materialize(&mut graph, &milk()).unwrap();
        let deleted = std::rc::Rc::new(std::cell::Cell::new(false));
        let flag = std::rc::Rc::clone(&deleted);
        graph
            .watch_signal(
                &handle,
                &handle,
                &TodoSignal::Delete,
                WatchOptions::default(),
                move |_, _| {
                    flag.set(true);
                    Ok(())
                },
            )
            .unwrap();

        graph.emit(&handle, &TodoSignal::Edit, None).unwrap();
        graph
            .emit(&editor_of(&handle), &TodoSignal::Draft, Some(Value::from("   ")))
            .unwrap();
        graph.emit(&editor_of(&handle), &TodoSignal::CommitEdit, None).unwrap();

        assert!(deleted.get());
    }
}
