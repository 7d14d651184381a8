//! The mounted TodoMVC page.
//!
//! [`TodoApp::mount`] builds the page entities and their watchers inside one
//! stimulus, restores persisted state and activates the `all` view. After
//! that every user interaction is one method call, run to convergence by the
//! [`Runtime`]; a contract violation rolls the whole interaction back.

use crate::collection::TodoCollection;
use crate::environment::TodoEnvironment;
use crate::filter::{self, Filter};
use crate::input;
use crate::item::ItemState;
use crate::list::{self, ListAction};
use crate::render::{self, collection_of};
use crate::types::{AppEntities, Todo, TodoId, TodoSignal, attr, editor_of, kind};
use convergent_core::attribute::{AttributeKey, EntityId};
use convergent_core::environment::IdGenerator;
use convergent_core::error::ConvergenceError;
use convergent_core::graph::{Graph, Mutation, WatchOptions};
use convergent_core::value::Value;
use convergent_runtime::{HealthCheck, Runtime, RuntimeError, RuntimeStats};

/// Draws allowed before a new todo gives up on finding an unused id
const MAX_ID_DRAWS: usize = 64;

/// Values read from storage before mounting
#[derive(Debug, Default)]
struct Saved {
    todos: Option<Value>,
    checked: Option<Value>,
}

/// A mounted TodoMVC application
pub struct TodoApp {
    runtime: Runtime,
    env: TodoEnvironment,
    entities: AppEntities,
}

impl std::fmt::Debug for TodoApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TodoApp")
            .field("runtime", &self.runtime)
            .field("env", &self.env)
            .finish_non_exhaustive()
    }
}

impl TodoApp {
    /// Mounts the application on `runtime`
    ///
    /// With persistence enabled, the saved collection is restored; an
    /// unreadable medium starts empty, a malformed saved collection fails.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Aborted`] if mounting violates a contract,
    /// for example a malformed saved collection.
    #[tracing::instrument(skip_all, name = "mount")]
    pub fn mount(mut runtime: Runtime, env: TodoEnvironment) -> Result<Self, RuntimeError> {
        let entities = AppEntities::default();
        let saved = if env.config.persist {
            load_saved(&runtime, &entities)
        } else {
            Saved::default()
        };

        runtime.dispatch("mount", |graph| {
            create_entities(graph, &entities)?;
            list::mount(graph, &entities.list)?;
            filter::mount(graph, &entities.list)?;
            render::mount(graph, &entities.list)?;

            if let Some(checked) = saved.checked {
                let checked = Value::from(checked.as_bool()?);
                graph.publish(&entities.toggle_all, attr::CHECKED, checked)?;
            }
            bind_app_watchers(graph, &entities, &env)?;
            filter::publish_links(graph, &entities.list, &env.routes)?;
            if let Some(todos) = saved.todos {
                let todos = TodoCollection::from_value(&todos)?;
                tracing::info!(restored = todos.len(), "Restoring saved todos");
                graph.publish(&entities.list, attr::TODOS_LIST, todos.to_value())?;
            }

            if env.config.persist {
                graph.mark_persistent(&entities.list)?;
                graph.mark_persistent(&entities.toggle_all)?;
            }
            filter::activate(graph, &entities.list, Filter::All, &env.config.title_prefix)
        })?;

        tracing::info!(persist = env.config.persist, "Application mounted");
        Ok(Self {
            runtime,
            env,
            entities,
        })
    }

    // ===== Stimuli =====

    /// Records text typed into the new-todo field
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Aborted`] if the stimulus violates a contract.
    pub fn type_new_todo(&mut self, text: &str) -> Result<(), RuntimeError> {
        let field = &self.entities.input;
        self.runtime
            .dispatch("type_new_todo", |graph| input::change(graph, field, text))
    }

    /// Submits the new-todo field; returns the id of the created todo
    ///
    /// Blank text creates nothing.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Aborted`] if the stimulus violates a contract.
    pub fn submit_new_todo(&mut self, text: &str) -> Result<Option<TodoId>, RuntimeError> {
        let entities = &self.entities;
        self.runtime.dispatch("submit_new_todo", |graph| {
            let before = collection_of(graph, &entities.list)?.len();
            input::submit(graph, &entities.input, text)?;
            let after = collection_of(graph, &entities.list)?;
            Ok(if after.len() > before {
                after.iter().last().map(|todo| todo.id().clone())
            } else {
                None
            })
        })
    }

    /// Clicks the completion checkbox of a todo
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Aborted`] if the todo has no handle.
    pub fn toggle(&mut self, id: &TodoId) -> Result<(), RuntimeError> {
        let handle = id.entity();
        self.runtime
            .dispatch("toggle", |graph| graph.emit(&handle, &TodoSignal::Toggle, None))
    }

    /// Clicks the delete button of a todo
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Aborted`] if the todo has no handle.
    pub fn delete(&mut self, id: &TodoId) -> Result<(), RuntimeError> {
        let handle = id.entity();
        self.runtime
            .dispatch("delete", |graph| graph.emit(&handle, &TodoSignal::Delete, None))
    }

    /// Double-clicks the label of a todo
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Aborted`] if the todo has no handle.
    pub fn begin_edit(&mut self, id: &TodoId) -> Result<(), RuntimeError> {
        let handle = id.entity();
        self.runtime
            .dispatch("begin_edit", |graph| graph.emit(&handle, &TodoSignal::Edit, None))
    }

    /// Types into the editor of a todo
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Aborted`] if the todo has no handle.
    pub fn type_draft(&mut self, id: &TodoId, text: &str) -> Result<(), RuntimeError> {
        let editor = editor_of(&id.entity());
        self.runtime.dispatch("type_draft", |graph| {
            graph.emit(&editor, &TodoSignal::Draft, Some(Value::from(text)))
        })
    }

    /// Presses Enter in, or leaves, the editor of a todo
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Aborted`] if the todo has no handle.
    pub fn commit_edit(&mut self, id: &TodoId) -> Result<(), RuntimeError> {
        let editor = editor_of(&id.entity());
        self.runtime
            .dispatch("commit_edit", |graph| graph.emit(&editor, &TodoSignal::CommitEdit, None))
    }

    /// Presses Escape in the editor of a todo
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Aborted`] if the todo has no handle.
    pub fn cancel_edit(&mut self, id: &TodoId) -> Result<(), RuntimeError> {
        let editor = editor_of(&id.entity());
        self.runtime
            .dispatch("cancel_edit", |graph| graph.emit(&editor, &TodoSignal::CancelEdit, None))
    }

    /// Clicks the toggle-all checkbox
    ///
    /// Ignored while the list is empty, where the checkbox is hidden.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Aborted`] if the stimulus violates a contract.
    pub fn toggle_all(&mut self) -> Result<(), RuntimeError> {
        let entities = &self.entities;
        self.runtime.dispatch("toggle_all", |graph| {
            if collection_of(graph, &entities.list)?.is_empty() {
                tracing::trace!("Toggle-all on empty list ignored");
                return Ok(());
            }
            let checked = !read_flag(graph, &entities.toggle_all, attr::CHECKED)?;
            graph.publish(&entities.toggle_all, attr::CHECKED, Value::from(checked))?;
            graph.emit(&entities.toggle_all, &TodoSignal::ToggleAll, Some(Value::from(checked)))
        })
    }

    /// Clicks "Clear completed"
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Aborted`] if the stimulus violates a contract.
    pub fn clear_completed(&mut self) -> Result<(), RuntimeError> {
        let clear = &self.entities.clear;
        self.runtime
            .dispatch("clear_completed", |graph| graph.emit(clear, &TodoSignal::Clear, None))
    }

    /// Activates a filter view by label; unknown labels activate `all`
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Aborted`] if the stimulus violates a contract.
    pub fn activate_view(&mut self, label: &str) -> Result<Filter, RuntimeError> {
        let selected = Filter::from_label(label).unwrap_or_default();
        self.show(selected)?;
        Ok(selected)
    }

    /// Follows a route; the root and unknown paths activate `all`
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Aborted`] if the stimulus violates a contract.
    pub fn navigate(&mut self, path: &str) -> Result<Filter, RuntimeError> {
        let selected = self.env.routes.resolve(path).unwrap_or_default();
        tracing::debug!(path, link = %self.env.routes.link(selected), "Navigating");
        self.show(selected)?;
        Ok(selected)
    }

    fn show(&mut self, selected: Filter) -> Result<(), RuntimeError> {
        let list = &self.entities.list;
        let prefix = &self.env.config.title_prefix;
        self.runtime
            .dispatch("activate_view", |graph| filter::activate(graph, list, selected, prefix))
    }

    // ===== Queries =====

    /// The collection
    #[must_use]
    pub fn todos(&self) -> TodoCollection {
        collection_of(self.graph(), &self.entities.list).unwrap_or_default()
    }

    /// Ids of the visible todos, in display order
    #[must_use]
    pub fn visible_ids(&self) -> Vec<TodoId> {
        self.graph()
            .presentation(&self.entities.list, attr::CHILDREN)
            .and_then(|children| children.as_list().ok())
            .map(|children| {
                children
                    .iter()
                    .filter_map(|child| child.as_text().ok())
                    .map(TodoId::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Titles of the visible todos, in display order
    #[must_use]
    pub fn visible_titles(&self) -> Vec<String> {
        let todos = self.todos();
        self.visible_ids()
            .iter()
            .filter_map(|id| todos.get(id))
            .map(|todo| todo.title().to_string())
            .collect()
    }

    /// Number shown by the items-left counter
    #[must_use]
    pub fn items_left(&self) -> usize {
        self.graph()
            .presentation(&self.entities.counter, attr::COUNT)
            .and_then(|count| count.as_int().ok())
            .and_then(|count| usize::try_from(count).ok())
            .unwrap_or(0)
    }

    /// Whether the toggle-all checkbox is checked
    #[must_use]
    pub fn toggle_all_checked(&self) -> bool {
        self.flag(&self.entities.toggle_all, attr::CHECKED)
    }

    /// Whether the footer is shown
    #[must_use]
    pub fn footer_visible(&self) -> bool {
        self.flag(&self.entities.footer, attr::VISIBLE)
    }

    /// Whether the main section is shown
    #[must_use]
    pub fn main_visible(&self) -> bool {
        self.flag(&self.entities.main, attr::VISIBLE)
    }

    /// Whether "Clear completed" is shown
    #[must_use]
    pub fn clear_visible(&self) -> bool {
        self.flag(&self.entities.clear, attr::VISIBLE)
    }

    /// Active filter
    #[must_use]
    pub fn filter(&self) -> Filter {
        Filter::from_value(self.graph().presentation(&self.entities.list, attr::FILTER))
    }

    /// Filter links as published for the footer
    #[must_use]
    pub fn filter_links(&self) -> Option<&Value> {
        self.graph()
            .presentation(&self.entities.filters, attr::FILTERS_LIST)
    }

    /// Whether the editor of a todo is open
    #[must_use]
    pub fn is_editing(&self, id: &TodoId) -> bool {
        self.item(id).is_some_and(|state| state.editing)
    }

    /// Editor text of a todo while editing
    #[must_use]
    pub fn draft(&self, id: &TodoId) -> Option<String> {
        self.item(id)
            .filter(|state| state.editing)
            .map(|state| state.draft)
    }

    /// Whether a handle exists for a todo
    #[must_use]
    pub fn has_handle(&self, id: &TodoId) -> bool {
        self.graph().contains(&id.entity())
    }

    /// Number of live item handles
    #[must_use]
    pub fn handle_count(&self) -> usize {
        self.graph().count_of(kind::ITEM)
    }

    /// Well-known entities of the page
    #[must_use]
    pub const fn entities(&self) -> &AppEntities {
        &self.entities
    }

    /// The underlying graph
    #[must_use]
    pub const fn graph(&self) -> &Graph {
        self.runtime.graph()
    }

    /// Runtime counters
    #[must_use]
    pub const fn stats(&self) -> RuntimeStats {
        self.runtime.stats()
    }

    /// Runtime health
    #[must_use]
    pub fn health(&self) -> HealthCheck {
        self.runtime.health()
    }

    fn item(&self, id: &TodoId) -> Option<ItemState> {
        ItemState::load(self.graph(), &id.entity()).ok()
    }

    fn flag(&self, entity: &EntityId, name: &'static str) -> bool {
        read_flag(self.graph(), entity, name).unwrap_or(false)
    }
}

fn load_saved(runtime: &Runtime, entities: &AppEntities) -> Saved {
    let mut saved = Saved::default();
    match runtime.load(&entities.list, attr::TODOS_LIST) {
        Ok(todos) => saved.todos = todos,
        Err(error) => tracing::warn!(%error, "Saved todos unreadable, starting empty"),
    }
    match runtime.load(&entities.toggle_all, attr::CHECKED) {
        Ok(checked) => saved.checked = checked,
        Err(error) => tracing::warn!(%error, "Saved toggle-all state unreadable"),
    }
    saved
}

fn create_entities(graph: &mut Graph, entities: &AppEntities) -> Result<(), ConvergenceError> {
    let app = graph.create_entity(entities.app.clone(), kind::SECTION)?;
    graph.create_child(&app, entities.input.clone(), kind::INPUT)?;
    let main = graph.create_child(&app, entities.main.clone(), kind::SECTION)?;
    graph.create_child(&main, entities.toggle_all.clone(), kind::CHECKBOX)?;
    graph.create_child(&main, entities.list.clone(), kind::LIST)?;
    let footer = graph.create_child(&app, entities.footer.clone(), kind::SECTION)?;
    graph.create_child(&footer, entities.counter.clone(), kind::COUNTER)?;
    graph.create_child(&footer, entities.filters.clone(), kind::FILTERS)?;
    graph.create_child(&footer, entities.clear.clone(), kind::BUTTON)?;
    Ok(())
}

fn read_flag(
    graph: &Graph,
    entity: &EntityId,
    name: &'static str,
) -> Result<bool, ConvergenceError> {
    graph
        .presentation(entity, name)
        .map(Value::as_bool)
        .transpose()
        .map(|flag| flag.unwrap_or(false))
}

fn set_flag(
    graph: &mut Graph,
    entity: &EntityId,
    name: &'static str,
    on: bool,
) -> Result<(), ConvergenceError> {
    graph.set(AttributeKey::presentation(entity.clone(), name), Value::from(on))?;
    Ok(())
}

/// Draws ids until one names neither a live entity nor a stored record
///
/// A seeded generator restarts its sequence on every mount, so its first ids
/// collide with restored todos.
fn fresh_id(
    graph: &Graph,
    list: &EntityId,
    ids: &dyn IdGenerator,
) -> Result<TodoId, ConvergenceError> {
    let todos = collection_of(graph, list)?;
    let taken = |id: &TodoId| graph.contains(&id.entity()) || todos.position(id).is_some();

    let mut id = TodoId::new(ids.next_id());
    for _ in 1..MAX_ID_DRAWS {
        if !taken(&id) {
            return Ok(id);
        }
        tracing::debug!(todo = %id, "Generated id already in use, drawing again");
        id = TodoId::new(ids.next_id());
    }
    if taken(&id) {
        return Err(ConvergenceError::DuplicateEntity(id.entity()));
    }
    Ok(id)
}

fn collection_in(mutation: &Mutation) -> Result<TodoCollection, ConvergenceError> {
    mutation
        .value()
        .map_or_else(|| Ok(TodoCollection::new()), TodoCollection::from_value)
}

fn payload<'a>(mutation: &'a Mutation, expected: &str) -> Result<&'a Value, ConvergenceError> {
    mutation
        .value()
        .ok_or_else(|| ConvergenceError::InvalidPayload {
            signal: mutation.name(),
            reason: format!("missing {expected}"),
        })
}

/// Watchers that tie the page sections to the collection
fn bind_app_watchers(
    graph: &mut Graph,
    entities: &AppEntities,
    env: &TodoEnvironment,
) -> Result<(), ConvergenceError> {
    let app = &entities.app;

    let list = entities.list.clone();
    let ids = std::rc::Rc::clone(&env.ids);
    graph.watch_signal(
        app,
        &entities.input,
        &TodoSignal::NewTodo,
        WatchOptions::default(),
        move |graph, mutation| {
            let title = payload(mutation, "title")?.as_text()?;
            if title.is_empty() {
                return Err(ConvergenceError::InvalidPayload {
                    signal: mutation.name(),
                    reason: "empty title".into(),
                });
            }
            let todo = Todo::new(fresh_id(graph, &list, ids.as_ref())?, title);
            tracing::debug!(todo = %todo.id(), "New todo");
            list::run(graph, &list, ListAction::Append(todo))
        },
    )?;

    let list = entities.list.clone();
    graph.watch_signal(
        app,
        &entities.clear,
        &TodoSignal::Clear,
        WatchOptions::default(),
        move |graph, _| list::run(graph, &list, ListAction::ClearCompleted),
    )?;

    let list = entities.list.clone();
    graph.watch_signal(
        app,
        &entities.toggle_all,
        &TodoSignal::ToggleAll,
        WatchOptions::default(),
        move |graph, mutation| {
            let completed = payload(mutation, "checked state")?.as_bool()?;
            list::run(graph, &list, ListAction::ToggleAll(completed))
        },
    )?;

    let sections = entities.clone();
    graph.watch(
        app,
        AttributeKey::model(entities.list.clone(), attr::TODOS_LIST),
        WatchOptions::eager(),
        move |graph, mutation| {
            let todos = collection_in(mutation)?;
            graph.set(
                AttributeKey::presentation(sections.counter.clone(), attr::COUNT),
                Value::from(todos.items_left()),
            )?;
            set_flag(graph, &sections.footer, attr::VISIBLE, !todos.is_empty())?;
            set_flag(graph, &sections.clear, attr::VISIBLE, todos.completed_count() > 0)?;
            graph.publish(&sections.toggle_all, attr::CHECKED, Value::from(todos.all_complete()))?;
            Ok(())
        },
    )?;

    let list = entities.list.clone();
    graph.watch_signal(
        &entities.footer,
        &entities.footer,
        &TodoSignal::Mounted,
        WatchOptions::eager(),
        move |graph, mutation| {
            let empty = collection_of(graph, &list)?.is_empty();
            set_flag(graph, &mutation.origin, attr::VISIBLE, !empty)
        },
    )?;

    let filters = entities.filters.clone();
    graph.watch(
        &entities.filters,
        AttributeKey::model(entities.list.clone(), attr::FILTERS_LIST),
        WatchOptions::eager(),
        move |graph, mutation| match mutation.value() {
            Some(links) => {
                graph.set(
                    AttributeKey::presentation(filters.clone(), attr::FILTERS_LIST),
                    links.clone(),
                )?;
                Ok(())
            },
            None => Ok(()),
        },
    )?;

    let main = entities.main.clone();
    graph.watch_signal(
        &entities.main,
        &entities.list,
        &TodoSignal::RenderList,
        WatchOptions::eager(),
        move |graph, mutation| {
            let empty = collection_of(graph, &mutation.origin)?.is_empty();
            set_flag(graph, &main, attr::VISIBLE, !empty)
        },
    )?;

    Ok(())
}
