//! Domain types for the TodoMVC application.
//!
//! A todo is an immutable record; every change produces a new record that is
//! published back into the graph. The well-known entities of the page and the
//! attribute names they expose are declared here so that every module agrees
//! on them.

use convergent_core::attribute::EntityId;
use convergent_core::error::ConvergenceError;
use convergent_core::value::Value;
use convergent_macros::Signal;
use serde::{Deserialize, Serialize};

/// Identifier of a todo, also used as the id of its item entity
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TodoId(String);

impl TodoId {
    /// Wraps an identifier
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Entity of the item handle rendering this todo
    #[must_use]
    pub fn entity(&self) -> EntityId {
        EntityId::new(&self.0)
    }
}

impl std::fmt::Display for TodoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TodoId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A single todo record
///
/// Records are values: `with_title` and `with_completed` return a modified
/// copy and leave the original untouched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    id: TodoId,
    title: String,
    completed: bool,
}

impl Todo {
    /// Creates an active todo
    #[must_use]
    pub fn new(id: TodoId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            completed: false,
        }
    }

    /// Returns the identifier
    #[must_use]
    pub const fn id(&self) -> &TodoId {
        &self.id
    }

    /// Returns the title
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns whether the todo is done
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        self.completed
    }

    /// Copy with a different title
    #[must_use]
    pub fn with_title(&self, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..self.clone()
        }
    }

    /// Copy with a different completion status
    #[must_use]
    pub fn with_completed(&self, completed: bool) -> Self {
        Self {
            completed,
            ..self.clone()
        }
    }

    /// Encodes the record as `{id, title, completed}`
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::object([
            ("id", Value::from(self.id.as_str())),
            ("title", Value::from(self.title.as_str())),
            ("completed", Value::from(self.completed)),
        ])
    }

    /// Decodes a record; every field is required
    ///
    /// # Errors
    ///
    /// Returns [`ConvergenceError::MissingField`] or
    /// [`ConvergenceError::MalformedValue`] for anything but a well-formed
    /// record.
    pub fn from_value(value: &Value) -> Result<Self, ConvergenceError> {
        Ok(Self {
            id: TodoId::new(value.field("id")?.as_text()?),
            title: value.field("title")?.as_text()?.to_string(),
            completed: value.field("completed")?.as_bool()?,
        })
    }
}

/// Signals raised on the page
#[derive(Signal, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TodoSignal {
    /// Non-empty title submitted from the input field
    #[intent]
    NewTodo,

    /// Completion checkbox of an item clicked
    #[intent]
    Toggle,

    /// Item removal requested
    #[intent]
    Delete,

    /// Item label double-clicked
    #[intent]
    Edit,

    /// Escape pressed in an item editor
    #[intent]
    CancelEdit,

    /// Enter pressed in, or focus lost from, an item editor
    #[intent]
    #[signal(name = "newtitle")]
    CommitEdit,

    /// Text typed into an item editor
    #[intent]
    Draft,

    /// "Clear completed" clicked
    #[intent]
    Clear,

    /// Toggle-all checkbox clicked
    #[intent]
    ToggleAll,

    /// The visible list must be recomputed
    #[internal]
    RenderList,

    /// The footer was attached to the page
    #[internal]
    Mounted,
}

/// Attribute names
pub mod attr {
    /// Collection of todo records, on the list
    pub const TODOS_LIST: &str = "todoslist";
    /// Active filter label, on the list
    pub const FILTER: &str = "filter";
    /// Filter names and links
    pub const FILTERS_LIST: &str = "filterslist";
    /// Ids of the visible item handles, on the list
    pub const CHILDREN: &str = "children";
    /// Todo record, on an item
    pub const TODO: &str = "todo";
    /// Whether an item shows its editor
    pub const EDIT_MODE: &str = "editmode";
    /// Displayed title of an item
    pub const LABEL: &str = "label";
    /// "completed" class of an item
    pub const COMPLETED: &str = "completed";
    /// Text of an input field
    pub const VALUE: &str = "value";
    /// State of a checkbox
    pub const CHECKED: &str = "checked";
    /// Number shown by the counter
    pub const COUNT: &str = "count";
    /// Whether a section is shown
    pub const VISIBLE: &str = "visible";
}

/// Entity kinds
pub mod kind {
    /// Page section
    pub const SECTION: &str = "section";
    /// Text input
    pub const INPUT: &str = "input";
    /// Checkbox
    pub const CHECKBOX: &str = "checkbox";
    /// Todo list container
    pub const LIST: &str = "list";
    /// Items-left counter
    pub const COUNTER: &str = "counter";
    /// Filter links
    pub const FILTERS: &str = "filters";
    /// Button
    pub const BUTTON: &str = "button";
    /// Item handle of one todo
    pub const ITEM: &str = "todo";
    /// Title editor of an item
    pub const EDITOR: &str = "editor";
}

/// Well-known entities of the page
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppEntities {
    /// Application root
    pub app: EntityId,
    /// New-todo input field
    pub input: EntityId,
    /// Main section around the list
    pub main: EntityId,
    /// Toggle-all checkbox
    pub toggle_all: EntityId,
    /// Todo list container
    pub list: EntityId,
    /// Footer
    pub footer: EntityId,
    /// Items-left counter
    pub counter: EntityId,
    /// Filter links
    pub filters: EntityId,
    /// "Clear completed" button
    pub clear: EntityId,
}

impl Default for AppEntities {
    fn default() -> Self {
        Self {
            app: EntityId::new("todoapp"),
            input: EntityId::new("new-todo"),
            main: EntityId::new("main"),
            toggle_all: EntityId::new("toggle-all"),
            list: EntityId::new("todo-list"),
            footer: EntityId::new("footer"),
            counter: EntityId::new("todo-count"),
            filters: EntityId::new("filters"),
            clear: EntityId::new("clear-completed"),
        }
    }
}

/// Editor entity of an item
#[must_use]
pub fn editor_of(item: &EntityId) -> EntityId {
    item.child("edit")
}
