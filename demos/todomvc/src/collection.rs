//! Ordered, copy-on-write collection of todo records.
//!
//! Every operation returns a new collection; earlier values (held by the
//! graph's attribute slots or a rollback snapshot) never observe the change.
//! Batch edits go through [`CollectionDraft`], which accumulates changes and
//! yields a single new collection on [`CollectionDraft::commit`].

use crate::types::{Todo, TodoId};
use convergent_core::error::ConvergenceError;
use convergent_core::value::Value;
use im::Vector;

/// Immutable ordered sequence of todos
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TodoCollection {
    items: Vector<Todo>,
}

impl TodoCollection {
    /// Creates an empty collection
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether there are no records
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterates over `(index, record)` pairs in order
    pub fn range(&self) -> impl Iterator<Item = (usize, &Todo)> {
        self.items.iter().enumerate()
    }

    /// Iterates over records in order
    pub fn iter(&self) -> impl Iterator<Item = &Todo> {
        self.items.iter()
    }

    /// Index of the record with the given id
    #[must_use]
    pub fn position(&self, id: &TodoId) -> Option<usize> {
        self.items.iter().position(|todo| todo.id() == id)
    }

    /// Record with the given id
    #[must_use]
    pub fn get(&self, id: &TodoId) -> Option<&Todo> {
        self.items.iter().find(|todo| todo.id() == id)
    }

    /// Copy with `todo` added at the end
    #[must_use]
    pub fn append(&self, todo: Todo) -> Self {
        let mut items = self.items.clone();
        items.push_back(todo);
        Self { items }
    }

    /// Copy with the record at `index` replaced
    ///
    /// # Errors
    ///
    /// Returns [`ConvergenceError::IndexOutOfRange`] if `index >= len()`.
    pub fn replace_at(&self, index: usize, todo: Todo) -> Result<Self, ConvergenceError> {
        let len = self.items.len();
        if index >= len {
            return Err(ConvergenceError::IndexOutOfRange { index, len });
        }
        Ok(Self {
            items: self.items.update(index, todo),
        })
    }

    /// Copy with the record carrying `todo`'s id replaced; `None` if absent
    #[must_use]
    pub fn replace(&self, todo: Todo) -> Option<Self> {
        let index = self.position(todo.id())?;
        self.replace_at(index, todo).ok()
    }

    /// Copy without the records matching `predicate`
    #[must_use]
    pub fn remove_where<F>(&self, predicate: F) -> Self
    where
        F: Fn(&Todo) -> bool,
    {
        let mut draft = self.edit();
        draft.retain(|todo| !predicate(todo));
        draft.commit()
    }

    /// Number of active records
    #[must_use]
    pub fn items_left(&self) -> usize {
        self.items.iter().filter(|todo| !todo.is_completed()).count()
    }

    /// Number of completed records
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.items.len() - self.items_left()
    }

    /// Whether the collection is non-empty and every record is completed
    #[must_use]
    pub fn all_complete(&self) -> bool {
        !self.items.is_empty() && self.items_left() == 0
    }

    /// Starts a batch edit
    #[must_use]
    pub fn edit(&self) -> CollectionDraft {
        CollectionDraft {
            items: self.items.clone(),
        }
    }

    /// Encodes the collection as a list of records
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::List(self.items.iter().map(Todo::to_value).collect())
    }

    /// Decodes a list of records
    ///
    /// # Errors
    ///
    /// Returns [`ConvergenceError::MalformedValue`] or
    /// [`ConvergenceError::MissingField`] if the value is not a list of
    /// well-formed records.
    pub fn from_value(value: &Value) -> Result<Self, ConvergenceError> {
        let items = value
            .as_list()?
            .iter()
            .map(Todo::from_value)
            .collect::<Result<Vector<_>, _>>()?;
        Ok(Self { items })
    }
}

impl FromIterator<Todo> for TodoCollection {
    fn from_iter<I: IntoIterator<Item = Todo>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

/// Mutable builder over a collection snapshot
///
/// The source collection is unaffected until the draft is committed into a
/// new value.
#[derive(Clone, Debug)]
pub struct CollectionDraft {
    items: Vector<Todo>,
}

impl CollectionDraft {
    /// Adds a record at the end
    pub fn push(&mut self, todo: Todo) {
        self.items.push_back(todo);
    }

    /// Replaces the record at `index`
    ///
    /// # Errors
    ///
    /// Returns [`ConvergenceError::IndexOutOfRange`] if `index` is past the end.
    pub fn set(&mut self, index: usize, todo: Todo) -> Result<(), ConvergenceError> {
        let len = self.items.len();
        let slot = self
            .items
            .get_mut(index)
            .ok_or(ConvergenceError::IndexOutOfRange { index, len })?;
        *slot = todo;
        Ok(())
    }

    /// Rewrites every record
    pub fn update_all<F>(&mut self, update: F)
    where
        F: Fn(&Todo) -> Todo,
    {
        for todo in self.items.iter_mut() {
            *todo = update(todo);
        }
    }

    /// Keeps only the records matching `keep`
    pub fn retain<F>(&mut self, keep: F)
    where
        F: Fn(&Todo) -> bool,
    {
        self.items.retain(|todo| keep(todo));
    }

    /// Produces the new collection
    #[must_use]
    pub fn commit(self) -> TodoCollection {
        TodoCollection { items: self.items }
    }
}
