//! Per-entity attribute slots in two namespaces.
//!
//! Every entity owns a `model` namespace (source of truth) and a
//! `presentation` namespace (what the view reads). The store itself never
//! notifies anyone; it reports whether a write changed the slot and leaves
//! propagation to [`Graph`](crate::graph::Graph).

use crate::value::Value;
use im::HashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Identifier of an entity in the graph
///
/// Cheap to clone; ids are shared by every key, binding and command that
/// mentions the entity.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(Arc<str>);

impl EntityId {
    /// Creates an entity id
    #[must_use]
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    /// Returns the id as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derives the id of a child entity, e.g. `abc` → `abc-edit`
    #[must_use]
    pub fn child(&self, suffix: &str) -> Self {
        Self::new(format!("{}-{suffix}", self.0))
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self(Arc::from(id))
    }
}

/// Attribute namespace
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    /// Source of truth
    Model,
    /// UI-facing mirror
    Presentation,
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Model => f.write_str("model"),
            Self::Presentation => f.write_str("presentation"),
        }
    }
}

/// Address of one attribute slot
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttributeKey {
    /// Owning entity
    pub entity: EntityId,
    /// Namespace of the slot
    pub namespace: Namespace,
    /// Attribute name
    pub name: &'static str,
}

impl AttributeKey {
    /// Creates a key
    #[must_use]
    pub const fn new(entity: EntityId, namespace: Namespace, name: &'static str) -> Self {
        Self {
            entity,
            namespace,
            name,
        }
    }

    /// Key in the `model` namespace
    #[must_use]
    pub const fn model(entity: EntityId, name: &'static str) -> Self {
        Self::new(entity, Namespace::Model, name)
    }

    /// Key in the `presentation` namespace
    #[must_use]
    pub const fn presentation(entity: EntityId, name: &'static str) -> Self {
        Self::new(entity, Namespace::Presentation, name)
    }
}

impl fmt::Display for AttributeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.entity, self.namespace, self.name)
    }
}

/// Outcome of a store write
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Write {
    /// The slot already held a structurally equal value
    Unchanged,
    /// The slot changed; carries the previous value if there was one
    Changed {
        /// Value before the write
        old: Option<Value>,
    },
}

/// Last-value-wins key/value slots
///
/// Backed by a persistent map so the whole store can be snapshotted in O(1).
#[derive(Clone, Debug, Default)]
pub struct AttributeStore {
    slots: HashMap<AttributeKey, Value>,
}

impl AttributeStore {
    /// Creates an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a slot
    #[must_use]
    pub fn get(&self, key: &AttributeKey) -> Option<&Value> {
        self.slots.get(key)
    }

    /// Writes a slot, reporting whether its value changed
    pub fn set(&mut self, key: AttributeKey, value: Value) -> Write {
        match self.slots.get(&key) {
            Some(current) if *current == value => Write::Unchanged,
            _ => Write::Changed {
                old: self.slots.insert(key, value),
            },
        }
    }

    /// Drops every slot owned by `entity`, returning how many were removed
    pub fn remove_entity(&mut self, entity: &EntityId) -> usize {
        let before = self.slots.len();
        self.slots.retain(|key, _| key.entity != *entity);
        before - self.slots.len()
    }

    /// Number of occupied slots
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no slot is occupied
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
