//! # Convergent Testing
//!
//! Testing utilities and helpers for the Convergent reactive graph.
//!
//! This crate provides:
//! - Mock implementations of the renderer, storage and id traits
//! - The fluent [`ReducerTest`] Given-When-Then harness
//! - Assertion helpers for effects
//! - Property-based testing strategies
//!
//! ## Example
//!
//! ```ignore
//! use convergent_testing::mocks::{MemoryStorage, RecordingRenderer};
//! use convergent_runtime::Runtime;
//!
//! #[test]
//! fn renders_after_toggle() {
//!     let renderer = RecordingRenderer::new();
//!     let mut runtime = Runtime::new(renderer.clone(), MemoryStorage::new());
//!     // ... mount and dispatch ...
//!     assert!(renderer.last_children(&list).is_some());
//! }
//! ```

pub mod reducer_test;

pub use reducer_test::{ReducerTest, assertions};

/// Mock implementations of Environment traits
///
/// Every mock that records something hands out cheap clones sharing the
/// same buffer, so a test can keep one clone while the runtime owns another.
pub mod mocks {
    use convergent_core::attribute::EntityId;
    use convergent_core::effect::Outbound;
    use convergent_core::environment::{IdGenerator, Renderer, Storage};
    use convergent_core::error::StorageError;
    use convergent_core::value::Value;
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;
    use std::rc::Rc;

    /// Renderer that records every command it receives
    ///
    /// # Example
    ///
    /// ```
    /// use convergent_core::attribute::EntityId;
    /// use convergent_core::effect::Outbound;
    /// use convergent_core::environment::Renderer;
    /// use convergent_testing::mocks::RecordingRenderer;
    ///
    /// let recorder = RecordingRenderer::new();
    /// let mut handle = recorder.clone();
    /// handle.apply(Outbound::SetTitle("TODOMVC-all".into()));
    /// assert_eq!(recorder.titles(), vec!["TODOMVC-all".to_string()]);
    /// ```
    #[derive(Debug, Clone, Default)]
    pub struct RecordingRenderer {
        commands: Rc<RefCell<Vec<Outbound>>>,
    }

    impl RecordingRenderer {
        /// Create an empty recorder
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Every command received so far
        #[must_use]
        pub fn commands(&self) -> Vec<Outbound> {
            self.commands.borrow().clone()
        }

        /// Forget recorded commands
        pub fn clear(&self) {
            self.commands.borrow_mut().clear();
        }

        /// Number of `SetChildren` commands for a container
        #[must_use]
        pub fn render_passes(&self, container: &EntityId) -> usize {
            self.commands
                .borrow()
                .iter()
                .filter(|c| {
                    matches!(
                        c,
                        Outbound::SetChildren { container: target, .. } if target == container
                    )
                })
                .count()
        }

        /// Children of the most recent `SetChildren` for a container
        #[must_use]
        pub fn last_children(&self, container: &EntityId) -> Option<Vec<EntityId>> {
            self.commands.borrow().iter().rev().find_map(|c| match c {
                Outbound::SetChildren {
                    container: target,
                    children,
                } if target == container => Some(children.clone()),
                _ => None,
            })
        }

        /// Window titles in the order they were set
        #[must_use]
        pub fn titles(&self) -> Vec<String> {
            self.commands
                .borrow()
                .iter()
                .filter_map(|c| match c {
                    Outbound::SetTitle(title) => Some(title.clone()),
                    _ => None,
                })
                .collect()
        }

        /// Most recent projected value of a presentation attribute
        #[must_use]
        pub fn projected(&self, entity: &EntityId, name: &str) -> Option<Value> {
            self.commands.borrow().iter().rev().find_map(|c| match c {
                Outbound::Project {
                    entity: target,
                    name: projected,
                    value,
                } if target == entity && *projected == name => Some(value.clone()),
                _ => None,
            })
        }

        /// Whether a command equal to `command` was received
        #[must_use]
        pub fn received(&self, command: &Outbound) -> bool {
            self.commands.borrow().iter().any(|c| c == command)
        }
    }

    impl Renderer for RecordingRenderer {
        fn apply(&mut self, command: Outbound) {
            self.commands.borrow_mut().push(command);
        }
    }

    /// Renderer that discards everything
    #[derive(Debug, Clone, Copy, Default)]
    pub struct NullRenderer;

    impl Renderer for NullRenderer {
        fn apply(&mut self, _command: Outbound) {}
    }

    /// In-memory storage keyed by `entity/name`
    #[derive(Debug, Clone, Default)]
    pub struct MemoryStorage {
        slots: Rc<RefCell<HashMap<String, Value>>>,
        saves: Rc<Cell<usize>>,
    }

    impl MemoryStorage {
        /// Create empty storage
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Seed a value as if saved by a previous session
        #[must_use]
        pub fn with_entry(self, entity: &str, name: &str, value: Value) -> Self {
            self.slots
                .borrow_mut()
                .insert(storage_key(&EntityId::new(entity), name), value);
            self
        }

        /// Currently stored value
        #[must_use]
        pub fn get(&self, entity: &EntityId, name: &str) -> Option<Value> {
            self.slots.borrow().get(&storage_key(entity, name)).cloned()
        }

        /// Number of successful saves
        #[must_use]
        pub fn save_count(&self) -> usize {
            self.saves.get()
        }
    }

    impl Storage for MemoryStorage {
        fn load(&self, entity: &EntityId, name: &str) -> Result<Option<Value>, StorageError> {
            Ok(self.get(entity, name))
        }

        fn save(
            &mut self,
            entity: &EntityId,
            name: &str,
            value: &Value,
        ) -> Result<(), StorageError> {
            self.slots
                .borrow_mut()
                .insert(storage_key(entity, name), value.clone());
            self.saves.set(self.saves.get() + 1);
            Ok(())
        }
    }

    /// Storage whose every operation fails
    #[derive(Debug, Clone, Copy, Default)]
    pub struct FailingStorage;

    impl Storage for FailingStorage {
        fn load(&self, entity: &EntityId, name: &str) -> Result<Option<Value>, StorageError> {
            Err(StorageError::ReadFailed {
                key: storage_key(entity, name),
                reason: "medium unavailable".into(),
            })
        }

        fn save(
            &mut self,
            entity: &EntityId,
            name: &str,
            _value: &Value,
        ) -> Result<(), StorageError> {
            Err(StorageError::WriteFailed {
                key: storage_key(entity, name),
                reason: "medium unavailable".into(),
            })
        }
    }

    fn storage_key(entity: &EntityId, name: &str) -> String {
        format!("{entity}/{name}")
    }

    /// Predictable ids: `todo1`, `todo2`, ...
    #[derive(Debug, Default)]
    pub struct SequentialIds {
        prefix: &'static str,
        next: Cell<u64>,
    }

    impl SequentialIds {
        /// Create a generator with the given prefix
        #[must_use]
        pub const fn new(prefix: &'static str) -> Self {
            Self {
                prefix,
                next: Cell::new(0),
            }
        }
    }

    impl IdGenerator for SequentialIds {
        fn next_id(&self) -> String {
            let n = self.next.get() + 1;
            self.next.set(n);
            format!("{}{n}", self.prefix)
        }
    }
}

/// Test helpers and utilities
pub mod helpers {
    /// Install a test-friendly tracing subscriber once per process
    ///
    /// Honours `RUST_LOG`; output goes through the test harness capture.
    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use convergent_core::value::Value;
    use proptest::prelude::*;

    /// Arbitrary dynamic values, nested up to three levels
    pub fn arb_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Int),
            "[a-z]{0,8}".prop_map(Value::Text),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4)
                    .prop_map(|items| Value::List(items.into_iter().collect())),
                prop::collection::btree_map("[a-z]{1,4}", inner, 0..4)
                    .prop_map(|fields| Value::Object(fields.into_iter().collect())),
            ]
        })
    }

    /// Titles a user could type, with surrounding whitespace but never blank
    pub fn arb_title() -> impl Strategy<Value = String> {
        (" {0,2}", "[A-Za-z0-9][A-Za-z0-9 ]{0,15}", " {0,2}")
            .prop_map(|(lead, body, trail)| format!("{lead}{body}{trail}"))
    }

    /// Whitespace-only input
    pub fn arb_blank() -> impl Strategy<Value = String> {
        "[ \t]{0,6}"
    }

    /// Completed flags for a collection of up to `max` items
    pub fn arb_flags(max: usize) -> impl Strategy<Value = Vec<bool>> {
        prop::collection::vec(any::<bool>(), 0..=max)
    }
}

#[cfg(test)]
mod tests {
    use super::mocks::{MemoryStorage, SequentialIds};
    use convergent_core::attribute::EntityId;
    use convergent_core::environment::{IdGenerator, Storage};
    use convergent_core::value::Value;

    #[test]
    fn sequential_ids_count_up() {
        let ids = SequentialIds::new("todo");
        assert_eq!(ids.next_id(), "todo1");
        assert_eq!(ids.next_id(), "todo2");
    }

    #[test]
    fn memory_storage_clones_share_slots() {
        let storage = MemoryStorage::new();
        let mut writer = storage.clone();
        let list = EntityId::new("list");

        writer.save(&list, "todoslist", &Value::from(true)).unwrap();

        assert_eq!(storage.load(&list, "todoslist").unwrap(), Some(Value::from(true)));
        assert_eq!(storage.save_count(), 1);
    }
}
