//! # Convergent Core
//!
//! Core traits and types for a synchronous, single-threaded reactive graph.
//!
//! The crate models application state as named attributes on entities. Writes
//! that change a value notify the watchers bound to that attribute, depth-first
//! and in registration order, until the graph converges. Signals carry
//! transient payloads through the same machinery without storing anything.
//!
//! ## Core Concepts
//!
//! - **Value**: Dynamically typed content of an attribute slot
//! - **Attribute**: `(entity, namespace, name)` slot; `model` is the source of
//!   truth, `presentation` is what the view reads
//! - **Signal**: Transient event scoped to an origin entity
//! - **Graph**: Attribute store plus watcher bindings; propagates changes
//! - **Reducer**: Pure function `(State, Action, Environment) → (State, Effects)`
//! - **Effect**: Description of graph operations and outbound commands
//! - **Environment**: Injected dependencies via traits
//!
//! ## Architecture Principles
//!
//! - Functional Core, Imperative Shell
//! - Writes of equal values are no-ops
//! - External side effects are deferred until the graph converges
//! - Cycles and runaway chains are contract violations, not infinite loops
//!
//! ## Example
//!
//! ```
//! use convergent_core::graph::{Graph, WatchOptions};
//! use convergent_core::attribute::{AttributeKey, EntityId, Namespace};
//! use convergent_core::value::Value;
//!
//! # fn main() -> Result<(), convergent_core::error::ConvergenceError> {
//! let mut graph = Graph::new();
//! let counter = graph.create_entity(EntityId::new("counter"), "counter")?;
//!
//! graph.watch(
//!     &counter,
//!     AttributeKey::model(counter.clone(), "count"),
//!     WatchOptions::default(),
//!     |graph, mutation| {
//!         let doubled = mutation.value().map_or(Ok(0), Value::as_int)? * 2;
//!         graph.set(
//!             AttributeKey::presentation(mutation.origin.clone(), "doubled"),
//!             Value::Int(doubled),
//!         )?;
//!         Ok(())
//!     },
//! )?;
//!
//! graph.set(AttributeKey::model(counter.clone(), "count"), Value::Int(21))?;
//! assert_eq!(
//!     graph.get(&AttributeKey::new(counter, Namespace::Presentation, "doubled")),
//!     Some(&Value::Int(42))
//! );
//! # Ok(())
//! # }
//! ```

pub mod attribute;
pub mod error;
pub mod graph;
pub mod signal;
pub mod value;

// Re-export commonly used types
pub use serde::{Deserialize, Serialize};
pub use smallvec::{SmallVec, smallvec};

/// Reducer module - The core trait for state machines
///
/// Reducers are pure functions: `(State, Action, Environment) → (State, Effects)`
///
/// They contain the transition logic of a component and are deterministic and
/// testable without a graph.
pub mod reducer {
    use super::effect::Effect;
    use smallvec::SmallVec;

    /// The Reducer trait - core abstraction for transition logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    ///
    /// # Example
    ///
    /// ```ignore
    /// impl Reducer for ItemReducer {
    ///     type State = ItemState;
    ///     type Action = ItemAction;
    ///     type Environment = ItemEnvironment;
    ///
    ///     fn reduce(
    ///         &self,
    ///         state: &mut ItemState,
    ///         action: ItemAction,
    ///         env: &ItemEnvironment,
    ///     ) -> SmallVec<[Effect; 4]> {
    ///         match action {
    ///             ItemAction::Toggle => smallvec![Effect::Publish { .. }],
    ///             _ => smallvec![Effect::None],
    ///         }
    ///     }
    /// }
    /// ```
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and effects
        ///
        /// This is a pure function that:
        /// 1. Validates the action against the current state
        /// 2. Updates state in place
        /// 3. Returns effect descriptions to be applied to the graph
        ///
        /// # Arguments
        ///
        /// - `state`: Mutable reference to current state
        /// - `action`: The action to process
        /// - `env`: Reference to injected dependencies
        ///
        /// # Returns
        ///
        /// Effects to be applied, in order, by [`Graph::apply`](crate::graph::Graph::apply)
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect; 4]>;
    }
}

/// Effect module - Side effect descriptions
///
/// Effects describe what should happen; the graph executes them. Graph
/// effects run synchronously while the stimulus propagates. [`Outbound`]
/// commands are deferred to the outbox and only reach the renderer or
/// storage after the graph has converged.
pub mod effect {
    use crate::attribute::{AttributeKey, EntityId};
    use crate::signal::Signal;
    use crate::value::Value;

    /// Effect type - describes an operation on the graph
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum Effect {
        /// No-op effect
        None,

        /// Write a single attribute slot
        Write {
            /// Slot to write
            key: AttributeKey,
            /// New value
            value: Value,
        },

        /// Write both namespaces of an attribute atomically
        Publish {
            /// Owning entity
            entity: EntityId,
            /// Attribute name
            name: &'static str,
            /// New value
            value: Value,
        },

        /// Emit a signal
        Emit(Signal),

        /// Destroy an entity and its descendants
        Destroy(EntityId),

        /// Queue a command for the renderer or storage
        Outbound(Outbound),

        /// Run effects in order
        Sequential(Vec<Effect>),
    }

    impl Effect {
        /// Whether this effect does nothing
        #[must_use]
        pub fn is_none(&self) -> bool {
            match self {
                Self::None => true,
                Self::Sequential(effects) => effects.iter().all(Self::is_none),
                _ => false,
            }
        }
    }

    /// Commands for the world outside the graph
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum Outbound {
        /// Replace the visible children of a container
        SetChildren {
            /// Container entity
            container: EntityId,
            /// Children in display order
            children: Vec<EntityId>,
        },

        /// A presentation attribute changed
        Project {
            /// Owning entity
            entity: EntityId,
            /// Attribute name
            name: &'static str,
            /// New value
            value: Value,
        },

        /// Attach a child view under a parent
        Attach {
            /// Parent entity
            parent: EntityId,
            /// Child entity
            child: EntityId,
        },

        /// Detach a child view from its parent
        Detach {
            /// Parent entity
            parent: EntityId,
            /// Child entity
            child: EntityId,
        },

        /// Give input focus to an entity
        Focus(EntityId),

        /// Remove input focus from an entity
        Blur(EntityId),

        /// Discard the view of a destroyed entity
        Remove(EntityId),

        /// Set the window title
        SetTitle(String),

        /// Save a model attribute
        Persist {
            /// Owning entity
            entity: EntityId,
            /// Attribute name
            name: &'static str,
            /// Value to save
            value: Value,
        },
    }

    impl Outbound {
        /// Short label used in logs and metrics
        #[must_use]
        pub const fn kind(&self) -> &'static str {
            match self {
                Self::SetChildren { .. } => "set_children",
                Self::Project { .. } => "project",
                Self::Attach { .. } => "attach",
                Self::Detach { .. } => "detach",
                Self::Focus(_) => "focus",
                Self::Blur(_) => "blur",
                Self::Remove(_) => "remove",
                Self::SetTitle(_) => "set_title",
                Self::Persist { .. } => "persist",
            }
        }

        /// Target this command overwrites
        ///
        /// Two commands with the same slot are last-value-wins: only the later
        /// one needs to reach the outside world. Commands without a slot
        /// (focus, attach, remove...) are order-sensitive and never merged.
        #[must_use]
        pub fn slot(&self) -> Option<OutboundSlot> {
            match self {
                Self::Project { entity, name, .. } => Some(OutboundSlot::Attribute(
                    AttributeKey::presentation(entity.clone(), name),
                )),
                Self::Persist { entity, name, .. } => Some(OutboundSlot::Attribute(
                    AttributeKey::model(entity.clone(), name),
                )),
                Self::SetChildren { container, .. } => {
                    Some(OutboundSlot::Children(container.clone()))
                },
                Self::SetTitle(_) => Some(OutboundSlot::Title),
                _ => None,
            }
        }
    }

    /// What a last-value-wins [`Outbound`] command overwrites
    #[derive(Clone, Debug, PartialEq, Eq, Hash)]
    pub enum OutboundSlot {
        /// A projected or persisted attribute
        Attribute(AttributeKey),
        /// The visible children of a container
        Children(EntityId),
        /// The window title
        Title,
    }
}

/// Environment module - Dependency injection traits
///
/// All external dependencies are abstracted behind traits and injected
/// via the Environment parameter or the runtime.
pub mod environment {
    use crate::attribute::EntityId;
    use crate::effect::Outbound;
    use crate::error::StorageError;
    use crate::value::Value;
    use rand::distributions::Alphanumeric;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::cell::RefCell;

    /// Length of generated ids
    pub const ID_LEN: usize = 16;

    /// `IdGenerator` trait - abstracts id generation for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use convergent_core::environment::{IdGenerator, SeededIds};
    ///
    /// let a = SeededIds::new(7);
    /// let b = SeededIds::new(7);
    /// assert_eq!(a.next_id(), b.next_id());
    /// ```
    pub trait IdGenerator {
        /// Produce a fresh id
        fn next_id(&self) -> String;
    }

    /// Deterministic ids from a seeded generator
    #[derive(Debug)]
    pub struct SeededIds {
        rng: RefCell<StdRng>,
    }

    impl SeededIds {
        /// Creates a generator from a fixed seed
        #[must_use]
        pub fn new(seed: u64) -> Self {
            Self {
                rng: RefCell::new(StdRng::seed_from_u64(seed)),
            }
        }
    }

    impl IdGenerator for SeededIds {
        fn next_id(&self) -> String {
            let mut rng = self.rng.borrow_mut();
            (0..ID_LEN)
                .map(|_| char::from(rng.sample(Alphanumeric)))
                .collect()
        }
    }

    /// Random ids derived from UUID v4
    #[derive(Debug, Default, Clone, Copy)]
    pub struct RandomIds;

    impl IdGenerator for RandomIds {
        fn next_id(&self) -> String {
            let mut id = uuid::Uuid::new_v4().simple().to_string();
            id.truncate(ID_LEN);
            id
        }
    }

    /// Renderer trait - receives deferred view commands after convergence
    pub trait Renderer {
        /// Apply one command
        fn apply(&mut self, command: Outbound);
    }

    /// Storage trait - loads and saves persisted model attributes
    pub trait Storage {
        /// Load a previously saved value
        ///
        /// # Errors
        ///
        /// Returns [`StorageError::ReadFailed`] if the medium cannot be read.
        fn load(&self, entity: &EntityId, name: &str) -> Result<Option<Value>, StorageError>;

        /// Save a value
        ///
        /// # Errors
        ///
        /// Returns [`StorageError::WriteFailed`] if the medium cannot be written.
        fn save(&mut self, entity: &EntityId, name: &str, value: &Value)
        -> Result<(), StorageError>;
    }
}
