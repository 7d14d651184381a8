//! The watcher graph: attribute store, entity registry and bindings.
//!
//! A [`Graph`] owns every attribute slot and every watcher binding. Writes
//! that change a slot, and emitted signals, fire the watchers bound to them
//! synchronously:
//!
//! - depth-first: a handler's own writes propagate completely before the
//!   next sibling watcher runs
//! - in registration order for watchers of the same trigger
//! - never for a write of a structurally equal value
//!
//! While a trigger's watchers run it is *in flight*. A changing write to an
//! in-flight attribute, or re-emission of an in-flight signal, can only be a
//! cycle and aborts with [`ConvergenceError::CycleDetected`]. Nesting deeper
//! than [`GraphLimits::max_depth`] aborts with [`ConvergenceError::ChainTooDeep`].
//!
//! Every collection inside the graph is persistent (`im`), so `clone()` is an
//! O(1) snapshot; the runtime uses this to roll back aborted stimuli.

use crate::attribute::{AttributeKey, AttributeStore, EntityId, Namespace, Write};
use crate::effect::{Effect, Outbound};
use crate::error::ConvergenceError;
use crate::signal::{Signal, SignalKind};
use crate::value::Value;
use im::{HashMap, OrdMap, Vector};
use std::fmt;
use std::rc::Rc;

/// Default maximum nesting of watcher chains
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Handle of a registered watcher
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatcherId(u64);

/// What a watcher is bound to
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Trigger {
    /// Changes of one attribute slot
    Attribute(AttributeKey),
    /// Emissions of one signal
    Signal {
        /// Entity the signal is scoped to
        origin: EntityId,
        /// Signal name
        name: &'static str,
    },
}

impl Trigger {
    /// Entity the trigger belongs to
    #[must_use]
    pub const fn entity(&self) -> &EntityId {
        match self {
            Self::Attribute(key) => &key.entity,
            Self::Signal { origin, .. } => origin,
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attribute(key) => key.fmt(f),
            Self::Signal { origin, name } => write!(f, "{origin}!{name}"),
        }
    }
}

/// What changed
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MutationKind {
    /// An attribute slot was written
    Attribute {
        /// Namespace of the slot
        namespace: Namespace,
        /// Attribute name
        name: &'static str,
    },
    /// A signal was emitted
    Signal {
        /// Signal name
        name: &'static str,
    },
}

/// Notification handed to a watcher
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mutation {
    /// Entity the attribute or signal belongs to
    pub origin: EntityId,
    /// Attribute write or signal emission
    pub kind: MutationKind,
    /// Previous attribute value (always `None` for signals)
    pub old_value: Option<Value>,
    /// New attribute value, or signal payload
    pub new_value: Option<Value>,
    /// Set when the watcher runs at registration rather than on a change
    pub eager: bool,
}

impl Mutation {
    /// New value or payload
    #[must_use]
    pub const fn value(&self) -> Option<&Value> {
        self.new_value.as_ref()
    }

    /// Name of the attribute or signal
    #[must_use]
    pub fn name(&self) -> &'static str {
        match &self.kind {
            MutationKind::Attribute { name, .. } | MutationKind::Signal { name } => name,
        }
    }
}

/// Watcher callback
///
/// Handlers receive the graph mutably so they can write further attributes
/// and emit further signals; those propagate before the handler's call
/// returns.
pub type Handler = dyn Fn(&mut Graph, &Mutation) -> Result<(), ConvergenceError>;

/// Registration options
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WatchOptions {
    /// Run the handler once at registration with the current value
    pub run_immediately: bool,
}

impl WatchOptions {
    /// Options for an eager watcher
    #[must_use]
    pub const fn eager() -> Self {
        Self {
            run_immediately: true,
        }
    }
}

/// Propagation limits
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GraphLimits {
    /// Maximum nesting of watcher chains
    pub max_depth: usize,
}

impl Default for GraphLimits {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Counters since the graph was created
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GraphStats {
    /// Writes that changed a slot
    pub writes: u64,
    /// Writes skipped because the value was equal
    pub unchanged_writes: u64,
    /// Signals emitted
    pub signals: u64,
    /// Watcher invocations
    pub firings: u64,
}

#[derive(Clone, Debug)]
struct EntityRecord {
    kind: &'static str,
    parent: Option<EntityId>,
    persistent: bool,
}

#[derive(Clone)]
struct Binding {
    owner: EntityId,
    trigger: Trigger,
    handler: Rc<Handler>,
}

/// Reactive graph of entities, attributes and watchers
#[derive(Clone, Default)]
pub struct Graph {
    store: AttributeStore,
    entities: HashMap<EntityId, EntityRecord>,
    bindings: OrdMap<WatcherId, Binding>,
    index: HashMap<Trigger, Vector<WatcherId>>,
    next_watcher: u64,
    outbox: Vector<Outbound>,
    in_flight: Vector<Trigger>,
    depth: usize,
    limits: GraphLimits,
    stats: GraphStats,
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("entities", &self.entities.len())
            .field("slots", &self.store.len())
            .field("bindings", &self.bindings.len())
            .field("outbox", &self.outbox.len())
            .field("depth", &self.depth)
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl Graph {
    /// Creates an empty graph with default limits
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty graph with custom limits
    #[must_use]
    pub fn with_limits(limits: GraphLimits) -> Self {
        Self {
            limits,
            ..Self::default()
        }
    }

    /// Current limits
    #[must_use]
    pub const fn limits(&self) -> GraphLimits {
        self.limits
    }

    /// Counters since creation
    #[must_use]
    pub const fn stats(&self) -> GraphStats {
        self.stats
    }

    // ===== Entities =====

    /// Registers a root entity
    ///
    /// # Errors
    ///
    /// Returns [`ConvergenceError::DuplicateEntity`] if the id is taken.
    pub fn create_entity(
        &mut self,
        id: EntityId,
        kind: &'static str,
    ) -> Result<EntityId, ConvergenceError> {
        self.register(id, kind, None)
    }

    /// Registers an entity whose lifetime is bound to `parent`
    ///
    /// # Errors
    ///
    /// Returns [`ConvergenceError::UnknownEntity`] if the parent does not
    /// exist and [`ConvergenceError::DuplicateEntity`] if the id is taken.
    pub fn create_child(
        &mut self,
        parent: &EntityId,
        id: EntityId,
        kind: &'static str,
    ) -> Result<EntityId, ConvergenceError> {
        self.ensure_entity(parent)?;
        self.register(id, kind, Some(parent.clone()))
    }

    fn register(
        &mut self,
        id: EntityId,
        kind: &'static str,
        parent: Option<EntityId>,
    ) -> Result<EntityId, ConvergenceError> {
        if self.entities.contains_key(&id) {
            return Err(ConvergenceError::DuplicateEntity(id));
        }
        tracing::trace!(entity = %id, kind, "Entity created");
        self.entities.insert(
            id.clone(),
            EntityRecord {
                kind,
                parent,
                persistent: false,
            },
        );
        Ok(id)
    }

    /// Whether the entity is registered
    #[must_use]
    pub fn contains(&self, id: &EntityId) -> bool {
        self.entities.contains_key(id)
    }

    /// Kind the entity was registered with
    #[must_use]
    pub fn kind_of(&self, id: &EntityId) -> Option<&'static str> {
        self.entities.get(id).map(|record| record.kind)
    }

    /// Number of registered entities of the given kind
    #[must_use]
    pub fn count_of(&self, kind: &str) -> usize {
        self.entities
            .values()
            .filter(|record| record.kind == kind)
            .count()
    }

    /// Flags an entity so every changing model write defers a
    /// [`Outbound::Persist`]
    ///
    /// # Errors
    ///
    /// Returns [`ConvergenceError::UnknownEntity`] if the entity does not exist.
    pub fn mark_persistent(&mut self, id: &EntityId) -> Result<(), ConvergenceError> {
        let record = self
            .entities
            .get_mut(id)
            .ok_or_else(|| ConvergenceError::UnknownEntity(id.clone()))?;
        record.persistent = true;
        Ok(())
    }

    /// Destroys an entity and all its descendants
    ///
    /// Their attributes and every binding they own or originate are removed;
    /// a binding removed this way is skipped if its turn comes later in the
    /// current chain. A [`Outbound::Remove`] is deferred for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ConvergenceError::UnknownEntity`] if the entity does not exist.
    pub fn destroy_entity(&mut self, id: &EntityId) -> Result<(), ConvergenceError> {
        self.ensure_entity(id)?;

        let doomed = self.descendants(id);
        for entity in &doomed {
            self.store.remove_entity(entity);
            self.entities.remove(entity);
        }

        let stale: Vec<WatcherId> = self
            .bindings
            .iter()
            .filter(|(_, binding)| {
                doomed.contains(&binding.owner) || doomed.contains(binding.trigger.entity())
            })
            .map(|(watcher, _)| *watcher)
            .collect();
        for watcher in stale {
            self.unwatch(watcher);
        }

        tracing::debug!(entity = %id, destroyed = doomed.len(), "Entity destroyed");
        self.defer(Outbound::Remove(id.clone()));
        Ok(())
    }

    fn descendants(&self, root: &EntityId) -> Vec<EntityId> {
        let mut found = vec![root.clone()];
        let mut cursor = 0;
        while cursor < found.len() {
            let parent = found[cursor].clone();
            found.extend(
                self.entities
                    .iter()
                    .filter(|(_, record)| record.parent.as_ref() == Some(&parent))
                    .map(|(child, _)| child.clone()),
            );
            cursor += 1;
        }
        found
    }

    fn ensure_entity(&self, id: &EntityId) -> Result<(), ConvergenceError> {
        if self.entities.contains_key(id) {
            Ok(())
        } else {
            Err(ConvergenceError::UnknownEntity(id.clone()))
        }
    }

    // ===== Attributes =====

    /// Reads a slot
    #[must_use]
    pub fn get(&self, key: &AttributeKey) -> Option<&Value> {
        self.store.get(key)
    }

    /// Reads a model attribute
    #[must_use]
    pub fn model(&self, entity: &EntityId, name: &'static str) -> Option<&Value> {
        self.store.get(&AttributeKey::model(entity.clone(), name))
    }

    /// Reads a presentation attribute
    #[must_use]
    pub fn presentation(&self, entity: &EntityId, name: &'static str) -> Option<&Value> {
        self.store
            .get(&AttributeKey::presentation(entity.clone(), name))
    }

    /// Writes one slot and propagates the change
    ///
    /// Returns whether the slot changed. Changing presentation writes defer
    /// an [`Outbound::Project`].
    ///
    /// # Errors
    ///
    /// Returns [`ConvergenceError::UnknownEntity`] for an unregistered
    /// entity, [`ConvergenceError::CycleDetected`] if the slot is in flight,
    /// [`ConvergenceError::ChainTooDeep`] past the depth limit, or any error
    /// raised by a watcher.
    pub fn set(&mut self, key: AttributeKey, value: Value) -> Result<bool, ConvergenceError> {
        self.commit_writes(vec![(key, value)])
    }

    /// Writes both namespaces of an attribute, then propagates
    ///
    /// Both slots hold the new value before any watcher runs. Model watchers
    /// fire before presentation watchers.
    ///
    /// # Errors
    ///
    /// Same as [`Graph::set`].
    pub fn publish(
        &mut self,
        entity: &EntityId,
        name: &'static str,
        value: Value,
    ) -> Result<bool, ConvergenceError> {
        self.commit_writes(vec![
            (AttributeKey::model(entity.clone(), name), value.clone()),
            (AttributeKey::presentation(entity.clone(), name), value),
        ])
    }

    fn commit_writes(
        &mut self,
        writes: Vec<(AttributeKey, Value)>,
    ) -> Result<bool, ConvergenceError> {
        let mut pending = Vec::with_capacity(writes.len());
        for (key, value) in writes {
            self.ensure_entity(&key.entity)?;
            if self.store.get(&key) == Some(&value) {
                self.stats.unchanged_writes += 1;
                continue;
            }
            let trigger = Trigger::Attribute(key.clone());
            if self.in_flight.contains(&trigger) {
                return Err(ConvergenceError::CycleDetected(trigger.to_string()));
            }
            pending.push((key, value));
        }

        if pending.is_empty() {
            return Ok(false);
        }

        let mut fired = Vec::with_capacity(pending.len());
        for (key, value) in pending {
            let Write::Changed { old } = self.store.set(key.clone(), value.clone()) else {
                continue;
            };
            self.stats.writes += 1;
            tracing::trace!(slot = %key, "Attribute changed");
            self.defer_write(&key, &value);
            fired.push((
                Mutation {
                    origin: key.entity.clone(),
                    kind: MutationKind::Attribute {
                        namespace: key.namespace,
                        name: key.name,
                    },
                    old_value: old,
                    new_value: Some(value),
                    eager: false,
                },
                Trigger::Attribute(key),
            ));
        }

        self.propagate(fired)?;
        Ok(true)
    }

    fn defer_write(&mut self, key: &AttributeKey, value: &Value) {
        match key.namespace {
            Namespace::Presentation => self.defer(Outbound::Project {
                entity: key.entity.clone(),
                name: key.name,
                value: value.clone(),
            }),
            Namespace::Model => {
                let persistent = self
                    .entities
                    .get(&key.entity)
                    .is_some_and(|record| record.persistent);
                if persistent {
                    self.defer(Outbound::Persist {
                        entity: key.entity.clone(),
                        name: key.name,
                        value: value.clone(),
                    });
                }
            },
        }
    }

    // ===== Signals =====

    /// Emits a signal scoped to `origin`
    ///
    /// # Errors
    ///
    /// Returns [`ConvergenceError::UnknownEntity`] for an unregistered
    /// origin, [`ConvergenceError::CycleDetected`] if the same signal is
    /// already in flight, [`ConvergenceError::ChainTooDeep`] past the depth
    /// limit, or any error raised by a watcher.
    pub fn emit(
        &mut self,
        origin: &EntityId,
        kind: &impl SignalKind,
        payload: Option<Value>,
    ) -> Result<(), ConvergenceError> {
        self.emit_signal(Signal {
            origin: origin.clone(),
            name: kind.name(),
            payload,
        })
    }

    /// Emits a prepared [`Signal`]
    ///
    /// # Errors
    ///
    /// Same as [`Graph::emit`].
    pub fn emit_signal(&mut self, signal: Signal) -> Result<(), ConvergenceError> {
        self.ensure_entity(&signal.origin)?;
        let trigger = Trigger::Signal {
            origin: signal.origin.clone(),
            name: signal.name,
        };
        if self.in_flight.contains(&trigger) {
            return Err(ConvergenceError::CycleDetected(trigger.to_string()));
        }
        self.stats.signals += 1;
        tracing::trace!(signal = %trigger, "Signal emitted");

        let mutation = Mutation {
            origin: signal.origin,
            kind: MutationKind::Signal { name: signal.name },
            old_value: None,
            new_value: signal.payload,
            eager: false,
        };
        self.propagate(vec![(mutation, trigger)])
    }

    // ===== Watchers =====

    /// Binds a watcher to an attribute slot
    ///
    /// With [`WatchOptions::eager`] the handler runs once before this call
    /// returns, with the slot's current value (or `None`).
    ///
    /// # Errors
    ///
    /// Returns [`ConvergenceError::UnknownEntity`] if the owner or target
    /// entity does not exist, or any error raised by an eager run.
    pub fn watch<F>(
        &mut self,
        owner: &EntityId,
        target: AttributeKey,
        options: WatchOptions,
        handler: F,
    ) -> Result<WatcherId, ConvergenceError>
    where
        F: Fn(&mut Graph, &Mutation) -> Result<(), ConvergenceError> + 'static,
    {
        let initial = Mutation {
            origin: target.entity.clone(),
            kind: MutationKind::Attribute {
                namespace: target.namespace,
                name: target.name,
            },
            old_value: None,
            new_value: self.store.get(&target).cloned(),
            eager: true,
        };
        self.bind(owner, Trigger::Attribute(target), options, initial, Rc::new(handler))
    }

    /// Binds a watcher to a signal
    ///
    /// An eager signal watcher runs once at registration without payload.
    ///
    /// # Errors
    ///
    /// Same as [`Graph::watch`].
    pub fn watch_signal<F>(
        &mut self,
        owner: &EntityId,
        origin: &EntityId,
        kind: &impl SignalKind,
        options: WatchOptions,
        handler: F,
    ) -> Result<WatcherId, ConvergenceError>
    where
        F: Fn(&mut Graph, &Mutation) -> Result<(), ConvergenceError> + 'static,
    {
        let name = kind.name();
        let initial = Mutation {
            origin: origin.clone(),
            kind: MutationKind::Signal { name },
            old_value: None,
            new_value: None,
            eager: true,
        };
        let trigger = Trigger::Signal {
            origin: origin.clone(),
            name,
        };
        self.bind(owner, trigger, options, initial, Rc::new(handler))
    }

    fn bind(
        &mut self,
        owner: &EntityId,
        trigger: Trigger,
        options: WatchOptions,
        initial: Mutation,
        handler: Rc<Handler>,
    ) -> Result<WatcherId, ConvergenceError> {
        self.ensure_entity(owner)?;
        self.ensure_entity(trigger.entity())?;

        let watcher = WatcherId(self.next_watcher);
        self.next_watcher += 1;
        self.index
            .entry(trigger.clone())
            .or_insert_with(Vector::new)
            .push_back(watcher);
        self.bindings.insert(
            watcher,
            Binding {
                owner: owner.clone(),
                trigger: trigger.clone(),
                handler: Rc::clone(&handler),
            },
        );

        if options.run_immediately {
            tracing::trace!(trigger = %trigger, "Running eager watcher");
            self.stats.firings += 1;
            self.enter(vec![trigger])?;
            let result = handler(self, &initial);
            self.leave(1);
            result?;
        }
        Ok(watcher)
    }

    /// Removes a watcher; returns whether it existed
    pub fn unwatch(&mut self, watcher: WatcherId) -> bool {
        let Some(binding) = self.bindings.remove(&watcher) else {
            return false;
        };
        if let Some(ids) = self.index.get_mut(&binding.trigger) {
            ids.retain(|id| *id != watcher);
            if ids.is_empty() {
                self.index.remove(&binding.trigger);
            }
        }
        true
    }

    /// Number of live bindings
    #[must_use]
    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    /// Number of watchers bound to a trigger
    #[must_use]
    pub fn watcher_count(&self, trigger: &Trigger) -> usize {
        self.index.get(trigger).map_or(0, Vector::len)
    }

    // ===== Propagation =====

    fn propagate(&mut self, fired: Vec<(Mutation, Trigger)>) -> Result<(), ConvergenceError> {
        let triggers: Vec<Trigger> = fired.iter().map(|(_, trigger)| trigger.clone()).collect();
        let count = triggers.len();
        self.enter(triggers)?;
        let result = fired
            .iter()
            .try_for_each(|(mutation, trigger)| self.fire(trigger, mutation));
        self.leave(count);
        result
    }

    fn enter(&mut self, triggers: Vec<Trigger>) -> Result<(), ConvergenceError> {
        if self.depth >= self.limits.max_depth {
            return Err(ConvergenceError::ChainTooDeep {
                limit: self.limits.max_depth,
            });
        }
        self.depth += 1;
        self.in_flight.extend(triggers);
        Ok(())
    }

    fn leave(&mut self, count: usize) {
        self.depth = self.depth.saturating_sub(1);
        let keep = self.in_flight.len().saturating_sub(count);
        self.in_flight.truncate(keep);
    }

    fn fire(&mut self, trigger: &Trigger, mutation: &Mutation) -> Result<(), ConvergenceError> {
        let Some(watchers) = self.index.get(trigger).cloned() else {
            return Ok(());
        };
        for watcher in watchers {
            let Some(binding) = self.bindings.get(&watcher) else {
                tracing::trace!(trigger = %trigger, ?watcher, "Skipping removed watcher");
                continue;
            };
            let handler = Rc::clone(&binding.handler);
            self.stats.firings += 1;
            tracing::trace!(trigger = %trigger, ?watcher, depth = self.depth, "Firing watcher");
            handler(self, mutation)?;
        }
        Ok(())
    }

    // ===== Effects =====

    /// Applies reducer effects in order
    ///
    /// # Errors
    ///
    /// Returns the first error raised by an effect; later effects are not applied.
    pub fn apply<I>(&mut self, effects: I) -> Result<(), ConvergenceError>
    where
        I: IntoIterator<Item = Effect>,
    {
        for effect in effects {
            match effect {
                Effect::None => {},
                Effect::Write { key, value } => {
                    self.set(key, value)?;
                },
                Effect::Publish {
                    entity,
                    name,
                    value,
                } => {
                    self.publish(&entity, name, value)?;
                },
                Effect::Emit(signal) => self.emit_signal(signal)?,
                Effect::Destroy(entity) => self.destroy_entity(&entity)?,
                Effect::Outbound(command) => self.defer(command),
                Effect::Sequential(effects) => self.apply(effects)?,
            }
        }
        Ok(())
    }

    /// Queues an outbound command until the graph converges
    pub fn defer(&mut self, command: Outbound) {
        self.outbox.push_back(command);
    }

    /// Drains the outbox
    pub fn take_outbox(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.outbox).into_iter().collect()
    }

    /// Number of queued outbound commands
    #[must_use]
    pub fn pending_outbound(&self) -> usize {
        self.outbox.len()
    }

    /// Whether a stimulus is currently propagating
    #[must_use]
    pub fn is_propagating(&self) -> bool {
        self.depth > 0
    }
}
