//! Transient, payload-carrying events scoped to an origin entity.
//!
//! Signals have no stored value: emitting one fires the watchers bound to
//! `(origin, name)` and leaves nothing behind. Domain crates usually define
//! their signals as an enum and derive [`SignalKind`] with
//! `#[derive(Signal)]` from `convergent-macros`.

use crate::attribute::EntityId;
use crate::value::Value;

/// Anything that names a signal
pub trait SignalKind {
    /// Wire name of the signal
    fn name(&self) -> &'static str;
}

impl SignalKind for &'static str {
    fn name(&self) -> &'static str {
        self
    }
}

/// An emitted signal
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signal {
    /// Entity the signal is scoped to
    pub origin: EntityId,
    /// Signal name
    pub name: &'static str,
    /// Optional payload
    pub payload: Option<Value>,
}

impl Signal {
    /// Creates a signal without payload
    #[must_use]
    pub fn new(origin: EntityId, kind: &impl SignalKind) -> Self {
        Self {
            origin,
            name: kind.name(),
            payload: None,
        }
    }

    /// Attaches a payload
    #[must_use]
    pub fn with_payload(mut self, payload: impl Into<Value>) -> Self {
        self.payload = Some(payload.into());
        self
    }
}
