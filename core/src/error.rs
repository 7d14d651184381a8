//! Error types for the reactive core.

use crate::attribute::EntityId;
use crate::value::ValueKind;
use thiserror::Error;

/// Contract violations raised while a stimulus propagates through the graph.
///
/// Every variant is fatal for the stimulus that raised it. Recoverable
/// absence (an attribute that was never set) is never reported through this
/// type; readers resolve it to a documented default instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConvergenceError {
    /// A value had the wrong shape for the slot it was read from
    #[error("malformed value: expected {expected}, found {found}")]
    MalformedValue {
        /// Shape the reader required
        expected: ValueKind,
        /// Shape actually stored
        found: ValueKind,
    },

    /// A record was missing a required field
    #[error("malformed value: missing field '{field}'")]
    MissingField {
        /// Name of the absent field
        field: &'static str,
    },

    /// A signal carried a payload its watcher cannot accept
    #[error("invalid payload for signal '{signal}': {reason}")]
    InvalidPayload {
        /// Signal name
        signal: &'static str,
        /// What was wrong with the payload
        reason: String,
    },

    /// A visible item had no materialized handle at render time
    #[error("no handle materialized for item '{id}'")]
    MissingHandle {
        /// Id of the item that could not be resolved
        id: String,
    },

    /// An operation referenced an entity that is not registered
    #[error("unknown entity '{0}'")]
    UnknownEntity(EntityId),

    /// An entity was created twice
    #[error("entity '{0}' already exists")]
    DuplicateEntity(EntityId),

    /// A positional update addressed a slot past the end of a collection
    #[error("index {index} out of range for collection of length {len}")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Collection length
        len: usize,
    },

    /// A changing write hit an attribute (or signal) whose watchers were still running
    #[error("cycle detected: '{0}' changed again while its watchers were running")]
    CycleDetected(String),

    /// The watcher chain nested deeper than the configured limit
    #[error("watcher chain exceeded the maximum depth of {limit}")]
    ChainTooDeep {
        /// Configured limit
        limit: usize,
    },
}

/// Failures reported by a [`Storage`](crate::environment::Storage) adapter
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The backing medium could not be read
    #[error("storage read failed for '{key}': {reason}")]
    ReadFailed {
        /// Storage key
        key: String,
        /// Adapter-specific reason
        reason: String,
    },

    /// The backing medium could not be written
    #[error("storage write failed for '{key}': {reason}")]
    WriteFailed {
        /// Storage key
        key: String,
        /// Adapter-specific reason
        reason: String,
    },
}
