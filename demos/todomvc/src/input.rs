//! New-todo input field.

use crate::types::{TodoSignal, attr};
use convergent_core::attribute::EntityId;
use convergent_core::error::ConvergenceError;
use convergent_core::graph::Graph;
use convergent_core::signal::Signal;
use convergent_core::value::Value;

/// Records the trimmed field text
///
/// # Errors
///
/// Any error raised while propagating the write.
pub fn change(graph: &mut Graph, input: &EntityId, text: &str) -> Result<(), ConvergenceError> {
    graph.publish(input, attr::VALUE, Value::from(text.trim()))?;
    Ok(())
}

/// Submits the field: a non-blank title raises `newtodo`, then the field is
/// cleared
///
/// Returns whether a todo was requested.
///
/// # Errors
///
/// Any error raised while propagating the signal or the write.
pub fn submit(graph: &mut Graph, input: &EntityId, text: &str) -> Result<bool, ConvergenceError> {
    let title = text.trim();
    let requested = !title.is_empty();
    if requested {
        graph.emit_signal(Signal::new(input.clone(), &TodoSignal::NewTodo).with_payload(title))?;
    } else {
        tracing::trace!("Blank input ignored");
    }
    graph.publish(input, attr::VALUE, Value::from(""))?;
    Ok(requested)
}
