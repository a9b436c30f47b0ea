use std::future::Future;

use tokio::task::JoinHandle;
use tracing::Instrument;

/// Spawn a Tokio task inside a span carrying its name.
pub fn spawn_named_task<F>(task_name: &'static str, future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let span = tracing::info_span!("task", task_name);
    tokio::spawn(future.instrument(span))
}

/// Spawn a Tokio task inside a span naming the task and the room it serves,
/// so every event it logs carries both.
pub fn spawn_room_task<F>(task_name: &'static str, room: &str, future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let span = tracing::info_span!("task", task_name, room = %room);
    tokio::spawn(future.instrument(span))
}
