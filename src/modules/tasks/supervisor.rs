//! Panic containment for spawned task bodies.
//!
//! Engine run loops report expected failures themselves by setting an error
//! status. A panic would otherwise leave the task stuck in `running` forever,
//! so every task body runs under a supervisor that converts the panic into a
//! terminal error update. Setting the status twice is harmless because
//! terminal tasks ignore later writes.

use super::progress::{TaskStatus, TaskUpdate};
use super::registry::TaskRegistry;
use crate::log_error;
use std::future::Future;
use std::sync::Arc;
use tokio::task::{JoinError, JoinHandle};

/// Spawn a task body and watch it from a second task. The returned handle
/// resolves once both the body and the watcher are done.
pub fn spawn_supervised<F>(
    registry: Arc<TaskRegistry>,
    task_id: String,
    body: F,
) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let inner = tokio::spawn(body);
        if let Err(join_error) = inner.await {
            let reason = join_error_message(join_error);
            log_error!("Task {} aborted: {}", task_id, reason);
            registry.update(
                &task_id,
                TaskUpdate::new()
                    .status(TaskStatus::Error)
                    .message(format!("Task aborted unexpectedly: {}", reason)),
            );
        }
    })
}

fn join_error_message(error: JoinError) -> String {
    if error.is_panic() {
        let payload = error.into_panic();
        if let Some(message) = payload.downcast_ref::<&str>() {
            (*message).to_string()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "panic with non-string payload".to_string()
        }
    } else {
        error.to_string()
    }
}
