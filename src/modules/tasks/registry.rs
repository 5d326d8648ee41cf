//! In-memory registry tracking every background task.
//!
//! Engines write through [`TaskRegistry::update`]; consumers either poll
//! [`TaskRegistry::get`] or subscribe to the broadcast stream. Notifications
//! are best effort: a slow or absent subscriber never blocks an engine.

use super::progress::{TaskKind, TaskProgress, TaskUpdate};
use crate::shared::errors::{AppError, AppResult};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::broadcast;

const TASK_EVENT_CAPACITY: usize = 256;

pub struct TaskRegistry {
    tasks: DashMap<String, TaskProgress>,
    events: broadcast::Sender<TaskProgress>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(TASK_EVENT_CAPACITY);
        Self {
            tasks: DashMap::new(),
            events,
        }
    }

    /// Register a new task. Fails when the id is already taken so two engines
    /// can never write over each other's state.
    pub fn create(&self, task_id: &str, kind: TaskKind) -> AppResult<TaskProgress> {
        let snapshot = match self.tasks.entry(task_id.to_string()) {
            Entry::Occupied(_) => {
                return Err(AppError::InvalidInput(format!(
                    "Task '{}' already exists",
                    task_id
                )));
            }
            Entry::Vacant(slot) => {
                let progress = TaskProgress::new(task_id, kind);
                slot.insert(progress.clone());
                progress
            }
        };
        self.notify(snapshot.clone());
        Ok(snapshot)
    }

    /// Apply a partial update. Unknown ids and terminal tasks are quietly
    /// ignored, which lets late writes from a finished run land harmlessly.
    pub fn update(&self, task_id: &str, update: TaskUpdate) -> Option<TaskProgress> {
        let (snapshot, changed) = {
            let mut entry = self.tasks.get_mut(task_id)?;
            let changed = entry.apply(update);
            (entry.clone(), changed)
        };
        if changed {
            self.notify(snapshot.clone());
        }
        Some(snapshot)
    }

    /// Snapshot of a single task.
    pub fn get(&self, task_id: &str) -> Option<TaskProgress> {
        self.tasks.get(task_id).map(|entry| entry.clone())
    }

    /// Snapshots of every known task, oldest first.
    pub fn list(&self) -> Vec<TaskProgress> {
        let mut tasks: Vec<TaskProgress> =
            self.tasks.iter().map(|entry| entry.clone()).collect();
        tasks.sort_by(|a, b| {
            a.started_at
                .cmp(&b.started_at)
                .then_with(|| a.task_id.cmp(&b.task_id))
        });
        tasks
    }

    /// Drop a task from the registry, returning its final state.
    pub fn remove(&self, task_id: &str) -> Option<TaskProgress> {
        self.tasks.remove(task_id).map(|(_, progress)| progress)
    }

    /// Stream of task snapshots, one per accepted update. Receivers that fall
    /// behind lose old events rather than stalling senders.
    pub fn subscribe(&self) -> broadcast::Receiver<TaskProgress> {
        self.events.subscribe()
    }

    fn notify(&self, snapshot: TaskProgress) {
        // Send fails only when nobody is listening.
        let _ = self.events.send(snapshot);
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}
