use crate::modules::completeness::request::BulkActionSummary;
use crate::modules::completeness::scoring::AssessmentResult;
use crate::modules::transfer::mapping::UnmappedReport;
use crate::modules::transfer::summary::TransferSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Oldest messages are dropped once a task log reaches this size.
pub const MAX_TASK_MESSAGES: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Starting,
    Running,
    AwaitingDecision,
    Completed,
    Error,
}

impl TaskStatus {
    /// Terminal tasks accept no further updates.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Error)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            TaskStatus::Starting => "starting",
            TaskStatus::Running => "running",
            TaskStatus::AwaitingDecision => "awaiting_decision",
            TaskStatus::Completed => "completed",
            TaskStatus::Error => "error",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Transfer,
    Assessment,
    BulkAction,
}

/// Structured payload attached to a task when it has something to report
/// beyond log lines. Serialized with a `kind` tag so consumers can dispatch
/// without inspecting field shapes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskResult {
    Transfer(TransferSummary),
    UnmappedValues(UnmappedReport),
    Assessment(AssessmentResult),
    BulkAction(BulkActionSummary),
}

/// Live state of one background task. `get` hands out clones, so every
/// snapshot is immutable from the caller's point of view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskProgress {
    pub task_id: String,
    pub kind: TaskKind,
    pub status: TaskStatus,
    /// Percentage complete, never decreasing.
    pub progress: u8,
    pub messages: VecDeque<String>,
    pub result: Option<TaskResult>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskProgress {
    pub fn new(task_id: &str, kind: TaskKind) -> Self {
        let now = Utc::now();
        Self {
            task_id: task_id.to_string(),
            kind,
            status: TaskStatus::Starting,
            progress: 0,
            messages: VecDeque::new(),
            result: None,
            started_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply an update in place. Returns false when the task is already
    /// terminal, in which case nothing was touched.
    pub fn apply(&mut self, update: TaskUpdate) -> bool {
        if self.is_terminal() {
            return false;
        }

        if let Some(status) = update.status {
            self.status = status;
            if status == TaskStatus::Completed {
                self.progress = 100;
            }
            if status.is_terminal() && self.completed_at.is_none() {
                self.completed_at = Some(Utc::now());
            }
        }
        if let Some(progress) = update.progress {
            // Progress only moves forward.
            self.progress = self.progress.max(progress.min(100));
        }
        if let Some(message) = update.message {
            if self.messages.len() >= MAX_TASK_MESSAGES {
                self.messages.pop_front();
            }
            self.messages.push_back(message);
        }
        if let Some(result) = update.result {
            self.result = Some(result);
        }
        self.updated_at = Utc::now();
        true
    }
}

/// Partial update for a task. Unset fields leave the current value alone.
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub status: Option<TaskStatus>,
    pub progress: Option<u8>,
    pub message: Option<String>,
    pub result: Option<TaskResult>,
}

impl TaskUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn result(mut self, result: TaskResult) -> Self {
        self.result = Some(result);
        self
    }
}
