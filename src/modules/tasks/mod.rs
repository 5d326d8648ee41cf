pub mod progress;
pub mod registry;
pub mod supervisor;

pub use progress::{
    TaskKind, TaskProgress, TaskResult, TaskStatus, TaskUpdate, MAX_TASK_MESSAGES,
};
pub use registry::TaskRegistry;
pub use supervisor::spawn_supervised;
