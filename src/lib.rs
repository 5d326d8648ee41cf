//! Chunked data-value transfer and reporting-completeness engines for
//! DHIS2-style health information platforms.
//!
//! Engines are non-blocking: `start_*` validates the request, registers a
//! task, spawns the run, and returns the task id. Progress is observed by
//! polling the [`modules::tasks::TaskRegistry`] or subscribing to its
//! broadcast stream.

pub mod modules;
pub mod shared;

pub use modules::completeness::{
    AssessmentRequest, BulkActionRequest, BulkCompletionAction, CompletenessEngine, ExportFormat,
    OrgUnitPeriod,
};
pub use modules::profile::{InstanceProfile, ProfileStore};
pub use modules::remote::{PlatformApi, RemoteClient};
pub use modules::tasks::{TaskProgress, TaskRegistry, TaskStatus};
pub use modules::transfer::{TransferEngine, TransferRequest, UnmappedDecision};
pub use shared::errors::{AppError, AppResult};
pub use shared::utils::init_logger;
