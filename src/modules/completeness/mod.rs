pub mod engine;
pub mod export;
pub mod request;
pub mod scoring;

pub use engine::CompletenessEngine;
pub use export::{to_csv, to_json, ExportFormat};
pub use request::{
    AssessmentRequest, BulkActionRequest, BulkActionSummary, BulkCompletionAction, OrgUnitPeriod,
    PairFailure,
};
pub use scoring::{score_unit, AssessmentResult, OrgUnitCompliance};
