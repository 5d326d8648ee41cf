pub mod completion;
pub mod data_value;
pub mod dataset;
pub mod import_summary;
pub mod org_unit;

pub use completion::{CompletionBatch, CompletionRegistration};
pub use data_value::{DataValue, DataValueSet};
pub use dataset::{Dataset, DatasetElementsResponse, DatasetListResponse};
pub use import_summary::{parse_summary_description, ImportConflict, ImportCount, ImportSummary};
pub use org_unit::{MeResponse, OrgUnit, OrgUnitListResponse};
