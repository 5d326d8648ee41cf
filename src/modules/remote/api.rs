use crate::modules::profile::InstanceProfile;
use crate::modules::remote::models::{
    CompletionRegistration, DataValue, Dataset, ImportSummary, OrgUnit,
};
use crate::shared::errors::AppResult;
use async_trait::async_trait;

/// Everything the engines need from a platform instance.
///
/// The HTTP client implements this against the real REST surface; tests
/// substitute fakes or mocks. Profiles are passed per call so one client
/// serves any number of instances concurrently.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlatformApi: Send + Sync {
    /// Cheap reachability probe used before a profile is saved.
    async fn test_connection(&self, profile: &InstanceProfile) -> AppResult<()>;

    /// Org units attached to the authenticated account.
    async fn fetch_user_org_units(&self, profile: &InstanceProfile) -> AppResult<Vec<OrgUnit>>;

    async fn fetch_org_units_at_level(
        &self,
        profile: &InstanceProfile,
        level: u32,
    ) -> AppResult<Vec<OrgUnit>>;

    async fn fetch_org_units_by_parent(
        &self,
        profile: &InstanceProfile,
        parent_id: &str,
    ) -> AppResult<Vec<OrgUnit>>;

    /// The full subtree rooted at `root_id`, the root itself included.
    async fn fetch_org_unit_subtree(
        &self,
        profile: &InstanceProfile,
        root_id: &str,
    ) -> AppResult<Vec<OrgUnit>>;

    async fn search_org_units(
        &self,
        profile: &InstanceProfile,
        name: &str,
    ) -> AppResult<Vec<OrgUnit>>;

    async fn fetch_datasets(&self, profile: &InstanceProfile) -> AppResult<Vec<Dataset>>;

    /// Ids of the data elements a dataset collects.
    async fn fetch_dataset_elements(
        &self,
        profile: &InstanceProfile,
        dataset_id: &str,
    ) -> AppResult<Vec<String>>;

    /// Data values for one (dataset, org unit, period), optionally covering
    /// the unit's whole subtree.
    async fn fetch_data_values(
        &self,
        profile: &InstanceProfile,
        dataset_id: &str,
        org_unit_id: &str,
        period: &str,
        include_descendants: bool,
    ) -> AppResult<Vec<DataValue>>;

    /// Synchronous bulk import of one chunk of values.
    async fn import_data_values(
        &self,
        profile: &InstanceProfile,
        values: &[DataValue],
    ) -> AppResult<ImportSummary>;

    /// Register completion entries in one call.
    async fn register_completions(
        &self,
        profile: &InstanceProfile,
        registrations: &[CompletionRegistration],
    ) -> AppResult<()>;

    /// Cached display-name lookup; falls back to the raw id on failure.
    async fn org_unit_name(&self, profile: &InstanceProfile, org_unit_id: &str) -> String;
}
