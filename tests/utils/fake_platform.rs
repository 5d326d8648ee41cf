/// In-memory stand-in for a platform instance pair.
///
/// Seeded through builder methods before the engines start, then inspected
/// through the recorded calls afterwards. Fault injection is value-based:
/// an org unit listed as failing keeps failing on every retry, which is how
/// a broken remote actually behaves.
use async_trait::async_trait;
use hmis_sync::modules::profile::InstanceProfile;
use hmis_sync::modules::remote::models::{
    CompletionRegistration, DataValue, Dataset, ImportCount, ImportSummary, OrgUnit,
};
use hmis_sync::modules::remote::PlatformApi;
use hmis_sync::shared::errors::{AppError, AppResult};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct FakePlatform {
    user_org_units: Mutex<Vec<OrgUnit>>,
    subtrees: Mutex<HashMap<String, Vec<OrgUnit>>>,
    dataset_elements: Mutex<HashMap<String, Vec<String>>>,
    // Keyed by (org unit asked for, period); descendants are pre-flattened.
    data: Mutex<HashMap<(String, String), Vec<DataValue>>>,

    failing_import_units: Mutex<HashSet<String>>,
    failing_fetch_units: Mutex<HashSet<String>>,
    failing_subtree_roots: Mutex<HashSet<String>>,
    failing_completion_units: Mutex<HashSet<String>>,
    completions_down: AtomicBool,
    panic_on_import: AtomicBool,

    pub import_calls: AtomicUsize,
    pub completion_batches: AtomicUsize,
    pub import_batch_sizes: Mutex<Vec<usize>>,
    pub imported_values: Mutex<Vec<DataValue>>,
    pub completions: Mutex<Vec<CompletionRegistration>>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Seeding (before the platform is shared)
    // ------------------------------------------------------------------

    pub fn with_user_org_units(self, units: Vec<OrgUnit>) -> Self {
        *self.user_org_units.lock().unwrap() = units;
        self
    }

    /// Seed the hierarchy returned for `fetch_org_unit_subtree(root)`. The
    /// root itself should be part of `units`, as the real endpoint includes it.
    pub fn with_subtree(self, root: &str, units: Vec<OrgUnit>) -> Self {
        self.subtrees.lock().unwrap().insert(root.to_string(), units);
        self
    }

    pub fn with_dataset_elements(self, dataset_id: &str, elements: &[&str]) -> Self {
        self.dataset_elements.lock().unwrap().insert(
            dataset_id.to_string(),
            elements.iter().map(|e| e.to_string()).collect(),
        );
        self
    }

    /// Seed the values served for one `(org unit, period)` fetch.
    pub fn with_values(self, org_unit: &str, period: &str, values: Vec<DataValue>) -> Self {
        self.data
            .lock()
            .unwrap()
            .entry((org_unit.to_string(), period.to_string()))
            .or_default()
            .extend(values);
        self
    }

    // ------------------------------------------------------------------
    // Fault injection (usable after the platform is shared)
    // ------------------------------------------------------------------

    /// Every import whose chunk contains a value for `org_unit` fails,
    /// retries included.
    pub fn fail_imports_containing(&self, org_unit: &str) {
        self.failing_import_units
            .lock()
            .unwrap()
            .insert(org_unit.to_string());
    }

    pub fn fail_fetch_for(&self, org_unit: &str) {
        self.failing_fetch_units
            .lock()
            .unwrap()
            .insert(org_unit.to_string());
    }

    pub fn fail_subtree_for(&self, root: &str) {
        self.failing_subtree_roots
            .lock()
            .unwrap()
            .insert(root.to_string());
    }

    pub fn fail_completions_for(&self, org_unit: &str) {
        self.failing_completion_units
            .lock()
            .unwrap()
            .insert(org_unit.to_string());
    }

    pub fn fail_all_completions(&self) {
        self.completions_down.store(true, Ordering::SeqCst);
    }

    pub fn panic_on_import(&self) {
        self.panic_on_import.store(true, Ordering::SeqCst);
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    pub fn total_imported(&self) -> usize {
        self.imported_values.lock().unwrap().len()
    }

    pub fn import_call_count(&self) -> usize {
        self.import_calls.load(Ordering::SeqCst)
    }

    pub fn completion_batch_count(&self) -> usize {
        self.completion_batches.load(Ordering::SeqCst)
    }

    fn find_unit(&self, org_unit_id: &str) -> Option<OrgUnit> {
        if let Some(unit) = self
            .user_org_units
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.id == org_unit_id)
        {
            return Some(unit.clone());
        }
        self.subtrees
            .lock()
            .unwrap()
            .values()
            .flatten()
            .find(|u| u.id == org_unit_id)
            .cloned()
    }
}

#[async_trait]
impl PlatformApi for FakePlatform {
    async fn test_connection(&self, _profile: &InstanceProfile) -> AppResult<()> {
        Ok(())
    }

    async fn fetch_user_org_units(&self, _profile: &InstanceProfile) -> AppResult<Vec<OrgUnit>> {
        Ok(self.user_org_units.lock().unwrap().clone())
    }

    async fn fetch_org_units_at_level(
        &self,
        _profile: &InstanceProfile,
        level: u32,
    ) -> AppResult<Vec<OrgUnit>> {
        Ok(self
            .subtrees
            .lock()
            .unwrap()
            .values()
            .flatten()
            .filter(|u| u.level == Some(level))
            .cloned()
            .collect())
    }

    async fn fetch_org_units_by_parent(
        &self,
        _profile: &InstanceProfile,
        parent_id: &str,
    ) -> AppResult<Vec<OrgUnit>> {
        Ok(self
            .subtrees
            .lock()
            .unwrap()
            .get(parent_id)
            .map(|units| units.iter().filter(|u| u.id != parent_id).cloned().collect())
            .unwrap_or_default())
    }

    async fn fetch_org_unit_subtree(
        &self,
        _profile: &InstanceProfile,
        root_id: &str,
    ) -> AppResult<Vec<OrgUnit>> {
        if self.failing_subtree_roots.lock().unwrap().contains(root_id) {
            return Err(AppError::ApiError(format!(
                "Hierarchy endpoint unavailable for '{}'",
                root_id
            )));
        }
        Ok(self
            .subtrees
            .lock()
            .unwrap()
            .get(root_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn search_org_units(
        &self,
        _profile: &InstanceProfile,
        name: &str,
    ) -> AppResult<Vec<OrgUnit>> {
        let needle = name.to_lowercase();
        Ok(self
            .subtrees
            .lock()
            .unwrap()
            .values()
            .flatten()
            .filter(|u| u.name.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    async fn fetch_datasets(&self, _profile: &InstanceProfile) -> AppResult<Vec<Dataset>> {
        let mut datasets: Vec<Dataset> = self
            .dataset_elements
            .lock()
            .unwrap()
            .keys()
            .map(|id| Dataset {
                id: id.clone(),
                name: id.clone(),
                display_name: None,
                period_type: Some("Monthly".to_string()),
            })
            .collect();
        datasets.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(datasets)
    }

    async fn fetch_dataset_elements(
        &self,
        _profile: &InstanceProfile,
        dataset_id: &str,
    ) -> AppResult<Vec<String>> {
        Ok(self
            .dataset_elements
            .lock()
            .unwrap()
            .get(dataset_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_data_values(
        &self,
        _profile: &InstanceProfile,
        _dataset_id: &str,
        org_unit_id: &str,
        period: &str,
        _include_descendants: bool,
    ) -> AppResult<Vec<DataValue>> {
        if self.failing_fetch_units.lock().unwrap().contains(org_unit_id) {
            return Err(AppError::ApiError(format!(
                "Data value endpoint unavailable for '{}'",
                org_unit_id
            )));
        }
        Ok(self
            .data
            .lock()
            .unwrap()
            .get(&(org_unit_id.to_string(), period.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn import_data_values(
        &self,
        _profile: &InstanceProfile,
        values: &[DataValue],
    ) -> AppResult<ImportSummary> {
        self.import_calls.fetch_add(1, Ordering::SeqCst);
        self.import_batch_sizes.lock().unwrap().push(values.len());
        if self.panic_on_import.load(Ordering::SeqCst) {
            panic!("injected import fault");
        }
        {
            let failing = self.failing_import_units.lock().unwrap();
            if values.iter().any(|v| failing.contains(&v.org_unit)) {
                return Err(AppError::ExternalServiceError(
                    "Import endpoint unavailable".to_string(),
                ));
            }
        }
        self.imported_values
            .lock()
            .unwrap()
            .extend(values.iter().cloned());
        Ok(ImportSummary {
            status: Some("SUCCESS".to_string()),
            description: None,
            import_count: ImportCount {
                imported: values.len() as u64,
                updated: 0,
                ignored: 0,
                deleted: 0,
            },
            conflicts: Vec::new(),
        })
    }

    async fn register_completions(
        &self,
        _profile: &InstanceProfile,
        registrations: &[CompletionRegistration],
    ) -> AppResult<()> {
        self.completion_batches.fetch_add(1, Ordering::SeqCst);
        if self.completions_down.load(Ordering::SeqCst) {
            return Err(AppError::ApiError(
                "Completion endpoint unavailable".to_string(),
            ));
        }
        {
            let failing = self.failing_completion_units.lock().unwrap();
            if let Some(rejected) = registrations
                .iter()
                .find(|r| failing.contains(&r.organisation_unit))
            {
                return Err(AppError::ApiError(format!(
                    "Completion rejected for '{}'",
                    rejected.organisation_unit
                )));
            }
        }
        self.completions
            .lock()
            .unwrap()
            .extend(registrations.iter().cloned());
        Ok(())
    }

    async fn org_unit_name(&self, _profile: &InstanceProfile, org_unit_id: &str) -> String {
        match self.find_unit(org_unit_id) {
            Some(unit) => unit.label().to_string(),
            None => org_unit_id.to_string(),
        }
    }
}
