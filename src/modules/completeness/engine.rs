//! Walks organisation-unit subtrees and scores every unit against the
//! dataset's required elements.
//!
//! The hierarchy is always fetched in full, independent of which units
//! reported data. A unit with no values must surface as 0% compliant,
//! which cannot happen if units are enumerated from the data values.

use super::export::{self, ExportFormat};
use super::request::{
    AssessmentRequest, BulkActionRequest, BulkActionSummary, BulkCompletionAction, PairFailure,
};
use super::scoring::{score_unit, AssessmentResult, OrgUnitCompliance};
use crate::modules::profile::ProfileStore;
use crate::modules::remote::api::PlatformApi;
use crate::modules::remote::models::CompletionRegistration;
use crate::modules::tasks::{
    spawn_supervised, TaskKind, TaskProgress, TaskRegistry, TaskResult, TaskStatus, TaskUpdate,
};
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::{LogContext, TimedOperation};
use crate::{log_error, log_warn};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

// Element resolution lands at 5, per-block scoring fills 10-95.
const ELEMENTS_PROGRESS: u8 = 5;
const ASSESS_BASE: usize = 10;
const ASSESS_SPAN: usize = 85;
const BULK_SPAN: usize = 95;

#[derive(Clone)]
pub struct CompletenessEngine {
    api: Arc<dyn PlatformApi>,
    profiles: Arc<ProfileStore>,
    registry: Arc<TaskRegistry>,
}

impl CompletenessEngine {
    pub fn new(
        api: Arc<dyn PlatformApi>,
        profiles: Arc<ProfileStore>,
        registry: Arc<TaskRegistry>,
    ) -> Self {
        Self {
            api,
            profiles,
            registry,
        }
    }

    pub fn start_assessment(&self, request: AssessmentRequest) -> AppResult<String> {
        request.validate()?;
        self.profiles.get(&request.instance)?;

        let task_id = Uuid::new_v4().to_string();
        self.registry.create(&task_id, TaskKind::Assessment)?;
        LogContext::task_event(&task_id, "assessment accepted");

        let engine = self.clone();
        let id = task_id.clone();
        spawn_supervised(Arc::clone(&self.registry), task_id.clone(), async move {
            engine.run_assessment(&id, request).await;
        });
        Ok(task_id)
    }

    pub fn start_bulk_action(&self, request: BulkActionRequest) -> AppResult<String> {
        request.validate()?;
        self.profiles.get(&request.instance)?;

        let task_id = Uuid::new_v4().to_string();
        self.registry.create(&task_id, TaskKind::BulkAction)?;
        LogContext::task_event(&task_id, "bulk completion action accepted");

        let engine = self.clone();
        let id = task_id.clone();
        spawn_supervised(Arc::clone(&self.registry), task_id.clone(), async move {
            engine.run_bulk_action(&id, request).await;
        });
        Ok(task_id)
    }

    pub fn get_progress(&self, task_id: &str) -> AppResult<TaskProgress> {
        self.registry
            .get(task_id)
            .ok_or_else(|| AppError::NotFound(format!("Task '{}' not found", task_id)))
    }

    /// Render a finished assessment. Fails with "not ready" while the task is
    /// still running or parked, and for tasks of a different kind.
    pub fn export_results(
        &self,
        task_id: &str,
        format: ExportFormat,
        limit: Option<usize>,
    ) -> AppResult<String> {
        let task = self.get_progress(task_id)?;
        if task.status != TaskStatus::Completed {
            return Err(AppError::InvalidInput(format!(
                "Task '{}' is not ready for export (status: {})",
                task_id, task.status
            )));
        }
        let result = match task.result {
            Some(TaskResult::Assessment(result)) => result,
            _ => {
                return Err(AppError::InvalidInput(format!(
                    "Task '{}' has no assessment result to export",
                    task_id
                )))
            }
        };
        match format {
            ExportFormat::Json => export::to_json(&result, limit),
            ExportFormat::Csv => Ok(export::to_csv(&result)),
        }
    }

    async fn run_assessment(&self, task_id: &str, request: AssessmentRequest) {
        let timer = TimedOperation::new("completeness assessment");
        self.registry.update(
            task_id,
            TaskUpdate::new().status(TaskStatus::Running).message(format!(
                "Starting completeness assessment of dataset '{}' ({} parents, {} periods, threshold {}%)",
                request.dataset,
                request.parent_org_units.len(),
                request.periods.len(),
                request.threshold
            )),
        );

        let profile = match self.profiles.get(&request.instance) {
            Ok(profile) => profile,
            Err(e) => return self.fail_task(task_id, format!("Instance unavailable: {}", e)),
        };

        let required = if request.required_elements.is_empty() {
            match self
                .api
                .fetch_dataset_elements(&profile, &request.dataset)
                .await
            {
                Ok(elements) => {
                    self.registry.update(
                        task_id,
                        TaskUpdate::new().progress(ELEMENTS_PROGRESS).message(format!(
                            "Derived {} required elements from dataset '{}'",
                            elements.len(),
                            request.dataset
                        )),
                    );
                    elements
                }
                Err(e) => {
                    return self.fail_task(
                        task_id,
                        format!("Failed to load dataset elements: {}", e),
                    )
                }
            }
        } else {
            self.registry.update(
                task_id,
                TaskUpdate::new().progress(ELEMENTS_PROGRESS).message(format!(
                    "Using {} caller-supplied required elements",
                    request.required_elements.len()
                )),
            );
            request.required_elements.clone()
        };
        if required.is_empty() {
            log_warn!(
                "Assessment task {}: dataset '{}' has no data elements; every unit scores 0%",
                task_id,
                request.dataset
            );
            self.registry.update(
                task_id,
                TaskUpdate::new()
                    .message("Dataset has no data elements; every unit will score 0%"),
            );
        }

        let total_blocks = request.parent_org_units.len() * request.periods.len();
        let mut blocks_done = 0usize;
        let mut compliant_count = 0u64;
        let mut non_compliant_count = 0u64;
        let mut error_count = 0u64;
        let mut details: BTreeMap<String, OrgUnitCompliance> = BTreeMap::new();
        let mut failures: BTreeMap<String, String> = BTreeMap::new();

        for parent in &request.parent_org_units {
            // Subtrees can run to tens of thousands of nodes; one fetch per
            // parent covers every period.
            let hierarchy = match self.api.fetch_org_unit_subtree(&profile, parent).await {
                Ok(units) => units,
                Err(e) => {
                    // One failed parent never sinks the others.
                    for period in &request.periods {
                        blocks_done += 1;
                        error_count += 1;
                        failures.insert(format!("{}/{}", parent, period), e.to_string());
                    }
                    let progress =
                        (ASSESS_BASE + blocks_done * ASSESS_SPAN / total_blocks) as u8;
                    self.registry.update(
                        task_id,
                        TaskUpdate::new().progress(progress).message(format!(
                            "Failed to fetch hierarchy under {}: {}",
                            parent, e
                        )),
                    );
                    continue;
                }
            };
            let parent_label = hierarchy
                .iter()
                .find(|unit| unit.id == *parent)
                .map(|unit| unit.label().to_string())
                .unwrap_or_else(|| parent.clone());

            for period in &request.periods {
                blocks_done += 1;
                let progress = (ASSESS_BASE + blocks_done * ASSESS_SPAN / total_blocks) as u8;

                let values = match self
                    .api
                    .fetch_data_values(&profile, &request.dataset, parent, period, true)
                    .await
                {
                    Ok(values) => values,
                    Err(e) => {
                        error_count += 1;
                        failures.insert(format!("{}/{}", parent, period), e.to_string());
                        self.registry.update(
                            task_id,
                            TaskUpdate::new().progress(progress).message(format!(
                                "Failed to fetch data values under {} for {}: {}",
                                parent, period, e
                            )),
                        );
                        continue;
                    }
                };

                let mut unit_elements: HashMap<String, HashSet<String>> = HashMap::new();
                for value in &values {
                    if value.has_value() {
                        unit_elements
                            .entry(value.org_unit.clone())
                            .or_default()
                            .insert(value.data_element.clone());
                    }
                }

                let empty = HashSet::new();
                let mut block_compliant = 0u64;
                let mut block_non_compliant = 0u64;
                for unit in &hierarchy {
                    if unit.id == *parent && !request.include_parents {
                        continue;
                    }
                    let present = unit_elements.get(&unit.id).unwrap_or(&empty);
                    let record = score_unit(unit, present, &required, request.threshold, period);
                    if record.compliant {
                        block_compliant += 1;
                    } else {
                        block_non_compliant += 1;
                    }
                    // Later periods replace earlier ones for the same unit.
                    details.insert(unit.id.clone(), record);
                }
                compliant_count += block_compliant;
                non_compliant_count += block_non_compliant;

                self.registry.update(
                    task_id,
                    TaskUpdate::new().progress(progress).message(format!(
                        "Assessed {} units under {} for {}: {} compliant, {} non-compliant",
                        block_compliant + block_non_compliant,
                        parent_label,
                        period,
                        block_compliant,
                        block_non_compliant
                    )),
                );
            }
        }

        let result = AssessmentResult {
            dataset: request.dataset.clone(),
            threshold: request.threshold,
            periods: request.periods.clone(),
            compliant_count,
            non_compliant_count,
            error_count,
            compliance_details: details,
            failures,
        };

        if result.compliance_details.is_empty() && !result.failures.is_empty() {
            let message = format!(
                "Assessment failed: all {} organisation unit/period blocks failed",
                result.failures.len()
            );
            log_error!("Assessment task {}: {}", task_id, message);
            self.registry.update(
                task_id,
                TaskUpdate::new()
                    .status(TaskStatus::Error)
                    .message(message)
                    .result(TaskResult::Assessment(result)),
            );
            return;
        }

        let final_message = format!(
            "Assessment finished: {} compliant, {} non-compliant, {} errors across {} periods",
            result.compliant_count,
            result.non_compliant_count,
            result.error_count,
            request.periods.len()
        );
        self.registry.update(
            task_id,
            TaskUpdate::new()
                .status(TaskStatus::Completed)
                .message(final_message)
                .result(TaskResult::Assessment(result)),
        );
        timer.finish();
    }

    async fn run_bulk_action(&self, task_id: &str, request: BulkActionRequest) {
        self.registry.update(
            task_id,
            TaskUpdate::new().status(TaskStatus::Running).message(format!(
                "Marking {} organisation unit/period pairs {}",
                request.pairs.len(),
                request.action.label()
            )),
        );

        let profile = match self.profiles.get(&request.instance) {
            Ok(profile) => profile,
            Err(e) => return self.fail_task(task_id, format!("Instance unavailable: {}", e)),
        };

        let completed = request.action == BulkCompletionAction::MarkComplete;
        let total = request.pairs.len();
        let mut succeeded = 0u64;
        let mut failures: Vec<PairFailure> = Vec::new();

        for (index, pair) in request.pairs.iter().enumerate() {
            let registration = CompletionRegistration::new(
                &request.dataset,
                &pair.period,
                &pair.org_unit,
                completed,
                &profile.username,
            );
            let name = self.api.org_unit_name(&profile, &pair.org_unit).await;
            let progress = ((index + 1) * BULK_SPAN / total) as u8;

            // One call per pair on purpose: callers need to see exactly which
            // pair failed so they can correct it by hand.
            match self
                .api
                .register_completions(&profile, std::slice::from_ref(&registration))
                .await
            {
                Ok(()) => {
                    succeeded += 1;
                    self.registry.update(
                        task_id,
                        TaskUpdate::new().progress(progress).message(format!(
                            "Marked {} ({}) {}",
                            name,
                            pair.period,
                            request.action.label()
                        )),
                    );
                }
                Err(e) => {
                    failures.push(PairFailure {
                        org_unit: pair.org_unit.clone(),
                        period: pair.period.clone(),
                        error: e.to_string(),
                    });
                    self.registry.update(
                        task_id,
                        TaskUpdate::new().progress(progress).message(format!(
                            "Failed to mark {} ({}) {}: {}",
                            name,
                            pair.period,
                            request.action.label(),
                            e
                        )),
                    );
                }
            }
        }

        let summary = BulkActionSummary {
            action: request.action,
            total_pairs: total as u64,
            succeeded,
            failed: failures.len() as u64,
            failures,
        };

        if summary.succeeded == 0 {
            let message = format!("All {} completion updates failed", total);
            log_error!("Bulk action task {}: {}", task_id, message);
            self.registry.update(
                task_id,
                TaskUpdate::new()
                    .status(TaskStatus::Error)
                    .message(message)
                    .result(TaskResult::BulkAction(summary)),
            );
            return;
        }

        let final_message = format!(
            "Bulk action finished: {} succeeded, {} failed",
            summary.succeeded, summary.failed
        );
        self.registry.update(
            task_id,
            TaskUpdate::new()
                .status(TaskStatus::Completed)
                .message(final_message)
                .result(TaskResult::BulkAction(summary)),
        );
    }

    fn fail_task(&self, task_id: &str, message: String) {
        log_error!("Assessment task {} failed: {}", task_id, message);
        self.registry.update(
            task_id,
            TaskUpdate::new().status(TaskStatus::Error).message(message),
        );
    }
}
