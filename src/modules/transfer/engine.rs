//! Orchestrates fetch, map, chunk, import, and mark-complete for one
//! transfer run.
//!
//! Every run is one spawned task writing to its own registry entry. The only
//! pause point is the unmapped-values checkpoint: the run parks its state in
//! `pending` and ends, and [`TransferEngine::resolve_unmapped`] spawns the
//! import continuation once the caller decides.

use super::chunking::{chunk_values, retry_with_backoff, DEFAULT_CHUNK_SIZE};
use super::mapping::{apply_element_mapping, UnmappedReport};
use super::request::{TransferRequest, UnmappedDecision};
use super::summary::{ChunkFailure, TransferSummary};
use crate::log_error;
use crate::modules::profile::ProfileStore;
use crate::modules::remote::api::PlatformApi;
use crate::modules::remote::models::{CompletionRegistration, DataValue, ImportCount};
use crate::modules::tasks::{
    spawn_supervised, TaskKind, TaskProgress, TaskRegistry, TaskResult, TaskStatus, TaskUpdate,
};
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::{LogContext, TimedOperation};
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

// Fetch fills 0-70, imports 70-95, completion registration runs at 95.
const FETCH_SPAN: usize = 70;
const IMPORT_BASE: usize = 70;
const IMPORT_SPAN: usize = 25;
const COMPLETION_PROGRESS: u8 = 95;

#[derive(Debug, Clone)]
pub struct TransferConfig {
    pub chunk_size: usize,
    pub max_import_attempts: u32,
    pub import_retry_base_delay: Duration,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_import_attempts: 3,
            import_retry_base_delay: Duration::from_millis(500),
        }
    }
}

/// State parked at the unmapped checkpoint, keyed by task id.
struct PendingTransfer {
    request: TransferRequest,
    mapped: Vec<DataValue>,
    unmapped: Vec<DataValue>,
}

#[derive(Clone)]
pub struct TransferEngine {
    api: Arc<dyn PlatformApi>,
    profiles: Arc<ProfileStore>,
    registry: Arc<TaskRegistry>,
    config: TransferConfig,
    pending: Arc<DashMap<String, PendingTransfer>>,
}

impl TransferEngine {
    pub fn new(
        api: Arc<dyn PlatformApi>,
        profiles: Arc<ProfileStore>,
        registry: Arc<TaskRegistry>,
    ) -> Self {
        Self::with_config(api, profiles, registry, TransferConfig::default())
    }

    pub fn with_config(
        api: Arc<dyn PlatformApi>,
        profiles: Arc<ProfileStore>,
        registry: Arc<TaskRegistry>,
        config: TransferConfig,
    ) -> Self {
        Self {
            api,
            profiles,
            registry,
            config,
            pending: Arc::new(DashMap::new()),
        }
    }

    /// Validate, register a task, and hand the run off to a spawned worker.
    /// Configuration problems fail here, before any task exists.
    pub fn start_transfer(&self, request: TransferRequest) -> AppResult<String> {
        request.validate()?;
        self.profiles.get(&request.source_instance)?;
        self.profiles.get(&request.dest_instance)?;

        let task_id = Uuid::new_v4().to_string();
        self.registry.create(&task_id, TaskKind::Transfer)?;
        LogContext::task_event(&task_id, "transfer accepted");

        let engine = self.clone();
        let id = task_id.clone();
        spawn_supervised(Arc::clone(&self.registry), task_id.clone(), async move {
            engine.run_transfer(&id, request).await;
        });
        Ok(task_id)
    }

    pub fn get_progress(&self, task_id: &str) -> AppResult<TaskProgress> {
        self.registry
            .get(task_id)
            .ok_or_else(|| AppError::NotFound(format!("Task '{}' not found", task_id)))
    }

    /// Answer the unmapped-values checkpoint for a parked task.
    pub fn resolve_unmapped(&self, task_id: &str, decision: UnmappedDecision) -> AppResult<()> {
        let task = self.get_progress(task_id)?;
        if task.status != TaskStatus::AwaitingDecision {
            return Err(AppError::InvalidInput(format!(
                "Task '{}' is not awaiting a decision (status: {})",
                task_id, task.status
            )));
        }
        // The remove is the arbiter when two resolutions race.
        let (_, pending) = self.pending.remove(task_id).ok_or_else(|| {
            AppError::InvalidInput(format!(
                "Task '{}' has no pending unmapped decision",
                task_id
            ))
        })?;

        match decision {
            UnmappedDecision::Abandon => {
                self.registry.update(
                    task_id,
                    TaskUpdate::new().status(TaskStatus::Error).message(format!(
                        "Transfer abandoned with {} unmapped data values",
                        pending.unmapped.len()
                    )),
                );
                Ok(())
            }
            UnmappedDecision::SkipUnmapped => {
                let skipped = pending.unmapped.len() as u64;
                self.registry.update(
                    task_id,
                    TaskUpdate::new()
                        .status(TaskStatus::Running)
                        .message(format!("Skipping {} unmapped data values", skipped)),
                );
                self.spawn_import(task_id, pending.request, pending.mapped, skipped);
                Ok(())
            }
            UnmappedDecision::RetryWithMappings { mappings } => {
                if mappings.is_empty() {
                    // An empty mapping would count as identity and silently
                    // mark everything mapped. Park the checkpoint again.
                    self.pending.insert(task_id.to_string(), pending);
                    return Err(AppError::InvalidInput(
                        "Retry requires at least one additional mapping".to_string(),
                    ));
                }

                let outcome = apply_element_mapping(pending.unmapped, &mappings);
                let newly_mapped = outcome.mapped.len();
                let mut mapped = pending.mapped;
                mapped.extend(outcome.mapped);

                if !outcome.unmapped.is_empty() {
                    let report = UnmappedReport::from_values(&outcome.unmapped);
                    let remaining = outcome.unmapped.len();
                    self.pending.insert(
                        task_id.to_string(),
                        PendingTransfer {
                            request: pending.request,
                            mapped,
                            unmapped: outcome.unmapped,
                        },
                    );
                    self.registry.update(
                        task_id,
                        TaskUpdate::new()
                            .status(TaskStatus::AwaitingDecision)
                            .message(format!(
                                "{} data values remain unmapped after applying {} new mappings",
                                remaining,
                                mappings.len()
                            ))
                            .result(TaskResult::UnmappedValues(report)),
                    );
                    return Ok(());
                }

                self.registry.update(
                    task_id,
                    TaskUpdate::new().status(TaskStatus::Running).message(format!(
                        "Resolved {} previously unmapped data values",
                        newly_mapped
                    )),
                );
                self.spawn_import(task_id, pending.request, mapped, 0);
                Ok(())
            }
        }
    }

    fn spawn_import(
        &self,
        task_id: &str,
        request: TransferRequest,
        mapped: Vec<DataValue>,
        skipped: u64,
    ) {
        let engine = self.clone();
        let id = task_id.to_string();
        spawn_supervised(Arc::clone(&self.registry), task_id.to_string(), async move {
            engine.import_and_complete(&id, &request, mapped, skipped).await;
        });
    }

    async fn run_transfer(&self, task_id: &str, request: TransferRequest) {
        let timer = TimedOperation::new("data transfer");
        self.registry.update(
            task_id,
            TaskUpdate::new().status(TaskStatus::Running).message(format!(
                "Starting transfer of dataset '{}' from '{}' to '{}'",
                request.source_dataset, request.source_instance, request.dest_instance
            )),
        );

        let source = match self.profiles.get(&request.source_instance) {
            Ok(profile) => profile,
            Err(e) => {
                return self.fail_task(task_id, format!("Source instance unavailable: {}", e))
            }
        };

        let org_units = match self.api.fetch_user_org_units(&source).await {
            Ok(units) => units,
            Err(e) => {
                return self.fail_task(
                    task_id,
                    format!("Failed to discover organisation units: {}", e),
                )
            }
        };
        if org_units.is_empty() {
            return self.fail_task(
                task_id,
                format!(
                    "The account on '{}' has no organisation units assigned",
                    request.source_instance
                ),
            );
        }

        let total_pairs = org_units.len() * request.periods.len();
        self.registry.update(
            task_id,
            TaskUpdate::new().message(format!(
                "Fetching data for {} organisation units across {} periods",
                org_units.len(),
                request.periods.len()
            )),
        );

        // One call per (org unit, period) pair covers the whole subtree, so
        // request count stays bounded by assigned units, not hierarchy size.
        let mut all_values: Vec<DataValue> = Vec::new();
        let mut pairs_done = 0usize;
        for org_unit in &org_units {
            for period in &request.periods {
                let fetched = match self
                    .api
                    .fetch_data_values(&source, &request.source_dataset, &org_unit.id, period, true)
                    .await
                {
                    Ok(values) => values,
                    Err(e) => {
                        // Nothing is salvageable before import has started.
                        return self.fail_task(
                            task_id,
                            format!(
                                "Failed to fetch data values for {} ({}): {}",
                                org_unit.label(),
                                period,
                                e
                            ),
                        );
                    }
                };
                pairs_done += 1;
                self.registry.update(
                    task_id,
                    TaskUpdate::new()
                        .progress((pairs_done * FETCH_SPAN / total_pairs) as u8)
                        .message(format!(
                            "Fetched {} values from {} for {}",
                            fetched.len(),
                            org_unit.label(),
                            period
                        )),
                );
                all_values.extend(fetched);
            }
        }

        if all_values.is_empty() {
            self.registry.update(
                task_id,
                TaskUpdate::new()
                    .status(TaskStatus::Completed)
                    .message("No data values found to transfer")
                    .result(TaskResult::Transfer(TransferSummary::default())),
            );
            timer.finish_with_info("no data");
            return;
        }

        let outcome = apply_element_mapping(all_values, &request.element_mapping);
        if request.element_mapping.is_empty() {
            self.registry.update(
                task_id,
                TaskUpdate::new()
                    .message("No element mapping configured; element ids pass through unchanged"),
            );
        } else {
            self.registry.update(
                task_id,
                TaskUpdate::new().message(format!(
                    "Element mapping applied: {} mapped, {} unmapped",
                    outcome.mapped.len(),
                    outcome.unmapped.len()
                )),
            );
        }

        if !outcome.unmapped.is_empty() {
            let report = UnmappedReport::from_values(&outcome.unmapped);
            self.pending.insert(
                task_id.to_string(),
                PendingTransfer {
                    request,
                    mapped: outcome.mapped,
                    unmapped: outcome.unmapped,
                },
            );
            // Pending state is in place before the status flips, so a caller
            // reacting to the broadcast can resolve immediately.
            self.registry.update(
                task_id,
                TaskUpdate::new()
                    .status(TaskStatus::AwaitingDecision)
                    .message(format!(
                        "{} data values reference {} unmapped data elements; awaiting decision",
                        report.value_count,
                        report.unmapped_elements.len()
                    ))
                    .result(TaskResult::UnmappedValues(report)),
            );
            timer.finish_with_info("awaiting unmapped decision");
            return;
        }

        self.import_and_complete(task_id, &request, outcome.mapped, 0).await;
        timer.finish();
    }

    /// Import phase plus optional completion registration. `skipped` counts
    /// unmapped values dropped by an earlier skip decision.
    async fn import_and_complete(
        &self,
        task_id: &str,
        request: &TransferRequest,
        mapped: Vec<DataValue>,
        skipped: u64,
    ) {
        let dest = match self.profiles.get(&request.dest_instance) {
            Ok(profile) => profile,
            Err(e) => {
                return self.fail_task(
                    task_id,
                    format!("Destination instance unavailable: {}", e),
                )
            }
        };

        if mapped.is_empty() {
            let summary = TransferSummary {
                total_values: skipped,
                skipped_values: skipped,
                ..Default::default()
            };
            self.registry.update(
                task_id,
                TaskUpdate::new()
                    .status(TaskStatus::Completed)
                    .message("No mapped data values to import")
                    .result(TaskResult::Transfer(summary)),
            );
            return;
        }

        let chunks = chunk_values(&mapped, self.config.chunk_size);
        let chunk_count = chunks.len();
        self.registry.update(
            task_id,
            TaskUpdate::new()
                .progress(IMPORT_BASE as u8)
                .message(format!(
                    "Importing {} data values to '{}' in {} chunks",
                    mapped.len(),
                    request.dest_instance,
                    chunk_count
                )),
        );

        let mut totals = ImportCount::default();
        let mut failures: Vec<ChunkFailure> = Vec::new();
        let mut completed_pairs: BTreeSet<(String, String)> = BTreeSet::new();

        for (index, chunk) in chunks.iter().enumerate() {
            let chunk_number = index + 1;
            let operation = format!("Import chunk {}/{}", chunk_number, chunk_count);
            let attempt = retry_with_backoff(
                self.config.max_import_attempts,
                self.config.import_retry_base_delay,
                &operation,
                || self.api.import_data_values(&dest, chunk),
            )
            .await;

            match attempt {
                Ok(import_summary) => {
                    let counts = import_summary.effective_counts();
                    totals.accumulate(&counts);
                    for value in chunk {
                        completed_pairs.insert((value.org_unit.clone(), value.period.clone()));
                    }
                    if !import_summary.conflicts.is_empty() {
                        self.registry.update(
                            task_id,
                            TaskUpdate::new().message(format!(
                                "Chunk {}/{}: {} import conflicts reported",
                                chunk_number,
                                chunk_count,
                                import_summary.conflicts.len()
                            )),
                        );
                    }
                    self.registry.update(
                        task_id,
                        TaskUpdate::new()
                            .progress(import_progress(chunk_number, chunk_count))
                            .message(format!(
                                "Chunk {}/{} imported: {} imported, {} updated, {} ignored",
                                chunk_number,
                                chunk_count,
                                counts.imported,
                                counts.updated,
                                counts.ignored
                            )),
                    );
                }
                Err(e) => {
                    // Remaining chunks are independent; keep going.
                    failures.push(ChunkFailure {
                        chunk_index: chunk_number,
                        value_count: chunk.len(),
                        error: e.to_string(),
                    });
                    self.registry.update(
                        task_id,
                        TaskUpdate::new()
                            .progress(import_progress(chunk_number, chunk_count))
                            .message(e.to_string()),
                    );
                }
            }
        }

        let mut summary = TransferSummary {
            total_values: mapped.len() as u64 + skipped,
            mapped_values: mapped.len() as u64,
            skipped_values: skipped,
            imported: totals.imported,
            updated: totals.updated,
            ignored: totals.ignored,
            deleted: totals.deleted,
            chunks_total: chunk_count,
            failed_chunks: failures,
            completions_registered: 0,
        };

        if summary.chunks_succeeded() == 0 {
            let message = format!("Import failed: all {} chunks failed", chunk_count);
            log_error!("Transfer task {}: {}", task_id, message);
            self.registry.update(
                task_id,
                TaskUpdate::new()
                    .status(TaskStatus::Error)
                    .message(message)
                    .result(TaskResult::Transfer(summary)),
            );
            return;
        }

        if request.mark_complete {
            self.registry.update(
                task_id,
                TaskUpdate::new()
                    .progress(COMPLETION_PROGRESS)
                    .message(format!(
                        "Registering completion for {} organisation unit/period pairs",
                        completed_pairs.len()
                    )),
            );
            let registrations: Vec<CompletionRegistration> = completed_pairs
                .iter()
                .map(|(org_unit, period)| {
                    CompletionRegistration::new(
                        &request.dest_dataset,
                        period,
                        org_unit,
                        true,
                        &dest.username,
                    )
                })
                .collect();
            match self.api.register_completions(&dest, &registrations).await {
                Ok(()) => {
                    summary.completions_registered = registrations.len() as u64;
                    self.registry.update(
                        task_id,
                        TaskUpdate::new().message(format!(
                            "Marked {} pairs complete on '{}'",
                            registrations.len(),
                            request.dest_instance
                        )),
                    );
                }
                Err(e) => {
                    // Imports already landed; completion failure is a warning.
                    self.registry.update(
                        task_id,
                        TaskUpdate::new()
                            .message(format!("Completion registration failed: {}", e)),
                    );
                }
            }
        }

        let final_message = format!(
            "Transfer finished: {} imported, {} updated, {} ignored, {}/{} chunks succeeded",
            summary.imported,
            summary.updated,
            summary.ignored,
            summary.chunks_succeeded(),
            summary.chunks_total
        );
        self.registry.update(
            task_id,
            TaskUpdate::new()
                .status(TaskStatus::Completed)
                .message(final_message)
                .result(TaskResult::Transfer(summary)),
        );
    }

    fn fail_task(&self, task_id: &str, message: String) {
        log_error!("Transfer task {} failed: {}", task_id, message);
        self.registry.update(
            task_id,
            TaskUpdate::new().status(TaskStatus::Error).message(message),
        );
    }
}

fn import_progress(chunk_number: usize, chunk_count: usize) -> u8 {
    (IMPORT_BASE + IMPORT_SPAN * chunk_number / chunk_count) as u8
}
