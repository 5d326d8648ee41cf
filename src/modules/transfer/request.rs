use crate::shared::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Caller-supplied description of one transfer run. Immutable once accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    /// Profile id of the instance to read from.
    pub source_instance: String,
    /// Profile id of the instance to write to.
    pub dest_instance: String,
    pub source_dataset: String,
    /// Dataset id on the destination. May differ from the source id.
    pub dest_dataset: String,
    pub periods: Vec<String>,
    /// Source element id to destination element id. Empty means the two
    /// instances share element ids and values pass through unchanged.
    #[serde(default)]
    pub element_mapping: HashMap<String, String>,
    /// Register completion on the destination for every pair that received
    /// at least one value.
    #[serde(default)]
    pub mark_complete: bool,
}

impl TransferRequest {
    pub fn validate(&self) -> AppResult<()> {
        if self.source_instance.trim().is_empty() {
            return Err(AppError::ValidationError(
                "Source instance id cannot be empty".to_string(),
            ));
        }
        if self.dest_instance.trim().is_empty() {
            return Err(AppError::ValidationError(
                "Destination instance id cannot be empty".to_string(),
            ));
        }
        if self.source_dataset.trim().is_empty() || self.dest_dataset.trim().is_empty() {
            return Err(AppError::ValidationError(
                "Source and destination dataset ids are required".to_string(),
            ));
        }
        if self.periods.is_empty() {
            return Err(AppError::ValidationError(
                "At least one period is required".to_string(),
            ));
        }
        if self.periods.iter().any(|p| p.trim().is_empty()) {
            return Err(AppError::ValidationError(
                "Periods cannot be blank".to_string(),
            ));
        }
        Ok(())
    }
}

/// Caller's answer to the unmapped-values checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum UnmappedDecision {
    /// Apply additional mappings to the unmapped values and continue. Values
    /// still unmapped afterwards park the task again.
    RetryWithMappings { mappings: HashMap<String, String> },
    /// Drop the unmapped values and import only the mapped subset.
    SkipUnmapped,
    /// Stop the transfer without importing anything.
    Abandon,
}
