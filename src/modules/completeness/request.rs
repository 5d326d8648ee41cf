use crate::shared::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Caller-supplied description of one assessment run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentRequest {
    /// Profile id of the instance to assess.
    pub instance: String,
    pub dataset: String,
    pub periods: Vec<String>,
    /// Roots of the subtrees to walk. Every descendant is assessed.
    pub parent_org_units: Vec<String>,
    /// Element ids a unit must report to count as complete. Empty means
    /// "use the dataset's own element list".
    #[serde(default)]
    pub required_elements: Vec<String>,
    /// Minimum compliance percentage, 0-100. A unit at exactly the threshold
    /// is compliant.
    pub threshold: u8,
    /// Score the parent units themselves, not only their descendants.
    #[serde(default)]
    pub include_parents: bool,
}

impl AssessmentRequest {
    pub fn validate(&self) -> AppResult<()> {
        if self.instance.trim().is_empty() {
            return Err(AppError::ValidationError(
                "Instance id cannot be empty".to_string(),
            ));
        }
        if self.dataset.trim().is_empty() {
            return Err(AppError::ValidationError(
                "Dataset id cannot be empty".to_string(),
            ));
        }
        if self.periods.is_empty() || self.periods.iter().any(|p| p.trim().is_empty()) {
            return Err(AppError::ValidationError(
                "At least one non-blank period is required".to_string(),
            ));
        }
        if self.parent_org_units.is_empty()
            || self.parent_org_units.iter().any(|p| p.trim().is_empty())
        {
            return Err(AppError::ValidationError(
                "At least one parent organisation unit is required".to_string(),
            ));
        }
        if self.threshold > 100 {
            return Err(AppError::ValidationError(
                "Threshold must be between 0 and 100".to_string(),
            ));
        }
        Ok(())
    }
}

/// One (org unit, period) pair targeted by a bulk completion action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgUnitPeriod {
    pub org_unit: String,
    pub period: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkCompletionAction {
    MarkComplete,
    MarkIncomplete,
}

impl BulkCompletionAction {
    pub fn label(&self) -> &'static str {
        match self {
            BulkCompletionAction::MarkComplete => "complete",
            BulkCompletionAction::MarkIncomplete => "incomplete",
        }
    }
}

/// Explicit pair list rather than a subtree: callers correcting completion
/// state need per-pair failure isolation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkActionRequest {
    pub instance: String,
    pub dataset: String,
    pub pairs: Vec<OrgUnitPeriod>,
    pub action: BulkCompletionAction,
}

impl BulkActionRequest {
    pub fn validate(&self) -> AppResult<()> {
        if self.instance.trim().is_empty() || self.dataset.trim().is_empty() {
            return Err(AppError::ValidationError(
                "Instance and dataset ids are required".to_string(),
            ));
        }
        if self.pairs.is_empty() {
            return Err(AppError::ValidationError(
                "At least one organisation unit/period pair is required".to_string(),
            ));
        }
        if self
            .pairs
            .iter()
            .any(|p| p.org_unit.trim().is_empty() || p.period.trim().is_empty())
        {
            return Err(AppError::ValidationError(
                "Pairs cannot contain blank ids or periods".to_string(),
            ));
        }
        Ok(())
    }
}

/// Terminal result of a bulk completion action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkActionSummary {
    pub action: BulkCompletionAction,
    pub total_pairs: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub failures: Vec<PairFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairFailure {
    pub org_unit: String,
    pub period: String,
    pub error: String,
}
