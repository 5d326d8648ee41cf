use chrono::Utc;
use serde::{Deserialize, Serialize};

/// One completion-data-set-registration entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRegistration {
    pub data_set: String,
    pub period: String,
    pub organisation_unit: String,
    pub completed: bool,
    pub complete_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stored_by: Option<String>,
}

impl CompletionRegistration {
    /// Build an entry stamped with today's date.
    pub fn new(
        data_set: &str,
        period: &str,
        organisation_unit: &str,
        completed: bool,
        stored_by: &str,
    ) -> Self {
        Self {
            data_set: data_set.to_string(),
            period: period.to_string(),
            organisation_unit: organisation_unit.to_string(),
            completed,
            complete_date: Utc::now().format("%Y-%m-%d").to_string(),
            stored_by: if stored_by.is_empty() {
                None
            } else {
                Some(stored_by.to_string())
            },
        }
    }
}

/// Batch payload for `api/completeDataSetRegistrations`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionBatch {
    pub complete_data_set_registrations: Vec<CompletionRegistration>,
}

impl CompletionBatch {
    pub fn new(registrations: Vec<CompletionRegistration>) -> Self {
        Self {
            complete_data_set_registrations: registrations,
        }
    }
}
