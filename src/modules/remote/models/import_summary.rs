use crate::shared::errors::{AppError, AppResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Counts reported by the bulk import endpoint.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImportCount {
    #[serde(default)]
    pub imported: u64,
    #[serde(default)]
    pub updated: u64,
    #[serde(default)]
    pub ignored: u64,
    #[serde(default)]
    pub deleted: u64,
}

impl ImportCount {
    pub fn is_zero(&self) -> bool {
        self.imported == 0 && self.updated == 0 && self.ignored == 0 && self.deleted == 0
    }

    pub fn accumulate(&mut self, other: &ImportCount) {
        self.imported += other.imported;
        self.updated += other.updated;
        self.ignored += other.ignored;
        self.deleted += other.deleted;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImportConflict {
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

/// Response of a synchronous bulk data-value import.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub import_count: ImportCount,
    #[serde(default)]
    pub conflicts: Vec<ImportConflict>,
}

impl ImportSummary {
    /// Parse a summary from a raw response body. Newer platform versions wrap
    /// the summary in a `response` object; older ones return it directly.
    pub fn from_response_value(body: serde_json::Value) -> AppResult<ImportSummary> {
        let summary_value = match body.get("response") {
            Some(inner) if inner.is_object() => inner.clone(),
            _ => body,
        };
        serde_json::from_value(summary_value)
            .map_err(|e| AppError::SerializationError(format!("Unreadable import summary: {}", e)))
    }

    /// The counts to report for this summary.
    ///
    /// Some platform versions zero the structured count block and only state
    /// the outcome in the description text; fall back to parsing that text so
    /// the transfer summary stays truthful.
    pub fn effective_counts(&self) -> ImportCount {
        if !self.import_count.is_zero() {
            return self.import_count;
        }
        self.description
            .as_deref()
            .and_then(parse_summary_description)
            .unwrap_or(self.import_count)
    }

    pub fn is_error(&self) -> bool {
        matches!(self.status.as_deref(), Some("ERROR"))
    }
}

static SUMMARY_PATTERN: OnceLock<Regex> = OnceLock::new();

/// Parse `"N created, N updated, N deleted, N ignored"` out of a summary
/// description. `created` maps onto the imported count.
pub fn parse_summary_description(description: &str) -> Option<ImportCount> {
    let pattern = SUMMARY_PATTERN.get_or_init(|| {
        Regex::new(r"(\d+)\s+created,\s+(\d+)\s+updated,\s+(\d+)\s+deleted,\s+(\d+)\s+ignored")
            .unwrap()
    });
    let captures = pattern.captures(description)?;
    let number = |idx: usize| captures.get(idx)?.as_str().parse::<u64>().ok();
    Some(ImportCount {
        imported: number(1)?,
        updated: number(2)?,
        deleted: number(3)?,
        ignored: number(4)?,
    })
}
