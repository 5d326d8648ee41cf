//! Per-unit compliance scoring.

use crate::modules::remote::models::OrgUnit;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Compliance of one organisation unit for the period that last assessed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrgUnitCompliance {
    pub org_unit: String,
    pub name: String,
    /// Period that produced this record. When several periods are assessed,
    /// the last one processed wins.
    pub period: String,
    pub elements_present: u64,
    pub elements_required: u64,
    /// Percentage rounded to one decimal. The rounded value is what gets
    /// compared against the threshold.
    pub compliance_percentage: f64,
    pub compliant: bool,
    /// True when the unit reported anything at all, required or not.
    pub has_data: bool,
    pub missing_elements: Vec<String>,
}

/// Aggregated outcome of one assessment run. Counters sum across periods;
/// `compliance_details` holds one record per unit, keyed by org-unit id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssessmentResult {
    pub dataset: String,
    pub threshold: u8,
    pub periods: Vec<String>,
    pub compliant_count: u64,
    pub non_compliant_count: u64,
    pub error_count: u64,
    pub compliance_details: BTreeMap<String, OrgUnitCompliance>,
    /// Fetch failures keyed by "parent/period". These blocks contributed no
    /// compliance records.
    pub failures: BTreeMap<String, String>,
}

impl AssessmentResult {
    pub fn assessed_units(&self) -> u64 {
        self.compliance_details.len() as u64
    }
}

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Score one unit against the required element list. A unit absent from the
/// fetched data still gets a record here, at 0%.
pub fn score_unit(
    unit: &OrgUnit,
    present_elements: &HashSet<String>,
    required_elements: &[String],
    threshold: u8,
    period: &str,
) -> OrgUnitCompliance {
    let elements_required = required_elements.len() as u64;
    let elements_present = required_elements
        .iter()
        .filter(|element| present_elements.contains(*element))
        .count() as u64;

    let compliance_percentage = if elements_required == 0 {
        0.0
    } else {
        round1(elements_present as f64 / elements_required as f64 * 100.0)
    };

    let mut missing_elements: Vec<String> = required_elements
        .iter()
        .filter(|element| !present_elements.contains(*element))
        .cloned()
        .collect();
    missing_elements.sort();

    OrgUnitCompliance {
        org_unit: unit.id.clone(),
        name: unit.label().to_string(),
        period: period.to_string(),
        elements_present,
        elements_required,
        compliance_percentage,
        compliant: compliance_percentage >= threshold as f64,
        has_data: !present_elements.is_empty(),
        missing_elements,
    }
}
