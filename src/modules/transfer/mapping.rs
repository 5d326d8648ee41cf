use crate::modules::remote::models::DataValue;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Result of pushing a batch through the element mapping.
#[derive(Debug, Clone, Default)]
pub struct MappingOutcome {
    /// Values whose element id was rewritten to the destination id, or passed
    /// through unchanged under an identity mapping.
    pub mapped: Vec<DataValue>,
    /// Values whose element id has no entry in the mapping.
    pub unmapped: Vec<DataValue>,
}

/// Partition a batch against the element mapping. An empty mapping means the
/// two instances share element ids, so everything maps to itself.
pub fn apply_element_mapping(
    values: Vec<DataValue>,
    mapping: &HashMap<String, String>,
) -> MappingOutcome {
    if mapping.is_empty() {
        return MappingOutcome {
            mapped: values,
            unmapped: Vec::new(),
        };
    }

    let mut outcome = MappingOutcome::default();
    for mut value in values {
        match mapping.get(&value.data_element) {
            Some(dest_element) => {
                value.data_element = dest_element.clone();
                outcome.mapped.push(value);
            }
            None => outcome.unmapped.push(value),
        }
    }
    outcome
}

/// Attached to a parked task so the caller can see exactly which elements
/// need a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmappedReport {
    /// Distinct unmapped element ids, sorted for stable output.
    pub unmapped_elements: Vec<String>,
    /// Number of data values affected.
    pub value_count: u64,
}

impl UnmappedReport {
    pub fn from_values(values: &[DataValue]) -> Self {
        let elements: BTreeSet<&str> = values.iter().map(|v| v.data_element.as_str()).collect();
        Self {
            unmapped_elements: elements.into_iter().map(str::to_string).collect(),
            value_count: values.len() as u64,
        }
    }
}
