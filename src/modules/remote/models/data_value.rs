use serde::{Deserialize, Serialize};

/// One aggregate data value as carried by the platform wire format.
///
/// Identity is the (dataElement, period, orgUnit, categoryOptionCombo)
/// composite; `value` is a string whose interpretation depends on the
/// element's value type. An empty string counts as "absent" everywhere in
/// this crate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DataValue {
    pub data_element: String,
    pub period: String,
    pub org_unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_option_combo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute_option_combo: Option<String>,
    #[serde(default)]
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up: Option<bool>,
}

impl DataValue {
    pub fn has_value(&self) -> bool {
        !self.value.trim().is_empty()
    }
}

/// Envelope for `api/dataValueSets` responses and import bodies.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataValueSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_set: Option<String>,
    #[serde(default)]
    pub data_values: Vec<DataValue>,
}

impl DataValueSet {
    /// Import body wrapping a batch of values.
    pub fn for_import(values: &[DataValue]) -> Self {
        Self {
            data_set: None,
            data_values: values.to_vec(),
        }
    }
}

/// Shorthand used across unit tests in this crate.
#[cfg(test)]
pub(crate) fn test_value(element: &str, org_unit: &str, period: &str, value: &str) -> DataValue {
    DataValue {
        data_element: element.to_string(),
        period: period.to_string(),
        org_unit: org_unit.to_string(),
        category_option_combo: None,
        attribute_option_combo: None,
        value: value.to_string(),
        comment: None,
        follow_up: None,
    }
}
