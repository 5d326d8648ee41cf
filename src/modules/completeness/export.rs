//! Render a finished assessment as JSON or CSV.

use super::scoring::AssessmentResult;
use crate::shared::errors::AppResult;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    Json,
    Csv,
}

/// Full result as pretty JSON. `limit` caps the compliance records for
/// previews; counters always reflect the whole run.
pub fn to_json(result: &AssessmentResult, limit: Option<usize>) -> AppResult<String> {
    match limit {
        Some(cap) if result.compliance_details.len() > cap => {
            let mut preview = result.clone();
            preview.compliance_details = preview
                .compliance_details
                .into_iter()
                .take(cap)
                .collect();
            Ok(serde_json::to_string_pretty(&preview)?)
        }
        _ => Ok(serde_json::to_string_pretty(result)?),
    }
}

/// One row per unit, ordered by org-unit id.
pub fn to_csv(result: &AssessmentResult) -> String {
    let mut out = String::from(
        "org_unit_id,name,compliance_percentage,elements_present,elements_required\n",
    );
    for record in result.compliance_details.values() {
        out.push_str(&format!(
            "{},{},{:.1},{},{}\n",
            csv_field(&record.org_unit),
            csv_field(&record.name),
            record.compliance_percentage,
            record.elements_present,
            record.elements_required
        ));
    }
    out
}

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::completeness::scoring::OrgUnitCompliance;

    fn record(id: &str, name: &str, percentage: f64) -> OrgUnitCompliance {
        OrgUnitCompliance {
            org_unit: id.to_string(),
            name: name.to_string(),
            period: "202401".to_string(),
            elements_present: 1,
            elements_required: 2,
            compliance_percentage: percentage,
            compliant: percentage >= 50.0,
            has_data: percentage > 0.0,
            missing_elements: Vec::new(),
        }
    }

    fn result_with(records: Vec<OrgUnitCompliance>) -> AssessmentResult {
        let mut result = AssessmentResult {
            dataset: "ds1".to_string(),
            threshold: 50,
            periods: vec!["202401".to_string()],
            ..Default::default()
        };
        for r in records {
            result.compliance_details.insert(r.org_unit.clone(), r);
        }
        result
    }

    #[test]
    fn csv_has_header_and_sorted_rows() {
        let result = result_with(vec![
            record("zz", "Last", 50.0),
            record("aa", "First", 100.0),
        ]);
        let csv = to_csv(&result);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "org_unit_id,name,compliance_percentage,elements_present,elements_required"
        );
        assert_eq!(lines[1], "aa,First,100.0,1,2");
        assert_eq!(lines[2], "zz,Last,50.0,1,2");
    }

    #[test]
    fn csv_quotes_awkward_names() {
        let result = result_with(vec![record("ou1", "Bo, \"Central\" Clinic", 75.0)]);
        let csv = to_csv(&result);
        assert!(csv.contains("\"Bo, \"\"Central\"\" Clinic\""));
    }

    #[test]
    fn json_limit_caps_records_but_not_counters() {
        let mut result = result_with(vec![
            record("a", "A", 10.0),
            record("b", "B", 20.0),
            record("c", "C", 30.0),
        ]);
        result.non_compliant_count = 3;

        let json = to_json(&result, Some(2)).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["compliance_details"].as_object().unwrap().len(), 2);
        assert!(parsed["compliance_details"].get("a").is_some());
        assert!(parsed["compliance_details"].get("c").is_none());
        assert_eq!(parsed["non_compliant_count"], 3);
    }

    #[test]
    fn json_without_limit_is_complete() {
        let result = result_with(vec![record("a", "A", 10.0), record("b", "B", 20.0)]);
        let json = to_json(&result, None).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["compliance_details"].as_object().unwrap().len(), 2);
    }
}
