use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetListResponse {
    #[serde(default)]
    pub data_sets: Vec<Dataset>,
}

/// `api/dataSets/{id}?fields=dataSetElements[dataElement[id]]`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetElementsResponse {
    #[serde(default)]
    pub data_set_elements: Vec<DatasetElement>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetElement {
    pub data_element: ElementRef,
}

#[derive(Debug, Deserialize)]
pub struct ElementRef {
    pub id: String,
}

impl DatasetElementsResponse {
    pub fn element_ids(self) -> Vec<String> {
        self.data_set_elements
            .into_iter()
            .map(|e| e.data_element.id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_element_ids() {
        let json = r#"{
            "dataSetElements": [
                {"dataElement": {"id": "de-a"}},
                {"dataElement": {"id": "de-b"}}
            ]
        }"#;
        let parsed: DatasetElementsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.element_ids(), vec!["de-a", "de-b"]);
    }

    #[test]
    fn dataset_list_parses() {
        let json = r#"{"dataSets": [{"id": "ds1", "name": "Morbidity", "periodType": "Monthly"}]}"#;
        let parsed: DatasetListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.data_sets[0].period_type.as_deref(), Some("Monthly"));
    }
}
