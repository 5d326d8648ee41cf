use serde::{Deserialize, Serialize};

/// A node in the organisation-unit hierarchy.
///
/// `level` counts from 1 at the root; `path` is the slash-separated ancestor
/// id chain as the platform delivers it (`/root/../self`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrgUnit {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl OrgUnit {
    /// Prefer the localized display name when the platform sends one.
    pub fn label(&self) -> &str {
        match self.display_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.name,
        }
    }
}

/// Envelope for org-unit list endpoints.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgUnitListResponse {
    #[serde(default)]
    pub organisation_units: Vec<OrgUnit>,
}

/// Envelope for `api/me`: the org units attached to the authenticated account.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    #[serde(default)]
    pub organisation_units: Vec<OrgUnit>,
}
