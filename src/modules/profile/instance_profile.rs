use crate::shared::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// One configured platform instance: base URL plus basic credentials.
///
/// Credentials are resolved by the caller (the credential store lives outside
/// this crate); profiles arrive here ready to use. Every request object
/// references profiles by id, so there is no process-wide "selected instance".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceProfile {
    pub id: String,
    pub name: String,
    pub base_url: String,
    pub username: String,
    pub password: String,
}

impl InstanceProfile {
    pub fn new(id: &str, name: &str, base_url: &str, username: &str, password: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            base_url: base_url.to_string(),
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.id.trim().is_empty() {
            return Err(AppError::ValidationError(
                "Profile id must not be empty".to_string(),
            ));
        }
        if self.username.trim().is_empty() {
            return Err(AppError::ValidationError(format!(
                "Profile '{}' has no username",
                self.id
            )));
        }
        let url = reqwest::Url::parse(&self.base_url).map_err(|e| {
            AppError::ValidationError(format!("Profile '{}' has an invalid base URL: {}", self.id, e))
        })?;
        match url.scheme() {
            "http" | "https" => Ok(()),
            other => Err(AppError::ValidationError(format!(
                "Profile '{}' uses unsupported scheme '{}'",
                self.id, other
            ))),
        }
    }

    /// Join an API endpoint onto the base URL, normalizing slashes.
    pub fn api_url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(base_url: &str) -> InstanceProfile {
        InstanceProfile::new("hq", "Headquarters", base_url, "admin", "district")
    }

    #[test]
    fn valid_profile_passes_validation() {
        assert!(profile("https://play.dhis2.org/demo").validate().is_ok());
    }

    #[test]
    fn rejects_malformed_base_url() {
        let err = profile("not a url").validate().unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[test]
    fn rejects_non_http_scheme() {
        let err = profile("ftp://example.org").validate().unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[test]
    fn rejects_blank_id() {
        let mut p = profile("https://example.org");
        p.id = "  ".to_string();
        assert!(p.validate().is_err());
    }

    #[test]
    fn api_url_normalizes_slashes() {
        let p = profile("https://example.org/");
        assert_eq!(p.api_url("/api/me.json"), "https://example.org/api/me.json");
        assert_eq!(p.api_url("api/me.json"), "https://example.org/api/me.json");
    }
}
