//! HTTP client for DHIS2-style instances with pacing and retry logic.
//!
//! One client serves every configured profile: the connection pool is shared,
//! request pacing is tracked per base URL, and basic-auth credentials are
//! applied per request from the profile passed in.

use super::retry_policy::{is_retryable_error, is_retryable_status, RateLimitInfo, RetryPolicy};
use crate::modules::profile::InstanceProfile;
use crate::modules::remote::api::PlatformApi;
use crate::modules::remote::models::{
    CompletionBatch, CompletionRegistration, DataValue, DataValueSet, Dataset,
    DatasetElementsResponse, DatasetListResponse, ImportSummary, MeResponse, OrgUnit,
    OrgUnitListResponse,
};
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::LogContext;
use async_trait::async_trait;
use dashmap::DashMap;
use governor::{Quota, RateLimiter as GovernorRateLimiter};
use reqwest::{Client, Method, Response, StatusCode};
use serde_json::Value;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;

type Pacer = GovernorRateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
    governor::middleware::NoOpMiddleware,
>;

const USER_AGENT: &str = "hmis-sync/0.1";
const ORG_UNIT_FIELDS: &str = "id,name,displayName,level,path";

/// Tunables for the shared client.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Per-request timeout. Generous because the synchronous bulk-import
    /// endpoint can take minutes per chunk on slow deployments.
    pub request_timeout: Duration,
    pub retry_policy: RetryPolicy,
    /// Client-side pacing per instance host.
    pub requests_per_second: f64,
    pub burst_size: u32,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(600),
            retry_policy: RetryPolicy::platform_default(),
            requests_per_second: 10.0,
            burst_size: 20,
        }
    }
}

pub struct RemoteClient {
    client: Client,
    settings: ClientSettings,
    pacers: DashMap<String, Arc<Pacer>>,
    name_cache: DashMap<String, String>,
}

impl RemoteClient {
    pub fn new() -> AppResult<Self> {
        Self::with_settings(ClientSettings::default())
    }

    pub fn with_settings(settings: ClientSettings) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(settings.request_timeout)
            .pool_max_idle_per_host(8)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            settings,
            pacers: DashMap::new(),
            name_cache: DashMap::new(),
        })
    }

    /// One pacer per base URL so two instances never throttle each other.
    fn pacer_for(&self, base_url: &str) -> Arc<Pacer> {
        if let Some(existing) = self.pacers.get(base_url) {
            return Arc::clone(existing.value());
        }
        let pacer = Arc::new(build_pacer(
            self.settings.requests_per_second,
            self.settings.burst_size,
        ));
        self.pacers
            .entry(base_url.to_string())
            .or_insert(pacer)
            .clone()
    }

    /// GET with per-request retry for transient 429/5xx responses.
    async fn get_json<T>(
        &self,
        profile: &InstanceProfile,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> AppResult<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let policy = &self.settings.retry_policy;
        let url = profile.api_url(endpoint);
        let pacer = self.pacer_for(&profile.base_url);
        let started = Instant::now();
        let mut last_error: Option<AppError> = None;

        for attempt in 0..=policy.max_retries {
            pacer.until_ready().await;

            match self.send(profile, Method::GET, &url, query, None).await {
                Ok(response) => {
                    let status = response.status();

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        let info = RateLimitInfo::from_headers(response.headers());
                        if attempt < policy.max_retries {
                            let delay =
                                policy.calculate_delay(attempt, info.recommended_delay());
                            log::warn!(
                                "{} rate limited {} (attempt {}/{}). Waiting {:?} before retry",
                                profile.name,
                                endpoint,
                                attempt + 1,
                                policy.max_retries + 1,
                                delay
                            );
                            sleep(delay).await;
                            continue;
                        }
                        return Err(AppError::RateLimitError(format!(
                            "{} still rate limited after {} attempts",
                            endpoint,
                            policy.max_retries + 1
                        )));
                    }

                    if !status.is_success() {
                        if is_retryable_status(status.as_u16()) && attempt < policy.max_retries {
                            let delay = policy.calculate_delay(attempt, None);
                            log::warn!(
                                "{} returned {} for {} (attempt {}/{}). Retrying in {:?}",
                                profile.name,
                                status,
                                endpoint,
                                attempt + 1,
                                policy.max_retries + 1,
                                delay
                            );
                            sleep(delay).await;
                            continue;
                        }
                        return Err(Self::status_error(status, endpoint, response).await);
                    }

                    let parsed = Self::parse_json(endpoint, response).await?;
                    LogContext::api_call(
                        &profile.name,
                        endpoint,
                        "OK",
                        Some(started.elapsed().as_millis() as u64),
                    );
                    return Ok(parsed);
                }
                Err(e) => {
                    let retryable = is_retryable_error(&e) && attempt < policy.max_retries;
                    last_error = Some(e.into());
                    if retryable {
                        let delay = policy.calculate_delay(attempt, None);
                        log::warn!(
                            "Request to {} {} failed (attempt {}/{}). Retrying in {:?}",
                            profile.name,
                            endpoint,
                            attempt + 1,
                            policy.max_retries + 1,
                            delay
                        );
                        sleep(delay).await;
                        continue;
                    }
                    return Err(last_error.unwrap_or_else(|| {
                        AppError::ExternalServiceError(format!("{} request failed", endpoint))
                    }));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            AppError::ExternalServiceError(format!(
                "{} failed after {} attempts",
                endpoint,
                policy.max_retries + 1
            ))
        }))
    }

    /// POST without request-level retries. Imports are retried at the chunk
    /// level by the transfer engine; bulk-action pairs record their own
    /// failures.
    async fn post_json(
        &self,
        profile: &InstanceProfile,
        endpoint: &str,
        query: &[(&str, String)],
        body: &Value,
    ) -> AppResult<Value> {
        let url = profile.api_url(endpoint);
        self.pacer_for(&profile.base_url).until_ready().await;
        let started = Instant::now();

        let response = self
            .send(profile, Method::POST, &url, query, Some(body))
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Self::status_error(status, endpoint, response).await);
        }
        let parsed = Self::parse_json(endpoint, response).await?;
        LogContext::api_call(
            &profile.name,
            endpoint,
            "OK",
            Some(started.elapsed().as_millis() as u64),
        );
        Ok(parsed)
    }

    async fn send(
        &self,
        profile: &InstanceProfile,
        method: Method,
        url: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Response, reqwest::Error> {
        let mut request = self
            .client
            .request(method, url)
            .basic_auth(&profile.username, Some(&profile.password))
            .header("Accept", "application/json");
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(json_body) = body {
            request = request.json(json_body);
        }
        request.send().await
    }

    async fn parse_json<T>(endpoint: &str, response: Response) -> AppResult<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let text = response.text().await.map_err(|e| {
            AppError::SerializationError(format!("Failed to read {} response: {}", endpoint, e))
        })?;
        serde_json::from_str(&text).map_err(|e| {
            AppError::SerializationError(format!(
                "Failed to parse {} response: {}. Response: {}",
                endpoint,
                e,
                snippet(&text)
            ))
        })
    }

    async fn status_error(status: StatusCode, endpoint: &str, response: Response) -> AppError {
        let body = response.text().await.unwrap_or_default();
        match status.as_u16() {
            401 | 403 => AppError::Unauthorized(format!(
                "{} rejected the credentials (HTTP {})",
                endpoint, status
            )),
            404 => AppError::NotFound(format!("{} not found on the instance", endpoint)),
            429 => AppError::RateLimitError(format!("{} rate limited", endpoint)),
            _ => AppError::ApiError(format!(
                "{} returned HTTP {}: {}",
                endpoint,
                status,
                snippet(&body)
            )),
        }
    }

    async fn fetch_org_units_filtered(
        &self,
        profile: &InstanceProfile,
        filter: String,
    ) -> AppResult<Vec<OrgUnit>> {
        let response: OrgUnitListResponse = self
            .get_json(
                profile,
                "api/organisationUnits.json",
                &[
                    ("filter", filter),
                    ("fields", ORG_UNIT_FIELDS.to_string()),
                    ("paging", "false".to_string()),
                ],
            )
            .await?;
        Ok(response.organisation_units)
    }
}

fn build_pacer(requests_per_second: f64, burst_size: u32) -> Pacer {
    let rps = requests_per_second.max(0.1);
    let period = Duration::from_secs_f64(1.0 / rps);
    let burst = NonZeroU32::new(burst_size.max(1)).unwrap_or(NonZeroU32::MIN);
    let quota = match Quota::with_period(period) {
        Some(quota) => quota.allow_burst(burst),
        None => Quota::per_second(NonZeroU32::MIN),
    };
    GovernorRateLimiter::direct(quota)
}

fn snippet(text: &str) -> String {
    if text.len() > 200 {
        format!("{}...", &text[..200])
    } else {
        text.to_string()
    }
}

#[async_trait]
impl PlatformApi for RemoteClient {
    async fn test_connection(&self, profile: &InstanceProfile) -> AppResult<()> {
        self.fetch_user_org_units(profile).await.map(|_| ())
    }

    async fn fetch_user_org_units(&self, profile: &InstanceProfile) -> AppResult<Vec<OrgUnit>> {
        let response: MeResponse = self
            .get_json(
                profile,
                "api/me.json",
                &[(
                    "fields",
                    "organisationUnits[id,name,displayName,level]".to_string(),
                )],
            )
            .await?;
        Ok(response.organisation_units)
    }

    async fn fetch_org_units_at_level(
        &self,
        profile: &InstanceProfile,
        level: u32,
    ) -> AppResult<Vec<OrgUnit>> {
        self.fetch_org_units_filtered(profile, format!("level:eq:{}", level))
            .await
    }

    async fn fetch_org_units_by_parent(
        &self,
        profile: &InstanceProfile,
        parent_id: &str,
    ) -> AppResult<Vec<OrgUnit>> {
        self.fetch_org_units_filtered(profile, format!("parent.id:eq:{}", parent_id))
            .await
    }

    async fn fetch_org_unit_subtree(
        &self,
        profile: &InstanceProfile,
        root_id: &str,
    ) -> AppResult<Vec<OrgUnit>> {
        self.fetch_org_units_filtered(profile, format!("path:like:{}", root_id))
            .await
    }

    async fn search_org_units(
        &self,
        profile: &InstanceProfile,
        name: &str,
    ) -> AppResult<Vec<OrgUnit>> {
        self.fetch_org_units_filtered(profile, format!("name:ilike:{}", name))
            .await
    }

    async fn fetch_datasets(&self, profile: &InstanceProfile) -> AppResult<Vec<Dataset>> {
        let response: DatasetListResponse = self
            .get_json(
                profile,
                "api/dataSets.json",
                &[
                    ("fields", "id,name,displayName,periodType".to_string()),
                    ("paging", "false".to_string()),
                ],
            )
            .await?;
        Ok(response.data_sets)
    }

    async fn fetch_dataset_elements(
        &self,
        profile: &InstanceProfile,
        dataset_id: &str,
    ) -> AppResult<Vec<String>> {
        let endpoint = format!("api/dataSets/{}.json", dataset_id);
        let response: DatasetElementsResponse = self
            .get_json(
                profile,
                &endpoint,
                &[("fields", "dataSetElements[dataElement[id]]".to_string())],
            )
            .await?;
        Ok(response.element_ids())
    }

    async fn fetch_data_values(
        &self,
        profile: &InstanceProfile,
        dataset_id: &str,
        org_unit_id: &str,
        period: &str,
        include_descendants: bool,
    ) -> AppResult<Vec<DataValue>> {
        let response: DataValueSet = self
            .get_json(
                profile,
                "api/dataValueSets.json",
                &[
                    ("dataSet", dataset_id.to_string()),
                    ("period", period.to_string()),
                    ("orgUnit", org_unit_id.to_string()),
                    ("children", include_descendants.to_string()),
                ],
            )
            .await?;
        Ok(response.data_values)
    }

    async fn import_data_values(
        &self,
        profile: &InstanceProfile,
        values: &[DataValue],
    ) -> AppResult<ImportSummary> {
        let body = serde_json::to_value(DataValueSet::for_import(values))?;
        let response = self
            .post_json(
                profile,
                "api/dataValueSets.json",
                &[("preheatCache", "true".to_string())],
                &body,
            )
            .await?;
        let summary = ImportSummary::from_response_value(response)?;
        if summary.is_error() {
            return Err(AppError::ApiError(format!(
                "Import rejected by {}: {}",
                profile.name,
                summary
                    .description
                    .as_deref()
                    .unwrap_or("no description provided")
            )));
        }
        Ok(summary)
    }

    async fn register_completions(
        &self,
        profile: &InstanceProfile,
        registrations: &[CompletionRegistration],
    ) -> AppResult<()> {
        let body = serde_json::to_value(CompletionBatch::new(registrations.to_vec()))?;
        self.post_json(profile, "api/completeDataSetRegistrations.json", &[], &body)
            .await
            .map(|_| ())
    }

    async fn org_unit_name(&self, profile: &InstanceProfile, org_unit_id: &str) -> String {
        let cache_key = format!("{}|{}", profile.base_url, org_unit_id);
        if let Some(cached) = self.name_cache.get(&cache_key) {
            return cached.value().clone();
        }
        let endpoint = format!("api/organisationUnits/{}.json", org_unit_id);
        let name = match self
            .get_json::<OrgUnit>(profile, &endpoint, &[("fields", "id,name,displayName".to_string())])
            .await
        {
            Ok(unit) => unit.label().to_string(),
            Err(e) => {
                log::debug!("Name lookup for {} failed: {}", org_unit_id, e);
                org_unit_id.to_string()
            }
        };
        self.name_cache.insert(cache_key, name.clone());
        name
    }
}
