/// Test helper functions and service builders
use super::fake_platform::FakePlatform;
use hmis_sync::modules::completeness::CompletenessEngine;
use hmis_sync::modules::profile::{InstanceProfile, ProfileStore};
use hmis_sync::modules::remote::models::{DataValue, OrgUnit};
use hmis_sync::modules::tasks::{TaskProgress, TaskRegistry, TaskStatus};
use hmis_sync::modules::transfer::{TransferConfig, TransferEngine, TransferRequest};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub struct TestServices {
    pub platform: Arc<FakePlatform>,
    pub profiles: Arc<ProfileStore>,
    pub registry: Arc<TaskRegistry>,
    pub transfer: TransferEngine,
    pub completeness: CompletenessEngine,
}

/// Wire both engines around one seeded fake platform. Profiles "source" and
/// "dest" are pre-registered; retry delays are collapsed to a millisecond so
/// failure paths stay fast.
pub fn build_test_services(platform: FakePlatform) -> TestServices {
    let platform = Arc::new(platform);
    let profiles = Arc::new(ProfileStore::new());
    profiles
        .register(InstanceProfile::new(
            "source",
            "Source HQ",
            "https://source.example.org",
            "sync-bot",
            "secret",
        ))
        .unwrap();
    profiles
        .register(InstanceProfile::new(
            "dest",
            "National Mirror",
            "https://dest.example.org",
            "sync-bot",
            "secret",
        ))
        .unwrap();
    let registry = Arc::new(TaskRegistry::new());

    let transfer = TransferEngine::with_config(
        platform.clone(),
        profiles.clone(),
        registry.clone(),
        fast_transfer_config(),
    );
    let completeness =
        CompletenessEngine::new(platform.clone(), profiles.clone(), registry.clone());

    TestServices {
        platform,
        profiles,
        registry,
        transfer,
        completeness,
    }
}

pub fn fast_transfer_config() -> TransferConfig {
    TransferConfig {
        chunk_size: 500,
        max_import_attempts: 3,
        import_retry_base_delay: Duration::from_millis(1),
    }
}

/// Poll the registry until the predicate holds. Panics after five seconds.
pub async fn wait_until<F>(registry: &TaskRegistry, task_id: &str, predicate: F) -> TaskProgress
where
    F: Fn(&TaskProgress) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if let Some(task) = registry.get(task_id) {
            if predicate(&task) {
                return task;
            }
        }
        if tokio::time::Instant::now() > deadline {
            let status = registry.get(task_id).map(|t| t.status.to_string());
            panic!(
                "Task '{}' did not reach the expected state within 5s (last status: {:?})",
                task_id, status
            );
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub async fn wait_for_terminal(registry: &TaskRegistry, task_id: &str) -> TaskProgress {
    wait_until(registry, task_id, |t| t.status.is_terminal()).await
}

pub async fn wait_for_status(
    registry: &TaskRegistry,
    task_id: &str,
    status: TaskStatus,
) -> TaskProgress {
    wait_until(registry, task_id, |t| t.status == status).await
}

// ------------------------------------------------------------------
// Factories
// ------------------------------------------------------------------

pub fn org_unit(id: &str, name: &str, level: u32) -> OrgUnit {
    OrgUnit {
        id: id.to_string(),
        name: name.to_string(),
        display_name: None,
        level: Some(level),
        path: None,
    }
}

pub fn data_value(element: &str, org_unit: &str, period: &str, value: &str) -> DataValue {
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

/// `count` distinct values for one unit and period, one per synthetic
/// category option combo.
pub fn values_for(element: &str, org_unit: &str, period: &str, count: usize) -> Vec<DataValue> {
    (0..count)
        .map(|i| {
            let mut value = data_value(element, org_unit, period, "1");
            value.category_option_combo = Some(format!("coc{}", i));
            value
        })
        .collect()
}

/// A transfer between the pre-registered "source" and "dest" profiles.
pub fn transfer_request(periods: &[&str]) -> TransferRequest {
    TransferRequest {
        source_instance: "source".to_string(),
        dest_instance: "dest".to_string(),
        source_dataset: "ds-src".to_string(),
        dest_dataset: "ds-dst".to_string(),
        periods: periods.iter().map(|p| p.to_string()).collect(),
        element_mapping: HashMap::new(),
        mark_complete: false,
    }
}
