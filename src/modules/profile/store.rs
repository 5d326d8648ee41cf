use super::instance_profile::InstanceProfile;
use crate::shared::errors::{AppError, AppResult};
use dashmap::DashMap;

/// Concurrency-safe profile lookup keyed by profile id.
///
/// Engines resolve the profile ids carried in request objects through this
/// store before a task is registered, so an unknown id fails synchronously.
#[derive(Default)]
pub struct ProfileStore {
    profiles: DashMap<String, InstanceProfile>,
}

impl ProfileStore {
    pub fn new() -> Self {
        Self {
            profiles: DashMap::new(),
        }
    }

    /// Validate and store a profile, replacing any previous entry with the
    /// same id.
    pub fn register(&self, profile: InstanceProfile) -> AppResult<()> {
        profile.validate()?;
        self.profiles.insert(profile.id.clone(), profile);
        Ok(())
    }

    pub fn get(&self, profile_id: &str) -> AppResult<InstanceProfile> {
        self.profiles
            .get(profile_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("Profile '{}' is not configured", profile_id)))
    }

    pub fn remove(&self, profile_id: &str) -> bool {
        self.profiles.remove(profile_id).is_some()
    }

    pub fn list(&self) -> Vec<InstanceProfile> {
        let mut profiles: Vec<InstanceProfile> =
            self.profiles.iter().map(|e| e.value().clone()).collect();
        profiles.sort_by(|a, b| a.id.cmp(&b.id));
        profiles
    }
}
