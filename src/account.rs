//! User accounts and the profile store
//!
//! The profile row (plan tier and credit balance) lives in an external store;
//! this module defines the shape of that data and the trait used to reach it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Credits granted to a user that has no stored profile yet.
pub const DEFAULT_CREDITS: u32 = 3;

/// Display name used when the identity provider has none.
pub const DEFAULT_DISPLAY_NAME: &str = "Chef";

/// Subscription tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    #[default]
    Free,
    Pro,
    Master,
}

impl PlanTier {
    pub fn id(&self) -> &'static str {
        match self {
            PlanTier::Free => "free",
            PlanTier::Pro => "pro",
            PlanTier::Master => "master",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PlanTier::Free => "Starter",
            PlanTier::Pro => "Entrepreneur",
            PlanTier::Master => "Master",
        }
    }
}

/// An authenticated user with their profile data merged in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub plan: PlanTier,
    pub credits: u32,
}

impl User {
    /// Build a user from identity data and an optional stored profile.
    pub fn from_parts(id: String, email: String, name: Option<String>, profile: Option<Profile>) -> Self {
        let profile = profile.unwrap_or_default();
        Self {
            id,
            email,
            name: name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string()),
            plan: profile.plan,
            credits: profile.credits,
        }
    }

    /// First word of the display name, used in greetings.
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or(DEFAULT_DISPLAY_NAME)
    }
}

/// Stored profile row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub plan: PlanTier,
    #[serde(default = "default_credits")]
    pub credits: u32,
}

fn default_credits() -> u32 {
    DEFAULT_CREDITS
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            plan: PlanTier::Free,
            credits: DEFAULT_CREDITS,
        }
    }
}

/// Partial profile update; `None` fields are left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credits: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<PlanTier>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("profile store request failed: {0}")]
    Request(String),
    #[error("profile not found")]
    NotFound,
}

/// Remote profile storage
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn fetch(&self, user_id: &str) -> Result<Profile, StoreError>;

    async fn insert(&self, user_id: &str, email: &str, name: &str, profile: Profile) -> Result<(), StoreError>;

    async fn update(&self, user_id: &str, update: ProfileUpdate) -> Result<(), StoreError>;
}

/// Profile store that keeps rows in memory. Used for offline runs.
#[derive(Debug, Default)]
pub struct MemoryProfileStore {
    rows: std::sync::Mutex<std::collections::HashMap<String, Profile>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, user_id: &str) -> Option<Profile> {
        self.rows.lock().ok()?.get(user_id).copied()
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn fetch(&self, user_id: &str) -> Result<Profile, StoreError> {
        self.get(user_id).ok_or(StoreError::NotFound)
    }

    async fn insert(&self, user_id: &str, _email: &str, _name: &str, profile: Profile) -> Result<(), StoreError> {
        let mut rows = self
            .rows
            .lock()
            .map_err(|_| StoreError::Request("profile table poisoned".to_string()))?;
        rows.entry(user_id.to_string()).or_insert(profile);
        Ok(())
    }

    async fn update(&self, user_id: &str, update: ProfileUpdate) -> Result<(), StoreError> {
        let mut rows = self
            .rows
            .lock()
            .map_err(|_| StoreError::Request("profile table poisoned".to_string()))?;
        let row = rows.entry(user_id.to_string()).or_default();
        if let Some(credits) = update.credits {
            row.credits = credits;
        }
        if let Some(plan) = update.plan {
            row.plan = plan;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_defaults_without_profile() {
        let user = User::from_parts("u1".into(), "a@b.c".into(), None, None);
        assert_eq!(user.name, "Chef");
        assert_eq!(user.plan, PlanTier::Free);
        assert_eq!(user.credits, DEFAULT_CREDITS);
    }

    #[test]
    fn test_first_name() {
        let user = User::from_parts("u1".into(), "a@b.c".into(), Some("Ana Maria".into()), None);
        assert_eq!(user.first_name(), "Ana");
    }

    #[test]
    fn test_profile_update_skips_empty_fields() {
        let update = ProfileUpdate {
            credits: Some(4),
            plan: None,
        };
        let json = serde_json::to_string(&update).unwrap();
        assert_eq!(json, r#"{"credits":4}"#);
    }

    #[tokio::test]
    async fn test_memory_store_update_merges() {
        let store = MemoryProfileStore::new();
        store.insert("u1", "a@b.c", "Ana", Profile::default()).await.unwrap();
        store
            .update("u1", ProfileUpdate { credits: None, plan: Some(PlanTier::Pro) })
            .await
            .unwrap();
        let row = store.fetch("u1").await.unwrap();
        assert_eq!(row.plan, PlanTier::Pro);
        assert_eq!(row.credits, DEFAULT_CREDITS);
    }
}
