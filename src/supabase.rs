//! Supabase REST client
//!
//! Implements [`IdentityProvider`] over GoTrue (`/auth/v1`) and
//! [`ProfileStore`] over PostgREST (`/rest/v1/profiles`). Only the refresh
//! token is kept on disk; it is exchanged for a fresh session on startup.

use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::broadcast;

use crate::account::{Profile, ProfileStore, ProfileUpdate, StoreError, User};
use crate::config::{secret_from_env, SupabaseConfig};
use crate::export::write_atomic;
use crate::session::{load_profile, validate_login, validate_registration, AuthError, AuthEvent, IdentityProvider};

const EVENT_CAPACITY: usize = 16;

#[derive(Debug, Clone, Deserialize)]
struct AuthUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: Value,
}

impl AuthUser {
    fn display_name(&self) -> Option<String> {
        self.user_metadata
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    user: AuthUser,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct StoredSession {
    refresh_token: String,
}

#[derive(Debug, Clone)]
struct ActiveSession {
    access_token: String,
}

#[derive(Debug, Serialize)]
struct ProfileRow<'a> {
    id: &'a str,
    email: &'a str,
    name: &'a str,
    #[serde(flatten)]
    profile: Profile,
}

pub struct SupabaseClient {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
    session_path: Option<PathBuf>,
    active: Mutex<Option<ActiveSession>>,
    events: broadcast::Sender<AuthEvent>,
}

impl std::fmt::Debug for SupabaseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseClient")
            .field("base_url", &self.base_url)
            .field("session_path", &self.session_path)
            .finish_non_exhaustive()
    }
}

/// Best human-readable message in a GoTrue or PostgREST error body.
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["error_description", "msg", "message", "error"]
        .iter()
        .find_map(|k| value.get(*k).and_then(Value::as_str))
        .map(str::to_string)
}

/// Sign-up answers with either a session or the bare user when email
/// confirmation is pending.
fn signup_user(value: &Value) -> Option<AuthUser> {
    let user = value.get("user").filter(|u| !u.is_null()).unwrap_or(value);
    serde_json::from_value(user.clone()).ok()
}

impl SupabaseClient {
    pub fn new(base_url: &str, anon_key: String, session_path: Option<PathBuf>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key,
            session_path,
            active: Mutex::new(None),
            events,
        }
    }

    pub fn from_config(config: &SupabaseConfig, session_path: Option<PathBuf>) -> Result<Self, AuthError> {
        if !config.is_configured() {
            return Err(AuthError::NotConfigured);
        }
        let key = secret_from_env(&config.anon_key_env).ok_or(AuthError::NotConfigured)?;
        Ok(Self::new(&config.url, key, session_path))
    }

    fn bearer(&self) -> String {
        let token = self
            .active
            .lock()
            .ok()
            .and_then(|s| s.as_ref().map(|s| s.access_token.clone()))
            .unwrap_or_else(|| self.anon_key.clone());
        format!("Bearer {}", token)
    }

    fn read_session(&self) -> Option<StoredSession> {
        let path = self.session_path.as_ref()?;
        let raw = std::fs::read_to_string(path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(s) => Some(s),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable session file");
                None
            }
        }
    }

    fn store_session(&self, session: Option<&StoredSession>) {
        let Some(path) = self.session_path.as_ref() else {
            return;
        };
        let result = match session {
            Some(s) => serde_json::to_vec(s)
                .map_err(std::io::Error::other)
                .and_then(|bytes| write_atomic(path, &bytes)),
            None => match std::fs::remove_file(path) {
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                other => other,
            },
        };
        if let Err(e) = result {
            tracing::warn!(path = %path.display(), error = %e, "failed to update session file");
        }
    }

    async fn token(&self, grant_type: &str, body: Value) -> Result<TokenResponse, AuthError> {
        let url = format!("{}/auth/v1/token?grant_type={}", self.base_url, grant_type);
        let response = self
            .client
            .post(&url)
            .header("apikey", &self.anon_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;
        if !status.is_success() {
            let message = error_message(&text).unwrap_or_else(|| format!("sign-in failed with status {}", status));
            return Err(if status.is_client_error() {
                AuthError::Rejected(message)
            } else {
                AuthError::Unavailable(message)
            });
        }
        serde_json::from_str(&text).map_err(|e| AuthError::Unavailable(format!("unexpected auth response: {}", e)))
    }

    async fn start_session(&self, token: TokenResponse) -> User {
        if let Ok(mut active) = self.active.lock() {
            *active = Some(ActiveSession {
                access_token: token.access_token.clone(),
            });
        }
        self.store_session(Some(&StoredSession {
            refresh_token: token.refresh_token.clone(),
        }));
        let profile = load_profile(self, &token.user.id).await;
        let name = token.user.display_name();
        User::from_parts(token.user.id, token.user.email.unwrap_or_default(), name, profile)
    }

    async fn check(&self, response: reqwest::Response) -> Result<String, StoreError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read body".to_string());
        if !status.is_success() {
            let message = error_message(&body).unwrap_or(body);
            return Err(StoreError::Request(format!("status {}: {}", status, message)));
        }
        Ok(body)
    }
}

#[async_trait]
impl IdentityProvider for SupabaseClient {
    async fn current_user(&self) -> Result<Option<User>, AuthError> {
        let Some(stored) = self.read_session() else {
            return Ok(None);
        };
        match self
            .token("refresh_token", json!({ "refresh_token": stored.refresh_token }))
            .await
        {
            Ok(token) => Ok(Some(self.start_session(token).await)),
            Err(AuthError::Rejected(message)) => {
                tracing::info!(%message, "stored session expired");
                self.store_session(None);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    #[tracing::instrument(skip(self, password))]
    async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        validate_login(email, password)?;
        let token = self
            .token("password", json!({ "email": email.trim(), "password": password }))
            .await?;
        let user = self.start_session(token).await;
        let _ = self.events.send(AuthEvent::SignedIn(user.clone()));
        Ok(user)
    }

    #[tracing::instrument(skip(self, password))]
    async fn register(&self, name: &str, email: &str, password: &str) -> Result<(), AuthError> {
        validate_registration(name, email, password)?;
        let url = format!("{}/auth/v1/signup", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("apikey", &self.anon_key)
            .json(&json!({
                "email": email.trim(),
                "password": password,
                "data": { "name": name.trim() },
            }))
            .send()
            .await
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;
        if !status.is_success() {
            let message = error_message(&text).unwrap_or_else(|| format!("sign-up failed with status {}", status));
            return Err(AuthError::Rejected(message));
        }

        let value: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
        if let Some(user) = signup_user(&value) {
            if let Err(e) = self.insert(&user.id, email.trim(), name.trim(), Profile::default()).await {
                // a database trigger may already have created the row
                tracing::warn!(user_id = %user.id, error = %e, "profile insert failed");
            }
        }
        Ok(())
    }

    async fn logout(&self) -> Result<(), AuthError> {
        let bearer = self.bearer();
        let had_session = self.active.lock().map(|mut s| s.take().is_some()).unwrap_or(false);
        self.store_session(None);
        if had_session {
            let url = format!("{}/auth/v1/logout", self.base_url);
            if let Err(e) = self
                .client
                .post(&url)
                .header("apikey", &self.anon_key)
                .header("Authorization", bearer)
                .send()
                .await
            {
                tracing::warn!(error = %e, "remote sign-out failed");
            }
        }
        let _ = self.events.send(AuthEvent::SignedOut);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

#[async_trait]
impl ProfileStore for SupabaseClient {
    async fn fetch(&self, user_id: &str) -> Result<Profile, StoreError> {
        let url = format!("{}/rest/v1/profiles", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("id", format!("eq.{}", user_id)), ("select", "plan,credits".to_string())])
            .header("apikey", &self.anon_key)
            .header("Authorization", self.bearer())
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;
        let body = self.check(response).await?;
        let rows: Vec<Profile> = serde_json::from_str(&body).map_err(|e| StoreError::Request(e.to_string()))?;
        rows.into_iter().next().ok_or(StoreError::NotFound)
    }

    async fn insert(&self, user_id: &str, email: &str, name: &str, profile: Profile) -> Result<(), StoreError> {
        let url = format!("{}/rest/v1/profiles", self.base_url);
        let row = ProfileRow {
            id: user_id,
            email,
            name,
            profile,
        };
        let response = self
            .client
            .post(&url)
            .header("apikey", &self.anon_key)
            .header("Authorization", self.bearer())
            .json(&[row])
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;
        self.check(response).await.map(|_| ())
    }

    async fn update(&self, user_id: &str, update: ProfileUpdate) -> Result<(), StoreError> {
        let url = format!("{}/rest/v1/profiles", self.base_url);
        let response = self
            .client
            .patch(&url)
            .query(&[("id", format!("eq.{}", user_id))])
            .header("apikey", &self.anon_key)
            .header("Authorization", self.bearer())
            .json(&update)
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;
        self.check(response).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_error_message_keys() {
        assert_eq!(
            error_message(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#).as_deref(),
            Some("Invalid login credentials")
        );
        assert_eq!(error_message(r#"{"msg":"User already registered"}"#).as_deref(), Some("User already registered"));
        assert_eq!(error_message("<html>"), None);
    }

    #[test]
    fn test_signup_user_shapes() {
        let with_session = json!({"access_token": "a", "user": {"id": "u1", "email": "a@b.c"}});
        assert_eq!(signup_user(&with_session).unwrap().id, "u1");
        let pending = json!({"id": "u2", "email": "a@b.c", "user_metadata": {"name": "Ana"}});
        let user = signup_user(&pending).unwrap();
        assert_eq!(user.id, "u2");
        assert_eq!(user.display_name().as_deref(), Some("Ana"));
    }

    #[test]
    fn test_profile_rows_parse_with_defaults() {
        let rows: Vec<Profile> = serde_json::from_str(r#"[{"plan":"pro","credits":12},{}]"#).unwrap();
        assert_eq!(rows[0].credits, 12);
        assert_eq!(rows[1].credits, crate::account::DEFAULT_CREDITS);
    }

    #[test]
    fn test_profile_row_is_flat() {
        let row = ProfileRow {
            id: "u1",
            email: "a@b.c",
            name: "Ana",
            profile: Profile::default(),
        };
        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["plan"], "free");
        assert_eq!(value["credits"], 3);
    }

    #[test]
    fn test_session_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        let client = SupabaseClient::new("http://localhost/", "anon".into(), Some(path.clone()));
        assert!(client.read_session().is_none());
        client.store_session(Some(&StoredSession {
            refresh_token: "r1".into(),
        }));
        assert_eq!(client.read_session().unwrap().refresh_token, "r1");
        client.store_session(None);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_no_session_file_means_signed_out() {
        let client = SupabaseClient::new("http://localhost", "anon".into(), None);
        assert!(client.current_user().await.unwrap().is_none());
        assert_eq!(client.bearer(), "Bearer anon");
    }

    #[test]
    fn test_unconfigured() {
        let config = SupabaseConfig::default();
        assert!(matches!(
            SupabaseClient::from_config(&config, None),
            Err(AuthError::NotConfigured)
        ));
    }
}
