//! Sign-in session
//!
//! [`IdentityProvider`] is the seam to the auth backend. Signed-in users are
//! merged with their stored profile; a missing profile falls back to the
//! default free tier. The startup check never blocks the UI for longer than
//! the configured timeout.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::account::{Profile, ProfileStore, StoreError, User};

const EVENT_CAPACITY: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(User),
    SignedOut,
}

/// Errors carry a message suitable for the login form.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("{0}")]
    Rejected(String),
    #[error("authentication service unavailable: {0}")]
    Unavailable(String),
    #[error("authentication is not configured")]
    NotConfigured,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The restored session's user, if any.
    async fn current_user(&self) -> Result<Option<User>, AuthError>;

    async fn login(&self, email: &str, password: &str) -> Result<User, AuthError>;

    /// Create an account. Sign-in is a separate step.
    async fn register(&self, name: &str, email: &str, password: &str) -> Result<(), AuthError>;

    async fn logout(&self) -> Result<(), AuthError>;

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}

/// Form checks done before any request is sent.
pub fn validate_login(email: &str, password: &str) -> Result<(), AuthError> {
    if email.trim().is_empty() || !email.contains('@') {
        return Err(AuthError::Rejected("Enter a valid email address.".to_string()));
    }
    if password.is_empty() {
        return Err(AuthError::Rejected("Enter your password.".to_string()));
    }
    Ok(())
}

pub fn validate_registration(name: &str, email: &str, password: &str) -> Result<(), AuthError> {
    if name.trim().is_empty() {
        return Err(AuthError::Rejected("Name is required.".to_string()));
    }
    validate_login(email, password)
}

/// Resolve the startup user, failing open as signed out.
pub async fn bootstrap(provider: &dyn IdentityProvider, timeout: Duration) -> Option<User> {
    match tokio::time::timeout(timeout, provider.current_user()).await {
        Ok(Ok(user)) => {
            tracing::info!(signed_in = user.is_some(), "session restored");
            user
        }
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "session check failed, continuing signed out");
            None
        }
        Err(_) => {
            tracing::warn!(timeout_ms = timeout.as_millis() as u64, "session check timed out, continuing signed out");
            None
        }
    }
}

/// Load the stored profile; errors fall back to defaults.
pub(crate) async fn load_profile(store: &dyn ProfileStore, user_id: &str) -> Option<Profile> {
    match store.fetch(user_id).await {
        Ok(profile) => Some(profile),
        Err(StoreError::NotFound) => {
            tracing::debug!(user_id, "no stored profile, using defaults");
            None
        }
        Err(e) => {
            tracing::warn!(user_id, error = %e, "profile fetch failed, using defaults");
            None
        }
    }
}

#[derive(Debug, Clone)]
struct LocalAccount {
    id: String,
    name: String,
    password: String,
}

/// In-process identity used for offline runs and tests.
pub struct LocalIdentity {
    accounts: Mutex<HashMap<String, LocalAccount>>,
    current: Mutex<Option<String>>,
    store: Arc<dyn ProfileStore>,
    events: broadcast::Sender<AuthEvent>,
}

impl std::fmt::Debug for LocalIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalIdentity").finish_non_exhaustive()
    }
}

impl LocalIdentity {
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            accounts: Mutex::new(HashMap::new()),
            current: Mutex::new(None),
            store,
            events,
        }
    }

    /// Identity with one account that is already signed in.
    pub fn signed_in(store: Arc<dyn ProfileStore>, name: &str, email: &str) -> Self {
        let identity = Self::new(store);
        let key = email.trim().to_lowercase();
        if let Ok(mut accounts) = identity.accounts.lock() {
            accounts.insert(
                key.clone(),
                LocalAccount {
                    id: format!("local-{}", key),
                    name: name.to_string(),
                    password: String::new(),
                },
            );
        }
        if let Ok(mut current) = identity.current.lock() {
            *current = Some(key);
        }
        identity
    }

    fn lock_err() -> AuthError {
        AuthError::Unavailable("identity state poisoned".to_string())
    }

    async fn user_for(&self, email: &str, account: LocalAccount) -> User {
        let profile = load_profile(self.store.as_ref(), &account.id).await;
        User::from_parts(account.id, email.to_string(), Some(account.name), profile)
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentity {
    async fn current_user(&self) -> Result<Option<User>, AuthError> {
        let found = {
            let current = self.current.lock().map_err(|_| Self::lock_err())?;
            let accounts = self.accounts.lock().map_err(|_| Self::lock_err())?;
            current
                .as_ref()
                .and_then(|email| accounts.get(email).cloned().map(|a| (email.clone(), a)))
        };
        match found {
            Some((email, account)) => Ok(Some(self.user_for(&email, account).await)),
            None => Ok(None),
        }
    }

    async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        validate_login(email, password)?;
        let key = email.trim().to_lowercase();
        let account = {
            let accounts = self.accounts.lock().map_err(|_| Self::lock_err())?;
            accounts.get(&key).cloned()
        };
        let account = match account {
            Some(a) if a.password == password => a,
            _ => return Err(AuthError::Rejected("Invalid login credentials".to_string())),
        };
        *self.current.lock().map_err(|_| Self::lock_err())? = Some(key.clone());
        let user = self.user_for(&key, account).await;
        let _ = self.events.send(AuthEvent::SignedIn(user.clone()));
        Ok(user)
    }

    async fn register(&self, name: &str, email: &str, password: &str) -> Result<(), AuthError> {
        validate_registration(name, email, password)?;
        let key = email.trim().to_lowercase();
        let account = {
            let mut accounts = self.accounts.lock().map_err(|_| Self::lock_err())?;
            if accounts.contains_key(&key) {
                return Err(AuthError::Rejected("User already registered".to_string()));
            }
            let account = LocalAccount {
                id: format!("local-{}", accounts.len() + 1),
                name: name.trim().to_string(),
                password: password.to_string(),
            };
            accounts.insert(key.clone(), account.clone());
            account
        };
        if let Err(e) = self.store.insert(&account.id, &key, &account.name, Profile::default()).await {
            tracing::warn!(error = %e, "profile insert failed");
        }
        Ok(())
    }

    async fn logout(&self) -> Result<(), AuthError> {
        *self.current.lock().map_err(|_| Self::lock_err())? = None;
        let _ = self.events.send(AuthEvent::SignedOut);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{MemoryProfileStore, PlanTier, ProfileUpdate, DEFAULT_CREDITS};

    struct Stalled;

    #[async_trait]
    impl IdentityProvider for Stalled {
        async fn current_user(&self) -> Result<Option<User>, AuthError> {
            std::future::pending().await
        }
        async fn login(&self, _: &str, _: &str) -> Result<User, AuthError> {
            Err(AuthError::NotConfigured)
        }
        async fn register(&self, _: &str, _: &str, _: &str) -> Result<(), AuthError> {
            Err(AuthError::NotConfigured)
        }
        async fn logout(&self) -> Result<(), AuthError> {
            Ok(())
        }
        fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
            broadcast::channel(1).1
        }
    }

    struct Broken;

    #[async_trait]
    impl IdentityProvider for Broken {
        async fn current_user(&self) -> Result<Option<User>, AuthError> {
            Err(AuthError::Unavailable("down".into()))
        }
        async fn login(&self, _: &str, _: &str) -> Result<User, AuthError> {
            Err(AuthError::NotConfigured)
        }
        async fn register(&self, _: &str, _: &str, _: &str) -> Result<(), AuthError> {
            Err(AuthError::NotConfigured)
        }
        async fn logout(&self) -> Result<(), AuthError> {
            Ok(())
        }
        fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
            broadcast::channel(1).1
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_bootstrap_times_out_signed_out() {
        let user = bootstrap(&Stalled, Duration::from_secs(3)).await;
        assert!(user.is_none());
    }

    #[tokio::test]
    async fn test_bootstrap_error_signed_out() {
        assert!(bootstrap(&Broken, Duration::from_secs(3)).await.is_none());
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let store = Arc::new(MemoryProfileStore::new());
        let id = LocalIdentity::new(store.clone());
        let mut events = id.subscribe();

        id.register("Ana", "ana@example.com", "secret").await.unwrap();
        assert!(id.current_user().await.unwrap().is_none());

        let user = id.login("ANA@example.com", "secret").await.unwrap();
        assert_eq!(user.name, "Ana");
        assert_eq!(user.plan, PlanTier::Free);
        assert_eq!(user.credits, DEFAULT_CREDITS);
        assert_eq!(events.recv().await.unwrap(), AuthEvent::SignedIn(user.clone()));

        id.logout().await.unwrap();
        assert_eq!(events.recv().await.unwrap(), AuthEvent::SignedOut);
        assert!(id.current_user().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_login_merges_stored_profile() {
        let store = Arc::new(MemoryProfileStore::new());
        let id = LocalIdentity::new(store.clone());
        id.register("Ana", "ana@example.com", "pw").await.unwrap();
        let user = id.login("ana@example.com", "pw").await.unwrap();
        store
            .update(
                &user.id,
                ProfileUpdate {
                    credits: Some(42),
                    plan: Some(PlanTier::Pro),
                },
            )
            .await
            .unwrap();
        let again = id.current_user().await.unwrap().unwrap();
        assert_eq!((again.credits, again.plan), (42, PlanTier::Pro));
    }

    #[tokio::test]
    async fn test_bad_credentials_are_rejected() {
        let id = LocalIdentity::new(Arc::new(MemoryProfileStore::new()));
        id.register("Ana", "ana@example.com", "pw").await.unwrap();
        let err = id.login("ana@example.com", "nope").await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid login credentials");
        assert!(id.register("Ana", "ana@example.com", "pw").await.is_err());
    }

    #[test]
    fn test_registration_requires_name() {
        assert_eq!(
            validate_registration(" ", "a@b.c", "pw"),
            Err(AuthError::Rejected("Name is required.".into()))
        );
        assert!(validate_login("nobody", "pw").is_err());
    }

    #[tokio::test]
    async fn test_signed_in_identity() {
        let id = LocalIdentity::signed_in(Arc::new(MemoryProfileStore::new()), "Chef", "chef@local");
        let user = id.current_user().await.unwrap().unwrap();
        assert_eq!(user.email, "chef@local");
        assert_eq!(user.credits, DEFAULT_CREDITS);
    }
}
