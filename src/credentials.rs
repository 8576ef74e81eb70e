//! In-memory holder for the two session credentials

use crate::errors::{Result, SyncError};
use tokio::sync::RwLock;
use tracing::debug;

/// Snapshot of the stored credentials.
///
/// An access credential is never held without a refresh credential; a missing
/// refresh credential means the user is logged out.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionCredentials {
    pub access: Option<String>,
    pub refresh: Option<String>,
}

impl SessionCredentials {
    pub fn is_active(&self) -> bool {
        self.refresh.is_some()
    }
}

/// Lifecycle-scoped credential store.
///
/// One store is created per session and shared with the gateway; dropping the
/// session drops the credentials with it.
#[derive(Debug, Default)]
pub struct CredentialStore {
    inner: RwLock<SessionCredentials>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with existing credentials, e.g. restored from a previous run
    pub fn with_credentials(access: Option<String>, refresh: Option<String>) -> Result<Self> {
        if access.is_some() && refresh.is_none() {
            return Err(SyncError::Credentials(
                "access credential given without a refresh credential".to_string(),
            ));
        }

        Ok(Self {
            inner: RwLock::new(SessionCredentials { access, refresh }),
        })
    }

    /// Update the provided fields, leaving `None` fields untouched
    pub async fn set(&self, access: Option<String>, refresh: Option<String>) -> Result<()> {
        let mut creds = self.inner.write().await;

        let next_access = access.or_else(|| creds.access.clone());
        let next_refresh = refresh.or_else(|| creds.refresh.clone());

        if next_access.is_some() && next_refresh.is_none() {
            return Err(SyncError::Credentials(
                "cannot store an access credential without a refresh credential".to_string(),
            ));
        }

        creds.access = next_access;
        creds.refresh = next_refresh;
        debug!(
            "Credentials updated (access: {}, refresh: {})",
            creds.access.is_some(),
            creds.refresh.is_some()
        );

        Ok(())
    }

    pub async fn get(&self) -> SessionCredentials {
        self.inner.read().await.clone()
    }

    pub async fn access(&self) -> Option<String> {
        self.inner.read().await.access.clone()
    }

    pub async fn refresh(&self) -> Option<String> {
        self.inner.read().await.refresh.clone()
    }

    pub async fn is_active(&self) -> bool {
        self.inner.read().await.is_active()
    }

    /// Drop both credentials. Returns whether a session was active before.
    pub async fn clear(&self) -> bool {
        let mut creds = self.inner.write().await;
        let was_active = creds.is_active();
        creds.access = None;
        creds.refresh = None;
        debug!("Credentials cleared (was active: {})", was_active);
        was_active
    }
}
