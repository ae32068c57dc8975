//! Explicit authentication state
//!
//! [`Authenticator`] owns the current profile and the session store. It is
//! created once and handed to whatever needs the logged-in user.

use crate::error::{AuthError, StationError, StationResult};
use crate::model::{LoginCredentials, UserProfile};
use crate::services::AuthService;
use crate::session_store::SessionStore;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Login/logout coordinator with a persisted session
pub struct Authenticator {
    service: Arc<dyn AuthService>,
    store: Arc<dyn SessionStore>,
    current: RwLock<Option<UserProfile>>,
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("current", &*self.current.read())
            .finish_non_exhaustive()
    }
}

impl Authenticator {
    /// Create an authenticator with no user logged in
    pub fn new(service: Arc<dyn AuthService>, store: Arc<dyn SessionStore>) -> Self {
        Self {
            service,
            store,
            current: RwLock::new(None),
        }
    }

    /// Restore a previously saved session.
    ///
    /// Store failures are logged and the store is cleared; the station then
    /// simply starts logged out.
    pub fn restore(&self) -> Option<UserProfile> {
        let restored = match self.store.load() {
            Ok(profile) => profile,
            Err(e) => {
                error!("Error checking auth status: {}", e);
                if let Err(e) = self.store.clear() {
                    warn!("Failed to clear session store: {}", e);
                }
                None
            }
        };
        *self.current.write() = restored.clone();
        restored
    }

    /// Log in and persist the session.
    ///
    /// Empty credentials are rejected before the service is called.
    pub async fn login(&self, credentials: &LoginCredentials) -> StationResult<UserProfile> {
        if !credentials.is_complete() {
            return Err(StationError::Auth(AuthError::MissingCredentials));
        }

        let profile = self.service.login(credentials).await?;
        self.store.save(&profile)?;
        *self.current.write() = Some(profile.clone());
        info!("{} logged in as {:?}", profile.username, profile.role);
        Ok(profile)
    }

    /// Log out and clear the persisted session
    pub async fn logout(&self) -> StationResult<()> {
        let previous = self.current.write().take();
        self.service.logout().await;
        self.store.clear()?;
        if let Some(profile) = previous {
            info!("{} logged out", profile.username);
        }
        Ok(())
    }

    /// Currently logged-in profile
    pub fn current(&self) -> Option<UserProfile> {
        self.current.read().clone()
    }

    /// Whether a user is logged in
    pub fn is_authenticated(&self) -> bool {
        self.current.read().is_some()
    }
}
