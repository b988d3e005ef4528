// src/services/session.rs
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tracing;

use crate::{
    errors::{ClientError as AppError, ClientResult},
    models::user::{LoginRequest, RegisterRequest, Session, UserIdentity},
    services::api_client::BackendApi,
};

/// Storage key of the bearer credential.
pub const TOKEN_KEY: &str = "token";
/// Storage key of the serialized identity.
pub const USER_KEY: &str = "user";

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("session storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored identity is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

impl From<PersistenceError> for AppError {
    fn from(err: PersistenceError) -> Self {
        AppError::SessionPersistence(err.to_string())
    }
}

/// Raw key/value storage for the session, loaded once at startup.
#[async_trait]
pub trait SessionPersistence: Send + Sync {
    async fn read(&self, key: &str) -> Result<Option<String>, PersistenceError>;
    async fn write(&self, key: &str, value: &str) -> Result<(), PersistenceError>;
    async fn remove(&self, key: &str) -> Result<(), PersistenceError>;
}

/// One file per key inside a directory.
pub struct FileSessionPersistence {
    dir: PathBuf,
}

impl FileSessionPersistence {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl SessionPersistence for FileSessionPersistence {
    async fn read(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        match tokio::fs::read_to_string(self.dir.join(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.dir.join(key), value).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        match tokio::fs::remove_file(self.dir.join(key)).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

#[derive(Default)]
pub struct MemorySessionPersistence {
    slots: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl SessionPersistence for MemorySessionPersistence {
    async fn read(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.slots.lock().await.get(key).cloned())
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.slots
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        self.slots.lock().await.remove(key);
        Ok(())
    }
}

/// Process-wide authenticated session.
///
/// Written only by `init`, login/register, logout and the 401 teardown; read
/// by every outbound request. Observers can `subscribe` to learn when the
/// session ends and re-authentication is required.
pub struct SessionStore {
    current: watch::Sender<Option<Session>>,
    persistence: Arc<dyn SessionPersistence>,
}

impl SessionStore {
    pub fn new(persistence: Arc<dyn SessionPersistence>) -> Self {
        let (current, _) = watch::channel(None);
        Self { current, persistence }
    }

    /// Restore a persisted session. A partial or unreadable record is cleared.
    pub async fn init(&self) -> ClientResult<Option<UserIdentity>> {
        let token = self.persistence.read(TOKEN_KEY).await?;
        let user = self.persistence.read(USER_KEY).await?;

        let session = match (token, user) {
            (Some(token), Some(user)) => match serde_json::from_str::<UserIdentity>(&user) {
                Ok(identity) => Some(Session { identity, token }),
                Err(e) => {
                    tracing::warn!("Discarding unreadable stored identity: {}", e);
                    self.clear_persisted().await;
                    None
                }
            },
            (None, None) => None,
            _ => {
                tracing::warn!("Discarding incomplete stored session");
                self.clear_persisted().await;
                None
            }
        };

        match &session {
            Some(s) => tracing::info!("Restored session for user {}", s.identity.id),
            None => tracing::debug!("No stored session"),
        }
        let identity = session.as_ref().map(|s| s.identity.clone());
        self.current.send_replace(session);
        Ok(identity)
    }

    pub async fn login(
        &self,
        api: &dyn BackendApi,
        credentials: &LoginRequest,
    ) -> ClientResult<UserIdentity> {
        tracing::info!("Logging in {}", credentials.email);
        let response = api.login(credentials).await?;
        self.establish(response.into()).await
    }

    pub async fn register(
        &self,
        api: &dyn BackendApi,
        registration: &RegisterRequest,
    ) -> ClientResult<UserIdentity> {
        tracing::info!("Registering {}", registration.email);
        let response = api.register(registration).await?;
        self.establish(response.into()).await
    }

    /// Refresh the stored identity from `GET /users/profile`.
    pub async fn refresh_profile(&self, api: &dyn BackendApi) -> ClientResult<UserIdentity> {
        let token = self.token().ok_or(AppError::NotAuthenticated)?;
        let identity = api.get_profile().await?;
        self.establish(Session { identity, token }).await
    }

    /// Best-effort server logout followed by local teardown.
    pub async fn logout(&self, api: &dyn BackendApi) {
        if self.is_authenticated() {
            if let Err(e) = api.logout().await {
                tracing::warn!("Server logout failed, clearing local session anyway: {}", e);
            }
        }
        self.teardown().await;
    }

    /// Clear the session in memory and in storage.
    pub async fn teardown(&self) {
        let previous = self.current.send_replace(None);
        self.clear_persisted().await;
        if let Some(session) = previous {
            tracing::info!("Session ended for user {}", session.identity.id);
        }
    }

    /// Any 401 ends the session and forces re-authentication.
    pub async fn handle_unauthorized(&self) {
        if self.is_authenticated() {
            tracing::warn!("Credential rejected by backend, re-authentication required");
        }
        self.teardown().await;
    }

    pub fn token(&self) -> Option<String> {
        self.current.borrow().as_ref().map(|s| s.token.clone())
    }

    pub fn identity(&self) -> Option<UserIdentity> {
        self.current.borrow().as_ref().map(|s| s.identity.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.current.borrow().is_some()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.current.subscribe()
    }

    async fn establish(&self, session: Session) -> ClientResult<UserIdentity> {
        let user = serde_json::to_string(&session.identity)?;
        // Memory stays authoritative when storage fails.
        if let Err(e) = self.persist(&session.token, &user).await {
            tracing::warn!("Could not persist session: {}", e);
        }
        let identity = session.identity.clone();
        self.current.send_replace(Some(session));
        tracing::info!("Session established for user {}", identity.id);
        Ok(identity)
    }

    async fn persist(&self, token: &str, user: &str) -> Result<(), PersistenceError> {
        self.persistence.write(TOKEN_KEY, token).await?;
        self.persistence.write(USER_KEY, user).await
    }

    async fn clear_persisted(&self) {
        for key in [TOKEN_KEY, USER_KEY] {
            if let Err(e) = self.persistence.remove(key).await {
                tracing::warn!("Could not clear stored {}: {}", key, e);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn replace_for_test(&self, session: Session) {
        self.current.send_replace(Some(session));
    }
}
