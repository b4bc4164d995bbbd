pub mod cookie;
pub mod storage;

use std::fmt;
use std::sync::Mutex;

use tokio::sync::watch;
use zeroize::Zeroize;

/// Durable token storage backend.
pub trait TokenStorage: Send + Sync {
    fn load(&self) -> std::io::Result<Option<String>>;
    fn store(&self, token: &str) -> std::io::Result<()>;
    fn remove(&self) -> std::io::Result<()>;
}

/// Short-lived out-of-band token delivery. `take` is single-use: a value
/// returned once must never be returned again.
pub trait DeliveryChannel: Send + Sync {
    fn take(&self) -> std::io::Result<Option<String>>;
}

/// Opaque session credential. Never empty.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(****)")
    }
}

impl Drop for SessionToken {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Authenticated,
    Unauthenticated,
}

/// Sole owner of the session token.
///
/// The in-memory copy is authoritative for the running process; the storage
/// backend makes it survive restarts. Status changes are broadcast so the
/// console can fall back to the login entry point when a session dies.
pub struct SessionStore {
    storage: Box<dyn TokenStorage>,
    token: Mutex<Option<SessionToken>>,
    status: watch::Sender<SessionStatus>,
}

impl SessionStore {
    /// Open the store, recovering a token from `channel` when durable storage
    /// holds none.
    pub fn open(
        storage: Box<dyn TokenStorage>,
        channel: Option<&dyn DeliveryChannel>,
    ) -> std::io::Result<Self> {
        let mut token = storage.load()?.and_then(SessionToken::new);

        if token.is_none() {
            if let Some(channel) = channel {
                if let Some(delivered) = channel.take()?.and_then(SessionToken::new) {
                    tracing::info!("recovered session token from callback cookie");
                    storage.store(delivered.as_str())?;
                    token = Some(delivered);
                }
            }
        }

        let initial = if token.is_some() {
            SessionStatus::Authenticated
        } else {
            SessionStatus::Unauthenticated
        };
        let (status, _) = watch::channel(initial);

        Ok(Self {
            storage,
            token: Mutex::new(token),
            status,
        })
    }

    pub fn get(&self) -> Option<SessionToken> {
        self.token.lock().ok().and_then(|g| g.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.get().is_some()
    }

    pub fn set(&self, token: SessionToken) -> std::io::Result<()> {
        self.storage.store(token.as_str())?;
        if let Ok(mut guard) = self.token.lock() {
            *guard = Some(token);
        }
        self.status.send_replace(SessionStatus::Authenticated);
        Ok(())
    }

    /// Drop the token everywhere. Safe to call repeatedly.
    pub fn clear(&self) {
        if let Ok(mut guard) = self.token.lock() {
            *guard = None;
        }
        if let Err(e) = self.storage.remove() {
            tracing::warn!("failed to remove stored session token: {}", e);
        }
        self.status.send_replace(SessionStatus::Unauthenticated);
    }

    pub fn status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }
}
