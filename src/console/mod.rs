//! Controllers behind the admin console and the context object that owns
//! them.
//!
//! A [`Console`] holds one controller per view region. All of them share a
//! single [`SessionStore`]; when any request sees a 401 the store is cleared,
//! and the next [`Console::check_session`] tears every controller back down
//! to its initial state so the operator lands at the login entry point.

pub mod auth;
pub mod blacklist;
pub mod config_editor;
pub mod file_browser;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::api::AuthenticatedClient;
use crate::config::Config;
use crate::errors::{ConsoleError, Result};
use crate::notification::Notifier;
use crate::session::{SessionStatus, SessionStore};

pub use auth::{AuthFlow, LoginForm, TwoFactorState};
pub use blacklist::BlacklistManager;
pub use config_editor::{ConfigEditor, ConfigForm, RowId};
pub use file_browser::{ActionKind, Command, FileBrowser, Listing};

/// Interactive confirmation for destructive actions.
pub trait Confirm: Send + Sync {
    fn confirm(&self, prompt: &str) -> bool;
}

/// Pre-approves everything (`--yes`).
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&self, _prompt: &str) -> bool {
        true
    }
}

/// Declines everything.
pub struct AssumeNo;

impl Confirm for AssumeNo {
    fn confirm(&self, _prompt: &str) -> bool {
        false
    }
}

/// Post a failure to `region`. Expired sessions are not reported per region:
/// the whole console is reset instead.
pub(crate) fn report_failure(notifier: &Notifier, region: &str, action: &str, err: &ConsoleError) {
    match err {
        ConsoleError::AuthExpired => {}
        ConsoleError::Cancelled => {}
        other => {
            tracing::error!(region, "{} failed: {}", action, other);
            notifier.error(region, format!("{} failed: {}", action, other.user_message()));
        }
    }
}

pub struct Console {
    session: Arc<SessionStore>,
    notifier: Notifier,
    status: watch::Receiver<SessionStatus>,
    pub auth: AuthFlow,
    pub config: ConfigEditor,
    pub files: FileBrowser,
    pub blacklist: BlacklistManager,
}

impl Console {
    pub fn new(
        cfg: &Config,
        session: Arc<SessionStore>,
        confirm: Arc<dyn Confirm>,
        notifier: Notifier,
    ) -> Result<Self> {
        let client = AuthenticatedClient::with_connect_timeout(
            cfg.server_url.clone(),
            session.clone(),
            Duration::from_secs(cfg.connect_timeout_secs),
        )?;
        let status = session.subscribe();

        Ok(Self {
            auth: AuthFlow::new(client.clone(), notifier.clone()),
            config: ConfigEditor::new(
                client.clone(),
                notifier.clone(),
                &cfg.totp_issuer,
                &cfg.qr_service_url,
            ),
            files: FileBrowser::new(
                client.clone(),
                notifier.clone(),
                confirm.clone(),
                cfg.download_dir.clone(),
            ),
            blacklist: BlacklistManager::new(client, notifier.clone(), confirm),
            session,
            notifier,
            status,
        })
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    /// Observe session changes since the last call. An unauthenticated
    /// session resets every controller.
    pub fn check_session(&mut self) -> SessionStatus {
        let changed = self.status.has_changed().unwrap_or(false);
        let status = *self.status.borrow_and_update();
        if changed && status == SessionStatus::Unauthenticated {
            tracing::info!("session ended, returning to login");
            self.reset();
        }
        status
    }

    /// Drop all view state back to the unauthenticated root.
    pub fn reset(&mut self) {
        self.auth.reset();
        self.config.reset();
        self.files.reset();
        self.blacklist.reset();
        self.notifier.clear_all();
    }

    pub fn logout(&mut self) {
        self.auth.logout();
        self.check_session();
    }

    /// Load every region after login. The loads run concurrently and each
    /// only touches its own controller.
    pub async fn load_all(&mut self) -> Result<()> {
        let (config, files, blacklist) = tokio::join!(
            self.config.load(),
            self.files.navigate(crate::models::files::DirectoryPath::root()),
            self.blacklist.load(),
        );
        let result = config.and(files).and(blacklist);
        self.check_session();
        result
    }
}
