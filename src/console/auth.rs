//! Login, logout and the two-factor status check.

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::api::{self, AuthenticatedClient};
use crate::errors::{ConsoleError, Result};
use crate::notification::{self, Notifier};
use crate::session::SessionToken;

pub const DEFAULT_USERNAME: &str = "admin";
const LOGIN_FAILED: &str = "login failed, check username, password or verification code";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TwoFactorState {
    Unknown,
    Disabled,
    Enabled,
}

#[derive(Debug, Deserialize)]
struct TwoFactorStatus {
    #[serde(default)]
    enabled: bool,
}

#[derive(Default)]
pub struct LoginForm {
    pub username: String,
    pub password: Zeroizing<String>,
    pub otp_code: String,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
    otp_code: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

pub struct AuthFlow {
    client: AuthenticatedClient,
    notifier: Notifier,
    state: TwoFactorState,
    pub form: LoginForm,
}

impl AuthFlow {
    pub fn new(client: AuthenticatedClient, notifier: Notifier) -> Self {
        Self {
            client,
            notifier,
            state: TwoFactorState::Unknown,
            form: LoginForm::default(),
        }
    }

    pub fn state(&self) -> TwoFactorState {
        self.state
    }

    /// Ask the server whether logins need a one-time code. Failure is not
    /// fatal: the login form simply does not ask for one.
    pub async fn check_two_factor(&mut self) -> TwoFactorState {
        self.state = match self
            .client
            .anonymous()
            .get_json::<TwoFactorStatus>(api::TWO_FACTOR_STATUS)
            .await
        {
            Ok(status) if status.enabled => TwoFactorState::Enabled,
            Ok(_) => TwoFactorState::Disabled,
            Err(e) => {
                tracing::warn!("failed to check 2FA status: {}", e);
                TwoFactorState::Disabled
            }
        };
        self.state
    }

    pub fn requires_otp(&self) -> bool {
        self.state == TwoFactorState::Enabled
    }

    /// Submit the login form. On success the token is stored and the
    /// password is wiped from the form; on failure the form is kept and the
    /// server's message is shown in the login region.
    pub async fn login(&mut self) -> Result<()> {
        let result = self.submit().await;
        match &result {
            Ok(()) => {
                self.form.password = Zeroizing::new(String::new());
                self.form.otp_code.clear();
                tracing::info!(username = %self.username(), "logged in");
            }
            Err(ConsoleError::Rejected { message, .. }) if message.is_empty() => {
                self.notifier.error(notification::LOGIN, LOGIN_FAILED);
            }
            Err(e) => self.notifier.error(notification::LOGIN, e.user_message()),
        }
        result
    }

    async fn submit(&self) -> Result<()> {
        let otp_code = self.form.otp_code.trim();
        if self.requires_otp() && otp_code.is_empty() {
            return Err(ConsoleError::Invalid("verification code required".into()));
        }

        let username = self.username();
        let body = LoginRequest {
            username: &username,
            password: self.form.password.as_str(),
            otp_code,
        };
        let resp: LoginResponse = self.client.anonymous().post_json(api::LOGIN, &body).await?;

        let token = SessionToken::new(resp.token)
            .ok_or_else(|| ConsoleError::Invalid("server returned an empty token".into()))?;
        self.client.session().set(token)?;
        Ok(())
    }

    fn username(&self) -> String {
        let name = self.form.username.trim();
        if name.is_empty() {
            DEFAULT_USERNAME.to_string()
        } else {
            name.to_string()
        }
    }

    pub fn logout(&self) {
        tracing::info!("logging out");
        self.client.session().clear();
    }

    pub fn reset(&mut self) {
        self.form = LoginForm::default();
    }
}
