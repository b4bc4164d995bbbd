//! Service configuration editor.
//!
//! The loaded config is turned into an editable [`ConfigForm`]. Launchers
//! become rows with stable ids so a row can be removed without disturbing
//! the others; at save time the rows are collected back, in order, into the
//! outgoing record. Password and upstream token inputs always start blank
//! and a blank input means "leave the stored value alone".

use zeroize::Zeroizing;

use crate::api::{self, AuthenticatedClient};
use crate::errors::{ConsoleError, Result};
use crate::models::config::{ConfigUpdate, LauncherConfig, LoadedConfig, ServerConfig};
use crate::notification::{self, Notifier};
use crate::totp::TwoFactorSetup;

use super::report_failure;

const SAVED: &str = "saved; some settings take effect after a restart";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId(u64);

impl RowId {
    pub fn value(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherRow {
    pub id: RowId,
    pub name: String,
    pub source_url: String,
    pub repo_selector: String,
}

impl LauncherRow {
    fn to_config(&self) -> LauncherConfig {
        LauncherConfig::new(&self.name, &self.source_url, Some(self.repo_selector.as_str()))
    }
}

/// A write-only secret input.
#[derive(Default)]
pub struct SecretInput(Zeroizing<String>);

impl SecretInput {
    pub fn set(&mut self, value: &str) {
        self.0 = Zeroizing::new(value.to_string());
    }

    pub fn is_blank(&self) -> bool {
        self.0.is_empty()
    }

    /// The typed value, or `None` when the operator left the input blank.
    pub fn value_if_set(&self) -> Option<String> {
        if self.is_blank() {
            None
        } else {
            Some(self.0.to_string())
        }
    }
}

impl std::fmt::Debug for SecretInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(if self.is_blank() { "SecretInput(blank)" } else { "SecretInput(****)" })
    }
}

#[derive(Debug)]
pub struct ConfigForm {
    /// Scalar fields. Its `launchers` and 2FA fields are rebuilt from the
    /// rows and [`TwoFactorSetup`] at save time.
    pub fields: ServerConfig,
    rows: Vec<LauncherRow>,
    next_row: u64,
    pub admin_password: SecretInput,
    pub github_token: SecretInput,
    pub two_factor: TwoFactorSetup,
}

impl ConfigForm {
    pub fn from_config(config: ServerConfig, issuer: &str, qr_service: &str) -> Self {
        let mut fields = config.with_defaults();
        let launchers = std::mem::take(&mut fields.launchers);

        let mut form = Self {
            fields,
            rows: Vec::new(),
            next_row: 0,
            admin_password: SecretInput::default(),
            github_token: SecretInput::default(),
            two_factor: TwoFactorSetup::new(issuer, qr_service),
        };
        let account = form.account();
        form.two_factor.load(
            form.fields.two_factor_enabled,
            &form.fields.two_factor_secret,
            &account,
        );
        for launcher in launchers {
            form.add_row(launcher);
        }
        form
    }

    pub fn rows(&self) -> &[LauncherRow] {
        &self.rows
    }

    /// Append a row at the end.
    pub fn add_row(&mut self, data: LauncherConfig) -> RowId {
        let id = RowId(self.next_row);
        self.next_row += 1;
        self.rows.push(LauncherRow {
            id,
            name: data.name,
            source_url: data.source_url,
            repo_selector: data.repo_selector.unwrap_or_default(),
        });
        id
    }

    /// Remove exactly one row; the rest keep their order.
    pub fn remove_row(&mut self, id: RowId) -> bool {
        let before = self.rows.len();
        self.rows.retain(|r| r.id != id);
        before != self.rows.len()
    }

    pub fn row_mut(&mut self, id: RowId) -> Option<&mut LauncherRow> {
        self.rows.iter_mut().find(|r| r.id == id)
    }

    /// Row id at a visible position.
    pub fn row_at(&self, index: usize) -> Option<RowId> {
        self.rows.get(index).map(|r| r.id)
    }

    /// Edit a scalar field by its wire name.
    pub fn set_field(&mut self, name: &str, value: &str) -> Result<()> {
        let f = &mut self.fields;
        match name {
            "server_port" => f.server_port = parse_number(name, value)?,
            "check_cron" => f.check_cron = value.to_string(),
            "storage_path" => f.storage_path = value.to_string(),
            "download_url_base" => f.download_url_base = value.to_string(),
            "admin_user" => f.admin_user = value.to_string(),
            "admin_enabled" => f.admin_enabled = parse_bool(name, value)?,
            "proxy_url" => f.proxy_url = value.to_string(),
            "asset_proxy_url" => f.asset_proxy_url = value.to_string(),
            "concurrent_downloads" => f.concurrent_downloads = parse_number(name, value)?,
            "download_timeout_minutes" => f.download_timeout_minutes = parse_number(name, value)?,
            "xget_enabled" => f.xget_enabled = parse_bool(name, value)?,
            "xget_domain" => f.xget_domain = value.to_string(),
            "admin_max_retries" => f.admin_max_retries = parse_number(name, value)?,
            "admin_lock_duration" => f.admin_lock_duration = parse_number(name, value)?,
            "admin_password" => self.set_password(value),
            "github_token" => self.set_github_token(value),
            "two_factor_enabled" | "two_factor_secret" | "launchers" => {
                return Err(ConsoleError::Invalid(format!(
                    "'{}' is edited through its own section",
                    name
                )))
            }
            other => return Err(ConsoleError::Invalid(format!("unknown config field '{}'", other))),
        }
        Ok(())
    }

    /// Account name embedded in the otpauth URI.
    pub fn account(&self) -> String {
        let user = self.fields.admin_user.trim();
        if user.is_empty() {
            super::auth::DEFAULT_USERNAME.to_string()
        } else {
            user.to_string()
        }
    }

    /// A blank value leaves the stored password unchanged.
    pub fn set_password(&mut self, value: &str) {
        self.admin_password.set(value);
    }

    pub fn set_github_token(&mut self, value: &str) {
        self.github_token.set(value);
    }

    pub fn set_two_factor_enabled(&mut self, enabled: bool) {
        let account = self.account();
        self.two_factor.set_enabled(enabled, &account, &mut rand::thread_rng());
    }

    pub fn regenerate_secret(&mut self) {
        let account = self.account();
        self.two_factor.regenerate(&account, &mut rand::thread_rng());
    }

    /// Collect the form into one save payload.
    pub fn to_update(&self) -> ConfigUpdate {
        let mut config = self.fields.clone();
        config.launchers = self.rows.iter().map(LauncherRow::to_config).collect();
        config.two_factor_enabled = self.two_factor.enabled;
        config.two_factor_secret = self.two_factor.secret.clone();

        ConfigUpdate {
            config,
            admin_password: self.admin_password.value_if_set(),
            github_token: self.github_token.value_if_set(),
        }
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConsoleError::Invalid(format!("'{}' expects a number, got '{}'", name, value)))
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConsoleError::Invalid(format!(
            "'{}' expects true/false, got '{}'",
            name, value
        ))),
    }
}

pub struct ConfigEditor {
    client: AuthenticatedClient,
    notifier: Notifier,
    issuer: String,
    qr_service: String,
    form: Option<ConfigForm>,
}

impl ConfigEditor {
    pub fn new(client: AuthenticatedClient, notifier: Notifier, issuer: &str, qr_service: &str) -> Self {
        Self {
            client,
            notifier,
            issuer: issuer.to_string(),
            qr_service: qr_service.to_string(),
            form: None,
        }
    }

    pub fn form(&self) -> Option<&ConfigForm> {
        self.form.as_ref()
    }

    pub fn form_mut(&mut self) -> Result<&mut ConfigForm> {
        self.form
            .as_mut()
            .ok_or_else(|| ConsoleError::Invalid("config has not been loaded".into()))
    }

    /// Fetch the config and replace the form. Secret inputs come back blank.
    pub async fn load(&mut self) -> Result<()> {
        tracing::debug!("fetching config");
        let loaded = match self
            .client
            .get_json::<LoadedConfig>(api::ADMIN_CONFIG, &[])
            .await
        {
            Ok(loaded) => loaded,
            Err(e) => {
                report_failure(&self.notifier, notification::CONFIG, "loading config", &e);
                return Err(e);
            }
        };

        if !loaded.unrecognized.is_empty() {
            let keys: Vec<&str> = loaded.unrecognized.keys().map(String::as_str).collect();
            tracing::debug!(?keys, "ignoring unrecognized config fields");
        }

        let form = ConfigForm::from_config(loaded.config, &self.issuer, &self.qr_service);
        tracing::debug!(launchers = form.rows().len(), "config loaded");
        self.form = Some(form);
        Ok(())
    }

    /// Submit the form as one update, then reload. A failed save leaves the
    /// form exactly as the operator left it.
    pub async fn save(&mut self) -> Result<()> {
        let update = self.form_mut()?.to_update();

        if let Err(e) = self
            .client
            .send_json(reqwest::Method::POST, api::ADMIN_CONFIG, &update)
            .await
        {
            report_failure(&self.notifier, notification::CONFIG, "saving config", &e);
            return Err(e);
        }

        tracing::info!(launchers = update.config.launchers.len(), "config saved");
        self.notifier.success(notification::CONFIG, SAVED);
        self.load().await
    }

    pub fn reset(&mut self) {
        self.form = None;
    }
}
