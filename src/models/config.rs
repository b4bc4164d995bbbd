//! The service configuration record as exchanged with `/api/admin/config`.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

pub const DEFAULT_ADMIN_MAX_RETRIES: u32 = 10;
pub const DEFAULT_ADMIN_LOCK_DURATION: u32 = 120;

/// Server configuration as loaded. Write-only secrets are deliberately absent:
/// they only ever travel outward on [`ConfigUpdate`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP port the mirror listens on.
    #[serde(default)]
    pub server_port: u16,
    /// Cron expression for the upstream version check.
    #[serde(default, deserialize_with = "nullable_string")]
    pub check_cron: String,
    /// Directory mirrored files are stored under.
    #[serde(default, deserialize_with = "nullable_string")]
    pub storage_path: String,
    /// Public base URL used when building download links.
    #[serde(default, deserialize_with = "nullable_string")]
    pub download_url_base: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub admin_user: String,
    /// Whether the admin console is reachable at all.
    #[serde(default)]
    pub admin_enabled: bool,
    /// Outbound proxy for upstream API calls.
    #[serde(default, deserialize_with = "nullable_string")]
    pub proxy_url: String,
    /// Proxy used for release asset downloads.
    #[serde(default, deserialize_with = "nullable_string")]
    pub asset_proxy_url: String,
    #[serde(default)]
    pub concurrent_downloads: u32,
    #[serde(default)]
    pub download_timeout_minutes: u32,
    /// Xget acceleration gate.
    #[serde(default)]
    pub xget_enabled: bool,
    #[serde(default, deserialize_with = "nullable_string")]
    pub xget_domain: String,
    /// Failed logins allowed before lockout.
    #[serde(default)]
    pub admin_max_retries: u32,
    /// Lockout duration in seconds.
    #[serde(default)]
    pub admin_lock_duration: u32,
    #[serde(default)]
    pub two_factor_enabled: bool,
    #[serde(default, deserialize_with = "nullable_string")]
    pub two_factor_secret: String,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub launchers: Vec<LauncherConfig>,
}

/// Wire shape of a load response: the typed record plus whatever else the
/// server sent. Unrecognized fields are logged by the editor and dropped.
#[derive(Debug, Deserialize)]
pub struct LoadedConfig {
    #[serde(flatten)]
    pub config: ServerConfig,
    #[serde(flatten)]
    pub unrecognized: BTreeMap<String, serde_json::Value>,
}

impl ServerConfig {
    /// Apply the presentation defaults for unset lockout settings.
    pub fn with_defaults(mut self) -> Self {
        if self.admin_max_retries == 0 {
            self.admin_max_retries = DEFAULT_ADMIN_MAX_RETRIES;
        }
        if self.admin_lock_duration == 0 {
            self.admin_lock_duration = DEFAULT_ADMIN_LOCK_DURATION;
        }
        self
    }
}

/// One tracked launcher. Order in the list is display and save order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LauncherConfig {
    #[serde(default, deserialize_with = "nullable_string")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub source_url: String,
    #[serde(
        default,
        deserialize_with = "optional_selector",
        skip_serializing_if = "Option::is_none"
    )]
    pub repo_selector: Option<String>,
}

impl LauncherConfig {
    pub fn new(name: &str, source_url: &str, repo_selector: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            source_url: source_url.to_string(),
            repo_selector: repo_selector
                .filter(|s| !s.trim().is_empty())
                .map(String::from),
        }
    }
}

/// Outgoing save payload. Secrets are present only when the operator typed
/// a new value; an absent field means "leave unchanged".
#[derive(Debug, Clone, Serialize)]
pub struct ConfigUpdate {
    #[serde(flatten)]
    pub config: ServerConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github_token: Option<String>,
}

fn nullable_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

fn nullable_vec<'de, D: Deserializer<'de>, T: Deserialize<'de>>(d: D) -> Result<Vec<T>, D::Error> {
    Ok(Option::<Vec<T>>::deserialize(d)?.unwrap_or_default())
}

fn optional_selector<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<String>::deserialize(d)?.filter(|s| !s.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_load_tolerates_nulls_and_missing_fields() {
        let loaded: LoadedConfig = serde_json::from_value(json!({
            "server_port": 8080,
            "check_cron": "0 */6 * * *",
            "download_url_base": null,
            "launchers": null
        }))
        .unwrap();

        assert_eq!(loaded.config.server_port, 8080);
        assert_eq!(loaded.config.download_url_base, "");
        assert!(loaded.config.launchers.is_empty());
        assert!(loaded.unrecognized.is_empty());
    }

    #[test]
    fn test_unknown_fields_are_captured_and_not_echoed() {
        let loaded: LoadedConfig = serde_json::from_value(json!({
            "server_port": 1,
            "admin_password": "$2a$14$hash",
            "legacy_flag": true
        }))
        .unwrap();

        assert_eq!(loaded.config.server_port, 1);
        assert!(loaded.unrecognized.contains_key("admin_password"));
        assert!(loaded.unrecognized.contains_key("legacy_flag"));
        assert!(!loaded.unrecognized.contains_key("server_port"));

        let out = serde_json::to_value(&loaded.config).unwrap();
        assert!(out.get("admin_password").is_none());
        assert!(out.get("legacy_flag").is_none());
    }

    #[test]
    fn test_with_defaults_fills_lockout_settings() {
        let cfg = ServerConfig::default().with_defaults();
        assert_eq!(cfg.admin_max_retries, 10);
        assert_eq!(cfg.admin_lock_duration, 120);

        let cfg = ServerConfig {
            admin_max_retries: 3,
            ..Default::default()
        }
        .with_defaults();
        assert_eq!(cfg.admin_max_retries, 3);
    }

    #[test]
    fn test_empty_selector_is_none() {
        let l: LauncherConfig =
            serde_json::from_value(json!({"name": "fcl", "source_url": "u", "repo_selector": ""})).unwrap();
        assert_eq!(l.repo_selector, None);
        assert_eq!(LauncherConfig::new("zl", "u", Some("  ")).repo_selector, None);

        let out = serde_json::to_value(&l).unwrap();
        assert!(out.get("repo_selector").is_none());
    }

    #[test]
    fn test_update_omits_absent_secrets() {
        let update = ConfigUpdate {
            config: ServerConfig::default(),
            admin_password: None,
            github_token: Some("ghp_x".into()),
        };
        let out = serde_json::to_value(&update).unwrap();
        assert!(out.get("admin_password").is_none());
        assert_eq!(out["github_token"], "ghp_x");
        assert!(out.get("launchers").is_some());
    }
}
