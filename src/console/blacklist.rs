use std::sync::Arc;

use reqwest::Method;

use crate::api::{self, AuthenticatedClient};
use crate::errors::{ConsoleError, Result};
use crate::models::blacklist::{BlacklistEntry, NewBlacklistEntry};
use crate::notification::{self, Notifier};

use super::{report_failure, Confirm};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlacklistRow {
    pub ip: String,
    pub reason: String,
    pub created: String,
}

impl From<&BlacklistEntry> for BlacklistRow {
    fn from(entry: &BlacklistEntry) -> Self {
        Self {
            ip: entry.ip.clone(),
            reason: entry.reason.clone(),
            created: entry.created_display(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BlacklistForm {
    pub ip: String,
    pub reason: String,
}

pub struct BlacklistManager {
    client: AuthenticatedClient,
    notifier: Notifier,
    confirm: Arc<dyn Confirm>,
    rows: Vec<BlacklistRow>,
    pub form: BlacklistForm,
}

impl BlacklistManager {
    pub fn new(client: AuthenticatedClient, notifier: Notifier, confirm: Arc<dyn Confirm>) -> Self {
        Self {
            client,
            notifier,
            confirm,
            rows: Vec::new(),
            form: BlacklistForm::default(),
        }
    }

    pub fn rows(&self) -> &[BlacklistRow] {
        &self.rows
    }

    pub fn ip_at(&self, row: usize) -> Option<&str> {
        self.rows.get(row).map(|r| r.ip.as_str())
    }

    pub async fn load(&mut self) -> Result<()> {
        match self
            .client
            .get_json::<Option<Vec<BlacklistEntry>>>(api::ADMIN_BLACKLIST, &[])
            .await
        {
            Ok(entries) => {
                let entries = entries.unwrap_or_default();
                tracing::debug!(count = entries.len(), "blacklist loaded");
                self.rows = entries.iter().map(BlacklistRow::from).collect();
                Ok(())
            }
            Err(e) => {
                report_failure(&self.notifier, notification::BLACKLIST, "loading blacklist", &e);
                Err(e)
            }
        }
    }

    /// Add the address in the form as typed. Input is kept on failure so it
    /// can be corrected.
    pub async fn add(&mut self) -> Result<()> {
        let ip = self.form.ip.clone();
        if ip.trim().is_empty() {
            let err = ConsoleError::Invalid("IP address is required".into());
            self.notifier.error(notification::BLACKLIST, err.to_string());
            return Err(err);
        }

        let body = NewBlacklistEntry {
            ip: &ip,
            reason: &self.form.reason,
        };
        if let Err(e) = self.client.send_json(Method::POST, api::ADMIN_BLACKLIST, &body).await {
            report_failure(&self.notifier, notification::BLACKLIST, "adding to blacklist", &e);
            return Err(e);
        }

        tracing::info!(ip = %ip, "added to blacklist");
        self.form = BlacklistForm::default();
        self.notifier
            .success(notification::BLACKLIST, format!("blocked {}", ip));
        self.load().await
    }

    /// Remove an address after confirmation. `Ok(false)` means declined.
    pub async fn remove(&mut self, ip: &str) -> Result<bool> {
        if !self.confirm.confirm(&format!("Remove {} from the blacklist?", ip)) {
            return Ok(false);
        }

        if let Err(e) = self.client.delete(api::ADMIN_BLACKLIST, &[("ip", ip)]).await {
            report_failure(&self.notifier, notification::BLACKLIST, "removing from blacklist", &e);
            return Err(e);
        }

        tracing::info!(ip, "removed from blacklist");
        self.notifier
            .success(notification::BLACKLIST, format!("unblocked {}", ip));
        self.load().await?;
        Ok(true)
    }

    pub fn reset(&mut self) {
        self.rows.clear();
        self.form = BlacklistForm::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::{AssumeNo, AssumeYes};
    use crate::session::storage::MemoryTokenStorage;
    use crate::session::SessionStore;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn manager(uri: &str, confirm: Arc<dyn Confirm>) -> (BlacklistManager, Notifier) {
        let session = Arc::new(
            SessionStore::open(Box::new(MemoryTokenStorage::with_token("t")), None).unwrap(),
        );
        let client = AuthenticatedClient::new(uri, session).unwrap();
        let notifier = Notifier::console();
        (BlacklistManager::new(client, notifier.clone(), confirm), notifier)
    }

    #[tokio::test]
    async fn test_load_null_is_empty() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/admin/blacklist"))
            .respond_with(ResponseTemplate::new(200).set_body_string("null"))
            .mount(&mock_server)
            .await;

        let (mut bl, _) = manager(&mock_server.uri(), Arc::new(AssumeYes));
        bl.load().await.unwrap();
        assert!(bl.rows().is_empty());
    }

    #[tokio::test]
    async fn test_add_clears_form_and_reloads() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/admin/blacklist"))
            .and(body_json(serde_json::json!({"ip": "203.0.113.9", "reason": " hotlinking "})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/admin/blacklist"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"ip": "203.0.113.9", "reason": "hotlinking", "created_at": "2024-03-01 08:00:00"}
            ])))
            .expect(1)
            .mount(&mock_server)
            .await;

        let (mut bl, _) = manager(&mock_server.uri(), Arc::new(AssumeYes));
        bl.form.ip = "203.0.113.9".into();
        bl.form.reason = " hotlinking ".into();
        bl.add().await.unwrap();

        assert!(bl.form.ip.is_empty());
        assert_eq!(bl.ip_at(0), Some("203.0.113.9"));
    }

    #[tokio::test]
    async fn test_add_blank_ip_sends_nothing() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let (mut bl, notifier) = manager(&mock_server.uri(), Arc::new(AssumeYes));
        bl.form.ip = "   ".into();
        bl.form.reason = "no ip".into();
        assert!(bl.add().await.is_err());
        assert_eq!(bl.form.reason, "no ip");
        assert!(notifier.current(notification::BLACKLIST).is_some());
    }

    #[tokio::test]
    async fn test_rejected_add_keeps_input() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/admin/blacklist"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid IP address"))
            .mount(&mock_server)
            .await;

        let (mut bl, notifier) = manager(&mock_server.uri(), Arc::new(AssumeYes));
        bl.form.ip = "999.1.1.1".into();
        assert!(bl.add().await.is_err());
        assert_eq!(bl.form.ip, "999.1.1.1");
        assert_eq!(
            notifier.current(notification::BLACKLIST).unwrap().text,
            "adding to blacklist failed: invalid IP address"
        );
    }

    #[tokio::test]
    async fn test_remove_confirmed_and_declined() {
        let mock_server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/admin/blacklist"))
            .and(query_param("ip", "10.0.0.1"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/admin/blacklist"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&mock_server)
            .await;

        let (mut declined, _) = manager(&mock_server.uri(), Arc::new(AssumeNo));
        assert!(!declined.remove("10.0.0.1").await.unwrap());

        let (mut confirmed, _) = manager(&mock_server.uri(), Arc::new(AssumeYes));
        assert!(confirmed.remove("10.0.0.1").await.unwrap());
    }
}
