//! End-to-end console flows against a mock admin API.
//!
//! Each test wires a full [`Console`] (shared session, all four controllers)
//! to a wiremock server standing in for the mirror service.

use std::path::Path;
use std::sync::Arc;

use mirror_console::config::Config;
use mirror_console::console::{AssumeYes, Console};
use mirror_console::notification::{self, Notifier};
use mirror_console::session::cookie::CookieFileChannel;
use mirror_console::session::storage::FileTokenStorage;
use mirror_console::session::{DeliveryChannel, SessionStatus, SessionStore};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn console_for(server: &MockServer, dir: &Path, token: Option<&str>) -> Console {
    let session_file = dir.join("session");
    if let Some(token) = token {
        std::fs::write(&session_file, token).unwrap();
    }
    let cfg = Config {
        server_url: server.uri(),
        session_file: session_file.clone(),
        download_dir: dir.join("downloads"),
        ..Default::default()
    };
    let session =
        Arc::new(SessionStore::open(Box::new(FileTokenStorage::new(session_file)), None).unwrap());
    Console::new(&cfg, session, Arc::new(AssumeYes), Notifier::console()).unwrap()
}

fn config_body(launchers: &[&str]) -> serde_json::Value {
    let launchers: Vec<_> = launchers
        .iter()
        .map(|n| serde_json::json!({"name": n, "source_url": format!("https://github.com/o/{}", n)}))
        .collect();
    serde_json::json!({
        "server_port": 8080,
        "check_cron": "0 */6 * * *",
        "admin_user": "admin",
        "admin_enabled": true,
        "two_factor_enabled": false,
        "two_factor_secret": "",
        "launchers": launchers,
        "added_in_a_newer_server": {"x": 1}
    })
}

mod session_expiry_tests {
    use super::*;

    #[tokio::test]
    async fn test_401_from_any_region_resets_whole_console() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/admin/config"))
            .respond_with(ResponseTemplate::new(200).set_body_json(config_body(&["fcl"])))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/admin/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"name": "a.zip", "is_dir": false, "size": 10, "mod_time": "2024-01-01T00:00:00Z"}
            ])))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/admin/blacklist"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&mock_server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut console = console_for(&mock_server, dir.path(), Some("stale"));
        assert!(console.is_authenticated());

        let err = console.load_all().await.unwrap_err();
        assert!(matches!(err, mirror_console::errors::ConsoleError::AuthExpired));

        assert!(!console.is_authenticated());
        assert_eq!(console.session().status(), SessionStatus::Unauthenticated);
        assert!(!dir.path().join("session").exists());

        assert!(console.config.form().is_none());
        assert!(console.files.listing().rows.is_empty());
        assert!(console.blacklist.rows().is_empty());
        for region in [
            notification::LOGIN,
            notification::CONFIG,
            notification::FILES,
            notification::BLACKLIST,
        ] {
            assert!(console.notifier().current(region).is_none());
        }
    }

    #[tokio::test]
    async fn test_load_all_populates_every_region() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/admin/config"))
            .and(header("authorization", "live"))
            .respond_with(ResponseTemplate::new(200).set_body_json(config_body(&["fcl", "hmcl"])))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/admin/files"))
            .and(header("authorization", "live"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/admin/blacklist"))
            .and(header("authorization", "live"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"ip": "198.51.100.7", "reason": "abuse", "created_at": "2024-02-02T02:02:02Z"}
            ])))
            .expect(1)
            .mount(&mock_server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut console = console_for(&mock_server, dir.path(), Some("live"));
        console.load_all().await.unwrap();

        assert_eq!(console.config.form().unwrap().rows().len(), 2);
        assert!(console.files.current().is_root());
        assert_eq!(console.blacklist.ip_at(0), Some("198.51.100.7"));
        assert!(console.is_authenticated());
    }

    #[tokio::test]
    async fn test_logout_clears_stored_token() {
        let mock_server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let mut console = console_for(&mock_server, dir.path(), Some("tok"));

        console.logout();
        assert!(!console.is_authenticated());
        assert!(!dir.path().join("session").exists());
    }
}

mod config_save_tests {
    use super::*;

    #[tokio::test]
    async fn test_removed_row_is_not_persisted() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/admin/config"))
            .respond_with(ResponseTemplate::new(200).set_body_json(config_body(&["X", "Y", "Z"])))
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/admin/config"))
            .and(body_partial_json(serde_json::json!({
                "launchers": [
                    {"name": "X", "source_url": "https://github.com/o/X"},
                    {"name": "Z", "source_url": "https://github.com/o/Z"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut console = console_for(&mock_server, dir.path(), Some("tok"));
        console.config.load().await.unwrap();

        let form = console.config.form_mut().unwrap();
        let y = form.row_at(1).unwrap();
        assert!(form.remove_row(y));
        console.config.save().await.unwrap();

        let notice = console.notifier().current(notification::CONFIG).unwrap();
        assert!(notice.text.starts_with("saved"));
    }

    #[tokio::test]
    async fn test_blank_secrets_omitted_and_unknown_fields_dropped() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/admin/config"))
            .respond_with(ResponseTemplate::new(200).set_body_json(config_body(&[])))
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/admin/config"))
            .and(|req: &Request| {
                let body: serde_json::Value = match serde_json::from_slice(&req.body) {
                    Ok(v) => v,
                    Err(_) => return false,
                };
                body.get("admin_password").is_none()
                    && body.get("github_token").is_none()
                    && body.get("added_in_a_newer_server").is_none()
                    && body["admin_max_retries"] == 10
            })
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut console = console_for(&mock_server, dir.path(), Some("tok"));
        console.config.load().await.unwrap();
        console.config.save().await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_save_keeps_edits() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/admin/config"))
            .respond_with(ResponseTemplate::new(200).set_body_json(config_body(&[])))
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/admin/config"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid cron expression"))
            .mount(&mock_server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut console = console_for(&mock_server, dir.path(), Some("tok"));
        console.config.load().await.unwrap();
        console.config.form_mut().unwrap().set_field("check_cron", "bogus").unwrap();

        assert!(console.config.save().await.is_err());
        assert_eq!(console.config.form().unwrap().fields.check_cron, "bogus");
        assert_eq!(
            console.notifier().current(notification::CONFIG).unwrap().text,
            "saving config failed: invalid cron expression"
        );
        assert!(console.is_authenticated());
    }
}

mod token_delivery_tests {
    use super::*;

    #[test]
    fn test_callback_cookie_is_consumed_once() {
        let dir = tempfile::tempdir().unwrap();
        let cookie_file = dir.path().join("cookies");
        let session_file = dir.path().join("state").join("session");
        std::fs::write(&cookie_file, "theme=dark; admin_token=from-callback\n").unwrap();

        let channel = CookieFileChannel::new(&cookie_file);
        let store = SessionStore::open(
            Box::new(FileTokenStorage::new(&session_file)),
            Some(&channel as &dyn DeliveryChannel),
        )
        .unwrap();

        assert_eq!(store.get().unwrap().as_str(), "from-callback");
        assert_eq!(std::fs::read_to_string(&session_file).unwrap(), "from-callback");
        assert_eq!(std::fs::read_to_string(&cookie_file).unwrap(), "theme=dark\n");
        assert_eq!(channel.take().unwrap(), None);
    }

    #[test]
    fn test_stored_token_wins_over_cookie() {
        let dir = tempfile::tempdir().unwrap();
        let cookie_file = dir.path().join("cookies");
        let session_file = dir.path().join("session");
        std::fs::write(&session_file, "stored").unwrap();
        std::fs::write(&cookie_file, "admin_token=fresh").unwrap();

        let channel = CookieFileChannel::new(&cookie_file);
        let store = SessionStore::open(
            Box::new(FileTokenStorage::new(&session_file)),
            Some(&channel as &dyn DeliveryChannel),
        )
        .unwrap();

        assert_eq!(store.get().unwrap().as_str(), "stored");
        assert!(cookie_file.exists());
    }
}
