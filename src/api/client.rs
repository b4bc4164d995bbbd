//! HTTP client for the admin API.
//!
//! Every authenticated call goes through [`AuthenticatedClient::request`],
//! which attaches the raw session token as the `Authorization` header and
//! turns any `401 Unauthorized` into a global session reset.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::Stream;
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::{ConsoleError, Result};
use crate::session::SessionStore;

/// Outgoing request body.
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    /// Multipart bodies keep reqwest's boundary content type.
    Multipart(reqwest::multipart::Form),
}

#[derive(Clone)]
pub struct AuthenticatedClient {
    base_url: String,
    http: Client,
    session: Arc<SessionStore>,
}

impl AuthenticatedClient {
    pub fn new(base_url: impl Into<String>, session: Arc<SessionStore>) -> Result<Self> {
        Self::with_connect_timeout(base_url, session, Duration::from_secs(5))
    }

    pub fn with_connect_timeout(
        base_url: impl Into<String>,
        session: Arc<SessionStore>,
        connect_timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .connect_timeout(connect_timeout)
            .user_agent(concat!("mirror-admin/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            session,
        })
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Perform an authenticated call. Non-2xx statuses come back as errors
    /// carrying the response body text; there is no retry.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: RequestBody,
    ) -> Result<Response> {
        let mut req = self.http.request(method.clone(), self.url(path));
        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(token) = self.session.get() {
            req = req.header(reqwest::header::AUTHORIZATION, token.as_str());
        }
        req = match body {
            RequestBody::Empty => req,
            RequestBody::Json(value) => req
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(serde_json::to_vec(&value)?),
            RequestBody::Multipart(form) => req.multipart(form),
        };

        let resp = req.send().await.map_err(|e| {
            tracing::warn!(%method, path, "admin API request failed: {}", e);
            ConsoleError::Network(e)
        })?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!(%method, path, "session rejected by server, logging out");
            self.session.clear();
            return Err(ConsoleError::AuthExpired);
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            tracing::debug!(%method, path, %status, "admin API returned error");
            return Err(ConsoleError::Rejected {
                status,
                message: message.trim().to_string(),
            });
        }
        Ok(resp)
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let resp = self.request(Method::GET, path, query, RequestBody::Empty).await?;
        let body = resp.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    pub async fn send_json<B: Serialize>(&self, method: Method, path: &str, body: &B) -> Result<()> {
        let value = serde_json::to_value(body)?;
        self.request(method, path, &[], RequestBody::Json(value)).await?;
        Ok(())
    }

    /// Body of an authenticated GET as a chunk stream, for payloads too
    /// large to buffer.
    pub async fn get_stream(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<impl Stream<Item = reqwest::Result<Bytes>>> {
        let resp = self.request(Method::GET, path, query, RequestBody::Empty).await?;
        Ok(resp.bytes_stream())
    }

    pub async fn delete(&self, path: &str, query: &[(&str, &str)]) -> Result<()> {
        self.request(Method::DELETE, path, query, RequestBody::Empty).await?;
        Ok(())
    }

    /// Calls made before a session exists (2FA status check, login). No token is
    /// attached and a 401 here is an ordinary failure, not an expiry.
    pub fn anonymous(&self) -> AnonymousClient<'_> {
        AnonymousClient { inner: self }
    }
}

pub struct AnonymousClient<'a> {
    inner: &'a AuthenticatedClient,
}

impl AnonymousClient<'_> {
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self.inner.http.get(self.inner.url(path)).send().await?;
        let resp = reject_non_success(resp).await?;
        let body = resp.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    pub async fn post_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let resp = self
            .inner
            .http
            .post(self.inner.url(path))
            .json(body)
            .send()
            .await?;
        let resp = reject_non_success(resp).await?;
        let body = resp.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

async fn reject_non_success(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = resp.text().await.unwrap_or_default();
    Err(ConsoleError::Rejected {
        status,
        message: message.trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::storage::MemoryTokenStorage;
    use crate::session::SessionStatus;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store_with(token: Option<&str>) -> Arc<SessionStore> {
        let storage = match token {
            Some(t) => MemoryTokenStorage::with_token(t),
            None => MemoryTokenStorage::new(),
        };
        Arc::new(SessionStore::open(Box::new(storage), None).unwrap())
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = AuthenticatedClient::new("http://localhost:8080/", store_with(None)).unwrap();
        assert_eq!(client.url("/api/login"), "http://localhost:8080/api/login");
    }

    #[tokio::test]
    async fn test_raw_token_header_injected() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/admin/blacklist"))
            .and(header("authorization", "tok-raw"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = AuthenticatedClient::new(mock_server.uri(), store_with(Some("tok-raw"))).unwrap();
        let list: Vec<serde_json::Value> = client.get_json("/api/admin/blacklist", &[]).await.unwrap();
        assert!(list.is_empty());
    }

    #[tokio::test]
    async fn test_json_body_sets_content_type() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/admin/blacklist"))
            .and(header("content-type", "application/json"))
            .and(body_json(serde_json::json!({"ip": "1.2.3.4", "reason": "abuse"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = AuthenticatedClient::new(mock_server.uri(), store_with(Some("t"))).unwrap();
        client
            .send_json(
                Method::POST,
                "/api/admin/blacklist",
                &serde_json::json!({"ip": "1.2.3.4", "reason": "abuse"}),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_401_clears_session() {
        let mock_server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/admin/files"))
            .and(query_param("path", "a/b"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&mock_server)
            .await;

        let session = store_with(Some("stale"));
        let client = AuthenticatedClient::new(mock_server.uri(), session.clone()).unwrap();
        let err = client.delete("/api/admin/files", &[("path", "a/b")]).await.unwrap_err();

        assert!(matches!(err, ConsoleError::AuthExpired));
        assert!(session.get().is_none());
        assert_eq!(session.status(), SessionStatus::Unauthenticated);
    }

    #[tokio::test]
    async fn test_non_2xx_body_is_message() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/admin/config"))
            .respond_with(ResponseTemplate::new(500).set_body_string("database locked\n"))
            .mount(&mock_server)
            .await;

        let session = store_with(Some("t"));
        let client = AuthenticatedClient::new(mock_server.uri(), session.clone()).unwrap();
        let err = client
            .get_json::<serde_json::Value>("/api/admin/config", &[])
            .await
            .unwrap_err();

        match err {
            ConsoleError::Rejected { status, message } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(message, "database locked");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(session.get().is_some(), "only 401 may end the session");
    }

    #[tokio::test]
    async fn test_anonymous_login_401_does_not_clear_session() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/login"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad password"))
            .mount(&mock_server)
            .await;

        let session = store_with(Some("keep"));
        let client = AuthenticatedClient::new(mock_server.uri(), session.clone()).unwrap();
        let err = client
            .anonymous()
            .post_json::<_, serde_json::Value>("/api/login", &serde_json::json!({}))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "bad password");
        assert!(session.get().is_some());
    }
}
