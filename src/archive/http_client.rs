//! HTTP client for the XNAT archive and its viewer API.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};
use url::Url;

use super::{
    exists_path, experiment_path, session_list_path, session_record_path, ArchiveApi, Existence,
    RegenerateScope, SessionListEntry, SessionListResponse, SessionRecord,
};
use crate::config::Settings;
use crate::context::SessionRef;
use crate::error::ArchiveError;
use crate::manifest::Manifest;
use crate::navigator::join_path;

const USER_AGENT: &str = concat!("ohiflaunch/", env!("CARGO_PKG_VERSION"));

/// Resolve user agent from config value.
/// - None or empty => default ohiflaunch user agent
/// - other => custom user agent string
pub fn resolve_user_agent(config: Option<&str>) -> String {
    match config {
        None | Some("") => USER_AGENT.to_string(),
        Some(custom) => custom.to_string(),
    }
}

/// Archive client with request logging and optional basic auth.
#[derive(Clone)]
pub struct XnatClient {
    client: Client,
    base_url: Url,
    username: Option<String>,
    password: Option<String>,
}

impl XnatClient {
    /// Create a client from settings.
    pub fn new(settings: &Settings) -> Result<Self, ArchiveError> {
        let base_url = settings
            .base_url()
            .map_err(|e| ArchiveError::Url(e.to_string()))?;
        Self::with_base_url(
            base_url,
            Duration::from_secs(settings.request_timeout),
            Some(&settings.user_agent),
        )
        .map(|client| client.with_credentials(settings.username.clone(), settings.password.clone()))
    }

    /// Create a client for `base_url` without credentials.
    pub fn with_base_url(
        base_url: Url,
        timeout: Duration,
        user_agent_config: Option<&str>,
    ) -> Result<Self, ArchiveError> {
        let user_agent = resolve_user_agent(user_agent_config);
        // The archive hands out a JSESSIONID on first contact; reuse it.
        let client = Client::builder()
            .user_agent(&user_agent)
            .timeout(timeout)
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| ArchiveError::transport(base_url.as_str(), &e))?;

        Ok(Self {
            client,
            base_url,
            username: None,
            password: None,
        })
    }

    /// Set basic auth credentials.
    pub fn with_credentials(mut self, username: Option<String>, password: Option<String>) -> Self {
        self.username = username;
        self.password = password;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn request(&self, method: Method, path: &str) -> Result<HttpResponse, ArchiveError> {
        let url = join_path(&self.base_url, path)?;

        let mut request = self
            .client
            .request(method.clone(), url.clone())
            .header(ACCEPT, "application/json");
        if let Some(ref username) = self.username {
            request = request.basic_auth(username, self.password.as_deref());
        }

        let start = Instant::now();
        let response = request.send().await.map_err(|e| {
            warn!("{} {} failed: {}", method, url, e);
            ArchiveError::transport(url.as_str(), &e)
        })?;
        debug!(
            "{} {} -> {} ({} ms)",
            method,
            url,
            response.status().as_u16(),
            start.elapsed().as_millis()
        );

        Ok(HttpResponse {
            status: response.status(),
            url: url.to_string(),
            response,
        })
    }

    /// Make a GET request with `Accept: application/json`.
    pub async fn get(&self, path: &str) -> Result<HttpResponse, ArchiveError> {
        self.request(Method::GET, path).await
    }

    pub async fn post(&self, path: &str) -> Result<HttpResponse, ArchiveError> {
        self.request(Method::POST, path).await
    }
}

#[async_trait]
impl ArchiveApi for XnatClient {
    async fn manifest_exists(
        &self,
        project_id: &str,
        experiment_id: &str,
    ) -> Result<Existence, ArchiveError> {
        let response = self.get(&exists_path(project_id, experiment_id)).await?;
        match response.status {
            StatusCode::OK => Ok(Existence::Exists),
            StatusCode::NOT_FOUND => Ok(Existence::Missing),
            _ => Err(response.into_error()),
        }
    }

    async fn generate_manifest(
        &self,
        project_id: &str,
        experiment_id: &str,
    ) -> Result<(), ArchiveError> {
        self.get(&experiment_path(project_id, experiment_id))
            .await?
            .require_ok()?;
        info!("Viewer metadata ready for {}", experiment_id);
        Ok(())
    }

    async fn fetch_manifest(
        &self,
        project_id: &str,
        experiment_id: &str,
    ) -> Result<Manifest, ArchiveError> {
        let response = self
            .get(&experiment_path(project_id, experiment_id))
            .await?
            .require_ok()?;
        let url = response.url.clone();
        let body = response.text().await?;
        Manifest::from_json(&body).map_err(|e| ArchiveError::parse(&url, e))
    }

    async fn list_sessions(
        &self,
        project_id: &str,
        subject_id: &str,
    ) -> Result<Vec<SessionListEntry>, ArchiveError> {
        let listing: SessionListResponse = self
            .get(&session_list_path(project_id, subject_id))
            .await?
            .require_ok()?
            .json()
            .await?;
        Ok(listing.result_set.result)
    }

    async fn session_label(&self, session: &SessionRef) -> Result<Option<String>, ArchiveError> {
        let record: SessionRecord = self
            .get(&session_record_path(session))
            .await?
            .require_ok()?
            .json()
            .await?;
        Ok(record.label())
    }

    async fn regenerate(&self, scope: &RegenerateScope) -> Result<(), ArchiveError> {
        info!("Requesting metadata regeneration at {}", scope.path());
        let response = self.post(&scope.path()).await?;
        if matches!(response.status, StatusCode::OK | StatusCode::CREATED) {
            Ok(())
        } else {
            Err(response.into_error())
        }
    }
}

/// HTTP response wrapper.
pub struct HttpResponse {
    pub status: StatusCode,
    pub url: String,
    response: Response,
}

impl HttpResponse {
    /// Archive reads only count as successful on 200.
    pub fn require_ok(self) -> Result<Self, ArchiveError> {
        if self.status == StatusCode::OK {
            Ok(self)
        } else {
            Err(self.into_error())
        }
    }

    /// Convert an unwanted status into an error.
    pub fn into_error(self) -> ArchiveError {
        warn!("Unsuccessful response {} from {}", self.status, self.url);
        ArchiveError::from_status(self.status.as_u16(), &self.url)
    }

    /// Get response body as text.
    pub async fn text(self) -> Result<String, ArchiveError> {
        let url = self.url;
        self.response
            .text()
            .await
            .map_err(|e| ArchiveError::transport(&url, &e))
    }

    /// Parse the response body as JSON.
    pub async fn json<T: DeserializeOwned>(self) -> Result<T, ArchiveError> {
        let url = self.url.clone();
        let body = self.text().await?;
        serde_json::from_str(&body).map_err(|e| ArchiveError::parse(&url, e))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    #[test]
    fn test_resolve_user_agent_default() {
        let ua = resolve_user_agent(None);
        assert!(ua.starts_with("ohiflaunch/"));
        assert_eq!(resolve_user_agent(Some("")), ua);
    }

    #[test]
    fn test_resolve_user_agent_custom() {
        let ua = resolve_user_agent(Some("MyBot/1.0"));
        assert_eq!(ua, "MyBot/1.0");
    }

    #[test]
    fn test_client_from_settings() {
        let mut settings = Settings::default();
        settings.base_url = "https://xnat.example.org/xnat".to_string();
        settings.username = Some("admin".to_string());
        let client = XnatClient::new(&settings).unwrap();
        assert_eq!(client.base_url().as_str(), "https://xnat.example.org/xnat");
        assert_eq!(client.username.as_deref(), Some("admin"));
    }

    #[tokio::test]
    async fn test_unreachable_archive_is_transport_error() {
        // Port 9 (discard) on localhost is not expected to serve HTTP.
        let base = Url::parse("http://127.0.0.1:9").unwrap();
        let client = XnatClient::with_base_url(base, Duration::from_secs(2), None).unwrap();
        let err = client.manifest_exists("P1", "E1").await.unwrap_err();
        assert!(matches!(err, ArchiveError::Transport { .. }));
    }

    // ====================================================================
    // Status mapping against a local HTTP listener
    // ====================================================================

    /// Answer every request with `status_line` and `body`. Returns the
    /// base URL and the request lines received so far.
    async fn serve(
        status_line: &'static str,
        body: &'static str,
    ) -> (Url, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&requests);

        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    }
                }
                let head = String::from_utf8_lossy(&buf);
                if let Some(line) = head.lines().next() {
                    seen.lock().unwrap().push(line.to_string());
                }
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_line,
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        let base = Url::parse(&format!("http://{}/xnat", addr)).unwrap();
        (base, requests)
    }

    async fn client_for(
        status_line: &'static str,
        body: &'static str,
    ) -> (XnatClient, Arc<Mutex<Vec<String>>>) {
        let (base, requests) = serve(status_line, body).await;
        let client = XnatClient::with_base_url(base, Duration::from_secs(5), None).unwrap();
        (client, requests)
    }

    #[tokio::test]
    async fn test_exists_ok_means_exists() {
        let (client, requests) = client_for("200 OK", "").await;
        let existence = client.manifest_exists("P1", "E1").await.unwrap();
        assert_eq!(existence, Existence::Exists);
        assert_eq!(
            requests.lock().unwrap()[0],
            "GET /xnat/xapi/viewer/projects/P1/experiments/E1/exists HTTP/1.1"
        );
    }

    #[tokio::test]
    async fn test_exists_not_found_means_missing() {
        let (client, _) = client_for("404 Not Found", "").await;
        let existence = client.manifest_exists("P1", "E1").await.unwrap();
        assert_eq!(existence, Existence::Missing);
    }

    #[tokio::test]
    async fn test_exists_forbidden_is_error() {
        let (client, _) = client_for("403 Forbidden", "").await;
        let err = client.manifest_exists("P1", "E1").await.unwrap_err();
        assert!(matches!(err, ArchiveError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_exists_server_error_is_unexpected_status() {
        let (client, _) = client_for("500 Internal Server Error", "").await;
        let err = client.manifest_exists("P1", "E1").await.unwrap_err();
        assert!(matches!(
            err,
            ArchiveError::UnexpectedStatus { status: 500, .. }
        ));
    }

    #[tokio::test]
    async fn test_generate_requires_ok() {
        let (client, _) = client_for("200 OK", "{}").await;
        client.generate_manifest("P1", "E1").await.unwrap();

        let (client, _) = client_for("403 Forbidden", "").await;
        let err = client.generate_manifest("P1", "E1").await.unwrap_err();
        assert!(matches!(err, ArchiveError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_fetch_manifest_rejects_non_json_body() {
        let (client, _) = client_for("200 OK", "<html>login</html>").await;
        let err = client.fetch_manifest("P1", "E1").await.unwrap_err();
        assert!(matches!(err, ArchiveError::Parse { .. }));
    }

    #[tokio::test]
    async fn test_fetch_manifest_parses_studies() {
        let (client, _) = client_for(
            "200 OK",
            r#"{"studies":[{"series":[{"instances":[{}]}]}]}"#,
        )
        .await;
        let manifest = client.fetch_manifest("P1", "E1").await.unwrap();
        assert!(!manifest.is_empty());
    }

    #[tokio::test]
    async fn test_list_sessions_rejects_other_success_codes() {
        let (client, _) = client_for("204 No Content", "").await;
        let err = client.list_sessions("P1", "S1").await.unwrap_err();
        assert!(matches!(
            err,
            ArchiveError::UnexpectedStatus { status: 204, .. }
        ));
    }

    #[tokio::test]
    async fn test_list_sessions_reads_result_set() {
        let (client, _) = client_for(
            "200 OK",
            r#"{"ResultSet":{"Result":[{"ID":"E1","label":"MR1"}]}}"#,
        )
        .await;
        let sessions = client.list_sessions("P1", "S1").await.unwrap();
        assert_eq!(sessions, vec![SessionListEntry::new("E1", "MR1")]);
    }

    #[tokio::test]
    async fn test_regenerate_accepts_created() {
        let (client, requests) = client_for("201 Created", "").await;
        let scope = RegenerateScope::Project {
            project_id: "P1".into(),
        };
        client.regenerate(&scope).await.unwrap();
        assert_eq!(
            requests.lock().unwrap()[0],
            "POST /xnat/xapi/viewer/projects/P1 HTTP/1.1"
        );
    }

    #[tokio::test]
    async fn test_regenerate_locked() {
        let (client, _) = client_for("423 Locked", "").await;
        let err = client.regenerate(&RegenerateScope::All).await.unwrap_err();
        assert!(matches!(err, ArchiveError::Locked(_)));
    }
}
