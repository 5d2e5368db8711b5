//! Gmail REST client with OAuth refresh-token authentication.
//!
//! The refresh token is written by the external OAuth callback and read
//! from the store; access tokens are minted on demand and cached until
//! shortly before they expire.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::{ConfigError, Error, MailError};
use crate::mail::MailSource;
use crate::model::UserId;
use crate::pipeline::types::InboundEmail;
use crate::store::Database;

pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1";

/// Refresh this long before Google says the token expires.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// OAuth client credentials.
#[derive(Debug, Clone)]
pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub client_secret: SecretString,
    pub token_url: String,
    pub api_base: String,
}

impl GoogleOAuthConfig {
    pub fn new(client_id: impl Into<String>, client_secret: SecretString) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret,
            token_url: DEFAULT_TOKEN_URL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }
}

struct CachedToken {
    token: SecretString,
    valid_until: Instant,
}

pub struct GmailClient {
    http: reqwest::Client,
    oauth: GoogleOAuthConfig,
    refresh_token: SecretString,
    access: Mutex<Option<CachedToken>>,
}

impl GmailClient {
    pub fn new(oauth: GoogleOAuthConfig, refresh_token: SecretString) -> Self {
        Self {
            http: reqwest::Client::new(),
            oauth,
            refresh_token,
            access: Mutex::new(None),
        }
    }

    /// Build a client from the refresh token stored for `user`.
    ///
    /// A user who never connected Gmail has no token; that is a
    /// configuration error, not something a later poll can recover from.
    pub async fn from_store(
        db: &dyn Database,
        user: &UserId,
        oauth: GoogleOAuthConfig,
    ) -> Result<Self, Error> {
        let token = db
            .get_refresh_token(user)
            .await?
            .ok_or_else(|| ConfigError::MissingRequired {
                key: format!("Google refresh token for {user}"),
                hint: "Connect Gmail first.".into(),
            })?;
        Ok(Self::new(oauth, SecretString::from(token)))
    }

    async fn access_token(&self) -> Result<SecretString, MailError> {
        let mut cached = self.access.lock().await;
        if let Some(ref tok) = *cached
            && Instant::now() < tok.valid_until
        {
            return Ok(tok.token.clone());
        }

        let form = [
            ("client_id", self.oauth.client_id.as_str()),
            ("client_secret", self.oauth.client_secret.expose_secret()),
            ("refresh_token", self.refresh_token.expose_secret()),
            ("grant_type", "refresh_token"),
        ];
        let resp = self
            .http
            .post(&self.oauth.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| MailError::TokenRefresh(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(MailError::TokenRefresh(format!("HTTP {status}: {body}")));
        }

        let granted: TokenResponse = resp
            .json()
            .await
            .map_err(|e| MailError::TokenRefresh(format!("bad token response: {e}")))?;

        let lifetime = Duration::from_secs(granted.expires_in).saturating_sub(EXPIRY_MARGIN);
        let token = SecretString::from(granted.access_token);
        *cached = Some(CachedToken {
            token: token.clone(),
            valid_until: Instant::now() + lifetime,
        });
        info!(expires_in = granted.expires_in, "Refreshed Gmail access token");
        Ok(token)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, MailError> {
        let token = self.access_token().await?;
        let resp = self
            .http
            .get(url)
            .bearer_auth(token.expose_secret())
            .query(query)
            .send()
            .await
            .map_err(|e| MailError::RequestFailed(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(MailError::Status {
                status: status.as_u16(),
                body,
            });
        }
        resp.json()
            .await
            .map_err(|e| MailError::InvalidResponse(e.to_string()))
    }
}

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GmailMessage {
    thread_id: Option<String>,
    snippet: Option<String>,
    /// Milliseconds since the epoch, encoded as a string.
    internal_date: Option<String>,
    payload: Option<GmailPayload>,
}

#[derive(Debug, Default, Deserialize)]
struct GmailPayload {
    #[serde(default)]
    headers: Vec<GmailHeader>,
}

#[derive(Debug, Deserialize)]
struct GmailHeader {
    name: String,
    value: String,
}

fn header<'a>(headers: &'a [GmailHeader], name: &str) -> &'a str {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str())
        .unwrap_or("")
}

/// Receive time: `internalDate` if present, else the `Date` header, else now.
fn received_at(internal_date: Option<&str>, date_header: &str) -> DateTime<Utc> {
    internal_date
        .and_then(|ms| ms.parse::<i64>().ok())
        .and_then(DateTime::from_timestamp_millis)
        .or_else(|| {
            DateTime::parse_from_rfc2822(date_header)
                .ok()
                .map(|d| d.with_timezone(&Utc))
        })
        .unwrap_or_else(Utc::now)
}

fn to_inbound(message_id: &str, msg: GmailMessage) -> InboundEmail {
    let headers = msg.payload.map(|p| p.headers).unwrap_or_default();
    let date = header(&headers, "Date").to_string();
    InboundEmail {
        message_id: message_id.to_string(),
        thread_id: msg.thread_id.filter(|t| !t.is_empty()),
        from: header(&headers, "From").to_string(),
        subject: header(&headers, "Subject").to_string(),
        received_at: received_at(msg.internal_date.as_deref(), &date),
        date,
        snippet: msg.snippet.unwrap_or_default(),
    }
}

#[async_trait]
impl MailSource for GmailClient {
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<String>, MailError> {
        let url = format!("{}/users/me/messages", self.oauth.api_base);
        let max = max_results.to_string();
        let list: ListResponse = self
            .get_json(&url, &[("q", query), ("maxResults", max.as_str())])
            .await?;
        debug!(count = list.messages.len(), "Gmail search returned");
        Ok(list.messages.into_iter().map(|m| m.id).collect())
    }

    async fn fetch(&self, message_id: &str) -> Result<InboundEmail, MailError> {
        let url = format!("{}/users/me/messages/{message_id}", self.oauth.api_base);
        let msg: GmailMessage = self
            .get_json(
                &url,
                &[
                    ("format", "metadata"),
                    ("metadataHeaders", "Subject"),
                    ("metadataHeaders", "From"),
                    ("metadataHeaders", "Date"),
                ],
            )
            .await?;
        Ok(to_inbound(message_id, msg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::Router;
    use axum::extract::{Path, Query};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use serde_json::json;

    use crate::store::LibSqlBackend;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn oauth(base: &str) -> GoogleOAuthConfig {
        GoogleOAuthConfig {
            client_id: "client".into(),
            client_secret: SecretString::from("secret"),
            token_url: format!("{base}/token"),
            api_base: format!("{base}/gmail/v1"),
        }
    }

    fn authorized(headers: &HeaderMap) -> bool {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == "Bearer at-1")
    }

    /// Mock Google: token endpoint plus list/get, counting token grants.
    fn mock_google(grants: Arc<AtomicUsize>) -> Router {
        Router::new()
            .route(
                "/token",
                post(move |body: String| {
                    let grants = Arc::clone(&grants);
                    async move {
                        assert!(body.contains("grant_type=refresh_token"));
                        assert!(body.contains("refresh_token=rt-1"));
                        grants.fetch_add(1, Ordering::SeqCst);
                        axum::Json(json!({ "access_token": "at-1", "expires_in": 3599 }))
                    }
                }),
            )
            .route(
                "/gmail/v1/users/me/messages",
                get(
                    |headers: HeaderMap, Query(q): Query<HashMap<String, String>>| async move {
                        if !authorized(&headers) {
                            return Err(StatusCode::UNAUTHORIZED);
                        }
                        assert_eq!(q.get("maxResults").map(String::as_str), Some("2"));
                        assert!(q.get("q").is_some_and(|q| q.contains("newer_than")));
                        Ok(axum::Json(json!({
                            "messages": [
                                { "id": "m1", "threadId": "T1" },
                                { "id": "m2", "threadId": "T1" }
                            ],
                            "resultSizeEstimate": 2
                        })))
                    },
                ),
            )
            .route(
                "/gmail/v1/users/me/messages/{id}",
                get(|Path(id): Path<String>, headers: HeaderMap| async move {
                    if !authorized(&headers) {
                        return Err(StatusCode::UNAUTHORIZED);
                    }
                    Ok(axum::Json(json!({
                        "id": id,
                        "threadId": "T1",
                        "snippet": "Thanks for applying to Acme",
                        "internalDate": "1767350400000",
                        "payload": { "headers": [
                            { "name": "Subject", "value": "Your application" },
                            { "name": "From", "value": "Acme <jobs@acme.com>" },
                            { "name": "Date", "value": "Fri, 2 Jan 2026 10:40:00 +0000" }
                        ]}
                    })))
                }),
            )
    }

    #[test]
    fn to_inbound_reads_headers_case_insensitively() {
        let msg = GmailMessage {
            thread_id: Some("T9".into()),
            snippet: Some("hello".into()),
            internal_date: None,
            payload: Some(GmailPayload {
                headers: vec![
                    GmailHeader {
                        name: "subject".into(),
                        value: "Interview".into(),
                    },
                    GmailHeader {
                        name: "FROM".into(),
                        value: "hr@x.io".into(),
                    },
                    GmailHeader {
                        name: "Date".into(),
                        value: "Tue, 6 Jan 2026 08:00:00 +0000".into(),
                    },
                ],
            }),
        };
        let email = to_inbound("m9", msg);
        assert_eq!(email.subject, "Interview");
        assert_eq!(email.from, "hr@x.io");
        assert_eq!(email.thread_id.as_deref(), Some("T9"));
        assert_eq!(email.received_at.to_rfc3339(), "2026-01-06T08:00:00+00:00");
    }

    #[test]
    fn to_inbound_tolerates_missing_fields() {
        let email = to_inbound("m0", GmailMessage::default());
        assert_eq!(email.message_id, "m0");
        assert!(email.thread_id.is_none());
        assert_eq!(email.subject, "");
        assert_eq!(email.snippet, "");
    }

    #[test]
    fn internal_date_wins_over_header() {
        let at = received_at(Some("1767350400000"), "Tue, 6 Jan 2026 08:00:00 +0000");
        assert_eq!(at.to_rfc3339(), "2026-01-02T10:40:00+00:00");
    }

    #[tokio::test]
    async fn missing_refresh_token_is_config_error() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        let user = UserId::new("demo-user");
        let result = GmailClient::from_store(&db, &user, oauth("http://unused")).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn search_and_fetch_against_mock_google() {
        let grants = Arc::new(AtomicUsize::new(0));
        let base = serve(mock_google(Arc::clone(&grants))).await;

        let db = LibSqlBackend::new_memory().await.unwrap();
        let user = UserId::new("demo-user");
        db.save_refresh_token(&user, "rt-1").await.unwrap();
        let gmail = GmailClient::from_store(&db, &user, oauth(&base)).await.unwrap();

        let ids = gmail
            .search(&crate::mail::build_query(2), 2)
            .await
            .unwrap();
        assert_eq!(ids, vec!["m1", "m2"]);

        let email = gmail.fetch("m1").await.unwrap();
        assert_eq!(email.subject, "Your application");
        assert_eq!(email.from, "Acme <jobs@acme.com>");
        assert_eq!(email.thread_id.as_deref(), Some("T1"));
        assert_eq!(email.snippet, "Thanks for applying to Acme");

        // One grant serves all three calls.
        assert_eq!(grants.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rejected_refresh_is_token_error() {
        let router = Router::new().route(
            "/token",
            post(|| async { (StatusCode::BAD_REQUEST, "{\"error\":\"invalid_grant\"}") }),
        );
        let base = serve(router).await;
        let gmail = GmailClient::new(oauth(&base), SecretString::from("revoked"));

        match gmail.search("q", 1).await {
            Err(MailError::TokenRefresh(msg)) => assert!(msg.contains("invalid_grant")),
            other => panic!("Expected TokenRefresh, got {:?}", other),
        }
    }
}
