//! Safe Browsing Client
//!
//! One batched `threatMatches:find` call per lookup. No retry, no chunking.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::models::ThreatMatch;

pub const CLIENT_ID: &str = "PhishingDetection";
pub const CLIENT_VERSION: &str = "1.5.2";

pub const THREAT_TYPES: [&str; 4] = [
    "MALWARE",
    "SOCIAL_ENGINEERING",
    "UNWANTED_SOFTWARE",
    "POTENTIALLY_HARMFUL_APPLICATION",
];
pub const PLATFORM_TYPES: [&str; 1] = ["ANY_PLATFORM"];
pub const THREAT_ENTRY_TYPES: [&str; 1] = ["URL"];

// Request/Response types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FindThreatMatchesRequest {
    pub client: ClientInfo,
    pub threat_info: ThreatInfo,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    pub client_id: &'static str,
    pub client_version: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreatInfo {
    pub threat_types: Vec<&'static str>,
    pub platform_types: Vec<&'static str>,
    pub threat_entry_types: Vec<&'static str>,
    pub threat_entries: Vec<ThreatEntry>,
}

#[derive(Debug, Serialize)]
pub struct ThreatEntry {
    pub url: String,
}

/// A body without `matches` means nothing was flagged
#[derive(Debug, Deserialize)]
pub struct FindThreatMatchesResponse {
    #[serde(default)]
    pub matches: Option<Vec<ThreatMatch>>,
}

/// Build the lookup body, one threat entry per URL in input order
pub fn build_request(urls: &[String]) -> FindThreatMatchesRequest {
    FindThreatMatchesRequest {
        client: ClientInfo {
            client_id: CLIENT_ID,
            client_version: CLIENT_VERSION,
        },
        threat_info: ThreatInfo {
            threat_types: THREAT_TYPES.to_vec(),
            platform_types: PLATFORM_TYPES.to_vec(),
            threat_entry_types: THREAT_ENTRY_TYPES.to_vec(),
            threat_entries: urls
                .iter()
                .map(|url| ThreatEntry { url: url.clone() })
                .collect(),
        },
    }
}

/// Parse a raw response body into its match list
pub fn parse_matches(body: &str) -> Result<Vec<ThreatMatch>, LookupError> {
    let parsed: FindThreatMatchesResponse = serde_json::from_str(body)?;
    Ok(parsed.matches.unwrap_or_default())
}

/// Lookup errors
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("Safe Browsing API key not configured")]
    MissingApiKey,

    #[error("Safe Browsing request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Safe Browsing returned HTTP {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    #[error("Invalid Safe Browsing response: {0}")]
    ResponseParse(#[from] serde_json::Error),
}

impl LookupError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, LookupError::Transport(e) if e.is_timeout())
    }
}

/// Threat lookup provider
#[async_trait]
pub trait ThreatLookup: Send + Sync {
    /// Whether lookups can be issued at all (credentials present)
    fn is_configured(&self) -> bool;

    /// Raw matches for the given URLs, one outbound call
    async fn find_threat_matches(&self, urls: &[String]) -> Result<Vec<ThreatMatch>, LookupError>;
}

/// Safe Browsing v4 client
pub struct SafeBrowsingClient {
    endpoint: String,
    api_key: Option<String>,
    http_client: reqwest::Client,
}

impl SafeBrowsingClient {
    /// Create new client
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()?;

        Ok(Self {
            endpoint: endpoint.into(),
            api_key,
            http_client,
        })
    }
}

#[async_trait]
impl ThreatLookup for SafeBrowsingClient {
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn find_threat_matches(&self, urls: &[String]) -> Result<Vec<ThreatMatch>, LookupError> {
        let api_key = self.api_key.as_ref().ok_or(LookupError::MissingApiKey)?;

        if urls.is_empty() {
            return Ok(Vec::new());
        }

        let request = build_request(urls);

        let response = self.http_client
            .post(&self.endpoint)
            .query(&[("key", api_key)])
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        tracing::debug!("Safe Browsing responded {} for {} entries", status.as_u16(), urls.len());

        let body = response.text().await?;

        if !status.is_success() {
            return Err(LookupError::UpstreamStatus {
                status: status.as_u16(),
                body,
            });
        }

        let matches = parse_matches(&body).map_err(|e| {
            tracing::error!("Invalid JSON returned by Safe Browsing: {}", e);
            e
        })?;

        for m in &matches {
            tracing::info!(
                "THREAT FOUND: {} ({})",
                m.url().unwrap_or("<unknown>"),
                m.threat_type().unwrap_or("unknown type")
            );
        }

        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Query, http::StatusCode, response::IntoResponse, routing::post, Json, Router};
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::Arc;

    use crate::classifier::ClassifyError;
    use crate::error::AppError;

    fn urls(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    /// Serve `status` + `body` on a local port, recording each request
    async fn fake_provider(status: StatusCode, body: &'static str) -> (String, Arc<Mutex<Vec<(String, Value)>>>) {
        slow_provider(status, body, Duration::ZERO).await
    }

    /// Same as `fake_provider`, but waits `delay` before answering
    async fn slow_provider(
        status: StatusCode,
        body: &'static str,
        delay: Duration,
    ) -> (String, Arc<Mutex<Vec<(String, Value)>>>) {
        let seen: Arc<Mutex<Vec<(String, Value)>>> = Arc::new(Mutex::new(Vec::new()));
        let recorder = seen.clone();

        let app = Router::new().route(
            "/v4/threatMatches:find",
            post(move |Query(q): Query<HashMap<String, String>>, Json(req): Json<Value>| {
                let recorder = recorder.clone();
                async move {
                    recorder.lock().push((q.get("key").cloned().unwrap_or_default(), req));
                    tokio::time::sleep(delay).await;
                    (status, body)
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}/v4/threatMatches:find", addr), seen)
    }

    fn client(endpoint: &str, key: Option<&str>) -> SafeBrowsingClient {
        SafeBrowsingClient::new(endpoint, key.map(String::from), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_request_body_shape() {
        let body = serde_json::to_value(build_request(&urls(&["http://a/", "http://b/"]))).unwrap();

        assert_eq!(body["client"], json!({"clientId": "PhishingDetection", "clientVersion": "1.5.2"}));
        assert_eq!(
            body["threatInfo"]["threatTypes"],
            json!(["MALWARE", "SOCIAL_ENGINEERING", "UNWANTED_SOFTWARE", "POTENTIALLY_HARMFUL_APPLICATION"])
        );
        assert_eq!(body["threatInfo"]["platformTypes"], json!(["ANY_PLATFORM"]));
        assert_eq!(body["threatInfo"]["threatEntryTypes"], json!(["URL"]));
        assert_eq!(
            body["threatInfo"]["threatEntries"],
            json!([{"url": "http://a/"}, {"url": "http://b/"}])
        );
    }

    #[test]
    fn test_parse_missing_matches_is_empty() {
        assert!(parse_matches("{}").unwrap().is_empty());
        assert!(parse_matches(r#"{"matches": null}"#).unwrap().is_empty());
    }

    #[test]
    fn test_parse_malformed() {
        assert!(matches!(parse_matches("<html>oops</html>"), Err(LookupError::ResponseParse(_))));
        assert!(matches!(parse_matches(r#"{"matches": "nope"}"#), Err(LookupError::ResponseParse(_))));
    }

    #[test]
    fn test_parse_matches_passthrough() {
        let body = r#"{"matches": [{"threatType": "MALWARE", "threat": {"url": "http://x/"}, "cacheDuration": "300s"}]}"#;
        let matches = parse_matches(body).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].url(), Some("http://x/"));
        assert_eq!(matches[0].0["cacheDuration"], json!("300s"));
    }

    #[tokio::test]
    async fn test_missing_api_key_sends_nothing() {
        let (endpoint, seen) = fake_provider(StatusCode::OK, "{}").await;
        let c = client(&endpoint, None);

        assert!(!c.is_configured());
        let err = c.find_threat_matches(&urls(&["http://a/"])).await.unwrap_err();
        assert!(matches!(err, LookupError::MissingApiKey));
        assert!(seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_single_call_with_key_and_entries() {
        let (endpoint, seen) = fake_provider(
            StatusCode::OK,
            r#"{"matches": [{"threatType": "SOCIAL_ENGINEERING", "threat": {"url": "http://b/"}}]}"#,
        )
        .await;
        let c = client(&endpoint, Some("test-key"));

        let matches = c.find_threat_matches(&urls(&["http://a/", "http://b/"])).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].url(), Some("http://b/"));

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "test-key");
        assert_eq!(seen[0].1["threatInfo"]["threatEntries"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_upstream_error_status() {
        let (endpoint, _) = fake_provider(StatusCode::BAD_REQUEST, r#"{"error": {"code": 400}}"#).await;
        let err = client(&endpoint, Some("k"))
            .find_threat_matches(&urls(&["http://a/"]))
            .await
            .unwrap_err();

        match err {
            LookupError::UpstreamStatus { status, body } => {
                assert_eq!(status, 400);
                assert!(body.contains("400"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_json_success_body() {
        let (endpoint, _) = fake_provider(StatusCode::OK, "not json").await;
        let err = client(&endpoint, Some("k"))
            .find_threat_matches(&urls(&["http://a/"]))
            .await
            .unwrap_err();
        assert!(matches!(err, LookupError::ResponseParse(_)));
        assert!(!err.is_timeout());
    }

    #[tokio::test]
    async fn test_slow_provider_times_out() {
        let (endpoint, _) = slow_provider(StatusCode::OK, "{}", Duration::from_secs(2)).await;
        let c = SafeBrowsingClient::new(endpoint, Some("k".to_string()), Duration::from_millis(100)).unwrap();

        let err = c.find_threat_matches(&urls(&["http://a/"])).await.unwrap_err();
        assert!(err.is_timeout(), "expected timeout, got {err:?}");

        let response = AppError::from(ClassifyError::Lookup(err)).into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }
}
