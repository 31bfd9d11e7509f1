//! Gemini-backed [`Generator`] for memo text.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use underwrite_shared::{GeminiConfig, Generator, Result, UnderwriteError};

/// User-Agent string for generation requests.
const USER_AGENT: &str = concat!("Underwrite/", env!("CARGO_PKG_VERSION"));

/// Header carrying the API key. Keeps the key out of URLs and error text.
const API_KEY_HEADER: &str = "x-goog-api-key";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, config: &GeminiConfig) -> Result<Self> {
        let endpoint = config.endpoint_url()?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| UnderwriteError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: endpoint.as_str().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: config.model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl Generator for GeminiClient {
    #[instrument(skip_all, fields(model = %self.model))]
    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        let payload = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        let res = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, self.api_key.as_str())
            .json(&payload)
            .send()
            .await
            .map_err(|e| UnderwriteError::Network(format!("{url}: {}", e.without_url())))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| {
                UnderwriteError::Network(format!("{url}: failed to read body: {}", e.without_url()))
            })?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|env| env.error.message)
                .unwrap_or(body);
            return Err(UnderwriteError::Generation(format!(
                "Gemini API error (status {status}): {message}"
            )));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body)
            .map_err(|e| UnderwriteError::Generation(format!("malformed response: {e}")))?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .ok_or_else(|| UnderwriteError::Generation("no candidates returned".into()))?
            .parts
            .into_iter()
            .filter_map(|p| p.text)
            .collect();

        if text.trim().is_empty() {
            return Err(UnderwriteError::Generation(
                "model returned no text content".into(),
            ));
        }

        debug!(chars = text.len(), "generation complete");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> GeminiClient {
        let config = GeminiConfig {
            endpoint: server.uri(),
            ..Default::default()
        };
        GeminiClient::new("secret", &config).expect("client")
    }

    #[tokio::test]
    async fn generate_joins_candidate_parts() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/models/gemini-2.5-flash:generateContent"))
            .and(header("x-goog-api-key", "secret"))
            .and(body_partial_json(json!({
                "contents": [ { "role": "user", "parts": [ { "text": "write a memo" } ] } ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [ { "content": { "role": "model", "parts": [
                    { "text": "## Executive Summary\n" },
                    { "text": "Solid deal." }
                ] } } ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = client_for(&server)
            .generate("write a memo")
            .await
            .expect("text");
        assert_eq!(text, "## Executive Summary\nSolid deal.");
    }

    #[tokio::test]
    async fn api_error_becomes_generation_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": { "code": 429, "message": "Resource has been exhausted", "status": "RESOURCE_EXHAUSTED" }
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).generate("p").await.unwrap_err();
        assert!(matches!(err, UnderwriteError::Generation(_)));
        assert!(err.to_string().contains("Resource has been exhausted"));
        assert!(err.to_string().contains("429"));
    }

    #[tokio::test]
    async fn empty_candidates_are_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
            .mount(&server)
            .await;

        let err = client_for(&server).generate("p").await.unwrap_err();
        assert!(err.to_string().contains("no candidates"));
    }

    #[tokio::test]
    async fn network_error_does_not_expose_api_key() {
        let config = GeminiConfig {
            endpoint: "http://127.0.0.1:9".into(),
            timeout_secs: 5,
            ..Default::default()
        };
        let client = GeminiClient::new("SUPERSECRETKEY", &config).expect("client");

        let err = client.generate("p").await.unwrap_err();
        assert!(matches!(err, UnderwriteError::Network(_)));
        assert!(!err.to_string().contains("SUPERSECRETKEY"));
    }

    #[tokio::test]
    async fn api_key_is_not_sent_in_the_url() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [ { "content": { "parts": [ { "text": "ok" } ] } } ]
            })))
            .mount(&server)
            .await;

        client_for(&server).generate("p").await.expect("text");

        let requests = server.received_requests().await.expect("recording enabled");
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url.query(), None);
    }
}
