//! HTTP client for the application backend.
//!
//! Wraps `reqwest` with bearer-token auth, status mapping to `ApiError`, and
//! rate-limit backoff on reads. Used directly for plan generation and by
//! `remote::HttpDocumentStore` for document reads and writes.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{header, Client, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use crate::models::QuizData;

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
/// Plan generation calls an LLM and can take a while.
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Maximum number of retries for rate-limited (429) reads.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Path of the on-demand plan generation endpoint
const GENERATE_PLANS_PATH: &str = "/generate-plans-on-demand";

#[derive(Debug, Serialize)]
struct GeneratePlansRequest<'a> {
    #[serde(rename = "userId")]
    user_id: &'a str,
    #[serde(rename = "quizData")]
    quiz_data: &'a QuizData,
}

/// API client for the backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        })
    }

    pub fn set_token(&mut self, token: impl Into<String>) {
        self.token = Some(token.into());
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    pub fn with_token(&self, token: impl Into<String>) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: Some(token.into()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn auth_headers(&self) -> Result<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        if let Some(ref token) = self.token {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&format!("Bearer {}", token))?,
            );
        }
        Ok(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    /// GET returning `None` on 404. Rate-limited responses back off and retry.
    pub async fn get_optional<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let url = self.url(path);
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = self
                .client
                .get(&url)
                .headers(self.auth_headers()?)
                .send()
                .await
                .map_err(ApiError::from)
                .with_context(|| format!("Failed to send GET request to {}", url))?;

            match response.status() {
                StatusCode::NOT_FOUND => {
                    debug!(url = %url, "Resource not found");
                    return Ok(None);
                }
                StatusCode::TOO_MANY_REQUESTS => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited.into());
                    }
                    warn!(url = %url, retry = retries, backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                }
                _ => {
                    let response = Self::check_response(response).await?;
                    let parsed = response
                        .json()
                        .await
                        .map_err(ApiError::from)
                        .with_context(|| format!("Failed to parse JSON response from {}", url))?;
                    return Ok(Some(parsed));
                }
            }
        }
    }

    pub async fn patch<B: Serialize>(&self, path: &str, body: &B) -> Result<()> {
        let url = self.url(path);
        let response = self
            .client
            .patch(&url)
            .headers(self.auth_headers()?)
            .json(body)
            .send()
            .await
            .map_err(ApiError::from)
            .with_context(|| format!("Failed to send PATCH request to {}", url))?;
        Self::check_response(response).await?;
        Ok(())
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.url(path);
        let response = self
            .client
            .post(&url)
            .headers(self.auth_headers()?)
            .json(body)
            .send()
            .await
            .map_err(ApiError::from)
            .with_context(|| format!("Failed to send POST request to {}", url))?;
        let response = Self::check_response(response).await?;
        response
            .json()
            .await
            .map_err(ApiError::from)
            .with_context(|| format!("Failed to parse JSON response from {}", url))
    }

    // ===== Plan Generation =====

    /// Ask the backend to generate diet and workout plans from the quiz.
    ///
    /// The backend writes the plans into the user document; the caller reloads
    /// afterwards. Only success/failure is interpreted here.
    pub async fn generate_plans(&self, user_id: &str, quiz: &QuizData) -> Result<()> {
        let url = self.url(GENERATE_PLANS_PATH);
        let body = GeneratePlansRequest {
            user_id,
            quiz_data: quiz,
        };

        info!(user_id, "Requesting plan generation");
        let response = self
            .client
            .post(&url)
            .headers(self.auth_headers()?)
            .json(&body)
            .send()
            .await
            .map_err(ApiError::from)
            .context("Failed to send plan generation request")?;

        Self::check_response(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = ApiClient::new("https://api.example.com/").unwrap();
        assert_eq!(client.url("/users/u1"), "https://api.example.com/users/u1");
    }

    #[test]
    fn test_auth_headers() {
        let client = ApiClient::new("http://localhost").unwrap();
        assert!(client.auth_headers().unwrap().is_empty());

        let client = client.with_token("abc");
        let headers = client.auth_headers().unwrap();
        assert_eq!(headers[header::AUTHORIZATION], "Bearer abc");
    }

    #[test]
    fn test_generate_request_shape() {
        let quiz = QuizData {
            goal: vec!["perder-peso".to_string()],
            ..Default::default()
        };
        let body = GeneratePlansRequest {
            user_id: "u1",
            quiz_data: &quiz,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["userId"], "u1");
        assert_eq!(json["quizData"]["goal"][0], "perder-peso");
    }
}
