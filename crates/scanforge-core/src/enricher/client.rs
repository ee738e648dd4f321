use crate::config::EnrichmentConfig;
use crate::error::ServiceError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use std::time::Duration;

/// The contract the pipeline holds against the text-generation service:
/// one prompt in, one block of text out, or a classified failure. The wire
/// format behind it is an implementation detail of the client.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ServiceError>;
}

/// Chat-completions client for an OpenAI-compatible endpoint.
pub struct OpenAiClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

impl OpenAiClient {
    /// Build a client with the credential baked into default headers. The
    /// client is cheap to share across enrichment workers.
    pub fn new(api_key: &str, config: &EnrichmentConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {api_key}"))
                .context("Invalid API key for Authorization header")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.retry.attempt_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    async fn generate(&self, prompt: &str) -> Result<String, ServiceError> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": 0.3,
            "messages": [
                {"role": "system", "content": "You are a cloud security and compliance expert."},
                {"role": "user", "content": prompt}
            ]
        });

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::Request(e.to_string()))?
            .error_for_status()
            .map_err(|e| ServiceError::Request(e.to_string()))?;

        let json: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ServiceError::Request(e.to_string()))?;

        match json["choices"][0]["message"]["content"].as_str() {
            Some(text) if !text.is_empty() => Ok(text.to_string()),
            _ => Err(ServiceError::EmptyResponse),
        }
    }
}
