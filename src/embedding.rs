//! Embedding provider implementations.
//!
//! - **[`HttpEmbeddingProvider`]**: calls the embedding service over HTTP.
//! - **[`DisabledProvider`]**: fails every non-empty request; used when
//!   embeddings are not configured.
//!
//! The [`EmbeddingProvider`] trait and vector helpers live in
//! `docket_core::embedding`.
//!
//! # Wire format
//!
//! ```text
//! POST {url}/embeddings
//! {"texts": ["first", "second"]}
//!
//! 200 OK
//! {"embeddings": [[0.01, ...], [0.02, ...]]}
//! ```
//!
//! One request per `embed` call and no retries. Every failure (transport
//! error, timeout, non-2xx, undecodable body, wrong count or dimension)
//! surfaces as `EmbeddingUnavailable`.

use anyhow::{bail, Context};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use docket_core::embedding::{validate_batch, EmbeddingProvider};
use docket_core::error::{EngineError, Result};

use crate::config::EmbeddingConfig;

// ============ Disabled Provider ============

/// A no-op embedding provider that always returns errors.
///
/// Used when `embedding.provider = "disabled"`. Documents still ingest
/// (without vectors) but hybrid search fails closed.
pub struct DisabledProvider;

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        Err(EngineError::embedding_unavailable(
            "embedding provider is disabled",
        ))
    }
}

// ============ HTTP Provider ============

#[derive(Serialize)]
struct EmbedRequest<'a> {
    texts: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Client for the HTTP embedding service.
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    dims: usize,
}

impl HttpEmbeddingProvider {
    /// Build a provider from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `embedding.url` is missing or the HTTP client
    /// cannot be constructed.
    pub fn new(config: &EmbeddingConfig) -> anyhow::Result<Self> {
        let url = config
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .context("embedding.url required for http provider")?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", url.trim_end_matches('/')),
            model: config.model.clone(),
            dims: config.dims,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        // The service rejects empty batches.
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(&self.endpoint)
            .json(&EmbedRequest { texts })
            .send()
            .await
            .map_err(|e| EngineError::embedding_unavailable(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::embedding_unavailable(format!(
                "embedding service returned {}: {}",
                status, body
            )));
        }

        let parsed: EmbedResponse = response.json().await.map_err(|e| {
            EngineError::embedding_unavailable(format!("malformed embedding response: {}", e))
        })?;

        validate_batch(&parsed.embeddings, texts.len(), self.dims)?;
        debug!(count = texts.len(), "embedded texts");
        Ok(parsed.embeddings)
    }
}

/// Create the appropriate [`EmbeddingProvider`] based on configuration.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledProvider`] |
/// | `"http"` | [`HttpEmbeddingProvider`] |
pub fn create_provider(config: &EmbeddingConfig) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledProvider)),
        "http" => Ok(Arc::new(HttpEmbeddingProvider::new(config)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}
