//! Cohere rerank client (`POST /v2/rerank`).

use super::{RerankHit, RerankModel, post_json, resolve_api_key};
use crate::config::RerankConfig;
use crate::error::ProviderError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};

pub struct CohereReranker {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
    results: Vec<RerankHit>,
}

impl CohereReranker {
    /// Create a client, reading the key from `config.api_key_env`.
    pub fn new(config: &RerankConfig) -> Result<Self, ProviderError> {
        let api_key = resolve_api_key(&config.api_key_env, "Cohere")?;
        Ok(Self::new_with_key(config, api_key))
    }

    pub fn new_with_key(config: &RerankConfig, api_key: String) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
        }
    }

    fn request_body(&self, query: &str, documents: &[String], top_n: usize) -> Value {
        json!({
            "model": self.model,
            "query": query,
            "documents": documents,
            "top_n": top_n,
        })
    }

    fn parse_hits(body: Value, candidates: usize) -> Result<Vec<RerankHit>, ProviderError> {
        let parsed: RerankResponse =
            serde_json::from_value(body).map_err(|e| ProviderError::ResponseParse {
                message: format!("Invalid rerank response: {e}"),
            })?;
        if let Some(bad) = parsed.results.iter().find(|h| h.index >= candidates) {
            return Err(ProviderError::ResponseParse {
                message: format!(
                    "Rerank index {} out of range for {candidates} documents",
                    bad.index
                ),
            });
        }
        Ok(parsed.results)
    }
}

#[async_trait]
impl RerankModel for CohereReranker {
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_n: usize,
    ) -> Result<Vec<RerankHit>, ProviderError> {
        let url = format!("{}/rerank", self.base_url);
        let body = self.request_body(query, documents, top_n);
        let json = post_json(&self.client, "Cohere", &url, &self.api_key, &body).await?;
        Self::parse_hits(json, documents.len())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
