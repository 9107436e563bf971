//! OpenAI-compatible chat completion and embedding clients.
//!
//! Any endpoint that follows the OpenAI `/chat/completions` and `/embeddings`
//! request formats works (OpenAI, Azure OpenAI, Ollama, vLLM).

use super::{ChatModel, EmbeddingModel, post_json, resolve_api_key};
use crate::config::{EmbeddingConfig, LlmConfig};
use crate::error::ProviderError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

/// Local endpoints don't need a real key.
fn is_local(base_url: &str) -> bool {
    base_url.contains("localhost") || base_url.contains("127.0.0.1")
}

fn resolve_key(base_url: &str, api_key_env: &str) -> Result<String, ProviderError> {
    match resolve_api_key(api_key_env, "OpenAI-compatible") {
        Ok(key) => Ok(key),
        Err(_) if is_local(base_url) => Ok("local".to_string()),
        Err(e) => Err(e),
    }
}

/// Chat-completion client.
pub struct OpenAiChatModel {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl OpenAiChatModel {
    /// Create a client, reading the key from `config.api_key_env`.
    pub fn new(config: &LlmConfig) -> Result<Self, ProviderError> {
        let api_key = resolve_key(&config.base_url, &config.api_key_env)?;
        Ok(Self::new_with_key(config, api_key))
    }

    pub fn new_with_key(config: &LlmConfig, api_key: String) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    fn request_body(&self, system: &str, user: &str) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
            "temperature": self.temperature,
        });
        if let Some(max_tokens) = self.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        body
    }

    /// Pull the assistant text out of a chat completion response.
    fn parse_completion(body: &Value) -> Result<String, ProviderError> {
        let message = body
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .ok_or_else(|| ProviderError::ResponseParse {
                message: "No message in response choices".to_string(),
            })?;
        Ok(message
            .get("content")
            .and_then(|c| c.as_str())
            .unwrap_or_default()
            .to_string())
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn complete(&self, system: &str, user: &str) -> Result<String, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.request_body(system, user);
        let json = post_json(&self.client, "OpenAI-compatible", &url, &self.api_key, &body).await?;
        Self::parse_completion(&json)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Embeddings client.
pub struct OpenAiEmbeddings {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiEmbeddings {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, ProviderError> {
        let api_key = resolve_key(&config.base_url, &config.api_key_env)?;
        Ok(Self::new_with_key(config, api_key))
    }

    pub fn new_with_key(config: &EmbeddingConfig, api_key: String) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
        }
    }

    /// Decode `data[].embedding`, placing each vector at its `index`.
    fn parse_embeddings(body: &Value, expected: usize) -> Result<Vec<Vec<f32>>, ProviderError> {
        let data = body
            .get("data")
            .and_then(|d| d.as_array())
            .ok_or_else(|| ProviderError::ResponseParse {
                message: "No data array in embeddings response".to_string(),
            })?;

        let mut vectors: Vec<Option<Vec<f32>>> = vec![None; expected];
        for (position, item) in data.iter().enumerate() {
            let index = item
                .get("index")
                .and_then(|i| i.as_u64())
                .map(|i| i as usize)
                .unwrap_or(position);
            let embedding = item
                .get("embedding")
                .and_then(|e| e.as_array())
                .ok_or_else(|| ProviderError::ResponseParse {
                    message: format!("Embedding {index} is missing"),
                })?
                .iter()
                .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                .collect();
            match vectors.get_mut(index) {
                Some(slot) => *slot = Some(embedding),
                None => {
                    return Err(ProviderError::ResponseParse {
                        message: format!("Embedding index {index} out of range"),
                    });
                }
            }
        }

        vectors
            .into_iter()
            .enumerate()
            .map(|(i, v)| {
                v.ok_or_else(|| ProviderError::ResponseParse {
                    message: format!("No embedding returned for input {i}"),
                })
            })
            .collect()
    }
}

#[async_trait]
impl EmbeddingModel for OpenAiEmbeddings {
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/embeddings", self.base_url);
        let body = json!({ "model": self.model, "input": inputs });
        let json = post_json(&self.client, "OpenAI embeddings", &url, &self.api_key, &body).await?;
        Self::parse_embeddings(&json, inputs.len())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat() -> OpenAiChatModel {
        OpenAiChatModel::new_with_key(
            &LlmConfig {
                max_tokens: Some(512),
                ..Default::default()
            },
            "sk-test".into(),
        )
    }

    #[test]
    fn test_request_body_has_system_then_user() {
        let body = chat().request_body("Eres un analista", "<question>\nx\n</question>");
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "Eres un analista");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["max_tokens"], 512);
    }

    #[test]
    fn test_parse_completion() {
        let body = json!({
            "choices": [{ "message": { "role": "assistant", "content": "USD 1.234 M" } }]
        });
        assert_eq!(OpenAiChatModel::parse_completion(&body).unwrap(), "USD 1.234 M");
        assert!(OpenAiChatModel::parse_completion(&json!({"choices": []})).is_err());
    }

    #[test]
    fn test_parse_embeddings_orders_by_index() {
        let body = json!({
            "data": [
                { "index": 1, "embedding": [0.0, 1.0] },
                { "index": 0, "embedding": [1.0, 0.0] },
            ]
        });
        let vectors = OpenAiEmbeddings::parse_embeddings(&body, 2).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_parse_embeddings_missing_entry() {
        let body = json!({ "data": [{ "index": 0, "embedding": [1.0] }] });
        assert!(OpenAiEmbeddings::parse_embeddings(&body, 2).is_err());
    }

    #[test]
    fn test_local_endpoint_needs_no_key() {
        let config = LlmConfig {
            base_url: "http://localhost:11434/v1".into(),
            api_key_env: "FINRAG_TEST_UNSET_OPENAI_KEY".into(),
            ..Default::default()
        };
        assert!(OpenAiChatModel::new(&config).is_ok());
    }
}
