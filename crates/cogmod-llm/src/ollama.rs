//! Ollama provider for local models.

use crate::provider::{LlmError, LlmResult, TextProvider};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

const DEFAULT_MODEL: &str = "llama3.1";

pub struct OllamaProvider {
    client: Client,
    host: String,
}

impl OllamaProvider {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            host: host.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait::async_trait]
impl TextProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn default_model(&self) -> &str {
        DEFAULT_MODEL
    }

    async fn generate(&self, prompt: &str, model: Option<&str>) -> LlmResult<String> {
        let body = GenerateRequest {
            model: model.unwrap_or(DEFAULT_MODEL),
            prompt,
            stream: false,
            format: "json",
        };

        let url = format!("{}/api/generate", self.host);
        debug!("ollama request: model={} url={}", body.model, url);

        let response = self.client.post(&url).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("ollama error {}: {}", status, error_text);
            return Err(LlmError::RequestFailed(format!("{status}: {error_text}")));
        }

        let parsed: GenerateResponse = response.json().await?;
        if parsed.response.is_empty() {
            return Err(LlmError::InvalidResponse(
                "response carried no text".to_string(),
            ));
        }
        Ok(parsed.response)
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    format: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}
