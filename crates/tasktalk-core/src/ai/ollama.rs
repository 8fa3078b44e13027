use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::prompt;
use super::CompletionSource;
use crate::error::{Result, TaskTalkError};
use crate::state::{CompletionResult, Prompt};

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    pub async fn query(&self, model: &str, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);

        let request = OllamaRequest {
            model: model.to_string(),
            prompt: prompt.to_string(),
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TaskTalkError::Completion(format!(
                "Ollama request failed with status: {}. Make sure Ollama is running with: ollama serve",
                response.status()
            )));
        }

        let ollama_response: OllamaResponse = response.json().await?;
        Ok(ollama_response.response)
    }
}

#[async_trait]
impl CompletionSource for OllamaClient {
    async fn complete(&self, prompt: &Prompt) -> CompletionResult {
        match self.query(&self.model, &prompt::flatten(prompt)).await {
            Ok(text) => CompletionResult::Success(text.trim().to_string()),
            Err(e) => {
                warn!(error = %e, model = %self.model, "ollama completion failed");
                CompletionResult::Failure(e.to_string())
            }
        }
    }
}
