use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::prompt::{self, CoachRole};
use super::CompletionSource;
use crate::error::{Result, TaskTalkError};
use crate::state::{CompletionResult, Prompt};

pub const MODEL_GEMINI_PRO: &str = "gemini-pro";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

const TEMPERATURE: f32 = 0.9;
const TOP_K: u32 = 1;
const TOP_P: f32 = 1.0;
const MAX_OUTPUT_TOKENS: u32 = 2048;

const SAFETY_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];
const SAFETY_THRESHOLD: &str = "BLOCK_MEDIUM_AND_ABOVE";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    safety_settings: Vec<SafetySetting>,
}

#[derive(Serialize, Deserialize, Debug)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize, Debug)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_k: u32,
    top_p: f32,
    max_output_tokens: u32,
}

#[derive(Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "promptFeedback")]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
struct PromptFeedback {
    #[serde(rename = "blockReason")]
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

fn user_content(parts: Vec<String>) -> Content {
    Content {
        role: Some(CoachRole::User.as_str().to_string()),
        parts: parts.into_iter().map(|t| Part { text: Some(t) }).collect(),
    }
}

fn build_contents(prompt: &Prompt) -> Vec<Content> {
    match prompt {
        Prompt::Freeform(text) => {
            let mut contents: Vec<Content> = prompt::chat_history()
                .into_iter()
                .map(|turn| Content {
                    role: Some(turn.role.as_str().to_string()),
                    parts: vec![Part { text: Some(turn.text) }],
                })
                .collect();
            contents.push(user_content(vec![text.clone()]));
            contents
        }
        Prompt::Structured(text) => vec![user_content(prompt::structured_parts(text))],
    }
}

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Send one generateContent request and return the first candidate's first part.
    pub async fn generate(&self, prompt: &Prompt) -> Result<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        let request = GenerateContentRequest {
            contents: build_contents(prompt),
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
                top_k: TOP_K,
                top_p: TOP_P,
                max_output_tokens: MAX_OUTPUT_TOKENS,
            },
            safety_settings: SAFETY_CATEGORIES
                .iter()
                .map(|&category| SafetySetting {
                    category,
                    threshold: SAFETY_THRESHOLD,
                })
                .collect(),
        };

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(TaskTalkError::Completion(format!("Gemini API error {status}: {detail}")));
        }

        let reply: GenerateContentResponse = response.json().await?;
        debug!(candidates = reply.candidates.len(), "gemini response");

        if let Some(reason) = reply.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(TaskTalkError::Completion(format!("prompt blocked: {reason}")));
        }

        let text = reply
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .ok_or_else(|| TaskTalkError::Completion("response had no text candidate".to_string()))?;
        Ok(text)
    }
}

#[async_trait]
impl CompletionSource for GeminiClient {
    async fn complete(&self, prompt: &Prompt) -> CompletionResult {
        match self.generate(prompt).await {
            Ok(text) => CompletionResult::Success(text),
            Err(e) => {
                warn!(error = %e, "gemini completion failed");
                CompletionResult::Failure(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freeform_prompt_appends_user_turn_after_history() {
        let contents = build_contents(&Prompt::Freeform("Is it raining?".into()));
        assert_eq!(contents.len(), 5);
        let last = contents.last().unwrap();
        assert_eq!(last.role.as_deref(), Some("user"));
        assert_eq!(last.parts[0].text.as_deref(), Some("Is it raining?"));
        assert_eq!(contents[1].role.as_deref(), Some("model"));
    }

    #[test]
    fn structured_prompt_is_one_block() {
        let contents = build_contents(&Prompt::Structured("I goed home".into()));
        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0].parts.len(), 7);
    }

    #[test]
    fn request_serializes_camel_case_settings() {
        let request = GenerateContentRequest {
            contents: vec![],
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
                top_k: TOP_K,
                top_p: TOP_P,
                max_output_tokens: MAX_OUTPUT_TOKENS,
            },
            safety_settings: vec![SafetySetting {
                category: SAFETY_CATEGORIES[0],
                threshold: SAFETY_THRESHOLD,
            }],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 2048);
        assert_eq!(json["generationConfig"]["topK"], 1);
        assert_eq!(json["safetySettings"][0]["threshold"], "BLOCK_MEDIUM_AND_ABOVE");
    }
}
