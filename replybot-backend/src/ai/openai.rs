//! Chat completions client for any OpenAI-compatible endpoint
//! (OpenAI itself, Gemini's compatibility layer, local relays).

use super::types::AiError;
use super::{LanguageModel, Message};
use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry configuration for transient errors
const MAX_RETRIES: u32 = 3;
const BASE_DELAY_MS: u64 = 2000;

#[derive(Clone)]
pub struct OpenAIClient {
    client: Client,
    auth_headers: header::HeaderMap,
    endpoint: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    retry_base_delay: Duration,
}

#[derive(Debug, Serialize)]
struct OpenAICompletionRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAIMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct OpenAICompletionResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

/// Gemini wraps errors in a one-element array, OpenAI in an object
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OpenAIErrorBody {
    Single(OpenAIErrorResponse),
    List(Vec<OpenAIErrorResponse>),
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorResponse {
    error: OpenAIError,
}

#[derive(Debug, Deserialize)]
struct OpenAIError {
    message: String,
}

impl OpenAIClient {
    pub fn new(
        api_key: &str,
        endpoint: &str,
        model: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<Self, String> {
        let mut auth_headers = header::HeaderMap::new();
        auth_headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        // Only add auth header if API key is provided and not empty
        if !api_key.is_empty() {
            let auth_value = header::HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| format!("Invalid API key format: {}", e))?;
            auth_headers.insert(header::AUTHORIZATION, auth_value);
        }

        if model.is_empty() {
            return Err("Model name must not be empty".to_string());
        }

        Ok(Self {
            client: crate::http::shared_client().clone(),
            auth_headers,
            endpoint: endpoint.to_string(),
            model: model.to_string(),
            max_tokens,
            temperature,
            retry_base_delay: Duration::from_millis(BASE_DELAY_MS),
        })
    }

    #[cfg(test)]
    fn with_retry_base_delay(mut self, base_delay: Duration) -> Self {
        self.retry_base_delay = base_delay;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn generate_text(&self, messages: &[Message]) -> Result<String, AiError> {
        let request = OpenAICompletionRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|m| OpenAIMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        log::info!(
            "[AI] Sending request to {} with model {} ({} messages)",
            self.endpoint,
            self.model,
            messages.len()
        );

        let mut last_error = AiError::new("Max retries exceeded");

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let delay = backoff_delay(self.retry_base_delay, attempt);
                log::warn!(
                    "[AI] Retry attempt {}/{} after {}ms delay: {}",
                    attempt,
                    MAX_RETRIES,
                    delay.as_millis(),
                    last_error
                );
                tokio::time::sleep(delay).await;
            }

            match self.send_once(&request).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_transient() && attempt < MAX_RETRIES => last_error = e,
                Err(e) => return Err(e),
            }
        }

        Err(last_error)
    }

    async fn send_once(&self, request: &OpenAICompletionRequest<'_>) -> Result<String, AiError> {
        let response = self
            .client
            .post(&self.endpoint)
            .headers(self.auth_headers.clone())
            .json(request)
            .send()
            .await
            .map_err(|e| AiError::new(format!("AI API request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AiError::new(format!("Failed to read AI response: {}", e)))?;

        if !status.is_success() {
            return Err(AiError::with_status(
                describe_error(status.as_u16(), &body),
                status.as_u16(),
            ));
        }

        log::debug!("[AI] Raw response:\n{}", body);
        // A malformed 200 will not improve on retry
        parse_completion(&body).map_err(|e| AiError::with_status(e.message, status.as_u16()))
    }
}

#[async_trait]
impl LanguageModel for OpenAIClient {
    async fn complete(&self, system_prompt: &str, user_text: &str) -> Result<String, AiError> {
        self.generate_text(&[Message::system(system_prompt), Message::user(user_text)])
            .await
    }
}

/// Exponential backoff before retry `attempt` (1-based): base, 2x base, 4x base
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base * (1 << (attempt.saturating_sub(1)))
}

/// Pull the first choice's text out of a completion body
fn parse_completion(body: &str) -> Result<String, AiError> {
    let response_data: OpenAICompletionResponse = serde_json::from_str(body)
        .map_err(|e| AiError::new(format!("Failed to parse AI response: {} - body: {}", e, body)))?;

    let choice = response_data
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| AiError::new("AI API returned no choices"))?;

    log::info!(
        "[AI] Response - content_len: {}, finish_reason: {:?}",
        choice.message.content.as_ref().map(|c| c.len()).unwrap_or(0),
        choice.finish_reason
    );

    choice
        .message
        .content
        .ok_or_else(|| AiError::new("AI API returned an empty message"))
}

/// Human-readable error for a non-success status, without dumping HTML error pages
fn describe_error(status_code: u16, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<OpenAIErrorBody>(body) {
        let message = match parsed {
            OpenAIErrorBody::Single(e) => Some(e.error.message),
            OpenAIErrorBody::List(list) => list.into_iter().next().map(|e| e.error.message),
        };
        if let Some(message) = message {
            return format!("AI API error: {}", message);
        }
    }

    let trimmed = body.trim_start();
    let is_html = trimmed.starts_with("<!DOCTYPE")
        || trimmed.starts_with("<html")
        || trimmed.starts_with("<HTML");

    if is_html {
        format!("AI API returned error status: {} (HTML error page)", status_code)
    } else if body.chars().count() > 200 {
        format!(
            "AI API returned error status: {}, body: {}...",
            status_code,
            body.chars().take(200).collect::<String>()
        )
    } else {
        format!("AI API returned error status: {}, body: {}", status_code, body)
    }
}
