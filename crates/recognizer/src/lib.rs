//! Client for an OpenAI compatible chat-completions endpoint.
//!
//! [`OpenAiRecognizer`] implements the engine's [`Recognizer`]: it sends the
//! system instruction and the user's message and hands back the content of
//! the first choice untouched. Parsing that content is the engine's job.

use std::time::Duration;

use async_trait::async_trait;
use engine::Recognizer;
use reqwest::{Client, header};
use serde::{Deserialize, Serialize};

mod error;

pub use error::{RecognizerError, RecognizerErrorKind, classify_http_status};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Clone, Debug)]
pub struct OpenAiRecognizer {
    client: Client,
    base_url: String,
    model: String,
}

impl OpenAiRecognizer {
    pub fn builder() -> OpenAiRecognizerBuilder {
        OpenAiRecognizerBuilder::default()
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    /// Sends one completion request and returns the first choice's content.
    pub async fn complete(&self, system_prompt: &str, text: &str) -> Result<String, RecognizerError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: text,
                },
            ],
            temperature: 0.0,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let resp = self.client.post(self.url()).json(&request).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let err = RecognizerError::Status { status, body };
            tracing::warn!(kind = ?err.kind(), "completion request rejected");
            return Err(err);
        }

        let parsed: ChatResponse = resp.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| RecognizerError::Parse("no content in completion".to_string()))
    }
}

#[async_trait]
impl Recognizer for OpenAiRecognizer {
    async fn recognize(
        &self,
        system_prompt: &str,
        text: &str,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        tracing::debug!(model = %self.model, "requesting completion");
        Ok(self.complete(system_prompt, text).await?)
    }
}

/// The builder for `OpenAiRecognizer`
#[derive(Debug, Default)]
pub struct OpenAiRecognizerBuilder {
    api_key: String,
    base_url: Option<String>,
    model: Option<String>,
    timeout: Option<Duration>,
}

impl OpenAiRecognizerBuilder {
    pub fn api_key(mut self, api_key: &str) -> Self {
        self.api_key = api_key.to_string();
        self
    }

    pub fn base_url(mut self, base_url: &str) -> Self {
        self.base_url = Some(base_url.to_string());
        self
    }

    pub fn model(mut self, model: &str) -> Self {
        self.model = Some(model.to_string());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<OpenAiRecognizer, String> {
        if self.api_key.trim().is_empty() {
            return Err("missing recognizer api key".to_string());
        }

        let mut auth = header::HeaderValue::try_from(format!("Bearer {}", self.api_key.trim()))
            .map_err(|err| format!("invalid api key: {err}"))?;
        auth.set_sensitive(true);

        let mut headers = header::HeaderMap::new();
        headers.insert(header::AUTHORIZATION, auth);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()
            .map_err(|err| format!("failed to build http client: {err}"))?;

        Ok(OpenAiRecognizer {
            client,
            base_url: self.base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }
}
