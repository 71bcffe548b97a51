use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::http::{EndpointClient, HttpError};

#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error("LLM call timed out after {0:?}")]
    Timeout(Duration),
    #[error("LLM unavailable: {0}")]
    Unavailable(String),
    #[error("LLM rate limited")]
    RateLimited { retry_after: Option<Duration> },
    #[error("Malformed LLM response: {0}")]
    Malformed(String),
}

pub type LlmResult<T> = Result<T, LlmError>;

impl From<HttpError> for LlmError {
    fn from(e: HttpError) -> Self {
        Self::Unavailable(e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmRequest {
    pub system: String,
    pub prompt: String,
}

/// A text-completion backend returning a JSON document as a string.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, request: &LlmRequest) -> LlmResult<String>;
}

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
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// Any endpoint speaking the `chat/completions` protocol.
pub struct OpenAiCompatibleProvider {
    client: EndpointClient,
    model: String,
    api_key: Option<String>,
    temperature: f32,
}

impl OpenAiCompatibleProvider {
    /// `base_url` is the API root, e.g. `https://api.openai.com/v1`.
    pub fn new(base_url: &str, model: impl Into<String>, timeout: Duration) -> LlmResult<Self> {
        Ok(Self {
            client: EndpointClient::new(base_url, timeout)?,
            model: model.into(),
            api_key: None,
            temperature: 0.0,
        })
    }

    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

fn retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &LlmRequest) -> LlmResult<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            temperature: self.temperature,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let response = self
            .client
            .post_json("chat/completions", &body, self.api_key.as_deref())
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited {
                retry_after: retry_after(response.headers()),
            });
        }
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(LlmError::Unavailable(format!(
                "{status}: {}",
                detail.chars().take(200).collect::<String>()
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Malformed(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::Malformed("no message content".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_request_shape() {
        let body = ChatRequest {
            model: "gpt-4o-mini",
            messages: vec![ChatMessage {
                role: "user",
                content: "hi",
            }],
            temperature: 0.0,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["response_format"]["type"], "json_object");
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn test_chat_response_parse() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"{\"fields\":{}}"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("{\"fields\":{}}"));
    }

    #[test]
    fn test_retry_after_header() {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(reqwest::header::RETRY_AFTER, "7".parse().unwrap());
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(7)));

        headers.insert(
            reqwest::header::RETRY_AFTER,
            "Wed, 21 Oct 2015 07:28:00 GMT".parse().unwrap(),
        );
        assert_eq!(retry_after(&headers), None);
    }

    #[test]
    fn test_provider_rejects_bad_url() {
        assert!(matches!(
            OpenAiCompatibleProvider::new("::", "m", Duration::from_secs(1)),
            Err(LlmError::Unavailable(_))
        ));
    }
}
