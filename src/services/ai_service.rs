use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::GradingConfig;
use crate::error::Result;

/// One grading call: a single user message plus sampling settings.
#[derive(Debug, Clone, PartialEq)]
pub struct GradeRequest {
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("rate limited")]
    RateLimited,

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// External model that turns a grading prompt into free text.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GradingOracle: Send + Sync {
    async fn grade(&self, request: &GradeRequest) -> std::result::Result<String, OracleError>;
}

/// OpenAI-compatible chat completions client.
#[derive(Clone)]
pub struct OpenAiGrader {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    timeout: Duration,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

impl OpenAiGrader {
    /// Returns `None` when no API key is configured.
    pub fn from_config(config: &GradingConfig) -> Result<Option<Self>> {
        let Some(api_key) = config.api_key.clone() else {
            return Ok(None);
        };
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Some(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            timeout: config.timeout,
        }))
    }
}

#[async_trait]
impl GradingOracle for OpenAiGrader {
    async fn grade(&self, request: &GradeRequest) -> std::result::Result<String, OracleError> {
        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let res = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OracleError::Timeout(self.timeout.as_secs())
                } else {
                    OracleError::Network(e.to_string())
                }
            })?;

        let status = res.status().as_u16();
        match status {
            401 | 403 => {
                let text = res.text().await.unwrap_or_default();
                return Err(OracleError::Auth(text));
            }
            429 => return Err(OracleError::RateLimited),
            s if s >= 400 => {
                let text = res.text().await.unwrap_or_default();
                return Err(OracleError::Api {
                    status,
                    message: text,
                });
            }
            _ => {}
        }

        let parsed: ChatResponse = res
            .json()
            .await
            .map_err(|e| OracleError::MalformedResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| OracleError::MalformedResponse("no message content".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn grader(server: &MockServer) -> OpenAiGrader {
        let config = GradingConfig {
            api_key: Some("test-key".into()),
            base_url: server.uri(),
            timeout: Duration::from_secs(5),
            ..GradingConfig::default()
        };
        OpenAiGrader::from_config(&config).unwrap().unwrap()
    }

    fn request() -> GradeRequest {
        GradeRequest {
            prompt: "grade this".into(),
            max_tokens: 500,
            temperature: 0.3,
        }
    }

    #[test]
    fn no_key_means_no_grader() {
        let grader = OpenAiGrader::from_config(&GradingConfig::default()).unwrap();
        assert!(grader.is_none());
    }

    #[tokio::test]
    async fn returns_first_choice_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-4o",
                "max_tokens": 500,
                "messages": [{"role": "user", "content": "grade this"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "SCORE: 80\nFEEDBACK: fine"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = grader(&server).grade(&request()).await.unwrap();
        assert_eq!(text, "SCORE: 80\nFEEDBACK: fine");
    }

    #[tokio::test]
    async fn unauthorized_maps_to_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let err = grader(&server).grade(&request()).await.unwrap_err();
        assert!(matches!(err, OracleError::Auth(ref m) if m == "bad key"));
    }

    #[tokio::test]
    async fn too_many_requests_maps_to_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let err = grader(&server).grade(&request()).await.unwrap_err();
        assert!(matches!(err, OracleError::RateLimited));
    }

    #[tokio::test]
    async fn server_error_keeps_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let err = grader(&server).grade(&request()).await.unwrap_err();
        assert!(matches!(err, OracleError::Api { status: 503, .. }));
    }

    #[tokio::test]
    async fn empty_choices_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [] })),
            )
            .mount(&server)
            .await;

        let err = grader(&server).grade(&request()).await.unwrap_err();
        assert!(matches!(err, OracleError::MalformedResponse(_)));
    }
}
