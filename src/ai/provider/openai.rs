//! OpenAI-compatible Provider
//!
//! Speaks the Chat Completions API, so it also covers local servers and
//! gateways that mimic it (set `llm.api_base`).

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

use super::json::extract_json;
use super::{LlmProvider, LlmResponse, TokenUsage};
use crate::config::LlmConfig;
use crate::types::{DocError, ErrorClassifier, OracleError, Result};

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1/";
const PROVIDER: &str = "openai";

/// OpenAI API Provider with secure API key handling
pub struct OpenAiProvider {
    /// Never exposed in logs or debug output
    api_key: SecretString,
    endpoint: Url,
    model: String,
    temperature: f32,
    max_tokens: usize,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("api_key", &"[REDACTED]")
            .field("endpoint", &self.endpoint.as_str())
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl OpenAiProvider {
    /// Build from config; the key comes from `OPENAI_API_KEY`
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            DocError::config("OpenAI API key not found. Set the OPENAI_API_KEY env var")
        })?;
        Self::with_key(config, SecretString::from(api_key))
    }

    pub fn with_key(config: &LlmConfig, api_key: SecretString) -> Result<Self> {
        let endpoint = Self::endpoint(config.api_base.as_deref())?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DocError::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            endpoint,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            client,
        })
    }

    /// `<api_base>/chat/completions`, tolerating a missing trailing slash
    fn endpoint(api_base: Option<&str>) -> Result<Url> {
        let mut base = api_base.unwrap_or(DEFAULT_API_BASE).to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        Url::parse(&base)
            .and_then(|url| url.join("chat/completions"))
            .map_err(|e| DocError::config(format!("Invalid llm.api_base '{}': {}", base, e)))
    }

    fn build_request(&self, prompt: &str, schema: &Value) -> ChatCompletionRequest {
        let system_content = if schema.is_null() {
            "You are a code documentation expert. Always respond with valid JSON.".to_string()
        } else {
            let schema_str = serde_json::to_string_pretty(schema).unwrap_or_else(|e| {
                warn!("Failed to pretty-print schema, using compact format: {}", e);
                schema.to_string()
            });
            format!(
                "You are a code documentation expert. Always respond with valid JSON matching this schema:\n\n```json\n{}\n```\n\nRespond ONLY with valid JSON, no explanation.",
                schema_str
            )
        };

        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_content,
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            temperature: self.temperature,
            max_tokens: Some(self.max_tokens),
            response_format: Some(ResponseFormat {
                format_type: "json_object".to_string(),
            }),
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn generate(&self, prompt: &str, schema: &Value) -> Result<LlmResponse> {
        debug!(model = %self.model, prompt_chars = prompt.len(), "Sending request to OpenAI API");

        let start_time = Instant::now();
        let request = self.build_request(prompt, schema);

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                ErrorClassifier::classify(&format!("OpenAI request failed: {}", e), PROVIDER)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ErrorClassifier::classify_http_status(
                status.as_u16(),
                &format!("OpenAI API error ({}): {}", status, body),
                PROVIDER,
            )
            .into());
        }

        let response_body: ChatCompletionResponse = response.json().await.map_err(|e| {
            let mut err =
                OracleError::incomplete(format!("Failed to parse OpenAI response: {}", e));
            err.provider = Some(PROVIDER.to_string());
            err
        })?;

        let usage = response_body
            .usage
            .map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        let content_str = response_body
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .ok_or_else(|| {
                let mut err = OracleError::incomplete("No content in OpenAI response");
                err.provider = Some(PROVIDER.to_string());
                err
            })?;

        let content = extract_json(content_str, PROVIDER)?;
        debug!(
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "Received response from OpenAI"
        );

        Ok(LlmResponse { content, usage })
    }

    fn name(&self) -> &str {
        PROVIDER
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    usage: Option<UsageInfo>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageInfo {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn provider(api_base: Option<&str>) -> OpenAiProvider {
        let config = LlmConfig {
            api_base: api_base.map(String::from),
            ..LlmConfig::default()
        };
        OpenAiProvider::with_key(&config, SecretString::from("sk-test".to_string())).unwrap()
    }

    #[test]
    fn test_endpoint_join() {
        assert_eq!(
            provider(None).endpoint.as_str(),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            provider(Some("http://localhost:8080/v1")).endpoint.as_str(),
            "http://localhost:8080/v1/chat/completions"
        );
    }

    #[test]
    fn test_invalid_base_is_configuration_error() {
        let config = LlmConfig {
            api_base: Some("not a url".to_string()),
            ..LlmConfig::default()
        };
        let err = OpenAiProvider::with_key(&config, SecretString::from("k".to_string()))
            .unwrap_err();
        assert!(matches!(err, DocError::Configuration(_)));
    }

    #[test]
    fn test_debug_redacts_key() {
        let debug = format!("{:?}", provider(None));
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("sk-test"));
    }

    #[test]
    fn test_request_embeds_schema() {
        let schema = json!({"type": "object", "required": ["summary"]});
        let request = provider(None).build_request("hello", &schema);
        assert_eq!(request.messages.len(), 2);
        assert!(request.messages[0].content.contains("\"required\""));
        assert_eq!(request.messages[1].content, "hello");
    }
}
