//! LLM client abstraction and implementations.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{LlmConfig, LlmProvider};

/// Error type for LLM operations.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Not configured")]
    NotConfigured,
}

/// Token usage statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Request for a completion.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// System prompt (instructions for the model)
    pub system: Option<String>,
    /// User message
    pub prompt: String,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Temperature (0.0 = deterministic, 1.0 = creative)
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            max_tokens: 512,
            temperature: 0.1,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Response from a completion.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// The generated text
    pub text: String,
    /// Token usage
    pub usage: LlmUsage,
    /// Model used
    pub model: String,
}

/// Trait for LLM clients.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Provider name (e.g., "openai", "anthropic", "ollama")
    fn provider(&self) -> &str;

    /// Model name
    fn model(&self) -> &str;

    /// Send a completion request and get a text response.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;
}

/// Build the configured LLM client, or `None` when the LLM is disabled.
pub fn build_llm_client(config: &LlmConfig) -> Result<Option<Arc<dyn LlmClient>>, LlmError> {
    if !config.enabled {
        return Ok(None);
    }

    let timeout = Duration::from_secs(config.timeout_secs as u64);
    let api_key = || config.api_key.clone().ok_or(LlmError::NotConfigured);
    let client: Arc<dyn LlmClient> = match config.provider {
        LlmProvider::OpenAi => Arc::new(
            OpenAiClient::new(api_key()?, &config.model)
                .with_endpoint(Endpoint::configured(OPENAI_BASE, config, timeout)?),
        ),
        LlmProvider::Anthropic => Arc::new(
            AnthropicClient::new(api_key()?, &config.model)
                .with_endpoint(Endpoint::configured(ANTHROPIC_BASE, config, timeout)?),
        ),
        LlmProvider::Ollama => Arc::new(
            OllamaClient::new(&config.model)
                .with_endpoint(Endpoint::configured(OLLAMA_BASE, config, timeout)?),
        ),
    };

    Ok(Some(client))
}

const OPENAI_BASE: &str = "https://api.openai.com";
const ANTHROPIC_BASE: &str = "https://api.anthropic.com";
const OLLAMA_BASE: &str = "http://localhost:11434";

// ============================================================================
// Shared HTTP plumbing
// ============================================================================

/// Base URL plus HTTP client shared by every provider.
#[derive(Debug, Clone)]
pub struct Endpoint {
    client: reqwest::Client,
    base: String,
    timeout: Option<Duration>,
}

impl Endpoint {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base: base.into().trim_end_matches('/').to_string(),
            timeout: None,
        }
    }

    /// Endpoint from config: `api_base` overrides `default_base`.
    fn configured(
        default_base: &str,
        config: &LlmConfig,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let base = config.api_base.as_deref().unwrap_or(default_base);
        Self::new(base).with_timeout(timeout)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, LlmError> {
        self.client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Http(e.to_string()))?;
        self.timeout = Some(timeout);
        Ok(self)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// POST `body` and decode a 200 answer; anything else becomes `LlmError::Api`.
    async fn post<Req, Resp>(
        &self,
        request: reqwest::RequestBuilder,
        body: &Req,
    ) -> Result<Resp, LlmError>
    where
        Req: Serialize + ?Sized,
        Resp: for<'de> Deserialize<'de>,
    {
        let response = request.json(body).send().await.map_err(|e| match self.timeout {
            Some(t) if e.is_timeout() => LlmError::Timeout(t),
            _ => LlmError::Http(e.to_string()),
        })?;

        let status = response.status().as_u16();
        if status != 200 {
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status,
                message: error_message(&text),
            });
        }

        response
            .json()
            .await
            .map_err(|e| LlmError::Json(e.to_string()))
    }
}

/// Pull a readable message out of a provider error body.
///
/// Understands `{"error": {"message": ..}}` and `{"error": ".."}`; falls back
/// to the raw body.
fn error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.to_string();
    };
    let error = &value["error"];
    error["message"]
        .as_str()
        .or_else(|| error.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string())
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

impl ChatMessage {
    fn user(content: String) -> Self {
        Self {
            role: "user",
            content,
        }
    }
}

// ============================================================================
// OpenAI-compatible chat
// ============================================================================

/// Client for any OpenAI-compatible chat completions endpoint.
pub struct OpenAiClient {
    endpoint: Endpoint,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            endpoint: Endpoint::new(OPENAI_BASE),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = endpoint;
        self
    }

    /// A base that already names the route is used as is.
    fn completions_url(&self) -> String {
        if self.endpoint.base.ends_with("/chat/completions") {
            self.endpoint.base.clone()
        } else {
            self.endpoint.url("/v1/chat/completions")
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    model: String,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn provider(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage::user(request.prompt));

        let body = ChatRequest {
            model: self.model.clone(),
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };
        let http = self
            .endpoint
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key);
        let reply: ChatResponse = self.endpoint.post(http, &body).await?;

        let text = reply
            .choices
            .into_iter()
            .find_map(|c| c.message.content)
            .ok_or_else(|| LlmError::Json("response has no choices".to_string()))?;
        let usage = reply
            .usage
            .map(|u| LlmUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();
        let model = if reply.model.is_empty() {
            self.model.clone()
        } else {
            reply.model
        };

        Ok(CompletionResponse { text, usage, model })
    }
}

// ============================================================================
// Anthropic Messages
// ============================================================================

pub struct AnthropicClient {
    endpoint: Endpoint,
    api_key: String,
    model: String,
}

impl AnthropicClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            endpoint: Endpoint::new(ANTHROPIC_BASE),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = endpoint;
        self
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    model: String,
    usage: LlmUsage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[async_trait]
impl LlmClient for AnthropicClient {
    fn provider(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = MessagesRequest {
            model: self.model.clone(),
            max_tokens: request.max_tokens,
            system: request.system,
            messages: vec![ChatMessage::user(request.prompt)],
            temperature: request.temperature,
        };
        let http = self
            .endpoint
            .client
            .post(self.endpoint.url("/v1/messages"))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01");
        let reply: MessagesResponse = self.endpoint.post(http, &body).await?;

        let text: String = reply
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text)
            .collect();

        Ok(CompletionResponse {
            text,
            usage: reply.usage,
            model: reply.model,
        })
    }
}

// ============================================================================
// Ollama generate
// ============================================================================

/// Client for a local Ollama server. No API key.
pub struct OllamaClient {
    endpoint: Endpoint,
    model: String,
}

impl OllamaClient {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            endpoint: Endpoint::new(OLLAMA_BASE),
            model: model.into(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = endpoint;
        self
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    model: String,
    response: String,
    #[serde(default)]
    eval_count: u32,
    #[serde(default)]
    prompt_eval_count: u32,
}

#[async_trait]
impl LlmClient for OllamaClient {
    fn provider(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = GenerateRequest {
            model: self.model.clone(),
            prompt: request.prompt,
            system: request.system,
            stream: false,
            options: GenerateOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        };
        let http = self.endpoint.client.post(self.endpoint.url("/api/generate"));
        let reply: GenerateResponse = self.endpoint.post(http, &body).await?;

        Ok(CompletionResponse {
            text: reply.response,
            usage: LlmUsage {
                input_tokens: reply.prompt_eval_count,
                output_tokens: reply.eval_count,
            },
            model: reply.model,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_request_builder() {
        let request = CompletionRequest::new("Hello")
            .with_system("You are helpful")
            .with_max_tokens(100)
            .with_temperature(0.5);

        assert_eq!(request.prompt, "Hello");
        assert_eq!(request.system, Some("You are helpful".to_string()));
        assert_eq!(request.max_tokens, 100);
        assert_eq!(request.temperature, 0.5);
    }

    #[test]
    fn test_openai_completions_url() {
        let client = OpenAiClient::new("key", "gpt-4o-mini");
        assert_eq!(
            client.completions_url(),
            "https://api.openai.com/v1/chat/completions"
        );

        let client = OpenAiClient::new("key", "m")
            .with_endpoint(Endpoint::new("http://llm.local:8000/v1/chat/completions/"));
        assert_eq!(
            client.completions_url(),
            "http://llm.local:8000/v1/chat/completions"
        );
    }

    #[test]
    fn test_openai_response_parsing() {
        let json = r#"{"choices":[{"message":{"role":"assistant","content":"<episode>3</episode>"}}],"model":"m"}"#;
        let parsed: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some("<episode>3</episode>")
        );
        assert!(parsed.usage.is_none());
    }

    #[test]
    fn test_error_message_shapes() {
        assert_eq!(
            error_message(r#"{"error":{"message":"bad key","type":"auth"}}"#),
            "bad key"
        );
        assert_eq!(error_message(r#"{"error":"model not found"}"#), "model not found");
        assert_eq!(error_message("upstream down"), "upstream down");
    }

    #[test]
    fn test_anthropic_usage_maps_directly() {
        let json = r#"{"content":[{"type":"text","text":"yes"},{"type":"tool_use"}],"model":"claude","usage":{"input_tokens":12,"output_tokens":1}}"#;
        let parsed: MessagesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.usage.input_tokens, 12);
        assert_eq!(parsed.content.len(), 2);
        assert_eq!(parsed.content[1].text, "");
    }

    #[test]
    fn test_build_client_disabled() {
        let config = LlmConfig::default();
        assert!(build_llm_client(&config).unwrap().is_none());
    }

    #[test]
    fn test_build_client_requires_key_for_openai() {
        let config = LlmConfig {
            enabled: true,
            api_key: None,
            ..LlmConfig::default()
        };
        assert!(matches!(
            build_llm_client(&config),
            Err(LlmError::NotConfigured)
        ));
    }

    #[test]
    fn test_build_ollama_client() {
        let config = LlmConfig {
            enabled: true,
            provider: LlmProvider::Ollama,
            model: "qwen2.5".to_string(),
            api_base: Some("http://gpu-box:11434/".to_string()),
            ..LlmConfig::default()
        };
        let client = build_llm_client(&config).unwrap().unwrap();
        assert_eq!(client.provider(), "ollama");
        assert_eq!(client.model(), "qwen2.5");
    }

    #[test]
    fn test_ollama_request_serialization() {
        let request = GenerateRequest {
            model: "llama3".to_string(),
            prompt: "Hello".to_string(),
            system: Some("Be helpful".to_string()),
            stream: false,
            options: GenerateOptions {
                temperature: 0.5,
                num_predict: 100,
            },
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"model\":\"llama3\""));
        assert!(json.contains("\"stream\":false"));
        assert!(json.contains("\"num_predict\":100"));
    }
}
