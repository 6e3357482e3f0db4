//! OpenAI-compatible chat completion client used as the schema oracle.
//!
//! Defaults target DeepSeek (`deepseek-chat` at `https://api.deepseek.com`).
//! Retries are owned by the inference engine; this client makes exactly one
//! request per call and classifies the failure.

use std::sync::Arc;
use std::time::Duration;

use apiforge_schema::{InferenceConfig, OracleError, SchemaInferenceEngine, SchemaOracle};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::version::APIFORGE_VERSION;

pub const DEFAULT_BASE_URL: &str = "https://api.deepseek.com";
pub const DEFAULT_MODEL: &str = "deepseek-chat";

const SYSTEM_PROMPT: &str = "You are a helpful assistant that infers input and output schemas \
for Python functions. Reply with a single JSON object and nothing else.";

/// Longest error body echoed back in an [`OracleError::Rejected`].
const MAX_ERROR_BODY: usize = 200;

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl LlmConfig {
    /// Read `DEEPSEEK_API_KEY`, `APIFORGE_LLM_BASE_URL`, `APIFORGE_LLM_MODEL`
    /// and `APIFORGE_LLM_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            api_key: non_empty("DEEPSEEK_API_KEY"),
            base_url: non_empty("APIFORGE_LLM_BASE_URL").unwrap_or(defaults.base_url),
            model: non_empty("APIFORGE_LLM_MODEL").unwrap_or(defaults.model),
            timeout: non_empty("APIFORGE_LLM_TIMEOUT_SECS")
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct ChatCompletionClient {
    config: LlmConfig,
    client: reqwest::Client,
}

impl ChatCompletionClient {
    pub fn new(config: LlmConfig) -> Result<Self, OracleError> {
        let client = reqwest::Client::builder()
            .user_agent(format!("apiforge/{APIFORGE_VERSION}"))
            .timeout(config.timeout)
            .build()
            .map_err(|e| OracleError::Unavailable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }
}

fn classify_send_error(e: reqwest::Error, timeout: Duration) -> OracleError {
    if e.is_timeout() {
        OracleError::Timeout(timeout)
    } else {
        OracleError::Transport(e.to_string())
    }
}

fn truncate(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[async_trait]
impl SchemaOracle for ChatCompletionClient {
    async fn infer_schema(&self, prompt: &str) -> Result<String, OracleError> {
        let Some(api_key) = self.config.api_key.as_deref() else {
            return Err(OracleError::Unavailable(
                "DEEPSEEK_API_KEY is not set".to_string(),
            ));
        };

        let request = ChatRequest {
            model: &self.config.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: 0.0,
            stream: false,
        };

        let response = self
            .client
            .post(self.config.completions_url())
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_send_error(e, self.config.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let retryable = status.as_u16() == 429 || status.is_server_error();
            tracing::debug!(status = status.as_u16(), retryable, "chat completion rejected");
            return Err(OracleError::Rejected {
                status: status.as_u16(),
                message: truncate(body.trim()),
                retryable,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| classify_send_error(e, self.config.timeout))?;
        let parsed: ChatResponse =
            serde_json::from_slice(&body).map_err(|e| OracleError::Rejected {
                status: status.as_u16(),
                message: format!("invalid response body: {e}"),
                retryable: false,
            })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(OracleError::EmptyResponse)
    }
}

/// Engine backed by the chat client, or heuristics only when AI is disabled,
/// no key is configured or the client cannot be built.
pub fn inference_engine(config: LlmConfig, use_ai: bool) -> SchemaInferenceEngine {
    if !use_ai {
        return SchemaInferenceEngine::heuristic_only();
    }
    if !config.has_api_key() {
        tracing::warn!("DEEPSEEK_API_KEY is not set, using heuristic schemas only");
        return SchemaInferenceEngine::heuristic_only();
    }

    let inference = InferenceConfig {
        request_timeout: config.timeout,
        ..InferenceConfig::default()
    };
    match ChatCompletionClient::new(config) {
        Ok(client) => {
            tracing::info!(model = %client.config().model, "using LLM schema inference");
            SchemaInferenceEngine::new(Some(Arc::new(client)), inference)
        }
        Err(e) => {
            tracing::warn!(error = %e, "LLM client unavailable, using heuristic schemas only");
            SchemaInferenceEngine::heuristic_only()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer) -> LlmConfig {
        LlmConfig {
            api_key: Some("sk-test".to_string()),
            base_url: server.uri(),
            model: "deepseek-chat".to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    fn completion(content: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "chatcmpl-1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
        })
    }

    #[test]
    fn config_from_lookup() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("DEEPSEEK_API_KEY", "sk-abc"),
            ("APIFORGE_LLM_MODEL", "deepseek-coder"),
            ("APIFORGE_LLM_TIMEOUT_SECS", "7"),
            ("APIFORGE_LLM_BASE_URL", ""),
        ]);
        let config = LlmConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.api_key.as_deref(), Some("sk-abc"));
        assert_eq!(config.model, "deepseek-coder");
        assert_eq!(config.timeout, Duration::from_secs(7));
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn config_defaults() {
        let config = LlmConfig::from_lookup(|_| None);
        assert!(!config.has_api_key());
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(
            config.completions_url(),
            "https://api.deepseek.com/chat/completions"
        );
    }

    #[tokio::test]
    async fn posts_chat_request_and_returns_content() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "deepseek-chat",
                "stream": false,
                "messages": [{"role": "system"}, {"role": "user", "content": "describe f"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("{\"input\": {}}")))
            .expect(1)
            .mount(&server)
            .await;

        let client = ChatCompletionClient::new(config(&server)).unwrap();
        let content = client.infer_schema("describe f").await.unwrap();
        assert_eq!(content, "{\"input\": {}}");
    }

    #[tokio::test]
    async fn undecodable_success_body_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string("<html>proxy</html>"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = ChatCompletionClient::new(config(&server)).unwrap();
        let err = client.infer_schema("p").await.unwrap_err();
        assert!(
            matches!(err, OracleError::Rejected { status: 200, retryable: false, .. }),
            "{err:?}"
        );
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn missing_key_is_unavailable_without_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut cfg = config(&server);
        cfg.api_key = None;
        let err = ChatCompletionClient::new(cfg)
            .unwrap()
            .infer_schema("p")
            .await
            .unwrap_err();
        assert!(matches!(err, OracleError::Unavailable(_)));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn server_errors_and_rate_limits_are_transient() {
        for status in [429u16, 500, 503] {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(status).set_body_string("busy"))
                .mount(&server)
                .await;

            let err = ChatCompletionClient::new(config(&server))
                .unwrap()
                .infer_schema("p")
                .await
                .unwrap_err();
            assert!(
                matches!(err, OracleError::Rejected { status: s, ref message, retryable: true } if s == status && message == "busy"),
                "{err:?}"
            );
            assert!(err.is_transient());
        }
    }

    #[tokio::test]
    async fn client_errors_are_not_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let err = ChatCompletionClient::new(config(&server))
            .unwrap()
            .infer_schema("p")
            .await
            .unwrap_err();
        assert!(matches!(err, OracleError::Rejected { status: 401, retryable: false, .. }));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn empty_choices_and_blank_content_are_empty_responses() {
        for body in [
            serde_json::json!({"choices": []}),
            completion("   "),
            serde_json::json!({"choices": [{"message": {"role": "assistant", "content": null}}]}),
        ] {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(200).set_body_json(body))
                .mount(&server)
                .await;

            let err = ChatCompletionClient::new(config(&server))
                .unwrap()
                .infer_schema("p")
                .await
                .unwrap_err();
            assert!(matches!(err, OracleError::EmptyResponse));
        }
    }

    #[tokio::test]
    async fn slow_server_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(completion("{}"))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let mut cfg = config(&server);
        cfg.timeout = Duration::from_millis(50);
        let err = ChatCompletionClient::new(cfg)
            .unwrap()
            .infer_schema("p")
            .await
            .unwrap_err();
        assert!(matches!(err, OracleError::Timeout(_)));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn unreachable_host_is_transport_error() {
        let cfg = LlmConfig {
            api_key: Some("sk".to_string()),
            base_url: "http://127.0.0.1:1".to_string(),
            ..LlmConfig::default()
        };
        let err = ChatCompletionClient::new(cfg)
            .unwrap()
            .infer_schema("p")
            .await
            .unwrap_err();
        assert!(matches!(err, OracleError::Transport(_)));
    }

    #[test]
    fn engine_selection() {
        let keyed = LlmConfig {
            api_key: Some("sk".to_string()),
            timeout: Duration::from_secs(9),
            ..LlmConfig::default()
        };
        let engine = inference_engine(keyed.clone(), true);
        assert!(engine.has_oracle());
        assert_eq!(engine.config().request_timeout, Duration::from_secs(9));

        assert!(!inference_engine(keyed, false).has_oracle());
        assert!(!inference_engine(LlmConfig::default(), true).has_oracle());
    }

    #[tokio::test]
    async fn engine_uses_chat_completions() {
        use apiforge_schema::inference::InferenceSource;
        use apiforge_schema::types::{FunctionDescriptor, Parameter};

        let server = MockServer::start().await;
        let reply = "```json\n{\"input\": {\"user_id\": \"int\"}, \"output\": {\"name\": \"str\"}}\n```";
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(reply)))
            .expect(1)
            .mount(&server)
            .await;

        let engine = inference_engine(config(&server), true);
        let descriptor = FunctionDescriptor {
            name: "get_name".to_string(),
            parameters: vec![Parameter {
                name: "user_id".to_string(),
                declared_type: None,
                default: None,
            }],
            return_type: None,
            docstring: "Look up a name.".to_string(),
            source_text: "def get_name(user_id):\n    pass\n".to_string(),
            class_name: None,
            line: 1,
        };
        let inferred = engine.infer(&descriptor).await;
        assert_eq!(inferred.source, InferenceSource::Ai);
        assert_eq!(inferred.input[0].name, "user_id");
        assert_eq!(inferred.output[0].name, "name");
    }

    #[test]
    fn long_error_bodies_are_truncated() {
        let body = "x".repeat(500);
        let t = truncate(&body);
        assert_eq!(t.len(), MAX_ERROR_BODY + 3);
        assert!(t.ends_with("..."));
        assert_eq!(truncate("short"), "short");
    }
}
