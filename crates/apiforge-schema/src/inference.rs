//! Schema inference for discovered functions.
//!
//! The AI path sends a prompt to a [`SchemaOracle`] and validates the reply;
//! any failure on that path falls back to heuristics derived from the declared
//! signature and the function name. [`SchemaInferenceEngine::infer`] never fails.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::naming::is_valid_identifier;
use crate::types::{CanonicalType, FieldSpec, FunctionDescriptor, normalize, normalize_annotation};

/// Parameters that never become Input fields.
const RECEIVER_NAMES: &[&str] = &["self", "cls"];

// ---------------------------------------------------------------------------
// Oracle seam
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error)]
pub enum OracleError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("oracle call timed out after {0:?}")]
    Timeout(Duration),

    #[error("oracle rejected the request with status {status}: {message}")]
    Rejected {
        status: u16,
        message: String,
        retryable: bool,
    },

    #[error("oracle unavailable: {0}")]
    Unavailable(String),

    #[error("oracle returned an empty response")]
    EmptyResponse,
}

impl OracleError {
    /// Failures worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout(_) => true,
            Self::Rejected { retryable, .. } => *retryable,
            Self::Unavailable(_) | Self::EmptyResponse => false,
        }
    }
}

/// Text-completion service that answers a schema prompt.
#[async_trait]
pub trait SchemaOracle: Send + Sync {
    async fn infer_schema(&self, prompt: &str) -> Result<String, OracleError>;
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum InferenceFailure {
    #[error("no schema oracle configured")]
    NoOracle,

    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error("malformed oracle response: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InferenceSource {
    Ai,
    Heuristic,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InferredSchema {
    pub input: Vec<FieldSpec>,
    pub output: Vec<FieldSpec>,
    pub source: InferenceSource,
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct InferenceConfig {
    /// Total oracle attempts per function, first call included.
    pub max_attempts: u32,
    pub backoff_base: Duration,
    /// Characters of function source included in the prompt.
    pub snippet_budget: usize,
    pub request_timeout: Duration,
    pub max_in_flight: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_millis(500),
            snippet_budget: 1000,
            request_timeout: Duration::from_secs(30),
            max_in_flight: std::env::var("APIFORGE_MAX_IN_FLIGHT")
                .ok()
                .and_then(|s| s.parse::<usize>().ok())
                .filter(|n| *n > 0)
                .unwrap_or(4),
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct SchemaInferenceEngine {
    oracle: Option<Arc<dyn SchemaOracle>>,
    config: InferenceConfig,
}

impl SchemaInferenceEngine {
    pub fn new(oracle: Option<Arc<dyn SchemaOracle>>, config: InferenceConfig) -> Self {
        Self { oracle, config }
    }

    /// Engine that only ever uses the heuristic fallback.
    pub fn heuristic_only() -> Self {
        Self::new(None, InferenceConfig::default())
    }

    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    pub fn has_oracle(&self) -> bool {
        self.oracle.is_some()
    }

    pub async fn infer(&self, descriptor: &FunctionDescriptor) -> InferredSchema {
        match self.infer_with_oracle(descriptor).await {
            Ok((input, output)) => {
                tracing::debug!(function = %descriptor.name, "schema inferred by oracle");
                InferredSchema {
                    input,
                    output,
                    source: InferenceSource::Ai,
                }
            }
            Err(InferenceFailure::NoOracle) => fallback_schema(descriptor),
            Err(e) => {
                tracing::warn!(
                    function = %descriptor.name,
                    error = %e,
                    "schema inference failed, using heuristics"
                );
                fallback_schema(descriptor)
            }
        }
    }

    /// Infer every descriptor with at most `max_in_flight` oracle calls
    /// outstanding. Results keep the input order.
    pub async fn infer_all(&self, descriptors: &[FunctionDescriptor]) -> Vec<InferredSchema> {
        stream::iter(descriptors)
            .map(|d| self.infer(d))
            .buffered(self.config.max_in_flight.max(1))
            .collect()
            .await
    }

    async fn infer_with_oracle(
        &self,
        descriptor: &FunctionDescriptor,
    ) -> Result<(Vec<FieldSpec>, Vec<FieldSpec>), InferenceFailure> {
        let oracle = self.oracle.as_ref().ok_or(InferenceFailure::NoOracle)?;
        let prompt = build_prompt(descriptor, self.config.snippet_budget);
        let raw = self
            .call_with_retry(oracle.as_ref(), &prompt, &descriptor.name)
            .await?;
        let (ai_input, output) = parse_response(&raw)?;
        Ok((align_input(descriptor, ai_input), output))
    }

    async fn call_with_retry(
        &self,
        oracle: &dyn SchemaOracle,
        prompt: &str,
        function: &str,
    ) -> Result<String, OracleError> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let result =
                match tokio::time::timeout(self.config.request_timeout, oracle.infer_schema(prompt))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(OracleError::Timeout(self.config.request_timeout)),
                };

            match result {
                Ok(text) => return Ok(text),
                Err(e) if e.is_transient() && attempt < self.config.max_attempts => {
                    let backoff = self.config.backoff_base * (1u32 << (attempt - 1).min(10));
                    tracing::warn!(
                        function,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "oracle call failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Prompt and response
// ---------------------------------------------------------------------------

/// First `budget` characters of `s`, cut on a char boundary.
fn truncate_chars(s: &str, budget: usize) -> &str {
    match s.char_indices().nth(budget) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

pub fn build_prompt(descriptor: &FunctionDescriptor, snippet_budget: usize) -> String {
    let params: Vec<String> = descriptor
        .parameters
        .iter()
        .map(|p| match &p.declared_type {
            Some(ty) => format!("{}: {ty}", p.name),
            None => p.name.clone(),
        })
        .collect();
    let returns = descriptor
        .return_type
        .as_ref()
        .map(|t| t.to_string())
        .unwrap_or_else(|| "unspecified".to_string());

    format!(
        r#"Infer request and response schemas for the following Python function.

Function name: {name}
Parameters: {params}
Declared return type: {returns}

Docstring:
"""
{docstring}
"""

Source:
"""
{source}
"""

Reply with a single JSON object and nothing else, shaped as
{{"input": {{"<field>": "<type>"}}, "output": {{"<field>": "<type>"}}}}
where each <type> is one of: string, integer, number, boolean, object, array,
null, List[<type>], Dict[str, <type>], Optional[<type>], Any."#,
        name = descriptor.name,
        params = params.join(", "),
        docstring = descriptor.docstring,
        source = truncate_chars(&descriptor.source_text, snippet_budget),
    )
}

/// JSON payload of an oracle reply, with any Markdown code fence removed.
pub fn extract_json(response: &str) -> &str {
    let trimmed = response.trim();

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        // Skip the language tag line (```json)
        let body = match after.find('\n') {
            Some(nl) if !after[..nl].contains('{') => &after[nl + 1..],
            _ => after,
        };
        if let Some(end) = body.find("```") {
            return body[..end].trim();
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && start < end
    {
        return &trimmed[start..=end];
    }
    trimmed
}

#[derive(Deserialize)]
struct OracleSchema {
    input: IndexMap<String, String>,
    output: IndexMap<String, String>,
}

/// Validate an oracle reply into Input and Output fields.
pub fn parse_response(
    response: &str,
) -> Result<(Vec<FieldSpec>, Vec<FieldSpec>), InferenceFailure> {
    let schema: OracleSchema = serde_json::from_str(extract_json(response))
        .map_err(|e| InferenceFailure::Malformed(e.to_string()))?;
    Ok((to_fields(schema.input)?, to_fields(schema.output)?))
}

fn to_fields(raw: IndexMap<String, String>) -> Result<Vec<FieldSpec>, InferenceFailure> {
    let mut fields = Vec::with_capacity(raw.len());
    for (name, token) in raw {
        if RECEIVER_NAMES.contains(&name.as_str()) {
            continue;
        }
        if !is_valid_identifier(&name) {
            return Err(InferenceFailure::Malformed(format!(
                "field name '{name}' is not a valid identifier"
            )));
        }
        fields.push(FieldSpec::new(name, normalize(Some(&token))));
    }
    Ok(fields)
}

// ---------------------------------------------------------------------------
// Heuristic fallback
// ---------------------------------------------------------------------------

/// Schema derived from the declared signature and the function name alone.
pub fn fallback_schema(descriptor: &FunctionDescriptor) -> InferredSchema {
    InferredSchema {
        input: fallback_input(descriptor),
        output: fallback_output(descriptor),
        source: InferenceSource::Heuristic,
    }
}

/// Declared parameters stay authoritative for names and order; the oracle
/// only refines their types. Fields it invents are dropped.
fn align_input(descriptor: &FunctionDescriptor, ai_input: Vec<FieldSpec>) -> Vec<FieldSpec> {
    let mut ai_types: IndexMap<String, CanonicalType> =
        ai_input.into_iter().map(|f| (f.name, f.ty)).collect();
    fallback_input(descriptor)
        .into_iter()
        .map(|declared| match ai_types.swap_remove(&declared.name) {
            Some(ty) => {
                let field = FieldSpec::new(declared.name, ty);
                match declared.default {
                    Some(default) => field.with_default(default),
                    None => field,
                }
            }
            None => declared,
        })
        .collect()
}

fn fallback_input(descriptor: &FunctionDescriptor) -> Vec<FieldSpec> {
    descriptor
        .parameters
        .iter()
        .filter(|p| !RECEIVER_NAMES.contains(&p.name.as_str()))
        .map(|p| {
            let ty = p
                .declared_type
                .as_ref()
                .map(normalize_annotation)
                .unwrap_or(CanonicalType::Any);
            let field = FieldSpec::new(p.name.clone(), ty);
            match &p.default {
                Some(default) => field.with_default(default.clone()),
                None => field,
            }
        })
        .collect()
}

/// Output fields by name, first matching rule wins.
fn fallback_output(descriptor: &FunctionDescriptor) -> Vec<FieldSpec> {
    let name = descriptor.name.to_ascii_lowercase();
    if name.contains("login") {
        vec![
            FieldSpec::new("message", CanonicalType::STRING),
            FieldSpec::new("user_id", CanonicalType::INT),
            FieldSpec::new("is_admin", CanonicalType::BOOL),
        ]
    } else if name.contains("user") {
        vec![
            FieldSpec::new(
                "users",
                CanonicalType::list(CanonicalType::map(CanonicalType::Any)),
            ),
            FieldSpec::new("count", CanonicalType::INT),
            FieldSpec::new("success", CanonicalType::BOOL),
        ]
    } else if name.contains("activa") || name.contains("update") {
        vec![
            FieldSpec::new("success", CanonicalType::BOOL),
            FieldSpec::new("message", CanonicalType::STRING),
            FieldSpec::new("updated_count", CanonicalType::INT),
        ]
    } else {
        let ty = descriptor
            .return_type
            .as_ref()
            .map(normalize_annotation)
            .unwrap_or(CanonicalType::Any);
        vec![FieldSpec::new("result", ty)]
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::types::{FieldValue, NO_DOCSTRING, Parameter, TypeAnnotation};

    fn descriptor(name: &str, params: &[(&str, Option<&str>)], ret: Option<&str>) -> FunctionDescriptor {
        FunctionDescriptor {
            name: name.to_string(),
            parameters: params
                .iter()
                .map(|(n, t)| Parameter {
                    name: n.to_string(),
                    declared_type: t.map(|t| TypeAnnotation::Simple(t.to_string())),
                    default: None,
                })
                .collect(),
            return_type: ret.and_then(crate::types::parse_type_token),
            docstring: NO_DOCSTRING.to_string(),
            source_text: format!("def {name}(): pass"),
            class_name: None,
            line: 1,
        }
    }

    fn fast_config() -> InferenceConfig {
        InferenceConfig {
            max_attempts: 3,
            backoff_base: Duration::from_millis(1),
            snippet_budget: 1000,
            request_timeout: Duration::from_secs(5),
            max_in_flight: 4,
        }
    }

    /// Replays canned replies in order; repeats the last one when exhausted.
    struct ScriptedOracle {
        replies: Mutex<VecDeque<Result<String, OracleError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedOracle {
        fn new(replies: Vec<Result<String, OracleError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SchemaOracle for ScriptedOracle {
        async fn infer_schema(&self, _prompt: &str) -> Result<String, OracleError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut replies = self.replies.lock().unwrap();
            if replies.len() > 1 {
                replies.pop_front().unwrap()
            } else {
                replies.front().cloned().unwrap()
            }
        }
    }

    fn engine(oracle: Arc<ScriptedOracle>) -> SchemaInferenceEngine {
        SchemaInferenceEngine::new(Some(oracle), fast_config())
    }

    fn names(fields: &[FieldSpec]) -> Vec<&str> {
        fields.iter().map(|f| f.name.as_str()).collect()
    }

    #[tokio::test]
    async fn fenced_ai_reply_is_normalized() {
        let oracle = ScriptedOracle::new(vec![Ok(
            "Here you go:\n```json\n{\"input\": {\"self\": \"Any\", \"limit\": \"integer\"}, \"output\": {\"users\": \"List[object]\", \"total\": \"number\"}}\n```"
                .to_string(),
        )]);
        let d = descriptor("list_users", &[("self", None), ("limit", Some("int"))], None);
        let schema = engine(oracle.clone()).infer(&d).await;

        assert_eq!(schema.source, InferenceSource::Ai);
        assert_eq!(names(&schema.input), ["limit"]);
        assert_eq!(schema.input[0].ty, CanonicalType::INT);
        assert_eq!(names(&schema.output), ["users", "total"]);
        assert_eq!(
            schema.output[0].ty,
            CanonicalType::list(CanonicalType::map(CanonicalType::Any))
        );
        assert_eq!(schema.output[1].ty, CanonicalType::FLOAT);
        assert_eq!(oracle.calls(), 1);
    }

    #[tokio::test]
    async fn oracle_only_refines_declared_parameter_types() {
        let oracle = ScriptedOracle::new(vec![Ok(
            r#"{"input": {"divisor": "int", "dividend": "float", "extra": "str"}, "output": {"quotient": "float"}}"#
                .to_string(),
        )]);
        let mut d = descriptor("divide", &[("dividend", None), ("divisor", None), ("precision", Some("int"))], None);
        d.parameters[2].default = Some(FieldValue::Int(2));
        let schema = engine(oracle).infer(&d).await;

        assert_eq!(schema.source, InferenceSource::Ai);
        assert_eq!(names(&schema.input), ["dividend", "divisor", "precision"]);
        assert_eq!(schema.input[0].ty, CanonicalType::FLOAT);
        assert_eq!(schema.input[1].ty, CanonicalType::INT);
        assert_eq!(schema.input[2].ty, CanonicalType::INT);
        assert_eq!(schema.input[2].default, Some(FieldValue::Int(2)));
        assert!(!schema.input[2].required);
        assert_eq!(names(&schema.output), ["quotient"]);
    }

    #[tokio::test]
    async fn malformed_reply_falls_back_without_retry() {
        let oracle = ScriptedOracle::new(vec![Ok("not json at all".to_string())]);
        let d = descriptor("AdminLoginCheck", &[("email", Some("str")), ("password", Some("str"))], Some("dict"));
        let schema = engine(oracle.clone()).infer(&d).await;

        assert_eq!(schema.source, InferenceSource::Heuristic);
        assert_eq!(oracle.calls(), 1);
        assert_eq!(names(&schema.input), ["email", "password"]);
        assert_eq!(names(&schema.output), ["message", "user_id", "is_admin"]);
        assert_eq!(
            schema.output.iter().map(|f| f.ty.clone()).collect::<Vec<_>>(),
            vec![CanonicalType::STRING, CanonicalType::INT, CanonicalType::BOOL]
        );
    }

    #[tokio::test]
    async fn invalid_field_name_is_malformed() {
        let oracle = ScriptedOracle::new(vec![Ok(
            r#"{"input": {"user id": "string"}, "output": {"ok": "boolean"}}"#.to_string(),
        )]);
        let d = descriptor("compute", &[], Some("int"));
        let schema = engine(oracle).infer(&d).await;
        assert_eq!(schema.source, InferenceSource::Heuristic);
        assert_eq!(names(&schema.output), ["result"]);
        assert_eq!(schema.output[0].ty, CanonicalType::INT);
    }

    #[tokio::test]
    async fn transient_failure_is_retried() {
        let oracle = ScriptedOracle::new(vec![
            Err(OracleError::Transport("connection reset".into())),
            Ok(r#"{"input": {}, "output": {"ok": "bool"}}"#.to_string()),
        ]);
        let schema = engine(oracle.clone())
            .infer(&descriptor("ping", &[], None))
            .await;
        assert_eq!(schema.source, InferenceSource::Ai);
        assert_eq!(oracle.calls(), 2);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let oracle = ScriptedOracle::new(vec![Err(OracleError::Rejected {
            status: 503,
            message: "busy".into(),
            retryable: true,
        })]);
        let schema = engine(oracle.clone())
            .infer(&descriptor("ping", &[], None))
            .await;
        assert_eq!(schema.source, InferenceSource::Heuristic);
        assert_eq!(oracle.calls(), 3);
    }

    #[tokio::test]
    async fn permanent_rejection_is_not_retried() {
        let oracle = ScriptedOracle::new(vec![Err(OracleError::Rejected {
            status: 401,
            message: "bad key".into(),
            retryable: false,
        })]);
        engine(oracle.clone())
            .infer(&descriptor("ping", &[], None))
            .await;
        assert_eq!(oracle.calls(), 1);
    }

    struct SlowOracle;

    #[async_trait]
    impl SchemaOracle for SlowOracle {
        async fn infer_schema(&self, _prompt: &str) -> Result<String, OracleError> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok("{}".into())
        }
    }

    #[tokio::test]
    async fn slow_oracle_times_out() {
        let config = InferenceConfig {
            request_timeout: Duration::from_millis(20),
            ..fast_config()
        };
        let engine = SchemaInferenceEngine::new(Some(Arc::new(SlowOracle)), config);
        let schema = engine
            .infer(&descriptor("report", &[], Some("List[str]")))
            .await;
        assert_eq!(schema.source, InferenceSource::Heuristic);
        assert_eq!(schema.output[0].ty, CanonicalType::list(CanonicalType::STRING));
    }

    #[tokio::test]
    async fn heuristic_only_uses_declared_types_and_defaults() {
        let mut d = descriptor("tags", &[("self", None), ("text", Some("str")), ("limit", Some("int"))], Some("List[str]"));
        d.parameters[2].default = Some(FieldValue::Int(5));
        let schema = SchemaInferenceEngine::heuristic_only().infer(&d).await;

        assert_eq!(schema.source, InferenceSource::Heuristic);
        assert_eq!(names(&schema.input), ["text", "limit"]);
        assert!(schema.input[0].required);
        assert!(!schema.input[1].required);
        assert_eq!(schema.input[1].default, Some(FieldValue::Int(5)));
        assert_eq!(names(&schema.output), ["result"]);
        assert_eq!(schema.output[0].ty, CanonicalType::list(CanonicalType::STRING));
    }

    #[test]
    fn heuristic_precedence() {
        let out = |name: &str| fallback_output(&descriptor(name, &[], None));
        assert_eq!(names(&out("user_login")), ["message", "user_id", "is_admin"]);
        assert_eq!(names(&out("update_user")), ["users", "count", "success"]);
        assert_eq!(names(&out("AdminActivaUsers")), ["users", "count", "success"]);
        assert_eq!(names(&out("activate_account")), ["success", "message", "updated_count"]);
        assert_eq!(names(&out("bulk_update")), ["success", "message", "updated_count"]);
        assert_eq!(names(&out("wordcloud")), ["result"]);
        assert_eq!(out("wordcloud")[0].ty, CanonicalType::Any);
    }

    /// Tracks the peak number of concurrent calls and answers with the prompt's function name.
    struct CountingOracle {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl SchemaOracle for CountingOracle {
        async fn infer_schema(&self, prompt: &str) -> Result<String, OracleError> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            let name = prompt
                .lines()
                .find_map(|l| l.strip_prefix("Function name: "))
                .unwrap_or("unknown");
            Ok(format!(r#"{{"input": {{}}, "output": {{"{name}": "string"}}}}"#))
        }
    }

    #[tokio::test]
    async fn infer_all_preserves_order_and_bounds_concurrency() {
        let oracle = Arc::new(CountingOracle {
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let config = InferenceConfig {
            max_in_flight: 2,
            ..fast_config()
        };
        let engine = SchemaInferenceEngine::new(Some(oracle.clone()), config);
        let descriptors: Vec<FunctionDescriptor> = (0..6)
            .map(|i| descriptor(&format!("fn_{i}"), &[], None))
            .collect();

        let results = engine.infer_all(&descriptors).await;
        let outputs: Vec<&str> = results.iter().map(|r| r.output[0].name.as_str()).collect();
        assert_eq!(outputs, ["fn_0", "fn_1", "fn_2", "fn_3", "fn_4", "fn_5"]);
        assert!(oracle.peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn prompt_truncates_source_on_char_boundary() {
        let mut d = descriptor("big", &[("x", Some("int"))], Some("str"));
        d.source_text = "é".repeat(1500);
        let prompt = build_prompt(&d, 1000);
        assert!(prompt.contains("Parameters: x: int"));
        assert!(prompt.contains("Declared return type: str"));
        assert_eq!(prompt.matches('é').count(), 1000);
    }

    #[test]
    fn json_extraction() {
        assert_eq!(extract_json("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(extract_json("```{\"a\": 1}```"), "{\"a\": 1}");
        assert_eq!(extract_json("sure! {\"a\": 1} done"), "{\"a\": 1}");
        assert_eq!(extract_json("  {\"a\": 1}  "), "{\"a\": 1}");
    }
}
