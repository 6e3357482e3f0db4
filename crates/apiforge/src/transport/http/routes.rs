//! HTTP route handlers.

use std::sync::Arc;

use apiforge_schema::types::FieldValue;
use apiforge_schema::{FunctionRegistry, InvocationError};
use axum::{
    Router,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Value, json};

use crate::catalog::Catalog;
use crate::input_validation::{ValidationError, detail_body};
use crate::version::VersionInfo;

pub const WELCOME_MESSAGE: &str = "Welcome to the apiforge microservice!";

/// Shared state behind every handler.
#[derive(Debug)]
pub struct AppState {
    pub catalog: Catalog,
    pub registry: FunctionRegistry,
    pub version: VersionInfo,
}

impl AppState {
    /// State that answers every endpoint with its stub body.
    pub fn with_stubs(catalog: Catalog) -> Self {
        let registry = catalog.stub_registry();
        let mut version = VersionInfo::new();
        if let Some(root) = catalog.root() {
            version = version.with_catalog(root.display().to_string());
        }
        Self {
            catalog,
            registry,
            version,
        }
    }

    pub fn with_registry(mut self, registry: FunctionRegistry) -> Self {
        self.registry = registry;
        self
    }
}

#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    pub status: &'static str,
    pub models: usize,
    pub version: VersionInfo,
}

async fn root() -> Json<Value> {
    Json(json!({ "message": WELCOME_MESSAGE }))
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthCheckResponse> {
    Json(HealthCheckResponse {
        status: "READY",
        models: state.catalog.len(),
        version: state.version.clone(),
    })
}

async fn list_models(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({ "models": state.catalog.model_names() }))
}

async fn get_model(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> (StatusCode, Json<Value>) {
    match state.catalog.model(&name) {
        Some(model) => (
            StatusCode::OK,
            Json(json!({
                "definition": model,
                "route": state.catalog.route_of(&name),
                "input_schema": model.input_json_schema(),
                "output_schema": model.output_json_schema(),
            })),
        ),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("Model {name} not found") })),
        ),
    }
}

async fn openapi_schema(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(state.catalog.openapi().clone())
}

/// Empty bodies count as `{}`; anything else must be JSON.
fn parse_body(body: &Bytes) -> Result<Value, ValidationError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(json!({}));
    }
    serde_json::from_slice(body).map_err(|e| ValidationError {
        field: "__root__".to_string(),
        msg: format!("JSON decode error: {e}"),
        error_type: "value_error.jsondecode".to_string(),
    })
}

async fn invoke_endpoint(
    State(state): State<Arc<AppState>>,
    Path((namespace, segment)): Path<(String, String)>,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let route_path = format!("/{namespace}/{segment}");
    let Some((route, model)) = state.catalog.resolve(&route_path) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "detail": "Not Found" })),
        );
    };

    let input = match parse_body(&body) {
        Ok(input) => input,
        Err(e) => return (StatusCode::UNPROCESSABLE_ENTITY, Json(detail_body(&[e]))),
    };
    if let Err(errors) = route.validator.validate(&input) {
        tracing::debug!(route = %route_path, errors = errors.len(), "rejected invalid input");
        return (StatusCode::UNPROCESSABLE_ENTITY, Json(detail_body(&errors)));
    }

    let fields: IndexMap<String, FieldValue> = input
        .as_object()
        .map(|obj| {
            obj.iter()
                .map(|(k, v)| (k.clone(), FieldValue::from_json(v)))
                .collect()
        })
        .unwrap_or_default();

    match state.registry.invoke(&route.endpoint, model, &fields) {
        Ok(output) => (StatusCode::OK, Json(FieldValue::Map(output).to_json())),
        Err(e @ InvocationError::NotFound { .. }) => {
            tracing::warn!(route = %route_path, error = %e, "no callable for endpoint");
            (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": e.to_string() })),
            )
        }
        Err(e) => {
            tracing::error!(route = %route_path, error = %e, "invocation failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string(), "status": "failed" })),
            )
        }
    }
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/openapi.json", get(openapi_schema))
        .route("/models", get(list_models))
        .route("/models/{name}", get(get_model))
        .route("/{namespace}/{segment}", post(invoke_endpoint))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use apiforge_schema::{Generator, Repository, SchemaInferenceEngine};
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    const SOURCE: &str = r#"
def add(a: int, b: int = 1) -> int:
    """Add two numbers."""
    return a + b

def AdminLoginCheck(email: str, password: str):
    pass
"#;

    async fn state() -> Arc<AppState> {
        let mut repo = Repository::new();
        repo.insert("calc.py", SOURCE);
        let report = Generator::new(SchemaInferenceEngine::heuristic_only())
            .run(&repo)
            .await;
        let catalog = Catalog::from_report(&report).unwrap();
        Arc::new(AppState::with_stubs(catalog))
    }

    async fn response_json(response: axum::response::Response) -> Value {
        let body = response.into_body();
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn root_returns_welcome() {
        let app = routes(state().await);
        let response = app
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response_json(response).await["message"], WELCOME_MESSAGE);
    }

    #[tokio::test]
    async fn health_reports_models_and_version() {
        let app = routes(state().await);
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = response_json(response).await;
        assert_eq!(json["status"], "READY");
        assert_eq!(json["models"], 2);
        assert!(json["version"]["apiforge"].is_string());
    }

    #[tokio::test]
    async fn lists_models() {
        let app = routes(state().await);
        let response = app
            .oneshot(Request::get("/models").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(
            response_json(response).await,
            json!({"models": ["Add", "AdminLoginCheck"]})
        );
    }

    #[tokio::test]
    async fn get_model_returns_definition_and_schemas() {
        let app = routes(state().await);
        let response = app
            .oneshot(Request::get("/models/Add").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = response_json(response).await;
        assert_eq!(json["definition"]["function_name"], "add");
        assert_eq!(json["route"], "/Calc/add");
        assert_eq!(json["input_schema"]["title"], "AddInput");
        assert_eq!(json["input_schema"]["required"], json!(["a"]));
        assert_eq!(json["output_schema"]["title"], "AddOutput");
    }

    #[tokio::test]
    async fn unknown_model_is_404() {
        let app = routes(state().await);
        let response = app
            .oneshot(Request::get("/models/Nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response_json(response).await,
            json!({"error": "Model Nope not found"})
        );
    }

    #[tokio::test]
    async fn openapi_lists_generated_paths() {
        let app = routes(state().await);
        let response = app
            .oneshot(Request::get("/openapi.json").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let json = response_json(response).await;
        assert_eq!(json["openapi"], "3.1.0");
        assert!(json["paths"]["/Calc/add"]["post"].is_object());
        assert!(json["paths"]["/Calc/adminlogincheck"]["post"].is_object());
    }

    #[tokio::test]
    async fn stub_endpoint_returns_defaults() {
        let app = routes(state().await);
        let response = app
            .oneshot(post_json(
                "/Calc/adminlogincheck",
                r#"{"email": "a@b.c", "password": "pw"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response_json(response).await,
            json!({"message": "", "user_id": 0, "is_admin": true})
        );
    }

    #[tokio::test]
    async fn registered_callable_receives_positional_arguments() {
        let mut registry = FunctionRegistry::new();
        registry.register("calc.py", "add", |args| match (&args[0], &args[1]) {
            (FieldValue::Int(a), FieldValue::Int(b)) => Ok(FieldValue::Int(a + b)),
            other => Err(format!("bad arguments {other:?}")),
        });
        let state = Arc::try_unwrap(state().await).unwrap().with_registry(registry);
        let app = routes(Arc::new(state));

        let response = app
            .clone()
            .oneshot(post_json("/Calc/add", r#"{"a": 2}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response_json(response).await, json!({"result": 3}));

        // login has no registered callable
        let response = app
            .oneshot(post_json(
                "/Calc/adminlogincheck",
                r#"{"email": "a", "password": "b"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response_json(response).await["error"],
            "no callable registered for AdminLoginCheck in calc.py"
        );
    }

    #[tokio::test]
    async fn failing_callable_is_500() {
        let mut registry = FunctionRegistry::new();
        registry.register("calc.py", "add", |_| Err("boom".to_string()));
        let state = Arc::try_unwrap(state().await).unwrap().with_registry(registry);
        let response = routes(Arc::new(state))
            .oneshot(post_json("/Calc/add", r#"{"a": 1}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = response_json(response).await;
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error"], "add failed: boom");
    }

    #[tokio::test]
    async fn invalid_input_is_422_with_detail() {
        let app = routes(state().await);
        let response = app
            .oneshot(post_json("/Calc/adminlogincheck", r#"{"email": "a", "otp": 1}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let json = response_json(response).await;
        let detail = json["detail"].as_array().unwrap();
        assert_eq!(detail.len(), 2);
        assert!(detail.contains(&json!({
            "loc": ["body", "password"],
            "msg": "Field required",
            "type": "value_error.missing"
        })));
        assert!(detail.contains(&json!({
            "loc": ["body", "otp"],
            "msg": "Unexpected field 'otp'",
            "type": "value_error.extra"
        })));
    }

    #[tokio::test]
    async fn malformed_json_is_422() {
        let app = routes(state().await);
        let response = app
            .oneshot(post_json("/Calc/add", "{not json"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json = response_json(response).await;
        assert_eq!(json["detail"][0]["type"], "value_error.jsondecode");
    }

    #[tokio::test]
    async fn empty_body_counts_as_empty_object() {
        let app = routes(state().await);
        let response = app
            .oneshot(Request::post("/Calc/add").body(Body::empty()).unwrap())
            .await
            .unwrap();
        // `a` is required
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let app = routes(state().await);
        let response = app
            .oneshot(post_json("/Calc/subtract", "{}"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
