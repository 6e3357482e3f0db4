//! JSON Schema and OpenAPI 3.1 generation for a generated catalog.

use serde_json::{Map, Value, json};

use crate::endpoint::EndpointDefinition;
use crate::model::ModelDefinition;
use crate::types::FieldSpec;

pub const OPENAPI_VERSION: &str = "3.1.0";

/// JSON Schema for one Input or Output record.
pub fn object_schema(title: &str, fields: &[FieldSpec]) -> Value {
    let mut properties: Map<String, Value> = Map::new();
    let mut required: Vec<Value> = Vec::new();

    for field in fields {
        let mut prop = field.ty.json_type();
        if let Value::Object(ref mut m) = prop {
            m.insert("title".into(), json!(title_case_words(&field.name)));
            if let Some(default) = &field.default {
                m.insert("default".into(), default.to_json());
            }
        }
        properties.insert(field.name.clone(), prop);
        if field.required {
            required.push(json!(field.name));
        }
    }

    let mut schema = json!({
        "title": title,
        "type": "object",
        "properties": properties,
    });
    if !required.is_empty() {
        schema["required"] = Value::Array(required);
    }
    schema
}

/// Generate the OpenAPI document for every endpoint in the catalog.
///
/// Endpoints whose model is missing are left out.
pub fn generate_openapi(
    title: &str,
    version: &str,
    models: &[ModelDefinition],
    endpoints: &[EndpointDefinition],
) -> Value {
    let mut components: Map<String, Value> = Map::new();
    let mut paths: Map<String, Value> = Map::new();

    paths.insert(
        "/".into(),
        json!({
            "get": {
                "summary": "Root",
                "operationId": "root__get",
                "responses": {
                    "200": {
                        "description": "Successful Response",
                        "content": {"application/json": {"schema": {}}}
                    }
                }
            }
        }),
    );

    for endpoint in endpoints {
        let Some(model) = models
            .iter()
            .find(|m| m.canonical_name == endpoint.canonical_name)
        else {
            continue;
        };

        components.insert(model.input_model_name(), model.input_json_schema());
        components.insert(model.output_model_name(), model.output_json_schema());

        paths.insert(
            endpoint.route_path.clone(),
            json!({
                "post": {
                    "summary": title_case_words(&model.function_name),
                    "description": model.docstring,
                    "operationId": operation_id(&endpoint.route_path),
                    "requestBody": {
                        "required": true,
                        "content": {
                            "application/json": {
                                "schema": {"$ref": endpoint.input_schema_ref}
                            }
                        }
                    },
                    "responses": {
                        "200": {
                            "description": "Successful Response",
                            "content": {"application/json": {"schema": {"$ref": endpoint.output_schema_ref}}}
                        },
                        "422": {
                            "description": "Validation Error",
                            "content": {"application/json": {"schema": {"$ref": "#/components/schemas/HTTPValidationError"}}}
                        }
                    }
                }
            }),
        );
    }

    // Validation error schemas
    components.insert(
        "HTTPValidationError".into(),
        json!({
            "title": "HTTPValidationError",
            "type": "object",
            "properties": {
                "detail": {
                    "title": "Detail",
                    "type": "array",
                    "items": {"$ref": "#/components/schemas/ValidationError"}
                }
            }
        }),
    );

    components.insert(
        "ValidationError".into(),
        json!({
            "title": "ValidationError",
            "required": ["loc", "msg", "type"],
            "type": "object",
            "properties": {
                "loc": {
                    "title": "Location",
                    "type": "array",
                    "items": {"anyOf": [{"type": "string"}, {"type": "integer"}]}
                },
                "msg": {"title": "Message", "type": "string"},
                "type": {"title": "Error Type", "type": "string"}
            }
        }),
    );

    json!({
        "openapi": OPENAPI_VERSION,
        "info": {"title": title, "version": version},
        "paths": paths,
        "components": {
            "schemas": components
        }
    })
}

/// `/ServicesUserApi/get_user` → `services_user_api_get_user_post`
fn operation_id(route: &str) -> String {
    let mut id = String::new();
    for segment in route.split('/').filter(|s| !s.is_empty()) {
        if !id.is_empty() {
            id.push('_');
        }
        id.push_str(&snake_case(segment));
    }
    id.push_str("_post");
    id
}

fn snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for (i, c) in s.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 && !out.ends_with('_') {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Title case a single word/identifier: `user` → `User`
fn title_case_single(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        None => String::new(),
        Some(c) => c.to_uppercase().to_string() + chars.as_str(),
    }
}

/// Title case with underscore splitting: `user_id` → `User Id`
fn title_case_words(s: &str) -> String {
    s.split('_')
        .filter(|w| !w.is_empty())
        .map(title_case_single)
        .collect::<Vec<_>>()
        .join(" ")
}
