//! Endpoint synthesis: route and invocation contract for each model.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::ModelDefinition;
use crate::naming::{IdentifierError, NameAllocator, file_namespace, to_route_path_segment};

/// How a dispatcher binds validated input to the target callable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationContract {
    /// Input field names in positional order.
    pub arguments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointDefinition {
    pub route_path: String,
    pub input_schema_ref: String,
    pub output_schema_ref: String,
    pub function_name: String,
    pub source_file: String,
    pub canonical_name: String,
    pub invocation: InvocationContract,
}

#[derive(Debug, Default)]
pub struct EndpointBatch {
    /// Sorted by route.
    pub endpoints: Vec<EndpointDefinition>,
    /// Models whose route could not be derived, by canonical name.
    pub rejected: Vec<(String, IdentifierError)>,
}

fn schema_ref(name: &str) -> String {
    format!("#/components/schemas/{name}")
}

/// Derive one endpoint per model.
///
/// Routes are `/{file_namespace}/{function_segment}`. Namespaces and segments
/// are claimed in model order, so files or functions that normalize alike
/// still get distinct routes.
pub fn synthesize_endpoints(models: &[ModelDefinition]) -> EndpointBatch {
    let mut batch = EndpointBatch::default();
    let mut namespaces = NameAllocator::new();
    let mut file_namespaces: HashMap<&str, String> = HashMap::new();
    let mut segments: HashMap<String, NameAllocator> = HashMap::new();

    for model in models {
        let namespace = match file_namespaces.get(model.source_file.as_str()) {
            Some(ns) => ns.clone(),
            None => match file_namespace(&model.source_file) {
                Ok(base) => {
                    let ns = namespaces.claim(&base);
                    file_namespaces.insert(&model.source_file, ns.clone());
                    ns
                }
                Err(e) => {
                    batch.rejected.push((model.canonical_name.clone(), e));
                    continue;
                }
            },
        };

        let segment = match to_route_path_segment(&model.function_name) {
            Ok(base) => segments
                .entry(namespace.clone())
                .or_insert_with(|| NameAllocator::with_separator("_"))
                .claim(&base),
            Err(e) => {
                batch.rejected.push((model.canonical_name.clone(), e));
                continue;
            }
        };

        batch.endpoints.push(EndpointDefinition {
            route_path: format!("/{namespace}/{segment}"),
            input_schema_ref: schema_ref(&model.input_model_name()),
            output_schema_ref: schema_ref(&model.output_model_name()),
            function_name: model.function_name.clone(),
            source_file: model.source_file.clone(),
            canonical_name: model.canonical_name.clone(),
            invocation: InvocationContract {
                arguments: model.input_schema.iter().map(|f| f.name.clone()).collect(),
            },
        });
    }

    batch
        .endpoints
        .sort_by(|a, b| a.route_path.cmp(&b.route_path));
    batch
}
