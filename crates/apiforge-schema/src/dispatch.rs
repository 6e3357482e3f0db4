//! Registry-based invocation of the functions behind generated endpoints.
//!
//! Callables are registered explicitly under `(source_file, function_name)`
//! during a load phase; dispatch never resolves code by name at call time.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use thiserror::Error;

use crate::endpoint::EndpointDefinition;
use crate::model::ModelDefinition;
use crate::types::{CanonicalType, FieldSpec, FieldValue, PrimitiveType};

/// A registered function: positional arguments in, one loosely typed value out.
pub type Callable = dyn Fn(Vec<FieldValue>) -> Result<FieldValue, String> + Send + Sync;

#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("no callable registered for {function} in {source_file}")]
    NotFound {
        source_file: String,
        function: String,
    },

    #[error("{function} failed: {message}")]
    Failed { function: String, message: String },

    #[error("{function} returned a value that does not match its output schema: {reason}")]
    OutputMismatch { function: String, reason: String },
}

#[derive(Clone, Default)]
pub struct FunctionRegistry {
    callables: HashMap<(String, String), Arc<Callable>>,
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("callables", &self.callables.len())
            .finish()
    }
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry answering every model with its stub body.
    pub fn with_stubs(models: &[ModelDefinition]) -> Self {
        let mut registry = Self::new();
        for model in models {
            let stub = model.stub_body.to_value();
            registry.register(&model.source_file, &model.function_name, move |_| {
                Ok(stub.clone())
            });
        }
        registry
    }

    /// Register `f`, replacing any previous callable under the same key.
    pub fn register<F>(&mut self, source_file: &str, function: &str, f: F)
    where
        F: Fn(Vec<FieldValue>) -> Result<FieldValue, String> + Send + Sync + 'static,
    {
        self.callables
            .insert((source_file.to_string(), function.to_string()), Arc::new(f));
    }

    pub fn get(&self, source_file: &str, function: &str) -> Option<Arc<Callable>> {
        self.callables
            .get(&(source_file.to_string(), function.to_string()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.callables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callables.is_empty()
    }

    /// Bind validated input positionally, call the registered function and
    /// coerce its result to the model's output schema.
    ///
    /// Missing input fields take their default, or null.
    pub fn invoke(
        &self,
        endpoint: &EndpointDefinition,
        model: &ModelDefinition,
        input: &IndexMap<String, FieldValue>,
    ) -> Result<IndexMap<String, FieldValue>, InvocationError> {
        let callable = self
            .get(&endpoint.source_file, &endpoint.function_name)
            .ok_or_else(|| InvocationError::NotFound {
                source_file: endpoint.source_file.clone(),
                function: endpoint.function_name.clone(),
            })?;

        let args: Vec<FieldValue> = endpoint
            .invocation
            .arguments
            .iter()
            .map(|name| {
                input.get(name).cloned().unwrap_or_else(|| {
                    model
                        .input_schema
                        .iter()
                        .find(|f| &f.name == name)
                        .and_then(|f| f.default.clone())
                        .unwrap_or(FieldValue::Null)
                })
            })
            .collect();

        tracing::debug!(
            route = %endpoint.route_path,
            function = %endpoint.function_name,
            args = args.len(),
            "invoking function"
        );

        let result = (*callable)(args).map_err(|message| InvocationError::Failed {
            function: endpoint.function_name.clone(),
            message,
        })?;

        coerce_output(&model.output_schema, result).map_err(|reason| {
            InvocationError::OutputMismatch {
                function: endpoint.function_name.clone(),
                reason,
            }
        })
    }
}

fn accepts_map(ty: &CanonicalType) -> bool {
    match ty {
        CanonicalType::Map(_) | CanonicalType::Any => true,
        CanonicalType::Optional(inner) => accepts_map(inner),
        _ => false,
    }
}

/// Whether `value` is acceptable for a field of type `ty`. Ints widen to floats.
fn conforms(ty: &CanonicalType, value: &FieldValue) -> bool {
    match (ty, value) {
        (CanonicalType::Any, _) => true,
        (CanonicalType::Optional(_), FieldValue::Null) => true,
        (CanonicalType::Optional(inner), v) => conforms(inner, v),
        (CanonicalType::Primitive(PrimitiveType::String), FieldValue::String(_))
        | (CanonicalType::Primitive(PrimitiveType::Int), FieldValue::Int(_))
        | (CanonicalType::Primitive(PrimitiveType::Float), FieldValue::Int(_) | FieldValue::Float(_))
        | (CanonicalType::Primitive(PrimitiveType::Bool), FieldValue::Bool(_)) => true,
        (CanonicalType::List(inner), FieldValue::List(items)) => {
            items.iter().all(|item| conforms(inner, item))
        }
        (CanonicalType::Map(inner), FieldValue::Map(entries)) => {
            entries.values().all(|v| conforms(inner, v))
        }
        _ => false,
    }
}

fn value_kind(value: &FieldValue) -> &'static str {
    match value {
        FieldValue::Null => "null",
        FieldValue::Bool(_) => "bool",
        FieldValue::Int(_) => "int",
        FieldValue::Float(_) => "float",
        FieldValue::String(_) => "string",
        FieldValue::List(_) => "list",
        FieldValue::Map(_) => "object",
    }
}

/// Shape a raw result into the declared output fields.
///
/// An object keeps the declared fields and fills missing ones with stub
/// defaults; any other value is wrapped when exactly one field is declared.
/// Every shaped value must conform to its field's type.
pub fn coerce_output(
    output: &[FieldSpec],
    result: FieldValue,
) -> Result<IndexMap<String, FieldValue>, String> {
    let shaped = match (result, output) {
        // A dict returned for a single dict-typed field is the field's value.
        (FieldValue::Map(map), [single])
            if !map.contains_key(&single.name) && accepts_map(&single.ty) =>
        {
            IndexMap::from([(single.name.clone(), FieldValue::Map(map))])
        }
        (FieldValue::Map(mut map), fields) => fields
            .iter()
            .map(|f| {
                let value = map
                    .shift_remove(&f.name)
                    .unwrap_or_else(|| f.fallback_value());
                (f.name.clone(), value)
            })
            .collect(),
        (value, [single]) => IndexMap::from([(single.name.clone(), value)]),
        (_, fields) => {
            return Err(format!(
                "expected an object with fields {}",
                fields
                    .iter()
                    .map(|f| f.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }
    };

    for field in output {
        if let Some(value) = shaped.get(&field.name)
            && !conforms(&field.ty, value)
        {
            return Err(format!(
                "field {} expected {}, got {}",
                field.name,
                field.ty,
                value_kind(value)
            ));
        }
    }
    Ok(shaped)
}
