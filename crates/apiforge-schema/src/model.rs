//! Model synthesis: one Input/Output definition per discovered function.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::inference::{InferenceSource, InferredSchema};
use crate::naming::{IdentifierError, to_field_name};
use crate::schema::object_schema;
use crate::types::{CanonicalType, FieldSpec, FieldValue, FunctionDescriptor};

/// Placeholder result returned by a generated stub: one default per output field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StubBody {
    pub returns: IndexMap<String, FieldValue>,
}

impl StubBody {
    pub fn for_output(output: &[FieldSpec]) -> Self {
        Self {
            returns: output
                .iter()
                .map(|f| (f.name.clone(), f.ty.default_value()))
                .collect(),
        }
    }

    pub fn to_value(&self) -> FieldValue {
        FieldValue::Map(self.returns.clone())
    }
}

/// Persisted schema definition for one function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDefinition {
    pub canonical_name: String,
    pub function_name: String,
    pub source_file: String,
    pub docstring: String,
    pub input_schema: Vec<FieldSpec>,
    pub output_schema: Vec<FieldSpec>,
    pub stub_body: StubBody,
    pub inferred_by: InferenceSource,
}

impl ModelDefinition {
    pub fn input_model_name(&self) -> String {
        format!("{}Input", self.canonical_name)
    }

    pub fn output_model_name(&self) -> String {
        format!("{}Output", self.canonical_name)
    }

    pub fn input_json_schema(&self) -> Value {
        object_schema(&self.input_model_name(), &self.input_schema)
    }

    pub fn output_json_schema(&self) -> Value {
        object_schema(&self.output_model_name(), &self.output_schema)
    }

    /// Self-contained Python module with pydantic Input/Output classes and the stub function.
    pub fn render_python(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "\"\"\"\nAuto-generated Pydantic model for {}\n\"\"\"\n",
            self.canonical_name
        ));
        out.push_str("from typing import Any, Dict, List, Optional\n\n");
        out.push_str("from pydantic import BaseModel\n\n\n");

        render_class(&mut out, &self.input_model_name(), &self.input_schema);
        out.push_str("\n\n");
        render_class(&mut out, &self.output_model_name(), &self.output_schema);
        out.push_str("\n\n");

        let args: Vec<&str> = self.input_schema.iter().map(|f| f.name.as_str()).collect();
        out.push_str(&format!(
            "def {}({}) -> Dict[str, Any]:\n",
            self.function_name,
            args.join(", ")
        ));
        out.push_str(&format!("    \"\"\"{}\"\"\"\n", python_docstring(&self.docstring)));
        out.push_str("    return {\n");
        let entries: Vec<String> = self
            .stub_body
            .returns
            .iter()
            .map(|(k, v)| {
                format!(
                    "        {}: {}",
                    FieldValue::String(k.clone()).to_python_literal(),
                    v.to_python_literal()
                )
            })
            .collect();
        if !entries.is_empty() {
            out.push_str(&entries.join(",\n"));
            out.push('\n');
        }
        out.push_str("    }\n");
        out
    }
}

fn render_class(out: &mut String, name: &str, fields: &[FieldSpec]) {
    out.push_str(&format!("class {name}(BaseModel):\n"));
    if fields.is_empty() {
        out.push_str("    pass\n");
        return;
    }
    for field in fields {
        let annotation = field.ty.python_type();
        match (&field.default, field.ty.is_optional()) {
            (Some(default), _) => out.push_str(&format!(
                "    {}: {annotation} = {}\n",
                field.name,
                default.to_python_literal()
            )),
            (None, true) => out.push_str(&format!("    {}: {annotation} = None\n", field.name)),
            (None, false) => out.push_str(&format!("    {}: {annotation}\n", field.name)),
        }
    }
}

/// Docstring body safe to embed between triple quotes, indented under a `def`.
fn python_docstring(doc: &str) -> String {
    doc.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .lines()
        .enumerate()
        .map(|(i, line)| {
            if i == 0 || line.is_empty() {
                line.to_string()
            } else {
                format!("    {line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn check_field_names(fields: &[FieldSpec]) -> Result<(), IdentifierError> {
    for field in fields {
        if to_field_name(&field.name)? != field.name {
            return Err(IdentifierError::new(
                &field.name,
                "contains characters outside [A-Za-z0-9_]",
            ));
        }
    }
    Ok(())
}

/// Build the persisted definition for one function.
///
/// An empty output schema becomes a single `result: Optional<Any>` field.
pub fn synthesize(
    descriptor: &FunctionDescriptor,
    source_file: &str,
    canonical_name: String,
    inferred: InferredSchema,
) -> Result<ModelDefinition, IdentifierError> {
    let InferredSchema {
        input,
        mut output,
        source,
    } = inferred;

    if output.is_empty() {
        output.push(FieldSpec::new(
            "result",
            CanonicalType::optional(CanonicalType::Any),
        ));
    }
    check_field_names(&input)?;
    check_field_names(&output)?;

    Ok(ModelDefinition {
        stub_body: StubBody::for_output(&output),
        canonical_name,
        function_name: descriptor.name.clone(),
        source_file: source_file.to_string(),
        docstring: descriptor.docstring.clone(),
        input_schema: input,
        output_schema: output,
        inferred_by: source,
    })
}
