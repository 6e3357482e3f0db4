//! Type system for generated schemas.
//!
//! Source annotations are parsed into a `TypeAnnotation`, then normalized onto
//! the small canonical vocabulary every generated artifact shares. Loosely
//! typed values (defaults, stub results, dispatch arguments) are `FieldValue`s.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Docstring recorded when a function or class has none.
pub const NO_DOCSTRING: &str = "No docstring provided.";

// ---------------------------------------------------------------------------
// Parsed annotations
// ---------------------------------------------------------------------------

/// Type annotation as written in the source, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeAnnotation {
    /// `str`, `MyModel`, `typing.Any`
    Simple(String),
    /// `Optional[str]`, `Dict[str, int]`, `typing.List[int]`
    Generic(String, Vec<TypeAnnotation>),
    /// `str | None`
    Union(Vec<TypeAnnotation>),
    /// Literal constant used as an annotation: `None`, `42`, `True`
    Constant(String),
    /// Anything else; kept verbatim for the inference prompt.
    Unsupported(String),
}

impl fmt::Display for TypeAnnotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simple(name) | Self::Constant(name) | Self::Unsupported(name) => {
                f.write_str(name)
            }
            Self::Generic(outer, args) => {
                write!(f, "{outer}[")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str("]")
            }
            Self::Union(members) => {
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" | ")?;
                    }
                    write!(f, "{member}")?;
                }
                Ok(())
            }
        }
    }
}

/// Parse a textual type token.
///
/// Handles `str`, `typing.List[int]`, `Dict[str, Any]`, `str | None`, and the
/// angle-bracket spelling `List<String>` used in canonical type names.
pub fn parse_type_token(s: &str) -> Option<TypeAnnotation> {
    let s = s.trim().trim_matches(|c| c == '"' || c == '\'').trim();
    if s.is_empty() {
        return None;
    }

    let members = split_top_level(s, '|');
    if members.len() > 1 {
        let parsed = members
            .into_iter()
            .map(parse_type_token)
            .collect::<Option<Vec<_>>>()?;
        return Some(TypeAnnotation::Union(parsed));
    }

    if let Some(open) = s.find(['[', '<']) {
        let close = if s[open..].starts_with('[') { ']' } else { '>' };
        if !s.ends_with(close) {
            return None;
        }
        let outer = s[..open].trim();
        if outer.is_empty() || !is_dotted_name(outer) {
            return None;
        }
        let inner = &s[open + 1..s.len() - 1];
        let args = split_top_level(inner, ',')
            .into_iter()
            .filter(|a| !a.trim().is_empty())
            .map(parse_type_token)
            .collect::<Option<Vec<_>>>()?;
        if args.is_empty() {
            return Some(TypeAnnotation::Simple(outer.to_string()));
        }
        return Some(TypeAnnotation::Generic(outer.to_string(), args));
    }

    if s == "None" {
        return Some(TypeAnnotation::Constant(s.to_string()));
    }
    if is_dotted_name(s) {
        return Some(TypeAnnotation::Simple(s.to_string()));
    }

    None
}

fn is_dotted_name(s: &str) -> bool {
    !s.is_empty()
        && s.split('.')
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_alphanumeric() || c == '_'))
}

/// Split on `sep` where it is not nested inside brackets.
fn split_top_level(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '[' | '<' | '(' => depth += 1,
            ']' | '>' | ')' => depth -= 1,
            c if c == sep && depth == 0 => {
                parts.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

// ---------------------------------------------------------------------------
// Canonical types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    String,
    Int,
    Float,
    Bool,
}

impl PrimitiveType {
    fn name(self) -> &'static str {
        match self {
            Self::String => "String",
            Self::Int => "Int",
            Self::Float => "Float",
            Self::Bool => "Bool",
        }
    }

    pub fn json_type(self) -> Value {
        match self {
            Self::String => json!({"type": "string"}),
            Self::Int => json!({"type": "integer"}),
            Self::Float => json!({"type": "number"}),
            Self::Bool => json!({"type": "boolean"}),
        }
    }

    fn python_type(self) -> &'static str {
        match self {
            Self::String => "str",
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
        }
    }
}

/// The shared type vocabulary of every generated schema.
///
/// Serialized as its display form (`List<Map<String,Any>>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CanonicalType {
    Primitive(PrimitiveType),
    Optional(Box<CanonicalType>),
    List(Box<CanonicalType>),
    /// Map with string keys.
    Map(Box<CanonicalType>),
    Any,
}

impl CanonicalType {
    pub const STRING: Self = Self::Primitive(PrimitiveType::String);
    pub const INT: Self = Self::Primitive(PrimitiveType::Int);
    pub const FLOAT: Self = Self::Primitive(PrimitiveType::Float);
    pub const BOOL: Self = Self::Primitive(PrimitiveType::Bool);

    /// `Optional<T>`; never nests.
    pub fn optional(inner: CanonicalType) -> Self {
        match inner {
            Self::Optional(_) => inner,
            other => Self::Optional(Box::new(other)),
        }
    }

    pub fn list(inner: CanonicalType) -> Self {
        Self::List(Box::new(inner))
    }

    pub fn map(value: CanonicalType) -> Self {
        Self::Map(Box::new(value))
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, Self::Optional(_))
    }

    /// JSON Schema fragment used for request validation and the OpenAPI document.
    pub fn json_type(&self) -> Value {
        match self {
            Self::Primitive(p) => p.json_type(),
            Self::List(inner) => json!({"type": "array", "items": inner.json_type()}),
            Self::Map(inner) => json!({"type": "object", "additionalProperties": inner.json_type()}),
            Self::Optional(inner) => match inner.as_ref() {
                Self::Any => json!({}),
                other => json!({"anyOf": [other.json_type(), {"type": "null"}]}),
            },
            Self::Any => json!({}),
        }
    }

    /// Annotation used in rendered Python artifacts.
    pub fn python_type(&self) -> String {
        match self {
            Self::Primitive(p) => p.python_type().to_string(),
            Self::List(inner) => format!("List[{}]", inner.python_type()),
            Self::Map(inner) => format!("Dict[str, {}]", inner.python_type()),
            Self::Optional(inner) => format!("Optional[{}]", inner.python_type()),
            Self::Any => "Any".to_string(),
        }
    }

    /// Placeholder value a stub body returns for a field of this type.
    pub fn default_value(&self) -> FieldValue {
        match self {
            Self::Primitive(PrimitiveType::String) => FieldValue::String(String::new()),
            Self::Primitive(PrimitiveType::Int) => FieldValue::Int(0),
            Self::Primitive(PrimitiveType::Float) => FieldValue::Float(0.0),
            Self::Primitive(PrimitiveType::Bool) => FieldValue::Bool(true),
            Self::List(_) => FieldValue::List(Vec::new()),
            Self::Map(_) => FieldValue::Map(IndexMap::new()),
            Self::Optional(_) | Self::Any => FieldValue::Null,
        }
    }
}

impl fmt::Display for CanonicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(p) => f.write_str(p.name()),
            Self::Optional(inner) => write!(f, "Optional<{inner}>"),
            Self::List(inner) => write!(f, "List<{inner}>"),
            Self::Map(inner) => write!(f, "Map<String,{inner}>"),
            Self::Any => f.write_str("Any"),
        }
    }
}

impl From<String> for CanonicalType {
    fn from(s: String) -> Self {
        normalize(Some(&s))
    }
}

impl From<CanonicalType> for String {
    fn from(t: CanonicalType) -> Self {
        t.to_string()
    }
}

// ---------------------------------------------------------------------------
// Type normalizer
// ---------------------------------------------------------------------------

/// Map a raw type token (native, loosely typed or AI supplied) to a canonical type.
///
/// Total and deterministic: unknown or absent tokens become `Any`.
pub fn normalize(raw: Option<&str>) -> CanonicalType {
    raw.and_then(parse_type_token)
        .map(|ann| normalize_annotation(&ann))
        .unwrap_or(CanonicalType::Any)
}

/// Normalize a parsed annotation.
pub fn normalize_annotation(ann: &TypeAnnotation) -> CanonicalType {
    match ann {
        TypeAnnotation::Simple(name) => normalize_name(name),
        TypeAnnotation::Generic(outer, args) => normalize_generic(outer, args),
        TypeAnnotation::Union(members) => normalize_union(members),
        TypeAnnotation::Constant(text) => normalize_constant(text),
        TypeAnnotation::Unsupported(_) => CanonicalType::optional(CanonicalType::Any),
    }
}

/// Last dotted segment, lowercased: `typing.List` → `list`.
fn base_name(name: &str) -> String {
    name.rsplit('.').next().unwrap_or(name).to_ascii_lowercase()
}

fn is_null_name(base: &str) -> bool {
    matches!(base, "null" | "void" | "none" | "nonetype")
}

fn is_list_name(base: &str) -> bool {
    matches!(
        base,
        "list" | "array" | "sequence" | "tuple" | "set" | "frozenset" | "iterable" | "iterator"
    )
}

fn is_map_name(base: &str) -> bool {
    matches!(base, "dict" | "object" | "map" | "mapping")
}

fn normalize_name(name: &str) -> CanonicalType {
    let base = base_name(name);
    match base.as_str() {
        "str" | "string" | "text" | "bytes" => CanonicalType::STRING,
        "int" | "integer" | "long" => CanonicalType::INT,
        "float" | "number" | "double" | "decimal" => CanonicalType::FLOAT,
        "bool" | "boolean" => CanonicalType::BOOL,
        b if is_map_name(b) => CanonicalType::map(CanonicalType::Any),
        b if is_list_name(b) => CanonicalType::list(CanonicalType::Any),
        b if is_null_name(b) => CanonicalType::optional(CanonicalType::Any),
        _ => CanonicalType::Any,
    }
}

fn normalize_generic(outer: &str, args: &[TypeAnnotation]) -> CanonicalType {
    let first = || {
        args.first()
            .map(normalize_annotation)
            .unwrap_or(CanonicalType::Any)
    };
    let base = base_name(outer);
    match base.as_str() {
        "optional" => CanonicalType::optional(first()),
        "union" => normalize_union(args),
        "annotated" => first(),
        b if is_list_name(b) => CanonicalType::list(first()),
        b if is_map_name(b) => CanonicalType::map(
            args.get(1)
                .map(normalize_annotation)
                .unwrap_or(CanonicalType::Any),
        ),
        _ => CanonicalType::Any,
    }
}

fn is_null_annotation(ann: &TypeAnnotation) -> bool {
    match ann {
        TypeAnnotation::Simple(name) => is_null_name(&base_name(name)),
        TypeAnnotation::Constant(text) => text == "None",
        _ => false,
    }
}

fn normalize_union(members: &[TypeAnnotation]) -> CanonicalType {
    let non_null: Vec<&TypeAnnotation> =
        members.iter().filter(|m| !is_null_annotation(m)).collect();
    let has_null = non_null.len() != members.len();
    match non_null.as_slice() {
        [] => CanonicalType::optional(CanonicalType::Any),
        [single] if has_null => CanonicalType::optional(normalize_annotation(single)),
        [single] => normalize_annotation(single),
        _ => CanonicalType::Any,
    }
}

fn normalize_constant(text: &str) -> CanonicalType {
    match text {
        "None" => CanonicalType::optional(CanonicalType::Any),
        "True" | "False" => CanonicalType::BOOL,
        t if t.parse::<i64>().is_ok() => CanonicalType::INT,
        t if t.parse::<f64>().is_ok() => CanonicalType::FLOAT,
        _ => CanonicalType::Any,
    }
}

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// A loosely typed value: parameter defaults, stub results, dispatch payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<FieldValue>),
    Map(IndexMap<String, FieldValue>),
}

impl FieldValue {
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(n) => json!(n),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Self::String(s) => Value::String(s.clone()),
            Self::List(items) => Value::Array(items.iter().map(|v| v.to_json()).collect()),
            Self::Map(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or(0.0)),
            },
            Value::String(s) => Self::String(s.clone()),
            Value::Array(items) => Self::List(items.iter().map(Self::from_json).collect()),
            Value::Object(entries) => Self::Map(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Python literal spelling, for rendered artifacts.
    pub fn to_python_literal(&self) -> String {
        match self {
            Self::Null => "None".to_string(),
            Self::Bool(true) => "True".to_string(),
            Self::Bool(false) => "False".to_string(),
            Self::Int(n) => n.to_string(),
            Self::Float(f) => format!("{f:?}"),
            Self::String(s) => serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string()),
            Self::List(items) => {
                let inner: Vec<String> = items.iter().map(|v| v.to_python_literal()).collect();
                format!("[{}]", inner.join(", "))
            }
            Self::Map(entries) => {
                let inner: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| {
                        format!(
                            "{}: {}",
                            Self::String(k.clone()).to_python_literal(),
                            v.to_python_literal()
                        )
                    })
                    .collect();
                format!("{{{}}}", inner.join(", "))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Fields
// ---------------------------------------------------------------------------

/// One named, typed slot of an Input or Output schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: CanonicalType,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<FieldValue>,
}

impl FieldSpec {
    /// Required unless the type is optional.
    pub fn new(name: impl Into<String>, ty: CanonicalType) -> Self {
        let required = !ty.is_optional();
        Self {
            name: name.into(),
            ty,
            required,
            default: None,
        }
    }

    pub fn with_default(mut self, default: FieldValue) -> Self {
        self.required = false;
        self.default = Some(default);
        self
    }

    /// Value used when a caller or callee leaves this field out.
    pub fn fallback_value(&self) -> FieldValue {
        self.default
            .clone()
            .unwrap_or_else(|| self.ty.default_value())
    }
}

// ---------------------------------------------------------------------------
// Analyzer output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub declared_type: Option<TypeAnnotation>,
    /// Set only when the default is a statically known literal.
    pub default: Option<FieldValue>,
}

/// One discovered public function or method.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDescriptor {
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub return_type: Option<TypeAnnotation>,
    pub docstring: String,
    /// Verbatim definition text; only ever used as inference context.
    pub source_text: String,
    /// Enclosing class for methods.
    pub class_name: Option<String>,
    /// 1-based line of the `def`.
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDescriptor {
    pub name: String,
    pub docstring: String,
    pub methods: Vec<String>,
}

/// Everything the analyzer recovers from one file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceInventory {
    pub functions: Vec<FunctionDescriptor>,
    pub classes: Vec<ClassDescriptor>,
}
