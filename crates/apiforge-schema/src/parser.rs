//! Tree-sitter based source analyzer.
//!
//! Walks the concrete syntax tree of one Python file and extracts:
//! - Top-level function definitions (plain, decorated and `async`)
//! - Class definitions and their methods
//! - Parameters with type annotations and statically known defaults
//! - Return annotations and cleaned docstrings
//!
//! Names starting with `_` are private and skipped. Nested functions are
//! never extracted.

use std::path::Path;

use indexmap::IndexMap;
use tree_sitter::{Node, Parser, Tree};

use crate::error::{Result, SchemaError};
use crate::types::{
    ClassDescriptor, FieldValue, FunctionDescriptor, NO_DOCSTRING, Parameter, SourceInventory,
    TypeAnnotation, parse_type_token,
};

/// Languages the analyzer understands, selected by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLanguage {
    Python,
}

impl SourceLanguage {
    pub fn detect(path: &str) -> Option<Self> {
        match Path::new(path).extension().and_then(|e| e.to_str()) {
            Some("py" | "pyi") => Some(Self::Python),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Analyze one source file into its function and class inventory.
///
/// A file whose tree contains error or missing nodes is rejected as a whole;
/// partial inventories are never returned.
pub fn analyze(file_path: &str, source: &str) -> Result<SourceInventory> {
    if SourceLanguage::detect(file_path).is_none() {
        return Err(SchemaError::UnsupportedLanguage(file_path.to_string()));
    }

    let tree = parse_python(file_path, source)?;
    let root = tree.root_node();

    if root.has_error() {
        let (line, column) = first_error_position(root).unwrap_or((1, 1));
        return Err(SchemaError::Syntax {
            file: file_path.to_string(),
            line,
            column,
        });
    }

    let src = source.as_bytes();
    let mut inventory = SourceInventory::default();

    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        let def = unwrap_decorated(child);
        match def.kind() {
            "function_definition" => {
                if let Some(function) = extract_function(&def, &child, src, None) {
                    inventory.functions.push(function);
                }
            }
            "class_definition" => extract_class(&def, src, &mut inventory),
            _ => {}
        }
    }

    tracing::debug!(
        file = file_path,
        functions = inventory.functions.len(),
        classes = inventory.classes.len(),
        "analyzed source file"
    );
    Ok(inventory)
}

// ---------------------------------------------------------------------------
// Python parsing
// ---------------------------------------------------------------------------

fn parse_python(file_path: &str, source: &str) -> Result<Tree> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| SchemaError::Analysis {
            file: file_path.to_string(),
            reason: format!("failed to set language: {e}"),
        })?;
    parser
        .parse(source, None)
        .ok_or_else(|| SchemaError::Analysis {
            file: file_path.to_string(),
            reason: "tree-sitter parse returned None".into(),
        })
}

fn node_text<'a>(node: &Node, src: &'a [u8]) -> &'a str {
    node.utf8_text(src).unwrap_or("")
}

/// 1-based position of the first ERROR or MISSING node in document order.
fn first_error_position(root: Node) -> Option<(usize, usize)> {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            let pos = node.start_position();
            return Some((pos.row + 1, pos.column + 1));
        }
        if node.has_error() {
            let mut cursor = node.walk();
            let children: Vec<Node> = node.children(&mut cursor).collect();
            stack.extend(children.into_iter().rev());
        }
    }
    None
}

fn unwrap_decorated(node: Node) -> Node {
    if node.kind() == "decorated_definition" {
        node.child_by_field_name("definition").unwrap_or(node)
    } else {
        node
    }
}

// ---------------------------------------------------------------------------
// Definitions
// ---------------------------------------------------------------------------

/// `outer` is the decorated wrapper when there is one; its text is the source snippet.
fn extract_function(
    def: &Node,
    outer: &Node,
    src: &[u8],
    class_name: Option<&str>,
) -> Option<FunctionDescriptor> {
    let name = node_text(&def.child_by_field_name("name")?, src).to_string();
    if name.starts_with('_') {
        return None;
    }

    let parameters = def
        .child_by_field_name("parameters")
        .map(|params| extract_parameters(&params, src))
        .unwrap_or_default();

    let return_type = def
        .child_by_field_name("return_type")
        .map(|ann| parse_type_annotation(&ann, src));

    let docstring = def
        .child_by_field_name("body")
        .and_then(|body| extract_docstring(&body, src))
        .unwrap_or_else(|| NO_DOCSTRING.to_string());

    Some(FunctionDescriptor {
        name,
        parameters,
        return_type,
        docstring,
        source_text: node_text(outer, src).to_string(),
        class_name: class_name.map(str::to_string),
        line: def.start_position().row + 1,
    })
}

fn extract_class(class: &Node, src: &[u8], inventory: &mut SourceInventory) {
    let Some(name_node) = class.child_by_field_name("name") else {
        return;
    };
    let name = node_text(&name_node, src).to_string();
    if name.starts_with('_') {
        return;
    }

    let body = class.child_by_field_name("body");
    let docstring = body
        .and_then(|b| extract_docstring(&b, src))
        .unwrap_or_else(|| NO_DOCSTRING.to_string());

    let mut methods = Vec::new();
    if let Some(body) = body {
        let mut cursor = body.walk();
        for child in body.named_children(&mut cursor) {
            let def = unwrap_decorated(child);
            if def.kind() == "function_definition"
                && let Some(method) = extract_function(&def, &child, src, Some(name.as_str()))
            {
                methods.push(method.name.clone());
                inventory.functions.push(method);
            }
        }
    }

    inventory.classes.push(ClassDescriptor {
        name,
        docstring,
        methods,
    });
}

/// Positionally bindable parameters in declaration order.
///
/// Splats (`*args`, `**kwargs`) and the bare `*` and `/` separators are skipped.
fn extract_parameters(params: &Node, src: &[u8]) -> Vec<Parameter> {
    let mut out = Vec::new();
    let mut cursor = params.walk();
    for child in params.named_children(&mut cursor) {
        match child.kind() {
            // `name`
            "identifier" => out.push(Parameter {
                name: node_text(&child, src).to_string(),
                declared_type: None,
                default: None,
            }),

            // `name: type`; `*args: int` wraps a splat pattern instead of an identifier
            "typed_parameter" => {
                let mut c = child.walk();
                let Some(ident) = child.children(&mut c).find(|n| n.kind() == "identifier") else {
                    continue;
                };
                out.push(Parameter {
                    name: node_text(&ident, src).to_string(),
                    declared_type: child
                        .child_by_field_name("type")
                        .map(|t| parse_type_annotation(&t, src)),
                    default: None,
                });
            }

            // `name = default`
            "default_parameter" => {
                let Some(name) = child.child_by_field_name("name") else {
                    continue;
                };
                out.push(Parameter {
                    name: node_text(&name, src).to_string(),
                    declared_type: None,
                    default: child
                        .child_by_field_name("value")
                        .and_then(|v| parse_default_value(&v, src)),
                });
            }

            // `name: type = default`
            "typed_default_parameter" => {
                let Some(name) = child.child_by_field_name("name") else {
                    continue;
                };
                out.push(Parameter {
                    name: node_text(&name, src).to_string(),
                    declared_type: child
                        .child_by_field_name("type")
                        .map(|t| parse_type_annotation(&t, src)),
                    default: child
                        .child_by_field_name("value")
                        .and_then(|v| parse_default_value(&v, src)),
                });
            }

            _ => {}
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Docstrings
// ---------------------------------------------------------------------------

fn extract_docstring(body: &Node, src: &[u8]) -> Option<String> {
    let mut cursor = body.walk();
    let first = body
        .named_children(&mut cursor)
        .find(|n| n.kind() != "comment")?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let expr = first.named_child(0)?;
    if !matches!(expr.kind(), "string" | "concatenated_string") {
        return None;
    }
    let cleaned = clean_docstring(&parse_string_literal(&expr, src)?);
    (!cleaned.is_empty()).then_some(cleaned)
}

/// Strip the first line, dedent the rest by their common indentation, and drop
/// leading and trailing blank lines.
fn clean_docstring(raw: &str) -> String {
    let lines: Vec<&str> = raw.lines().collect();
    let indent = lines
        .iter()
        .skip(1)
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);

    let mut out: Vec<String> = lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            if i == 0 {
                line.trim().to_string()
            } else {
                line.get(indent..).unwrap_or("").trim_end().to_string()
            }
        })
        .collect();

    while out.first().is_some_and(|l| l.is_empty()) {
        out.remove(0);
    }
    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }
    out.join("\n")
}

// ---------------------------------------------------------------------------
// Type annotation parsing
// ---------------------------------------------------------------------------

/// Parse a type annotation node. Total: anything unrecognized is kept verbatim
/// as `TypeAnnotation::Unsupported`.
pub fn parse_type_annotation(node: &Node, src: &[u8]) -> TypeAnnotation {
    // The `type` field wraps the actual expression.
    let node = if node.kind() == "type" {
        node.named_child(0).unwrap_or(*node)
    } else {
        *node
    };
    let text = node_text(&node, src);

    match node.kind() {
        "identifier" | "attribute" => TypeAnnotation::Simple(text.to_string()),

        "subscript" => {
            let Some(value) = node.child_by_field_name("value") else {
                return TypeAnnotation::Unsupported(text.to_string());
            };
            let outer = node_text(&value, src).to_string();
            let mut cursor = node.walk();
            let args: Vec<TypeAnnotation> = node
                .children_by_field_name("subscript", &mut cursor)
                .map(|child| parse_type_annotation(&child, src))
                .collect();
            if args.is_empty() {
                TypeAnnotation::Simple(outer)
            } else {
                TypeAnnotation::Generic(outer, args)
            }
        }

        "binary_operator" => {
            let op = node
                .children(&mut node.walk())
                .find(|c| !c.is_named())
                .map(|c| node_text(&c, src))
                .unwrap_or("");
            let (Some(left), Some(right)) = (
                node.child_by_field_name("left"),
                node.child_by_field_name("right"),
            ) else {
                return TypeAnnotation::Unsupported(text.to_string());
            };
            if op != "|" {
                return TypeAnnotation::Unsupported(text.to_string());
            }

            // Flatten nested unions: (A | B) | C → [A, B, C]
            let mut members = Vec::new();
            for side in [left, right] {
                match parse_type_annotation(&side, src) {
                    TypeAnnotation::Union(inner) => members.extend(inner),
                    other => members.push(other),
                }
            }
            TypeAnnotation::Union(members)
        }

        "none" | "true" | "false" | "integer" | "float" => {
            TypeAnnotation::Constant(text.to_string())
        }

        // Forward references: `-> "List[int]"`
        "string" => parse_string_literal(&node, src)
            .and_then(|inner| parse_type_token(&inner))
            .unwrap_or_else(|| TypeAnnotation::Unsupported(text.to_string())),

        // generic_type, union_type, member_type and friends: reparse the text
        _ => parse_type_token(text).unwrap_or_else(|| TypeAnnotation::Unsupported(text.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Default value / literal parsing
// ---------------------------------------------------------------------------

fn parse_default_value(node: &Node, src: &[u8]) -> Option<FieldValue> {
    match node.kind() {
        "none" => Some(FieldValue::Null),
        "true" => Some(FieldValue::Bool(true)),
        "false" => Some(FieldValue::Bool(false)),
        "integer" => node_text(node, src).parse::<i64>().ok().map(FieldValue::Int),
        "float" => node_text(node, src).parse::<f64>().ok().map(FieldValue::Float),
        "string" | "concatenated_string" => parse_string_literal(node, src).map(FieldValue::String),
        "unary_operator" => {
            // Negative numbers: `-1`, `-3.14`
            let text = node_text(node, src).replace(' ', "");
            if let Ok(n) = text.parse::<i64>() {
                Some(FieldValue::Int(n))
            } else {
                text.parse::<f64>().ok().map(FieldValue::Float)
            }
        }
        // Tuples and sets are carried as lists
        "list" | "tuple" | "set" => {
            let mut items = Vec::new();
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                items.push(parse_default_value(&child, src)?);
            }
            Some(FieldValue::List(items))
        }
        "dictionary" => {
            let mut entries = IndexMap::new();
            let mut cursor = node.walk();
            for pair in node.named_children(&mut cursor) {
                if pair.kind() != "pair" {
                    return None;
                }
                let key = pair
                    .child_by_field_name("key")
                    .and_then(|k| parse_default_value(&k, src))?;
                let value = pair
                    .child_by_field_name("value")
                    .and_then(|v| parse_default_value(&v, src))?;
                let FieldValue::String(key) = key else {
                    return None;
                };
                entries.insert(key, value);
            }
            Some(FieldValue::Map(entries))
        }
        _ => None,
    }
}

/// Literal contents of a string node. Interpolated strings are not static and yield `None`.
fn parse_string_literal(node: &Node, src: &[u8]) -> Option<String> {
    if node.kind() == "concatenated_string" {
        let mut out = String::new();
        let mut cursor = node.walk();
        for part in node.named_children(&mut cursor) {
            out.push_str(&parse_string_literal(&part, src)?);
        }
        return Some(out);
    }

    let text = node_text(node, src);
    let body_start = text.find(['"', '\''])?;
    if text[..body_start].contains(['f', 'F']) {
        return None;
    }
    let quoted = &text[body_start..];
    // Strip various quote styles: "...", '...', """...""", '''...'''
    for quote in ["\"\"\"", "'''", "\"", "'"] {
        if quoted.len() >= 2 * quote.len() && quoted.starts_with(quote) && quoted.ends_with(quote)
        {
            return Some(quoted[quote.len()..quoted.len() - quote.len()].to_string());
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
