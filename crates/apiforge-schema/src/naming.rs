//! Identifier normalization.
//!
//! Turns arbitrary source identifiers into canonical PascalCase type names,
//! lowercase route segments and safe field names, and resolves collisions
//! between distinct functions that normalize to the same name within one run.

use std::collections::HashSet;

use thiserror::Error;

/// Python keywords; a generated class or field with one of these names would not import.
const PYTHON_KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
    "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return",
    "try", "while", "with", "yield",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("identifier '{raw}' does not normalize to a valid name: {reason}")]
pub struct IdentifierError {
    pub raw: String,
    pub reason: &'static str,
}

impl IdentifierError {
    pub fn new(raw: impl Into<String>, reason: &'static str) -> Self {
        Self {
            raw: raw.into(),
            reason,
        }
    }
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Whether `s` can be used verbatim as a generated identifier.
pub fn is_valid_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(is_identifier_char) && !PYTHON_KEYWORDS.contains(&s)
}

fn check_identifier(raw: &str, candidate: String) -> Result<String, IdentifierError> {
    if candidate.is_empty() {
        return Err(IdentifierError::new(raw, "empty after stripping"));
    }
    if candidate.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(IdentifierError::new(raw, "starts with a digit"));
    }
    if PYTHON_KEYWORDS.contains(&candidate.as_str()) {
        return Err(IdentifierError::new(raw, "reserved keyword"));
    }
    Ok(candidate)
}

/// `get_user` → `GetUser`, `AdminLoginCheck` → `AdminLoginCheck`.
///
/// Splits on underscores and whitespace, drops every other character outside
/// `[A-Za-z0-9_]`, and uppercases the first character of each segment.
pub fn to_canonical_type_name(raw: &str) -> Result<String, IdentifierError> {
    let mut out = String::with_capacity(raw.len());
    for segment in raw.split(|c: char| c == '_' || c.is_whitespace()) {
        let mut chars = segment.chars().filter(|c| is_identifier_char(*c));
        if let Some(first) = chars.next() {
            out.push(first.to_ascii_uppercase());
            out.extend(chars);
        }
    }
    check_identifier(raw, out)
}

/// `GetUser` → `getuser`, `get-user` → `getuser`.
pub fn to_route_path_segment(raw: &str) -> Result<String, IdentifierError> {
    let segment: String = raw
        .chars()
        .filter(|c| is_identifier_char(*c))
        .map(|c| c.to_ascii_lowercase())
        .collect();
    if segment.is_empty() {
        return Err(IdentifierError::new(raw, "empty after stripping"));
    }
    Ok(segment)
}

/// Field names keep their case; only characters outside `[A-Za-z0-9_]` are removed.
pub fn to_field_name(raw: &str) -> Result<String, IdentifierError> {
    let name: String = raw.chars().filter(|c| is_identifier_char(*c)).collect();
    check_identifier(raw, name)
}

/// Namespace for a source file: its path without extension, canonicalized.
///
/// `services/user_api.py` → `ServicesUserApi`.
pub fn file_namespace(source_file: &str) -> Result<String, IdentifierError> {
    let without_ext = match source_file.rsplit_once('.') {
        Some((stem, ext)) if !ext.contains('/') && !stem.is_empty() => stem,
        _ => source_file,
    };
    let spaced: String = without_ext
        .chars()
        .map(|c| match c {
            '/' | '\\' | '.' | '-' => '_',
            other => other,
        })
        .collect();
    to_canonical_type_name(&spaced)
}

/// Per-run name registry.
///
/// The first claimant keeps the base name; later claimants of the same base
/// receive the smallest free numeric suffix starting at 2.
#[derive(Debug, Default)]
pub struct NameAllocator {
    taken: HashSet<String>,
    separator: &'static str,
}

impl NameAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocator whose suffixes are joined with `separator` (`getuser_2`).
    pub fn with_separator(separator: &'static str) -> Self {
        Self {
            taken: HashSet::new(),
            separator,
        }
    }

    pub fn claim(&mut self, base: &str) -> String {
        if self.taken.insert(base.to_string()) {
            return base.to_string();
        }
        let mut n = 2usize;
        loop {
            let candidate = format!("{base}{}{n}", self.separator);
            if self.taken.insert(candidate.clone()) {
                tracing::debug!(base, assigned = %candidate, "name collision resolved");
                return candidate;
            }
            n += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.taken.len()
    }

    pub fn is_empty(&self) -> bool {
        self.taken.is_empty()
    }
}
