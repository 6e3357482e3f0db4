use thiserror::Error;

use crate::naming::IdentifierError;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to parse {file}: {reason}")]
    Analysis { file: String, reason: String },

    #[error("syntax error in {file} at line {line}, column {column}")]
    Syntax {
        file: String,
        line: usize,
        column: usize,
    },

    #[error(transparent)]
    Identifier(#[from] IdentifierError),

    #[error("unsupported source file: {0}")]
    UnsupportedLanguage(String),

    #[error("i/o error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid artifact {path}: {reason}")]
    InvalidArtifact { path: String, reason: String },

    #[error("{0}")]
    Other(String),
}

impl SchemaError {
    /// True for failures that invalidate a whole source file rather than one function.
    pub fn is_analysis_failure(&self) -> bool {
        matches!(
            self,
            Self::Analysis { .. } | Self::Syntax { .. } | Self::UnsupportedLanguage(_)
        )
    }

    pub(crate) fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, SchemaError>;
