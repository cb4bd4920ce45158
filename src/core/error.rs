//! Error types for holograph

use thiserror::Error;

/// Result type alias using holograph's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Holograph error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid request. 'code' field is required.")]
    MissingCode,

    #[error("Error parsing Python code on line {line}: {text}\n{message}")]
    Parse {
        line: u32,
        text: String,
        message: String,
    },

    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Build a `Parse` error from a ruff parse error, resolving the offending
    /// line number and line text against the original source.
    pub fn from_parse_error(err: &ruff_python_parser::ParseError, source: &str) -> Self {
        let registry = crate::source::LineRegistry::new(source);
        let line = registry.line_of(err.location.start().to_usize());
        let text = registry
            .lookup(line)
            .map(|t| t.trim().to_string())
            .unwrap_or_default();
        Error::Parse {
            line,
            text,
            message: err.error.to_string(),
        }
    }
}
