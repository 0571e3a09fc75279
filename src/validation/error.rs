use std::fmt;

use serde::Serialize;

use crate::domain::FieldPath;

/// One validation failure, addressed by the path of the offending value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub path: FieldPath,
    pub message: String,
}

impl FieldError {
    pub fn new(path: FieldPath, message: impl Into<String>) -> Self {
        Self {
            path,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

impl std::error::Error for FieldError {}

#[derive(Debug, Clone, thiserror::Error)]
pub enum CompileError {
    #[error("invalid pattern at {pointer}: {source}")]
    InvalidPattern {
        pointer: String,
        #[source]
        source: regex::Error,
    },
    #[error("schema '{0}' is not registered")]
    UnknownSchema(String),
}
