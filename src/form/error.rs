use serde::{Serialize, Serializer};

use crate::validation::{CompileError, FieldError};

use super::custom_id::CustomIdError;

/// Fatal problems found while opening a form.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("an existing entity was requested but none was provided")]
    MissingEntity,
    #[error("existing entity in '{collection_path}' has no id")]
    MissingEntityId { collection_path: String },
    #[error("schema '{0}' is not registered")]
    UnknownSchema(String),
    #[error(transparent)]
    Ruleset(#[from] CompileError),
}

/// Recoverable rejection of an edit.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormError {
    #[error("the form was discarded")]
    Discarded,
    #[error("the form is being saved")]
    Submitting,
    #[error("'{0}' is not a field of this entity")]
    UnknownField(String),
    #[error("cannot write {pointer}: {reason}")]
    InvalidPath { pointer: String, reason: String },
    #[error(transparent)]
    CustomId(#[from] CustomIdError),
}

/// Why a submit did not reach the save step.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SubmitRejected {
    #[error("{} field(s) failed validation", .0.len())]
    Invalid(Vec<FieldError>),
    #[error("a custom id must be set before saving")]
    MissingCustomId,
    #[error("a save is already in flight")]
    AlreadySubmitting,
    #[error("the form was discarded")]
    Discarded,
    #[error("pre-save hook failed: {0}")]
    PreSave(String),
}

/// Failure reported by the save collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SaveError {
    #[error("network error: {0}")]
    Network(String),
    #[error("save rejected: {0}")]
    Rejected(String),
    #[error("pre-save hook failed: {0}")]
    PreSave(String),
    #[error("the session was closed before the save finished")]
    Cancelled,
    #[error("{0}")]
    Other(String),
}

impl Serialize for SaveError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl From<anyhow::Error> for SaveError {
    fn from(err: anyhow::Error) -> Self {
        SaveError::Other(format!("{err:#}"))
    }
}
