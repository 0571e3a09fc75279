use std::{fmt, sync::Arc};

use indexmap::IndexMap;
use serde_json::Value;

use crate::{
    domain::FieldInput,
    validation::{CustomValidators, FieldValidator},
};

/// Replaces the built-in widget of fields whose config names it.
pub trait FieldRenderer: Send + Sync {
    fn render(&self, input: &FieldInput<'_>) -> Value;
}

impl<F> FieldRenderer for F
where
    F: Fn(&FieldInput<'_>) -> Value + Send + Sync,
{
    fn render(&self, input: &FieldInput<'_>) -> Value {
        self(input)
    }
}

/// Produces a read-only preview attached to the descriptor.
pub trait FieldPreview: Send + Sync {
    fn preview(&self, input: &FieldInput<'_>) -> Value;
}

impl<F> FieldPreview for F
where
    F: Fn(&FieldInput<'_>) -> Value + Send + Sync,
{
    fn preview(&self, input: &FieldInput<'_>) -> Value {
        self(input)
    }
}

/// Named renderers and previews plus per-path validators.
#[derive(Clone, Default)]
pub struct FieldOverrides {
    renderers: IndexMap<String, Arc<dyn FieldRenderer>>,
    previews: IndexMap<String, Arc<dyn FieldPreview>>,
    validators: IndexMap<String, Arc<dyn FieldValidator>>,
}

impl FieldOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_renderer(
        mut self,
        name: impl Into<String>,
        renderer: impl FieldRenderer + 'static,
    ) -> Self {
        self.renderers.insert(name.into(), Arc::new(renderer));
        self
    }

    pub fn with_preview(
        mut self,
        name: impl Into<String>,
        preview: impl FieldPreview + 'static,
    ) -> Self {
        self.previews.insert(name.into(), Arc::new(preview));
        self
    }

    /// Registers a validator for a path pattern such as `/price` or `/images/*`.
    pub fn with_validator(
        mut self,
        pattern: impl Into<String>,
        validator: impl FieldValidator + 'static,
    ) -> Self {
        self.validators.insert(pattern.into(), Arc::new(validator));
        self
    }

    pub fn renderer(&self, name: &str) -> Option<&dyn FieldRenderer> {
        self.renderers.get(name).map(|renderer| renderer.as_ref())
    }

    pub fn preview(&self, name: &str) -> Option<&dyn FieldPreview> {
        self.previews.get(name).map(|preview| preview.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.renderers.is_empty() && self.previews.is_empty() && self.validators.is_empty()
    }
}

impl CustomValidators for FieldOverrides {
    fn validator_for(&self, pattern: &str) -> Option<&dyn FieldValidator> {
        self.validators.get(pattern).map(|validator| validator.as_ref())
    }
}

impl fmt::Debug for FieldOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldOverrides")
            .field("renderers", &self.renderers.keys().collect::<Vec<_>>())
            .field("previews", &self.previews.keys().collect::<Vec<_>>())
            .field("validators", &self.validators.keys().collect::<Vec<_>>())
            .finish()
    }
}
