use serde_json::Value;

use super::{path::FieldPath, schema::FieldConstraints};

/// The `(value, constraints, path)` triple every field override is called with.
#[derive(Debug, Clone, Copy)]
pub struct FieldInput<'a> {
    pub value: Option<&'a Value>,
    pub constraints: &'a FieldConstraints,
    pub path: &'a FieldPath,
}

impl<'a> FieldInput<'a> {
    pub fn new(
        value: Option<&'a Value>,
        constraints: &'a FieldConstraints,
        path: &'a FieldPath,
    ) -> Self {
        Self {
            value,
            constraints,
            path,
        }
    }

    /// The value, with explicit `null` folded into absence.
    pub fn present_value(&self) -> Option<&'a Value> {
        self.value.filter(|value| !value.is_null())
    }
}
