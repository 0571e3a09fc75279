use serde::Serialize;
use serde_json::Value;

use crate::domain::{EnumValues, FieldPath};

/// Rendering strategy chosen for one field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "widget", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Widget {
    /// A registered renderer named in the field config; `output` is what it produced.
    Custom { renderer: String, output: Value },
    StorageUpload { storage_meta: Value },
    StorageUploadMultiple { storage_meta: Value },
    Markdown,
    Select { options: EnumValues },
    MultiSelect { options: EnumValues },
    MultilineText,
    UrlText,
    Text,
    Number,
    Switch,
    DateTime,
    ArrayOf,
    ReferenceList { collection_path: String, schema: String },
    Group,
    Reference { collection_path: String, schema: String },
}

impl Widget {
    pub fn name(&self) -> &'static str {
        match self {
            Widget::Custom { .. } => "custom",
            Widget::StorageUpload { .. } => "storageUpload",
            Widget::StorageUploadMultiple { .. } => "storageUploadMultiple",
            Widget::Markdown => "markdown",
            Widget::Select { .. } => "select",
            Widget::MultiSelect { .. } => "multiSelect",
            Widget::MultilineText => "multilineText",
            Widget::UrlText => "urlText",
            Widget::Text => "text",
            Widget::Number => "number",
            Widget::Switch => "switch",
            Widget::DateTime => "dateTime",
            Widget::ArrayOf => "arrayOf",
            Widget::ReferenceList { .. } => "referenceList",
            Widget::Group => "group",
            Widget::Reference { .. } => "reference",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    pub path: FieldPath,
    pub name: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub widget: Widget,
    pub read_only: bool,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<Value>,
    /// The user edited this field and the stored value has moved on since.
    pub underlying_value_changed: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FieldDescriptor>,
}

impl FieldDescriptor {
    /// Depth-first search by pointer.
    pub fn find(&self, pointer: &str) -> Option<&FieldDescriptor> {
        if self.path.pointer() == pointer {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(pointer))
    }

    pub fn flatten(&self) -> Vec<&FieldDescriptor> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.flatten());
        }
        out
    }
}
