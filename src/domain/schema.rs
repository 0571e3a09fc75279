use std::fmt;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Ordered `value -> label` pairs used by enum-like strings, numbers and custom ids.
pub type EnumValues = IndexMap<String, String>;

/// Declarative description of one entity type stored in a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySchema {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "CustomIdPolicy::is_disabled")]
    pub custom_id: CustomIdPolicy,
    pub properties: IndexMap<String, Property>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub default_values: Map<String, Value>,
}

impl EntitySchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            custom_id: CustomIdPolicy::default(),
            properties: IndexMap::new(),
            default_values: Map::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, property: Property) -> Self {
        self.properties.insert(key.into(), property);
        self
    }

    pub fn with_custom_id(mut self, policy: CustomIdPolicy) -> Self {
        self.custom_id = policy;
        self
    }

    pub fn with_default_value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.default_values.insert(key.into(), value);
        self
    }

    pub fn property(&self, key: &str) -> Option<&Property> {
        self.properties.get(key)
    }

    /// Number of property nodes in the tree, counting a reference as a single node.
    pub fn node_count(&self) -> usize {
        self.properties.values().map(Property::node_count).sum()
    }
}

/// Whether new entities of a schema need an id chosen by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CustomIdPolicy {
    Flag(bool),
    Enumerated(EnumValues),
}

impl Default for CustomIdPolicy {
    fn default() -> Self {
        CustomIdPolicy::Flag(false)
    }
}

impl CustomIdPolicy {
    pub fn is_required(&self) -> bool {
        match self {
            CustomIdPolicy::Flag(flag) => *flag,
            CustomIdPolicy::Enumerated(_) => true,
        }
    }

    pub fn allows(&self, id: &str) -> bool {
        match self {
            CustomIdPolicy::Flag(_) => true,
            CustomIdPolicy::Enumerated(values) => values.contains_key(id),
        }
    }

    pub fn options(&self) -> Option<&EnumValues> {
        match self {
            CustomIdPolicy::Enumerated(values) => Some(values),
            CustomIdPolicy::Flag(_) => None,
        }
    }

    fn is_disabled(&self) -> bool {
        !self.is_required()
    }
}

/// One node of the property tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub disabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(default, skip_serializing_if = "PropertyConfig::is_empty")]
    pub config: PropertyConfig,
    #[serde(flatten)]
    pub kind: PropertyKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "dataType",
    rename_all = "lowercase",
    rename_all_fields = "camelCase"
)]
pub enum PropertyKind {
    String {
        #[serde(default)]
        validation: StringValidation,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        enum_values: Option<EnumValues>,
    },
    Number {
        #[serde(default)]
        validation: NumberValidation,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        enum_values: Option<EnumValues>,
    },
    Boolean {
        #[serde(default)]
        validation: Presence,
    },
    Timestamp {
        #[serde(default)]
        validation: TimestampValidation,
    },
    Array {
        of: Box<Property>,
        #[serde(default)]
        validation: ArrayValidation,
    },
    Map {
        properties: IndexMap<String, Property>,
        #[serde(default, skip_serializing_if = "is_false")]
        restrict_keys: bool,
        #[serde(default)]
        validation: Presence,
    },
    Reference {
        collection_path: String,
        schema: SchemaTarget,
        #[serde(default)]
        validation: Presence,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    String,
    Number,
    Boolean,
    Timestamp,
    Array,
    Map,
    Reference,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::String => "string",
            DataType::Number => "number",
            DataType::Boolean => "boolean",
            DataType::Timestamp => "timestamp",
            DataType::Array => "array",
            DataType::Map => "map",
            DataType::Reference => "reference",
        };
        f.write_str(name)
    }
}

impl Property {
    pub fn new(kind: PropertyKind) -> Self {
        Self {
            title: None,
            description: None,
            disabled: false,
            default_value: None,
            config: PropertyConfig::default(),
            kind,
        }
    }

    pub fn string() -> Self {
        Self::new(PropertyKind::String {
            validation: StringValidation::default(),
            enum_values: None,
        })
    }

    pub fn number() -> Self {
        Self::new(PropertyKind::Number {
            validation: NumberValidation::default(),
            enum_values: None,
        })
    }

    pub fn boolean() -> Self {
        Self::new(PropertyKind::Boolean {
            validation: Presence::default(),
        })
    }

    pub fn timestamp() -> Self {
        Self::new(PropertyKind::Timestamp {
            validation: TimestampValidation::default(),
        })
    }

    pub fn array(of: Property) -> Self {
        Self::new(PropertyKind::Array {
            of: Box::new(of),
            validation: ArrayValidation::default(),
        })
    }

    pub fn map<K: Into<String>>(properties: impl IntoIterator<Item = (K, Property)>) -> Self {
        Self::new(PropertyKind::Map {
            properties: properties
                .into_iter()
                .map(|(key, property)| (key.into(), property))
                .collect(),
            restrict_keys: false,
            validation: Presence::default(),
        })
    }

    pub fn reference(collection_path: impl Into<String>, schema: SchemaTarget) -> Self {
        Self::new(PropertyKind::Reference {
            collection_path: collection_path.into(),
            schema,
            validation: Presence::default(),
        })
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn with_config(mut self, config: PropertyConfig) -> Self {
        self.config = config;
        self
    }

    /// Marks the node as required, whatever its kind.
    pub fn required(mut self) -> Self {
        self.presence_mut().required = true;
        self
    }

    pub fn data_type(&self) -> DataType {
        match &self.kind {
            PropertyKind::String { .. } => DataType::String,
            PropertyKind::Number { .. } => DataType::Number,
            PropertyKind::Boolean { .. } => DataType::Boolean,
            PropertyKind::Timestamp { .. } => DataType::Timestamp,
            PropertyKind::Array { .. } => DataType::Array,
            PropertyKind::Map { .. } => DataType::Map,
            PropertyKind::Reference { .. } => DataType::Reference,
        }
    }

    pub fn presence(&self) -> &Presence {
        match &self.kind {
            PropertyKind::String { validation, .. } => &validation.presence,
            PropertyKind::Number { validation, .. } => &validation.presence,
            PropertyKind::Timestamp { validation } => &validation.presence,
            PropertyKind::Array { validation, .. } => &validation.presence,
            PropertyKind::Boolean { validation }
            | PropertyKind::Map { validation, .. }
            | PropertyKind::Reference { validation, .. } => validation,
        }
    }

    fn presence_mut(&mut self) -> &mut Presence {
        match &mut self.kind {
            PropertyKind::String { validation, .. } => &mut validation.presence,
            PropertyKind::Number { validation, .. } => &mut validation.presence,
            PropertyKind::Timestamp { validation } => &mut validation.presence,
            PropertyKind::Array { validation, .. } => &mut validation.presence,
            PropertyKind::Boolean { validation }
            | PropertyKind::Map { validation, .. }
            | PropertyKind::Reference { validation, .. } => validation,
        }
    }

    pub fn enum_values(&self) -> Option<&EnumValues> {
        match &self.kind {
            PropertyKind::String { enum_values, .. } | PropertyKind::Number { enum_values, .. } => {
                enum_values.as_ref()
            }
            _ => None,
        }
    }

    pub fn node_count(&self) -> usize {
        match &self.kind {
            PropertyKind::Array { of, .. } => 1 + of.node_count(),
            PropertyKind::Map { properties, .. } => {
                1 + properties.values().map(Property::node_count).sum::<usize>()
            }
            _ => 1,
        }
    }

    /// Flattened view of the node's constraints handed to custom renderers and validators.
    pub fn constraints(&self) -> FieldConstraints {
        let presence = self.presence();
        let mut constraints = FieldConstraints {
            data_type: self.data_type(),
            required: presence.required,
            disabled: self.disabled,
            min: None,
            max: None,
            pattern: None,
            format: None,
            enum_values: self
                .enum_values()
                .map(|values| values.keys().cloned().collect()),
        };
        match &self.kind {
            PropertyKind::String { validation, .. } => {
                constraints.min = validation.min.map(|value| value as f64);
                constraints.max = validation.max.map(|value| value as f64);
                constraints.pattern = validation.matches.clone();
                constraints.format = if validation.email {
                    Some(StringFormat::Email)
                } else if validation.url {
                    Some(StringFormat::Url)
                } else {
                    None
                };
            }
            PropertyKind::Number { validation, .. } => {
                constraints.min = validation.min;
                constraints.max = validation.max;
            }
            PropertyKind::Array { validation, .. } => {
                constraints.min = validation.min.map(|value| value as f64);
                constraints.max = validation.max.map(|value| value as f64);
            }
            _ => {}
        }
        constraints
    }
}

/// Target schema of a reference node. `"self"` points back at the enclosing schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SchemaTarget {
    SelfSchema,
    Named(String),
}

impl From<String> for SchemaTarget {
    fn from(value: String) -> Self {
        if value == "self" {
            SchemaTarget::SelfSchema
        } else {
            SchemaTarget::Named(value)
        }
    }
}

impl From<SchemaTarget> for String {
    fn from(value: SchemaTarget) -> Self {
        match value {
            SchemaTarget::SelfSchema => "self".to_string(),
            SchemaTarget::Named(name) => name,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Presence {
    #[serde(skip_serializing_if = "is_false")]
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StringValidation {
    #[serde(flatten)]
    pub presence: Presence,
    pub min: Option<usize>,
    pub max: Option<usize>,
    pub length: Option<usize>,
    pub matches: Option<String>,
    pub email: bool,
    pub url: bool,
    pub lowercase: bool,
    pub uppercase: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NumberValidation {
    #[serde(flatten)]
    pub presence: Presence,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub less_than: Option<f64>,
    pub more_than: Option<f64>,
    pub positive: bool,
    pub negative: bool,
    pub integer: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimestampValidation {
    #[serde(flatten)]
    pub presence: Presence,
    pub min: Option<DateTime<Utc>>,
    pub max: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArrayValidation {
    #[serde(flatten)]
    pub presence: Presence,
    pub min: Option<usize>,
    pub max: Option<usize>,
}

/// UI configuration. Only rendering reads it; validation and reconciliation ignore it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PropertyConfig {
    /// Name of a registered custom renderer that replaces the built-in widget.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_props: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_preview: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiline: Option<Value>,
    #[serde(skip_serializing_if = "is_false")]
    pub markdown: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_meta: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PropertyConfig {
    pub fn is_empty(&self) -> bool {
        self == &PropertyConfig::default()
    }

    pub fn with_field(mut self, renderer: impl Into<String>) -> Self {
        self.field = Some(renderer.into());
        self
    }

    pub fn with_custom_preview(mut self, preview: impl Into<String>) -> Self {
        self.custom_preview = Some(preview.into());
        self
    }

    pub fn with_storage_meta(mut self, meta: Value) -> Self {
        self.storage_meta = Some(meta);
        self
    }

    pub fn with_markdown(mut self, markdown: bool) -> Self {
        self.markdown = markdown;
        self
    }

    /// `multiline` accepts either `true` or a row count.
    pub fn is_multiline(&self) -> bool {
        match &self.multiline {
            Some(Value::Bool(flag)) => *flag,
            Some(Value::Number(rows)) => rows.as_u64().is_some_and(|rows| rows > 0),
            _ => false,
        }
    }

    pub fn previews_url(&self) -> bool {
        match &self.url {
            Some(Value::Bool(flag)) => *flag,
            Some(Value::String(_)) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StringFormat {
    Email,
    Url,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldConstraints {
    pub data_type: DataType,
    pub required: bool,
    pub disabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<StringFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
}

fn is_false(value: &bool) -> bool {
    !*value
}
