use indexmap::IndexSet;
use serde_json::Value;

use crate::{
    domain::{
        EntityValues, FieldInput, FieldPath, PathSegment, Property, PropertyKind, SchemaTarget,
    },
    schema::{SchemaId, SchemaRegistry},
};

use super::{
    descriptor::{FieldDescriptor, Widget},
    overrides::FieldOverrides,
    reconcile::values_equal,
};

/// Borrowed view of everything field resolution reads.
#[derive(Debug, Clone, Copy)]
pub struct ResolveContext<'a> {
    pub registry: &'a SchemaRegistry,
    /// Schema that `"self"` references resolve against.
    pub enclosing: SchemaId,
    pub overrides: &'a FieldOverrides,
    pub touched: &'a IndexSet<String>,
    /// Latest live snapshot, used to flag touched fields that moved upstream.
    pub live: Option<&'a EntityValues>,
    /// Values as last loaded or saved. Without them the local values stand in.
    pub saved: Option<&'a EntityValues>,
}

impl<'a> ResolveContext<'a> {
    pub fn new(
        registry: &'a SchemaRegistry,
        enclosing: SchemaId,
        overrides: &'a FieldOverrides,
        touched: &'a IndexSet<String>,
    ) -> Self {
        Self {
            registry,
            enclosing,
            overrides,
            touched,
            live: None,
            saved: None,
        }
    }

    pub fn with_live(mut self, live: Option<&'a EntityValues>) -> Self {
        self.live = live;
        self
    }

    pub fn with_saved(mut self, saved: Option<&'a EntityValues>) -> Self {
        self.saved = saved;
        self
    }

    fn within(&self, enclosing: SchemaId) -> Self {
        Self { enclosing, ..*self }
    }

    fn target_name(&self, target: &SchemaTarget) -> String {
        self.registry
            .resolve_target(self.enclosing, target)
            .and_then(|id| self.registry.get(id))
            .map(|schema| schema.name.clone())
            .unwrap_or_else(|| String::from(target.clone()))
    }
}

/// Descriptors for every declared field of the enclosing schema, in declaration order.
pub fn resolve_fields(values: &EntityValues, cx: &ResolveContext<'_>) -> Vec<FieldDescriptor> {
    let Some(schema) = cx.registry.get(cx.enclosing) else {
        return Vec::new();
    };
    schema
        .properties
        .iter()
        .map(|(key, property)| resolve(property, values.get(key), &FieldPath::field(key), cx))
        .collect()
}

/// Chooses the widget for one node and resolves its children.
pub fn resolve(
    property: &Property,
    value: Option<&Value>,
    path: &FieldPath,
    cx: &ResolveContext<'_>,
) -> FieldDescriptor {
    resolve_node(property, value, path, cx, false)
}

fn resolve_node(
    property: &Property,
    value: Option<&Value>,
    path: &FieldPath,
    cx: &ResolveContext<'_>,
    inherited_read_only: bool,
) -> FieldDescriptor {
    let read_only = inherited_read_only || property.disabled;
    let constraints = property.constraints();
    let input = FieldInput::new(value, &constraints, path);

    let custom = property.config.field.as_deref().and_then(|name| {
        cx.overrides.renderer(name).map(|renderer| Widget::Custom {
            renderer: name.to_string(),
            output: renderer.render(&input),
        })
    });
    let preview = property
        .config
        .custom_preview
        .as_deref()
        .and_then(|name| cx.overrides.preview(name))
        .map(|preview| preview.preview(&input));

    let (widget, children) = match custom {
        Some(widget) => (widget, Vec::new()),
        None => builtin_widget(property, value, path, cx, read_only),
    };

    let name = match path.segments().last() {
        Some(PathSegment::Index(index)) => index.to_string(),
        _ => path.leaf_name().unwrap_or_default().to_string(),
    };

    FieldDescriptor {
        path: path.clone(),
        title: property.title.clone().unwrap_or_else(|| name.clone()),
        name,
        description: property.description.clone(),
        widget,
        read_only,
        required: constraints.required,
        value: value.cloned(),
        preview,
        underlying_value_changed: underlying_value_changed(path, value, cx),
        children,
    }
}

fn builtin_widget(
    property: &Property,
    value: Option<&Value>,
    path: &FieldPath,
    cx: &ResolveContext<'_>,
    read_only: bool,
) -> (Widget, Vec<FieldDescriptor>) {
    let config = &property.config;
    match &property.kind {
        PropertyKind::String { enum_values, .. } => {
            let widget = if let Some(meta) = &config.storage_meta {
                Widget::StorageUpload {
                    storage_meta: meta.clone(),
                }
            } else if config.markdown {
                Widget::Markdown
            } else if let Some(options) = enum_values {
                Widget::Select {
                    options: options.clone(),
                }
            } else if config.is_multiline() {
                Widget::MultilineText
            } else if config.previews_url() {
                Widget::UrlText
            } else {
                Widget::Text
            };
            (widget, Vec::new())
        }
        PropertyKind::Number { enum_values, .. } => match enum_values {
            Some(options) => (
                Widget::Select {
                    options: options.clone(),
                },
                Vec::new(),
            ),
            None => (Widget::Number, Vec::new()),
        },
        PropertyKind::Boolean { .. } => (Widget::Switch, Vec::new()),
        PropertyKind::Timestamp { .. } => (Widget::DateTime, Vec::new()),
        PropertyKind::Array { of, .. } => array_widget(of, value, path, cx, read_only),
        PropertyKind::Map { properties, .. } => {
            let map = value.and_then(Value::as_object);
            let children = properties
                .iter()
                .map(|(key, child)| {
                    resolve_node(
                        child,
                        map.and_then(|map| map.get(key)),
                        &path.key(key),
                        cx,
                        read_only,
                    )
                })
                .collect();
            (Widget::Group, children)
        }
        PropertyKind::Reference {
            collection_path,
            schema,
            ..
        } => {
            let widget = Widget::Reference {
                collection_path: collection_path.clone(),
                schema: cx.target_name(schema),
            };
            (widget, embedded_children(schema, value, path, cx, read_only))
        }
    }
}

fn array_widget(
    of: &Property,
    value: Option<&Value>,
    path: &FieldPath,
    cx: &ResolveContext<'_>,
    read_only: bool,
) -> (Widget, Vec<FieldDescriptor>) {
    match &of.kind {
        PropertyKind::String {
            enum_values: Some(options),
            ..
        } => (
            Widget::MultiSelect {
                options: options.clone(),
            },
            Vec::new(),
        ),
        PropertyKind::String { .. } if of.config.storage_meta.is_some() => (
            Widget::StorageUploadMultiple {
                storage_meta: of.config.storage_meta.clone().unwrap_or_default(),
            },
            Vec::new(),
        ),
        PropertyKind::Reference {
            collection_path,
            schema,
            ..
        } => (
            Widget::ReferenceList {
                collection_path: collection_path.clone(),
                schema: cx.target_name(schema),
            },
            Vec::new(),
        ),
        _ => {
            let children = value
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .enumerate()
                        .map(|(index, item)| {
                            resolve_node(of, Some(item), &path.index(index), cx, read_only)
                        })
                        .collect()
                })
                .unwrap_or_default();
            (Widget::ArrayOf, children)
        }
    }
}

/// Children of a reference come from its embedded `values`, so recursion stops
/// where the data does even when the target is the enclosing schema.
fn embedded_children(
    target: &SchemaTarget,
    value: Option<&Value>,
    path: &FieldPath,
    cx: &ResolveContext<'_>,
    read_only: bool,
) -> Vec<FieldDescriptor> {
    let Some(embedded) = value
        .and_then(|value| value.get("values"))
        .and_then(Value::as_object)
    else {
        return Vec::new();
    };
    let Some(target_id) = cx.registry.resolve_target(cx.enclosing, target) else {
        return Vec::new();
    };
    let Some(schema) = cx.registry.get(target_id) else {
        return Vec::new();
    };
    let inner = cx.within(target_id);
    let base = path.key("values");
    schema
        .properties
        .iter()
        .map(|(key, child)| {
            resolve_node(child, embedded.get(key), &base.key(key), &inner, read_only)
        })
        .collect()
}

/// A touched top-level field whose stored value moved away from the one the
/// user started editing.
fn underlying_value_changed(
    path: &FieldPath,
    value: Option<&Value>,
    cx: &ResolveContext<'_>,
) -> bool {
    if path.depth() != 1 {
        return false;
    }
    let (Some(key), Some(live)) = (path.top_level(), cx.live) else {
        return false;
    };
    if !cx.touched.contains(key) {
        return false;
    }
    let reference = match cx.saved {
        Some(saved) => saved.get(key),
        None => value,
    };
    let live_value = live.get(key).unwrap_or(&Value::Null);
    !values_equal(live_value, reference.unwrap_or(&Value::Null))
}
