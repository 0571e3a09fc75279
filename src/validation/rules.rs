use indexmap::IndexMap;
use regex::Regex;

use chrono::{DateTime, Utc};

use crate::{
    domain::{
        FieldConstraints, FieldPath, NumberValidation, Presence, Property, PropertyKind,
        SchemaTarget,
    },
    schema::{SchemaId, SchemaRegistry},
};

use super::error::CompileError;

/// Compiled rules for every top-level field of one schema.
#[derive(Debug)]
pub(crate) struct EntityRules {
    pub(crate) fields: IndexMap<String, RuleNode>,
}

impl EntityRules {
    pub(crate) fn node_count(&self) -> usize {
        self.fields.values().map(RuleNode::node_count).sum()
    }
}

/// One compiled node; there is exactly one per property node.
#[derive(Debug)]
pub(crate) struct RuleNode {
    pub(crate) presence: Presence,
    /// `false` for disabled properties: no input constraints apply to them.
    pub(crate) mutable: bool,
    pub(crate) constraints: FieldConstraints,
    pub(crate) kind: RuleKind,
}

#[derive(Debug)]
pub(crate) enum RuleKind {
    String(StringRule),
    Number(NumberRule),
    Boolean,
    Timestamp {
        min: Option<DateTime<Utc>>,
        max: Option<DateTime<Utc>>,
    },
    Array {
        min: Option<usize>,
        max: Option<usize>,
        items: Box<RuleNode>,
    },
    Map {
        fields: IndexMap<String, RuleNode>,
        restrict_keys: bool,
    },
    /// Deferred lookup: the target's rules are fetched from the cache when a value is checked.
    Reference { target: SchemaId },
}

#[derive(Debug)]
pub(crate) struct StringRule {
    pub(crate) min: Option<usize>,
    pub(crate) max: Option<usize>,
    pub(crate) length: Option<usize>,
    pub(crate) pattern: Option<Regex>,
    pub(crate) email: bool,
    pub(crate) url: bool,
    pub(crate) lowercase: bool,
    pub(crate) uppercase: bool,
    pub(crate) allowed: Option<Vec<String>>,
}

#[derive(Debug)]
pub(crate) struct NumberRule {
    pub(crate) bounds: NumberValidation,
    pub(crate) allowed: Option<Vec<f64>>,
}

impl RuleNode {
    pub(crate) fn node_count(&self) -> usize {
        match &self.kind {
            RuleKind::Array { items, .. } => 1 + items.node_count(),
            RuleKind::Map { fields, .. } => {
                1 + fields.values().map(RuleNode::node_count).sum::<usize>()
            }
            _ => 1,
        }
    }
}

pub(crate) fn compile_entity(
    registry: &SchemaRegistry,
    id: SchemaId,
) -> Result<EntityRules, CompileError> {
    let schema = registry
        .get(id)
        .ok_or_else(|| CompileError::UnknownSchema(format!("#{}", id.index())))?;
    let compiler = Compiler {
        registry,
        enclosing: id,
    };
    let root = FieldPath::root();
    let fields = schema
        .properties
        .iter()
        .map(|(key, property)| {
            compiler
                .compile_node(property, &root.key(key))
                .map(|node| (key.clone(), node))
        })
        .collect::<Result<IndexMap<_, _>, _>>()?;
    Ok(EntityRules { fields })
}

struct Compiler<'a> {
    registry: &'a SchemaRegistry,
    enclosing: SchemaId,
}

impl Compiler<'_> {
    fn compile_node(
        &self,
        property: &Property,
        path: &FieldPath,
    ) -> Result<RuleNode, CompileError> {
        let kind = match &property.kind {
            PropertyKind::String {
                validation,
                enum_values,
            } => {
                let pattern = validation
                    .matches
                    .as_deref()
                    .map(Regex::new)
                    .transpose()
                    .map_err(|source| CompileError::InvalidPattern {
                        pointer: path.pointer(),
                        source,
                    })?;
                RuleKind::String(StringRule {
                    min: validation.min,
                    max: validation.max,
                    length: validation.length,
                    pattern,
                    email: validation.email,
                    url: validation.url,
                    lowercase: validation.lowercase,
                    uppercase: validation.uppercase,
                    allowed: enum_values
                        .as_ref()
                        .map(|values| values.keys().cloned().collect()),
                })
            }
            PropertyKind::Number {
                validation,
                enum_values,
            } => RuleKind::Number(NumberRule {
                bounds: validation.clone(),
                allowed: enum_values.as_ref().map(|values| {
                    values
                        .keys()
                        .filter_map(|key| key.parse::<f64>().ok())
                        .collect()
                }),
            }),
            PropertyKind::Boolean { .. } => RuleKind::Boolean,
            PropertyKind::Timestamp { validation } => RuleKind::Timestamp {
                min: validation.min,
                max: validation.max,
            },
            PropertyKind::Array { of, validation } => RuleKind::Array {
                min: validation.min,
                max: validation.max,
                items: Box::new(self.compile_node(of, &path.index(0))?),
            },
            PropertyKind::Map {
                properties,
                restrict_keys,
                ..
            } => RuleKind::Map {
                fields: properties
                    .iter()
                    .map(|(key, child)| {
                        self.compile_node(child, &path.key(key))
                            .map(|node| (key.clone(), node))
                    })
                    .collect::<Result<IndexMap<_, _>, _>>()?,
                restrict_keys: *restrict_keys,
            },
            PropertyKind::Reference { schema, .. } => RuleKind::Reference {
                target: self
                    .registry
                    .resolve_target(self.enclosing, schema)
                    .ok_or_else(|| CompileError::UnknownSchema(target_label(schema)))?,
            },
        };

        Ok(RuleNode {
            presence: property.presence().clone(),
            mutable: !property.disabled,
            constraints: property.constraints(),
            kind,
        })
    }
}

fn target_label(target: &SchemaTarget) -> String {
    String::from(target.clone())
}
