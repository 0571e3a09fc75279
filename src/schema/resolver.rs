use anyhow::{Context, Result, bail};

use crate::domain::{EntitySchema, Property, PropertyKind, SchemaTarget};

use super::{SchemaId, SchemaRegistry};

/// Walks the property tree of one schema, following reference targets through the registry.
#[derive(Debug, Clone, Copy)]
pub struct SchemaResolver<'a> {
    registry: &'a SchemaRegistry,
    enclosing: SchemaId,
}

impl<'a> SchemaResolver<'a> {
    pub fn new(registry: &'a SchemaRegistry, enclosing: SchemaId) -> Self {
        Self {
            registry,
            enclosing,
        }
    }

    pub fn schema(&self) -> Option<&'a EntitySchema> {
        self.registry.get(self.enclosing)
    }

    /// Follows a reference target; the result is a resolver scoped to the target schema.
    pub fn follow(&self, target: &SchemaTarget) -> Result<SchemaResolver<'a>> {
        let id = self
            .registry
            .resolve_target(self.enclosing, target)
            .with_context(|| {
                format!("reference target '{}' is not registered", target_name(target))
            })?;
        Ok(SchemaResolver::new(self.registry, id))
    }

    pub fn enclosing(&self) -> SchemaId {
        self.enclosing
    }

    pub fn check_targets(&self) -> Result<()> {
        let Some(schema) = self.schema() else {
            bail!("schema id {} is not registered", self.enclosing.index());
        };
        for (key, property) in &schema.properties {
            self.check_property(property)
                .with_context(|| format!("in property '{}.{key}'", schema.name))?;
        }
        Ok(())
    }

    fn check_property(&self, property: &Property) -> Result<()> {
        match &property.kind {
            PropertyKind::Array { of, .. } => self.check_property(of),
            PropertyKind::Map { properties, .. } => {
                for (key, child) in properties {
                    self.check_property(child)
                        .with_context(|| format!("in map key '{key}'"))?;
                }
                Ok(())
            }
            PropertyKind::Reference { schema, .. } => self.follow(schema).map(|_| ()),
            _ => Ok(()),
        }
    }
}

fn target_name(target: &SchemaTarget) -> &str {
    match target {
        SchemaTarget::SelfSchema => "self",
        SchemaTarget::Named(name) => name,
    }
}
