mod defaults;
mod resolver;

use anyhow::{Result, bail};
use indexmap::IndexMap;

use crate::domain::{EntitySchema, SchemaTarget};

pub use defaults::init_entity_values;
pub use resolver::SchemaResolver;

/// Index of a schema inside a [`SchemaRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaId(usize);

impl SchemaId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Arena of entity schemas. References between schemas, including `"self"`,
/// are resolved by id lookup instead of copying the target tree.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: Vec<EntitySchema>,
    by_name: IndexMap<String, SchemaId>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry and checks that every named reference target exists.
    pub fn from_schemas(schemas: impl IntoIterator<Item = EntitySchema>) -> Result<Self> {
        let mut registry = Self::new();
        for schema in schemas {
            registry.register(schema)?;
        }
        registry.check_references()?;
        Ok(registry)
    }

    pub fn register(&mut self, schema: EntitySchema) -> Result<SchemaId> {
        if self.by_name.contains_key(&schema.name) {
            bail!("schema '{}' is registered twice", schema.name);
        }
        let id = SchemaId(self.schemas.len());
        self.by_name.insert(schema.name.clone(), id);
        self.schemas.push(schema);
        Ok(id)
    }

    pub fn get(&self, id: SchemaId) -> Option<&EntitySchema> {
        self.schemas.get(id.0)
    }

    pub fn id_of(&self, name: &str) -> Option<SchemaId> {
        self.by_name.get(name).copied()
    }

    pub fn by_name(&self, name: &str) -> Option<&EntitySchema> {
        self.id_of(name).and_then(|id| self.get(id))
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SchemaId, &EntitySchema)> {
        self.schemas
            .iter()
            .enumerate()
            .map(|(index, schema)| (SchemaId(index), schema))
    }

    pub fn resolver(&self, enclosing: SchemaId) -> SchemaResolver<'_> {
        SchemaResolver::new(self, enclosing)
    }

    /// Resolves a reference target seen from inside `enclosing`.
    pub fn resolve_target(&self, enclosing: SchemaId, target: &SchemaTarget) -> Option<SchemaId> {
        match target {
            SchemaTarget::SelfSchema => Some(enclosing),
            SchemaTarget::Named(name) => self.id_of(name),
        }
    }

    pub fn check_references(&self) -> Result<()> {
        for (id, _) in self.iter() {
            self.resolver(id).check_targets()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Property;

    #[test]
    fn self_targets_resolve_to_the_enclosing_schema() {
        let product = EntitySchema::new("Product").with_property(
            "related",
            Property::array(Property::reference("products", SchemaTarget::SelfSchema)),
        );
        let registry = SchemaRegistry::from_schemas([product]).expect("registry builds");
        let id = registry.id_of("Product").unwrap();
        assert_eq!(
            registry.resolve_target(id, &SchemaTarget::SelfSchema),
            Some(id)
        );
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = SchemaRegistry::from_schemas([EntitySchema::new("A"), EntitySchema::new("A")])
            .unwrap_err();
        assert!(err.to_string().contains("registered twice"));
    }
}
