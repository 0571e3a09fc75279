//! Schema-shaped validation rules.
//!
//! A [`Ruleset`] is compiled once per schema and cached in a [`RulesetCache`].
//! Reference nodes compile to a deferred lookup of the target schema, so a
//! schema that references itself compiles in one pass and is only walked as
//! deep as the values being checked.

mod check;
mod error;
mod rules;

use std::sync::{Arc, OnceLock};

use serde_json::Value;
use tracing::debug;

use crate::{
    domain::{EntityValues, FieldInput, FieldPath},
    schema::{SchemaId, SchemaRegistry},
};

pub use error::{CompileError, FieldError};

use check::Checker;
use rules::{EntityRules, compile_entity};

/// A user-supplied check run after the built-in constraints of a field pass.
pub trait FieldValidator: Send + Sync {
    fn validate(&self, input: &FieldInput<'_>) -> Result<(), String>;
}

impl<F> FieldValidator for F
where
    F: Fn(&FieldInput<'_>) -> Result<(), String> + Send + Sync,
{
    fn validate(&self, input: &FieldInput<'_>) -> Result<(), String> {
        self(input)
    }
}

/// Lookup of custom validators by path pattern (`/images/*`).
pub trait CustomValidators {
    fn validator_for(&self, pattern: &str) -> Option<&dyn FieldValidator>;
}

impl CustomValidators for () {
    fn validator_for(&self, _pattern: &str) -> Option<&dyn FieldValidator> {
        None
    }
}

/// Per-registry cache of compiled rules; each schema compiles at most once.
#[derive(Debug)]
pub struct RulesetCache {
    registry: Arc<SchemaRegistry>,
    slots: Vec<OnceLock<Result<Arc<EntityRules>, CompileError>>>,
}

impl RulesetCache {
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        let slots = (0..registry.len()).map(|_| OnceLock::new()).collect();
        Self { registry, slots }
    }

    pub fn ruleset(self: &Arc<Self>, id: SchemaId) -> Result<Ruleset, CompileError> {
        let rules = self.rules(id)?;
        Ok(Ruleset {
            cache: Arc::clone(self),
            root: id,
            rules,
        })
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    /// Number of schemas compiled so far.
    pub fn compiled_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.get().is_some()).count()
    }

    pub(crate) fn rules(&self, id: SchemaId) -> Result<Arc<EntityRules>, CompileError> {
        let slot = self
            .slots
            .get(id.index())
            .ok_or_else(|| CompileError::UnknownSchema(format!("#{}", id.index())))?;
        slot.get_or_init(|| {
            debug!(schema = id.index(), "compiling validation rules");
            compile_entity(&self.registry, id).map(Arc::new)
        })
        .clone()
    }
}

/// Compiled validation rules for one entity schema.
#[derive(Debug, Clone)]
pub struct Ruleset {
    cache: Arc<RulesetCache>,
    root: SchemaId,
    rules: Arc<EntityRules>,
}

impl Ruleset {
    pub fn compile(registry: Arc<SchemaRegistry>, id: SchemaId) -> Result<Self, CompileError> {
        Arc::new(RulesetCache::new(registry)).ruleset(id)
    }

    pub fn schema_id(&self) -> SchemaId {
        self.root
    }

    pub fn cache(&self) -> &Arc<RulesetCache> {
        &self.cache
    }

    /// Number of rule nodes for the root schema; references count once.
    pub fn node_count(&self) -> usize {
        self.rules.node_count()
    }

    pub fn validate(&self, values: &EntityValues) -> Vec<FieldError> {
        self.validate_with(values, &())
    }

    pub fn validate_with(
        &self,
        values: &EntityValues,
        custom: &dyn CustomValidators,
    ) -> Vec<FieldError> {
        let mut checker = Checker::new(&self.cache, custom);
        checker.check_entity(&self.rules, values, &FieldPath::root());
        checker.finish()
    }

    /// Checks a single top-level field in isolation.
    pub fn validate_field(
        &self,
        key: &str,
        value: Option<&Value>,
        custom: &dyn CustomValidators,
    ) -> Vec<FieldError> {
        let Some(node) = self.rules.fields.get(key) else {
            return Vec::new();
        };
        let mut checker = Checker::new(&self.cache, custom);
        checker.check_node(node, value, &FieldPath::field(key));
        checker.finish()
    }

    pub fn is_valid(&self, values: &EntityValues) -> bool {
        self.validate(values).is_empty()
    }
}
