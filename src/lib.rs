#![deny(rust_2018_idioms)]

pub mod app;
pub mod domain;
pub mod form;
pub mod io;
pub mod schema;
pub mod validation;

pub use app::{
    EntityForm, EntitySaver, SessionError, SessionEvent, SessionHandle, SessionOptions,
    SessionReport,
};
pub use domain::{
    CustomIdPolicy, DataType, Entity, EntitySchema, EntitySnapshot, EntityStatus, EntityValues,
    FieldConstraints, FieldInput, FieldPath, Property, PropertyConfig, PropertyKind, SchemaTarget,
    parse_entity_schema, parse_entity_schemas,
};
pub use form::{
    ConfigError, CustomIdAssigner, CustomIdState, FieldDescriptor, FieldOverrides, FormController,
    FormError, FormHooks, FormPhase, SaveError, SaveRequest, SubmitOutcome, SubmitRejected, Widget,
    reconcile, values_equal,
};
pub use io::{
    DocumentFormat, OutputDestination, OutputOptions, emit, load_registry_str,
    parse_document_str, parse_entity_str, parse_values_str,
};
pub use schema::{SchemaId, SchemaRegistry, init_entity_values};
pub use validation::{CompileError, FieldError, FieldValidator, Ruleset, RulesetCache};

pub mod prelude {
    pub use super::{
        Entity, EntityForm, EntitySaver, EntitySchema, EntityStatus, FieldOverrides, FormController,
        FormHooks, Property, SaveError, SaveRequest, SchemaRegistry, SessionOptions,
    };
}
