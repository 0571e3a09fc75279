mod entity;
mod input;
mod parser;
mod path;
mod schema;

pub use entity::{Entity, EntitySnapshot, EntityStatus, EntityValues, values_from_json};
pub use input::FieldInput;
pub use parser::{parse_entity_schema, parse_entity_schemas};
pub use path::{FieldPath, PathSegment};
pub use schema::{
    ArrayValidation, CustomIdPolicy, DataType, EntitySchema, EnumValues, FieldConstraints,
    NumberValidation, Presence, Property, PropertyConfig, PropertyKind, SchemaTarget,
    StringFormat, StringValidation, TimestampValidation,
};
