use anyhow::{Context, Result, bail};
use serde_json::Value;

use crate::schema::SchemaRegistry;

use super::schema::EntitySchema;

/// Parse a single entity schema document.
pub fn parse_entity_schema(value: &Value) -> Result<EntitySchema> {
    let name = value
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or("<unnamed>")
        .to_string();
    serde_json::from_value(value.clone())
        .with_context(|| format!("schema '{name}' is not a valid entity schema"))
}

/// Parse either one schema or a `{"schemas": [...]}` bundle into a checked registry.
pub fn parse_entity_schemas(value: &Value) -> Result<SchemaRegistry> {
    let Some(object) = value.as_object() else {
        bail!("schema document must be an object");
    };
    let schemas = match object.get("schemas") {
        Some(Value::Array(items)) => items
            .iter()
            .map(parse_entity_schema)
            .collect::<Result<Vec<_>>>()?,
        Some(_) => bail!("'schemas' must be a list of entity schemas"),
        None => vec![parse_entity_schema(value)?],
    };
    SchemaRegistry::from_schemas(schemas)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_bundle_with_cross_references() {
        let doc = json!({
            "schemas": [
                {"name": "Product", "properties": {"name": {"dataType": "string"}}},
                {"name": "Blog", "properties": {
                    "products": {
                        "dataType": "array",
                        "of": {
                            "dataType": "reference",
                            "collectionPath": "products",
                            "schema": "Product"
                        }
                    }
                }}
            ]
        });
        let registry = parse_entity_schemas(&doc).expect("bundle parses");
        assert_eq!(registry.len(), 2);
        assert!(registry.id_of("Blog").is_some());
    }

    #[test]
    fn rejects_dangling_reference_targets() {
        let doc = json!({
            "name": "Blog",
            "properties": {
                "author": {"dataType": "reference", "collectionPath": "users", "schema": "User"}
            }
        });
        let err = parse_entity_schemas(&doc).unwrap_err();
        assert!(format!("{err:#}").contains("User"));
    }

    #[test]
    fn reports_schema_name_on_bad_property() {
        let doc = json!({"name": "Broken", "properties": {"x": {"dataType": "blob"}}});
        let err = parse_entity_schemas(&doc).unwrap_err();
        assert!(err.to_string().contains("Broken"));
    }
}
