use anyhow::{Context, Result, bail};
use serde_json::Value;

use crate::{
    domain::{Entity, EntityValues, parse_entity_schemas, values_from_json},
    schema::SchemaRegistry,
};

use super::DocumentFormat;

/// Parse structured data in any supported format into a `serde_json::Value`.
pub fn parse_document_str(contents: &str, format: DocumentFormat) -> Result<Value> {
    match format {
        DocumentFormat::Json => {
            serde_json::from_str::<Value>(contents).with_context(|| "failed to parse JSON document")
        }
        #[cfg(feature = "yaml")]
        DocumentFormat::Yaml => {
            serde_yaml::from_str::<Value>(contents).with_context(|| "failed to parse YAML document")
        }
        #[cfg(feature = "toml")]
        DocumentFormat::Toml => contents
            .parse::<toml::Value>()
            .with_context(|| "failed to parse TOML document")
            .and_then(|value| {
                serde_json::to_value(value).context("failed to convert TOML to JSON")
            }),
    }
}

/// Parse a schema document (one schema or a `schemas` bundle) into a checked registry.
pub fn load_registry_str(contents: &str, format: DocumentFormat) -> Result<SchemaRegistry> {
    let document = parse_document_str(contents, format)?;
    parse_entity_schemas(&document).context("invalid schema document")
}

/// Parse a values document; the top level must be a map.
pub fn parse_values_str(contents: &str, format: DocumentFormat) -> Result<EntityValues> {
    let document = parse_document_str(contents, format)?;
    match values_from_json(document) {
        Some(values) => Ok(values),
        None => bail!("entity values must be a map of field names to values"),
    }
}

/// Parse an entity document: `{"id", "status", "values"}`.
pub fn parse_entity_str(contents: &str, format: DocumentFormat) -> Result<Entity> {
    let document = parse_document_str(contents, format)?;
    serde_json::from_value(document).context("invalid entity document")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::domain::EntityStatus;

    #[test]
    fn parse_json_documents() {
        let raw = "{\"enabled\":true}";
        let parsed = parse_document_str(raw, DocumentFormat::Json).unwrap();
        assert_eq!(parsed["enabled"], Value::Bool(true));
    }

    #[cfg(feature = "yaml")]
    #[test]
    fn parse_yaml_schema_documents() {
        let raw = "name: Product
properties:
  name:
    dataType: string
    validation:
      required: true
";
        let registry = load_registry_str(raw, DocumentFormat::Yaml).unwrap();
        let product = registry.by_name("Product").expect("schema registered");
        assert!(product.property("name").unwrap().presence().required);
    }

    #[cfg(feature = "toml")]
    #[test]
    fn parse_toml_documents() {
        let raw = "enabled = true\nname = \"dev\"";
        let parsed = parse_document_str(raw, DocumentFormat::Toml).unwrap();
        assert_eq!(parsed["enabled"], Value::Bool(true));
        assert_eq!(parsed["name"], json!("dev"));
    }

    #[test]
    fn values_must_be_a_map() {
        assert!(parse_values_str("[1, 2]", DocumentFormat::Json).is_err());
        let values = parse_values_str("{\"price\": 3}", DocumentFormat::Json).unwrap();
        assert_eq!(values["price"], json!(3));
    }

    #[test]
    fn parses_entity_documents() {
        let raw = r#"{"id": "p1", "status": "existing", "values": {"name": "Lamp"}}"#;
        let entity = parse_entity_str(raw, DocumentFormat::Json).unwrap();
        assert_eq!(entity.status, EntityStatus::Existing);
        assert_eq!(entity.id.as_deref(), Some("p1"));
    }
}
