use serde_json::{Map, Value};

use crate::domain::{EntitySchema, EntityValues, Property, PropertyKind};

/// Initial values for a new entity: schema-level `defaultValues` first, then
/// per-property defaults, then an empty value for the property kind.
pub fn init_entity_values(schema: &EntitySchema) -> EntityValues {
    schema
        .properties
        .iter()
        .map(|(key, property)| {
            let seeded = schema.default_values.get(key);
            (key.clone(), initial_value(property, seeded))
        })
        .collect()
}

fn initial_value(property: &Property, seeded: Option<&Value>) -> Value {
    let fallback = seeded.or(property.default_value.as_ref());
    match &property.kind {
        PropertyKind::Map { properties, .. } => {
            let mut map = match fallback {
                Some(Value::Object(map)) => map.clone(),
                Some(other) => return other.clone(),
                None => Map::new(),
            };
            let declared_defaults = property.default_value.as_ref().and_then(Value::as_object);
            for (key, child) in properties {
                let child_seed = map
                    .get(key)
                    .cloned()
                    .or_else(|| declared_defaults.and_then(|defaults| defaults.get(key).cloned()));
                map.insert(key.clone(), initial_value(child, child_seed.as_ref()));
            }
            Value::Object(map)
        }
        PropertyKind::Array { .. } => fallback.cloned().unwrap_or_else(|| Value::Array(Vec::new())),
        _ => fallback.cloned().unwrap_or(Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn schema_defaults_merge_into_nested_maps() {
        let schema = EntitySchema::new("Product")
            .with_property("name", Property::string())
            .with_property("currency", Property::string())
            .with_property("tags", Property::array(Property::string()))
            .with_property(
                "publisher",
                Property::map([
                    ("name", Property::string()),
                    ("external_id", Property::string()),
                ]),
            )
            .with_property("available", Property::boolean().with_default(json!(true)))
            .with_default_value("currency", json!("EUR"))
            .with_default_value("publisher", json!({"name": "Default publisher"}));

        let values = init_entity_values(&schema);
        assert_eq!(
            Value::Object(values),
            json!({
                "name": null,
                "currency": "EUR",
                "tags": [],
                "publisher": {"name": "Default publisher", "external_id": null},
                "available": true
            })
        );
    }
}
