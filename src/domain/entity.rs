use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field name -> value mapping. A missing key is not the same as an explicit `null`.
pub type EntityValues = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityStatus {
    New,
    Existing,
}

impl fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityStatus::New => f.write_str("new"),
            EntityStatus::Existing => f.write_str("existing"),
        }
    }
}

/// An entity as loaded from, or pushed by, the backing store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub values: EntityValues,
    pub status: EntityStatus,
}

impl Entity {
    pub fn existing(id: impl Into<String>, values: EntityValues) -> Self {
        Self {
            id: Some(id.into()),
            values,
            status: EntityStatus::Existing,
        }
    }

    pub fn new_entity(values: EntityValues) -> Self {
        Self {
            id: None,
            values,
            status: EntityStatus::New,
        }
    }

    pub fn has_id(&self) -> bool {
        self.id.as_deref().is_some_and(|id| !id.trim().is_empty())
    }
}

/// Live-data push for the entity under edit.
pub type EntitySnapshot = Entity;

/// Converts a JSON document into entity values; anything but an object is rejected.
pub fn values_from_json(value: Value) -> Option<EntityValues> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}
