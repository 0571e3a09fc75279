use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use super::entity::EntityValues;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Location of a value inside an entity, rendered as a JSON pointer (`/publisher/name`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<PathSegment>,
}

impl FieldPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn field(key: impl Into<String>) -> Self {
        Self {
            segments: vec![PathSegment::Key(key.into())],
        }
    }

    /// Parses a pointer; canonical numeric segments become array indices.
    pub fn parse(pointer: &str) -> Self {
        let trimmed = pointer.strip_prefix('/').unwrap_or(pointer);
        if trimmed.is_empty() {
            return Self::root();
        }
        let segments = trimmed
            .split('/')
            .map(|raw| {
                let decoded = raw.replace("~1", "/").replace("~0", "~");
                match decoded.parse::<usize>() {
                    Ok(index) if index.to_string() == decoded => PathSegment::Index(index),
                    _ => PathSegment::Key(decoded),
                }
            })
            .collect();
        Self { segments }
    }

    pub fn key(&self, key: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.segments.push(PathSegment::Key(key.into()));
        next
    }

    pub fn index(&self, index: usize) -> Self {
        let mut next = self.clone();
        next.segments.push(PathSegment::Index(index));
        next
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// The top-level field this path belongs to; touched-tracking happens at this level.
    pub fn top_level(&self) -> Option<&str> {
        match self.segments.first() {
            Some(PathSegment::Key(key)) => Some(key),
            _ => None,
        }
    }

    /// Last key segment, used as a label fallback.
    pub fn leaf_name(&self) -> Option<&str> {
        self.segments.iter().rev().find_map(|segment| match segment {
            PathSegment::Key(key) => Some(key.as_str()),
            PathSegment::Index(_) => None,
        })
    }

    pub fn pointer(&self) -> String {
        self.render(|segment| match segment {
            PathSegment::Key(key) => escape(key),
            PathSegment::Index(index) => index.to_string(),
        })
    }

    /// Pointer with every array index replaced by `*`; overrides are registered against it.
    pub fn pattern(&self) -> String {
        self.render(|segment| match segment {
            PathSegment::Key(key) => escape(key),
            PathSegment::Index(_) => "*".to_string(),
        })
    }

    pub fn lookup<'a>(&self, values: &'a EntityValues) -> Option<&'a Value> {
        let (first, rest) = self.segments.split_first()?;
        let PathSegment::Key(key) = first else {
            return None;
        };
        let mut current = values.get(key)?;
        for segment in rest {
            current = match (segment, current) {
                (PathSegment::Key(key), Value::Object(map)) => map.get(key)?,
                (PathSegment::Index(index), Value::Array(items)) => items.get(*index)?,
                (PathSegment::Index(index), Value::Object(map)) => map.get(&index.to_string())?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Writes `value` at this path, creating intermediate maps for missing keys.
    pub fn assign(&self, values: &mut EntityValues, value: Value) -> Result<(), String> {
        let Some((first, rest)) = self.segments.split_first() else {
            return Err("cannot assign to the entity root".to_string());
        };
        let PathSegment::Key(key) = first else {
            return Err("entity fields are addressed by name".to_string());
        };
        if rest.is_empty() {
            values.insert(key.clone(), value);
            return Ok(());
        }
        let slot = values
            .entry(key.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        assign_into(slot, rest, value)
    }

    fn render(&self, encode: impl Fn(&PathSegment) -> String) -> String {
        self.segments
            .iter()
            .fold(String::new(), |mut acc, segment| {
                acc.push('/');
                acc.push_str(&encode(segment));
                acc
            })
    }
}

fn assign_into(slot: &mut Value, path: &[PathSegment], value: Value) -> Result<(), String> {
    let Some((segment, rest)) = path.split_first() else {
        *slot = value;
        return Ok(());
    };
    if slot.is_null() {
        *slot = match segment {
            PathSegment::Key(_) => Value::Object(Map::new()),
            PathSegment::Index(_) => Value::Array(Vec::new()),
        };
    }
    match (segment, slot) {
        (PathSegment::Key(key), Value::Object(map)) => {
            let next = map.entry(key.clone()).or_insert(Value::Null);
            assign_into(next, rest, value)
        }
        (PathSegment::Index(index), Value::Array(items)) => {
            if *index > items.len() {
                return Err(format!(
                    "index {index} is past the end of a list of {}",
                    items.len()
                ));
            }
            if *index == items.len() {
                items.push(Value::Null);
            }
            assign_into(&mut items[*index], rest, value)
        }
        // Numeric segments parse as indices but may name a map key.
        (PathSegment::Index(index), Value::Object(map)) => {
            let next = map.entry(index.to_string()).or_insert(Value::Null);
            assign_into(next, rest, value)
        }
        (PathSegment::Key(key), other) => Err(format!(
            "cannot set key '{key}' inside a {}",
            kind_name(other)
        )),
        (PathSegment::Index(index), other) => Err(format!(
            "cannot set index {index} inside a {}",
            kind_name(other)
        )),
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}

fn escape(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pointer())
    }
}

impl Serialize for FieldPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.pointer())
    }
}

impl From<&str> for FieldPath {
    fn from(value: &str) -> Self {
        FieldPath::parse(value)
    }
}
