use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::{Map, Value};

use crate::domain::{FieldInput, FieldPath};

use super::{
    CustomValidators, RulesetCache,
    error::FieldError,
    rules::{EntityRules, NumberRule, RuleKind, RuleNode, StringRule},
};

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
});

pub(crate) struct Checker<'a> {
    cache: &'a RulesetCache,
    custom: &'a dyn CustomValidators,
    errors: Vec<FieldError>,
}

impl<'a> Checker<'a> {
    pub(crate) fn new(cache: &'a RulesetCache, custom: &'a dyn CustomValidators) -> Self {
        Self {
            cache,
            custom,
            errors: Vec::new(),
        }
    }

    pub(crate) fn finish(self) -> Vec<FieldError> {
        self.errors
    }

    pub(crate) fn check_entity(
        &mut self,
        rules: &EntityRules,
        values: &Map<String, Value>,
        path: &FieldPath,
    ) {
        for (key, node) in &rules.fields {
            self.check_node(node, values.get(key), &path.key(key));
        }
    }

    pub(crate) fn check_node(&mut self, node: &RuleNode, value: Option<&Value>, path: &FieldPath) {
        if !node.mutable {
            return;
        }
        let before = self.errors.len();
        self.check_builtin(node, value, path);
        if self.errors.len() > before {
            return;
        }
        if let Some(validator) = self.custom.validator_for(&path.pattern()) {
            let input = FieldInput::new(value, &node.constraints, path);
            if let Err(message) = validator.validate(&input) {
                self.push(path, message);
            }
        }
    }

    fn check_builtin(&mut self, node: &RuleNode, value: Option<&Value>, path: &FieldPath) {
        let Some(value) = value.filter(|value| !value.is_null()) else {
            if node.presence.required {
                self.required(node, path);
            }
            return;
        };

        match &node.kind {
            RuleKind::String(rule) => {
                let Some(text) = value.as_str() else {
                    self.push(path, "must be a string");
                    return;
                };
                if text.is_empty() && node.presence.required {
                    self.required(node, path);
                    return;
                }
                if let Some(message) = check_string(rule, text) {
                    self.push(path, message);
                }
            }
            RuleKind::Number(rule) => {
                let Some(number) = value.as_f64() else {
                    self.push(path, "must be a number");
                    return;
                };
                if let Some(message) = check_number(rule, number) {
                    self.push(path, message);
                }
            }
            RuleKind::Boolean => {
                if !value.is_boolean() {
                    self.push(path, "must be a boolean");
                }
            }
            RuleKind::Timestamp { min, max } => match parse_timestamp(value) {
                None => self.push(path, "must be a timestamp"),
                Some(instant) => {
                    if let Some(min) = min
                        && instant < *min
                    {
                        self.push(path, format!("must be on or after {}", min.to_rfc3339()));
                    } else if let Some(max) = max
                        && instant > *max
                    {
                        self.push(path, format!("must be on or before {}", max.to_rfc3339()));
                    }
                }
            },
            RuleKind::Array { min, max, items } => {
                let Some(elements) = value.as_array() else {
                    self.push(path, "must be a list");
                    return;
                };
                if elements.is_empty() && node.presence.required {
                    self.required(node, path);
                    return;
                }
                if let Some(min) = min
                    && elements.len() < *min
                {
                    self.push(path, format!("must have at least {min} items"));
                }
                if let Some(max) = max
                    && elements.len() > *max
                {
                    self.push(path, format!("must have at most {max} items"));
                }
                for (index, element) in elements.iter().enumerate() {
                    self.check_node(items, Some(element), &path.index(index));
                }
            }
            RuleKind::Map {
                fields,
                restrict_keys,
            } => {
                let Some(map) = value.as_object() else {
                    self.push(path, "must be a map");
                    return;
                };
                for (key, child) in fields {
                    self.check_node(child, map.get(key), &path.key(key));
                }
                if *restrict_keys {
                    for key in map.keys().filter(|key| !fields.contains_key(*key)) {
                        self.push(&path.key(key), "is not a declared field");
                    }
                }
            }
            RuleKind::Reference { target } => self.check_reference(*target, value, path),
        }
    }

    fn check_reference(
        &mut self,
        target: crate::schema::SchemaId,
        value: &Value,
        path: &FieldPath,
    ) {
        match value {
            Value::String(id) => {
                if id.trim().is_empty() {
                    self.push(path, "must reference an entity id");
                }
            }
            Value::Object(map) => {
                let has_id = map
                    .get("id")
                    .and_then(Value::as_str)
                    .is_some_and(|id| !id.trim().is_empty());
                if !has_id {
                    self.push(&path.key("id"), "reference id is required");
                }
                if let Some(collection) = map.get("path")
                    && !collection.is_string()
                {
                    self.push(&path.key("path"), "must be a collection path");
                }
                match map.get("values") {
                    None | Some(Value::Null) => {}
                    Some(Value::Object(embedded)) => match self.cache.rules(target) {
                        Ok(rules) => self.check_entity(&rules, embedded, &path.key("values")),
                        Err(err) => self.push(path, err.to_string()),
                    },
                    Some(_) => self.push(&path.key("values"), "must be a map"),
                }
            }
            _ => self.push(path, "must be a reference"),
        }
    }

    fn required(&mut self, node: &RuleNode, path: &FieldPath) {
        let message = node.presence.required_message.clone().unwrap_or_else(|| {
            format!("{} is a required field", path.leaf_name().unwrap_or("value"))
        });
        self.push(path, message);
    }

    fn push(&mut self, path: &FieldPath, message: impl Into<String>) {
        self.errors.push(FieldError::new(path.clone(), message));
    }
}

fn check_string(rule: &StringRule, text: &str) -> Option<String> {
    let length = text.chars().count();
    if let Some(exact) = rule.length
        && length != exact
    {
        return Some(format!("must be exactly {exact} characters"));
    }
    if let Some(min) = rule.min
        && length < min
    {
        return Some(format!("must be at least {min} characters"));
    }
    if let Some(max) = rule.max
        && length > max
    {
        return Some(format!("must be at most {max} characters"));
    }
    if let Some(pattern) = &rule.pattern
        && !pattern.is_match(text)
    {
        return Some(format!("must match the pattern {}", pattern.as_str()));
    }
    if rule.email && !EMAIL.is_match(text) {
        return Some("must be a valid email".to_string());
    }
    if rule.url && !is_url(text) {
        return Some("must be a valid URL".to_string());
    }
    if rule.lowercase && text.to_lowercase() != text {
        return Some("must be a lowercase string".to_string());
    }
    if rule.uppercase && text.to_uppercase() != text {
        return Some("must be an uppercase string".to_string());
    }
    if let Some(allowed) = &rule.allowed
        && !allowed.iter().any(|option| option == text)
    {
        return Some(format!("must be one of: {}", allowed.join(", ")));
    }
    None
}

fn check_number(rule: &NumberRule, number: f64) -> Option<String> {
    let bounds = &rule.bounds;
    if let Some(min) = bounds.min
        && number < min
    {
        return Some(format!("must be greater than or equal to {min}"));
    }
    if let Some(max) = bounds.max
        && number > max
    {
        return Some(format!("must be less than or equal to {max}"));
    }
    if let Some(limit) = bounds.less_than
        && number >= limit
    {
        return Some(format!("must be less than {limit}"));
    }
    if let Some(limit) = bounds.more_than
        && number <= limit
    {
        return Some(format!("must be greater than {limit}"));
    }
    if bounds.positive && number <= 0.0 {
        return Some("must be a positive number".to_string());
    }
    if bounds.negative && number >= 0.0 {
        return Some("must be a negative number".to_string());
    }
    if bounds.integer && number.fract() != 0.0 {
        return Some("must be an integer".to_string());
    }
    if let Some(allowed) = &rule.allowed
        && !allowed.iter().any(|option| *option == number)
    {
        let rendered: Vec<String> = allowed.iter().map(f64::to_string).collect();
        return Some(format!("must be one of: {}", rendered.join(", ")));
    }
    None
}

fn is_url(text: &str) -> bool {
    url::Url::parse(text).is_ok_and(|url| url.has_host())
}

/// Timestamps are RFC 3339 strings or epoch milliseconds.
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(raw) => DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|instant| instant.with_timezone(&Utc)),
        Value::Number(number) => number.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}
