use indexmap::IndexSet;
use serde::Serialize;
use serde_json::{Number, Value};

use crate::domain::{EntitySchema, EntityValues};

/// Result of merging a live snapshot into the local values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reconciliation {
    pub values: EntityValues,
    /// Keys whose live value was adopted; they stay untouched.
    pub untouched: Vec<String>,
    /// Keys changed upstream while the user was editing them; the local value was kept.
    pub conflicts: Vec<String>,
}

impl Reconciliation {
    pub fn changed(&self) -> bool {
        !self.untouched.is_empty()
    }
}

/// Structural equality where numbers compare by value (`1 == 1.0`).
/// `null`, an empty list and an empty map are all distinct.
pub fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => numbers_equal(a, b),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(a, b)| values_equal(a, b))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter().all(|(key, value)| {
                    b.get(key)
                        .is_some_and(|other| values_equal(value, other))
                })
        }
        _ => left == right,
    }
}

/// Integers compare exactly; a float on either side compares as `f64`.
fn numbers_equal(a: &Number, b: &Number) -> bool {
    if a.is_f64() || b.is_f64() {
        return matches!((a.as_f64(), b.as_f64()), (Some(a), Some(b)) if a == b);
    }
    match (a.as_i64(), b.as_i64()) {
        (Some(a), Some(b)) => a == b,
        _ => a.as_u64().is_some() && a.as_u64() == b.as_u64(),
    }
}

/// Absent and present are different states, so `None` only equals `None`.
pub fn slots_equal(left: Option<&Value>, right: Option<&Value>) -> bool {
    match (left, right) {
        (Some(a), Some(b)) => values_equal(a, b),
        (None, None) => true,
        _ => false,
    }
}

/// Three-way merge of `live` into `local` for every key declared by `schema`.
///
/// A key that changed between `baseline` and `live` is adopted when untouched
/// (absent live values become `null`) and kept when touched. Keys the schema
/// does not declare are left alone.
pub fn reconcile(
    schema: &EntitySchema,
    baseline: &EntityValues,
    live: &EntityValues,
    local: &EntityValues,
    touched: &IndexSet<String>,
) -> Reconciliation {
    let mut values = local.clone();
    let mut untouched = Vec::new();
    let mut conflicts = Vec::new();

    for key in schema.properties.keys() {
        if slots_equal(baseline.get(key), live.get(key)) {
            continue;
        }
        if touched.contains(key) {
            conflicts.push(key.clone());
            continue;
        }
        let adopted = live.get(key).cloned().unwrap_or(Value::Null);
        values.insert(key.clone(), adopted);
        untouched.push(key.clone());
    }

    Reconciliation {
        values,
        untouched,
        conflicts,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::domain::Property;

    fn schema() -> EntitySchema {
        EntitySchema::new("Product")
            .with_property("name", Property::string())
            .with_property("price", Property::number())
            .with_property("available", Property::boolean())
            .with_property("tags", Property::array(Property::string()))
    }

    fn values(value: Value) -> EntityValues {
        value.as_object().cloned().expect("object")
    }

    fn touched(keys: &[&str]) -> IndexSet<String> {
        keys.iter().map(|key| key.to_string()).collect()
    }

    #[test]
    fn numbers_compare_by_value_but_null_is_not_empty() {
        assert!(values_equal(&json!(1), &json!(1.0)));
        assert!(values_equal(&json!({"a": [1, {"b": 2}]}), &json!({"a": [1.0, {"b": 2}]})));
        assert!(!values_equal(&json!(null), &json!([])));
        assert!(!values_equal(&json!([]), &json!({})));
        assert!(!slots_equal(None, Some(&json!(null))));
    }

    #[test]
    fn large_integers_compare_exactly() {
        assert!(!values_equal(&json!(9007199254740992_u64), &json!(9007199254740993_u64)));
        assert!(!values_equal(&json!(-9007199254740992_i64), &json!(-9007199254740993_i64)));
        assert!(values_equal(&json!(u64::MAX), &json!(u64::MAX)));
        assert!(!values_equal(&json!(-1), &json!(u64::MAX)));

        let schema = EntitySchema::new("Counter").with_property("n", Property::number());
        let baseline = values(json!({"n": 9007199254740992_u64}));
        let live = values(json!({"n": 9007199254740993_u64}));
        let merged = reconcile(&schema, &baseline, &live, &baseline, &IndexSet::new());
        assert_eq!(merged.values["n"], json!(9007199254740993_u64));
        assert_eq!(merged.untouched, vec!["n".to_string()]);
    }

    #[test]
    fn touched_keys_win_and_untouched_keys_follow_live() {
        let baseline = values(json!({"name": "Lamp", "price": 10, "available": true}));
        let local = values(json!({"name": "Lamp", "price": 15, "available": true}));
        let live = values(json!({"name": "Lamp", "price": 12, "available": false}));

        let merged = reconcile(&schema(), &baseline, &live, &local, &touched(&["price"]));
        assert_eq!(merged.values["price"], json!(15));
        assert_eq!(merged.values["available"], json!(false));
        assert_eq!(merged.untouched, vec!["available".to_string()]);
        assert_eq!(merged.conflicts, vec!["price".to_string()]);
    }

    #[test]
    fn absent_live_value_becomes_null() {
        let baseline = values(json!({"name": "Lamp"}));
        let live = values(json!({}));
        let merged = reconcile(&schema(), &baseline, &live, &baseline, &IndexSet::new());
        assert_eq!(merged.values.get("name"), Some(&Value::Null));
    }

    #[test]
    fn undeclared_snapshot_keys_are_ignored() {
        let baseline = values(json!({"name": "Lamp"}));
        let live = values(json!({"name": "Lamp", "internal": 1}));
        let merged = reconcile(&schema(), &baseline, &live, &baseline, &IndexSet::new());
        assert!(!merged.values.contains_key("internal"));
        assert!(!merged.changed());
    }

    #[test]
    fn reconciling_twice_is_a_no_op() {
        let baseline = values(json!({"name": "Lamp", "tags": []}));
        let local = values(json!({"name": "Desk lamp", "tags": []}));
        let live = values(json!({"name": "Lamp", "tags": ["new"]}));
        let keys = touched(&["name"]);

        let first = reconcile(&schema(), &baseline, &live, &local, &keys);
        let second = reconcile(&schema(), &live, &live, &first.values, &keys);
        assert_eq!(second.values, first.values);
        assert!(second.untouched.is_empty());
    }
}
