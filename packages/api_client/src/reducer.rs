//! Deep merge of API responses.
//!
//! Data requests are split by table and schema, so the responses describe
//! disjoint parts of one namespace (`data.{geoid}.{table}...`,
//! `tables.{table}`, `geography.{geoid}`). Merging them is a union of
//! subtrees. Where two responses do share a non-object leaf, the later one
//! wins.

use serde_json::{Map, Value};

/// Deep-merges `responses` into one object.
///
/// Non-object responses are skipped with a warning.
#[must_use]
pub fn merge<I>(responses: I) -> Value
where
    I: IntoIterator<Item = Value>,
{
    let mut merged = Map::new();

    for response in responses {
        match response {
            Value::Object(object) => merge_into(&mut merged, object),
            other => log::warn!("Ignoring non-object response while merging: {other}"),
        }
    }

    Value::Object(merged)
}

fn merge_into(target: &mut Map<String, Value>, source: Map<String, Value>) {
    for (key, value) in source {
        match (target.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                merge_into(existing, incoming);
            }
            (_, value) => {
                target.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn chunks() -> (Value, Value, Value) {
        (
            json!({
                "tables": {"B01001": {"title": "Sex by Age"}},
                "data": {"05000US26163": {"B01001": {"estimate": {"B01001001": 1_774_816}}}},
            }),
            json!({
                "tables": {"B19013": {"title": "Median Household Income"}},
                "data": {"05000US26163": {"B19013": {"estimate": {"B19013001": 47_301}}}},
            }),
            json!({
                "data": {"04000US26": {"B01001": {"estimate": {"B01001001": 10_062_512}}}},
                "geography": {"04000US26": {"name": "Michigan"}},
            }),
        )
    }

    #[test]
    fn disjoint_merge_ignores_order() {
        let (a, b, c) = chunks();
        let forward = merge([a.clone(), b.clone(), c.clone()]);
        let rotated = merge([c, a, b]);

        assert_eq!(forward, rotated);
        assert_eq!(
            forward["data"]["05000US26163"]["B19013"]["estimate"]["B19013001"],
            47_301
        );
        assert_eq!(forward["tables"].as_object().unwrap().len(), 2);
    }

    #[test]
    fn colliding_leaf_takes_the_later_value() {
        let merged = merge([
            json!({"release": {"id": "acs2016_5yr"}, "keep": 1}),
            json!({"release": {"id": "acs2021_5yr"}}),
        ]);
        assert_eq!(merged, json!({"release": {"id": "acs2021_5yr"}, "keep": 1}));
    }

    #[test]
    fn object_replaces_scalar_and_back() {
        let merged = merge([json!({"a": 1}), json!({"a": {"b": 2}}), json!({"c": {"d": 1}}), json!({"c": 3})]);
        assert_eq!(merged, json!({"a": {"b": 2}, "c": 3}));
    }

    #[test]
    fn skips_non_objects() {
        assert_eq!(merge([json!([1, 2]), json!({"x": 1})]), json!({"x": 1}));
        assert_eq!(merge(Vec::new()), json!({}));
    }
}
