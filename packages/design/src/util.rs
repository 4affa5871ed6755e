//! Key helpers.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

static NON_ALPHANUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").unwrap_or_else(|_| unreachable!()));

/// Turns a display title into a JSON key: `"Median Age (Years)"` becomes
/// `"median_age_years"`.
#[must_use]
pub fn make_snake(title: &str) -> String {
    let lowered = title.to_lowercase();
    NON_ALPHANUMERIC
        .replace_all(&lowered, "_")
        .trim_matches('_')
        .to_string()
}

/// Inserts `value` under `key`, warning when an earlier entry already
/// holds it. The later entry wins; the replaced value is returned.
pub fn insert_keyed(map: &mut Map<String, Value>, key: String, value: Value) -> Option<Value> {
    if map.contains_key(&key) {
        log::warn!("Duplicate key \"{key}\": a later entry replaces an earlier one");
    }
    map.insert(key, value)
}
