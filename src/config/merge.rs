//! Field-by-field overlay of configuration tiers.

use serde_json::Value;

/// Overlay `tier` onto `target` in place.
///
/// Tables are merged key by key. A null in the tier leaves the target alone,
/// so a YAML key with no value does not reset a lower tier. Any other value
/// replaces what was there.
///
/// # Example
/// ```
/// use serde_json::json;
/// use task_tree::config::overlay;
///
/// let mut config = json!({ "server": { "port": 5000, "host": "127.0.0.1" } });
/// overlay(&mut config, json!({ "server": { "port": 8080 } }));
/// assert_eq!(config, json!({ "server": { "port": 8080, "host": "127.0.0.1" } }));
/// ```
pub fn overlay(target: &mut Value, tier: Value) {
    match (target, tier) {
        (_, Value::Null) => {}
        (Value::Object(table), Value::Object(entries)) => {
            for (key, value) in entries {
                match table.get_mut(&key) {
                    Some(existing) => overlay(existing, value),
                    None if value.is_null() => {}
                    None => {
                        table.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Fold tiers from lowest to highest priority into one value.
pub fn merge_tiers(tiers: impl IntoIterator<Item = Value>) -> Value {
    tiers.into_iter().fold(Value::Null, |mut merged, tier| {
        overlay(&mut merged, tier);
        merged
    })
}
