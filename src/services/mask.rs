//! Payload masking for log output.
//!
//! Upstream requests carry account credentials; anything that looks like a
//! secret is replaced before the payload reaches a tracing record.

use serde_json::Value;

const SENSITIVE_KEYS: &[&str] = &["hashed_password", "password", "credential", "token", "secret"];

const MASK: &str = "***";

fn is_sensitive(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    SENSITIVE_KEYS.iter().any(|k| lower.contains(k))
}

/// Return a copy of `value` with every sensitive field replaced by `"***"`,
/// recursing into nested objects and arrays.
pub fn mask_sensitive_data(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let masked = map
                .iter()
                .map(|(k, v)| {
                    if is_sensitive(k) {
                        (k.clone(), Value::String(MASK.to_string()))
                    } else {
                        (k.clone(), mask_sensitive_data(v))
                    }
                })
                .collect();
            Value::Object(masked)
        }
        Value::Array(items) => Value::Array(items.iter().map(mask_sensitive_data).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn masks_credentials_at_any_depth() {
        let payload = json!({
            "username": "shop",
            "hashed_password": "s3cr3t",
            "nested": {"items": [{"password": "x", "name": "ok"}]}
        });

        let masked = mask_sensitive_data(&payload);

        assert_eq!(masked["username"], "shop");
        assert_eq!(masked["hashed_password"], "***");
        assert_eq!(masked["nested"]["items"][0]["password"], "***");
        assert_eq!(masked["nested"]["items"][0]["name"], "ok");
    }

    #[test]
    fn leaves_non_objects_untouched() {
        assert_eq!(mask_sensitive_data(&json!(42)), json!(42));
        assert_eq!(mask_sensitive_data(&json!("text")), json!("text"));
    }
}
