//! JSON body redaction and key removal

use serde_json::Value;
use tracing::debug;

use super::element::{any_matches, CensorElement};

/// Parse a body as a JSON object or array
///
/// Scalars and non-JSON text yield `None`.
fn parse_container(body: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(body) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => Some(value),
        Ok(_) => None,
        Err(e) => {
            debug!("Body is not JSON, leaving it untouched: {e}");
            None
        }
    }
}

/// Redact matching keys in a JSON body
///
/// Returns `None` when the body is not a JSON object or array.
pub(crate) fn censor_json(
    body: &str,
    censor_text: &str,
    elements: &[CensorElement],
) -> Option<String> {
    let mut value = parse_container(body)?;
    censor_value(&mut value, censor_text, elements);
    serde_json::to_string(&value).ok()
}

/// Drop matching keys from a JSON body, at any depth
///
/// Returns `None` when the body is not a JSON object or array.
pub(crate) fn remove_json_elements(body: &str, elements: &[CensorElement]) -> Option<String> {
    let mut value = parse_container(body)?;
    remove_elements(&mut value, elements);
    serde_json::to_string(&value).ok()
}

fn censor_value(value: &mut Value, censor_text: &str, elements: &[CensorElement]) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map.iter_mut() {
                if !any_matches(key, elements) {
                    censor_value(nested, censor_text, elements);
                    continue;
                }
                match nested {
                    Value::Null => {}
                    Value::Object(inner) => inner.clear(),
                    Value::Array(items) => items.clear(),
                    _ => *nested = Value::String(censor_text.to_owned()),
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                censor_value(item, censor_text, elements);
            }
        }
        _ => {}
    }
}

fn remove_elements(value: &mut Value, elements: &[CensorElement]) {
    match value {
        Value::Object(map) => {
            map.retain(|key, _| !any_matches(key, elements));
            for nested in map.values_mut() {
                remove_elements(nested, elements);
            }
        }
        Value::Array(items) => {
            for item in items {
                remove_elements(item, elements);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn keys(names: &[&str]) -> Vec<CensorElement> {
        names.iter().map(|n| CensorElement::new(*n, false)).collect()
    }

    fn censored(body: &Value, names: &[&str]) -> Value {
        let out = censor_json(&body.to_string(), "*****", &keys(names)).unwrap();
        serde_json::from_str(&out).unwrap()
    }

    #[test]
    fn test_scalar_replaced() {
        let body = json!({"password": "hunter2", "user": "alice"});
        assert_eq!(
            censored(&body, &["password"]),
            json!({"password": "*****", "user": "alice"})
        );
    }

    #[test]
    fn test_numbers_and_bools_replaced() {
        let body = json!({"pin": 1234, "flag": true});
        assert_eq!(
            censored(&body, &["pin", "flag"]),
            json!({"pin": "*****", "flag": "*****"})
        );
    }

    #[test]
    fn test_null_left_alone() {
        let body = json!({"token": null});
        assert_eq!(censored(&body, &["token"]), json!({"token": null}));
    }

    #[test]
    fn test_containers_emptied() {
        let body = json!({"secret": {"a": 1}, "keys": [1, 2, 3]});
        assert_eq!(
            censored(&body, &["secret", "keys"]),
            json!({"secret": {}, "keys": []})
        );
    }

    #[test]
    fn test_nested_objects_and_arrays() {
        let body = json!({
            "data": [
                {"card": {"number": "4242", "exp": "12/30"}},
                {"card": {"number": "5555"}}
            ]
        });
        assert_eq!(
            censored(&body, &["number"]),
            json!({
                "data": [
                    {"card": {"number": "*****", "exp": "12/30"}},
                    {"card": {"number": "*****"}}
                ]
            })
        );
    }

    #[test]
    fn test_top_level_array() {
        let body = json!([{"api_key": "abc"}, "plain", null]);
        assert_eq!(
            censored(&body, &["API_KEY"]),
            json!([{"api_key": "*****"}, "plain", null])
        );
    }

    #[test]
    fn test_non_json_passthrough() {
        assert_eq!(censor_json("name=value", "*****", &keys(&["name"])), None);
        assert_eq!(censor_json("\"just a string\"", "*****", &keys(&["x"])), None);
    }

    #[test]
    fn test_remove_elements_at_depth() {
        let body = json!({"id": 1, "meta": {"timestamp": 5, "nonce": "x"}, "list": [{"timestamp": 9}]});
        let out = remove_json_elements(&body.to_string(), &keys(&["timestamp"])).unwrap();
        let value: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value, json!({"id": 1, "meta": {"nonce": "x"}, "list": [{}]}));
    }

    #[test]
    fn test_key_order_kept() {
        let body = r#"{"zeta":1,"password":"x","alpha":{"nonce":2,"beta":3}}"#;
        assert_eq!(
            censor_json(body, "*****", &keys(&["password"])).as_deref(),
            Some(r#"{"zeta":1,"password":"*****","alpha":{"nonce":2,"beta":3}}"#)
        );
        assert_eq!(
            remove_json_elements(body, &keys(&["nonce"])).as_deref(),
            Some(r#"{"zeta":1,"password":"x","alpha":{"beta":3}}"#)
        );
    }
}
