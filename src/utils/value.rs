use serde_json::Value;

/// Convert a provider-supplied JSON scalar into a sanitized string.
///
/// Providers disagree on whether user ids are numbers or strings; both render
/// the same way here. Missing values (`null`) yield `None`.
pub fn value_to_string(value: &Value) -> Option<String> {
    let raw = match value {
        Value::Null => return None,
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    };
    let cleaned = sanitize_attribute_value(raw);
    if cleaned.trim().is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

fn sanitize_attribute_value(s: String) -> String {
    s.chars().filter(|c| !c.is_control()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numeric_and_string_ids_render_alike() {
        assert_eq!(value_to_string(&json!(42)), Some("42".to_string()));
        assert_eq!(value_to_string(&json!("42")), Some("42".to_string()));
    }

    #[test]
    fn test_null_and_blank_are_absent() {
        assert_eq!(value_to_string(&Value::Null), None);
        assert_eq!(value_to_string(&json!("\n")), None);
    }
}
