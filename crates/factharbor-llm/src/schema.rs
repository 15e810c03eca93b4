//! Lightweight JSON-schema validation used for schema-aware retry (§4.C.3).
//! Only the subset of JSON Schema the gateway actually needs: object
//! `required` and `properties[].type` checks, with a small set of
//! quality-critical string fields that participate in total-refusal
//! detection (§4.C.4).

use serde_json::Value;

#[derive(Debug, Clone, Default)]
pub struct ValidationOutcome {
    pub missing: Vec<String>,
    pub invalid_type: Vec<String>,
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        self.missing.is_empty() && self.invalid_type.is_empty()
    }

    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!("missing: {}", self.missing.join(", ")));
        }
        if !self.invalid_type.is_empty() {
            parts.push(format!("invalid type: {}", self.invalid_type.join(", ")));
        }
        parts.join("; ")
    }
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        _ => true,
    }
}

/// Validates `value` against `schema`'s `required` list and each declared
/// property's `type`. Missing required fields are filled with a safe
/// parse-time default per §4.C.2 rather than causing a hard failure; only
/// type mismatches on present fields count as an "invalid type" error.
pub fn validate_and_fill(schema: &Value, value: &mut Value) -> ValidationOutcome {
    let mut outcome = ValidationOutcome::default();
    let Some(obj) = value.as_object_mut() else {
        outcome.invalid_type.push("<root>".to_string());
        return outcome;
    };

    let required = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(Value::as_str).collect::<Vec<_>>())
        .unwrap_or_default();
    let properties = schema.get("properties").and_then(Value::as_object);

    for field in &required {
        if !obj.contains_key(*field) {
            outcome.missing.push(field.to_string());
            let default = properties
                .and_then(|p| p.get(*field))
                .and_then(|p| p.get("type"))
                .and_then(Value::as_str)
                .map(default_for_type)
                .unwrap_or(Value::Null);
            obj.insert(field.to_string(), default);
        }
    }

    if let Some(properties) = properties {
        for (name, prop_schema) in properties {
            let Some(present) = obj.get(name) else {
                continue;
            };
            if present.is_null() {
                continue;
            }
            if let Some(expected) = prop_schema.get("type").and_then(Value::as_str) {
                if !type_matches(expected, present) {
                    outcome.invalid_type.push(name.clone());
                }
            }
        }
    }

    outcome
}

fn default_for_type(ty: &str) -> Value {
    match ty {
        "string" => Value::String(String::new()),
        "number" | "integer" => Value::from(0),
        "boolean" => Value::Bool(false),
        "array" => Value::Array(Vec::new()),
        "object" => Value::Object(Default::default()),
        _ => Value::Null,
    }
}

/// A response counts as a total refusal when every quality-critical string
/// field named in `schema["x-quality-critical"]` is empty (§4.C.4). Schemas
/// that don't declare any quality-critical fields never trigger refusal
/// detection.
pub fn is_total_refusal(schema: &Value, value: &Value) -> bool {
    let Some(fields) = schema.get("x-quality-critical").and_then(Value::as_array) else {
        return false;
    };
    if fields.is_empty() {
        return false;
    }
    fields.iter().filter_map(Value::as_str).all(|field| {
        value
            .get(field)
            .and_then(Value::as_str)
            .map(|s| s.trim().is_empty())
            .unwrap_or(true)
    })
}
