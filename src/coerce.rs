//! Schema-guided validation of untrusted JSON.
//!
//! Walks a `serde_json::Value` alongside the schemars schema of the target
//! type, reporting the first missing or mistyped field by its JSON path and
//! coercing the lenient forms models tend to emit (numeric strings, floats
//! with a zero fraction in integer fields, enum tags in the wrong case).

use crate::error::{ConceptaError, Result};
use schemars::JsonSchema;
use serde_json::{Map, Number, Value};

pub struct SchemaValidator {
    root: Value,
    definitions: Map<String, Value>,
}

impl SchemaValidator {
    pub fn for_type<T: JsonSchema>() -> Result<Self> {
        let mut root = serde_json::to_value(schemars::schema_for!(T))?;
        let definitions = root
            .as_object_mut()
            .and_then(|o| o.remove("definitions"))
            .and_then(|d| match d {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .unwrap_or_default();
        Ok(Self { root, definitions })
    }

    pub fn validate(&self, value: &mut Value) -> Result<()> {
        self.walk(&self.root, value, "$")
    }

    fn resolve<'a>(&'a self, mut schema: &'a Value) -> &'a Value {
        loop {
            if let Some(name) = schema
                .get("$ref")
                .and_then(Value::as_str)
                .and_then(|r| r.strip_prefix("#/definitions/"))
            {
                match self.definitions.get(name) {
                    Some(target) => {
                        schema = target;
                        continue;
                    }
                    None => return schema,
                }
            }
            match schema.get("allOf").and_then(Value::as_array) {
                Some(all) if all.len() == 1 => schema = &all[0],
                _ => return schema,
            }
        }
    }

    fn walk(&self, schema: &Value, value: &mut Value, path: &str) -> Result<()> {
        let schema = self.resolve(schema);

        let branches = schema
            .get("anyOf")
            .or_else(|| schema.get("oneOf"))
            .and_then(Value::as_array);
        if let Some(branches) = branches {
            return self.walk_branches(branches, value, path);
        }

        let types = schema_types(schema);
        if types.is_empty() {
            return Ok(());
        }

        if value.is_null() {
            return if types.contains(&"null") {
                Ok(())
            } else {
                Err(ConceptaError::validation(path, "value must not be null"))
            };
        }

        let primary = types.iter().copied().find(|t| *t != "null").unwrap_or("null");
        match primary {
            "integer" => {
                coerce_integer(value, path)?;
                check_minimum(schema, value, path)
            }
            "number" => {
                coerce_number(value, path)?;
                check_minimum(schema, value, path)
            }
            "string" => coerce_string(schema, value, path),
            "boolean" => coerce_boolean(value, path),
            "array" => self.walk_array(schema, value, path),
            "object" => self.walk_object(schema, value, path),
            _ => Ok(()),
        }
    }

    fn walk_branches(&self, branches: &[Value], value: &mut Value, path: &str) -> Result<()> {
        let is_null_branch = |b: &Value| {
            let b = self.resolve(b);
            let types = schema_types(b);
            types.len() == 1 && types[0] == "null"
        };

        if value.is_null() && branches.iter().any(is_null_branch) {
            return Ok(());
        }

        let mut first_error = None;
        for branch in branches.iter().filter(|b| !is_null_branch(*b)) {
            let mut candidate = value.clone();
            match self.walk(branch, &mut candidate, path) {
                Ok(()) => {
                    *value = candidate;
                    return Ok(());
                }
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn walk_array(&self, schema: &Value, value: &mut Value, path: &str) -> Result<()> {
        let found = type_name(value);
        let Value::Array(items) = value else {
            return Err(ConceptaError::validation(
                path,
                format!("expected an array, found {}", found),
            ));
        };
        if let Some(item_schema) = schema.get("items") {
            for (i, item) in items.iter_mut().enumerate() {
                self.walk(item_schema, item, &format!("{}[{}]", path, i))?;
            }
        }
        Ok(())
    }

    fn walk_object(&self, schema: &Value, value: &mut Value, path: &str) -> Result<()> {
        let found = type_name(value);
        let Value::Object(fields) = value else {
            return Err(ConceptaError::validation(
                path,
                format!("expected an object, found {}", found),
            ));
        };

        if let Some(required) = schema.get("required").and_then(Value::as_array) {
            for key in required.iter().filter_map(Value::as_str) {
                if !fields.contains_key(key) {
                    return Err(ConceptaError::validation(
                        format!("{}.{}", path, key),
                        "missing required field",
                    ));
                }
            }
        }

        let properties = schema.get("properties").and_then(Value::as_object);
        let additional = schema
            .get("additionalProperties")
            .filter(|a| a.is_object());

        for (key, field) in fields.iter_mut() {
            let field_schema = properties.and_then(|p| p.get(key)).or(additional);
            if let Some(field_schema) = field_schema {
                self.walk(field_schema, field, &format!("{}.{}", path, key))?;
            }
        }
        Ok(())
    }
}

fn schema_types(schema: &Value) -> Vec<&str> {
    match schema.get("type") {
        Some(Value::String(t)) => vec![t.as_str()],
        Some(Value::Array(ts)) => ts.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Parses `"75"`, `" 52.5 "`, `"14,700"` and `"35%"`. Rejects words and non-finite values.
pub fn parse_numeric(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_suffix('%').unwrap_or(trimmed).trim_end();
    if trimmed.is_empty() {
        return None;
    }
    let normalized = strip_thousands(trimmed)?;
    let parsed: f64 = normalized.parse().ok()?;
    parsed.is_finite().then_some(parsed)
}

/// Removes `,` group separators only when every group after the first has three digits.
fn strip_thousands(s: &str) -> Option<String> {
    if !s.contains(',') {
        return Some(s.to_string());
    }
    let mut groups = s.split(',');
    let head = groups.next()?;
    let head_digits = head.trim_start_matches(['-', '+']);
    if head_digits.is_empty()
        || head_digits.len() > 3
        || !head_digits.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }

    let mut out = head.to_string();
    let rest: Vec<&str> = groups.collect();
    for (i, group) in rest.iter().enumerate() {
        let (digits, tail) = if i + 1 == rest.len() {
            group.split_once('.').map_or((*group, None), |(d, f)| (d, Some(f)))
        } else {
            (*group, None)
        };
        if digits.len() != 3 || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        out.push_str(digits);
        if let Some(fraction) = tail {
            out.push('.');
            out.push_str(fraction);
        }
    }
    Some(out)
}

fn number_from_f64(n: f64) -> Option<Number> {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        Some(Number::from(n as i64))
    } else {
        Number::from_f64(n)
    }
}

fn coerce_number(value: &mut Value, path: &str) -> Result<()> {
    match value {
        Value::Number(_) => Ok(()),
        Value::String(s) => {
            let parsed = parse_numeric(s)
                .and_then(number_from_f64)
                .ok_or_else(|| {
                    ConceptaError::validation(path, format!("expected a number, found \"{}\"", s))
                })?;
            *value = Value::Number(parsed);
            Ok(())
        }
        other => Err(ConceptaError::validation(
            path,
            format!("expected a number, found {}", type_name(other)),
        )),
    }
}

fn coerce_integer(value: &mut Value, path: &str) -> Result<()> {
    coerce_number(value, path).map_err(|_| {
        ConceptaError::validation(
            path,
            format!("expected an integer, found {}", describe(value)),
        )
    })?;

    let Value::Number(n) = value else {
        return Ok(());
    };
    if n.is_i64() || n.is_u64() {
        return Ok(());
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => {
            *value = Value::Number(Number::from(f as i64));
            Ok(())
        }
        _ => Err(ConceptaError::validation(
            path,
            format!("expected an integer, found {}", n),
        )),
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", s),
        other => type_name(other).to_string(),
    }
}

fn check_minimum(schema: &Value, value: &Value, path: &str) -> Result<()> {
    let (Some(min), Some(actual)) = (
        schema.get("minimum").and_then(Value::as_f64),
        value.as_f64(),
    ) else {
        return Ok(());
    };
    if actual < min {
        return Err(ConceptaError::validation(
            path,
            format!("must be at least {}, found {}", min, actual),
        ));
    }
    Ok(())
}

fn coerce_string(schema: &Value, value: &mut Value, path: &str) -> Result<()> {
    match value {
        Value::String(_) => {}
        Value::Number(n) => *value = Value::String(n.to_string()),
        other => {
            return Err(ConceptaError::validation(
                path,
                format!("expected a string, found {}", type_name(other)),
            ))
        }
    }

    let Some(allowed) = schema.get("enum").and_then(Value::as_array) else {
        return Ok(());
    };
    let current = value.as_str().unwrap_or_default().trim().to_string();
    let matched = allowed
        .iter()
        .filter_map(Value::as_str)
        .find(|a| a.eq_ignore_ascii_case(&current))
        .map(str::to_string);
    match matched {
        Some(tag) => {
            *value = Value::String(tag);
            Ok(())
        }
        None => {
            let options: Vec<&str> = allowed.iter().filter_map(Value::as_str).collect();
            Err(ConceptaError::validation(
                path,
                format!("\"{}\" is not one of [{}]", current, options.join(", ")),
            ))
        }
    }
}

fn coerce_boolean(value: &mut Value, path: &str) -> Result<()> {
    let coerced = match &*value {
        Value::Bool(_) => return Ok(()),
        Value::String(s) if s.trim().eq_ignore_ascii_case("true") => true,
        Value::String(s) if s.trim().eq_ignore_ascii_case("false") => false,
        other => {
            return Err(ConceptaError::validation(
                path,
                format!("expected a boolean, found {}", describe(other)),
            ))
        }
    };
    *value = Value::Bool(coerced);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FloorPlan, FloorType, ParcelRights};
    use serde_json::json;

    fn rights_json() -> Value {
        json!({
            "parcel": {"gush": "6666", "helka": "102", "area_net_sqm": 4006},
            "rights": {
                "max_units": 150,
                "main_area_sqm": 14700,
                "floors_max": 17,
                "height_max_m": 75
            }
        })
    }

    fn validate<T: JsonSchema>(value: &mut Value) -> Result<()> {
        SchemaValidator::for_type::<T>().unwrap().validate(value)
    }

    fn validation_path(err: ConceptaError) -> String {
        match err {
            ConceptaError::Validation { path, .. } => path,
            other => panic!("expected a validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_numeric_string_is_coerced() {
        let mut value = rights_json();
        value["rights"]["height_max_m"] = json!("75");
        value["rights"]["main_area_sqm"] = json!("14,700");
        validate::<ParcelRights>(&mut value).unwrap();
        assert_eq!(value["rights"]["height_max_m"], json!(75));
        assert_eq!(value["rights"]["main_area_sqm"], json!(14700));

        let rights: ParcelRights = serde_json::from_value(value).unwrap();
        assert_eq!(rights.rights.height_max_m, 75.0);
    }

    #[test]
    fn test_non_numeric_string_is_rejected() {
        let mut value = rights_json();
        value["rights"]["height_max_m"] = json!("seventy-five");
        let err = validate::<ParcelRights>(&mut value).unwrap_err();
        assert_eq!(validation_path(err), "$.rights.height_max_m");
    }

    #[test]
    fn test_missing_required_field_names_path() {
        let mut value = rights_json();
        value["rights"].as_object_mut().unwrap().remove("max_units");
        let err = validate::<ParcelRights>(&mut value).unwrap_err();
        assert_eq!(validation_path(err), "$.rights.max_units");
    }

    #[test]
    fn test_integer_field_accepts_integral_float() {
        let mut value = rights_json();
        value["rights"]["max_units"] = json!(150.0);
        validate::<ParcelRights>(&mut value).unwrap();
        let rights: ParcelRights = serde_json::from_value(value).unwrap();
        assert_eq!(rights.rights.max_units, 150);
    }

    #[test]
    fn test_integer_field_rejects_fraction() {
        let mut value = rights_json();
        value["rights"]["max_units"] = json!("75.5");
        let err = validate::<ParcelRights>(&mut value).unwrap_err();
        assert_eq!(validation_path(err), "$.rights.max_units");
    }

    #[test]
    fn test_negative_values_are_rejected() {
        let mut value = rights_json();
        value["parcel"]["area_net_sqm"] = json!(-10);
        let err = validate::<ParcelRights>(&mut value).unwrap_err();
        assert_eq!(validation_path(err), "$.parcel.area_net_sqm");
    }

    #[test]
    fn test_numeric_identifiers_become_strings() {
        let mut value = rights_json();
        value["parcel"]["gush"] = json!(6666);
        validate::<ParcelRights>(&mut value).unwrap();
        assert_eq!(value["parcel"]["gush"], json!("6666"));
    }

    #[test]
    fn test_enum_tags_are_case_normalised() {
        let mut value = json!({
            "floor_number": "3",
            "floor_type": "Typical",
            "units": [{"unit_type": "n4", "area_sqm": "109", "count": 4}],
            "total_units": 4
        });
        validate::<FloorPlan>(&mut value).unwrap();
        let floor: FloorPlan = serde_json::from_value(value).unwrap();
        assert_eq!(floor.floor_type, FloorType::Typical);
        assert_eq!(floor.floor_number, 3);
        assert_eq!(floor.units[0].area_sqm, 109.0);
    }

    #[test]
    fn test_unknown_enum_tag_is_rejected() {
        let mut value = json!({"floor_number": 1, "floor_type": "mezzanine", "total_units": 0});
        let err = validate::<FloorPlan>(&mut value).unwrap_err();
        assert_eq!(validation_path(err), "$.floor_type");
    }

    #[test]
    fn test_nested_array_paths() {
        let mut value = json!({
            "floor_number": 1,
            "floor_type": "typical",
            "units": [
                {"unit_type": "n3", "area_sqm": 81, "count": 2},
                {"unit_type": "n4", "area_sqm": 109, "count": "many"}
            ],
            "total_units": 2
        });
        let err = validate::<FloorPlan>(&mut value).unwrap_err();
        assert_eq!(validation_path(err), "$.units[1].count");
    }

    #[test]
    fn test_parse_numeric() {
        assert_eq!(parse_numeric("75"), Some(75.0));
        assert_eq!(parse_numeric(" 52.5 "), Some(52.5));
        assert_eq!(parse_numeric("14,700"), Some(14700.0));
        assert_eq!(parse_numeric("1,234,567.5"), Some(1_234_567.5));
        assert_eq!(parse_numeric("35%"), Some(35.0));
        assert_eq!(parse_numeric("1,5"), None);
        assert_eq!(parse_numeric("seventy-five"), None);
        assert_eq!(parse_numeric("NaN"), None);
        assert_eq!(parse_numeric("inf"), None);
        assert_eq!(parse_numeric(""), None);
    }
}
