use crate::domain::model::{Field, FieldType};
use crate::utils::error::Result;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use serde_json::{Number, Value};
use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex"));
static UUID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .expect("uuid regex")
});

const ANY_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d.%m.%Y", "%Y%m%d"];
const ANY_TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M", "%H:%M:%S%.f", "%I:%M %p"];
const ANY_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
];

const DEFAULT_TRUE_VALUES: &[&str] = &["true", "True", "TRUE", "1"];
const DEFAULT_FALSE_VALUES: &[&str] = &["false", "False", "FALSE", "0"];

/// 單一欄位轉型或約束檢查失敗的原因
#[derive(Debug, Clone, PartialEq)]
pub struct CastError {
    pub message: String,
}

impl CastError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for CastError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

type CastResult = std::result::Result<Value, CastError>;

/// 依欄位描述將值轉成宣告的型別並檢查約束
#[derive(Debug, Clone)]
pub struct FieldCaster {
    field: Field,
    missing_values: Vec<String>,
    pattern: Option<Regex>,
    allowed: Option<Vec<Value>>,
}

impl FieldCaster {
    pub fn new(field: &Field, missing_values: &[String]) -> Result<Self> {
        let pattern = field
            .constraints
            .pattern
            .as_deref()
            .map(|p| Regex::new(&format!("^(?:{})$", p)))
            .transpose()?;

        // enum 的值可能是尚未轉型的字串，先轉成與欄位相同的型別
        let allowed = field.constraints.allowed.as_ref().map(|values| {
            values
                .iter()
                .map(|v| cast_type(field, v).unwrap_or_else(|_| v.clone()))
                .collect()
        });

        Ok(Self {
            field: field.clone(),
            missing_values: missing_values.to_vec(),
            pattern,
            allowed,
        })
    }

    pub fn field(&self) -> &Field {
        &self.field
    }

    pub fn field_name(&self) -> &str {
        &self.field.name
    }

    pub fn cast(&self, value: &Value) -> CastResult {
        let value = match value {
            Value::String(s) if self.missing_values.iter().any(|m| m == s) => Value::Null,
            other => other.clone(),
        };

        let cast = if value.is_null() {
            Value::Null
        } else {
            cast_type(&self.field, &value)?
        };

        self.check_constraints(&cast)?;
        Ok(cast)
    }

    fn check_constraints(&self, value: &Value) -> std::result::Result<(), CastError> {
        let constraints = &self.field.constraints;

        if value.is_null() {
            if constraints.required.unwrap_or(false) {
                return Err(CastError::new("value is required"));
            }
            return Ok(());
        }

        if let Some(length) = value_length(value) {
            if let Some(min) = constraints.min_length {
                if length < min {
                    return Err(CastError::new(format!(
                        "length {} is shorter than minLength {}",
                        length, min
                    )));
                }
            }
            if let Some(max) = constraints.max_length {
                if length > max {
                    return Err(CastError::new(format!(
                        "length {} is longer than maxLength {}",
                        length, max
                    )));
                }
            }
        }

        if let Some(minimum) = &constraints.minimum {
            if compare_values(value, minimum) == Some(Ordering::Less) {
                return Err(CastError::new(format!("{} is below minimum {}", value, minimum)));
            }
        }
        if let Some(maximum) = &constraints.maximum {
            if compare_values(value, maximum) == Some(Ordering::Greater) {
                return Err(CastError::new(format!("{} is above maximum {}", value, maximum)));
            }
        }

        if let (Some(pattern), Value::String(s)) = (&self.pattern, value) {
            if !pattern.is_match(s) {
                return Err(CastError::new(format!("'{}' does not match pattern", s)));
            }
        }

        if let Some(allowed) = &self.allowed {
            if !allowed.iter().any(|a| values_equal(a, value)) {
                return Err(CastError::new(format!("{} is not one of the allowed values", value)));
            }
        }

        Ok(())
    }
}

fn cast_type(field: &Field, value: &Value) -> CastResult {
    match field.field_type {
        FieldType::String => cast_string(field, value),
        FieldType::Integer => cast_integer(field, value),
        FieldType::Number => cast_number(field, value),
        FieldType::Boolean => cast_boolean(field, value),
        FieldType::Date => cast_date(field, value),
        FieldType::Time => cast_time(field, value),
        FieldType::Datetime => cast_datetime(field, value),
        FieldType::Year => cast_year(value),
        FieldType::Array => cast_json(value, "array", Value::is_array),
        FieldType::Object => cast_json(value, "object", Value::is_object),
        FieldType::Any => Ok(value.clone()),
    }
}

fn type_mismatch(field: &Field, value: &Value) -> CastError {
    CastError::new(format!("{} is not a valid {}", value, field.field_type))
}

fn format_of(field: &Field) -> &str {
    let format = field.format.as_deref().unwrap_or("default");
    // 舊版 "fmt:%d/%m/%Y" 寫法
    format.strip_prefix("fmt:").unwrap_or(format)
}

fn cast_string(field: &Field, value: &Value) -> CastResult {
    let Value::String(s) = value else {
        return Err(type_mismatch(field, value));
    };

    let valid = match format_of(field) {
        "default" | "binary" => true,
        "email" => EMAIL_RE.is_match(s),
        "uri" => url::Url::parse(s).is_ok(),
        "uuid" => UUID_RE.is_match(s),
        other => return Err(CastError::new(format!("unsupported string format '{}'", other))),
    };

    if valid {
        Ok(value.clone())
    } else {
        Err(CastError::new(format!("'{}' is not a valid {}", s, format_of(field))))
    }
}

fn bare_number(field: &Field) -> bool {
    field
        .option("bareNumber")
        .and_then(Value::as_bool)
        .unwrap_or(true)
}

/// 去除數字前後的非數字字元，保留緊貼數字的負號
fn strip_non_digits(s: &str) -> &str {
    let start = s.find(|c: char| c.is_ascii_digit());
    let end = s.rfind(|c: char| c.is_ascii_digit());
    match (start, end) {
        (Some(start), Some(end)) => {
            let start = if s[..start].ends_with('-') { start - 1 } else { start };
            &s[start..=end]
        }
        _ => "",
    }
}

fn cast_integer(field: &Field, value: &Value) -> CastResult {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::from(i))
            } else {
                match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                        Ok(Value::from(f as i64))
                    }
                    _ => Err(type_mismatch(field, value)),
                }
            }
        }
        Value::String(s) => {
            let digits = if bare_number(field) {
                s.trim()
            } else {
                strip_non_digits(s)
            };
            digits
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| type_mismatch(field, value))
        }
        _ => Err(type_mismatch(field, value)),
    }
}

fn cast_number(field: &Field, value: &Value) -> CastResult {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let mut text = if bare_number(field) {
                s.trim().to_string()
            } else {
                strip_non_digits(s).to_string()
            };
            if let Some(group) = field.option("groupChar").and_then(Value::as_str) {
                if !group.is_empty() {
                    text = text.replace(group, "");
                }
            }
            let decimal = field
                .option("decimalChar")
                .and_then(Value::as_str)
                .unwrap_or(".");
            if decimal != "." {
                text = text.replace(decimal, ".");
            }
            text.parse::<f64>().ok()
        }
        _ => None,
    };

    parsed
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| type_mismatch(field, value))
}

fn string_list(field: &Field, key: &str, default: &[&str]) -> Vec<String> {
    match field.option(key).and_then(Value::as_array) {
        Some(values) => values
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        None => default.iter().map(|s| s.to_string()).collect(),
    }
}

fn cast_boolean(field: &Field, value: &Value) -> CastResult {
    match value {
        Value::Bool(_) => Ok(value.clone()),
        Value::String(s) => {
            let s = s.trim();
            if string_list(field, "trueValues", DEFAULT_TRUE_VALUES).iter().any(|t| t == s) {
                Ok(Value::Bool(true))
            } else if string_list(field, "falseValues", DEFAULT_FALSE_VALUES)
                .iter()
                .any(|f| f == s)
            {
                Ok(Value::Bool(false))
            } else {
                Err(type_mismatch(field, value))
            }
        }
        _ => Err(type_mismatch(field, value)),
    }
}

fn temporal_text<'a>(field: &Field, value: &'a Value) -> std::result::Result<&'a str, CastError> {
    value
        .as_str()
        .map(str::trim)
        .ok_or_else(|| type_mismatch(field, value))
}

fn cast_date(field: &Field, value: &Value) -> CastResult {
    let text = temporal_text(field, value)?;
    let parsed = match format_of(field) {
        "default" => NaiveDate::parse_from_str(text, "%Y-%m-%d").ok(),
        "any" => ANY_DATE_FORMATS
            .iter()
            .find_map(|f| NaiveDate::parse_from_str(text, f).ok()),
        pattern => NaiveDate::parse_from_str(text, pattern).ok(),
    };

    parsed
        .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
        .ok_or_else(|| type_mismatch(field, value))
}

fn cast_time(field: &Field, value: &Value) -> CastResult {
    let text = temporal_text(field, value)?;
    let parsed = match format_of(field) {
        "default" => NaiveTime::parse_from_str(text, "%H:%M:%S").ok(),
        "any" => ANY_TIME_FORMATS
            .iter()
            .find_map(|f| NaiveTime::parse_from_str(text, f).ok()),
        pattern => NaiveTime::parse_from_str(text, pattern).ok(),
    };

    parsed
        .map(|t| Value::String(t.format("%H:%M:%S").to_string()))
        .ok_or_else(|| type_mismatch(field, value))
}

fn cast_datetime(field: &Field, value: &Value) -> CastResult {
    let text = temporal_text(field, value)?;
    let parsed = match format_of(field) {
        "default" => NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%SZ").ok(),
        "any" => DateTime::parse_from_rfc3339(text)
            .map(|dt| dt.naive_utc())
            .ok()
            .or_else(|| {
                ANY_DATETIME_FORMATS
                    .iter()
                    .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
            }),
        pattern => DateTime::parse_from_str(text, pattern)
            .map(|dt| dt.naive_utc())
            .ok()
            .or_else(|| NaiveDateTime::parse_from_str(text, pattern).ok()),
    };

    parsed
        .map(|dt| Value::String(dt.format("%Y-%m-%dT%H:%M:%SZ").to_string()))
        .ok_or_else(|| type_mismatch(field, value))
}

fn cast_year(value: &Value) -> CastResult {
    let year = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    match year {
        Some(y) if (0..=9999).contains(&y) => Ok(Value::from(y)),
        _ => Err(CastError::new(format!("{} is not a valid year", value))),
    }
}

fn cast_json(value: &Value, kind: &str, check: fn(&Value) -> bool) -> CastResult {
    let parsed = match value {
        Value::String(s) => serde_json::from_str::<Value>(s).ok(),
        other => Some(other.clone()),
    };
    match parsed {
        Some(v) if check(&v) => Ok(v),
        _ => Err(CastError::new(format!("{} is not a valid {}", value, kind))),
    }
}

fn value_length(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(items) => Some(items.len()),
        Value::Object(map) => Some(map.len()),
        _ => None,
    }
}

fn compare_values(value: &Value, bound: &Value) -> Option<Ordering> {
    match (value, bound) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::Number(a), Value::String(b)) => a.as_f64()?.partial_cmp(&b.trim().parse().ok()?),
        (Value::String(a), Value::String(b)) => Some(a.as_str().cmp(b.as_str())),
        _ => None,
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn field(descriptor: Value) -> Field {
        serde_json::from_value(descriptor).unwrap()
    }

    fn caster(descriptor: Value) -> FieldCaster {
        FieldCaster::new(&field(descriptor), &[String::new()]).unwrap()
    }

    #[test]
    fn test_integer_cast() {
        let c = caster(json!({"name": "n", "type": "integer"}));
        assert_eq!(c.cast(&json!("42")).unwrap(), json!(42));
        assert_eq!(c.cast(&json!(7)).unwrap(), json!(7));
        assert_eq!(c.cast(&json!(3.0)).unwrap(), json!(3));
        assert!(c.cast(&json!("4.5")).is_err());
        assert!(c.cast(&json!(true)).is_err());
        assert_eq!(c.cast(&json!("")).unwrap(), Value::Null);
    }

    #[test]
    fn test_integer_bare_number_false() {
        let c = caster(json!({"name": "n", "type": "integer", "bareNumber": false}));
        assert_eq!(c.cast(&json!("$150 USD")).unwrap(), json!(150));
        assert_eq!(c.cast(&json!("-12%")).unwrap(), json!(-12));
    }

    #[test]
    fn test_number_group_and_decimal_chars() {
        let c = caster(json!({
            "name": "price",
            "type": "number",
            "groupChar": ".",
            "decimalChar": ","
        }));
        assert_eq!(c.cast(&json!("1.234,5")).unwrap(), json!(1234.5));

        let plain = caster(json!({"name": "price", "type": "number"}));
        assert_eq!(plain.cast(&json!("10")).unwrap(), json!(10.0));
        assert!(plain.cast(&json!("ten")).is_err());
    }

    #[test]
    fn test_boolean_custom_values() {
        let c = caster(json!({
            "name": "active",
            "type": "boolean",
            "trueValues": ["yes"],
            "falseValues": ["no"]
        }));
        assert_eq!(c.cast(&json!("yes")).unwrap(), json!(true));
        assert_eq!(c.cast(&json!("no")).unwrap(), json!(false));
        assert!(c.cast(&json!("true")).is_err());
    }

    #[test]
    fn test_date_formats() {
        let default = caster(json!({"name": "d", "type": "date"}));
        assert_eq!(default.cast(&json!("2024-03-01")).unwrap(), json!("2024-03-01"));
        assert!(default.cast(&json!("01/03/2024")).is_err());

        let custom = caster(json!({"name": "d", "type": "date", "format": "%d/%m/%Y"}));
        assert_eq!(custom.cast(&json!("01/03/2024")).unwrap(), json!("2024-03-01"));

        let any = caster(json!({"name": "d", "type": "date", "format": "any"}));
        assert_eq!(any.cast(&json!("2024/03/01")).unwrap(), json!("2024-03-01"));
    }

    #[test]
    fn test_datetime_any_normalizes_to_utc() {
        let c = caster(json!({"name": "ts", "type": "datetime", "format": "any"}));
        assert_eq!(
            c.cast(&json!("2024-03-01T10:00:00+02:00")).unwrap(),
            json!("2024-03-01T08:00:00Z")
        );
    }

    #[test]
    fn test_string_formats() {
        let email = caster(json!({"name": "e", "type": "string", "format": "email"}));
        assert!(email.cast(&json!("a@example.com")).is_ok());
        assert!(email.cast(&json!("not-an-email")).is_err());

        let uuid = caster(json!({"name": "u", "type": "string", "format": "uuid"}));
        assert!(uuid.cast(&json!("123e4567-e89b-12d3-a456-426614174000")).is_ok());
        assert!(uuid.cast(&json!(12)).is_err());
    }

    #[test]
    fn test_array_and_object_from_json_text() {
        let arr = caster(json!({"name": "tags", "type": "array"}));
        assert_eq!(arr.cast(&json!("[1, 2]")).unwrap(), json!([1, 2]));
        assert!(arr.cast(&json!("{}")).is_err());

        let obj = caster(json!({"name": "meta", "type": "object"}));
        assert_eq!(obj.cast(&json!({"a": 1})).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_constraints() {
        let c = caster(json!({
            "name": "qty",
            "type": "integer",
            "constraints": {"required": true, "minimum": 1, "maximum": 10}
        }));
        assert!(c.cast(&json!("")).is_err());
        assert!(c.cast(&json!("0")).is_err());
        assert!(c.cast(&json!("11")).is_err());
        assert_eq!(c.cast(&json!("5")).unwrap(), json!(5));

        let code = caster(json!({
            "name": "code",
            "constraints": {"pattern": "[A-Z]{3}", "maxLength": 3}
        }));
        assert!(code.cast(&json!("ABC")).is_ok());
        assert!(code.cast(&json!("ABCD")).is_err());
        assert!(code.cast(&json!("abc")).is_err());
    }

    #[test]
    fn test_enum_values_are_cast() {
        let c = caster(json!({
            "name": "level",
            "type": "integer",
            "constraints": {"enum": ["1", "2", "3"]}
        }));
        assert_eq!(c.cast(&json!("2")).unwrap(), json!(2));
        assert!(c.cast(&json!("4")).is_err());
    }

    #[test]
    fn test_invalid_pattern_constraint() {
        let f = field(json!({"name": "x", "constraints": {"pattern": "("}}));
        assert!(FieldCaster::new(&f, &[]).is_err());
    }
}
