//! Typed values that comparisons operate on.
//!
//! Rule arguments arrive as strings and stored attributes arrive as loosely
//! typed JSON. Both are converted into a [`TypedValue`] of the field's
//! declared [`ValueType`] before anything is compared.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate};
use serde::Serialize;
use serde_json::Value;

use crate::models::ValueType;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TypedValue {
    Number(f64),
    String(String),
    Bool(bool),
    Date(NaiveDate),
    List(Vec<String>),
}

impl TypedValue {
    /// Parse a single rule argument as a scalar of `value_type`.
    ///
    /// `ENUM` and `LIST` arguments are option names and parse as strings.
    pub fn parse_argument(value_type: ValueType, raw: &str) -> Option<Self> {
        match value_type {
            ValueType::Number => parse_number(raw).map(Self::Number),
            ValueType::Date => parse_date(raw).map(Self::Date),
            ValueType::Boolean => parse_bool(raw).map(Self::Bool),
            ValueType::String | ValueType::Enum | ValueType::List => {
                Some(Self::String(raw.to_string()))
            }
        }
    }

    /// Read a stored JSON value as `value_type`.
    ///
    /// Values that cannot be read as the declared type are treated as
    /// missing.
    pub fn from_stored(value_type: ValueType, raw: &Value) -> Option<Self> {
        match (value_type, raw) {
            (_, Value::Null) => None,
            (ValueType::Number, Value::Number(n)) => n.as_f64().map(Self::Number),
            (ValueType::Number, Value::String(s)) => parse_number(s).map(Self::Number),
            (ValueType::Boolean, Value::Bool(b)) => Some(Self::Bool(*b)),
            (ValueType::Boolean, Value::String(s)) => parse_bool(s).map(Self::Bool),
            (ValueType::Boolean, Value::Number(n)) => match n.as_i64() {
                Some(0) => Some(Self::Bool(false)),
                Some(1) => Some(Self::Bool(true)),
                _ => None,
            },
            (ValueType::Date, Value::String(s)) => parse_date(s).map(Self::Date),
            (ValueType::String | ValueType::Enum, Value::String(s)) => {
                Some(Self::String(s.clone()))
            }
            (ValueType::String | ValueType::Enum, Value::Number(n)) => {
                Some(Self::String(n.to_string()))
            }
            (ValueType::String | ValueType::Enum, Value::Bool(b)) => {
                Some(Self::String(b.to_string()))
            }
            (ValueType::List, Value::Array(items)) => {
                let items: Vec<String> = items.iter().filter_map(scalar_to_string).collect();
                Some(Self::List(items))
            }
            (ValueType::List, Value::String(s)) => Some(Self::List(split_options(s))),
            _ => None,
        }
    }

    /// Ordering between two values of the same ordered type.
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.partial_cmp(b),
            (Self::Date(a), Self::Date(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// The elements of a list value; a scalar string is a one-element list.
    pub fn as_options(&self) -> &[String] {
        match self {
            Self::List(items) => items,
            Self::String(s) => std::slice::from_ref(s),
            _ => &[],
        }
    }
}

pub fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" => Some(true),
        "false" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

/// Split a multi-select value stored as text (`"SEEING, HEARING"`).
fn split_options(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_number_argument() {
        assert_eq!(
            TypedValue::parse_argument(ValueType::Number, " 2.5 "),
            Some(TypedValue::Number(2.5))
        );
        assert_eq!(TypedValue::parse_argument(ValueType::Number, "two"), None);
        assert_eq!(TypedValue::parse_argument(ValueType::Number, "NaN"), None);
    }

    #[test]
    fn test_parse_date_accepts_plain_and_rfc3339() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(parse_date("2024-03-01"), Some(expected));
        assert_eq!(parse_date("2024-03-01T10:00:00Z"), Some(expected));
        assert_eq!(parse_date("01/03/2024"), None);
    }

    #[test]
    fn test_parse_bool_variants() {
        assert_eq!(parse_bool("True"), Some(true));
        assert_eq!(parse_bool("no"), Some(false));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_from_stored_coerces_loosely_typed_json() {
        assert_eq!(
            TypedValue::from_stored(ValueType::Number, &json!("3")),
            Some(TypedValue::Number(3.0))
        );
        assert_eq!(
            TypedValue::from_stored(ValueType::Boolean, &json!(1)),
            Some(TypedValue::Bool(true))
        );
        assert_eq!(TypedValue::from_stored(ValueType::Number, &json!(null)), None);
        assert_eq!(TypedValue::from_stored(ValueType::Date, &json!(42)), None);
    }

    #[test]
    fn test_from_stored_list_from_text_or_array() {
        assert_eq!(
            TypedValue::from_stored(ValueType::List, &json!("SEEING, HEARING")),
            Some(TypedValue::List(vec!["SEEING".into(), "HEARING".into()]))
        );
        assert_eq!(
            TypedValue::from_stored(ValueType::List, &json!(["A", 2])),
            Some(TypedValue::List(vec!["A".into(), "2".into()]))
        );
    }

    #[test]
    fn test_compare_only_for_same_ordered_type() {
        let a = TypedValue::Number(1.0);
        let b = TypedValue::Number(2.0);
        assert_eq!(a.compare(&b), Some(Ordering::Less));
        assert_eq!(a.compare(&TypedValue::String("1".into())), None);
    }
}
