//! Payload validation derived from the collection schema plus configured field rules.
//!
//! Mirrors insert-schema semantics: only writable columns are kept (unknown keys are
//! dropped), not-null columns without a database default are required, and every present
//! value must match its column type. All failures are collected, not just the first.

use crate::config::{CollectionShape, ColumnSchema, ColumnType, ValidationRule};
use crate::driver::Record;
use crate::error::{AppError, FieldError};
use regex::Regex;
use serde_json::Value;

pub struct RecordValidator;

impl RecordValidator {
    pub fn validate(shape: &CollectionShape, raw: Value) -> Result<Record, AppError> {
        let Value::Object(mut input) = raw else {
            return Err(AppError::ValidationFailed(vec![FieldError::new(
                "_root",
                "expected an object",
            )]));
        };
        let mut errors = Vec::new();
        let mut out = Record::new();

        for column in shape.writable_columns() {
            match input.remove(&column.name) {
                None => {
                    if column.is_required() {
                        errors.push(FieldError::new(&column.name, "is required"));
                    }
                }
                Some(Value::Null) => {
                    if column.nullable {
                        out.insert(column.name.clone(), Value::Null);
                    } else if column.is_required() {
                        errors.push(FieldError::new(&column.name, "must not be null"));
                    }
                }
                Some(v) => match check_type(column, v) {
                    Ok(v) => {
                        out.insert(column.name.clone(), v);
                    }
                    Err(message) => errors.push(FieldError::new(&column.name, message)),
                },
            }
        }

        let mut rule_fields: Vec<&String> = shape.validation.keys().collect();
        rule_fields.sort();
        for field in rule_fields {
            let rule = &shape.validation[field];
            let val = out.get(field.as_str());
            if rule.required == Some(true) && (val.is_none() || val == Some(&Value::Null)) {
                if !errors.iter().any(|e| e.field == *field) {
                    errors.push(FieldError::new(field.as_str(), "is required"));
                }
                continue;
            }
            if let Some(v) = val {
                validate_field(field, v, rule, &mut errors);
            }
        }

        if errors.is_empty() {
            Ok(out)
        } else {
            Err(AppError::ValidationFailed(errors))
        }
    }
}

fn check_type(column: &ColumnSchema, v: Value) -> Result<Value, String> {
    match column.column_type {
        ColumnType::Text => match v {
            Value::String(_) => Ok(v),
            _ => Err("must be a string".into()),
        },
        ColumnType::Integer => match v.as_i64() {
            Some(n) if i32::try_from(n).is_ok() => Ok(v),
            Some(_) => Err("is out of range for an integer".into()),
            None => Err("must be an integer".into()),
        },
        ColumnType::BigInt => match v.as_i64() {
            Some(_) => Ok(v),
            None => Err("must be an integer".into()),
        },
        ColumnType::Double => match v {
            Value::Number(_) => Ok(v),
            _ => Err("must be a number".into()),
        },
        ColumnType::Numeric => match &v {
            Value::Number(_) => Ok(v),
            Value::String(s) if s.trim().parse::<f64>().is_ok() => Ok(v),
            _ => Err("must be a number".into()),
        },
        ColumnType::Boolean => match v {
            Value::Bool(_) => Ok(v),
            _ => Err("must be a boolean".into()),
        },
        ColumnType::Uuid => v
            .as_str()
            .and_then(|s| uuid::Uuid::parse_str(s).ok())
            .map(|u| Value::String(u.to_string()))
            .ok_or_else(|| "must be a valid UUID".into()),
        ColumnType::Timestamp | ColumnType::Timestamptz => match v.as_str() {
            Some(s) if is_timestamp(s) => Ok(v),
            _ => Err("must be an ISO-8601 timestamp".into()),
        },
        ColumnType::Date => match v.as_str() {
            Some(s) if chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok() => Ok(v),
            _ => Err("must be a date (YYYY-MM-DD)".into()),
        },
        ColumnType::Jsonb => Ok(v),
    }
}

fn is_timestamp(s: &str) -> bool {
    chrono::DateTime::parse_from_rfc3339(s).is_ok()
        || chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        || chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").is_ok()
}

fn validate_field(col: &str, v: &Value, rule: &ValidationRule, errors: &mut Vec<FieldError>) {
    if v.is_null() {
        return;
    }
    if let Some(format) = &rule.format {
        if let Some(message) = check_format(v, format) {
            errors.push(FieldError::new(col, message));
        }
    }
    if let (Some(max), Some(s)) = (rule.max_length, v.as_str()) {
        if s.chars().count() > max as usize {
            errors.push(FieldError::new(col, format!("must be at most {} characters", max)));
        }
    }
    if let (Some(min), Some(s)) = (rule.min_length, v.as_str()) {
        if s.chars().count() < min as usize {
            errors.push(FieldError::new(col, format!("must be at least {} characters", min)));
        }
    }
    if let Some(pattern) = &rule.pattern {
        match Regex::new(pattern) {
            Ok(re) => {
                if let Some(s) = v.as_str() {
                    if !re.is_match(s) {
                        errors.push(FieldError::new(col, "does not match required pattern"));
                    }
                }
            }
            Err(_) => errors.push(FieldError::new(col, "has an invalid pattern rule")),
        }
    }
    if let Some(allowed) = &rule.allowed {
        if !allowed.iter().any(|a| value_eq(v, a)) {
            errors.push(FieldError::new(
                col,
                format!("must be one of: {:?}", allowed.iter().take(5).collect::<Vec<_>>()),
            ));
        }
    }
    if let (Some(min), Some(n)) = (rule.minimum, v.as_f64()) {
        if n < min {
            errors.push(FieldError::new(col, format!("must be at least {}", min)));
        }
    }
    if let (Some(max), Some(n)) = (rule.maximum, v.as_f64()) {
        if n > max {
            errors.push(FieldError::new(col, format!("must be at most {}", max)));
        }
    }
}

/// Loose equality: numbers compare by value regardless of integer/float encoding.
pub fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

fn check_format(v: &Value, format: &str) -> Option<&'static str> {
    let s = v.as_str()?;
    match format.to_lowercase().as_str() {
        "email" if !s.contains('@') || s.len() < 3 => Some("must be a valid email"),
        "uuid" if uuid::Uuid::parse_str(s).is_err() => Some("must be a valid UUID"),
        _ => None,
    }
}
