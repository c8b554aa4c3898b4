//! Value validation against a field's type and rule list.
//!
//! Type checking is permissive about the shapes extractors actually emit:
//! numeric fields accept numeric strings, booleans accept the usual textual
//! spellings, dates accept both ISO and EXIF (`YYYY:MM:DD`) layouts. A `null`
//! value is accepted for optional fields and rejected for required ones.
//!
//! Every rule runs; all failure messages are collected in order.

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{FieldDefinition, FieldType};

/// The declarative predicate behind a [`FieldValidationRule`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleKind {
    /// Strings must be non-blank, sequences and objects non-empty.
    NotEmpty,
    MinLength {
        min: usize,
    },
    MaxLength {
        max: usize,
    },
    /// The string form of the value must match this regex.
    Pattern {
        regex: String,
    },
    /// Numeric bounds, inclusive.
    Range {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
    OneOf {
        values: Vec<Value>,
    },
    MinItems {
        min: usize,
    },
    MaxItems {
        max: usize,
    },
}

/// One validation rule: a predicate plus the message reported when it fails.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldValidationRule {
    pub rule: RuleKind,
    /// Overrides the generated failure message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip)]
    compiled: CompiledPattern,
}

/// Regex compiled on first use of a `Pattern` rule, keyed by its source so a
/// rule edited after first use is never matched against a stale regex.
/// Ignored by equality.
#[derive(Debug, Clone, Default)]
struct CompiledPattern(OnceLock<(String, Result<Regex, String>)>);

impl CompiledPattern {
    fn get(&self, source: &str) -> Result<Regex, String> {
        let (cached_source, compiled) = self
            .0
            .get_or_init(|| (source.to_string(), compile_pattern(source)));
        if cached_source == source {
            compiled.clone()
        } else {
            compile_pattern(source)
        }
    }

    #[cfg(test)]
    fn is_compiled(&self) -> bool {
        self.0.get().is_some()
    }
}

impl PartialEq for CompiledPattern {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

fn compile_pattern(source: &str) -> Result<Regex, String> {
    Regex::new(source).map_err(|e| format!("invalid pattern '{source}': {e}"))
}

impl FieldValidationRule {
    pub fn new(rule: RuleKind) -> Self {
        Self {
            rule,
            message: None,
            compiled: CompiledPattern::default(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Evaluate the rule. Returns `(true, "")` on success, otherwise `false`
    /// and a human-readable failure message.
    pub fn validate(&self, value: &Value) -> (bool, String) {
        match self.check(value) {
            Ok(()) => (true, String::new()),
            Err(generated) => (false, self.message.clone().unwrap_or(generated)),
        }
    }

    fn check(&self, value: &Value) -> Result<(), String> {
        match &self.rule {
            RuleKind::NotEmpty => {
                let empty = match value {
                    Value::Null => true,
                    Value::String(s) => s.trim().is_empty(),
                    Value::Array(a) => a.is_empty(),
                    Value::Object(o) => o.is_empty(),
                    _ => false,
                };
                if empty {
                    Err("value must not be empty".to_string())
                } else {
                    Ok(())
                }
            }
            RuleKind::MinLength { min } => {
                let len = text_of(value).chars().count();
                if len < *min {
                    Err(format!("length {len} is below minimum {min}"))
                } else {
                    Ok(())
                }
            }
            RuleKind::MaxLength { max } => {
                let len = text_of(value).chars().count();
                if len > *max {
                    Err(format!("length {len} exceeds maximum {max}"))
                } else {
                    Ok(())
                }
            }
            RuleKind::Pattern { regex } => {
                let re = self.compiled.get(regex)?;
                let text = text_of(value);
                if re.is_match(&text) {
                    Ok(())
                } else {
                    Err(format!("'{text}' does not match pattern '{regex}'"))
                }
            }
            RuleKind::Range { min, max } => {
                let Some(n) = number_of(value) else {
                    return Err("value is not numeric".to_string());
                };
                if let Some(lo) = min {
                    if n < *lo {
                        return Err(format!("{n} is below minimum {lo}"));
                    }
                }
                if let Some(hi) = max {
                    if n > *hi {
                        return Err(format!("{n} exceeds maximum {hi}"));
                    }
                }
                Ok(())
            }
            RuleKind::OneOf { values } => {
                if values.contains(value) {
                    Ok(())
                } else {
                    Err(format!("{value} is not one of the allowed values"))
                }
            }
            RuleKind::MinItems { min } => match value {
                Value::Array(items) if items.len() >= *min => Ok(()),
                Value::Array(items) => Err(format!(
                    "{} items is below minimum {min}",
                    items.len()
                )),
                _ => Err("value is not a sequence".to_string()),
            },
            RuleKind::MaxItems { max } => match value {
                Value::Array(items) if items.len() <= *max => Ok(()),
                Value::Array(items) => Err(format!("{} items exceeds maximum {max}", items.len())),
                _ => Err("value is not a sequence".to_string()),
            },
        }
    }
}

/// Outcome of validating a value or a definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ValidationResult {
    pub is_valid: bool,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            errors: vec![error.into()],
            warnings: Vec::new(),
        }
    }

    /// Record an error; the result becomes invalid.
    pub fn push_error(&mut self, error: impl Into<String>) {
        self.is_valid = false;
        self.errors.push(error.into());
    }

    pub fn push_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }
}

/// Evaluates values and definitions against a field's type and rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationEngine;

impl ValidationEngine {
    pub fn new() -> Self {
        Self
    }

    /// Validate a candidate value for `field`.
    pub fn validate_value(&self, field: &FieldDefinition, value: &Value) -> ValidationResult {
        let mut result = ValidationResult::valid();

        if value.is_null() {
            if field.is_required {
                result.push_error(format!("field '{}' is required", field.name));
            }
            return result;
        }

        if let Err(e) = check_type(field.field_type, value) {
            result.push_error(e);
            return result;
        }

        for rule in &field.validation_rules {
            let (ok, message) = rule.validate(value);
            if !ok {
                result.push_error(message);
            }
        }

        if result.is_valid && field.is_deprecated {
            result.push_warning(format!("field '{}' is deprecated", field.name));
        }

        result
    }

    /// Structural self-check of a definition: non-empty name and description,
    /// and the example value (if any) must pass the field's own validation.
    pub fn validate_definition(&self, field: &FieldDefinition) -> ValidationResult {
        let mut result = ValidationResult::valid();

        if field.name.trim().is_empty() {
            result.push_error("field name must not be empty");
        }
        if field.description().trim().is_empty() {
            result.push_error("field description must not be empty");
        }
        if let Some(example) = &field.metadata.example_value {
            let example_result = self.validate_value(field, example);
            for e in example_result.errors {
                result.push_error(format!("example value is invalid: {e}"));
            }
        }

        result
    }
}

/// Check `value` is compatible with `field_type`.
fn check_type(field_type: FieldType, value: &Value) -> Result<(), String> {
    let ok = match field_type {
        FieldType::String => value.is_string(),
        FieldType::Integer => match value {
            Value::Number(n) => n.is_i64() || n.is_u64() || n.as_f64().is_some_and(is_integral),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>().is_ok() || s.parse::<f64>().is_ok_and(is_integral)
            }
            _ => false,
        },
        FieldType::Float => match value {
            Value::Number(_) => true,
            Value::String(s) => s.trim().parse::<f64>().is_ok_and(f64::is_finite),
            _ => false,
        },
        FieldType::Boolean => match value {
            Value::Bool(_) => true,
            Value::String(s) => matches!(
                s.trim().to_ascii_lowercase().as_str(),
                "true" | "false" | "yes" | "no" | "1" | "0"
            ),
            _ => false,
        },
        FieldType::Date => value.as_str().is_some_and(is_date),
        FieldType::Datetime => value.as_str().is_some_and(is_datetime),
        FieldType::Sequence => value.is_array(),
        FieldType::Binary => match value {
            Value::String(_) => true,
            Value::Array(items) => items
                .iter()
                .all(|b| b.as_u64().is_some_and(|b| b <= u64::from(u8::MAX))),
            _ => false,
        },
        FieldType::Object => value.is_object(),
    };

    if ok {
        Ok(())
    } else {
        Err(format!("expected {field_type} value, got {}", describe(value)))
    }
}

fn is_integral(f: f64) -> bool {
    f.is_finite() && f.fract() == 0.0
}

fn is_date(s: &str) -> bool {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok() || NaiveDate::parse_from_str(s, "%Y:%m:%d").is_ok()
}

fn is_datetime(s: &str) -> bool {
    let s = s.trim();
    DateTime::parse_from_rfc3339(s).is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y:%m:%d %H:%M:%S").is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").is_ok()
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("boolean {b}"),
        Value::Number(n) => format!("number {n}"),
        Value::String(s) => format!("string '{s}'"),
        Value::Array(a) => format!("sequence of {} items", a.len()),
        Value::Object(_) => "object".to_string(),
    }
}

/// String form used by length and pattern rules.
fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn number_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
