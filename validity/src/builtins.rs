//! Built-in validators and their inventory registration.
//!
//! Every built-in is collected through `inventory` and copied into the
//! process-wide registry by [`ValidityConfig::new`](crate::config::ValidityConfig::new).

use regex::RegexBuilder;
use serde_json::Value;

use crate::registry::ValidatorDefinition;

/// Built-in validator registration entry for inventory.
pub struct ValidatorRegistration {
    /// Validator name.
    pub name: &'static str,
    /// Factory function to create the definition.
    pub factory: fn() -> ValidatorDefinition,
}

impl ValidatorRegistration {
    /// Create a new validator registration.
    pub const fn new(name: &'static str, factory: fn() -> ValidatorDefinition) -> Self {
        Self { name, factory }
    }
}

inventory::collect!(ValidatorRegistration);

/// Get all registered built-in validators.
pub fn registered_validators() -> impl Iterator<Item = &'static ValidatorRegistration> {
    inventory::iter::<ValidatorRegistration>()
}

inventory::submit! { ValidatorRegistration::new("required", || ValidatorDefinition::sync(required)) }
inventory::submit! { ValidatorRegistration::new("pattern", || ValidatorDefinition::sync(pattern)) }
inventory::submit! { ValidatorRegistration::new("minlength", || ValidatorDefinition::sync(minlength)) }
inventory::submit! { ValidatorRegistration::new("maxlength", || ValidatorDefinition::sync(maxlength)) }
inventory::submit! { ValidatorRegistration::new("min", || ValidatorDefinition::sync(min)) }
inventory::submit! { ValidatorRegistration::new("max", || ValidatorDefinition::sync(max)) }
inventory::submit! { ValidatorRegistration::new("email", || ValidatorDefinition::sync(email)) }

/// Presence check. The rule argument toggles the sense: `false` requires the
/// value to be empty.
pub fn required(value: &Value, rule: &Value) -> bool {
    let is_required = match rule {
        Value::Bool(flag) => *flag,
        _ => true,
    };
    presence(value, is_required)
}

fn presence(value: &Value, is_required: bool) -> bool {
    match value {
        Value::Array(items) if items.is_empty() => !is_required,
        Value::Array(items) => {
            let mut valid = true;
            for item in items {
                valid = presence(item, is_required);
                if valid != is_required {
                    break;
                }
            }
            valid
        }
        Value::Number(_) => is_required,
        Value::Bool(flag) => *flag == is_required,
        Value::String(text) => text.is_empty() != is_required,
        Value::Object(map) => map.is_empty() != is_required,
        Value::Null => !is_required,
    }
}

/// Regular expression check against a `/source/flags` argument.
///
/// Flags `i` and `m` are honoured, `g` is accepted and ignored. A malformed
/// argument or pattern fails.
pub fn pattern(value: &Value, rule: &Value) -> bool {
    let Some(literal) = rule.as_str() else {
        return false;
    };
    let Some((source, flags)) = split_regex_literal(literal) else {
        return false;
    };
    let Ok(re) = RegexBuilder::new(source)
        .case_insensitive(flags.contains('i'))
        .multi_line(flags.contains('m'))
        .build()
    else {
        return false;
    };
    re.is_match(&text_of(value))
}

fn split_regex_literal(literal: &str) -> Option<(&str, &str)> {
    let body = literal.strip_prefix('/')?;
    let end = body.rfind('/')?;
    let (source, flags) = (&body[..end], &body[end + 1..]);
    flags
        .chars()
        .all(|c| matches!(c, 'g' | 'i' | 'm'))
        .then_some((source, flags))
}

/// Minimum length for strings (in characters) and arrays (in elements).
pub fn minlength(value: &Value, rule: &Value) -> bool {
    match (length_of(value), integer_arg(rule)) {
        (Some(len), Some(min)) => len as i64 >= min,
        _ => false,
    }
}

/// Maximum length for strings (in characters) and arrays (in elements).
pub fn maxlength(value: &Value, rule: &Value) -> bool {
    match (length_of(value), integer_arg(rule)) {
        (Some(len), Some(max)) => len as i64 <= max,
        _ => false,
    }
}

/// Numeric lower bound.
pub fn min(value: &Value, rule: &Value) -> bool {
    match (to_number(value), to_number(rule)) {
        (Some(v), Some(bound)) => v >= bound,
        _ => false,
    }
}

/// Numeric upper bound.
pub fn max(value: &Value, rule: &Value) -> bool {
    match (to_number(value), to_number(rule)) {
        (Some(v), Some(bound)) => v <= bound,
        _ => false,
    }
}

/// Email address check. Empty is valid; use `required` for presence.
pub fn email(value: &Value, _rule: &Value) -> bool {
    match value {
        Value::String(text) if text.is_empty() => true,
        Value::String(text) => email_address::EmailAddress::is_valid(text),
        Value::Null => true,
        _ => false,
    }
}

fn length_of(value: &Value) -> Option<usize> {
    match value {
        Value::String(text) => Some(text.chars().count()),
        Value::Array(items) => Some(items.len()),
        _ => None,
    }
}

fn integer_arg(rule: &Value) -> Option<i64> {
    match rule {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(text) => {
            let text = text.trim();
            let digits = text
                .char_indices()
                .take_while(|&(i, c)| c.is_ascii_digit() || (i == 0 && matches!(c, '-' | '+')))
                .last()
                .map(|(i, c)| i + c.len_utf8())?;
            text[..digits].parse().ok()
        }
        _ => None,
    }
}

/// Numeric coercion for bounds: numbers, numeric strings (empty is zero),
/// booleans and null.
pub fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(text) if text.trim().is_empty() => Some(0.0),
        Value::String(text) => text.trim().parse::<f64>().ok().filter(|n| !n.is_nan()),
        Value::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
        Value::Null => Some(0.0),
        _ => None,
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_required_strings() {
        assert!(!required(&json!(""), &Value::Null));
        assert!(required(&json!("hello"), &Value::Null));
        assert!(required(&json!(""), &json!(false)));
        assert!(!required(&json!("hello"), &json!(false)));
    }

    #[test]
    fn test_required_other_shapes() {
        assert!(required(&json!(0), &Value::Null));
        assert!(required(&json!(true), &Value::Null));
        assert!(!required(&json!(false), &Value::Null));
        assert!(!required(&json!(null), &Value::Null));
        assert!(!required(&json!({}), &Value::Null));
        assert!(required(&json!({"a": 1}), &Value::Null));
    }

    #[test]
    fn test_required_arrays() {
        assert!(!required(&json!([]), &Value::Null));
        assert!(required(&json!(["one"]), &Value::Null));
        assert!(!required(&json!(["one", ""]), &Value::Null));
    }

    #[test]
    fn test_pattern() {
        assert!(pattern(&json!("123"), &json!("/^[-+]?[0-9]+$/")));
        assert!(!pattern(&json!("hello"), &json!("/^[-+]?[0-9]+$/")));
        assert!(pattern(&json!("HELLO"), &json!("/^hello$/i")));
        assert!(pattern(&json!(42), &json!("/^\\d+$/")));
    }

    #[test]
    fn test_pattern_malformed_argument_fails() {
        assert!(!pattern(&json!("abc"), &json!("abc")));
        assert!(!pattern(&json!("abc"), &json!("/abc/x")));
        assert!(!pattern(&json!("abc"), &json!("/(/")));
        assert!(!pattern(&json!("abc"), &json!(3)));
    }

    #[test]
    fn test_lengths() {
        assert!(maxlength(&json!("1234"), &json!(4)));
        assert!(!maxlength(&json!("hello"), &json!(4)));
        assert!(minlength(&json!("héllo"), &json!("5")));
        assert!(!minlength(&json!("abc"), &json!(4)));
        assert!(minlength(&json!(["a", "b"]), &json!(2)));
        assert!(!maxlength(&json!(12345), &json!(4)));
        assert!(!minlength(&json!("abc"), &json!("x")));
    }

    #[test]
    fn test_bounds() {
        assert!(min(&json!(18), &json!(18)));
        assert!(!min(&json!("17"), &json!(18)));
        assert!(max(&json!("99.5"), &json!("100")));
        assert!(!max(&json!("abc"), &json!(100)));
        assert!(min(&json!(""), &json!(0)));
    }

    #[test]
    fn test_email() {
        assert!(email(&json!(""), &Value::Null));
        assert!(email(&json!("dio@example.com"), &Value::Null));
        assert!(!email(&json!("not-an-email"), &Value::Null));
    }

    #[test]
    fn test_builtins_are_registered() {
        let names: Vec<_> = registered_validators().map(|r| r.name).collect();
        assert!(names.contains(&"required"));
        assert!(names.contains(&"pattern"));
        assert!(names.contains(&"email"));
    }
}
