//! Validators for the scalar request parameters `id`, `limit`, `page` and
//! `search`.
//!
//! Each validator is a pure function over a loosely-typed JSON value taken
//! from the request bag, returning the normalized form or a descriptive
//! parse error.

use crate::ast::Limit;
use crate::error::ParseError;
use serde_json::Value;

/// Validates the `id` parameter: strings and numbers normalize to a string.
pub fn validate_id(value: &Value) -> Result<String, ParseError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(ParseError::new(
            "id must be a string or a number".to_string(),
        )),
    }
}

/// Validates the `limit` parameter: a positive integer, a numeric string,
/// or the literal `"unlimited"`.
pub fn validate_limit(value: &Value) -> Result<Limit, ParseError> {
    if value.as_str() == Some("unlimited") {
        return Ok(Limit::Unlimited);
    }
    parse_positive_integer(value, "limit").map(Limit::Bounded)
}

/// Validates the `page` parameter; an absent value defaults to page 1.
pub fn validate_page(value: Option<&Value>) -> Result<u64, ParseError> {
    match value {
        None => Ok(1),
        Some(value) => parse_positive_integer(value, "page"),
    }
}

/// Validates the `search` parameter: strings and numbers normalize to a
/// string.
pub fn validate_search(value: &Value) -> Result<String, ParseError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(ParseError::new(
            "search must be a string or a number".to_string(),
        )),
    }
}

/// Shared numeric handling for `limit` and `page`: accepts integers and
/// numeric strings, rejects non-finite, fractional and sub-1 input.
fn parse_positive_integer(value: &Value, field: &str) -> Result<u64, ParseError> {
    let number = match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| ParseError::new(format!("{} must be a finite number", field)))?,
        Value::String(s) => s.parse::<f64>().map_err(|_| {
            ParseError::new(format!("{} must be a number or a numeric string", field))
        })?,
        _ => {
            return Err(ParseError::new(format!(
                "{} must be a number or a numeric string",
                field
            )));
        }
    };

    // f64 parsing accepts "inf"/"NaN" style input, which must not pass
    if !number.is_finite() {
        return Err(ParseError::new(format!(
            "{} must be a finite number",
            field
        )));
    }
    if number.fract() != 0.0 {
        return Err(ParseError::new(format!("{} must be an integer", field)));
    }
    if number < 1.0 {
        return Err(ParseError::new(format!("{} must be at least 1", field)));
    }
    Ok(number as u64)
}
