use serde_json::Value;

use crate::error::MalformedPricePair;
use crate::types::PricePair;

/// Normalize a raw outcome-price field into a full pair, or `None` on any
/// decode failure. Never partially defined.
pub fn normalize(raw: &Value) -> Option<PricePair> {
    decode_price_pair(raw).ok()
}

/// Decode a raw outcome-price field.
///
/// Accepts a native array (`[0.4, 0.6]`, `["0.4", "0.6"]`) or its textual
/// encoding. The Gamma API sends `"[\"0.4\", \"0.6\"]"`; Python-style list
/// literals (`"['0.4', '0.6']"`, `"[.4, .6,]"`, `"[True, 0.5]"`) are accepted
/// too. Only the first two elements are read; both must convert to finite
/// numbers.
pub fn decode_price_pair(raw: &Value) -> Result<PricePair, MalformedPricePair> {
    match raw {
        Value::Array(items) => pair_from_items(items),
        Value::String(text) => match decode_literal(text)? {
            Value::Array(items) => pair_from_items(&items),
            other => Err(MalformedPricePair::NotASequence(kind(&other))),
        },
        other => Err(MalformedPricePair::NotASequence(kind(other))),
    }
}

fn decode_literal(text: &str) -> Result<Value, MalformedPricePair> {
    let trimmed = text.trim();
    serde_json::from_str::<Value>(trimmed)
        .or_else(|_| serde_json::from_str::<Value>(&python_list_to_json(trimmed)))
        .map_err(|e| MalformedPricePair::Undecodable(e.to_string()))
}

/// Rewrite a Python list literal into JSON: single-quoted strings, `True` /
/// `False` / `None`, leading-dot numbers, unary plus and a trailing comma
/// before `]`. Anything else is passed through and left for the JSON parser
/// to reject.
fn python_list_to_json(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {
                out.push('"');
                while let Some(ch) = chars.next() {
                    match ch {
                        '\\' => match chars.next() {
                            Some('\'') => out.push('\''),
                            Some(esc) => {
                                out.push('\\');
                                out.push(esc);
                            }
                            None => out.push('\\'),
                        },
                        '"' if c == '\'' => out.push_str("\\\""),
                        _ if ch == c => break,
                        _ => out.push(ch),
                    }
                }
                out.push('"');
            }
            '.' => {
                let after_digit = out.chars().last().is_some_and(|p| p.is_ascii_digit());
                let before_digit = chars.peek().is_some_and(|n| n.is_ascii_digit());
                if !after_digit && before_digit {
                    out.push('0');
                }
                out.push('.');
            }
            '+' if chars.peek().is_some_and(|n| n.is_ascii_digit() || *n == '.') => {}
            ']' => {
                let kept = out.trim_end().len();
                out.truncate(kept);
                if out.ends_with(',') {
                    out.pop();
                }
                out.push(']');
            }
            c if c.is_ascii_alphabetic() => {
                let mut word = String::from(c);
                while let Some(&n) = chars.peek() {
                    if !n.is_ascii_alphanumeric() && n != '_' {
                        break;
                    }
                    word.push(n);
                    chars.next();
                }
                match word.as_str() {
                    "True" => out.push_str("true"),
                    "False" => out.push_str("false"),
                    "None" => out.push_str("null"),
                    _ => out.push_str(&word),
                }
            }
            _ => out.push(c),
        }
    }
    out
}

fn pair_from_items(items: &[Value]) -> Result<PricePair, MalformedPricePair> {
    if items.len() < 2 {
        return Err(MalformedPricePair::TooShort(items.len()));
    }
    Ok(PricePair {
        outcome_1: finite(&items[0]).ok_or(MalformedPricePair::NotFinite { index: 0 })?,
        outcome_2: finite(&items[1]).ok_or(MalformedPricePair::NotFinite { index: 1 })?,
    })
}

fn finite(v: &Value) -> Option<f64> {
    let x = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }?;
    x.is_finite().then_some(x)
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
