// src/normalize/coerce.rs

use serde_json::Value;

/// Lenient float: JSON numbers or numeric strings, finite only.
pub fn to_f64(v: Option<&Value>) -> Option<f64> {
    let parsed = match v? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    parsed.is_finite().then_some(parsed)
}

/// Lenient integer: integral numbers or strings such as `"2021"` / `"2021.0"`.
pub fn to_i64(v: Option<&Value>) -> Option<i64> {
    match v? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
        _ => None,
    }
}

fn integral(f: f64) -> Option<i64> {
    (f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64).then(|| f as i64)
}

/// Display text; numbers are rendered, everything else is absent.
pub fn to_text(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Key text: like [`to_text`] but blank strings count as missing.
pub fn to_key(v: Option<&Value>) -> Option<String> {
    to_text(v).filter(|s| !s.trim().is_empty())
}
