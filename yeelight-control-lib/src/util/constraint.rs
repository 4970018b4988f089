//! Parameter constraints applied to command values before they are sent.
//!
//! Both functions are total: a bad input is replaced, never reported.

use serde_json::Value;

/// Parses `input` as an integer and clamps it into `[min, max]`.
///
/// Anything that is not a finite number, or a string holding one, is read as `0`
/// before clamping. Fractional values are truncated toward zero.
pub fn clamp_numeric<V: Into<Value>>(input: V, min: i64, max: i64) -> i64 {
    let value = parse_integer(&input.into()).unwrap_or(0);
    value.max(min).min(max)
}

/// Returns `input` if it is one of `allowed`, otherwise `fallback`.
pub fn first_if_allowed<V: PartialEq>(input: V, allowed: &[V], fallback: V) -> V {
    if allowed.contains(&input) {
        input
    } else {
        fallback
    }
}

/// Like [`first_if_allowed`], falling back to the type's default (an empty string for `&str`).
pub fn first_if_allowed_or_default<V: PartialEq + Default>(input: V, allowed: &[V]) -> V {
    first_if_allowed(input, allowed, V::default())
}

fn parse_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_u64().map(|n| n.min(i64::MAX as u64) as i64))
            .or_else(|| number.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(text) => {
            let text = text.trim();
            text.parse::<i64>().ok().or_else(|| {
                text.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.trunc() as i64)
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clamp_numeric_limits_to_max() {
        assert_eq!(clamp_numeric(100, 10, 25), 25);
    }

    #[test]
    fn test_clamp_numeric_limits_to_min() {
        assert_eq!(clamp_numeric(1, 10, 25), 10);
    }

    #[test]
    fn test_clamp_numeric_keeps_valid_values() {
        assert_eq!(clamp_numeric(5, 0, 10), 5);
    }

    #[test]
    fn test_clamp_numeric_non_numbers_become_zero() {
        assert_eq!(clamp_numeric(f64::NAN, 0, 10), 0);
        assert_eq!(clamp_numeric(json!([]), 0, 10), 0);
        assert_eq!(clamp_numeric("string", 0, 10), 0);
        assert_eq!(clamp_numeric(Value::Null, 0, 10), 0);
    }

    #[test]
    fn test_clamp_numeric_parses_numeric_strings() {
        assert_eq!(clamp_numeric("42", 0, 100), 42);
        assert_eq!(clamp_numeric(" 7.9 ", 0, 100), 7);
        assert_eq!(clamp_numeric("4000", 1700, 6500), 4000);
    }

    #[test]
    fn test_clamp_numeric_non_number_clamps_zero_into_range() {
        assert_eq!(clamp_numeric("nope", 1700, 6500), 1700);
        assert_eq!(clamp_numeric(f64::INFINITY, 1, 100), 1);
    }

    #[test]
    fn test_first_if_allowed_returns_valid_input() {
        let allowed = [json!("validString"), json!(2), json!(3), json!(4)];
        assert_eq!(
            first_if_allowed(json!("validString"), &allowed, json!("default")),
            json!("validString")
        );
        assert_eq!(first_if_allowed(json!(3), &allowed, json!("default")), json!(3));
    }

    #[test]
    fn test_first_if_allowed_returns_fallback_for_invalid_input() {
        let allowed = [json!("validString"), json!(2), json!(3), json!(4)];
        assert_eq!(
            first_if_allowed(json!("invalidString"), &allowed, json!("default")),
            json!("default")
        );
    }

    #[test]
    fn test_first_if_allowed_without_fallback_yields_empty() {
        assert_eq!(
            first_if_allowed_or_default("invalidString", &["validString"]),
            ""
        );
        assert_eq!(
            first_if_allowed_or_default("validString", &["validString"]),
            "validString"
        );
    }

    #[test]
    fn test_first_if_allowed_with_empty_set_always_falls_back() {
        assert_eq!(first_if_allowed("smooth", &[], "sudden"), "sudden");
    }
}
