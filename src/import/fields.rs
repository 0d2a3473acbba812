use serde_json::{Map, Value};

pub const OPTION_LETTERS: [char; 5] = ['a', 'b', 'c', 'd', 'e'];

/// Text content of a field: trimmed non-blank strings, or numbers rendered as
/// text. Anything else counts as absent.
pub fn text(raw: &Map<String, Value>, key: &str) -> Option<String> {
    match raw.get(key)? {
        Value::String(s) => {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// First of `keys` carrying text.
pub fn text_any(raw: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| text(raw, k))
}

/// `option_N`, falling back to `option_<letter>` and then the bare letter.
/// `n` is 1-based.
pub fn option(raw: &Map<String, Value>, n: usize) -> Option<String> {
    let primary = format!("option_{n}");
    if let Some(v) = text(raw, &primary) {
        return Some(v);
    }
    let letter = OPTION_LETTERS.get(n.checked_sub(1)?)?;
    text(raw, &format!("option_{letter}")).or_else(|| text(raw, &letter.to_string()))
}

/// First non-null of `ans`, `answer`, `correct_answer`.
pub fn answer_value(raw: &Map<String, Value>) -> Option<&Value> {
    ["ans", "answer", "correct_answer"]
        .into_iter()
        .filter_map(|k| raw.get(k))
        .find(|v| !v.is_null())
}

/// Integer 1-5, numeric string "1".."5", letter A-E or `option_N`, any case.
pub fn parse_answer(v: &Value) -> Option<u8> {
    let n = match v {
        Value::Number(n) => n.as_u64()?,
        Value::String(s) => {
            let s = s.trim();
            let s = match s.get(..7) {
                Some(prefix) if prefix.eq_ignore_ascii_case("option_") => &s[7..],
                _ => s,
            };
            let mut chars = s.chars();
            let (Some(c), None) = (chars.next(), chars.next()) else {
                return None;
            };
            if let Some(d) = c.to_digit(10) {
                u64::from(d)
            } else {
                let idx = OPTION_LETTERS
                    .iter()
                    .position(|l| *l == c.to_ascii_lowercase())?;
                idx as u64 + 1
            }
        }
        _ => return None,
    };
    if (1..=5).contains(&n) {
        Some(n as u8)
    } else {
        None
    }
}

/// Truncate to at most `max` characters. A cut that lands after whitespace
/// drops it, so clipped text stays trimmed.
pub fn clip(s: String, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].trim_end().to_string(),
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn answer_forms_are_equivalent() {
        for v in [json!(3), json!("3"), json!("C"), json!("c"), json!(" C ")] {
            assert_eq!(parse_answer(&v), Some(3), "{v}");
        }
        assert_eq!(parse_answer(&json!("E")), Some(5));
        assert_eq!(parse_answer(&json!("OPTION_2")), Some(2));
        assert_eq!(parse_answer(&json!("option_5")), Some(5));
        for v in [json!(0), json!(6), json!("F"), json!("10"), json!("AB"), json!(2.5), json!(true), json!(""), json!("OPTION_6"), json!("option_")] {
            assert_eq!(parse_answer(&v), None, "{v}");
        }
    }

    #[test]
    fn ans_takes_precedence_over_correct_answer() {
        let raw = json!({ "ans": 1, "correct_answer": 2 });
        let raw = raw.as_object().expect("obj");
        assert_eq!(answer_value(raw), Some(&json!(1)));

        let raw = json!({ "ans": null, "correct_answer": "B" });
        let raw = raw.as_object().expect("obj");
        assert_eq!(answer_value(raw), Some(&json!("B")));

        let raw = json!({ "answer": "D", "correct_answer": "B" });
        let raw = raw.as_object().expect("obj");
        assert_eq!(answer_value(raw), Some(&json!("D")));
    }

    #[test]
    fn option_letter_alias() {
        let raw = json!({ "option_1": "x", "option_b": "y", "option_3": "  " });
        let raw = raw.as_object().expect("obj");
        assert_eq!(option(raw, 1).as_deref(), Some("x"));
        assert_eq!(option(raw, 2).as_deref(), Some("y"));
        assert_eq!(option(raw, 3), None);
        assert_eq!(option(raw, 6), None);

        let raw = json!({ "a": "bare", "option_a": "prefixed", "c": "third" });
        let raw = raw.as_object().expect("obj");
        assert_eq!(option(raw, 1).as_deref(), Some("prefixed"));
        assert_eq!(option(raw, 3).as_deref(), Some("third"));
    }

    #[test]
    fn clip_respects_char_boundaries() {
        assert_eq!(clip("héllo".to_string(), 2), "hé");
        assert_eq!(clip("abc".to_string(), 10), "abc");
        assert_eq!(clip("ab cd".to_string(), 3), "ab");
    }
}
