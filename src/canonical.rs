use serde_json::Value;

/// Canonical byte form of a decoded JSON value.
///
/// Object keys are emitted in byte-wise ascending order at every nesting
/// level; array element order is preserved; scalars use their JSON text
/// form. Two values are equal for comparison purposes iff their canonical
/// bytes are identical, so key order and whitespace in the source document
/// never matter, while order inside nested arrays does.
pub fn canonical_bytes(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    write_value(&mut out, value);
    out
}

fn write_value(out: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(true) => out.extend_from_slice(b"true"),
        Value::Bool(false) => out.extend_from_slice(b"false"),
        Value::Number(n) => out.extend_from_slice(n.to_string().as_bytes()),
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_value(out, item);
            }
            out.push(b']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_unstable_by(|(a, _), (b, _)| a.cmp(b));
            out.push(b'{');
            for (i, (key, item)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_string(out, key);
                out.push(b':');
                write_value(out, item);
            }
            out.push(b'}');
        }
    }
}

fn write_string(out: &mut Vec<u8>, s: &str) {
    out.push(b'"');
    for c in s.chars() {
        match c {
            '"' => out.extend_from_slice(b"\\\""),
            '\\' => out.extend_from_slice(b"\\\\"),
            '\u{8}' => out.extend_from_slice(b"\\b"),
            '\u{c}' => out.extend_from_slice(b"\\f"),
            '\n' => out.extend_from_slice(b"\\n"),
            '\r' => out.extend_from_slice(b"\\r"),
            '\t' => out.extend_from_slice(b"\\t"),
            c if (c as u32) < 0x20 => {
                out.extend_from_slice(format!("\\u{:04x}", c as u32).as_bytes());
            }
            c => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    out.push(b'"');
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_deterministic() {
        let value = json!({"b": [1, 2], "a": {"y": null, "x": true}});
        assert_eq!(canonical_bytes(&value), canonical_bytes(&value));
    }

    #[test]
    fn test_key_order_is_irrelevant() {
        let a: Value = serde_json::from_str(r#"{"a": 1, "b": 2, "c": {"y": 1, "x": 2}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"c": {"x": 2, "y": 1}, "b": 2, "a": 1}"#).unwrap();
        assert_eq!(canonical_bytes(&a), canonical_bytes(&b));
    }

    #[test]
    fn test_keys_are_sorted_bytewise() {
        let value = json!({"b": 2, "a": 1});
        assert_eq!(canonical_bytes(&value), br#"{"a":1,"b":2}"#);
    }

    #[test]
    fn test_nested_array_order_is_significant() {
        assert_ne!(
            canonical_bytes(&json!([1, 2])),
            canonical_bytes(&json!([2, 1]))
        );
    }

    #[test]
    fn test_scalars() {
        assert_eq!(canonical_bytes(&json!(null)), b"null");
        assert_eq!(canonical_bytes(&json!(true)), b"true");
        assert_eq!(canonical_bytes(&json!(-17)), b"-17");
        assert_eq!(canonical_bytes(&json!("hi")), br#""hi""#);
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            canonical_bytes(&json!("a\"b\\c\nd\u{1}")),
            br#""a\"b\\c\nd\u0001""#
        );
    }

    #[test]
    fn test_integer_and_float_bytes_differ() {
        let one = json!(1);
        let one_point_zero = json!(1.0);
        assert_ne!(canonical_bytes(&one), canonical_bytes(&one_point_zero));
    }
}
