//! Blob encoding: gzip-compressed UTF-8 JSON.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde_json::Value;

use crate::CacheError;

/// Compresses the JSON text of `profile`.
///
/// # Errors
///
/// Returns [`CacheError::Json`] if serialization fails, or
/// [`CacheError::Io`] if compression fails.
pub fn encode(profile: &Value) -> Result<Vec<u8>, CacheError> {
    let text = serde_json::to_string(profile)?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(text.as_bytes())?;
    Ok(encoder.finish()?)
}

/// Decompresses a blob, returning the parsed profile and its JSON text.
///
/// # Errors
///
/// Returns [`CacheError::Io`] if the blob is not gzip or not UTF-8, or
/// [`CacheError::Json`] if the text is not JSON.
pub fn decode(bytes: &[u8]) -> Result<(Value, String), CacheError> {
    let mut text = String::new();
    GzDecoder::new(bytes).read_to_string(&mut text)?;
    let profile = serde_json::from_str(&text)?;
    Ok((profile, text))
}

/// Escapes JSON text so it can be embedded in an HTML `<script>` element.
///
/// `<`, `>`, `&` and the line/paragraph separators only ever occur inside
/// JSON strings, where their `\uXXXX` forms decode to the same characters.
#[must_use]
pub fn escape_for_script(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => escaped.push_str("\\u003c"),
            '>' => escaped.push_str("\\u003e"),
            '&' => escaped.push_str("\\u0026"),
            '\u{2028}' => escaped.push_str("\\u2028"),
            '\u{2029}' => escaped.push_str("\\u2029"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn decodes_what_it_encodes() {
        let profile = json!({
            "name": "Détroit, MI",
            "values": {"this": -3, "state": 0},
            "nested": [1.5, null, {"x": "y"}],
        });
        let (decoded, text) = decode(&encode(&profile).unwrap()).unwrap();
        assert_eq!(decoded, profile);
        assert_eq!(serde_json::from_str::<Value>(&text).unwrap(), profile);
    }

    #[test]
    fn round_trips_varied_shapes() {
        let mut deep = json!("leaf");
        for depth in 0..100 {
            deep = if depth % 2 == 0 {
                json!({ "level": deep })
            } else {
                json!([deep])
            };
        }

        let profiles = [
            json!({}),
            json!({"a": {}, "b": [], "c": {"d": {"e": {}}}}),
            json!({"floats": [0.1, 1e300, -2.5e-8, 0.0, -1.0, 123_456.789]}),
            json!({"ints": [0, -1, i64::MIN, i64::MAX, u64::MAX]}),
            json!({"text": "tab\tnew\nline \"quoted\" back\\slash \u{0}\u{1f} é 漢 🙂"}),
            json!({"\u{2028}key": "\u{2029}", "": null, "t": true, "f": false}),
            json!({"deep": deep}),
            json!([null, [], [[]], [{}]]),
        ];

        for profile in profiles {
            let (decoded, text) = decode(&encode(&profile).unwrap()).unwrap();
            assert_eq!(decoded, profile);
            assert_eq!(serde_json::from_str::<Value>(&text).unwrap(), profile);
        }
    }

    #[test]
    fn rejects_plain_text() {
        assert!(matches!(decode(b"{}"), Err(CacheError::Io(_))));
    }

    #[test]
    fn escaped_text_is_equivalent_json() {
        let text = serde_json::to_string(&json!({"a": "</script><b>&"})).unwrap();
        let escaped = escape_for_script(&text);
        assert!(!escaped.contains('<'));
        assert!(!escaped.contains('&'));
        assert_eq!(
            serde_json::from_str::<Value>(&escaped).unwrap(),
            json!({"a": "</script><b>&"})
        );
    }

    #[test]
    fn escapes_script_breakers() {
        let value = json!({
            "close": "</script>",
            "comment": "<!-- x -->",
            "separators": "a\u{2028}b\u{2029}c",
        });
        let escaped = escape_for_script(&serde_json::to_string(&value).unwrap());

        assert!(!escaped.contains("</script>"));
        assert!(!escaped.contains("<!--"));
        assert!(!escaped.contains('\u{2028}'));
        assert!(!escaped.contains('\u{2029}'));
        assert!(escaped.contains("\\u003c/script\\u003e"));
        assert!(escaped.contains("a\\u2028b\\u2029c"));
        assert_eq!(serde_json::from_str::<Value>(&escaped).unwrap(), value);
    }
}
