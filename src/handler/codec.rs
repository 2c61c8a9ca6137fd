use serde_json::{Map, Value};

use crate::pipeline::{ErrorCapsule, Record};

/// `listingId` -> `listing_id`
pub fn to_snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for (i, ch) in key.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// `listing_id` -> `listingId`
pub fn to_camel_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper = false;
    for ch in key.chars() {
        if ch == '_' && !out.is_empty() {
            upper = true;
        } else if upper {
            out.push(ch.to_ascii_uppercase());
            upper = false;
        } else {
            out.push(ch);
        }
    }
    out
}

/// Rename every object key in a value, recursively
fn rename_keys(value: Value, rename: &dyn Fn(&str) -> String) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| (rename(&key), rename_keys(value, rename)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(|item| rename_keys(item, rename)).collect()),
        other => other,
    }
}

/// Decode a raw request body into a snake_case record
///
/// A missing or blank body is an empty record. Malformed JSON and
/// non-object bodies are validation failures.
pub fn decode_body(raw: Option<&str>) -> Result<Record, ErrorCapsule> {
    let raw = match raw.map(str::trim) {
        None | Some("") => return Ok(Record::new()),
        Some(raw) => raw,
    };

    let value: Value = serde_json::from_str(raw)
        .map_err(|e| ErrorCapsule::validation_failed(format!("Invalid JSON body: {}", e)))?;

    match rename_keys(value, &to_snake_case) {
        Value::Object(record) => Ok(record),
        _ => Err(ErrorCapsule::validation_failed("Request body must be a JSON object")),
    }
}

/// Encode a response body with camelCase keys
pub fn encode(body: Value) -> Value {
    rename_keys(body, &to_camel_case)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_case_conversion() {
        assert_eq!(to_snake_case("listingId"), "listing_id");
        assert_eq!(to_snake_case("amountCents"), "amount_cents");
        assert_eq!(to_snake_case("name"), "name");
        assert_eq!(to_snake_case("already_snake"), "already_snake");
        assert_eq!(to_camel_case("listing_id"), "listingId");
        assert_eq!(to_camel_case("full_name"), "fullName");
        assert_eq!(to_camel_case("_private"), "_private");
        assert_eq!(to_camel_case("name"), "name");
    }

    #[test]
    fn test_decode_body_renames_nested_keys() {
        let record = decode_body(Some(
            r#"{"listingId": "l1", "audienceAgeSplit": {"buckets": [{"range": "From18To24", "percent": 100}]}}"#,
        ))
        .unwrap();

        assert_eq!(
            Value::Object(record),
            json!({
                "listing_id": "l1",
                "audience_age_split": {"buckets": [{"range": "From18To24", "percent": 100}]}
            })
        );
    }

    #[test]
    fn test_decode_empty_and_invalid_bodies() {
        assert!(decode_body(None).unwrap().is_empty());
        assert!(decode_body(Some("   ")).unwrap().is_empty());

        let err = decode_body(Some("{oops")).unwrap_err();
        assert_eq!(err.status, 400);
        assert!(err.message.starts_with("Invalid JSON body"));

        let err = decode_body(Some("[1, 2]")).unwrap_err();
        assert_eq!(err.message, "Request body must be a JSON object");
    }

    #[test]
    fn test_encode_renames_keys_not_values() {
        let encoded = encode(json!([
            {"full_name": "Ada Lovelace", "kind": "From18To24", "deliverables": [{"amount_cents": 5}]}
        ]));
        assert_eq!(
            encoded,
            json!([{"fullName": "Ada Lovelace", "kind": "From18To24", "deliverables": [{"amountCents": 5}]}])
        );
    }
}
