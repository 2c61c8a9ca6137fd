use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::schema;

/// A brand profile, at most one per identity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Brand {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub website: String,
    pub email: String,
    pub instahandle: String,
    pub description: String,
    /// Storage key of the uploaded logo
    pub logo: String,
    pub values: Vec<String>,
}

entity!(Brand, "Brand", unique = true);

schema!(Brand {
    id: scalar,
    owner_id: scalar,
    name: scalar,
    website: scalar,
    email: scalar,
    instahandle: scalar,
    description: scalar,
    logo: scalar,
    values: scalar,
});

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrandDto {
    pub id: String,
    pub name: String,
    pub website: String,
    pub email: String,
    pub instahandle: String,
    pub description: String,
    pub logo: String,
    pub values: Vec<String>,
}

schema!(BrandDto {
    id: scalar,
    name: scalar,
    website: scalar,
    email: scalar,
    instahandle: scalar,
    description: scalar,
    logo: scalar,
    values: scalar,
});

/// Inbound brand fields; every field is optional so the same checks serve
/// create and partial update
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct BrandPayload {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    #[validate(url)]
    pub website: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 30))]
    pub instahandle: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub logo: Option<String>,
    pub values: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_validation() {
        let ok: BrandPayload = serde_json::from_value(json!({
            "name": "Acme",
            "website": "https://acme.example",
            "email": "hello@acme.example"
        }))
        .unwrap();
        assert!(ok.validate().is_ok());

        let bad: BrandPayload = serde_json::from_value(json!({
            "name": "",
            "website": "not a url",
            "email": "nope"
        }))
        .unwrap();
        let errors = bad.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("website"));
        assert!(fields.contains_key("email"));
    }

    #[test]
    fn test_empty_payload_is_valid_for_updates() {
        assert!(BrandPayload::default().validate().is_ok());
    }
}
