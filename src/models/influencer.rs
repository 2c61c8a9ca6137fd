use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::schema;

/// An influencer profile, at most one per identity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Influencer {
    pub id: String,
    pub owner_id: String,
    pub given_name: String,
    pub family_name: String,
    pub email: String,
    pub bio: String,
    pub instahandle: String,
    pub location: String,
    /// Storage key of the profile image
    pub image: String,
    pub categories: Vec<String>,
    pub follower_count: u32,
}

impl Influencer {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.given_name, self.family_name)
            .trim()
            .to_string()
    }
}

entity!(Influencer, "Influencer", unique = true);

schema!(Influencer {
    id: scalar,
    owner_id: scalar,
    given_name: scalar,
    family_name: scalar,
    email: scalar,
    bio: scalar,
    instahandle: scalar,
    location: scalar,
    image: scalar,
    categories: scalar,
    follower_count: scalar,
});

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InfluencerDto {
    pub id: String,
    pub given_name: String,
    pub family_name: String,
    pub full_name: String,
    pub email: String,
    pub bio: String,
    pub instahandle: String,
    pub location: String,
    pub image: String,
    pub categories: Vec<String>,
    pub follower_count: u32,
}

schema!(InfluencerDto {
    id: scalar,
    given_name: scalar,
    family_name: scalar,
    full_name: scalar,
    email: scalar,
    bio: scalar,
    instahandle: scalar,
    location: scalar,
    image: scalar,
    categories: scalar,
    follower_count: scalar,
});

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct InfluencerPayload {
    #[validate(length(min = 1, max = 80))]
    pub given_name: Option<String>,
    #[validate(length(min = 1, max = 80))]
    pub family_name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 2000))]
    pub bio: Option<String>,
    #[validate(length(max = 30))]
    pub instahandle: Option<String>,
    #[validate(length(max = 120))]
    pub location: Option<String>,
    pub image: Option<String>,
    pub categories: Option<serde_json::Value>,
    #[validate(range(max = 1_000_000_000))]
    pub follower_count: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_full_name() {
        let influencer = Influencer {
            given_name: "Ada".to_string(),
            family_name: "Lovelace".to_string(),
            ..Influencer::default()
        };
        assert_eq!(influencer.full_name(), "Ada Lovelace");
        assert_eq!(Influencer::default().full_name(), "");
    }

    #[test]
    fn test_payload_rejects_bad_email() {
        let payload: InfluencerPayload = serde_json::from_value(json!({"email": "ada"})).unwrap();
        assert!(payload.validate().is_err());
    }
}
