use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::schema;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollaborationStatus {
    #[default]
    Applied,
    Accepted,
    Rejected,
    Completed,
}

/// An influencer's application to a listing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Collaboration {
    pub id: String,
    /// Identity of the applying influencer
    pub owner_id: String,
    pub listing_id: String,
    pub influencer_id: String,
    pub brand_id: String,
    pub status: CollaborationStatus,
    pub message: String,
}

entity!(Collaboration, "Collaboration", unique = false);

schema!(Collaboration {
    id: scalar,
    owner_id: scalar,
    listing_id: scalar,
    influencer_id: scalar,
    brand_id: scalar,
    status: enumeration,
    message: scalar,
});

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollaborationDto {
    pub id: String,
    pub listing_id: String,
    pub influencer_id: String,
    pub brand_id: String,
    pub status: String,
    pub message: String,
}

schema!(CollaborationDto {
    id: scalar,
    listing_id: scalar,
    influencer_id: scalar,
    brand_id: scalar,
    status: scalar,
    message: scalar,
});

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct CollaborationPayload {
    #[validate(length(min = 1))]
    pub listing_id: Option<String>,
    #[validate(length(max = 1000))]
    pub message: Option<String>,
}
