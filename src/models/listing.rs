use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::schema;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListingKind {
    #[default]
    Product,
    Experience,
    Event,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListingStatus {
    #[default]
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    #[default]
    Instagram,
    TikTok,
    YouTube,
}

/// One piece of content the influencer commits to
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Deliverable {
    pub platform: Platform,
    pub quantity: u32,
    pub notes: String,
}

schema!(Deliverable {
    platform: enumeration,
    quantity: scalar,
    notes: scalar,
});

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Compensation {
    pub amount_cents: u64,
    pub currency: String,
}

schema!(Compensation {
    amount_cents: scalar,
    currency: scalar,
});

/// An opportunity published by a brand
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Listing {
    pub id: String,
    /// Identity of the brand owner who published the listing
    pub owner_id: String,
    pub brand_id: String,
    pub title: String,
    pub description: String,
    pub kind: ListingKind,
    pub status: ListingStatus,
    pub image: String,
    pub deliverables: Vec<Deliverable>,
    pub compensation: Compensation,
}

entity!(Listing, "Listing", unique = false);

schema!(Listing {
    id: scalar,
    owner_id: scalar,
    brand_id: scalar,
    title: scalar,
    description: scalar,
    kind: enumeration,
    status: enumeration,
    image: scalar,
    deliverables: list(Deliverable),
    compensation: nested(Compensation),
});

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliverableDto {
    pub platform: String,
    pub quantity: u32,
    pub notes: String,
}

schema!(DeliverableDto {
    platform: scalar,
    quantity: scalar,
    notes: scalar,
});

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompensationDto {
    pub amount_cents: u64,
    pub currency: String,
}

schema!(CompensationDto {
    amount_cents: scalar,
    currency: scalar,
});

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingDto {
    pub id: String,
    pub brand_id: String,
    pub title: String,
    pub description: String,
    pub kind: String,
    pub status: String,
    pub image: String,
    pub deliverables: Vec<DeliverableDto>,
    pub compensation: CompensationDto,
}

schema!(ListingDto {
    id: scalar,
    brand_id: scalar,
    title: scalar,
    description: scalar,
    kind: scalar,
    status: scalar,
    image: scalar,
    deliverables: list(DeliverableDto),
    compensation: nested(CompensationDto),
});

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct ListingPayload {
    #[validate(length(min = 1, max = 140))]
    pub title: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    pub image: Option<String>,
    #[validate(length(max = 20))]
    pub deliverables: Option<Vec<serde_json::Value>>,
}
