use serde::{Deserialize, Serialize};

/// Image storage layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageConfig {
    /// Prefix turning a storage key into a public URL
    pub public_base_url: String,
    pub brand_prefix: String,
    pub influencer_prefix: String,
    pub listing_prefix: String,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            public_base_url: "http://localhost:3000/images".to_string(),
            brand_prefix: "brands".to_string(),
            influencer_prefix: "influencers".to_string(),
            listing_prefix: "listings".to_string(),
        }
    }
}
