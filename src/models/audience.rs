use serde::{Deserialize, Serialize};

use crate::schema;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgeRange {
    #[default]
    Under18,
    From18To24,
    From25To34,
    From35To44,
    From45To54,
    Over55,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgeBucket {
    pub range: AgeRange,
    pub percent: u8,
}

schema!(AgeBucket {
    range: enumeration,
    percent: scalar,
});

/// Share of an influencer's audience per age range
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudienceAgeSplit {
    pub id: String,
    pub owner_id: String,
    pub influencer_id: String,
    pub buckets: Vec<AgeBucket>,
}

impl AudienceAgeSplit {
    pub fn total(&self) -> u32 {
        self.buckets.iter().map(|b| u32::from(b.percent)).sum()
    }
}

entity!(AudienceAgeSplit, "Audience age split", unique = true);

schema!(AudienceAgeSplit {
    id: scalar,
    owner_id: scalar,
    influencer_id: scalar,
    buckets: list(AgeBucket),
});

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgeBucketDto {
    pub range: String,
    pub percent: u8,
}

schema!(AgeBucketDto {
    range: scalar,
    percent: scalar,
});

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudienceAgeSplitDto {
    pub id: String,
    pub influencer_id: String,
    pub buckets: Vec<AgeBucketDto>,
}

schema!(AudienceAgeSplitDto {
    id: scalar,
    influencer_id: scalar,
    buckets: list(AgeBucketDto),
});

/// Share of an influencer's audience per gender
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudienceGenderSplit {
    pub id: String,
    pub owner_id: String,
    pub influencer_id: String,
    pub female: u8,
    pub male: u8,
    pub other: u8,
}

impl AudienceGenderSplit {
    pub fn total(&self) -> u32 {
        u32::from(self.female) + u32::from(self.male) + u32::from(self.other)
    }
}

entity!(AudienceGenderSplit, "Audience gender split", unique = true);

schema!(AudienceGenderSplit {
    id: scalar,
    owner_id: scalar,
    influencer_id: scalar,
    female: scalar,
    male: scalar,
    other: scalar,
});

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudienceGenderSplitDto {
    pub id: String,
    pub influencer_id: String,
    pub female: u8,
    pub male: u8,
    pub other: u8,
}

schema!(AudienceGenderSplitDto {
    id: scalar,
    influencer_id: scalar,
    female: scalar,
    male: scalar,
    other: scalar,
});
