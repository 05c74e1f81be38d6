use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEVICE_DESKTOP: &str = "desktop";

/// Administrator limits of one banner, kept on the counter shard of the banner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BannerLimits {
    #[serde(rename = "id")]
    pub banner_id: u64,
    #[serde(rename = "limit_shows")]
    pub limit_impressions: i64,
    pub limit_clicks: i64,
    pub limit_budget: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CounterField {
    Clicks,
    Impressions,
    Spend,
}

impl CounterField {
    pub fn key_suffix(self) -> &'static str {
        match self {
            Self::Clicks => "click",
            Self::Impressions => "show",
            Self::Spend => "spend",
        }
    }
}

impl fmt::Display for CounterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key_suffix())
    }
}

/// Counter reading: clicks and impressions are integral, spend is fractional.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CounterValue {
    Count(i64),
    Amount(f64),
}

impl CounterValue {
    pub fn as_count(self) -> Option<i64> {
        match self {
            Self::Count(value) => Some(value),
            Self::Amount(_) => None,
        }
    }

    pub fn as_amount(self) -> f64 {
        match self {
            Self::Count(value) => value as f64,
            Self::Amount(value) => value,
        }
    }
}

/// Placement of one banner on one platform and device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServingRecord {
    pub platform_id: u64,
    pub device: String,
    pub banner_id: u64,
    pub banner_url: String,
    pub banner_text: String,
    pub category_id: u64,
    #[serde(rename = "img_data", default, with = "base64_bytes")]
    pub image: Bytes,
    #[serde(rename = "user_id")]
    pub owner_user_id: u64,
}

impl ServingRecord {
    pub fn key(&self) -> RecordKey {
        RecordKey {
            platform_id: self.platform_id,
            device: self.device.clone(),
            banner_id: self.banner_id,
        }
    }
}

/// Primary key of a serving record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub platform_id: u64,
    pub device: String,
    pub banner_id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    pub platform_id: u64,
    pub category_id: u64,
}
/// Image bytes travel as standard base64 text; `null` reads as empty.
pub(crate) mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let encoded = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        STANDARD
            .decode(encoded.as_bytes())
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}

