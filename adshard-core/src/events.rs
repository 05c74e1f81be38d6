use crate::model::{BannerLimits, DEVICE_DESKTOP, ServingRecord};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod topics {
    pub const BANNER_START: &str = "adeliver.banner.start";
    pub const BANNER_STOP: &str = "adeliver.banner.stop";
    pub const ACTION_CLICK: &str = "adclick.action.click";
    pub const ACTION_VIEW: &str = "adshow.action.show";
    pub const BANNER_LIMITS: &str = "adeliver.banner.limits";

    /// Topics consumed by the server loop.
    pub const INBOUND: [&str; 4] = [BANNER_START, BANNER_STOP, ACTION_CLICK, ACTION_VIEW];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BannerStartEvent {
    pub banner_id: u64,
    pub user_id: u64,
    #[serde(default, with = "crate::model::base64_bytes")]
    pub img_data: Bytes,
    #[serde(default)]
    pub banner_text: String,
    #[serde(default)]
    pub banner_url: String,
    pub limit_shows: i64,
    pub limit_clicks: i64,
    #[serde(default)]
    pub limit_budget: f64,
    #[serde(default = "default_device")]
    pub device: String,
    pub category_id: u64,
}

fn default_device() -> String {
    DEVICE_DESKTOP.to_string()
}

impl BannerStartEvent {
    pub fn limits(&self) -> BannerLimits {
        BannerLimits {
            banner_id: self.banner_id,
            limit_impressions: self.limit_shows,
            limit_clicks: self.limit_clicks,
            limit_budget: self.limit_budget,
        }
    }

    pub fn record_for(&self, platform_id: u64) -> ServingRecord {
        ServingRecord {
            platform_id,
            device: self.device.clone(),
            banner_id: self.banner_id,
            banner_url: self.banner_url.clone(),
            banner_text: self.banner_text.clone(),
            category_id: self.category_id,
            image: self.img_data.clone(),
            owner_user_id: self.user_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BannerStopEvent {
    pub banner_id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClickEvent {
    pub banner_id: u64,
    pub platform_id: u64,
    #[serde(default)]
    pub view_id: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewEvent {
    pub banner_id: u64,
    pub platform_id: u64,
    #[serde(default)]
    pub user_agent: String,
    #[serde(default = "default_device")]
    pub device: String,
    #[serde(default)]
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitReason {
    Clicks,
    Views,
}

impl fmt::Display for LimitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clicks => f.write_str("clicks"),
            Self::Views => f.write_str("views"),
        }
    }
}

/// Outbound notice that a banner crossed one of its limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BannerReachedLimits {
    pub banner_id: u64,
    pub reason: LimitReason,
}
