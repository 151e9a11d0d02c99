//! Decoded earbuds status.
//!
//! Levels are the raw nibbles from the beacon: `0..=10` are battery tiers in
//! 10% steps and [`DISCONNECTED_LEVEL`] marks a part that is not reporting.

use chrono::{DateTime, TimeDelta, Utc};
use serde_derive::Serialize;

use crate::device::DeviceInfo;

pub const DISCONNECTED_LEVEL: u8 = 15;
pub const MAX_CONNECTED_LEVEL: u8 = 10;

pub const FRESH_STATUS_TIMEOUT_SECS: i64 = 30;

const CHARGING_MARKER: &str = "+";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Model {
    #[default]
    Standard,
    Pro,
}

impl Model {
    pub fn as_str(&self) -> &'static str {
        match self {
            Model::Standard => "standard",
            Model::Pro => "pro",
        }
    }
}

#[derive(Clone, Debug)]
pub struct StatusSnapshot {
    pub left_level: u8,
    pub right_level: u8,
    pub case_level: u8,
    pub left_charging: bool,
    pub right_charging: bool,
    pub case_charging: bool,
    pub model: Model,
    pub device: Option<DeviceInfo>,
    pub created_at: DateTime<Utc>,
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        StatusSnapshot::disconnected()
    }
}

impl StatusSnapshot {
    /// The status in effect before any beacon has been decoded.
    pub fn disconnected() -> Self {
        StatusSnapshot {
            left_level: DISCONNECTED_LEVEL,
            right_level: DISCONNECTED_LEVEL,
            case_level: DISCONNECTED_LEVEL,
            left_charging: false,
            right_charging: false,
            case_charging: false,
            model: Model::Standard,
            device: None,
            created_at: Utc::now(),
        }
    }

    pub fn left_percent(&self) -> String {
        battery_percent(self.left_level, self.left_charging)
    }

    pub fn right_percent(&self) -> String {
        battery_percent(self.right_level, self.right_charging)
    }

    pub fn case_percent(&self) -> String {
        battery_percent(self.case_level, self.case_charging)
    }

    pub fn is_left_connected(&self) -> bool {
        is_connected(self.left_level)
    }

    pub fn is_right_connected(&self) -> bool {
        is_connected(self.right_level)
    }

    pub fn is_case_connected(&self) -> bool {
        is_connected(self.case_level)
    }

    pub fn is_all_disconnected(&self) -> bool {
        self.left_level == DISCONNECTED_LEVEL
            && self.right_level == DISCONNECTED_LEVEL
            && self.case_level == DISCONNECTED_LEVEL
    }

    pub fn is_standard(&self) -> bool {
        self.model == Model::Standard
    }

    pub fn is_pro(&self) -> bool {
        self.model == Model::Pro
    }

    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.is_fresh_within(now, TimeDelta::seconds(FRESH_STATUS_TIMEOUT_SECS))
    }

    pub fn is_fresh_within(&self, now: DateTime<Utc>, timeout: TimeDelta) -> bool {
        now - self.created_at < timeout
    }

    /// Compact summary for logs, e.g. `Left: 4+ Right: 7+ Case: 2 Model: standard`.
    pub fn status_string(&self) -> String {
        let marker = |charging: bool| if charging { CHARGING_MARKER } else { "" };
        format!(
            "Left: {}{} Right: {}{} Case: {}{} Model: {}",
            self.left_level,
            marker(self.left_charging),
            self.right_level,
            marker(self.right_charging),
            self.case_level,
            marker(self.case_charging),
            self.model.as_str(),
        )
    }
}

/// Display string for a battery level; empty when the part is not reporting.
pub fn battery_percent(level: u8, charging: bool) -> String {
    match level {
        MAX_CONNECTED_LEVEL => "100%".to_string(),
        level if level < MAX_CONNECTED_LEVEL => {
            let marker = if charging { CHARGING_MARKER } else { "" };
            format!("{}%{}", u16::from(level) * 10 + 5, marker)
        }
        _ => String::new(),
    }
}

pub fn is_connected(level: u8) -> bool {
    level <= MAX_CONNECTED_LEVEL
}
