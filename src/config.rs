use std::path::Path;
use std::time::Duration;

use anyhow::{Context as _, Result, bail};
use chrono::TimeDelta;
use serde_derive::Deserialize;

use crate::beacon::MIN_RSSI;
use crate::status::FRESH_STATUS_TIMEOUT_SECS;
use crate::window::RECENT_BEACONS_MAX_AGE;

#[derive(Deserialize, Debug, Default, Clone)]
pub struct AppConfig {
    pub mqtt: Option<MqttConfig>,
    pub scan: Option<ScanConfig>,
    pub report: Option<ReportConfig>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct MqttConfig {
    pub host: String,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub publisher_id: Option<String>,
    pub topic_path: Option<String>,
    pub keep_alive_seconds: Option<u64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct ScanConfig {
    pub min_rssi: Option<i16>,
    pub recent_beacons_seconds: Option<u64>,
}

impl ScanConfig {
    pub fn min_rssi(&self) -> i16 {
        self.min_rssi.unwrap_or(MIN_RSSI)
    }

    pub fn recent_beacons_max_age(&self) -> Duration {
        self.recent_beacons_seconds
            .map(Duration::from_secs)
            .unwrap_or(RECENT_BEACONS_MAX_AGE)
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct ReportConfig {
    pub interval_millis: Option<u64>,
    pub fresh_status_seconds: Option<i64>,
    /// Only report while the earbuds are linked to this host.
    pub require_linked: Option<bool>,
}

impl ReportConfig {
    /// Never zero; a zero period would stall the reporter.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_millis.unwrap_or(1000).max(1))
    }

    pub fn fresh_status_seconds(&self) -> i64 {
        self.fresh_status_seconds.unwrap_or(FRESH_STATUS_TIMEOUT_SECS)
    }

    /// Falls back to the default timeout when the configured one is out of range.
    pub fn fresh_status_timeout(&self) -> TimeDelta {
        TimeDelta::try_seconds(self.fresh_status_seconds())
            .unwrap_or_else(|| TimeDelta::seconds(FRESH_STATUS_TIMEOUT_SECS))
    }

    fn validate(&self) -> Result<()> {
        if self.interval_millis == Some(0) {
            bail!("report.interval_millis must be greater than 0");
        }
        if let Some(seconds) = self.fresh_status_seconds {
            if TimeDelta::try_seconds(seconds).is_none() {
                bail!("report.fresh_status_seconds out of range: {seconds}");
            }
        }
        Ok(())
    }

    pub fn require_linked(&self) -> bool {
        self.require_linked.unwrap_or(true)
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        Self::parse(&contents)
            .with_context(|| format!("failed to load config file: {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig =
            toml::de::from_str(contents).context("failed to parse config")?;
        if let Some(report) = &config.report {
            report.validate().context("invalid [report] section")?;
        }
        Ok(config)
    }

    pub fn scan(&self) -> ScanConfig {
        self.scan.clone().unwrap_or_default()
    }

    pub fn report(&self) -> ReportConfig {
        self.report.clone().unwrap_or_default()
    }
}
