use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, error, info};
use serde_derive::Serialize;
use tokio::sync::watch;

use crate::config::ReportConfig;
use crate::mqtt::MqttClient;
use crate::status::{Model, StatusSnapshot};

/// What a status display should show. Battery strings are `None` while the
/// snapshot is stale, i.e. the display should show "updating".
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub model: Model,
    pub name: Option<String>,
    pub native_battery_percent: Option<u8>,
    pub left_connected: bool,
    pub right_connected: bool,
    pub case_connected: bool,
    pub left: Option<String>,
    pub right: Option<String>,
    pub case: Option<String>,
    pub fresh: bool,
    pub updated_at: DateTime<Utc>,
}

/// `None` when nothing should be shown.
pub fn summarize(
    status: &StatusSnapshot,
    linked: bool,
    now: DateTime<Utc>,
    config: &ReportConfig,
) -> Option<StatusReport> {
    if (config.require_linked() && !linked) || status.is_all_disconnected() {
        return None;
    }

    let fresh = status.is_fresh_within(now, config.fresh_status_timeout());
    let shown = |percent: String| fresh.then_some(percent);
    let device = status.device.as_ref();

    Some(StatusReport {
        model: status.model,
        name: device.and_then(|d| d.name.clone()),
        native_battery_percent: device.and_then(|d| d.native_battery_percent),
        left_connected: status.is_left_connected(),
        right_connected: status.is_right_connected(),
        case_connected: status.is_case_connected(),
        left: shown(status.left_percent()),
        right: shown(status.right_percent()),
        case: shown(status.case_percent()),
        fresh,
        updated_at: status.created_at,
    })
}

/// Periodically reads the latest snapshot and keeps the status display
/// (log and, when configured, MQTT) up to date.
pub struct Reporter {
    status: watch::Receiver<Arc<StatusSnapshot>>,
    linked: watch::Receiver<bool>,
    mqtt: Option<MqttClient>,
    config: ReportConfig,
}

impl Reporter {
    pub fn new(
        status: watch::Receiver<Arc<StatusSnapshot>>,
        linked: watch::Receiver<bool>,
        mqtt: Option<MqttClient>,
        config: ReportConfig,
    ) -> Self {
        Reporter {
            status,
            linked,
            mqtt,
            config,
        }
    }

    /// Runs until the pipeline feeding the status channel goes away.
    pub async fn run(self) {
        let mut interval = tokio::time::interval(self.config.interval());
        let mut showing: Option<Option<String>> = None;

        loop {
            interval.tick().await;
            if self.status.has_changed().is_err() {
                debug!("Status channel closed");
                break;
            }

            let report = {
                let status = Arc::clone(&self.status.borrow());
                summarize(&status, *self.linked.borrow(), Utc::now(), &self.config)
            };

            match report {
                Some(report) => {
                    if showing.is_none() {
                        info!("Showing earbuds status");
                    }
                    debug!(
                        "Left: {} Right: {} Case: {}",
                        report.left.as_deref().unwrap_or("updating"),
                        report.right.as_deref().unwrap_or("updating"),
                        report.case.as_deref().unwrap_or("updating"),
                    );
                    if let Some(mqtt) = &self.mqtt {
                        if let Err(err) = mqtt.announce_status(&report).await {
                            error!("Error announcing status: {err:#}");
                        }
                    }
                    showing = Some(report.name);
                }
                None => {
                    let Some(name) = showing.take() else {
                        continue;
                    };
                    info!("Hiding earbuds status");
                    if let Some(mqtt) = &self.mqtt {
                        if let Err(err) = mqtt.announce_hidden(name.as_deref()).await {
                            error!("Error announcing hidden status: {err:#}");
                        }
                    }
                }
            }
        }
    }
}
