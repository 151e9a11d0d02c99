use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use tokio::sync::watch;

use crate::beacon::{Advertisement, RawBeacon, SourceToken, passes_rssi};
use crate::config::ScanConfig;
use crate::decoder::decode;
use crate::messages::{ScanCommand, ScanEvent};
use crate::status::StatusSnapshot;
use crate::window::RecentBeacons;

/// Holds the current [`StatusSnapshot`]. Snapshots are swapped in whole, so
/// readers on other tasks never see a partially built one.
#[derive(Debug)]
pub struct StatusPublisher {
    tx: watch::Sender<Arc<StatusSnapshot>>,
}

impl Default for StatusPublisher {
    fn default() -> Self {
        StatusPublisher::new()
    }
}

impl StatusPublisher {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Arc::new(StatusSnapshot::disconnected()));
        StatusPublisher { tx }
    }

    pub fn publish(&self, status: StatusSnapshot) -> Arc<StatusSnapshot> {
        let status = Arc::new(status);
        self.tx.send_replace(Arc::clone(&status));
        status
    }

    pub fn reset(&self) {
        self.tx
            .send_replace(Arc::new(StatusSnapshot::disconnected()));
    }

    pub fn latest(&self) -> Arc<StatusSnapshot> {
        Arc::clone(&self.tx.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<StatusSnapshot>> {
        self.tx.subscribe()
    }
}

/// Turns the stream of radio advertisements into published status
/// snapshots. Owned by a single task; nothing here blocks.
#[derive(Debug)]
pub struct ScanPipeline {
    window: Option<RecentBeacons>,
    recent_beacons_max_age: Duration,
    min_rssi: i16,
    publisher: StatusPublisher,
    linked: HashSet<SourceToken>,
    linked_tx: watch::Sender<bool>,
}

impl ScanPipeline {
    pub fn new(config: &ScanConfig) -> Self {
        let (linked_tx, _) = watch::channel(false);
        ScanPipeline {
            window: None,
            recent_beacons_max_age: config.recent_beacons_max_age(),
            min_rssi: config.min_rssi(),
            publisher: StatusPublisher::new(),
            linked: HashSet::new(),
            linked_tx,
        }
    }

    pub fn status(&self) -> watch::Receiver<Arc<StatusSnapshot>> {
        self.publisher.subscribe()
    }

    pub fn linked(&self) -> watch::Receiver<bool> {
        self.linked_tx.subscribe()
    }

    pub fn latest(&self) -> Arc<StatusSnapshot> {
        self.publisher.latest()
    }

    pub fn is_scanning(&self) -> bool {
        self.window.is_some()
    }

    pub fn handle_event(&mut self, event: ScanEvent) -> ScanCommand {
        match event {
            ScanEvent::Started => {
                let restart = self.window.is_some();
                self.window = Some(RecentBeacons::new(self.recent_beacons_max_age));
                if restart {
                    info!("Restarting scanner");
                    ScanCommand::Restart
                } else {
                    info!("Starting scanner");
                    ScanCommand::Start
                }
            }
            ScanEvent::Stopped => {
                self.publisher.reset();
                self.linked.clear();
                self.linked_tx.send_replace(false);
                if self.window.take().is_some() {
                    info!("Stopping scanner");
                    ScanCommand::Stop
                } else {
                    ScanCommand::None
                }
            }
            ScanEvent::DeviceLinked(token) => {
                info!("Earbuds linked: {token}");
                self.linked.insert(token);
                self.linked_tx.send_replace(true);
                ScanCommand::None
            }
            ScanEvent::DeviceUnlinked(token) => {
                if self.linked.remove(&token) {
                    info!("Earbuds unlinked: {token}");
                }
                self.linked_tx.send_replace(!self.linked.is_empty());
                ScanCommand::None
            }
        }
    }

    /// Returns the newly published snapshot, or `None` when the advertisement
    /// was dropped and the previous snapshot stays current.
    pub fn handle_advertisement(
        &mut self,
        advertisement: Advertisement,
        now: Instant,
    ) -> Option<Arc<StatusSnapshot>> {
        let window = self.window.as_mut()?;
        let beacon = RawBeacon::from_advertisement(advertisement)?;
        debug!(
            "Beacon from {}: {}dBm {}",
            beacon.token,
            beacon.rssi,
            hex::encode_upper(beacon.payload)
        );

        let Some(selected) = window.admit(beacon, now) else {
            debug!("No recent beacon left to select");
            return None;
        };

        if !passes_rssi(&selected, self.min_rssi) {
            debug!(
                "Strongest beacon too weak: {}dBm < {}dBm",
                selected.rssi, self.min_rssi
            );
            return None;
        }

        let token = selected.token;
        match decode(&selected.payload, selected.device) {
            Ok(status) => {
                debug!("Status from {token}: {}", status.status_string());
                Some(self.publisher.publish(status))
            }
            Err(err) => {
                warn!("Failed to decode beacon from {token}: {err:#}");
                None
            }
        }
    }
}
