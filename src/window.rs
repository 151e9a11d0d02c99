use std::time::{Duration, Instant};

use crate::beacon::RawBeacon;

pub const RECENT_BEACONS_MAX_AGE: Duration = Duration::from_secs(10);

/// Beacons seen during the last few seconds, used to pick which of several
/// nearby transmitters to trust.
///
/// Real hardware addresses are hidden, so the strongest recent signal is
/// taken as the user's own device. When the incoming beacon shares a token
/// with that strongest entry it wins instead, so a device that keeps
/// transmitting is never reported from a stale sample.
#[derive(Debug)]
pub struct RecentBeacons {
    beacons: Vec<RawBeacon>,
    max_age: Duration,
}

impl Default for RecentBeacons {
    fn default() -> Self {
        RecentBeacons::new(RECENT_BEACONS_MAX_AGE)
    }
}

impl RecentBeacons {
    pub fn new(max_age: Duration) -> Self {
        RecentBeacons {
            beacons: Vec::new(),
            max_age,
        }
    }

    pub fn len(&self) -> usize {
        self.beacons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beacons.is_empty()
    }

    /// Records `beacon` and returns the beacon to treat as authoritative at
    /// `now`, or `None` if nothing recent enough survives.
    pub fn admit(&mut self, beacon: RawBeacon, now: Instant) -> Option<RawBeacon> {
        let incoming = beacon.clone();
        self.beacons.push(beacon);

        let max_age = self.max_age;
        self.beacons
            .retain(|b| now.saturating_duration_since(b.observed_at) <= max_age);

        // First entry wins ties, keeping the choice stable across calls.
        let strongest = self.beacons.iter().fold(None::<&RawBeacon>, |best, b| match best {
            Some(best) if best.rssi >= b.rssi => Some(best),
            _ => Some(b),
        })?;

        if strongest.token == incoming.token {
            return Some(incoming);
        }

        Some(strongest.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beacon::tests::beacon;

    #[test]
    fn test_single_entry_is_selected() {
        let now = Instant::now();
        let mut window = RecentBeacons::default();

        let selected = window.admit(beacon("x", -80, now), now).unwrap();
        assert_eq!(selected.token.as_str(), "x");
        assert_eq!(selected.rssi, -80);
        assert_eq!(window.len(), 1);
    }

    #[test]
    fn test_stronger_recent_beacon_wins() {
        let start = Instant::now();
        let mut window = RecentBeacons::default();

        window.admit(beacon("x", -50, start), start);

        let later = start + Duration::from_secs(3);
        let selected = window.admit(beacon("y", -70, later), later).unwrap();
        assert_eq!(selected.token.as_str(), "x");
        assert_eq!(selected.rssi, -50);
        assert_eq!(selected.observed_at, start);
    }

    #[test]
    fn test_same_token_as_strongest_returns_incoming() {
        let start = Instant::now();
        let mut window = RecentBeacons::default();

        window.admit(beacon("x", -50, start), start);
        let later = start + Duration::from_secs(3);
        window.admit(beacon("y", -70, later), later);

        let selected = window.admit(beacon("x", -55, later), later).unwrap();
        assert_eq!(selected.token.as_str(), "x");
        assert_eq!(selected.rssi, -55);
        assert_eq!(window.len(), 3);
    }

    #[test]
    fn test_ties_keep_first_seen() {
        let now = Instant::now();
        let mut window = RecentBeacons::default();

        window.admit(beacon("x", -50, now), now);
        let selected = window.admit(beacon("y", -50, now), now).unwrap();
        assert_eq!(selected.token.as_str(), "x");
    }

    #[test]
    fn test_old_beacons_are_evicted() {
        let start = Instant::now();
        let mut window = RecentBeacons::default();

        window.admit(beacon("x", -40, start), start);

        let at_limit = start + RECENT_BEACONS_MAX_AGE;
        let selected = window.admit(beacon("y", -70, at_limit), at_limit).unwrap();
        assert_eq!(selected.token.as_str(), "x");

        let past_limit = at_limit + Duration::from_millis(1);
        let selected = window
            .admit(beacon("y", -75, past_limit), past_limit)
            .unwrap();
        assert_eq!(selected.token.as_str(), "y");
        assert_eq!(selected.rssi, -75);
        assert_eq!(window.len(), 2);
    }

    #[test]
    fn test_stale_incoming_beacon_with_matching_token() {
        let start = Instant::now();
        let mut window = RecentBeacons::default();

        let recent = start + Duration::from_secs(5);
        window.admit(beacon("x", -40, recent), recent);

        let now = start + Duration::from_secs(11);
        let selected = window.admit(beacon("x", -50, start), now).unwrap();
        assert_eq!(selected.rssi, -50);
        assert_eq!(window.len(), 1);
    }

    #[test]
    fn test_stale_incoming_beacon_yields_nothing() {
        let start = Instant::now();
        let mut window = RecentBeacons::default();

        let now = start + Duration::from_secs(11);
        assert!(window.admit(beacon("x", -40, start), now).is_none());
        assert!(window.is_empty());
    }
}
