use std::fmt;
use std::time::Instant;

use crate::device::DeviceInfo;

/// https://bitbucket.org/bluetooth-SIG/public/src/main/assigned_numbers/company_identifiers/company_identifiers.yaml
pub const APPLE_COMPANY_ID: u16 = 0x004C;

pub const BEACON_LENGTH: usize = 27;

/// Leading bytes shared by every earbuds status beacon.
pub const BEACON_HEADER: [u8; 2] = [0x07, 0x19];

/// Beacons weaker than this are assumed to belong to someone else's earbuds.
pub const MIN_RSSI: i16 = -60;

pub type BeaconPayload = [u8; BEACON_LENGTH];

/// Per-scan identifier of a broadcaster. Not a stable hardware address: the
/// platform is free to rotate or obscure it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SourceToken(String);

impl SourceToken {
    pub fn new(token: impl Into<String>) -> Self {
        SourceToken(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One advertisement as delivered by the radio, already narrowed to the
/// manufacturer data of [`APPLE_COMPANY_ID`].
#[derive(Clone, Debug)]
pub struct Advertisement {
    pub token: SourceToken,
    pub rssi: i16,
    pub manufacturer_data: Option<Vec<u8>>,
    pub observed_at: Instant,
    pub device: DeviceInfo,
}

/// An advertisement that passed [`accepts`].
#[derive(Clone, Debug)]
pub struct RawBeacon {
    pub token: SourceToken,
    pub rssi: i16,
    pub payload: BeaconPayload,
    pub observed_at: Instant,
    pub device: DeviceInfo,
}

impl RawBeacon {
    /// Returns `None` for anything the acceptance filter rejects.
    pub fn from_advertisement(advertisement: Advertisement) -> Option<Self> {
        let data = advertisement.manufacturer_data.as_deref();
        if !accepts(data) {
            return None;
        }
        let payload = BeaconPayload::try_from(data?).ok()?;

        Some(RawBeacon {
            token: advertisement.token,
            rssi: advertisement.rssi,
            payload,
            observed_at: advertisement.observed_at,
            device: advertisement.device,
        })
    }
}

pub fn accepts(payload: Option<&[u8]>) -> bool {
    match payload {
        Some(data) => data.len() == BEACON_LENGTH && data.starts_with(&BEACON_HEADER),
        None => false,
    }
}

pub fn passes_rssi(beacon: &RawBeacon, min_rssi: i16) -> bool {
    beacon.rssi >= min_rssi
}
