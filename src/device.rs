use btleplug::api::PeripheralProperties;
use uuid::{Uuid, uuid};

use crate::beacon::SourceToken;

/// Service UUIDs advertised by the earbuds once they are linked to the host.
pub(crate) const EARBUDS_SERVICE_UUIDS: [Uuid; 2] = [
    uuid!("74ec2172-0bad-4d01-8f77-997b2be0722a"),
    uuid!("2a72e02b-7b99-778f-014d-ad0b7221ec74"),
];

/// Platform lookups for a broadcaster. Implemented outside the decoding
/// path; the decoder only ever sees the resulting [`DeviceInfo`].
pub trait DeviceInfoProvider {
    fn name(&self) -> Option<String>;

    fn native_battery_percent(&self) -> Option<u8>;
}

impl DeviceInfoProvider for PeripheralProperties {
    fn name(&self) -> Option<String> {
        self.local_name.clone()
    }

    // Not exposed by the advertisement; would require a GATT connection.
    fn native_battery_percent(&self) -> Option<u8> {
        None
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceInfo {
    pub token: SourceToken,
    pub name: Option<String>,
    pub native_battery_percent: Option<u8>,
}

impl DeviceInfo {
    pub fn new(token: SourceToken) -> Self {
        DeviceInfo {
            token,
            name: None,
            native_battery_percent: None,
        }
    }

    pub fn from_provider(token: SourceToken, provider: &dyn DeviceInfoProvider) -> Self {
        DeviceInfo {
            token,
            name: provider.name(),
            native_battery_percent: provider.native_battery_percent(),
        }
    }
}

pub fn is_earbuds(services: &[Uuid]) -> bool {
    services
        .iter()
        .any(|service| EARBUDS_SERVICE_UUIDS.contains(service))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProvider;

    impl DeviceInfoProvider for FixedProvider {
        fn name(&self) -> Option<String> {
            Some("Living Room Buds".to_string())
        }

        fn native_battery_percent(&self) -> Option<u8> {
            Some(80)
        }
    }

    #[test]
    fn test_from_provider() {
        let info = DeviceInfo::from_provider(SourceToken::new("tok"), &FixedProvider);
        assert_eq!(info.name.as_deref(), Some("Living Room Buds"));
        assert_eq!(info.native_battery_percent, Some(80));
        assert_eq!(info.token.as_str(), "tok");
    }

    #[test]
    fn test_peripheral_properties_provider() {
        let properties = PeripheralProperties {
            local_name: Some("Buds".to_string()),
            ..Default::default()
        };
        let info = DeviceInfo::from_provider(SourceToken::new("tok"), &properties);
        assert_eq!(info.name.as_deref(), Some("Buds"));
        assert_eq!(info.native_battery_percent, None);
    }

    #[test]
    fn test_is_earbuds() {
        let headset = uuid!("0000111e-0000-1000-8000-00805f9b34fb");
        assert!(!is_earbuds(&[]));
        assert!(!is_earbuds(&[headset]));
        assert!(is_earbuds(&[
            headset,
            uuid!("74ec2172-0bad-4d01-8f77-997b2be0722a")
        ]));
        assert!(is_earbuds(&[uuid!("2a72e02b-7b99-778f-014d-ad0b7221ec74")]));
    }
}
