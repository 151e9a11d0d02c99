//! Status beacon layout, as observed on real devices.
//!
//! The payload is rendered as an uppercase hex string and read one character
//! (nibble) at a time:
//! - char 7: model (`E` = pro)
//! - char 10: orientation; bit 1 clear means chars 12/13 are left/right,
//!   otherwise right/left
//! - chars 12, 13: earbud levels
//! - char 14: charging flags (bit 0 left, bit 1 right, bit 2 case, bit 3 unused)
//! - char 15: case level

use anyhow::{Context as _, Result, anyhow};
use chrono::Utc;

use crate::beacon::BeaconPayload;
use crate::device::DeviceInfo;
use crate::status::{Model, StatusSnapshot};

const MODEL_INDEX: usize = 7;
const ORIENTATION_INDEX: usize = 10;
const FIRST_POD_INDEX: usize = 12;
const SECOND_POD_INDEX: usize = 13;
const CHARGING_INDEX: usize = 14;
const CASE_INDEX: usize = 15;

const PRO_MODEL_CHAR: char = 'E';

const CHARGING_LEFT: u8 = 0b001;
const CHARGING_RIGHT: u8 = 0b010;
const CHARGING_CASE: u8 = 0b100;

pub fn decode(payload: &BeaconPayload, device: DeviceInfo) -> Result<StatusSnapshot> {
    let hex = hex::encode_upper(payload);

    let model = if char_at(&hex, MODEL_INDEX)? == PRO_MODEL_CHAR {
        Model::Pro
    } else {
        Model::Standard
    };

    let orientation =
        nibble_at(&hex, ORIENTATION_INDEX).context("failed to decode orientation")?;
    let flipped = is_flipped(orientation);

    let first = nibble_at(&hex, FIRST_POD_INDEX).context("failed to decode pod level")?;
    let second = nibble_at(&hex, SECOND_POD_INDEX).context("failed to decode pod level")?;
    let (left_level, right_level) = if flipped {
        (first, second)
    } else {
        (second, first)
    };

    let case_level = nibble_at(&hex, CASE_INDEX).context("failed to decode case level")?;
    let charging = nibble_at(&hex, CHARGING_INDEX).context("failed to decode charging flags")?;

    Ok(StatusSnapshot {
        left_level,
        right_level,
        case_level,
        left_charging: charging & CHARGING_LEFT != 0,
        right_charging: charging & CHARGING_RIGHT != 0,
        case_charging: charging & CHARGING_CASE != 0,
        model,
        device: Some(device),
        created_at: Utc::now(),
    })
}

pub fn hex_value(c: char) -> Result<u8> {
    c.to_digit(16)
        .and_then(|v| u8::try_from(v).ok())
        .ok_or_else(|| anyhow!("not a hex digit: {c:?}"))
}

// The n + 0x10 keeps a leading 1 so the tested bit is always bit 1 of n.
fn is_flipped(n: u8) -> bool {
    ((u16::from(n) + 0x10) >> 1) & 1 == 0
}

fn char_at(hex: &str, index: usize) -> Result<char> {
    hex.chars()
        .nth(index)
        .ok_or_else(|| anyhow!("beacon too short: no character at {index}"))
}

fn nibble_at(hex: &str, index: usize) -> Result<u8> {
    hex_value(char_at(hex, index)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beacon::SourceToken;
    use crate::beacon::tests::payload_with;

    fn device() -> DeviceInfo {
        DeviceInfo::new(SourceToken::new("tok"))
    }

    fn levels(status: &StatusSnapshot) -> (u8, u8, u8, bool, bool, bool, Model) {
        (
            status.left_level,
            status.right_level,
            status.case_level,
            status.left_charging,
            status.right_charging,
            status.case_charging,
            status.model,
        )
    }

    #[test]
    fn test_hex_rendering() {
        assert_eq!(hex::encode_upper([0x07, 0x19, 0xab, 0x00, 0xfe]), "0719AB00FE");
        assert_eq!(hex::encode_upper(payload_with(&[])).len(), 54);
    }

    #[test]
    fn test_hex_value() {
        assert_eq!(hex_value('0').unwrap(), 0);
        assert_eq!(hex_value('9').unwrap(), 9);
        assert_eq!(hex_value('a').unwrap(), 10);
        assert_eq!(hex_value('F').unwrap(), 15);
        assert!(hex_value('G').is_err());
        assert!(hex_value(' ').is_err());
    }

    #[test]
    fn test_is_flipped() {
        let flipped: Vec<u8> = (0..16).filter(|&n| is_flipped(n)).collect();
        assert_eq!(flipped, vec![0, 1, 4, 5, 8, 9, 12, 13]);
    }

    #[test]
    fn test_decode_standard_not_flipped() {
        // chars: 7 = '5', 10 = '2', 12..16 = "7432"
        let payload = payload_with(&[(3, 0x45), (5, 0x20), (6, 0x74), (7, 0x32)]);
        let status = decode(&payload, device()).unwrap();

        assert_eq!(levels(&status), (4, 7, 2, true, true, false, Model::Standard));
        assert_eq!(status.left_percent(), "45%+");
        assert_eq!(status.right_percent(), "75%+");
        assert_eq!(status.case_percent(), "25%");
        assert_eq!(status.device, Some(device()));
    }

    #[test]
    fn test_decode_flipped_pro() {
        // chars: 7 = 'E', 10 = '0', 12..16 = "A5FC"
        let payload = payload_with(&[(3, 0x0e), (5, 0x00), (6, 0xa5), (7, 0xfc)]);
        let status = decode(&payload, device()).unwrap();

        assert_eq!(levels(&status), (10, 5, 12, true, true, true, Model::Pro));
        assert_eq!(status.left_percent(), "100%");
        assert_eq!(status.case_percent(), "");
    }

    #[test]
    fn test_decode_disconnected_pods() {
        let payload = payload_with(&[(5, 0x20), (6, 0xff), (7, 0x0f)]);
        let status = decode(&payload, device()).unwrap();
        assert!(status.is_all_disconnected());
        assert!(!status.left_charging && !status.right_charging && !status.case_charging);
    }

    #[test]
    fn test_unused_charging_bit_is_ignored() {
        let payload = payload_with(&[(5, 0x20), (6, 0x55), (7, 0x85)]);
        let status = decode(&payload, device()).unwrap();
        assert!(!status.left_charging && !status.right_charging && !status.case_charging);
    }

    #[test]
    fn test_decode_is_deterministic() {
        let payload = payload_with(&[(3, 0x0e), (5, 0x30), (6, 0x39), (7, 0x56), (20, 0x99)]);
        let first = decode(&payload, device()).unwrap();
        let second = decode(&payload, device()).unwrap();
        assert_eq!(levels(&first), levels(&second));
        assert_eq!(first.device, second.device);
    }

    #[test]
    fn test_nibble_at_rejects_non_hex() {
        assert!(nibble_at("07G9", 2).is_err());
        assert!(nibble_at("0719", 4).is_err());
        assert_eq!(nibble_at("0719", 3).unwrap(), 9);
    }
}
