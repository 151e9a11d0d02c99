use std::collections::HashMap;
use std::time::Instant;

use anyhow::{Context as _, Result};
use btleplug::api::{Central as _, CentralState, Peripheral as _, PeripheralProperties};
use btleplug::platform::{Adapter, PeripheralId};
use log::debug;

use crate::beacon::{APPLE_COMPANY_ID, Advertisement, SourceToken, accepts};
use crate::device::{DeviceInfo, is_earbuds};
use crate::messages::ScanEvent;

pub fn source_token(id: &PeripheralId) -> SourceToken {
    SourceToken::new(id.to_string())
}

pub fn state_event(state: CentralState) -> Option<ScanEvent> {
    match state {
        CentralState::PoweredOn => Some(ScanEvent::Started),
        CentralState::PoweredOff => Some(ScanEvent::Stopped),
        _ => None,
    }
}

/// Builds an [`Advertisement`] from a manufacturer data update, reading the
/// signal strength and name from the peripheral's current properties.
pub async fn advertisement(
    adapter: &Adapter,
    id: &PeripheralId,
    manufacturer_data: &HashMap<u16, Vec<u8>>,
) -> Result<Option<Advertisement>> {
    let observed_at = Instant::now();

    let Some(data) = manufacturer_data.get(&APPLE_COMPANY_ID) else {
        return Ok(None);
    };
    // Cheap check first; most Apple advertisements are not status beacons.
    if !accepts(Some(data.as_slice())) {
        return Ok(None);
    }

    let peripheral = adapter
        .peripheral(id)
        .await
        .context("failed to get BLE peripheral")?;
    let Some(properties) = peripheral
        .properties()
        .await
        .context("failed to get BLE peripheral properties")?
    else {
        debug!("BLE peripheral properties not available: {id:?}");
        return Ok(None);
    };
    let Some(rssi) = properties.rssi else {
        debug!("No RSSI for beacon from {id:?}");
        return Ok(None);
    };

    let token = source_token(id);
    let device = DeviceInfo::from_provider(token.clone(), &properties);

    Ok(Some(Advertisement {
        token,
        rssi,
        manufacturer_data: Some(data.clone()),
        observed_at,
        device,
    }))
}

/// `DeviceLinked` if the newly connected peripheral looks like the earbuds.
pub async fn linked_event(adapter: &Adapter, id: &PeripheralId) -> Result<Option<ScanEvent>> {
    let peripheral = adapter
        .peripheral(id)
        .await
        .context("failed to get BLE peripheral")?;
    let properties = peripheral
        .properties()
        .await
        .context("failed to get BLE peripheral properties")?;

    Ok(recognize_linked(source_token(id), properties.as_ref()))
}

/// `DeviceLinked` for every peripheral that is already connected to the
/// host and looks like the earbuds. Used once at startup, since no
/// `DeviceConnected` event will arrive for those.
pub async fn connected_at_startup(adapter: &Adapter) -> Result<Vec<ScanEvent>> {
    let peripherals = adapter
        .peripherals()
        .await
        .context("failed to list BLE peripherals")?;

    let mut events = Vec::new();
    for peripheral in peripherals {
        let id = peripheral.id();
        match peripheral.is_connected().await {
            Ok(true) => {}
            Ok(false) => continue,
            Err(err) => {
                debug!("Failed to read connection state of {id}: {err}");
                continue;
            }
        }
        let properties = peripheral
            .properties()
            .await
            .context("failed to get BLE peripheral properties")?;
        if let Some(event) = recognize_linked(source_token(&id), properties.as_ref()) {
            events.push(event);
        }
    }
    Ok(events)
}

fn recognize_linked(
    token: SourceToken,
    properties: Option<&PeripheralProperties>,
) -> Option<ScanEvent> {
    let recognized = properties.is_some_and(|p| is_earbuds(&p.services));
    recognized.then(|| ScanEvent::DeviceLinked(token))
}
