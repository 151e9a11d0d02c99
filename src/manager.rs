use std::time::Instant;

use anyhow::{Context as _, Result};
use btleplug::api::{Central as _, CentralEvent, CentralState, ScanFilter};
use futures::StreamExt as _;
use log::{debug, error, info, warn};
use tokio::sync::broadcast;

use crate::config::AppConfig;
use crate::messages::{ScanCommand, ScanEvent};
use crate::mqtt::MqttClient;
use crate::pipeline::ScanPipeline;
use crate::reporter::Reporter;
use crate::scanner;

pub struct Manager {
    adapter: btleplug::platform::Adapter,
    mqtt: Option<(MqttClient, rumqttc::EventLoop)>,
    config: AppConfig,
}

impl Manager {
    pub fn new(
        adapter: btleplug::platform::Adapter,
        mqtt: Option<(MqttClient, rumqttc::EventLoop)>,
        config: AppConfig,
    ) -> Self {
        Manager {
            adapter,
            mqtt,
            config,
        }
    }

    pub async fn run_loop(self) -> Result<()> {
        let mut pipeline = ScanPipeline::new(&self.config.scan());

        let (tx, rx) = broadcast::channel(10);

        let mqtt_client = match self.mqtt {
            Some((client, mut eventloop)) => {
                client
                    .subscribe()
                    .await
                    .context("failed to subscribe to MQTT topics")?;
                let listener = client.clone();
                let tx = tx.clone();
                // Handle incoming MQTT messages (scan start/stop requests)
                tokio::spawn(async move {
                    listener.event_loop(&mut eventloop, tx).await;
                });
                Some(client)
            }
            None => None,
        };

        let reporter = Reporter::new(
            pipeline.status(),
            pipeline.linked(),
            mqtt_client.clone(),
            self.config.report(),
        );
        let reporter_handle = tokio::spawn(reporter.run());

        let state = self
            .adapter
            .adapter_state()
            .await
            .context("failed to get Bluetooth adapter state")?;
        if matches!(state, CentralState::PoweredOn) {
            apply(&self.adapter, &mut pipeline, ScanEvent::Started).await;
        } else {
            info!("Bluetooth adapter not powered on, waiting");
        }

        match scanner::connected_at_startup(&self.adapter).await {
            Ok(events) => {
                for event in events {
                    apply(&self.adapter, &mut pipeline, event).await;
                }
            }
            Err(err) => warn!("Failed to check already connected devices: {err:#}"),
        }

        let result = handle_events(&self.adapter, &mut pipeline, rx).await;

        // Dropping the pipeline closes the status channel and ends the reporter.
        drop(pipeline);
        if let Err(err) = reporter_handle.await {
            error!("Error joining reporter: {:?}", err);
        }
        info!("Exiting manager event loop");

        if let Some(client) = mqtt_client {
            client
                .disconnect()
                .await
                .context("failed to disconnect MQTT client")?;
        }

        result
    }
}

async fn handle_events(
    adapter: &btleplug::platform::Adapter,
    pipeline: &mut ScanPipeline,
    mut rx: broadcast::Receiver<ScanEvent>,
) -> Result<()> {
    let mut events = adapter
        .events()
        .await
        .context("failed to subscribe to Bluetooth events")?;

    loop {
        tokio::select! {
            msg = rx.recv() => {
                match msg {
                    Ok(event) => apply(adapter, pipeline, event).await,
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Scan request channel closed");
                        break;
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Dropped {n} scan requests");
                    }
                }
            }
            event = events.next() => {
                match event {
                    Some(event) => handle_central_event(adapter, pipeline, event).await,
                    None => {
                        info!("No more Bluetooth events");
                        break;
                    }
                }
            }
        }
    }
    Ok(())
}

async fn handle_central_event(
    adapter: &btleplug::platform::Adapter,
    pipeline: &mut ScanPipeline,
    event: CentralEvent,
) {
    match event {
        CentralEvent::ManufacturerDataAdvertisement {
            id,
            manufacturer_data,
        } => {
            if !pipeline.is_scanning() {
                return;
            }
            match scanner::advertisement(adapter, &id, &manufacturer_data).await {
                Ok(Some(advertisement)) => {
                    pipeline.handle_advertisement(advertisement, Instant::now());
                }
                Ok(None) => {}
                Err(err) => warn!("Failed to read advertisement from {id:?}: {err:#}"),
            }
        }
        CentralEvent::DeviceConnected(id) => match scanner::linked_event(adapter, &id).await {
            Ok(Some(event)) => {
                apply(adapter, pipeline, event).await;
            }
            Ok(None) => debug!("Connected device is not the earbuds: {id:?}"),
            Err(err) => warn!("Failed to inspect connected device {id:?}: {err:#}"),
        },
        CentralEvent::DeviceDisconnected(id) => {
            let event = ScanEvent::DeviceUnlinked(scanner::source_token(&id));
            apply(adapter, pipeline, event).await;
        }
        CentralEvent::StateUpdate(state) => {
            debug!("Bluetooth adapter state: {state:?}");
            if let Some(event) = scanner::state_event(state) {
                apply(adapter, pipeline, event).await;
            }
        }
        _ => {}
    }
}

/// Feeds `event` to the pipeline and carries out the resulting scan command.
/// Radio failures are logged; the loop keeps running.
async fn apply(
    adapter: &btleplug::platform::Adapter,
    pipeline: &mut ScanPipeline,
    event: ScanEvent,
) {
    let result = match pipeline.handle_event(event) {
        ScanCommand::Start => adapter.start_scan(ScanFilter::default()).await,
        ScanCommand::Restart => {
            if let Err(err) = adapter.stop_scan().await {
                debug!("Failed to stop scan before restart: {err}");
            }
            adapter.start_scan(ScanFilter::default()).await
        }
        ScanCommand::Stop => adapter.stop_scan().await,
        ScanCommand::None => Ok(()),
    };

    if let Err(err) = result {
        error!("Error controlling BLE scan: {err}");
    }
}
