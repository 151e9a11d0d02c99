use std::time::Duration;

use anyhow::{Context as _, Result};
use log::{debug, error, info};
use rumqttc::{MqttOptions, QoS, SubscribeFilter};
use serde_derive::Serialize;
use tokio::sync::broadcast;

use crate::{config, messages::ScanEvent, reporter::StatusReport};

const DEFAULT_CHANNEL: &str = "earbuds";

#[derive(Debug, Clone)]
pub struct MqttClient {
    client: rumqttc::AsyncClient,
    publisher_id: String,
    topic_path: String,
}

#[derive(Debug, Serialize)]
struct StatusMqttMessage<'a> {
    visible: bool,
    #[serde(flatten)]
    report: Option<&'a StatusReport>,
}

impl MqttClient {
    pub fn new(config: &config::MqttConfig) -> (Self, rumqttc::EventLoop) {
        let publisher_id = config
            .publisher_id
            .clone()
            .unwrap_or_else(|| "budwatch".to_string());

        let mut mqttoptions = MqttOptions::new(
            publisher_id.clone(),
            config.host.clone(),
            config.port.unwrap_or(1883),
        );

        mqttoptions.set_keep_alive(Duration::from_secs(config.keep_alive_seconds.unwrap_or(5)));

        if let (Some(username), Some(password)) =
            (config.username.as_ref(), config.password.as_ref())
        {
            mqttoptions.set_credentials(username.clone(), password.clone());
        }

        let (client, eventloop) = rumqttc::AsyncClient::new(mqttoptions, 10);

        (
            MqttClient {
                client,
                publisher_id,
                topic_path: config
                    .topic_path
                    .clone()
                    .unwrap_or_else(|| "budwatch".to_string()),
            },
            eventloop,
        )
    }

    pub async fn subscribe(&self) -> Result<(), rumqttc::ClientError> {
        self.client
            .subscribe_many(vec![
                SubscribeFilter::new(format!("{}/scan/start", self.topic_path), QoS::AtMostOnce),
                SubscribeFilter::new(format!("{}/scan/stop", self.topic_path), QoS::AtMostOnce),
            ])
            .await?;

        Ok(())
    }

    /// Forwards scan start/stop requests to `tx` until the connection is dropped.
    pub async fn event_loop(
        &self,
        eventloop: &mut rumqttc::EventLoop,
        tx: broadcast::Sender<ScanEvent>,
    ) {
        loop {
            match eventloop.poll().await {
                Ok(notification) => match notification {
                    rumqttc::Event::Incoming(rumqttc::Packet::Publish(p)) => {
                        debug!("Received MQTT message on topic {}: {:?}", p.topic, p.payload);

                        let Some(event) = scan_event(&p.topic) else {
                            continue;
                        };

                        if let Err(err) = tx.send(event) {
                            error!("Error forwarding scan request: {:?}", err);
                        }
                    }
                    rumqttc::Event::Incoming(rumqttc::Packet::SubAck(_)) => {
                        debug!("Subscription acknowledged");
                    }
                    rumqttc::Event::Incoming(rumqttc::Packet::ConnAck(_)) => {
                        debug!("Connection acknowledged");
                        if let Err(err) = self.subscribe().await {
                            error!("Error subscribing to MQTT topics: {:?}", err);
                        }
                    }
                    _ => {}
                },
                Err(e) => {
                    error!("Error polling MQTT event loop: {:?}", e);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    pub async fn announce_status(&self, report: &StatusReport) -> Result<()> {
        let message = StatusMqttMessage {
            visible: true,
            report: Some(report),
        };
        self.publish(report.name.as_deref(), &message).await
    }

    pub async fn announce_hidden(&self, name: Option<&str>) -> Result<()> {
        info!("Announcing hidden earbuds status on MQTT");
        let message = StatusMqttMessage {
            visible: false,
            report: None,
        };
        self.publish(name, &message).await
    }

    async fn publish(&self, name: Option<&str>, message: &StatusMqttMessage<'_>) -> Result<()> {
        let payload =
            serde_json::to_string(message).context("failed to serialize status message")?;
        let channel_name = sanitize_name(name.unwrap_or(DEFAULT_CHANNEL));
        self.client
            .publish(
                format!("{}/{}/{}", self.topic_path, self.publisher_id, channel_name),
                QoS::AtMostOnce,
                false,
                payload,
            )
            .await
            .context("failed to publish status message")
    }

    pub async fn disconnect(&self) -> Result<(), rumqttc::ClientError> {
        debug!("Disconnecting MQTT client");
        self.client.disconnect().await
    }
}

fn scan_event(topic: &str) -> Option<ScanEvent> {
    if topic.ends_with("/scan/start") {
        Some(ScanEvent::Started)
    } else if topic.ends_with("/scan/stop") {
        Some(ScanEvent::Stopped)
    } else {
        None
    }
}

fn sanitize_name(name: &str) -> String {
    // Remove any non-alphanumeric characters and replace spaces with underscores
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect::<String>()
}
