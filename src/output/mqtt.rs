//! MQTT state publisher.
//!
//! Publishes every entity state write, retained, to
//! `{topic_prefix}/{unique_id}/state`.

use crate::config::MqttConfig;
use crate::entity::{EntityInfo, StateChange};
use crate::error::{BridgeError, Result};
use log::{debug, error, info, warn};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub fn state_topic(prefix: &str, unique_id: &str) -> String {
    format!("{}/{}/state", prefix, unique_id)
}

/// JSON payload for one state write.
pub fn state_payload(info: &EntityInfo, change: &StateChange) -> Value {
    json!({
        "unique_id": info.unique_id,
        "name": info.name,
        "platform": info.platform,
        "device": info.device_name,
        "state": if change.is_on { "on" } else { "off" },
        "device_class": info.device_class,
        "entity_category": info.category,
        "attributes": {
            "system_id": info.system_id,
            "serial": info.device_serial,
            "version": change.version,
            "updated_at": change.timestamp.to_rfc3339(),
        },
    })
}

/// Publish one state payload, retained.
async fn publish_state(client: &AsyncClient, topic: &str, payload: String) -> Result<()> {
    client
        .publish(topic, QoS::AtLeastOnce, true, payload.into_bytes())
        .await
        .map_err(|e| BridgeError::MqttError(format!("publish to {} failed: {:?}", topic, e)))
}

pub struct MqttPublisher {
    client: AsyncClient,
    event_loop: EventLoop,
    topic_prefix: String,
    entities: HashMap<String, EntityInfo>,
}

impl MqttPublisher {
    /// Create a publisher for the given entities.
    pub fn new(config: &MqttConfig, entities: Vec<EntityInfo>) -> Self {
        let mut options =
            MqttOptions::new(&config.client_id, &config.broker_host, config.broker_port);
        options.set_keep_alive(Duration::from_secs(30));

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username, password);
        }

        let (client, event_loop) = AsyncClient::new(options, 100);

        Self {
            client,
            event_loop,
            topic_prefix: config.topic_prefix.clone(),
            entities: entities
                .into_iter()
                .map(|info| (info.unique_id.clone(), info))
                .collect(),
        }
    }

    /// Publish state changes until the channel closes or `cancel` fires.
    pub async fn run(
        self,
        mut rx: mpsc::UnboundedReceiver<StateChange>,
        cancel: CancellationToken,
    ) {
        let Self {
            client,
            mut event_loop,
            topic_prefix,
            entities,
        } = self;

        info!("[MQTT] Starting publisher with {} entities", entities.len());

        // The event loop must be polled for publishes to go out
        let loop_cancel = cancel.clone();
        let event_task = tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = loop_cancel.cancelled() => break,
                    event = event_loop.poll() => event,
                };
                match event {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => info!("[MQTT] Connected to broker"),
                    Ok(_) => {}
                    Err(e) => {
                        error!("[MQTT] Connection error: {:?}", e);
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        });

        loop {
            let change = tokio::select! {
                _ = cancel.cancelled() => break,
                change = rx.recv() => match change {
                    Some(change) => change,
                    None => break,
                },
            };

            let Some(info) = entities.get(&change.unique_id) else {
                warn!("[MQTT] State for unknown entity {}", change.unique_id);
                continue;
            };

            let topic = state_topic(&topic_prefix, &change.unique_id);
            let payload = state_payload(info, &change).to_string();
            debug!("[MQTT] Publishing to {}: {}", topic, payload);

            if let Err(e) = publish_state(&client, &topic, payload).await {
                warn!("[MQTT] {}", e);
            }
        }

        event_task.abort();
        info!("[MQTT] Publisher stopped");
    }
}
