//! MQTT transport
//!
//! Subscribes to the configured topics and forwards every publish to the
//! pipeline worker as an [`Envelope`] tagged with its topic. Packet ids are
//! reused after acks and are 0 at QoS 0, so no offset is recorded.
//!
//! ```text
//! broker ──► rumqttc EventLoop ──(poll task)──► bounded mpsc ──► recv()
//! ```
//!
//! The poll task waits when the channel is full, so a paused pipeline stops
//! the event loop from reading further publishes. Connection errors are
//! reported through `recv` and the event loop reconnects on its next poll.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, Publish, QoS};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use wellstream_core::constants::DEFAULT_CHANNEL_CAPACITY;
use wellstream_core::errors::TransportError;
use wellstream_core::transport::{Envelope, Transport};

const SOURCE: &str = "mqtt";

/// Pause between polls after a connection error
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub topics: Vec<String>,
    /// 0, 1 or 2
    pub qos: u8,
    pub keep_alive_secs: u64,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: "wellstream-ingest".to_string(),
            username: None,
            password: None,
            topics: vec!["wells/+/sensors/#".to_string()],
            qos: 1,
            keep_alive_secs: 30,
        }
    }
}

impl MqttConfig {
    fn qos(&self) -> QoS {
        match self.qos {
            0 => QoS::AtMostOnce,
            2 => QoS::ExactlyOnce,
            _ => QoS::AtLeastOnce,
        }
    }

    fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(&self.client_id, &self.host, self.port);
        options.set_keep_alive(Duration::from_secs(self.keep_alive_secs.max(5)));
        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            options.set_credentials(username, password);
        }
        options
    }
}

type Delivery = Result<Envelope, TransportError>;

pub struct MqttTransport {
    config: MqttConfig,
    /// Publishes buffered between the event loop and the worker
    capacity: usize,
    client: Option<AsyncClient>,
    receiver: Option<mpsc::Receiver<Delivery>>,
    poller: Option<JoinHandle<()>>,
    connected: Arc<AtomicBool>,
}

impl MqttTransport {
    pub fn new(config: MqttConfig) -> Self {
        Self::with_capacity(config, DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(config: MqttConfig, capacity: usize) -> Self {
        Self {
            config,
            capacity: capacity.max(1),
            client: None,
            receiver: None,
            poller: None,
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &MqttConfig {
        &self.config
    }
}

/// Subscriptions to restore when the broker hands out a fresh session
struct Subscriptions {
    client: AsyncClient,
    topics: Vec<String>,
    qos: QoS,
}

impl Subscriptions {
    fn restore(&self) {
        for topic in &self.topics {
            if let Err(e) = self.client.try_subscribe(topic, self.qos) {
                warn!("MQTT resubscribe failed topic={}: {}", topic, e);
            }
        }
    }
}

fn envelope(publish: Publish) -> Envelope {
    Envelope::new(SOURCE, publish.payload.to_vec()).with_topic(publish.topic)
}

/// Drive the event loop, forwarding publishes until the receiver is gone
async fn poll_events(
    mut event_loop: EventLoop,
    sender: mpsc::Sender<Delivery>,
    connected: Arc<AtomicBool>,
    subscriptions: Subscriptions,
) {
    let mut connections = 0u64;
    loop {
        let delivery = match event_loop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => Ok(envelope(publish)),
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                connections += 1;
                info!("MQTT connected session_present={}", ack.session_present);
                // The first subscribe requests are still queued in the client
                if connections > 1 && !ack.session_present {
                    subscriptions.restore();
                }
                connected.store(true, Ordering::SeqCst);
                continue;
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                connected.store(false, Ordering::SeqCst);
                continue;
            }
            Ok(_) => continue,
            Err(e) => {
                connected.store(false, Ordering::SeqCst);
                let error = TransportError::Connection(e.to_string());
                if sender.send(Err(error)).await.is_err() {
                    break;
                }
                tokio::time::sleep(RECONNECT_DELAY).await;
                continue;
            }
        };

        if sender.send(delivery).await.is_err() {
            break;
        }
    }
    debug!("MQTT poll task finished");
}

#[async_trait]
impl Transport for MqttTransport {
    async fn open(&mut self) -> Result<(), TransportError> {
        if self.client.is_some() {
            return Ok(());
        }

        let (client, event_loop) = AsyncClient::new(self.config.options(), 64);
        // Requests queue in the client and go out once the loop connects
        for topic in &self.config.topics {
            client
                .subscribe(topic, self.config.qos())
                .await
                .map_err(|e| TransportError::Connection(e.to_string()))?;
            info!("MQTT subscribed topic={}", topic);
        }

        let (sender, receiver) = mpsc::channel(self.capacity);
        let subscriptions = Subscriptions {
            client: client.clone(),
            topics: self.config.topics.clone(),
            qos: self.config.qos(),
        };
        let poller = tokio::spawn(poll_events(
            event_loop,
            sender,
            self.connected.clone(),
            subscriptions,
        ));

        self.client = Some(client);
        self.receiver = Some(receiver);
        self.poller = Some(poller);
        info!(
            "MQTT transport opened broker={}:{} client_id={}",
            self.config.host, self.config.port, self.config.client_id
        );
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<Envelope, TransportError>> {
        match self.receiver.as_mut() {
            Some(receiver) => receiver.recv().await,
            None => Some(Err(TransportError::NotConnected)),
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if let Some(client) = self.client.take() {
            if let Err(e) = client.disconnect().await {
                warn!("MQTT disconnect failed: {}", e);
            }
        }
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
        self.receiver = None;
        self.connected.store(false, Ordering::SeqCst);
        info!("MQTT transport closed");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_fill_missing_keys() {
        let config: MqttConfig =
            serde_json::from_str(r#"{"host": "broker.field", "topics": ["wells/W1/#"]}"#).unwrap();
        assert_eq!(config.host, "broker.field");
        assert_eq!(config.port, 1883);
        assert_eq!(config.topics, vec!["wells/W1/#".to_string()]);
        assert_eq!(config.qos(), QoS::AtLeastOnce);
    }

    #[test]
    fn qos_levels() {
        let mut config = MqttConfig::default();
        config.qos = 0;
        assert_eq!(config.qos(), QoS::AtMostOnce);
        config.qos = 2;
        assert_eq!(config.qos(), QoS::ExactlyOnce);
    }

    #[test]
    fn publish_envelope_carries_topic_only() {
        let payload = br#"{"sensor_value": 50}"#.to_vec();
        let mut publish = Publish::new("wells/W1/sensors/current", QoS::AtLeastOnce, payload);
        publish.pkid = 7;

        let envelope = envelope(publish);
        assert_eq!(envelope.payload, br#"{"sensor_value": 50}"#.to_vec());
        assert_eq!(envelope.meta.source, "mqtt");
        assert_eq!(envelope.meta.topic.as_deref(), Some("wells/W1/sensors/current"));
        assert_eq!(envelope.meta.offset, None);
        assert_eq!(envelope.meta.key, None);
    }

    #[tokio::test]
    async fn recv_before_open_is_not_connected() {
        let mut transport = MqttTransport::new(MqttConfig::default());
        assert!(!transport.is_connected());
        assert!(matches!(transport.recv().await, Some(Err(TransportError::NotConnected))));
        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn unreachable_broker_reports_connection_errors() {
        let mut transport = MqttTransport::new(MqttConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            ..MqttConfig::default()
        });
        transport.open().await.unwrap();

        let delivery = tokio::time::timeout(Duration::from_secs(5), transport.recv())
            .await
            .unwrap();
        assert!(matches!(delivery, Some(Err(TransportError::Connection(_)))));
        assert!(!transport.is_connected());
        transport.close().await.unwrap();
    }
}
