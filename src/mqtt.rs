//! MQTT command channel
//!
//! Subscribes to `<topic>/command` and forwards each message to the main loop.
//! The verdict for every command is published on `<topic>/verdict`.

use rumqttc::{Client, Connection, Event, MqttOptions, Packet, QoS};
use serde::Deserialize;
use std::sync::mpsc::Sender;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::MqttConfig;
use crate::control::Request;

const CLIENT_ID: &str = "mapfence";

/// JSON format for incoming commands (optional)
#[derive(Deserialize)]
struct JsonCommand {
    command: String,
}

/// Extract the command line from a payload, accepting JSON or plain text
fn command_line(payload: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(payload).ok()?.trim();
    if text.is_empty() {
        return None;
    }
    let line = match serde_json::from_str::<JsonCommand>(text) {
        Ok(json) => json.command,
        Err(_) => text.to_string(),
    };
    Some(line)
}

/// MQTT client that receives commands in a background thread
pub struct MqttClient {
    client: Client,
    verdict_topic: String,
    _thread: thread::JoinHandle<()>,
}

impl MqttClient {
    /// Connect to the broker and subscribe to the command topic.
    /// Fails immediately if connection cannot be established.
    pub fn new(config: &MqttConfig, sender: Sender<Request>) -> Result<Self, String> {
        let command_topic = format!("{}/command", config.topic);
        let verdict_topic = format!("{}/verdict", config.topic);

        let mut options = MqttOptions::new(CLIENT_ID, config.host.as_str(), config.port);
        options.set_keep_alive(Duration::from_secs(30));

        let (client, mut connection) = Client::new(options, 10);

        client
            .subscribe(command_topic.as_str(), QoS::AtLeastOnce)
            .map_err(|e| format!("Failed to subscribe to topic '{}': {}", command_topic, e))?;

        // Test connection by polling once - fail fast if broker unreachable
        match connection.iter().next() {
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                return Err(format!(
                    "Failed to connect to MQTT broker at {}:{} - {}",
                    config.host, config.port, e
                ));
            }
            None => {
                return Err(format!(
                    "Failed to connect to MQTT broker at {}:{} - connection closed",
                    config.host, config.port
                ));
            }
        }

        let publisher = client.clone();
        let topic = verdict_topic.clone();
        let handle = thread::spawn(move || {
            Self::message_loop(connection, sender, publisher, &command_topic, topic);
        });

        info!(
            host = %config.host,
            port = config.port,
            topic = %config.topic,
            "MQTT command channel connected"
        );

        Ok(Self {
            client,
            verdict_topic,
            _thread: handle,
        })
    }

    fn message_loop(
        mut connection: Connection,
        sender: Sender<Request>,
        publisher: Client,
        command_topic: &str,
        verdict_topic: String,
    ) {
        for event in connection.iter() {
            match event {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    if publish.topic != command_topic {
                        continue;
                    }
                    let Some(line) = command_line(&publish.payload) else {
                        continue;
                    };
                    let publisher = publisher.clone();
                    let topic = verdict_topic.clone();
                    let request = Request::new(line, move |reply| {
                        let payload = reply.as_bytes().to_vec();
                        if let Err(e) = publisher.try_publish(topic, QoS::AtLeastOnce, false, payload) {
                            warn!(error = %e, "Failed to publish verdict");
                        }
                    });
                    if sender.send(request).is_err() {
                        // Main loop gone, exit
                        break;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "MQTT connection error");
                    // Continue trying - connection may recover
                    thread::sleep(Duration::from_secs(1));
                }
            }
        }
    }

    /// Publish a notice on the verdict topic that did not answer a command
    pub fn announce(&self, text: &str) {
        let payload = text.as_bytes().to_vec();
        let topic = self.verdict_topic.as_str();
        if let Err(e) = self.client.try_publish(topic, QoS::AtMostOnce, false, payload) {
            warn!(error = %e, "Failed to publish notice");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_payload() {
        assert_eq!(command_line(b"  list \n").as_deref(), Some("list"));
    }

    #[test]
    fn test_json_payload() {
        assert_eq!(
            command_line(br#"{"command": "select 3fa2"}"#).as_deref(),
            Some("select 3fa2")
        );
    }

    #[test]
    fn test_empty_or_binary_payload_is_ignored() {
        assert_eq!(command_line(b"   "), None);
        assert_eq!(command_line(&[0xff, 0xfe]), None);
    }
}
