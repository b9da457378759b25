use std::{collections::VecDeque, time::Duration};

use rumqttc::{Client, ConnectReturnCode, Connection, Event, MqttOptions, Outgoing, Packet, QoS};

use crate::{
    client::{BrokerClient, BrokerClientError, InboundMessage},
    KEEPALIVE_SECS, MAX_PAYLOAD_SIZE,
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const SEND_FLUSH_TIMEOUT: Duration = Duration::from_millis(250);

/// MQTT implementation of the [`crate::client::BrokerClient`] trait,
/// built on the rumqttc synchronous client.
///
/// rumqttc only makes network progress while its [`Connection`] event
/// iterator is polled, so every operation here drives the iterator:
/// the handshake runs it until the broker acks the session, publish
/// runs it until the outgoing write is on the wire, and
/// [`BrokerClient::poll_inbound`] drains it completely (which also
/// services keepalive traffic). Inbound publishes observed while
/// flushing are buffered rather than dropped.
pub struct MqttBrokerClient {
    broker_addr: String,
    broker_port: u16,
    conn: Option<(Client, Connection)>,
    pending: VecDeque<InboundMessage>,
    connected: bool,
}

impl MqttBrokerClient {
    pub fn new(broker_addr: impl Into<String>, broker_port: u16) -> Self {
        Self {
            broker_addr: broker_addr.into(),
            broker_port,
            conn: None,
            pending: VecDeque::new(),
            connected: false,
        }
    }
}

impl BrokerClient for MqttBrokerClient {
    fn connect(&mut self, session_id: &str) -> Result<(), BrokerClientError> {
        // Tear down any previous session first
        if let Some((client, _)) = self.conn.take() {
            client.disconnect().ok();
        }
        self.connected = false;

        let mut opts = MqttOptions::new(session_id, self.broker_addr.clone(), self.broker_port);
        opts.set_keep_alive(Duration::from_secs(KEEPALIVE_SECS));
        opts.set_max_packet_size(MAX_PAYLOAD_SIZE, MAX_PAYLOAD_SIZE);

        let (client, mut connection) = Client::new(opts, 10);

        // The client connects lazily on first poll; drive the event
        // iterator until the broker acks the session or the attempt
        // errors out
        loop {
            match connection.recv_timeout(CONNECT_TIMEOUT) {
                Ok(Ok(Event::Incoming(Packet::ConnAck(ack)))) => {
                    if ack.code == ConnectReturnCode::Success {
                        break;
                    }
                    return Err(BrokerClientError::Connection(format!(
                        "Broker refused session: {:?}",
                        ack.code
                    )));
                }
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    return Err(BrokerClientError::Connection(e.to_string()));
                }
                Err(_) => {
                    return Err(BrokerClientError::Connection(
                        "Timed out waiting for broker session ack".to_string(),
                    ));
                }
            }
        }

        self.conn = Some((client, connection));
        self.connected = true;
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), BrokerClientError> {
        let (client, _) = self.conn.as_mut().ok_or(BrokerClientError::NotConnected)?;
        client.subscribe(topic, QoS::AtMostOnce)?;
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BrokerClientError> {
        let (client, connection) = self.conn.as_mut().ok_or(BrokerClientError::NotConnected)?;
        client.publish(topic, QoS::AtMostOnce, false, payload.to_vec())?;

        let mut inbound = Vec::new();
        let result = loop {
            match connection.recv_timeout(SEND_FLUSH_TIMEOUT) {
                Ok(Ok(Event::Outgoing(Outgoing::Publish(_)))) => break Ok(()),
                Ok(Ok(Event::Incoming(Packet::Publish(publish)))) => {
                    inbound.push(InboundMessage {
                        topic: publish.topic.clone(),
                        payload: publish.payload.to_vec(),
                    });
                }
                Ok(Ok(_)) => {}
                Ok(Err(e)) => break Err(BrokerClientError::Connection(e.to_string())),
                Err(_) => {
                    break Err(BrokerClientError::Connection(
                        "Timed out flushing publish to the wire".to_string(),
                    ))
                }
            }
        };

        self.pending.extend(inbound);
        if result.is_err() {
            self.connected = false;
        }
        result
    }

    fn poll_inbound(&mut self) -> Result<Vec<InboundMessage>, BrokerClientError> {
        let Some((_, connection)) = self.conn.as_mut() else {
            return Err(BrokerClientError::NotConnected);
        };

        let mut fresh = Vec::new();
        let error = loop {
            match connection.try_recv() {
                Ok(Ok(Event::Incoming(Packet::Publish(publish)))) => {
                    fresh.push(InboundMessage {
                        topic: publish.topic.clone(),
                        payload: publish.payload.to_vec(),
                    });
                }
                Ok(Ok(_)) => {}
                Ok(Err(e)) => break Some(e.to_string()),
                // nothing further pending right now
                Err(_) => break None,
            }
        };

        self.pending.extend(fresh);
        if let Some(e) = error {
            self.connected = false;
            return Err(BrokerClientError::Connection(e));
        }

        Ok(self.pending.drain(..).collect())
    }

    fn is_connected(&self) -> bool {
        self.connected && self.conn.is_some()
    }
}
