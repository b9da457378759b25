/// Mod for the impls backing the node's two external interfaces: the
/// wireless link (managed via the NetworkManager CLI) and the broker
/// session (MQTT via rumqttc). Both are behind traits so the session
/// and publisher layers can be driven against simulated impls.
mod mqtt;
mod nmcli;
#[cfg(any(test, feature = "sim"))]
mod sim;

pub use mqtt::MqttBrokerClient;
pub use nmcli::NmCliLinkClient;
#[cfg(any(test, feature = "sim"))]
pub use sim::{SimBrokerClient, SimLinkClient};

use thiserror::Error;

use crate::link::{LinkCredentials, LinkState};

#[derive(Error, Debug)]
pub enum LinkClientError {
    #[error("I/O Error")]
    Io(#[from] std::io::Error),
    #[error("Str utf8 parse Error")]
    StrParse(#[from] std::str::Utf8Error),
    #[error("AddrParse error")]
    AddrParse(#[from] std::net::AddrParseError),
    #[error("Link Client Error {0}")]
    LinkClientErr(String),
}

#[derive(Error, Debug)]
pub enum BrokerClientError {
    #[error("Broker request Error")]
    Request(#[from] rumqttc::ClientError),
    #[error("Broker connection Error {0}")]
    Connection(String),
    #[error("Broker client is not connected")]
    NotConnected,
}

/// One message received on a subscribed topic, drained off the
/// transport by [`BrokerClient::poll_inbound`]
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Trait to allow different implementations for interfacing with the
/// wireless link layer
pub trait LinkClient: Send + Sync {
    /// Kick off a join attempt; completion is observed by polling
    /// [`LinkClient::link_state`]
    fn start_join(&self, credentials: &LinkCredentials) -> Result<(), LinkClientError>;
    fn link_state(&self) -> Result<LinkState, LinkClientError>;
    fn local_addr(&self) -> Result<std::net::IpAddr, LinkClientError>;
    /// Stable device-unique hardware address, used to derive the broker
    /// session identifier
    fn hardware_addr(&self) -> Result<String, LinkClientError>;
}

/// Trait to allow different implementations of the publish/subscribe
/// transport beneath the broker session layer
pub trait BrokerClient: Send {
    /// Perform the broker handshake under the given session identifier.
    /// One attempt only; retry policy belongs to the session layer
    fn connect(&mut self, session_id: &str) -> Result<(), BrokerClientError>;
    fn subscribe(&mut self, topic: &str) -> Result<(), BrokerClientError>;
    /// Send one payload; no internal retry, does not block beyond the
    /// transport's own send path
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BrokerClientError>;
    /// Drain any pending inbound messages, servicing transport
    /// housekeeping (keepalives, acks) along the way
    fn poll_inbound(&mut self) -> Result<Vec<InboundMessage>, BrokerClientError>;
    fn is_connected(&self) -> bool;
}
