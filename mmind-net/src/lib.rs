//! The `mmind-net` crate is the network-resilience and message-exchange
//! core of a motor-minder sensor node. It maintains the node's link to
//! the wireless network and its session with the remote pub/sub broker,
//! serializes outbound telemetry, and ingests the failure-risk
//! probability pushed back asynchronously by the analysis service.
//!
//! The crate is layered leaf to root, with each layer owning one piece
//! of the connection state:
//! 1. [`LinkManager`] establishes and reports the wireless link, via a
//!    [`LinkClient`] impl. The join is bounded: a fixed attempt cap at
//!    a fixed polling interval, after which failure is reported to the
//!    caller to decide a fallback.
//! 2. [`BrokerSession`] establishes, monitors, and repairs the pub/sub
//!    session atop the link via a [`BrokerClient`] impl. Handshake
//!    failures are assumed recoverable and retried on a fixed delay,
//!    by default forever. Its pump drains inbound alert messages and
//!    updates the shared [`RiskCell`].
//! 3. [`TelemetryPublisher`] is the public entry point: it encodes and
//!    sends one reading and returns the latest received risk value.
//!
//! Everything runs on a single cooperative execution context; no layer
//! spawns threads, and blocking waits are plain fixed-delay polls. The
//! driving loop is expected to call [`TelemetryPublisher::pump`]
//! regularly and [`TelemetryPublisher::publish`] on its reporting
//! interval.
//!
//! # Examples
//! ```no_run
//! use mmind_net::{
//!     BrokerSession, LinkCredentials, LinkManager, MqttBrokerClient, NmCliLinkClient,
//!     TelemetryPublisher, BROKER_ADDR, BROKER_PORT, DEFAULT_WIFI_DEVICE,
//! };
//! use mmindp_telemetry::TelemetryRecord;
//!
//! let link = LinkManager::new(Box::new(NmCliLinkClient::new(DEFAULT_WIFI_DEVICE)));
//! let session = BrokerSession::new(
//!     link,
//!     Box::new(MqttBrokerClient::new(BROKER_ADDR, BROKER_PORT)),
//!     LinkCredentials {
//!         ssid: "motorlab".to_string(),
//!         psk: "hunter2".to_string(),
//!     },
//! );
//! let mut publisher = TelemetryPublisher::new(session);
//!
//! publisher.pump().ok();
//! let record = TelemetryRecord {
//!     temperature: 5.2,
//!     vibration: 0.3,
//!     rpm: 1500,
//!     timestamp: 1717171717,
//! };
//! match publisher.publish(&record) {
//!     Ok(risk) => log::info!("Current failure risk {:.1}%", risk * 100.0),
//!     Err(e) => log::warn!("Publish failed {e:}, retry next cycle"),
//! }
//! ```

mod client;
mod link;
mod publisher;
mod risk;
mod session;

pub use client::{
    BrokerClient, BrokerClientError, InboundMessage, LinkClient, LinkClientError,
    MqttBrokerClient, NmCliLinkClient,
};
#[cfg(any(test, feature = "sim"))]
pub use client::{SimBrokerClient, SimLinkClient};
pub use link::{LinkCredentials, LinkError, LinkManager, LinkState};
pub use publisher::{PublishError, TelemetryPublisher};
pub use risk::RiskCell;
pub use session::{derive_session_id, BrokerSession, SessionError, SessionState};

use std::time::Duration;

/// Broker address; set to the VM running the analysis service
pub const BROKER_ADDR: &str = "34.177.80.102";
pub const BROKER_PORT: u16 = 1883;

/// Fixed outbound topic for telemetry records
pub const DATA_TOPIC: &str = "motor/health/data";
/// Fixed inbound topic for risk alerts
pub const ALERT_TOPIC: &str = "motor/health/alert";

/// Session identifiers are this prefix plus the device hardware
/// address with separators stripped, to avoid collisions between nodes
pub const SESSION_ID_PREFIX: &str = "motor-node-";

pub const KEEPALIVE_SECS: u64 = 60;
/// Maximum inbound/outbound payload size accepted on the broker session
pub const MAX_PAYLOAD_SIZE: usize = 512;

// 60 attempts at 500ms gives the link 30s to come up before the join
// is reported as failed
pub const LINK_JOIN_ATTEMPTS: u32 = 60;
pub const LINK_JOIN_POLL_MILLIS: u64 = 500;

/// Delay between broker handshake attempts
pub const BROKER_RECONNECT_DELAY_SECS: u64 = 5;

pub const DEFAULT_WIFI_DEVICE: &str = "wlan0";

/// Bounded-or-unbounded retry policy: the link join fails fast with a
/// bounded policy while the broker handshake retries forever with an
/// unbounded one. Holding that asymmetry in a value keeps it explicit
/// and testable rather than buried in two loop conditions.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempt cap; `None` retries indefinitely
    pub attempts: Option<u32>,
    /// Fixed delay between attempts
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn bounded(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: Some(attempts),
            delay,
        }
    }

    pub fn unbounded(delay: Duration) -> Self {
        Self {
            attempts: None,
            delay,
        }
    }

    pub fn exhausted(&self, attempt: u32) -> bool {
        self.attempts.is_some_and(|cap| attempt >= cap)
    }
}
