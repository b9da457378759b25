use std::time::Duration;
use thiserror::Error;

use mmindp_telemetry::decode_alert;

use crate::{
    client::{BrokerClient, BrokerClientError, InboundMessage, LinkClientError},
    link::{LinkCredentials, LinkError, LinkManager, LinkState},
    risk::RiskCell,
    RetryPolicy, ALERT_TOPIC, BROKER_RECONNECT_DELAY_SECS, SESSION_ID_PREFIX,
};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Link Error")]
    Link(#[from] LinkError),
    #[error("Link Client Error")]
    LinkClient(#[from] LinkClientError),
    #[error("Broker connect failed after {0} attempts")]
    BrokerConnectFailed(u32),
    #[error("Send Error")]
    Send(#[source] BrokerClientError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Subscribed,
}

/// Derive the broker session identifier from the configured prefix and
/// the device hardware address, with separator characters stripped to
/// satisfy broker identifier constraints
pub fn derive_session_id(prefix: &str, hardware_addr: &str) -> String {
    let mut id = String::from(prefix);
    id.extend(hardware_addr.chars().filter(char::is_ascii_alphanumeric));
    id
}

/// Owns the publish/subscribe session atop the network link: handshake
/// and subscription, reconnect policy, and inbound alert dispatch.
///
/// Recovery policy: the link join below this layer fails fast (bounded
/// attempts, caller decides the fallback), while the broker handshake
/// here is assumed recoverable and by default retries forever on a
/// fixed delay. [`BrokerSession::ensure_connected`] therefore blocks
/// until the session is Subscribed once the link is up. Connectivity
/// loss is never fatal; the node degrades to "risk unknown" and repairs
/// the session on the next pump or publish attempt.
pub struct BrokerSession {
    broker_client: Box<dyn BrokerClient>,
    link: LinkManager,
    credentials: LinkCredentials,
    risk: RiskCell,
    state: SessionState,
    reconnect_policy: RetryPolicy,
}

impl BrokerSession {
    pub fn new(
        link: LinkManager,
        broker_client: Box<dyn BrokerClient>,
        credentials: LinkCredentials,
    ) -> Self {
        Self::with_policy(
            link,
            broker_client,
            credentials,
            RetryPolicy::unbounded(Duration::from_secs(BROKER_RECONNECT_DELAY_SECS)),
        )
    }

    pub fn with_policy(
        link: LinkManager,
        broker_client: Box<dyn BrokerClient>,
        credentials: LinkCredentials,
        reconnect_policy: RetryPolicy,
    ) -> Self {
        Self {
            broker_client,
            link,
            credentials,
            risk: RiskCell::new(),
            state: SessionState::Disconnected,
            reconnect_policy,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn link(&self) -> &LinkManager {
        &self.link
    }

    /// Handle to the shared risk value updated by inbound dispatch
    pub fn risk(&self) -> RiskCell {
        self.risk.clone()
    }

    /// Bring the session to Subscribed, joining the network link first
    /// if needed. Link join failure propagates to the caller; broker
    /// handshake failures are absorbed and retried per the reconnect
    /// policy (unbounded by default, so this blocks until success).
    pub fn ensure_connected(&mut self) -> Result<(), SessionError> {
        if matches!(
            self.state,
            SessionState::Connected | SessionState::Subscribed
        ) && self.broker_client.is_connected()
        {
            return Ok(());
        }

        if self.link.status() != LinkState::Connected {
            self.link.connect(&self.credentials)?;
        }

        let session_id = derive_session_id(SESSION_ID_PREFIX, &self.link.hardware_addr()?);

        let mut attempts: u32 = 0;
        loop {
            self.state = SessionState::Connecting;
            log::info!("Connecting to broker as {session_id:}...");

            match self.broker_client.connect(&session_id) {
                Ok(()) => {
                    self.state = SessionState::Connected;
                    match self.broker_client.subscribe(ALERT_TOPIC) {
                        Ok(()) => {
                            log::info!("Broker session up, subscribed to {:}", ALERT_TOPIC);
                            self.state = SessionState::Subscribed;
                            return Ok(());
                        }
                        Err(e) => {
                            log::warn!("Subscribe failed {e:}, reconnecting");
                        }
                    }
                }
                Err(e) => {
                    log::warn!(
                        "Broker connect failed {e:}, trying again in {:?}",
                        self.reconnect_policy.delay
                    );
                }
            }

            self.state = SessionState::Disconnected;
            attempts += 1;
            if self.reconnect_policy.exhausted(attempts) {
                return Err(SessionError::BrokerConnectFailed(attempts));
            }
            std::thread::sleep(self.reconnect_policy.delay);
        }
    }

    /// Service the session; must be invoked regularly by the driving
    /// loop. Repairs connectivity if the session is down, otherwise
    /// drains pending inbound messages in arrival order and dispatches
    /// alert payloads to the risk cell. This is the sole place inbound
    /// messages are observed.
    pub fn pump(&mut self) -> Result<(), SessionError> {
        if !matches!(
            self.state,
            SessionState::Connected | SessionState::Subscribed
        ) || !self.broker_client.is_connected()
        {
            self.ensure_connected()?;
        }

        match self.broker_client.poll_inbound() {
            Ok(messages) => {
                for msg in messages {
                    self.dispatch(&msg);
                }
            }
            Err(e) => {
                log::warn!("Transport error while servicing session {e:}, will reconnect");
                self.state = SessionState::Disconnected;
            }
        }

        Ok(())
    }

    fn dispatch(&mut self, msg: &InboundMessage) {
        if msg.topic != ALERT_TOPIC {
            log::trace!("Ignoring message on unexpected topic {:}", msg.topic);
            return;
        }

        log::debug!("Message arrived [{:}] {:} bytes", msg.topic, msg.payload.len());

        match decode_alert(&msg.payload) {
            Ok(alert) => {
                if let Some(probability) = alert.probability {
                    self.risk.set(probability);
                    log::info!("Parsed risk: {:.1}%", probability * 100.0);
                } else {
                    log::debug!("Alert carried no probability field, risk unchanged");
                }
            }
            Err(e) => {
                // drop the message, leave risk at its last known value
                log::error!("Dropping malformed alert payload: {e:}");
            }
        }
    }

    /// Send one payload on the given topic. No internal retry; on
    /// failure the session demotes itself so the next pump or publish
    /// attempt runs the reconnect path.
    pub fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), SessionError> {
        if let Err(e) = self.broker_client.publish(topic, payload) {
            self.state = SessionState::Disconnected;
            return Err(SessionError::Send(e));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{SimBrokerClient, SimLinkClient};

    const HW_ADDR: &str = "AA:BB:CC:DD:EE:FF";

    fn session(broker_client: SimBrokerClient) -> BrokerSession {
        session_with_link(broker_client, SimLinkClient::new(HW_ADDR))
    }

    fn session_with_link(
        broker_client: SimBrokerClient,
        link_client: SimLinkClient,
    ) -> BrokerSession {
        let link = LinkManager::with_policy(
            Box::new(link_client),
            RetryPolicy::bounded(5, Duration::from_millis(1)),
        );
        BrokerSession::with_policy(
            link,
            Box::new(broker_client),
            LinkCredentials {
                ssid: "motorlab".to_string(),
                psk: "hunter2".to_string(),
            },
            RetryPolicy::unbounded(Duration::from_millis(1)),
        )
    }

    #[test]
    fn session_id_strips_separators_and_keeps_prefix() {
        let id = derive_session_id(SESSION_ID_PREFIX, HW_ADDR);
        assert!(id.starts_with(SESSION_ID_PREFIX));
        assert_eq!(id, format!("{SESSION_ID_PREFIX}AABBCCDDEEFF"));

        let id = derive_session_id(SESSION_ID_PREFIX, "aa-bb-cc-11-22-33");
        assert_eq!(id, format!("{SESSION_ID_PREFIX}aabbcc112233"));
    }

    #[test]
    fn ensure_connected_joins_link_connects_and_subscribes() {
        let broker_client = SimBrokerClient::new();
        let handle = broker_client.clone();
        let mut session = session(broker_client);

        session.ensure_connected().expect("session should come up");
        assert_eq!(session.state(), SessionState::Subscribed);
        assert_eq!(session.link().status(), LinkState::Connected);
        assert_eq!(
            handle.session_id(),
            Some(format!("{SESSION_ID_PREFIX}AABBCCDDEEFF"))
        );
        assert_eq!(handle.subscriptions(), vec![ALERT_TOPIC.to_string()]);
    }

    #[test]
    fn ensure_connected_retries_handshake_until_success() {
        let broker_client = SimBrokerClient::failing_connects(3);
        let handle = broker_client.clone();
        let mut session = session(broker_client);

        session.ensure_connected().expect("session should come up");
        assert_eq!(handle.connect_attempts(), 4);
        assert_eq!(session.state(), SessionState::Subscribed);
    }

    #[test]
    fn bounded_reconnect_policy_surfaces_exhaustion() {
        let broker_client = SimBrokerClient::failing_connects(10);
        let link = LinkManager::with_policy(
            Box::new(SimLinkClient::new(HW_ADDR)),
            RetryPolicy::bounded(5, Duration::from_millis(1)),
        );
        let mut session = BrokerSession::with_policy(
            link,
            Box::new(broker_client),
            LinkCredentials {
                ssid: "motorlab".to_string(),
                psk: "hunter2".to_string(),
            },
            RetryPolicy::bounded(2, Duration::from_millis(1)),
        );

        assert!(matches!(
            session.ensure_connected(),
            Err(SessionError::BrokerConnectFailed(2))
        ));
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[test]
    fn ensure_connected_propagates_link_join_failure() {
        let broker_client = SimBrokerClient::new();
        let handle = broker_client.clone();
        let mut session =
            session_with_link(broker_client, SimLinkClient::unjoinable(HW_ADDR));

        assert!(matches!(
            session.ensure_connected(),
            Err(SessionError::Link(LinkError::JoinFailed(_)))
        ));
        // the broker handshake was never attempted
        assert_eq!(handle.connect_attempts(), 0);
    }

    #[test]
    fn pump_dispatches_alerts_to_risk_cell_in_order() {
        let broker_client = SimBrokerClient::new();
        let handle = broker_client.clone();
        let mut session = session(broker_client);
        let risk = session.risk();

        session.ensure_connected().expect("session should come up");
        assert_eq!(risk.get(), 0.0);

        handle.push_inbound(ALERT_TOPIC, br#"{"probability": 0.1}"#);
        handle.push_inbound(ALERT_TOPIC, br#"{"probability": 0.73}"#);
        session.pump().expect("pump");
        // last processed alert wins
        assert_eq!(risk.get(), 0.73);
    }

    #[test]
    fn pump_leaves_risk_unchanged_without_probability_field() {
        let broker_client = SimBrokerClient::new();
        let handle = broker_client.clone();
        let mut session = session(broker_client);
        let risk = session.risk();

        session.ensure_connected().expect("session should come up");
        handle.push_inbound(ALERT_TOPIC, br#"{"probability": 0.4}"#);
        session.pump().expect("pump");

        handle.push_inbound(ALERT_TOPIC, br#"{"reasons": "Unstable Cooling"}"#);
        session.pump().expect("pump");
        assert_eq!(risk.get(), 0.4);
    }

    #[test]
    fn pump_drops_malformed_alerts_without_touching_risk() {
        let broker_client = SimBrokerClient::new();
        let handle = broker_client.clone();
        let mut session = session(broker_client);
        let risk = session.risk();

        session.ensure_connected().expect("session should come up");
        handle.push_inbound(ALERT_TOPIC, br#"{"probability": 0.2}"#);
        session.pump().expect("pump");

        handle.push_inbound(ALERT_TOPIC, br#"{"probability":"#);
        session.pump().expect("pump");
        assert_eq!(risk.get(), 0.2);
    }

    #[test]
    fn pump_ignores_messages_on_other_topics() {
        let broker_client = SimBrokerClient::new();
        let handle = broker_client.clone();
        let mut session = session(broker_client);
        let risk = session.risk();

        session.ensure_connected().expect("session should come up");
        handle.push_inbound("motor/health/other", br#"{"probability": 0.99}"#);
        session.pump().expect("pump");
        assert_eq!(risk.get(), 0.0);
    }

    #[test]
    fn failed_send_demotes_session_state() {
        let broker_client = SimBrokerClient::new();
        let handle = broker_client.clone();
        let mut session = session(broker_client);

        session.ensure_connected().expect("session should come up");
        handle.set_fail_next_publish();

        assert!(matches!(
            session.publish("motor/health/data", b"{}"),
            Err(SessionError::Send(_))
        ));
        assert_eq!(session.state(), SessionState::Disconnected);
    }
}
