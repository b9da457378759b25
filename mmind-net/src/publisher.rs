use thiserror::Error;

use mmindp_telemetry::{encode_telemetry, TelemetryCodecError, TelemetryRecord};

use crate::{
    link::LinkState,
    risk::RiskCell,
    session::{BrokerSession, SessionError, SessionState},
    DATA_TOPIC,
};

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Network link is down")]
    LinkDown,
    #[error("Telemetry send failed")]
    SendFailed,
    #[error("Session Error")]
    Session(#[from] SessionError),
    #[error("Codec Error")]
    Codec(#[from] TelemetryCodecError),
}

/// Public entry point for the outbound telemetry path: given a sensor
/// reading, ensures broker connectivity, encodes and sends it, and
/// returns the current risk estimate.
///
/// The returned risk is whatever was last received asynchronously on
/// the alert topic; it has no causal relationship to the record just
/// sent and may be stale or still 0.0 if no alert has arrived yet.
pub struct TelemetryPublisher {
    session: BrokerSession,
    risk: RiskCell,
}

impl TelemetryPublisher {
    pub fn new(session: BrokerSession) -> Self {
        let risk = session.risk();
        Self { session, risk }
    }

    /// Publish one telemetry record on the data topic.
    ///
    /// Fails immediately with [`PublishError::LinkDown`] when the
    /// network link is not up; never blocks on link recovery. May block
    /// in [`BrokerSession::ensure_connected`] when the broker session
    /// needs to be (re)established.
    pub fn publish(&mut self, record: &TelemetryRecord) -> Result<f32, PublishError> {
        if self.session.link().status() != LinkState::Connected {
            log::warn!("Network link is down, skipping publish");
            return Err(PublishError::LinkDown);
        }

        if !matches!(
            self.session.state(),
            SessionState::Connected | SessionState::Subscribed
        ) {
            self.session.ensure_connected()?;
        }

        let payload = encode_telemetry(record)?;

        match self.session.publish(DATA_TOPIC, &payload) {
            Ok(()) => Ok(self.risk.get()),
            Err(SessionError::Send(e)) => {
                log::error!("Telemetry send failed {e:}");
                Err(PublishError::SendFailed)
            }
            Err(e) => Err(PublishError::Session(e)),
        }
    }

    /// Service the underlying session; must be invoked regularly by
    /// the driving loop so inbound alerts are observed between
    /// publishes
    pub fn pump(&mut self) -> Result<(), SessionError> {
        self.session.pump()
    }

    /// Eagerly bring up the link and broker session, for callers that
    /// connect at startup rather than on first publish
    pub fn connect(&mut self) -> Result<(), SessionError> {
        self.session.ensure_connected()
    }

    /// Handle to the shared risk value
    pub fn risk(&self) -> RiskCell {
        self.risk.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{SimBrokerClient, SimLinkClient};
    use crate::link::{LinkCredentials, LinkManager};
    use crate::RetryPolicy;
    use crate::ALERT_TOPIC;
    use std::time::Duration;

    fn publisher(
        broker_client: SimBrokerClient,
        link_client: SimLinkClient,
    ) -> TelemetryPublisher {
        let link = LinkManager::with_policy(
            Box::new(link_client),
            RetryPolicy::bounded(5, Duration::from_millis(1)),
        );
        let session = BrokerSession::with_policy(
            link,
            Box::new(broker_client),
            LinkCredentials {
                ssid: "motorlab".to_string(),
                psk: "hunter2".to_string(),
            },
            RetryPolicy::unbounded(Duration::from_millis(1)),
        );
        TelemetryPublisher::new(session)
    }

    fn record() -> TelemetryRecord {
        TelemetryRecord {
            temperature: 5.2,
            vibration: 0.3,
            rpm: 1500,
            timestamp: 1717171717,
        }
    }

    #[test]
    fn publish_with_link_down_fails_without_broker_connect() {
        let broker_client = SimBrokerClient::new();
        let handle = broker_client.clone();
        // link exists but no join has happened
        let mut publisher = publisher(broker_client, SimLinkClient::unjoinable("AA:BB:CC:11:22:33"));

        assert!(matches!(
            publisher.publish(&record()),
            Err(PublishError::LinkDown)
        ));
        assert_eq!(handle.connect_attempts(), 0);
        assert!(handle.published().is_empty());
    }

    #[test]
    fn publish_establishes_session_after_bounded_handshake_failures() {
        let broker_client = SimBrokerClient::failing_connects(3);
        let handle = broker_client.clone();
        // link already up, broker session not yet established: the
        // publish call itself must run the handshake retry loop
        let link_client = SimLinkClient::already_joined("AA:BB:CC:11:22:33");

        let mut publisher = publisher(broker_client, link_client);
        let risk = publisher.publish(&record()).expect("publish");
        assert_eq!(handle.connect_attempts(), 4);
        assert_eq!(risk, 0.0);

        let published = handle.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, DATA_TOPIC);
        let parsed: TelemetryRecord =
            serde_json::from_slice(&published[0].1).expect("payload reparses");
        assert_eq!(parsed, record());
    }

    #[test]
    fn publish_returns_latest_risk_received_between_publishes() {
        let broker_client = SimBrokerClient::new();
        let handle = broker_client.clone();
        let mut publisher = publisher(broker_client, SimLinkClient::new("AA:BB:CC:11:22:33"));
        publisher.connect().expect("startup connect");

        let risk = publisher.publish(&record()).expect("first publish");
        assert_eq!(risk, 0.0);

        handle.push_inbound(ALERT_TOPIC, br#"{"probability": 0.1}"#);
        publisher.pump().expect("pump");
        handle.push_inbound(ALERT_TOPIC, br#"{"probability": 0.9}"#);
        publisher.pump().expect("pump");

        let risk = publisher.publish(&record()).expect("second publish");
        assert_eq!(risk, 0.9);
    }

    #[test]
    fn failed_send_surfaces_and_next_publish_reconnects() {
        let broker_client = SimBrokerClient::new();
        let handle = broker_client.clone();
        let mut publisher = publisher(broker_client, SimLinkClient::new("AA:BB:CC:11:22:33"));
        publisher.connect().expect("startup connect");
        let attempts_after_startup = handle.connect_attempts();

        handle.set_fail_next_publish();
        assert!(matches!(
            publisher.publish(&record()),
            Err(PublishError::SendFailed)
        ));

        // publish demoted the session; the next attempt repairs it
        let risk = publisher.publish(&record()).expect("reconnect publish");
        assert_eq!(risk, 0.0);
        assert_eq!(handle.connect_attempts(), attempts_after_startup + 1);
        assert_eq!(handle.published().len(), 1);
    }
}
