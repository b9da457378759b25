//! Exercises the session recovery policies end to end: a link that
//! takes several polls to join, a broker that refuses the first few
//! handshakes, and a mid-run send failure that forces the session to
//! repair itself on the next publish.

use std::time::Duration;

use mmind_net::{
    BrokerSession, LinkCredentials, LinkManager, PublishError, RetryPolicy, SimBrokerClient,
    SimLinkClient, TelemetryPublisher,
};
use mmindp_telemetry::TelemetryRecord;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let broker_client = SimBrokerClient::failing_connects(3);
    let broker_handle = broker_client.clone();

    let link = LinkManager::with_policy(
        Box::new(SimLinkClient::join_after("AA:BB:CC:11:22:33", 4)),
        RetryPolicy::bounded(10, Duration::from_millis(10)),
    );
    let session = BrokerSession::with_policy(
        link,
        Box::new(broker_client),
        LinkCredentials {
            ssid: "motorlab".to_string(),
            psk: "hunter2".to_string(),
        },
        RetryPolicy::unbounded(Duration::from_millis(10)),
    );

    let mut publisher = TelemetryPublisher::new(session);

    log::info!("Bringing up session through 3 scripted handshake failures");
    publisher.connect()?;
    assert_eq!(broker_handle.connect_attempts(), 4);

    let record = TelemetryRecord {
        temperature: 5.0,
        vibration: 0.2,
        rpm: 1500,
        timestamp: 0,
    };
    publisher.publish(&record)?;

    log::info!("Scripting a send failure, expecting the session to repair itself");
    broker_handle.set_fail_next_publish();
    match publisher.publish(&record) {
        Err(PublishError::SendFailed) => {}
        other => panic!("Expected SendFailed, got {other:?}"),
    }

    publisher.publish(&record)?;
    assert_eq!(broker_handle.connect_attempts(), 5);
    assert_eq!(broker_handle.published().len(), 2);

    log::info!("Session reconnect flow complete");

    Ok(())
}
