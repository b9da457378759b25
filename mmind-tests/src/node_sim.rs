//! Runs the full node flow against the simulated link and broker: join
//! the network, establish and subscribe the broker session, then
//! alternate pump/publish cycles while alert payloads trickle in, the
//! way the analysis service would push them back. Useful for eyeballing
//! the logs of the whole connectivity core with no hardware present.

use std::time::Duration;

use mmind_net::{
    BrokerSession, LinkCredentials, LinkManager, RetryPolicy, SimBrokerClient, SimLinkClient,
    TelemetryPublisher, ALERT_TOPIC,
};
use mmindd::sensor::{MotorSensor, SimulatedMotorSensor};
use mmindp_telemetry::TelemetryRecord;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    log::info!("Initializing simulated node");

    let broker_client = SimBrokerClient::new();
    let broker_handle = broker_client.clone();

    let link = LinkManager::with_policy(
        Box::new(SimLinkClient::join_after("AA:BB:CC:DD:EE:FF", 2)),
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
    let mut sensor = SimulatedMotorSensor::default();

    // scripted alerts, as the analysis service would push them
    let alerts: [&[u8]; 4] = [
        br#"{"probability": 0.05, "reasons": ""}"#,
        br#"{"reasons": "no update this cycle"}"#,
        br#"{"probability": 0.62, "reasons": "Unstable Cooling"}"#,
        br#"{"probability": 0.91, "reasons": "Cooling Fan Failure"}"#,
    ];

    for (cycle, alert) in alerts.iter().enumerate() {
        broker_handle.push_inbound(ALERT_TOPIC, alert);
        publisher.pump()?;

        let sample = sensor.sample()?;
        let record = TelemetryRecord {
            temperature: sample.temperature,
            vibration: sample.vibration,
            rpm: sample.rpm,
            timestamp: cycle as u64,
        };

        let risk = publisher.publish(&record)?;
        log::info!("Cycle {cycle:}: published {record:?}, risk now {:.1}%", risk * 100.0);
    }

    let published = broker_handle.published();
    assert_eq!(published.len(), alerts.len());
    assert_eq!(publisher.risk().get(), 0.91);

    log::info!(
        "Simulated node flow complete, {:} records published",
        published.len()
    );

    Ok(())
}
