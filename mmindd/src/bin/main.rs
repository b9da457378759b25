use std::time::Duration;

use mmind_net::{
    BrokerSession, LinkCredentials, LinkManager, MqttBrokerClient, NmCliLinkClient,
    TelemetryPublisher, BROKER_ADDR, BROKER_PORT, DEFAULT_WIFI_DEVICE,
};
use mmindd::{
    minder::{MotorMinder, MotorMinderResult},
    sensor::SimulatedMotorSensor,
};
use tracing_appender::rolling;
use tracing_subscriber::FmtSubscriber;

use tracing_log::LogTracer;

const DEFAULT_SAMPLE_INTERVAL_SECS: u64 = 5;

fn main() -> MotorMinderResult<()> {
    LogTracer::init().expect("Unable to set up log tracer");

    let log = rolling::daily("./logs", "debug");
    let (nb, _guard) = tracing_appender::non_blocking(log);

    let sub = FmtSubscriber::builder()
        .with_max_level(tracing::Level::DEBUG)
        .with_writer(nb)
        .finish();

    tracing::subscriber::set_global_default(sub).expect("Unable to set up tracing subscriber");

    let ssid = std::env::var("MMIND_WIFI_SSID").unwrap_or_else(|_| "motorlab".to_string());
    let psk = std::env::var("MMIND_WIFI_PSK").unwrap_or_default();
    let device =
        std::env::var("MMIND_WIFI_DEVICE").unwrap_or_else(|_| DEFAULT_WIFI_DEVICE.to_string());
    let broker_addr = std::env::var("MMIND_BROKER_ADDR").unwrap_or_else(|_| BROKER_ADDR.to_string());

    let link = LinkManager::new(Box::new(NmCliLinkClient::new(device)));
    let session = BrokerSession::new(
        link,
        Box::new(MqttBrokerClient::new(broker_addr, BROKER_PORT)),
        LinkCredentials { ssid, psk },
    );

    let mut minder = MotorMinder::new(
        TelemetryPublisher::new(session),
        Box::new(SimulatedMotorSensor::default()),
        Duration::from_secs(DEFAULT_SAMPLE_INTERVAL_SECS),
    );

    minder.startup().map_err(|e| {
        log::error!("Startup failed {e:}");
        e
    })?;

    minder.run()
}
