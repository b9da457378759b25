use std::time::{Duration, Instant};

use chrono::Local;
use mmind_net::TelemetryPublisher;
use mmindp_telemetry::TelemetryRecord;

use crate::{
    sensor::{MotorSample, MotorSensor},
    MotorMinderError,
};

pub type MotorMinderResult<T> = std::result::Result<T, MotorMinderError>;

const DEFAULT_TICK_MILLIS: u64 = 500;

/// Driving loop for a motor-minder node: pumps the broker session on
/// every tick so inbound risk alerts are observed promptly, and
/// samples + publishes telemetry on the reporting interval.
pub struct MotorMinder {
    publisher: TelemetryPublisher,
    sensor: Box<dyn MotorSensor>,
    sample_interval: Duration,
    tick: Duration,
    pub running: bool,
}

impl MotorMinder {
    pub fn new(
        publisher: TelemetryPublisher,
        sensor: Box<dyn MotorSensor>,
        sample_interval: Duration,
    ) -> Self {
        Self {
            publisher,
            sensor,
            sample_interval,
            tick: Duration::from_millis(DEFAULT_TICK_MILLIS),
            running: true,
        }
    }

    /// Verify the sensor responds, then eagerly bring up the link and
    /// broker session. A link join failure here is surfaced to the
    /// caller rather than retried, so a misconfigured node fails at
    /// boot instead of spinning silently.
    pub fn startup(&mut self) -> MotorMinderResult<()> {
        let sample = self.sensor.sample()?;
        log::info!("Sensor online, first sample {sample:?}");
        self.publisher.connect()?;
        Ok(())
    }

    /// Run until [`MotorMinder::quit`] flips the running flag.
    /// Connectivity and publish failures are logged and retried on the
    /// next cycle; nothing in the loop is fatal.
    pub fn run(&mut self) -> MotorMinderResult<()> {
        let mut last_sample: Option<Instant> = None;

        while self.running {
            if let Err(e) = self.publisher.pump() {
                log::warn!("Session pump failed {e:}, will retry next tick");
            }

            if last_sample.map_or(true, |t| t.elapsed() >= self.sample_interval) {
                last_sample = Some(Instant::now());
                match self.sensor.sample() {
                    Ok(sample) => self.report(sample),
                    Err(e) => log::error!("Sensor read error {e:}"),
                }
            }

            std::thread::sleep(self.tick);
        }

        Ok(())
    }

    pub fn quit(&mut self) {
        self.running = false;
    }

    fn report(&mut self, sample: MotorSample) {
        let record = TelemetryRecord {
            temperature: sample.temperature,
            vibration: sample.vibration,
            rpm: sample.rpm,
            timestamp: Local::now().timestamp() as u64,
        };

        match self.publisher.publish(&record) {
            Ok(risk) => {
                log::info!(
                    "Published telemetry, current failure risk {:.1}%",
                    risk * 100.0
                );
            }
            Err(e) => {
                log::warn!("Publish failed {e:}, retrying next cycle");
            }
        }
    }
}
