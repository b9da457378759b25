use rand::Rng;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MotorSensorError {
    #[error("I/O Error")]
    Io(#[from] std::io::Error),
    #[error("Sensor read Error {0}")]
    ReadErr(String),
}

/// One raw motor health sample; the minder stamps it into a
/// [`mmindp_telemetry::TelemetryRecord`] at publish time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotorSample {
    pub temperature: f32,
    pub vibration: f32,
    pub rpm: i32,
}

/// Trait to allow different implementations of the motor sensing
/// hardware (accelerometer + thermistor + tachometer)
pub trait MotorSensor: Send {
    fn sample(&mut self) -> Result<MotorSample, MotorSensorError>;
}

/// Simulated motor: nominal readings with random noise and, with 10%
/// probability, a failure excursion (overheating, fan stall, shock).
/// Lets the full daemon loop run with no hardware attached.
#[derive(Debug, Default)]
pub struct SimulatedMotorSensor {
    excursions: u32,
}

impl MotorSensor for SimulatedMotorSensor {
    fn sample(&mut self) -> Result<MotorSample, MotorSensorError> {
        let mut rng = rand::thread_rng();

        if rng.gen_bool(0.1) {
            self.excursions += 1;
            log::warn!(
                "Simulating failure event ({:} so far)",
                self.excursions
            );
            return Ok(MotorSample {
                temperature: rng.gen_range(9.0..15.0),
                vibration: rng.gen_range(2.0..5.0),
                rpm: rng.gen_range(0..400),
            });
        }

        Ok(MotorSample {
            temperature: rng.gen_range(3.0..7.0),
            vibration: rng.gen_range(0.1..0.5),
            rpm: rng.gen_range(1400..1600),
        })
    }
}
