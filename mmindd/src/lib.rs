//! Daemon for running a motor-minder sensor node: samples motor
//! health readings (temperature, vibration, rpm) on a fixed interval
//! and reports them to the remote analysis service via the
//! connectivity core in `mmind-net`, logging the failure-risk
//! probability the service pushes back

pub mod minder;
pub mod sensor;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MotorMinderError {
    #[error("Session Error")]
    Session(#[from] mmind_net::SessionError),
    #[error("Sensor Error")]
    Sensor(#[from] sensor::MotorSensorError),
}
