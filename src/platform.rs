//! Build-time choice of sensor backend.
//!
//! With the `rpi` feature the platform sensor is a BNO08x on the Raspberry
//! Pi's I2C bus. Without any backend, [`platform_sensor`] fails with
//! [`crate::SensorError::NotLinked`] so a misconfigured build is caught on first use.

use crate::error::Result;
#[cfg(not(feature = "rpi"))]
use crate::error::SensorError;
#[cfg(not(feature = "rpi"))]
use crate::heading::DisplayRotation;
#[cfg(not(feature = "rpi"))]
use crate::sensor::{SampleListener, SensorAdapter};

/// Message returned when no sensor backend is compiled in.
pub const LINKING_ERROR: &str = "compass-heading was built without a sensor backend. Make sure:\n\
    - You enabled a backend feature (e.g. `--features rpi`)\n\
    - You rebuilt after changing features\n";

#[cfg(feature = "rpi")]
pub type PlatformSensor = crate::bno08x::Bno08xSensor<rppal::i2c::I2c>;

/// Opens the platform's rotation-vector sensor. `address` is the sensor's
/// bus address where the backend has one.
#[cfg(feature = "rpi")]
pub fn platform_sensor(address: u16) -> Result<PlatformSensor> {
    Ok(crate::bno08x::Bno08xSensor::i2c(address))
}

/// Uninhabited: no value can exist when no backend is linked.
#[cfg(not(feature = "rpi"))]
pub enum PlatformSensor {}

#[cfg(not(feature = "rpi"))]
impl PlatformSensor {
    pub fn set_display_rotation(&self, _rotation: DisplayRotation) {
        match *self {}
    }
}

#[cfg(not(feature = "rpi"))]
pub fn platform_sensor(_address: u16) -> Result<PlatformSensor> {
    Err(SensorError::NotLinked(LINKING_ERROR.to_string()))
}

#[cfg(not(feature = "rpi"))]
impl SensorAdapter for PlatformSensor {
    fn register(&self, _interval: std::time::Duration, _listener: SampleListener) -> Result<()> {
        match *self {}
    }

    fn unregister(&self) -> Result<()> {
        match *self {}
    }

    fn display_rotation(&self) -> DisplayRotation {
        match *self {}
    }
}

/// `has_compass` for callers that may not have a linked backend: a missing
/// backend or a failed probe answers `false` instead of erroring.
pub fn platform_has_compass(address: u16) -> bool {
    match platform_sensor(address) {
        Ok(sensor) => crate::subscription::CompassHeading::new(sensor).has_compass(),
        Err(e) => {
            tracing::warn!("{}", e);
            false
        }
    }
}
