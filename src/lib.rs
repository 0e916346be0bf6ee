//! Compass heading from a rotation-vector sensor.
//!
//! Raw samples flow one way: sensor adapter → heading computer → change
//! filter → the single active subscription's callback.

pub mod bno08x;
pub mod compass;
pub mod config;
pub mod error;
pub mod filter;
pub mod heading;
pub mod platform;
pub mod sensor;
pub mod shtp;
pub mod subscription;

// Re-export commonly used types
pub use compass::{CompassPoints, Direction};
pub use error::{Result, SensorError};
pub use heading::{DisplayRotation, HeadingData, HeadingSample, RotationVector};
pub use sensor::SensorAdapter;
pub use subscription::{CompassHeading, SubscriptionState};

#[cfg(test)]
pub(crate) mod mocks;
