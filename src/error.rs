//! Error types for the compass heading crate.

use thiserror::Error;

/// Errors surfaced by sensor registration and the sensor backends.
#[derive(Debug, Error)]
pub enum SensorError {
    /// No rotation-vector sensor (or equivalent) is reachable.
    #[error("rotation vector sensor unavailable: {0}")]
    Unavailable(String),

    /// The register/unregister call against the sensor failed.
    #[error("sensor registration failed: {0}")]
    Registration(String),

    /// No sensor backend was compiled into this build.
    #[error("{0}")]
    NotLinked(String),

    /// Filter threshold was negative or not a finite number.
    #[error("invalid filter threshold: {0}")]
    InvalidThreshold(f64),

    /// Transport-level read or write failure.
    #[error("bus error: {0}")]
    Bus(String),
}

impl SensorError {
    /// Creates an unavailable-sensor error.
    #[must_use]
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable(reason.into())
    }

    /// Creates a registration failure, passing the underlying message through.
    #[must_use]
    pub fn registration(reason: impl std::fmt::Display) -> Self {
        Self::Registration(reason.to_string())
    }

    /// Creates a bus error.
    #[must_use]
    pub fn bus(reason: impl std::fmt::Display) -> Self {
        Self::Bus(reason.to_string())
    }
}

/// Result type for sensor operations.
pub type Result<T> = std::result::Result<T, SensorError>;
