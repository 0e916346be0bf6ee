//! Boundary between the heading pipeline and a platform orientation sensor.

use std::time::Duration;

use crate::error::Result;
use crate::heading::{DisplayRotation, RotationVector};

/// Receives raw samples from the sensor's delivery thread.
pub type SampleListener = Box<dyn FnMut(RotationVector) + Send + 'static>;

/// A platform orientation sensor that produces rotation-vector samples.
///
/// Implementations hold at most one listener. `unregister` must not return
/// until the listener has been dropped and will not be called again.
pub trait SensorAdapter: Send + Sync + 'static {
    /// Starts delivering samples to `listener` at roughly `interval`.
    ///
    /// Fails with [`SensorError::Unavailable`](crate::SensorError::Unavailable)
    /// if there is no rotation-vector sensor.
    fn register(&self, interval: Duration, listener: SampleListener) -> Result<()>;

    /// Stops delivery and drops the listener. No-op when nothing is registered.
    fn unregister(&self) -> Result<()>;

    /// Current display rotation. Read for every sample, never cached.
    fn display_rotation(&self) -> DisplayRotation {
        DisplayRotation::Rotation0
    }

    /// Whether an accelerometer and a magnetometer (or a native compass) exist.
    ///
    /// Platforms that cannot introspect their sensors answer `true`.
    fn has_compass(&self) -> Result<bool> {
        Ok(true)
    }
}
