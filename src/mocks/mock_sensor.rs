// This file is only compiled during tests

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{Result, SensorError};
use crate::heading::{DisplayRotation, RotationVector};
use crate::sensor::{SampleListener, SensorAdapter};

#[derive(Default)]
struct MockState {
    listener: Option<SampleListener>,
    registrations: usize,
    unregister_calls: usize,
    last_interval: Option<Duration>,
    display_rotation: DisplayRotation,
    fail_register: Option<String>,
    fail_probe: bool,
}

/// In-memory orientation sensor. Clones share state, so a test can keep a
/// handle after moving one into a `CompassHeading`.
#[derive(Clone)]
pub struct MockSensor {
    state: Arc<Mutex<MockState>>,
    rotation_vector: bool,
    magnetometer: bool,
}

impl MockSensor {
    pub fn new() -> Self {
        Self {
            state: Arc::default(),
            rotation_vector: true,
            magnetometer: true,
        }
    }

    pub fn without_rotation_vector() -> Self {
        Self {
            rotation_vector: false,
            ..Self::new()
        }
    }

    pub fn without_magnetometer() -> Self {
        Self {
            magnetometer: false,
            ..Self::new()
        }
    }

    // test helper: the next register call fails with this message
    pub fn fail_next_register(&self, message: &str) {
        self.state.lock().fail_register = Some(message.to_string());
    }

    pub fn fail_probe(&self) {
        self.state.lock().fail_probe = true;
    }

    pub fn set_display_rotation(&self, rotation: DisplayRotation) {
        self.state.lock().display_rotation = rotation;
    }

    /// Delivers one sample to the registered listener, as the OS would.
    pub fn emit(&self, vector: RotationVector) {
        // take the listener out so it can read the display rotation
        let listener = self.state.lock().listener.take();
        if let Some(mut listener) = listener {
            listener(vector);
            let mut state = self.state.lock();
            if state.registrations > 0 && state.listener.is_none() {
                state.listener = Some(listener);
            }
        }
    }

    pub fn active_registrations(&self) -> usize {
        self.state.lock().registrations
    }

    pub fn unregister_calls(&self) -> usize {
        self.state.lock().unregister_calls
    }

    pub fn last_interval(&self) -> Option<Duration> {
        self.state.lock().last_interval
    }
}

impl SensorAdapter for MockSensor {
    fn register(&self, interval: Duration, listener: SampleListener) -> Result<()> {
        if !self.rotation_vector {
            return Err(SensorError::unavailable("no rotation vector sensor"));
        }
        let mut state = self.state.lock();
        if let Some(message) = state.fail_register.take() {
            return Err(SensorError::registration(message));
        }
        assert_eq!(state.registrations, 0, "listener already registered");
        state.registrations = 1;
        state.listener = Some(listener);
        state.last_interval = Some(interval);
        Ok(())
    }

    fn unregister(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.unregister_calls += 1;
        state.registrations = 0;
        state.listener = None;
        Ok(())
    }

    fn display_rotation(&self) -> DisplayRotation {
        self.state.lock().display_rotation
    }

    fn has_compass(&self) -> Result<bool> {
        if self.state.lock().fail_probe {
            return Err(SensorError::bus("probe failed"));
        }
        Ok(self.magnetometer)
    }
}
