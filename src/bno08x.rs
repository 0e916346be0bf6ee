//! Rotation-vector sensor backed by a BNO08x sensor hub.
//!
//! The hub fuses accelerometer, gyroscope and magnetometer on-chip and
//! reports the result as a rotation vector (SH-2 report 0x05), which is
//! exactly what the heading pipeline consumes. Samples are polled on a
//! dedicated thread for the lifetime of one registration.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use crate::config::{
    IDLE_POLL_INTERVAL, PROBE_ATTEMPTS, READ_FAILURE_WARN_EVERY, READ_RETRY_MAX_BACKOFF,
};
use crate::error::{Result, SensorError};
use crate::heading::DisplayRotation;
use crate::sensor::{SampleListener, SensorAdapter};
use crate::shtp::{Channel, Shtp, ShtpBus, parse_rotation_vectors, report, set_feature_command};

type BusOpener<B> = Box<dyn Fn() -> Result<B> + Send + Sync>;

struct Worker<B> {
    running: Arc<AtomicBool>,
    /// Yields the port back, or `None` if the thread never received it.
    handle: JoinHandle<Option<Shtp<B>>>,
}

pub struct Bno08xSensor<B: ShtpBus> {
    open: BusOpener<B>,
    /// Bus handle kept between registrations.
    idle: Mutex<Option<Shtp<B>>>,
    worker: Mutex<Option<Worker<B>>>,
    display_rotation: AtomicU16,
}

impl<B: ShtpBus> Bno08xSensor<B> {
    /// Creates a sensor that opens its bus lazily with `open`.
    pub fn new<F>(open: F) -> Self
    where
        F: Fn() -> Result<B> + Send + Sync + 'static,
    {
        Self {
            open: Box::new(open),
            idle: Mutex::new(None),
            worker: Mutex::new(None),
            display_rotation: AtomicU16::new(0),
        }
    }

    /// Sets how the display is mounted relative to the sensor's natural
    /// orientation. Takes effect from the next sample.
    pub fn set_display_rotation(&self, rotation: DisplayRotation) {
        self.display_rotation
            .store(rotation.degrees(), Ordering::Relaxed);
    }

    pub fn is_streaming(&self) -> bool {
        self.worker.lock().is_some()
    }

    fn take_port(&self) -> Result<Shtp<B>> {
        if let Some(port) = self.idle.lock().take() {
            return Ok(port);
        }
        (self.open)().map(Shtp::new)
    }

    fn park(&self, port: Shtp<B>) {
        *self.idle.lock() = Some(port);
    }

    /// Disables the rotation vector report and parks the port, even if the
    /// disable command fails.
    fn shut_down(&self, mut port: Shtp<B>) -> Result<()> {
        let disable = set_feature_command(report::ROTATION_VECTOR, Duration::ZERO);
        let result = port
            .send(Channel::Control, &disable)
            .map_err(SensorError::registration);
        self.park(port);
        debug!("rotation vector disabled");
        result
    }
}

#[cfg(feature = "rpi")]
impl Bno08xSensor<rppal::i2c::I2c> {
    /// BNO08x on the Raspberry Pi's primary I2C bus at `address`.
    pub fn i2c(address: u16) -> Self {
        Self::new(move || {
            let mut i2c = rppal::i2c::I2c::new()
                .map_err(|e| SensorError::unavailable(format!("cannot open I2C bus: {e}")))?;
            i2c.set_slave_address(address).map_err(|e| {
                SensorError::unavailable(format!("cannot address 0x{address:02X}: {e}"))
            })?;
            Ok(i2c)
        })
    }
}

impl<B: ShtpBus> SensorAdapter for Bno08xSensor<B> {
    fn register(&self, interval: Duration, listener: SampleListener) -> Result<()> {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Err(SensorError::registration("a listener is already registered"));
        }

        let mut port = self.take_port()?;
        match port.probe(PROBE_ATTEMPTS) {
            Ok(true) => {}
            Ok(false) => {
                self.park(port);
                return Err(SensorError::unavailable("no BNO08x answered on the bus"));
            }
            Err(e) => {
                self.park(port);
                return Err(SensorError::unavailable(e.to_string()));
            }
        }

        let enable = set_feature_command(report::ROTATION_VECTOR, interval);
        if let Err(e) = port.send(Channel::Control, &enable) {
            self.park(port);
            return Err(SensorError::registration(e));
        }
        debug!(interval_us = interval.as_micros() as u64, "rotation vector enabled");

        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        // handed over through a slot so a failed spawn can still reclaim it
        let handoff = Arc::new(Mutex::new(Some(port)));
        let slot = Arc::clone(&handoff);
        let spawned = thread::Builder::new()
            .name("bno08x-rv".to_string())
            .spawn(move || {
                let port = slot.lock().take()?;
                Some(deliver(port, flag, listener))
            });

        match spawned {
            Ok(handle) => {
                *worker = Some(Worker { running, handle });
                Ok(())
            }
            Err(e) => {
                if let Some(port) = handoff.lock().take()
                    && let Err(disable) = self.shut_down(port)
                {
                    warn!("failed to disable rotation vector: {}", disable);
                }
                Err(SensorError::registration(e))
            }
        }
    }

    fn unregister(&self) -> Result<()> {
        let Some(worker) = self.worker.lock().take() else {
            return Ok(());
        };

        worker.running.store(false, Ordering::Release);
        let port = worker
            .handle
            .join()
            .map_err(|_| SensorError::registration("delivery thread panicked"))?;

        match port {
            Some(port) => self.shut_down(port),
            None => Ok(()),
        }
    }

    fn display_rotation(&self) -> DisplayRotation {
        DisplayRotation::from_degrees(self.display_rotation.load(Ordering::Relaxed))
            .unwrap_or_default()
    }

    /// The hub carries both an accelerometer and a magnetometer, so the
    /// compass is present iff the hub answers.
    fn has_compass(&self) -> Result<bool> {
        if self.is_streaming() {
            return Ok(true);
        }
        let mut port = self.take_port()?;
        let present = port.probe(PROBE_ATTEMPTS);
        self.park(port);
        present
    }
}

impl<B: ShtpBus> Drop for Bno08xSensor<B> {
    fn drop(&mut self) {
        let _ = self.unregister();
    }
}

/// Delay before the next read after `failures` consecutive read errors:
/// doubles from the idle poll interval up to [`READ_RETRY_MAX_BACKOFF`].
fn retry_delay(failures: u32) -> Duration {
    let factor = 1u32 << failures.saturating_sub(1).min(16);
    IDLE_POLL_INTERVAL
        .saturating_mul(factor)
        .min(READ_RETRY_MAX_BACKOFF)
}

/// The first failure of a run is always logged, then every Nth.
fn should_warn(failures: u32) -> bool {
    failures == 1 || failures % READ_FAILURE_WARN_EVERY == 0
}

/// Delivery loop. Returns the port once `running` is cleared; the listener
/// is dropped on return.
fn deliver<B: ShtpBus>(
    mut port: Shtp<B>,
    running: Arc<AtomicBool>,
    mut listener: SampleListener,
) -> Shtp<B> {
    let mut failures: u32 = 0;
    while running.load(Ordering::Acquire) {
        let received = port.receive();
        if received.is_ok() && failures > 0 {
            info!(failures, "BNO08x reads recovered");
            failures = 0;
        }
        match received {
            Ok(Some(packet)) if packet.is_channel(Channel::InputReport) => {
                for vector in parse_rotation_vectors(&packet.payload) {
                    trace!(x = vector.x, y = vector.y, z = vector.z, "rotation vector");
                    listener(vector);
                }
            }
            Ok(Some(packet)) => {
                trace!(channel = packet.channel, "ignoring packet");
            }
            Ok(None) => thread::sleep(IDLE_POLL_INTERVAL),
            Err(e) => {
                failures = failures.saturating_add(1);
                if should_warn(failures) {
                    warn!(failures, "BNO08x read failed: {}", e);
                } else {
                    trace!(failures, "BNO08x read failed: {}", e);
                }
                thread::sleep(retry_delay(failures));
            }
        }
    }
    port
}
