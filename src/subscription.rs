//! Single-slot subscription lifecycle: `Idle → Active → Idle`.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::GAME_SAMPLING_INTERVAL;
use crate::error::{Result, SensorError};
use crate::filter::ChangeFilter;
use crate::heading::{HeadingData, RotationVector, compute_heading};
use crate::sensor::{SampleListener, SensorAdapter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Idle,
    Active,
}

/// Bookkeeping for the live registration. The listener itself is owned by
/// the adapter and dropped on unregister.
#[derive(Debug, Clone, Copy)]
struct Subscription {
    filter_threshold: f64,
}

/// Delivers filtered compass headings from one sensor to one callback.
pub struct CompassHeading<A: SensorAdapter> {
    adapter: Arc<A>,
    /// Serializes `start`/`stop`. Held across register and unregister.
    lifecycle: Mutex<()>,
    /// Read by the status queries; only ever locked briefly.
    active: Mutex<Option<Subscription>>,
}

impl<A: SensorAdapter> CompassHeading<A> {
    pub fn new(adapter: A) -> Self {
        Self {
            adapter: Arc::new(adapter),
            lifecycle: Mutex::new(()),
            active: Mutex::new(None),
        }
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn state(&self) -> SubscriptionState {
        match *self.active.lock() {
            Some(_) => SubscriptionState::Active,
            None => SubscriptionState::Idle,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state() == SubscriptionState::Active
    }

    /// Threshold of the active subscription, if any.
    pub fn filter_threshold(&self) -> Option<f64> {
        self.active.lock().as_ref().map(|sub| sub.filter_threshold)
    }

    /// Starts heading delivery, replacing any active subscription.
    ///
    /// Returns once the sensor is registered. `on_heading` is then called from
    /// the sensor's delivery thread for every heading that passes the filter.
    ///
    /// Inside `on_heading`:
    /// - [`state`](Self::state), [`is_active`](Self::is_active),
    ///   [`filter_threshold`](Self::filter_threshold) and
    ///   [`has_compass`](Self::has_compass) may be called. While a `stop` is
    ///   in progress they already report `Idle`.
    /// - `start` and `stop` must not be called: both wait for the delivery
    ///   thread, which is the calling thread.
    /// - The callback must not hold the last handle to this `CompassHeading`,
    ///   for the same reason.
    ///
    /// A panic in `on_heading` ends the delivery thread. The subscription still
    /// reads `Active` until the next `stop`, which reports the panic as a
    /// warning.
    pub fn start<F>(&self, filter_threshold: f64, on_heading: F) -> Result<()>
    where
        F: FnMut(HeadingData) + Send + 'static,
    {
        if !filter_threshold.is_finite() || filter_threshold < 0.0 {
            return Err(SensorError::InvalidThreshold(filter_threshold));
        }

        let _lifecycle = self.lifecycle.lock();
        if self.active.lock().take().is_some() {
            debug!("replacing active compass subscription");
            if let Err(e) = self.adapter.unregister() {
                warn!("failed to unregister previous listener: {}", e);
            }
        }

        let listener = self.pipeline(filter_threshold, on_heading);
        if let Err(e) = self.adapter.register(GAME_SAMPLING_INTERVAL, listener) {
            warn!("failed to start compass heading: {}", e);
            return Err(e);
        }

        *self.active.lock() = Some(Subscription { filter_threshold });
        info!(filter = filter_threshold, "compass heading started");
        Ok(())
    }

    /// Stops heading delivery. Safe to call when nothing is active.
    pub fn stop(&self) {
        let _lifecycle = self.lifecycle.lock();
        if self.active.lock().take().is_none() {
            return;
        }
        if let Err(e) = self.adapter.unregister() {
            warn!("failed to unregister listener: {}", e);
        }
        info!("compass heading stopped");
    }

    /// Capability probe. Probe failures degrade to `false`.
    pub fn has_compass(&self) -> bool {
        self.adapter.has_compass().unwrap_or_else(|e| {
            warn!("error checking for compass: {}", e);
            false
        })
    }

    /// Sample → heading → filter → callback, run inline on the delivery thread.
    fn pipeline<F>(&self, filter_threshold: f64, mut on_heading: F) -> SampleListener
    where
        F: FnMut(HeadingData) + Send + 'static,
    {
        let adapter = Arc::clone(&self.adapter);
        let mut filter = ChangeFilter::new(filter_threshold);

        Box::new(move |vector: RotationVector| {
            let sample = compute_heading(&vector, adapter.display_rotation());
            if let Some(data) = filter.accept(sample) {
                debug!(heading = data.heading, "heading updated");
                on_heading(data);
            }
        })
    }
}

impl<A: SensorAdapter> Drop for CompassHeading<A> {
    fn drop(&mut self) {
        // the adapter's listener holds an Arc to the adapter
        self.stop();
    }
}
