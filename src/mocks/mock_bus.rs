// This file is only compiled during tests

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Result, SensorError};
use crate::shtp::{Channel, ShtpBus, encode, report};

#[derive(Default)]
struct BusState {
    reads: VecDeque<Vec<u8>>,
    writes: Vec<Vec<u8>>,
    // (writes that still succeed, error message)
    fail_writes: Option<(usize, String)>,
    fail_reads: Option<String>,
    read_calls: usize,
}

/// Scripted SHTP bus. Reads pop queued frames, then return all zeros
/// ("nothing queued"). Clones share state.
#[derive(Clone, Default)]
pub struct MockBus {
    state: Arc<Mutex<BusState>>,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&self, channel: Channel, payload: &[u8]) {
        let frame = encode(channel, 0, payload).expect("test payload fits in one packet");
        self.state.lock().reads.push_back(frame);
    }

    pub fn fail_writes(&self, message: &str) {
        self.fail_writes_after(0, message);
    }

    pub fn fail_writes_after(&self, successes: usize, message: &str) {
        self.state.lock().fail_writes = Some((successes, message.to_string()));
    }

    pub fn fail_reads(&self, message: &str) {
        self.state.lock().fail_reads = Some(message.to_string());
    }

    pub fn read_calls(&self) -> usize {
        self.state.lock().read_calls
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state.lock().writes.clone()
    }
}

impl ShtpBus for MockBus {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let mut state = self.state.lock();
        if let Some((remaining, message)) = &mut state.fail_writes {
            if *remaining == 0 {
                return Err(SensorError::bus(&*message));
            }
            *remaining -= 1;
        }
        state.writes.push(bytes.to_vec());
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        buf.fill(0);
        let mut state = self.state.lock();
        state.read_calls += 1;
        if let Some(message) = &state.fail_reads {
            return Err(SensorError::bus(message));
        }
        if let Some(frame) = state.reads.pop_front() {
            let n = frame.len().min(buf.len());
            buf[..n].copy_from_slice(&frame[..n]);
        }
        Ok(())
    }
}

fn q14(v: f64) -> [u8; 2] {
    ((v * 16384.0).round() as i16).to_le_bytes()
}

// test helper: input report payload with a base timestamp and one rotation
// vector report per (i, j, k, real) quaternion
pub fn input_report(quaternions: &[(f64, f64, f64, f64)]) -> Vec<u8> {
    let mut payload = vec![report::BASE_TIMESTAMP, 0, 0, 0, 0];
    for (seq, &(i, j, k, real)) in quaternions.iter().enumerate() {
        payload.extend_from_slice(&[report::ROTATION_VECTOR, seq as u8, 0x03, 0]);
        for component in [i, j, k, real] {
            payload.extend_from_slice(&q14(component));
        }
        // accuracy estimate, unused
        payload.extend_from_slice(&[0, 0]);
    }
    payload
}

// test helper: input report payload with a base timestamp and one game
// rotation vector (no magnetometer, no accuracy field)
pub fn game_rotation_report(i: f64, j: f64, k: f64, real: f64) -> Vec<u8> {
    let mut payload = vec![report::BASE_TIMESTAMP, 0, 0, 0, 0];
    payload.extend_from_slice(&[report::GAME_ROTATION_VECTOR, 0, 0x03, 0]);
    for component in [i, j, k, real] {
        payload.extend_from_slice(&q14(component));
    }
    payload
}

// test helper: product id response payload
pub fn product_id_response() -> Vec<u8> {
    let mut payload = vec![report::PRODUCT_ID_RESPONSE, 0x00, 3, 2];
    payload.resize(16, 0);
    payload
}
