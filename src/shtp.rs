//! SHTP (Sensor Hub Transport Protocol) framing and the SH-2 reports used to
//! stream rotation vectors from a BNO08x.
//!
//! Every packet starts with a 4-byte header:
//!
//! ```text
//! Byte 0-1: length, little-endian, header included (bit 15 = continuation)
//! Byte 2:   channel
//! Byte 3:   per-channel sequence number
//! ```
//!
//! Sensor reports arrive on the input report channel, usually behind a base
//! timestamp record. Quaternion components are Q14 fixed point.

use std::time::Duration;

use crate::error::{Result, SensorError};
use crate::heading::RotationVector;

pub const HEADER_SIZE: usize = 4;

/// Largest packet read in one bus transaction. Advertisements run to ~280 bytes.
pub const MAX_PACKET_SIZE: usize = 300;

/// Largest length the 15-bit header field can carry.
pub const MAX_FRAME_LEN: usize = 0x7FFF;

const NUM_CHANNELS: usize = 6;

const Q14_SCALE: f64 = 1.0 / 16384.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Channel {
    Command = 0,
    Executable = 1,
    Control = 2,
    InputReport = 3,
    WakeInputReport = 4,
    Gyro = 5,
}

/// SH-2 report and command identifiers.
pub mod report {
    pub const ROTATION_VECTOR: u8 = 0x05;
    pub const GAME_ROTATION_VECTOR: u8 = 0x08;
    pub const TIMESTAMP_REBASE: u8 = 0xFA;
    pub const BASE_TIMESTAMP: u8 = 0xFB;
    pub const SET_FEATURE: u8 = 0xFD;
    pub const PRODUCT_ID_REQUEST: u8 = 0xF9;
    pub const PRODUCT_ID_RESPONSE: u8 = 0xF8;
}

/// Length of an input report by id, or `None` for ids we cannot skip over.
fn input_report_len(id: u8) -> Option<usize> {
    match id {
        // accelerometer, gyroscope, magnetometer, linear accel, gravity
        0x01..=0x04 | 0x06 => Some(10),
        report::ROTATION_VECTOR | 0x09 => Some(14),
        0x07 => Some(16),
        report::GAME_ROTATION_VECTOR => Some(12),
        report::TIMESTAMP_REBASE | report::BASE_TIMESTAMP => Some(5),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub channel: u8,
    pub sequence: u8,
    pub payload: Vec<u8>,
}

impl Packet {
    pub fn is_channel(&self, channel: Channel) -> bool {
        self.channel == channel as u8
    }
}

/// Frames `payload` for `channel`.
pub fn encode(channel: Channel, sequence: u8, payload: &[u8]) -> Result<Vec<u8>> {
    let length = HEADER_SIZE + payload.len();
    if length > MAX_FRAME_LEN {
        return Err(SensorError::bus(format!(
            "payload of {} bytes does not fit in one packet",
            payload.len()
        )));
    }
    let length = length as u16;
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&length.to_le_bytes());
    buf.push(channel as u8);
    buf.push(sequence);
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Parses one packet read from the bus. `None` means the hub had nothing queued.
pub fn decode(buf: &[u8]) -> Option<Packet> {
    if buf.len() < HEADER_SIZE || (buf[0] == 0xFF && buf[1] == 0xFF) {
        return None;
    }
    let length = usize::from(u16::from_le_bytes([buf[0], buf[1]]) & 0x7FFF);
    if length <= HEADER_SIZE {
        return None;
    }
    let end = length.min(buf.len());
    Some(Packet {
        channel: buf[2],
        sequence: buf[3],
        payload: buf[HEADER_SIZE..end].to_vec(),
    })
}

/// Set Feature command enabling `report_id` at `interval` (zero disables it).
pub fn set_feature_command(report_id: u8, interval: Duration) -> [u8; 17] {
    let micros = u32::try_from(interval.as_micros()).unwrap_or(u32::MAX);
    let interval = micros.to_le_bytes();
    [
        report::SET_FEATURE,
        report_id,
        0x00, // feature flags
        0x00, // change sensitivity
        0x00,
        interval[0],
        interval[1],
        interval[2],
        interval[3],
        0x00, // batch interval
        0x00,
        0x00,
        0x00,
        0x00, // sensor-specific config
        0x00,
        0x00,
        0x00,
    ]
}

pub fn product_id_request() -> [u8; 2] {
    [report::PRODUCT_ID_REQUEST, 0x00]
}

pub fn is_product_id_response(packet: &Packet) -> bool {
    packet.is_channel(Channel::Control)
        && packet.payload.first() == Some(&report::PRODUCT_ID_RESPONSE)
}

/// Extracts every rotation vector (report 0x05) from an input report payload.
///
/// Game rotation vectors are skipped: without the magnetometer their yaw is
/// not referenced to magnetic north. Parsing stops at the first report id
/// with an unknown length.
pub fn parse_rotation_vectors(payload: &[u8]) -> Vec<RotationVector> {
    let mut vectors = Vec::new();
    let mut offset = 0;

    while offset < payload.len() {
        let id = payload[offset];
        let Some(len) = input_report_len(id) else {
            break;
        };
        let Some(record) = payload.get(offset..offset + len) else {
            break;
        };
        if id == report::ROTATION_VECTOR {
            vectors.push(quaternion(record));
        }
        offset += len;
    }

    vectors
}

// i, j, k, real at bytes 4..12 of a quaternion report
fn quaternion(record: &[u8]) -> RotationVector {
    let q14 = |at: usize| f64::from(i16::from_le_bytes([record[at], record[at + 1]])) * Q14_SCALE;
    RotationVector::with_scalar(q14(4), q14(6), q14(8), q14(10))
}

/// Raw byte transport to an SHTP device.
pub trait ShtpBus: Send + 'static {
    fn write(&mut self, bytes: &[u8]) -> Result<()>;

    /// Reads up to `buf.len()` bytes in one transaction.
    fn read(&mut self, buf: &mut [u8]) -> Result<()>;
}

#[cfg(feature = "rpi")]
impl ShtpBus for rppal::i2c::I2c {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        rppal::i2c::I2c::write(self, bytes).map_err(SensorError::bus)?;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        rppal::i2c::I2c::read(self, buf).map_err(SensorError::bus)?;
        Ok(())
    }
}

/// An SHTP endpoint: a bus plus the per-channel sequence counters.
pub struct Shtp<B> {
    bus: B,
    sequence: [u8; NUM_CHANNELS],
}

impl<B: ShtpBus> Shtp<B> {
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            sequence: [0; NUM_CHANNELS],
        }
    }

    pub fn send(&mut self, channel: Channel, payload: &[u8]) -> Result<()> {
        let seq = &mut self.sequence[channel as usize];
        let frame = encode(channel, *seq, payload)?;
        *seq = seq.wrapping_add(1);
        self.bus.write(&frame)
    }

    pub fn receive(&mut self) -> Result<Option<Packet>> {
        let mut buf = [0u8; MAX_PACKET_SIZE];
        self.bus.read(&mut buf)?;
        Ok(decode(&buf))
    }

    pub fn release(self) -> B {
        self.bus
    }

    /// Asks for the product id and waits for the response. Used as the
    /// "is a sensor hub actually there" check.
    pub fn probe(&mut self, attempts: usize) -> Result<bool> {
        self.send(Channel::Control, &product_id_request())?;
        for _ in 0..attempts {
            if let Some(packet) = self.receive()?
                && is_product_id_response(&packet)
            {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::mock_bus::{
        MockBus, game_rotation_report, input_report, product_id_response,
    };
    use approx::assert_relative_eq;

    #[test]
    fn test_encode_header() -> Result<()> {
        let frame = encode(Channel::Control, 7, &[0xF9, 0x00])?;
        assert_eq!(frame, vec![6, 0, 2, 7, 0xF9, 0x00]);
        Ok(())
    }

    #[test]
    fn test_encode_rejects_oversized_payload() {
        let largest = vec![0u8; MAX_FRAME_LEN - HEADER_SIZE];
        assert!(encode(Channel::Control, 0, &largest).is_ok());

        let oversized = vec![0u8; MAX_FRAME_LEN - HEADER_SIZE + 1];
        assert!(matches!(
            encode(Channel::Control, 0, &oversized),
            Err(SensorError::Bus(_))
        ));
    }

    #[test]
    fn test_decode_empty_bus() {
        assert_eq!(decode(&[0u8; 16]), None);
        assert_eq!(decode(&[0xFF; 16]), None);
        assert_eq!(decode(&[1, 2]), None);
    }

    #[test]
    fn test_decode_trims_to_length() {
        let mut buf = [0u8; 32];
        buf[..7].copy_from_slice(&[7, 0, 3, 9, 0xAA, 0xBB, 0xCC]);
        let packet = decode(&buf).unwrap();
        assert_eq!(packet.channel, 3);
        assert_eq!(packet.sequence, 9);
        assert_eq!(packet.payload, vec![0xAA, 0xBB, 0xCC]);
        assert!(packet.is_channel(Channel::InputReport));
    }

    #[test]
    fn test_decode_ignores_continuation_bit() {
        let packet = decode(&[0x05, 0x80, 2, 0, 0x11]).unwrap();
        assert_eq!(packet.payload, vec![0x11]);
    }

    #[test]
    fn test_set_feature_command() {
        let cmd = set_feature_command(report::ROTATION_VECTOR, Duration::from_millis(20));
        assert_eq!(cmd[0], 0xFD);
        assert_eq!(cmd[1], 0x05);
        // 20000us = 0x4E20
        assert_eq!(&cmd[5..9], &[0x20, 0x4E, 0x00, 0x00]);
        assert!(cmd[9..].iter().all(|&b| b == 0));

        let off = set_feature_command(report::ROTATION_VECTOR, Duration::ZERO);
        assert_eq!(&off[5..9], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_parse_rotation_vector_behind_timestamp() {
        let payload = input_report(&[(0.0, 0.0, 0.5, 0.866)]);
        let vectors = parse_rotation_vectors(&payload);
        assert_eq!(vectors.len(), 1);
        assert_relative_eq!(vectors[0].z, 0.5, epsilon = 1e-3);
        assert_relative_eq!(vectors[0].scalar(), 0.866, epsilon = 1e-3);
    }

    #[test]
    fn test_parse_several_and_skip_unknown_lengths() {
        let mut payload = input_report(&[(0.1, 0.0, 0.0, 0.99), (0.0, 0.2, 0.0, 0.98)]);
        // gyroscope report in between is skipped, unknown id stops parsing
        payload.extend_from_slice(&[0x02, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        payload.extend_from_slice(&[0x42, 1, 2, 3]);
        let vectors = parse_rotation_vectors(&payload);
        assert_eq!(vectors.len(), 2);
        assert_relative_eq!(vectors[1].y, 0.2, epsilon = 1e-3);
    }

    #[test]
    fn test_parse_skips_game_rotation_vector() {
        let mut payload = game_rotation_report(0.0, 0.0, 0.5, 0.866);
        assert!(parse_rotation_vectors(&payload).is_empty());

        // a magnetic rotation vector after it is still found
        payload.extend_from_slice(&input_report(&[(0.0, 0.0, 0.25, 0.968)])[5..]);
        let vectors = parse_rotation_vectors(&payload);
        assert_eq!(vectors.len(), 1);
        assert_relative_eq!(vectors[0].z, 0.25, epsilon = 1e-3);
    }

    #[test]
    fn test_parse_truncated_report() {
        let payload = input_report(&[(0.0, 0.0, 0.5, 0.866)]);
        assert!(parse_rotation_vectors(&payload[..payload.len() - 1]).is_empty());
    }

    #[test]
    fn test_send_advances_sequence_per_channel() -> Result<()> {
        let bus = MockBus::new();
        let mut shtp = Shtp::new(bus.clone());
        shtp.send(Channel::Control, &[1])?;
        shtp.send(Channel::Control, &[2])?;
        shtp.send(Channel::Command, &[3])?;

        let writes = bus.writes();
        assert_eq!(writes[0][3], 0);
        assert_eq!(writes[1][3], 1);
        assert_eq!(writes[2][3], 0);
        Ok(())
    }

    #[test]
    fn test_probe() -> Result<()> {
        let bus = MockBus::new();
        bus.queue(Channel::Control, &product_id_response());
        let mut shtp = Shtp::new(bus.clone());
        assert!(shtp.probe(5)?);
        assert_eq!(bus.writes()[0][4], report::PRODUCT_ID_REQUEST);

        let mut silent = Shtp::new(MockBus::new());
        assert!(!silent.probe(5)?);
        Ok(())
    }

    #[test]
    fn test_probe_bus_error() {
        let bus = MockBus::new();
        bus.fail_writes("nack");
        let mut shtp = Shtp::new(bus);
        assert!(matches!(shtp.probe(5), Err(SensorError::Bus(_))));
    }
}
