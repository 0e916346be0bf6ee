use std::time::Duration;

// ** SAMPLING CONFIGURATION ** //

/// "Game" sampling rate: fast enough for interactive UI.
pub const GAME_SAMPLING_INTERVAL: Duration = Duration::from_millis(20);

/// How long the delivery thread sleeps when the sensor has nothing queued.
pub const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Ceiling for the retry delay after consecutive bus read failures.
pub const READ_RETRY_MAX_BACKOFF: Duration = Duration::from_millis(500);

/// While reads keep failing, only every Nth failure is logged as a warning.
pub const READ_FAILURE_WARN_EVERY: u32 = 100;

// ** HEADING CONFIGURATION ** //

/// Minimum change (degrees) before a new heading is emitted.
pub const DEFAULT_FILTER_THRESHOLD: f64 = 1.0;

/// Accuracy reported with every heading. No finer signal is surfaced.
pub const HEADING_ACCURACY: f64 = 1.0;

// ** BNO08X CONFIGURATION ** //

/// I2C address of the BNO08x with SA0 low (Adafruit/SparkFun default).
/// Boards with SA0 pulled high answer on 0x4B.
pub const BNO08X_ADDRESS: u16 = 0x4A;

/// Packets read while waiting for a Product ID response before giving up.
pub const PROBE_ATTEMPTS: usize = 20;
