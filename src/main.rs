use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use compass_heading::config::{BNO08X_ADDRESS, DEFAULT_FILTER_THRESHOLD};
use compass_heading::platform::{platform_has_compass, platform_sensor};
use compass_heading::{CompassHeading, CompassPoints, Direction, DisplayRotation};

/// Stream compass headings from the rotation vector sensor.
#[derive(Parser)]
#[command(name = "compass-heading", version, long_about = None)]
struct Cli {
    /// Minimum heading change (degrees) before a new heading is reported
    #[arg(short, long, default_value_t = DEFAULT_FILTER_THRESHOLD)]
    threshold: f64,

    /// Display rotation relative to the sensor's natural orientation (0, 90, 180, 270)
    #[arg(short, long, default_value = "0", value_parser = parse_rotation)]
    rotation: DisplayRotation,

    /// Compass rose used for direction labels (4, 8 or 16)
    #[arg(short, long, default_value = "8", value_parser = parse_points)]
    points: CompassPoints,

    /// Sensor bus address, decimal or 0x-prefixed hex
    #[arg(short, long, default_value_t = BNO08X_ADDRESS, value_parser = parse_address)]
    address: u16,

    /// Stop after this many seconds (runs until interrupted otherwise)
    #[arg(short, long)]
    duration: Option<u64>,

    /// Only check whether a compass is present, then exit
    #[arg(long)]
    probe: bool,
}

fn parse_rotation(s: &str) -> Result<DisplayRotation, String> {
    s.parse::<u16>()
        .ok()
        .and_then(DisplayRotation::from_degrees)
        .ok_or_else(|| format!("invalid rotation '{s}', expected 0, 90, 180 or 270"))
}

fn parse_points(s: &str) -> Result<CompassPoints, String> {
    match s {
        "4" => Ok(CompassPoints::Four),
        "8" => Ok(CompassPoints::Eight),
        "16" => Ok(CompassPoints::Sixteen),
        _ => Err(format!("invalid compass points '{s}', expected 4, 8 or 16")),
    }
}

fn parse_address(s: &str) -> Result<u16, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid address '{s}': {e}"))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    if cli.probe {
        let present = platform_has_compass(cli.address);
        println!("Compass present: {}", if present { "yes" } else { "no" });
        return Ok(());
    }

    let sensor = platform_sensor(cli.address)?;
    sensor.set_display_rotation(cli.rotation);
    let compass = CompassHeading::new(sensor);

    let (tx, rx) = mpsc::channel();
    compass
        .start(cli.threshold, move |data| {
            let _ = tx.send(data);
        })
        .context("failed to start compass heading")?;

    println!(
        "✓ Compass heading started (filter {:.1}°, display rotation {})",
        cli.threshold, cli.rotation
    );

    let deadline = cli
        .duration
        .map(|secs| Instant::now() + Duration::from_secs(secs));

    loop {
        let wait = match deadline {
            Some(deadline) => match deadline.checked_duration_since(Instant::now()) {
                Some(remaining) if !remaining.is_zero() => remaining,
                _ => break,
            },
            None => Duration::from_secs(1),
        };

        match rx.recv_timeout(wait) {
            Ok(data) => {
                let direction = Direction::from_heading(data.heading, cli.points);
                println!(
                    "Heading: {:>5.1}° ({}, {})",
                    data.heading,
                    direction,
                    direction.name()
                );
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    compass.stop();
    println!("Compass heading stopped");
    Ok(())
}
