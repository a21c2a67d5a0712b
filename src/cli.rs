use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(version, about = "Ultrasonic time-of-flight anemometer", long_about = None)]
pub struct Cli {
    /// JSON configuration; defaults are used when omitted
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
    /// Log stage diagnostics
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the speed of sound for the given ambient conditions
    SpeedOfSound(AmbientArgs),
    /// Compute per-direction timing offsets from still-air echoes
    Calibrate {
        /// Still-air echo frames
        #[arg(short, long)]
        echoes: PathBuf,
        #[command(flatten)]
        distance: DistanceArgs,
        #[command(flatten)]
        ambient: AmbientArgs,
        #[arg(short, long, default_value = "calibration.json")]
        output: PathBuf,
    },
    /// Store still-air echoes as the phase-difference reference
    Reference {
        #[arg(short, long)]
        echoes: PathBuf,
        #[command(flatten)]
        ambient: AmbientArgs,
        #[arg(short, long, default_value = "reference.json")]
        output: PathBuf,
    },
    /// Wind speed from calibrated time of flight
    Measure {
        #[arg(short, long)]
        echoes: PathBuf,
        #[arg(long, default_value = "calibration.json")]
        calibration: PathBuf,
        /// Number of measurements, each from the next frames of the echo file
        #[arg(short = 'n', long, default_value_t = 1)]
        count: u32,
        /// Seconds between measurements
        #[arg(short, long, default_value_t = 0)]
        interval: u64,
    },
    /// Wind speed from the phase shift against a stored reference
    Phase {
        #[arg(short, long)]
        echoes: PathBuf,
        #[arg(short, long, default_value = "reference.json")]
        reference: PathBuf,
        #[command(flatten)]
        distance: DistanceArgs,
    },
}

#[derive(Debug, Args)]
pub struct AmbientArgs {
    /// Temperature in °C
    #[arg(short, long, allow_negative_numbers = true, required_unless_present = "sensors")]
    pub temperature: Option<f64>,
    /// Pressure in hPa
    #[arg(short, long, required_unless_present = "sensors")]
    pub pressure: Option<f64>,
    /// Relative humidity as a fraction in [0, 1]
    #[arg(long, required_unless_present = "sensors")]
    pub humidity: Option<f64>,
    /// Read the conditions from the BMP280 and DHT22 instead
    #[arg(long)]
    pub sensors: bool,
    #[arg(long, default_value = "/dev/i2c-1")]
    pub i2c: String,
}

#[derive(Debug, Args)]
pub struct DistanceArgs {
    /// Transducer spacing in meters, for every direction
    #[arg(short, long)]
    pub distance: f64,
    /// Per-direction overrides in meters
    #[arg(long)]
    pub distance_north: Option<f64>,
    #[arg(long)]
    pub distance_south: Option<f64>,
    #[arg(long)]
    pub distance_east: Option<f64>,
    #[arg(long)]
    pub distance_west: Option<f64>,
}
