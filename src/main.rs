mod cli;

use std::path::Path;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use cli::{AmbientArgs, Cli, Command, DistanceArgs};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sonic_anemometer::anemometer::ambient::{AmbientSensors, DHT22_HUMIDITY};
use sonic_anemometer::anemometer::anemometer::Anemometer;
use sonic_anemometer::anemometer::psychrometry::{speed_of_sound, AmbientConditions};
use sonic_anemometer::anemometer::resolver::{PhaseDifferenceResolver, PhaseReference};
use sonic_anemometer::anemometer::storage::{
    load_calibration, load_echo_frames, load_phase_reference, save_json, FileEchoSource,
};
use sonic_anemometer::{AnemometerConfig, AnemometerError, Direction, PerDirection, WindReading};

fn main() -> Result<()> {
    //Parse the program arguments into the Cli structure
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => AnemometerConfig::load(path)
            .with_context(|| format!("can't load configuration {}", path.display()))?,
        None => AnemometerConfig::default(),
    };

    match cli.command {
        Command::SpeedOfSound(ambient) => {
            let ambient = read_ambient(&ambient)?;
            let speed = speed_of_sound(&ambient, &config.gas)?;
            println!("{speed:.3} m/s");
        }
        Command::Calibrate {
            echoes,
            distance,
            ambient,
            output,
        } => {
            let ambient = read_ambient(&ambient)?;
            let source = FileEchoSource::open(&echoes)
                .with_context(|| format!("can't read echoes {}", echoes.display()))?;
            let mut anemometer = Anemometer::new(source, config)?;
            let record = anemometer.calibrate(&distances(&distance), &ambient)?;
            save_json(&output, &record)?;
            info!(path = %output.display(), "calibration saved");
        }
        Command::Reference {
            echoes,
            ambient,
            output,
        } => {
            let ambient = read_ambient(&ambient)?;
            let frames = load_echo_frames(&echoes)
                .with_context(|| format!("can't read echoes {}", echoes.display()))?;
            let reference = PhaseReference::capture(&frames, &ambient, &config)?;
            save_json(&output, &reference)?;
            info!(
                path = %output.display(),
                speed_of_sound = reference.speed_of_sound,
                "reference saved"
            );
        }
        Command::Measure {
            echoes,
            calibration,
            count,
            interval,
        } => {
            let record = load_calibration(&calibration)?;
            let source = FileEchoSource::open(&echoes)
                .with_context(|| format!("can't read echoes {}", echoes.display()))?;
            let anemometer = Anemometer::new(source, config)?.with_calibration(record)?;

            for i in 0..count {
                if i > 0 {
                    thread::sleep(Duration::from_secs(interval));
                }
                match anemometer.measure_wind_speed() {
                    Ok(reading) => print_reading(&anemometer.config().axes, &reading),
                    //echo file exhausted
                    Err(AnemometerError::EmptyAcquisition { .. }) if i > 0 => {
                        warn!(measurements = i, "no more echoes");
                        break;
                    }
                    Err(err) => return Err(err.into()),
                }
            }
        }
        Command::Phase {
            echoes,
            reference,
            distance,
        } => {
            let stored = load_phase_reference(&reference)?;
            let resolver =
                PhaseDifferenceResolver::new(stored, distances(&distance), config.clone())?;
            let source = FileEchoSource::open(&echoes)
                .with_context(|| format!("can't read echoes {}", echoes.display()))?;
            let anemometer = Anemometer::new(source, config)?.with_resolver(resolver);
            let reading = anemometer.measure_wind_speed()?;
            print_reading(&anemometer.config().axes, &reading);
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_ambient(args: &AmbientArgs) -> Result<AmbientConditions> {
    if args.sensors {
        let mut sensors = AmbientSensors::new(&args.i2c, Path::new(DHT22_HUMIDITY))?;
        return Ok(sensors.read()?);
    }
    let ambient = AmbientConditions::new(
        args.temperature.ok_or_else(|| anyhow!("--temperature is required"))?,
        args.pressure.ok_or_else(|| anyhow!("--pressure is required"))?,
        args.humidity.ok_or_else(|| anyhow!("--humidity is required"))?,
    );
    ambient.validate()?;
    Ok(ambient)
}

fn distances(args: &DistanceArgs) -> PerDirection<f64> {
    PerDirection::from_fn(|direction| {
        let specific = match direction {
            Direction::North => args.distance_north,
            Direction::South => args.distance_south,
            Direction::East => args.distance_east,
            Direction::West => args.distance_west,
        };
        specific.unwrap_or(args.distance)
    })
}

fn print_reading(axes: &[sonic_anemometer::Axis], reading: &WindReading) {
    let components: Vec<String> = axes
        .iter()
        .zip(&reading.components)
        .map(|(axis, speed)| {
            format!(
                "{:?}-{:?}: {:.2} m/s",
                axis.0,
                axis.1,
                speed.meters_per_sec()
            )
        })
        .collect();
    let marker = if reading.degraded { " (corrupt signal)" } else { "" };
    println!(
        "{} | {:.2} m/s{marker}",
        components.join(", "),
        reading.magnitude().meters_per_sec()
    );
}
