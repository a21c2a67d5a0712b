//! Still-air calibration of the systematic timing offset per direction.
//!
//! Whatever latency the physical distance and the speed of sound do not
//! explain (excitation burst, analog and digital path delay) ends up in
//! `delta_in_samples`. Capture the calibration echoes in still air, otherwise
//! the wind asymmetry is baked into the offsets.

use serde::{Deserialize, Serialize};
use tracing::info;

use super::conditioner::condition;
use super::config::AnemometerConfig;
use super::error::{AnemometerError, Result};
use super::psychrometry::{speed_of_sound, AmbientConditions};
use super::selector::select_onsets;
use super::{EchoSet, PerDirection};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRecord {
    /// Offset of the selected zero crossing against the expected flight, in samples.
    pub delta_in_samples: PerDirection<f64>,
    /// Transducer spacing per direction, in meters.
    pub distance: PerDirection<f64>,
}

impl CalibrationRecord {
    pub fn validate(&self) -> Result<()> {
        validate_distance(&self.distance)?;
        if let Some((direction, delta)) = self.delta_in_samples.iter().find(|(_, d)| !d.is_finite())
        {
            return Err(AnemometerError::InvalidCalibration(format!(
                "{direction:?} offset {delta} is not a number"
            )));
        }
        Ok(())
    }
}

pub fn validate_distance(distance: &PerDirection<f64>) -> Result<()> {
    match distance.iter().find(|(_, d)| !(d.is_finite() && **d > 0.0)) {
        Some((direction, &distance)) => Err(AnemometerError::InvalidDistance {
            direction,
            distance,
        }),
        None => Ok(()),
    }
}

/// Flight time in seconds over each transducer distance.
pub fn expected_time_of_flight(distance: &PerDirection<f64>, speed: f64) -> PerDirection<f64> {
    distance.map(|_, d| d / speed)
}

/// Offset between the selected zero crossing of the conditioned echoes and the
/// sample at which the echo is expected after `tof` seconds.
pub fn delta_samples(
    frames: &[EchoSet],
    tof: &PerDirection<f64>,
    config: &AnemometerConfig,
) -> Result<PerDirection<f64>> {
    let echoes = condition(frames)?;
    let (_, onsets) = select_onsets(&echoes, config)?;
    Ok(onsets.map(|direction, onset| {
        onset.position
            - (config.sampling_rate * tof[direction] - config.excitation_length)
                / config.sampling_correction
    }))
}

pub fn calibration(
    frames: &[EchoSet],
    distance: &PerDirection<f64>,
    ambient: &AmbientConditions,
    config: &AnemometerConfig,
) -> Result<CalibrationRecord> {
    validate_distance(distance)?;
    let speed = speed_of_sound(ambient, &config.gas)?;
    let tof = expected_time_of_flight(distance, speed);
    let delta_in_samples = delta_samples(frames, &tof, config)?;
    info!(speed, ?delta_in_samples, "calibrated");

    Ok(CalibrationRecord {
        delta_in_samples,
        distance: distance.clone(),
    })
}
