//! Wind components from conditioned echoes.
//!
//! Two strategies share the `WindSpeedResolver` interface:
//! `TimeOfFlightResolver` turns the calibrated absolute flight time of each
//! direction into a component per axis, `PhaseDifferenceResolver` compares the
//! live crossings with a still-air reference waveform and needs no absolute
//! speed of sound at measurement time.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::calibration::{validate_distance, CalibrationRecord};
use super::conditioner::{average, condition};
use super::config::AnemometerConfig;
use super::error::{AnemometerError, Result};
use super::psychrometry::{speed_of_sound, AmbientConditions};
use super::selector::{select_onsets, Onset};
use super::{EchoSet, PerDirection, WindReading, WindSpeed};

pub trait WindSpeedResolver {
    /// Components in the configured axis order. Corrupt echoes give the zero
    /// fallback reading with `degraded` set; every other failure is an error.
    fn resolve(&self, frames: &[EchoSet]) -> Result<WindReading>;
}

/// Sample counts to seconds.
pub fn samples_to_time(samples: &PerDirection<f64>, sampling_rate: f64) -> PerDirection<f64> {
    samples.map(|_, s| s / sampling_rate)
}

/// Flight time in seconds from the selected crossings, with the calibration
/// offset removed and the excitation burst plus the quarter-period shift of
/// the derivative added back.
pub fn corrected_time_of_flight(
    onsets: &PerDirection<Onset>,
    delta_in_samples: &PerDirection<f64>,
    config: &AnemometerConfig,
) -> PerDirection<f64> {
    let samples = onsets.map(|direction, onset| {
        onset.position - delta_in_samples[direction]
            + config.excitation_length
            + config.excitation_period() / 4.0
    });
    samples_to_time(&samples, config.sampling_rate)
}

/// `d/2 * (1/tof[a] - 1/tof[b])` for every axis `(a, b)`.
pub fn axis_speeds(
    tof: &PerDirection<f64>,
    distance: &PerDirection<f64>,
    config: &AnemometerConfig,
) -> Vec<WindSpeed> {
    config
        .axes
        .iter()
        .map(|axis| {
            let (a, b) = (axis.0, axis.1);
            WindSpeed::new(distance[a] / 2.0 * (1.0 / tof[a] - 1.0 / tof[b]))
        })
        .collect()
}

/// Threshold/zero-crossing wind speed against a calibration record.
pub fn calculate_wind_speed(
    frames: &[EchoSet],
    calibration: &CalibrationRecord,
    config: &AnemometerConfig,
) -> Result<WindReading> {
    let echoes = condition(frames)?;
    let onsets = match select_onsets(&echoes, config) {
        Ok((_, onsets)) => onsets,
        Err(err) if err.is_corrupt_signal() => {
            warn!(%err, "corrupt signal, reporting zero wind");
            return Ok(WindReading::fallback(config.axes.len()));
        }
        Err(err) => return Err(err),
    };

    let tof = corrected_time_of_flight(&onsets, &calibration.delta_in_samples, config);
    debug!(?tof, "time of flight");
    // offsets from another configuration or transducer set can push the
    // flight time through zero
    let invalid = tof.iter().find(|&(_, t)| !(t.is_finite() && *t > 0.0));
    if let Some((direction, seconds)) = invalid {
        return Err(AnemometerError::InvalidCalibration(format!(
            "{direction:?} time of flight {seconds} s is not positive, recalibrate"
        )));
    }
    Ok(WindReading::new(axis_speeds(
        &tof,
        &calibration.distance,
        config,
    )))
}

/// Still-air echoes and the speed of sound they were captured at.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhaseReference {
    /// Averaged, unconditioned echoes.
    pub echoes: EchoSet,
    pub speed_of_sound: f64,
}

impl PhaseReference {
    pub fn capture(
        frames: &[EchoSet],
        ambient: &AmbientConditions,
        config: &AnemometerConfig,
    ) -> Result<PhaseReference> {
        let echoes = average(frames)?;
        // the reference must be usable before it is stored
        condition(std::slice::from_ref(&echoes))?;
        Ok(PhaseReference {
            echoes,
            speed_of_sound: speed_of_sound(ambient, &config.gas)?,
        })
    }
}

/// Per-direction wind speed from the phase shift against the still-air reference.
///
/// The first `phase_crossings` zero crossings after each selected onset are
/// paired with the reference ones and their mean difference is the delay
/// `dt` of the live echo. With `t1 = d / c_ref` the speed is
/// `d * dt / (t1 * (t1 + dt))`, positive when the echo arrives late.
pub fn wind_speed(
    frames: &[EchoSet],
    reference: &PhaseReference,
    distance: &PerDirection<f64>,
    config: &AnemometerConfig,
) -> Result<PerDirection<WindSpeed>> {
    validate_distance(distance)?;
    let live = condition(frames)?;
    let still = condition(std::slice::from_ref(&reference.echoes))?;
    let (live_crossings, live_onsets) = select_onsets(&live, config)?;
    let (still_crossings, still_onsets) = select_onsets(&still, config)?;

    PerDirection::try_from_fn(|direction| {
        let live_tail = &live_crossings[direction][live_onsets[direction].index..];
        let still_tail = &still_crossings[direction][still_onsets[direction].index..];
        let shifts: Vec<f64> = live_tail
            .iter()
            .zip(still_tail)
            .take(config.phase_crossings)
            .map(|(now, calm)| now - calm)
            .collect();
        if shifts.is_empty() {
            return Err(AnemometerError::CorruptSignal { direction });
        }

        let mean_shift = shifts.iter().sum::<f64>() / shifts.len() as f64;
        let delta_time = mean_shift / config.sampling_rate;
        let d = distance[direction];
        let t1 = d / reference.speed_of_sound;
        if t1 + delta_time <= 0.0 {
            return Err(AnemometerError::CorruptSignal { direction });
        }
        debug!(?direction, mean_shift, pairs = shifts.len(), "phase shift");
        Ok(WindSpeed::new(d * delta_time / (t1 * (t1 + delta_time))))
    })
}

pub struct TimeOfFlightResolver {
    calibration: CalibrationRecord,
    config: AnemometerConfig,
}

impl TimeOfFlightResolver {
    pub fn new(calibration: CalibrationRecord, config: AnemometerConfig) -> Result<Self> {
        calibration.validate()?;
        Ok(TimeOfFlightResolver {
            calibration,
            config,
        })
    }

    pub fn calibration(&self) -> &CalibrationRecord {
        &self.calibration
    }
}

impl WindSpeedResolver for TimeOfFlightResolver {
    fn resolve(&self, frames: &[EchoSet]) -> Result<WindReading> {
        calculate_wind_speed(frames, &self.calibration, &self.config)
    }
}

pub struct PhaseDifferenceResolver {
    reference: PhaseReference,
    distance: PerDirection<f64>,
    config: AnemometerConfig,
}

impl PhaseDifferenceResolver {
    pub fn new(
        reference: PhaseReference,
        distance: PerDirection<f64>,
        config: AnemometerConfig,
    ) -> Result<Self> {
        validate_distance(&distance)?;
        if !(reference.speed_of_sound.is_finite() && reference.speed_of_sound > 0.0) {
            return Err(AnemometerError::InvalidCalibration(format!(
                "reference speed of sound {} m/s",
                reference.speed_of_sound
            )));
        }
        Ok(PhaseDifferenceResolver {
            reference,
            distance,
            config,
        })
    }
}

impl WindSpeedResolver for PhaseDifferenceResolver {
    fn resolve(&self, frames: &[EchoSet]) -> Result<WindReading> {
        let speeds = match wind_speed(frames, &self.reference, &self.distance, &self.config) {
            Ok(speeds) => speeds,
            Err(err) if err.is_corrupt_signal() => {
                warn!(%err, "corrupt signal, reporting zero wind");
                return Ok(WindReading::fallback(self.config.axes.len()));
            }
            Err(err) => return Err(err),
        };

        // a late echo on `a` means wind against a → b, so the axis component
        // takes the opposite sign of the per-direction speed
        let components = self
            .config
            .axes
            .iter()
            .map(|axis| {
                WindSpeed::new(
                    (speeds[axis.1].meters_per_sec() - speeds[axis.0].meters_per_sec()) / 2.0,
                )
            })
            .collect();
        Ok(WindReading::new(components))
    }
}
